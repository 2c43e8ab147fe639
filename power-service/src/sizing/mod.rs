//! Energy-storage cabinet sizing from representative period power.

pub mod capacity;
pub mod estimator;

pub use capacity::{CapacityCalculator, CapacityRequest, CapacityResult, Period, PeriodLoad, SizingParams};
pub use estimator::{estimate, Method};
