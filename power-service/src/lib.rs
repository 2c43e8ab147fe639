pub mod api;
pub mod config;
pub mod error;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod sizing;
pub mod sources;
pub mod store;
pub mod timestamp;
pub mod transform;

pub use error::{ServiceError, ValidationError};
pub use pipeline::{Envelope, IngestEvent, IngestQueue, IngestReport, IngestSettings};
pub use store::{MemoryStore, ReadingStore, StoreError};
