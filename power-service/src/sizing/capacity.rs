use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use super::estimator::{estimate, Method};
use crate::{
    error::{ServiceError, ValidationError},
    store::{ReadingStore, StoreError},
    timestamp,
};

/// Inbound sizing request. Field names follow the public JSON contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRequest {
    pub company: String,
    pub power_factor: f64,
    /// kW
    pub transformer_capacity: f64,
    pub meter_multiplier: f64,
    /// Usable discharge energy of one cabinet, kWh.
    pub discharge_capacity: f64,
    /// Usable charge energy of one cabinet, kWh.
    pub charge_capacity: f64,
    pub first_charge_period: Vec<String>,
    pub first_discharge_period: Vec<String>,
    pub second_charge_period: Vec<String>,
    pub second_discharge_period: Vec<String>,
    pub calculation_method: String,
}

/// Energy per period in kWh and the cabinet count they support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapacityResult {
    pub min_cabinet_count: i64,
    pub first_charge_amount: f64,
    pub first_discharge_amount: f64,
    pub second_charge_amount: f64,
    pub second_discharge_amount: f64,
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Period {
    /// Parse a `[start, end]` pair of request timestamps.
    pub fn parse(name: &'static str, bounds: &[String], offset: UtcOffset) -> Result<Self, ValidationError> {
        match bounds {
            [start, end] => Ok(Self {
                start: timestamp::parse_request(start, offset)?,
                end: timestamp::parse_request(end, offset)?,
            }),
            _ => Err(ValidationError::MalformedPeriod {
                name,
                len: bounds.len(),
            }),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.end >= self.start
    }

    /// Hours covered at quarter-hour resolution: `n` inclusive samples span
    /// `(n - 1) / 4` hours, so 00:00..=24:00 is 24 hours. Invalid periods
    /// cover nothing.
    ///
    /// Deliberately not `(quarters + 1) / 4`, which would make a full day
    /// 24.25 hours. See "Hours for a period" in DESIGN.md.
    pub fn hours(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        let quarters = (self.end - self.start).whole_minutes() / 15;
        quarters as f64 / 4.0
    }
}

/// Site and cabinet figures from the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingParams {
    pub power_factor: f64,
    pub transformer_capacity: f64,
    pub meter_multiplier: f64,
    pub charge_capacity: f64,
    pub discharge_capacity: f64,
}

impl SizingParams {
    pub fn from_request(req: &CapacityRequest) -> Self {
        Self {
            power_factor: req.power_factor,
            transformer_capacity: req.transformer_capacity,
            meter_multiplier: req.meter_multiplier,
            charge_capacity: req.charge_capacity,
            discharge_capacity: req.discharge_capacity,
        }
    }

    /// Cabinet capacities are divisors and must be positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("chargeCapacity", self.charge_capacity),
            ("dischargeCapacity", self.discharge_capacity),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::InvalidCapacity { name, value });
            }
        }
        Ok(())
    }
}

/// Representative power and duration of one period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodLoad {
    pub power: f64,
    pub hours: f64,
}

impl PeriodLoad {
    /// A zero representative power means the period had no usable data.
    /// Invalid periods are loaded as empty.
    pub fn is_empty(&self) -> bool {
        self.power == 0.0
    }
}

/// Energy amounts and minimum cabinet count for the four periods, in the
/// order first charge, first discharge, second charge, second discharge.
///
/// With `round_amounts` the charge headroom is rounded before it is multiplied
/// by hours and the discharge product is rounded as a whole.
pub fn size_cabinets(params: &SizingParams, loads: &[PeriodLoad; 4], round_amounts: bool) -> CapacityResult {
    let round = |v: f64| if round_amounts { v.round() } else { v };

    let charge = |load: &PeriodLoad| {
        let headroom = params.transformer_capacity * params.power_factor - load.power * params.meter_multiplier;
        round(headroom) * load.hours
    };
    let discharge =
        |load: &PeriodLoad| round(load.power * params.meter_multiplier * load.hours * params.power_factor);

    let first_charge_amount = charge(&loads[0]);
    let first_discharge_amount = discharge(&loads[1]);
    let second_charge_amount = charge(&loads[2]);
    let second_discharge_amount = discharge(&loads[3]);

    let min_ratio = [
        first_charge_amount / params.charge_capacity,
        first_discharge_amount / params.discharge_capacity,
        second_charge_amount / params.charge_capacity,
        second_discharge_amount / params.discharge_capacity,
    ]
    .into_iter()
    .fold(f64::INFINITY, f64::min);

    CapacityResult {
        // Truncates toward zero.
        min_cabinet_count: min_ratio as i64,
        first_charge_amount,
        first_discharge_amount,
        second_charge_amount,
        second_discharge_amount,
    }
}

/// Runs a [`CapacityRequest`] against stored readings.
pub struct CapacityCalculator<S: ?Sized> {
    store: Arc<S>,
    offset: UtcOffset,
    round_amounts: bool,
}

impl<S> CapacityCalculator<S>
where
    S: ReadingStore + ?Sized,
{
    pub fn new(store: Arc<S>, offset: UtcOffset, round_amounts: bool) -> Self {
        Self {
            store,
            offset,
            round_amounts,
        }
    }

    pub async fn calculate(&self, req: &CapacityRequest) -> Result<CapacityResult, ServiceError> {
        metrics::counter!("capacity_requests_total").increment(1);

        // Parsed before any query so a bad name fails even without data.
        let method: Method = req.calculation_method.parse()?;
        let periods = [
            Period::parse("firstChargePeriod", &req.first_charge_period, self.offset)?,
            Period::parse("firstDischargePeriod", &req.first_discharge_period, self.offset)?,
            Period::parse("secondChargePeriod", &req.second_charge_period, self.offset)?,
            Period::parse("secondDischargePeriod", &req.second_discharge_period, self.offset)?,
        ];

        let company = req.company.as_str();
        let (first_charge, first_discharge, second_charge, second_discharge) = tokio::try_join!(
            self.period_load(&periods[0], company, method),
            self.period_load(&periods[1], company, method),
            self.period_load(&periods[2], company, method),
            self.period_load(&periods[3], company, method),
        )?;
        let loads = [first_charge, first_discharge, second_charge, second_discharge];

        if loads.iter().any(PeriodLoad::is_empty) {
            tracing::info!(company = %company, method = %method, "a period has no data, returning zero capacity");
            metrics::counter!("capacity_zero_results_total").increment(1);
            return Ok(CapacityResult::default());
        }

        let params = SizingParams::from_request(req);
        params.validate()?;

        let result = size_cabinets(&params, &loads, self.round_amounts);
        tracing::info!(
            company = %company,
            method = %method,
            min_cabinet_count = result.min_cabinet_count,
            first_charge_kwh = result.first_charge_amount,
            first_discharge_kwh = result.first_discharge_amount,
            second_charge_kwh = result.second_charge_amount,
            second_discharge_kwh = result.second_discharge_amount,
            "capacity calculated"
        );
        Ok(result)
    }

    async fn period_load(&self, period: &Period, company: &str, method: Method) -> Result<PeriodLoad, StoreError> {
        if !period.is_valid() {
            tracing::debug!(start = %period.start, end = %period.end, "period ends before it starts");
            return Ok(PeriodLoad::default());
        }
        let readings = self.store.query_range(period.start, period.end, company).await?;
        Ok(PeriodLoad {
            power: estimate(&readings, method),
            hours: period.hours(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use power_client::domain::Reading;
    use time::{
        macros::{datetime, offset},
        Duration,
    };

    fn pair(start: &str, end: &str) -> Vec<String> {
        vec![start.to_string(), end.to_string()]
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn request(method: &str) -> CapacityRequest {
        CapacityRequest {
            company: "acme".to_string(),
            power_factor: 0.9,
            transformer_capacity: 1000.0,
            meter_multiplier: 1.0,
            discharge_capacity: 200.0,
            charge_capacity: 100.0,
            first_charge_period: pair("2024-05-01 00:00:00", "2024-05-01 02:00:00"),
            first_discharge_period: pair("2024-05-01 08:00:00", "2024-05-01 10:00:00"),
            second_charge_period: pair("2024-05-01 12:00:00", "2024-05-01 14:00:00"),
            second_discharge_period: pair("2024-05-01 18:00:00", "2024-05-01 20:00:00"),
            calculation_method: method.to_string(),
        }
    }

    /// 300 kW overnight and midday, 400 kW in the two discharge windows.
    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let start = datetime!(2024-05-01 00:00:00 +8);
        let readings: Vec<Reading> = (0..96)
            .map(|i| {
                let ts = start + Duration::minutes(15 * i);
                let hour = ts.hour();
                let power = if (8..=10).contains(&hour) || (18..=20).contains(&hour) {
                    400.0
                } else {
                    300.0
                };
                Reading::new(ts, "acme", power)
            })
            .collect();
        store.persist_batch(&readings).await.unwrap();
        store
    }

    #[test]
    fn full_day_is_twenty_four_hours() {
        let p = Period::parse("p", &pair("2024-05-01 00:00:00", "2024-05-02 00:00:00"), offset!(+8)).unwrap();
        assert_eq!(p.hours(), 24.0);

        let p = Period::parse("p", &pair("2024-05-01 09:00:00", "2024-05-01 10:10:00"), offset!(+8)).unwrap();
        assert_eq!(p.hours(), 1.0);
    }

    #[test]
    fn inverted_period_is_invalid_and_empty() {
        let p = Period::parse("p", &pair("2024-05-01 10:00:00", "2024-05-01 09:00:00"), offset!(+8)).unwrap();
        assert!(!p.is_valid());
        assert_eq!(p.hours(), 0.0);
    }

    #[test]
    fn periods_need_two_well_formed_timestamps() {
        assert_eq!(
            Period::parse("firstChargePeriod", &["2024-05-01 00:00:00".to_string()], offset!(+8)).unwrap_err(),
            ValidationError::MalformedPeriod {
                name: "firstChargePeriod",
                len: 1
            }
        );
        assert_eq!(
            Period::parse("p", &pair("2024-05-01", "2024-05-01 01:00:00"), offset!(+8)).unwrap_err(),
            ValidationError::InvalidTimestamp("2024-05-01".to_string())
        );
    }

    #[test]
    fn sizing_formulas() {
        let params = SizingParams::from_request(&request("average"));
        let loads = [
            PeriodLoad { power: 300.0, hours: 2.0 },
            PeriodLoad { power: 400.0, hours: 2.0 },
            PeriodLoad { power: 500.0, hours: 3.0 },
            PeriodLoad { power: 100.0, hours: 1.0 },
        ];

        let r = size_cabinets(&params, &loads, false);

        assert!(approx(r.first_charge_amount, 1200.0));
        assert!(approx(r.first_discharge_amount, 720.0));
        assert!(approx(r.second_charge_amount, 1200.0));
        assert!(approx(r.second_discharge_amount, 90.0));
        // min(12, 3.6, 12, 0.45)
        assert_eq!(r.min_cabinet_count, 0);
    }

    #[test]
    fn rounding_applies_to_headroom_and_discharge_product() {
        let params = SizingParams::from_request(&request("average"));
        let loads = [
            PeriodLoad { power: 300.4, hours: 2.0 },
            PeriodLoad { power: 400.3, hours: 2.0 },
            PeriodLoad { power: 300.4, hours: 2.0 },
            PeriodLoad { power: 400.3, hours: 2.0 },
        ];

        let exact = size_cabinets(&params, &loads, false);
        let rounded = size_cabinets(&params, &loads, true);

        assert!(approx(exact.first_charge_amount, 1199.2));
        assert_eq!(rounded.first_charge_amount, 1200.0);
        assert!(approx(exact.first_discharge_amount, 720.54));
        assert_eq!(rounded.first_discharge_amount, 721.0);
    }

    #[test]
    fn negative_amounts_truncate_toward_zero() {
        let params = SizingParams::from_request(&request("average"));
        let loads = [
            PeriodLoad { power: 1050.0, hours: 1.0 },
            PeriodLoad { power: 400.0, hours: 2.0 },
            PeriodLoad { power: 300.0, hours: 2.0 },
            PeriodLoad { power: 400.0, hours: 2.0 },
        ];

        let r = size_cabinets(&params, &loads, false);

        assert!(approx(r.first_charge_amount, -150.0));
        assert_eq!(r.min_cabinet_count, -1);
    }

    #[tokio::test]
    async fn calculates_from_stored_readings() {
        let calc = CapacityCalculator::new(seeded_store().await, offset!(+8), false);

        let r = calc.calculate(&request("average")).await.unwrap();

        assert!(approx(r.first_charge_amount, 1200.0));
        assert!(approx(r.first_discharge_amount, 720.0));
        assert!(approx(r.second_charge_amount, 1200.0));
        assert!(approx(r.second_discharge_amount, 720.0));
        assert_eq!(r.min_cabinet_count, 3);
    }

    #[tokio::test]
    async fn period_without_data_yields_all_zero() {
        let calc = CapacityCalculator::new(seeded_store().await, offset!(+8), false);
        let mut req = request("median");
        req.second_discharge_period = pair("2024-06-01 18:00:00", "2024-06-01 20:00:00");

        assert_eq!(calc.calculate(&req).await.unwrap(), CapacityResult::default());
    }

    #[tokio::test]
    async fn inverted_period_yields_all_zero() {
        let calc = CapacityCalculator::new(seeded_store().await, offset!(+8), false);
        let mut req = request("average");
        req.first_charge_period = pair("2024-05-01 02:00:00", "2024-05-01 00:00:00");

        assert_eq!(calc.calculate(&req).await.unwrap(), CapacityResult::default());
    }

    #[tokio::test]
    async fn unknown_method_fails_even_without_data() {
        let calc = CapacityCalculator::new(Arc::new(MemoryStore::new()), offset!(+8), false);

        let err = calc.calculate(&request("geomean")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::UnsupportedMethod(ref m)) if m == "geomean"
        ));
    }

    #[tokio::test]
    async fn zero_cabinet_capacity_is_rejected_when_sizing() {
        let calc = CapacityCalculator::new(seeded_store().await, offset!(+8), false);
        let mut req = request("average");
        req.charge_capacity = 0.0;

        let err = calc.calculate(&req).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::InvalidCapacity { name: "chargeCapacity", .. })
        ));

        // Without data the zero result wins over the bad capacity.
        let empty = CapacityCalculator::new(Arc::new(MemoryStore::new()), offset!(+8), false);
        assert_eq!(empty.calculate(&req).await.unwrap(), CapacityResult::default());
    }
}
