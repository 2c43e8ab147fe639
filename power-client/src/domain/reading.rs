use time::OffsetDateTime;

/// One quarter-hour active-power sample for a company, as stored in the
/// `power_data` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub ts: OffsetDateTime,
    pub company: String,
    pub power: f64,
}

impl Reading {
    pub fn new(ts: OffsetDateTime, company: impl Into<String>, power: f64) -> Self {
        Self {
            ts,
            company: company.into(),
            power,
        }
    }

    /// True when the timestamp sits exactly on a 15-minute boundary.
    pub fn is_on_quarter_hour(&self) -> bool {
        self.ts.minute() % 15 == 0 && self.ts.second() == 0 && self.ts.nanosecond() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn quarter_hour_alignment() {
        let on = Reading::new(datetime!(2024-03-01 09:45:00 +8), "acme", 12.5);
        let off = Reading::new(datetime!(2024-03-01 09:50:00 +8), "acme", 12.5);
        let seconds = Reading::new(datetime!(2024-03-01 09:45:30 +8), "acme", 12.5);

        assert!(on.is_on_quarter_hour());
        assert!(!off.is_on_quarter_hour());
        assert!(!seconds.is_on_quarter_hour());
    }
}
