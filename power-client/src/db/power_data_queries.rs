use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::domain::Reading;

/// Insert a batch of readings with a single multi-row statement.
///
/// The `power_data` table deduplicates on `(ts, company)`, so re-sending a
/// reading replaces the stored power value instead of adding a row.
pub async fn insert_readings(pool: &PgPool, readings: &[Reading]) -> Result<()> {
    if readings.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO power_data (ts, company, power) ");
    builder.push_values(readings, |mut b, r| {
        b.push_bind(r.ts).push_bind(&r.company).push_bind(r.power);
    });

    builder.build().execute(pool).await?;
    Ok(())
}

/// Fetch the readings of one company between `start` and `end`, both
/// inclusive, in ascending timestamp order.
pub async fn readings_in_range(
    pool: &PgPool,
    company: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<Reading>> {
    let rows = sqlx::query_as::<_, Reading>(
        r#"
        SELECT
            ts,
            company,
            power
        FROM power_data
        WHERE company = $1
          AND ts >= $2
          AND ts <= $3
        ORDER BY ts
        "#,
    )
    .bind(company)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
