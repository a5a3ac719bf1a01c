//! Statistics tables in PostgreSQL.
//!
//! Every dataset gets its own table with a unique constraint on
//! (valid_date, leadtime, pcode) and CHECK constraints mirroring the row
//! validator. Writes are multi-row `INSERT ... ON CONFLICT DO UPDATE`
//! statements, so repeated or concurrent runs converge on one row per key.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use zonal_stats::{QaRecord, Stat, StatsSink, StatsTable};

use crate::error::{StorageError, StorageResult};

/// Rows per INSERT statement; 22 binds per row stays far below the
/// protocol limit of 65535 parameters.
const UPSERT_CHUNK_ROWS: usize = 1000;

/// Longest accepted dataset name, leaving room for constraint suffixes.
const MAX_DATASET_LEN: usize = 32;

const OBSERVATIONAL_KEY_COLUMNS: &[&str] = &["iso3", "pcode", "valid_date", "adm_level"];

const FORECAST_KEY_COLUMNS: &[&str] = &[
    "iso3",
    "pcode",
    "valid_date",
    "issued_date",
    "leadtime",
    "adm_level",
];

/// Persisted statistics; each column is named after its statistic.
const STORED_STATS: [Stat; 16] = [
    Stat::Mean,
    Stat::Median,
    Stat::Min,
    Stat::Max,
    Stat::Count,
    Stat::Sum,
    Stat::Std,
    Stat::P10,
    Stat::P20,
    Stat::P30,
    Stat::P40,
    Stat::P50,
    Stat::P60,
    Stat::P70,
    Stat::P80,
    Stat::P90,
];

fn insert_columns(forecast: bool) -> Vec<&'static str> {
    let keys = if forecast {
        FORECAST_KEY_COLUMNS
    } else {
        OBSERVATIONAL_KEY_COLUMNS
    };
    keys.iter()
        .copied()
        .chain(STORED_STATS.iter().map(|s| s.as_str()))
        .collect()
}

/// Connection pool and table operations.
pub struct PgStatsStore {
    pool: PgPool,
}

impl PgStatsStore {
    /// Create a new store connection from a database URL.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the dataset table and the shared `qa` table if missing.
    pub async fn ensure_tables(&self, dataset: &str, forecast: bool) -> StorageResult<()> {
        let create = create_table_sql(dataset, forecast)?;

        for statement in [create.as_str(), QA_SCHEMA_SQL] {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&self.pool).await?;
            }
        }

        info!(dataset = %dataset, forecast, "Ensured statistics tables");
        Ok(())
    }

    /// Insert or update every row of `table`, returning the rows affected.
    pub async fn upsert_table(&self, dataset: &str, table: &StatsTable) -> StorageResult<usize> {
        validate_dataset(dataset)?;
        if table.is_empty() {
            return Ok(0);
        }

        let forecast = table.is_forecast();
        let columns = insert_columns(forecast);
        let conflict = on_conflict_clause(dataset);

        let mut tx = self.pool.begin().await?;
        let mut affected = 0u64;

        for chunk in table.records().chunks(UPSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", dataset, columns.join(", ")));

            builder.push_values(chunk, |mut row, record| {
                let stats = &record.stats;
                row.push_bind(record.iso3.as_str())
                    .push_bind(record.pcode.as_str())
                    .push_bind(record.valid_date);
                if forecast {
                    row.push_bind(record.issued_date())
                        .push_bind(record.leadtime().map(|l| l as i32));
                }
                row.push_bind(record.adm_level as i32);
                for stat in STORED_STATS {
                    match stat {
                        Stat::Count => row.push_bind(stats.count.map(|c| c as i64)),
                        _ => row.push_bind(nullable(stats.get(stat))),
                    };
                }
            });
            builder.push(&conflict);

            let result = builder.build().execute(&mut *tx).await?;
            affected += result.rows_affected();
        }

        tx.commit().await?;

        debug!(dataset = %dataset, rows = affected, "Upserted statistics");
        Ok(affected as usize)
    }

    /// Append a row to the `qa` table.
    pub async fn insert_qa(&self, record: &QaRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO qa (date, iso3, adm_level, dataset, error, stack_trace)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.date)
        .bind(&record.iso3)
        .bind(record.adm_level.map(i32::from))
        .bind(&record.dataset)
        .bind(&record.error)
        .bind(record.stack_trace.trim())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl StatsSink for PgStatsStore {
    async fn upsert(&self, dataset: &str, table: &StatsTable) -> zonal_stats::Result<usize> {
        Ok(self.upsert_table(dataset, table).await?)
    }

    async fn record_qa(&self, record: QaRecord) -> zonal_stats::Result<()> {
        Ok(self.insert_qa(&record).await?)
    }
}

/// NaN means "no coverage" and is stored as NULL.
fn nullable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

fn validate_dataset(dataset: &str) -> StorageResult<()> {
    let mut chars = dataset.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && dataset.len() <= MAX_DATASET_LEN;
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(dataset.to_string()))
    }
}

fn constraint_name(dataset: &str) -> String {
    format!("{}_valid_date_leadtime_pcode_key", dataset)
}

fn on_conflict_clause(dataset: &str) -> String {
    let updates: Vec<String> = STORED_STATS
        .iter()
        .map(|s| s.as_str())
        .chain(["iso3", "adm_level"])
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    format!(
        " ON CONFLICT ON CONSTRAINT {} DO UPDATE SET {}",
        constraint_name(dataset),
        updates.join(", ")
    )
}

/// DDL for a dataset table.
pub fn create_table_sql(dataset: &str, forecast: bool) -> StorageResult<String> {
    validate_dataset(dataset)?;

    let percentile_columns: String = Stat::PERCENTILES
        .iter()
        .map(|p| format!("\n    {} DOUBLE PRECISION,", p.as_str()))
        .collect();

    let (forecast_columns, key_columns, temporal_checks) = if forecast {
        (
            "issued_date DATE NOT NULL,\n    leadtime INTEGER NOT NULL,\n    ",
            "valid_date, leadtime, pcode",
            "CONSTRAINT check_leadtime_between_0_6 CHECK (leadtime BETWEEN 0 AND 6),
    CONSTRAINT check_valid_date CHECK (valid_date >= issued_date),
    CONSTRAINT check_leadtime_equals_months_diff CHECK (
        leadtime = EXTRACT(YEAR FROM AGE(valid_date, issued_date)) * 12
                 + EXTRACT(MONTH FROM AGE(valid_date, issued_date))
    )",
        )
    } else {
        (
            "",
            "valid_date, pcode",
            "CONSTRAINT check_valid_date CHECK (valid_date <= CURRENT_DATE)",
        )
    };

    Ok(format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    iso3 CHAR(3) NOT NULL,
    pcode VARCHAR NOT NULL,
    valid_date DATE NOT NULL,
    {forecast_columns}adm_level INTEGER NOT NULL,
    mean DOUBLE PRECISION,
    median DOUBLE PRECISION,
    min DOUBLE PRECISION,
    max DOUBLE PRECISION,
    count BIGINT,
    sum DOUBLE PRECISION,
    std DOUBLE PRECISION,{percentile_columns}

    CONSTRAINT {constraint} UNIQUE NULLS NOT DISTINCT ({key_columns}),
    CONSTRAINT check_min_max CHECK (min <= max),
    CONSTRAINT check_mean CHECK (mean BETWEEN min AND max),
    CONSTRAINT check_median CHECK (median BETWEEN min AND max),
    CONSTRAINT check_std CHECK (std >= 0),
    CONSTRAINT check_count CHECK (count >= 0),
    CONSTRAINT check_adm_level CHECK (adm_level BETWEEN 0 AND 4),
    CONSTRAINT check_iso3 CHECK (iso3 ~ '^[A-Z]{{3}}$'),
    {temporal_checks}
)
"#,
        table = dataset,
        constraint = constraint_name(dataset),
    ))
}

const QA_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS qa (
    date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    iso3 CHAR(3),
    adm_level INTEGER,
    dataset VARCHAR NOT NULL,
    error TEXT NOT NULL,
    stack_trace TEXT
)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_names() {
        assert!(validate_dataset("era5").is_ok());
        assert!(validate_dataset("seas5_v2").is_ok());
        assert!(validate_dataset("Era5").is_err());
        assert!(validate_dataset("5era").is_err());
        assert!(validate_dataset("era5; DROP TABLE qa").is_err());
        assert!(validate_dataset("").is_err());
    }

    #[test]
    fn test_forecast_table_has_leadtime_key() {
        let sql = create_table_sql("seas5", true).unwrap();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS seas5 ("));
        assert!(sql.contains("UNIQUE NULLS NOT DISTINCT (valid_date, leadtime, pcode)"));
        assert!(sql.contains("leadtime INTEGER NOT NULL"));
        assert!(sql.contains("check_leadtime_equals_months_diff"));
        assert!(!sql.contains("CURRENT_DATE"));
    }

    #[test]
    fn test_observational_table() {
        let sql = create_table_sql("era5", false).unwrap();
        assert!(sql.contains("UNIQUE NULLS NOT DISTINCT (valid_date, pcode)"));
        assert!(sql.contains("valid_date <= CURRENT_DATE"));
        assert!(sql.contains("'^[A-Z]{3}$'"));
        assert!(!sql.contains("issued_date"));
        assert!(sql.contains("percentile_10 DOUBLE PRECISION,"));
        assert!(sql.contains("percentile_90 DOUBLE PRECISION,"));
    }

    #[test]
    fn test_insert_columns_cover_every_stored_stat() {
        let columns = insert_columns(false);
        assert_eq!(columns.len(), 4 + 16);
        assert_eq!(&columns[..4], OBSERVATIONAL_KEY_COLUMNS);
        assert!(columns.contains(&"percentile_50"));
        assert!(!columns.contains(&"unique"));

        let forecast = insert_columns(true);
        assert_eq!(forecast.len() * UPSERT_CHUNK_ROWS, 22_000);
        assert!(forecast.contains(&"leadtime"));
    }

    #[test]
    fn test_on_conflict_updates_statistics() {
        let clause = on_conflict_clause("era5");
        assert!(clause.starts_with(" ON CONFLICT ON CONSTRAINT era5_valid_date_leadtime_pcode_key"));
        assert!(clause.contains("mean = EXCLUDED.mean"));
        assert!(clause.contains("std = EXCLUDED.std"));
        assert!(clause.contains("percentile_70 = EXCLUDED.percentile_70"));
        assert!(!clause.contains("pcode = EXCLUDED"));
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(nullable(Some(f64::NAN)), None);
        assert_eq!(nullable(Some(1.5)), Some(1.5));
        assert_eq!(nullable(None), None);
    }
}
