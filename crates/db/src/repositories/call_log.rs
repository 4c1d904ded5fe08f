use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Row, Sqlite};

use freightdesk_core::domain::call::{CallId, CallOutcome, CallRecord, Sentiment};
use freightdesk_core::domain::carrier::McNumber;
use freightdesk_core::domain::load::LoadId;

use super::{CallLogFilter, CallRecordRepository, RepositoryError};
use crate::DbPool;

const CALL_LOG_COLUMNS: &str = "call_id, carrier_mc, carrier_name, timestamp, load_id, \
     loadboard_rate, agreed_rate, negotiation_rounds, outcome, sentiment, notes, \
     call_duration_seconds";

pub struct SqlCallRecordRepository {
    pool: DbPool,
}

impl SqlCallRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Fixed-width UTC form so stored timestamps compare lexicographically.
fn timestamp_to_sql(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_decimal(column: &str, value: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    value
        .map(|raw| {
            Decimal::from_str(&raw)
                .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}`: {e}")))
        })
        .transpose()
}

fn row_to_call_record(row: &sqlx::sqlite::SqliteRow) -> Result<CallRecord, RepositoryError> {
    let call_id: String = decode(row, "call_id")?;
    let carrier_mc: String = decode(row, "carrier_mc")?;
    let carrier_name: Option<String> = decode(row, "carrier_name")?;
    let timestamp_str: String = decode(row, "timestamp")?;
    let load_id: Option<String> = decode(row, "load_id")?;
    let loadboard_rate: Option<String> = decode(row, "loadboard_rate")?;
    let agreed_rate: Option<String> = decode(row, "agreed_rate")?;
    let negotiation_rounds: i64 = decode(row, "negotiation_rounds")?;
    let outcome_str: String = decode(row, "outcome")?;
    let sentiment_str: String = decode(row, "sentiment")?;
    let notes: Option<String> = decode(row, "notes")?;
    let call_duration_seconds: i64 = decode(row, "call_duration_seconds")?;

    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("timestamp `{timestamp_str}`: {e}")))?;

    Ok(CallRecord {
        call_id: CallId(call_id),
        carrier_mc: McNumber::parse(&carrier_mc)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        carrier_name,
        timestamp,
        load_id: load_id.map(LoadId),
        loadboard_rate: parse_decimal("loadboard_rate", loadboard_rate)?,
        agreed_rate: parse_decimal("agreed_rate", agreed_rate)?,
        negotiation_rounds: u32::try_from(negotiation_rounds)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        outcome: CallOutcome::from_str(&outcome_str)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        sentiment: Sentiment::from_str(&sentiment_str)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        notes,
        call_duration_seconds: u32::try_from(call_duration_seconds)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl CallRecordRepository for SqlCallRecordRepository {
    async fn save(&self, record: CallRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO call_logs (call_id, carrier_mc, carrier_name, timestamp, load_id,
                                    loadboard_rate, agreed_rate, negotiation_rounds, outcome,
                                    sentiment, notes, call_duration_seconds)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(call_id) DO UPDATE SET
                 carrier_mc = excluded.carrier_mc,
                 carrier_name = excluded.carrier_name,
                 timestamp = excluded.timestamp,
                 load_id = excluded.load_id,
                 loadboard_rate = excluded.loadboard_rate,
                 agreed_rate = excluded.agreed_rate,
                 negotiation_rounds = excluded.negotiation_rounds,
                 outcome = excluded.outcome,
                 sentiment = excluded.sentiment,
                 notes = excluded.notes,
                 call_duration_seconds = excluded.call_duration_seconds",
        )
        .bind(&record.call_id.0)
        .bind(record.carrier_mc.to_string())
        .bind(&record.carrier_name)
        .bind(timestamp_to_sql(&record.timestamp))
        .bind(record.load_id.as_ref().map(|id| id.0.clone()))
        .bind(record.loadboard_rate.map(|rate| rate.to_string()))
        .bind(record.agreed_rate.map(|rate| rate.to_string()))
        .bind(i64::from(record.negotiation_rounds))
        .bind(record.outcome.as_str())
        .bind(record.sentiment.as_str())
        .bind(&record.notes)
        .bind(i64::from(record.call_duration_seconds))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &CallId) -> Result<Option<CallRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CALL_LOG_COLUMNS} FROM call_logs WHERE call_id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_call_record(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &CallLogFilter) -> Result<Vec<CallRecord>, RepositoryError> {
        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {CALL_LOG_COLUMNS} FROM call_logs WHERE 1 = 1"));
        if let Some(start) = &filter.start {
            query.push(" AND timestamp >= ").push_bind(timestamp_to_sql(start));
        }
        if let Some(end) = &filter.end {
            query.push(" AND timestamp <= ").push_bind(timestamp_to_sql(end));
        }
        if let Some(outcome) = filter.outcome {
            query.push(" AND outcome = ").push_bind(outcome.as_str());
        }
        query.push(" ORDER BY timestamp DESC, call_id DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_call_record).collect()
    }

    async fn clear(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM call_logs").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use freightdesk_core::domain::call::{CallId, CallOutcome, CallRecord, Sentiment};
    use freightdesk_core::domain::carrier::McNumber;
    use freightdesk_core::domain::load::LoadId;

    use super::SqlCallRecordRepository;
    use crate::repositories::{CallLogFilter, CallRecordRepository};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlCallRecordRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        SqlCallRecordRepository::new(pool)
    }

    fn record(id: &str, hours_ago: i64, outcome: CallOutcome, agreed: Option<i64>) -> CallRecord {
        let anchor = Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap();
        CallRecord {
            call_id: CallId(id.to_string()),
            carrier_mc: McNumber::parse("MC345678").expect("mc"),
            carrier_name: Some("Fast Freight".to_string()),
            timestamp: anchor - Duration::hours(hours_ago),
            load_id: Some(LoadId("LD003".to_string())),
            loadboard_rate: Some(Decimal::from(1800)),
            agreed_rate: agreed.map(Decimal::from),
            negotiation_rounds: 2,
            outcome,
            sentiment: Sentiment::Neutral,
            notes: Some("Carrier requested follow-up.".to_string()),
            call_duration_seconds: 240,
        }
    }

    #[tokio::test]
    async fn sql_call_repo_round_trip_preserves_decimals() {
        let repo = repository().await;
        let mut saved = record("CALL_SQL1", 1, CallOutcome::Negotiated, Some(1750));
        saved.agreed_rate = Some(Decimal::new(175050, 2));

        repo.save(saved.clone()).await.expect("save");
        let found = repo.find_by_id(&saved.call_id).await.expect("find").expect("present");

        assert_eq!(found, saved);
        assert!(repo.find_by_id(&CallId("CALL_NONE".to_string())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn save_upserts_on_call_id() {
        let repo = repository().await;
        repo.save(record("CALL_SQL1", 1, CallOutcome::Unknown, None)).await.expect("save");
        repo.save(record("CALL_SQL1", 1, CallOutcome::Negotiated, Some(1750))).await.expect("save");

        let all = repo.list(&CallLogFilter::default()).await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].outcome, CallOutcome::Negotiated);
    }

    #[tokio::test]
    async fn list_applies_window_outcome_and_limit() {
        let repo = repository().await;
        repo.save(record("CALL_A", 48, CallOutcome::Rejected, None)).await.expect("save");
        repo.save(record("CALL_B", 5, CallOutcome::Negotiated, Some(1750))).await.expect("save");
        repo.save(record("CALL_C", 1, CallOutcome::Negotiated, Some(1700))).await.expect("save");

        let anchor = Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap();
        let recent = repo
            .list(&CallLogFilter { start: Some(anchor - Duration::hours(24)), ..CallLogFilter::default() })
            .await
            .expect("list recent");
        let ids: Vec<_> = recent.iter().map(|record| record.call_id.0.as_str()).collect();
        assert_eq!(ids, vec!["CALL_C", "CALL_B"]);

        let rejected = repo
            .list(&CallLogFilter { outcome: Some(CallOutcome::Rejected), ..CallLogFilter::default() })
            .await
            .expect("list rejected");
        assert_eq!(rejected.len(), 1);

        let limited = repo.list(&CallLogFilter::with_limit(2)).await.expect("list limited");
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn stats_and_clear() {
        let repo = repository().await;
        repo.save(record("CALL_A", 3, CallOutcome::Rejected, None)).await.expect("save");
        repo.save(record("CALL_B", 2, CallOutcome::Negotiated, Some(1750))).await.expect("save");

        let stats = repo.stats(&CallLogFilter::default()).await.expect("stats");
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.outcome_count(CallOutcome::Negotiated), 1);
        assert_eq!(stats.averages.agreed_rate, Some(Decimal::from(1750)));

        assert_eq!(repo.clear().await.expect("clear"), 2);
        assert_eq!(repo.stats(&CallLogFilter::default()).await.expect("stats").total_calls, 0);
    }
}
