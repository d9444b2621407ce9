use std::path::Path;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::warn;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS answer_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    answered_at TEXT NOT NULL,
    elapsed_ms INTEGER NOT NULL,
    status_code INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_answer_log_answered_at ON answer_log(answered_at);
"#;

/// Outcome and latency of every answered question.
pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn record(&self, elapsed_ms: u64, status_code: u16) {
        if let Err(e) = self.conn.execute(
            "INSERT INTO answer_log (answered_at, elapsed_ms, status_code)
             VALUES (datetime('now'), ?1, ?2)",
            params![elapsed_ms as i64, i64::from(status_code)],
        ) {
            warn!(error = %e, "failed to record answer");
        }
    }

    /// Aggregate the answers of the last `window_days` days.
    pub fn get_summary(&self, window_days: u32) -> MetricsSummary {
        let result = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(status_code <> 200), 0),
                COALESCE(AVG(elapsed_ms), 0),
                COALESCE(MAX(elapsed_ms), 0)
             FROM answer_log
             WHERE answered_at >= datetime('now', ?1)",
            params![days_ago(window_days)],
            |row| {
                Ok(MetricsSummary {
                    questions: row.get::<_, i64>(0)? as u64,
                    failures: row.get::<_, i64>(1)? as u64,
                    mean_answer_ms: row.get::<_, f64>(2)?.round() as u64,
                    slowest_answer_ms: row.get::<_, i64>(3)? as u64,
                })
            },
        );

        result.unwrap_or_else(|e| {
            warn!(error = %e, "failed to summarize answers");
            MetricsSummary::default()
        })
    }

    /// Drop answers older than `retention_days` days.
    pub fn cleanup(&self, retention_days: u32) {
        if let Err(e) = self.conn.execute(
            "DELETE FROM answer_log WHERE answered_at < datetime('now', ?1)",
            params![days_ago(retention_days)],
        ) {
            warn!(error = %e, "failed to prune answer log");
        }
    }
}

fn days_ago(days: u32) -> String {
    format!("-{days} days")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub questions: u64,
    pub failures: u64,
    pub mean_answer_ms: u64,
    pub slowest_answer_ms: u64,
}

impl MetricsSummary {
    /// Share of questions that did not get an answer, in percent.
    pub fn failure_rate(&self) -> f32 {
        if self.questions == 0 {
            return 0.0;
        }
        self.failures as f32 * 100.0 / self.questions as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        let store = MetricsStore::open_in_memory().unwrap();
        let summary = store.get_summary(7);
        assert_eq!(summary, MetricsSummary::default());
        assert_eq!(summary.failure_rate(), 0.0);
    }

    #[test]
    fn test_summary_counts_errors() {
        let store = MetricsStore::open_in_memory().unwrap();
        store.record(100, 200);
        store.record(300, 200);
        store.record(50, 503);
        store.record(150, 500);

        let summary = store.get_summary(7);
        assert_eq!(summary.questions, 4);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.mean_answer_ms, 150);
        assert_eq!(summary.slowest_answer_ms, 300);
        assert!((summary.failure_rate() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_cleanup_keeps_recent_rows() {
        let store = MetricsStore::open_in_memory().unwrap();
        store.record(10, 200);
        store.cleanup(7);
        assert_eq!(store.get_summary(7).questions, 1);
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.db");
        let store = MetricsStore::open(&path).unwrap();
        store.record(1, 200);
        assert!(path.exists());
    }
}
