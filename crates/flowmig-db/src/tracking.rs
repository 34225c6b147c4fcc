use std::collections::HashSet;

use chrono::{DateTime, Utc};
use flowmig_common::{Error, Result};

use crate::database::{Database, Executor};
use crate::dialect::{Dialect, parse_timestamp};

/// Default name of the table that records applied migration IDs.
pub const DEFAULT_TRACKING_TABLE: &str = "mig_applied_migrations";

/// One row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    pub id: String,
    /// `None` when the stored value is NULL or could not be parsed.
    pub applied_at: Option<DateTime<Utc>>,
}

/// Location of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingTable {
    pub table: String,
    pub schema: Option<String>,
}

impl Default for TrackingTable {
    fn default() -> Self {
        Self {
            table: DEFAULT_TRACKING_TABLE.to_string(),
            schema: None,
        }
    }
}

/// Split `"schema.table"` on the first `.`, trimming surrounding `"` from
/// both parts. A bare name yields no schema.
pub fn split_qualified(name: &str) -> (Option<String>, String) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(unquote(schema)), unquote(table)),
        None => (None, unquote(name)),
    }
}

fn unquote(s: &str) -> String {
    s.trim_matches('"').to_string()
}

impl TrackingTable {
    /// Schema the table lives in, falling back to the dialect's default.
    pub fn schema_name(&self, dialect: Dialect) -> &str {
        self.schema
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(dialect.default_schema())
            .unwrap_or("")
    }

    pub fn qualified(&self, dialect: Dialect) -> String {
        dialect.qualified_name(self.schema.as_deref(), &self.table)
    }

    /// Create the configured schema (where the dialect can) and the tracking
    /// table if either is missing.
    pub fn ensure<D: Database + ?Sized>(&self, db: &mut D, dialect: Dialect) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::Config("tracking table name is empty".to_string()));
        }
        if let Some(schema) = self.schema.as_deref().filter(|s| !s.is_empty()) {
            if let Some(sql) = dialect.create_schema_sql(schema) {
                db.execute_script(&sql)?;
            }
        }
        db.execute_script(&dialect.create_tracking_table_sql(&self.qualified(dialect)))
    }

    pub fn applied_records<E: Executor + ?Sized>(
        &self,
        db: &mut E,
        dialect: Dialect,
    ) -> Result<Vec<AppliedRecord>> {
        let rows = db.query_text(&dialect.select_tracking_sql(&self.qualified(dialect)), &[])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cols = row.into_iter();
                let id = cols.next()?;
                let applied_at = cols
                    .next()
                    .filter(|s| !s.is_empty())
                    .as_deref()
                    .and_then(parse_timestamp);
                Some(AppliedRecord { id, applied_at })
            })
            .collect())
    }

    pub fn applied_ids<E: Executor + ?Sized>(
        &self,
        db: &mut E,
        dialect: Dialect,
    ) -> Result<HashSet<String>> {
        Ok(self
            .applied_records(db, dialect)?
            .into_iter()
            .map(|r| r.id)
            .collect())
    }

    /// Insert the tracking row for `id`. Meant to run inside the same
    /// transaction as the step's `up` SQL.
    pub fn record<E: Executor + ?Sized>(
        &self,
        tx: &mut E,
        dialect: Dialect,
        id: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<()> {
        let sql = dialect.insert_tracking_sql(&self.qualified(dialect));
        let ts = dialect.format_timestamp(applied_at);
        tx.execute_with(&sql, &[id, &ts])?;
        Ok(())
    }
}
