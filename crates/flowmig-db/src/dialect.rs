use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use flowmig_common::Error;

/// SQL variant used for the DDL and DML the engine generates itself.
///
/// Migration bodies are passed to the database untouched; only the tracking
/// table statements depend on the dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
    Mysql,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite3",
            Self::Mysql => "mysql",
        }
    }

    /// Schema a table lands in when no schema is configured. MySQL has no
    /// fixed default: unqualified names resolve against the current database.
    pub fn default_schema(self) -> Option<&'static str> {
        match self {
            Self::Postgres => Some("public"),
            Self::Sqlite => Some("main"),
            Self::Mysql => None,
        }
    }

    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::Mysql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    pub fn qualified_name(self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => {
                format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
            }
            _ => self.quote_ident(table),
        }
    }

    /// Bind marker for the `n`th (1-based) parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::Sqlite => format!("?{n}"),
            Self::Mysql => "?".to_string(),
        }
    }

    /// `CREATE SCHEMA` statement, or `None` where schemas cannot be created
    /// with SQL (SQLite schemas are attached databases).
    pub fn create_schema_sql(self, schema: &str) -> Option<String> {
        match self {
            Self::Postgres | Self::Mysql => Some(format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                self.quote_ident(schema)
            )),
            Self::Sqlite => None,
        }
    }

    pub fn create_tracking_table_sql(self, table: &str) -> String {
        let (id_type, applied_at_type) = match self {
            Self::Postgres => ("TEXT", "TIMESTAMP WITH TIME ZONE"),
            Self::Sqlite => ("TEXT", "TEXT"),
            Self::Mysql => ("VARCHAR(255)", "DATETIME(6)"),
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id {id_type} NOT NULL PRIMARY KEY,
                applied_at {applied_at_type} NOT NULL
            )"
        )
    }

    pub fn insert_tracking_sql(self, table: &str) -> String {
        let applied_at = match self {
            Self::Postgres => format!("CAST({} AS TIMESTAMP WITH TIME ZONE)", self.placeholder(2)),
            Self::Sqlite | Self::Mysql => self.placeholder(2),
        };
        format!(
            "INSERT INTO {table} (id, applied_at) VALUES ({}, {applied_at})",
            self.placeholder(1)
        )
    }

    /// Selects `(id, applied_at)` with `applied_at` rendered as text.
    pub fn select_tracking_sql(self, table: &str) -> String {
        let applied_at = match self {
            Self::Postgres => "CAST(applied_at AS TEXT)",
            Self::Sqlite => "applied_at",
            Self::Mysql => "CAST(applied_at AS CHAR)",
        };
        format!("SELECT id, {applied_at} FROM {table} ORDER BY applied_at, id")
    }

    pub fn format_timestamp(self, ts: DateTime<Utc>) -> String {
        match self {
            Self::Postgres | Self::Sqlite => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
            Self::Mysql => ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite3" | "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            other => Err(Error::Config(format!("unsupported dialect: {other}"))),
        }
    }
}

/// Parse an `applied_at` value as read back from any supported dialect.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // PostgreSQL renders timestamptz as "2024-01-01 10:00:00.5+00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .ok()
}
