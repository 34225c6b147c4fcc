use flowmig_common::{Error, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params_from_iter};

use crate::database::{Database, Executor, Transaction};
use crate::dialect::Dialect;

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn execute_script(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute_batch(sql).map_err(db_err)
}

fn execute_with(conn: &Connection, sql: &str, params: &[&str]) -> Result<usize> {
    conn.execute(sql, params_from_iter(params.iter()))
        .map_err(db_err)
}

/// NULL renders as an empty string, blobs as lossy UTF-8.
fn render(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn query_text(conn: &Connection, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(sql).map_err(db_err)?;
    let columns = stmt.column_count();

    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            (0..columns)
                .map(|i| row.get_ref(i).map(render))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .map_err(db_err)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(db_err)?);
    }
    Ok(out)
}

impl Executor for Connection {
    fn execute_script(&mut self, sql: &str) -> Result<()> {
        execute_script(self, sql)
    }

    fn execute_with(&mut self, sql: &str, params: &[&str]) -> Result<usize> {
        execute_with(self, sql, params)
    }

    fn query_text(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>> {
        query_text(self, sql, params)
    }
}

impl Database for Connection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>> {
        let tx = Connection::transaction(self).map_err(db_err)?;
        Ok(Box::new(tx))
    }
}

impl Executor for rusqlite::Transaction<'_> {
    fn execute_script(&mut self, sql: &str) -> Result<()> {
        execute_script(self, sql)
    }

    fn execute_with(&mut self, sql: &str, params: &[&str]) -> Result<usize> {
        execute_with(self, sql, params)
    }

    fn query_text(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>> {
        query_text(self, sql, params)
    }
}

impl Transaction for rusqlite::Transaction<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        rusqlite::Transaction::commit(*self).map_err(db_err)
    }
}
