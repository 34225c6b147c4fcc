use flowmig_common::Result;

use crate::dialect::Dialect;

/// The SQL surface the engine needs from a connection or transaction.
///
/// Parameters and result columns travel as text; the engine only ever reads
/// and writes its own tracking table through this interface.
pub trait Executor {
    /// Run one or more `;`-separated statements with no parameters.
    fn execute_script(&mut self, sql: &str) -> Result<()>;

    /// Run a single statement with positional text parameters and return the
    /// number of affected rows.
    fn execute_with(&mut self, sql: &str, params: &[&str]) -> Result<usize>;

    /// Run a query and return every row with each column rendered as text.
    /// Numbers use their decimal form and NULL becomes an empty string.
    fn query_text(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Vec<String>>>;
}

/// An open transaction. Dropping it without calling `commit` rolls it back.
pub trait Transaction: Executor {
    fn commit(self: Box<Self>) -> Result<()>;
}

/// A database handle borrowed by the migration runner.
///
/// The runner never closes the handle; its owner does.
pub trait Database: Executor {
    /// Dialect of the underlying store, used unless the runner overrides it.
    fn dialect(&self) -> Dialect;

    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>>;
}
