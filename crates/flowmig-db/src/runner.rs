use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use flowmig_common::{Error, Result};
use tracing::debug;

use crate::database::{Database, Executor, Transaction};
use crate::dialect::Dialect;
use crate::logger::{Logger, TracingLogger};
use crate::migrations::{Flow, Step};
use crate::tracking::{TrackingTable, split_qualified};

/// Where a registered step stands against the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub id: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Applies registered flows to a borrowed database, each step at most once.
///
/// ```no_run
/// use flowmig_db::{Flow, Runner, Step, make_id};
///
/// let mut conn = rusqlite::Connection::open("app.db")?;
/// let users = Flow::default().step(Step::new(
///     make_id("app", 1, 1),
///     "CREATE TABLE IF NOT EXISTS users (id TEXT PRIMARY KEY)",
/// ));
///
/// let applied = Runner::new(&mut conn)
///     .with_tracking_table("main.schema_migrations")
///     .with_flows([users])
///     .up()?;
/// # let _ = applied;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// A runner owns its flows and gives them up on the first `up()`: the SQL text
/// is dropped once applied, and a second `up()` on the same runner is a
/// logged no-op. Build a new runner (with freshly built flows) to run again.
pub struct Runner<'db, D: Database + ?Sized> {
    db: &'db mut D,
    dialect: Dialect,
    tracking: TrackingTable,
    logger: Box<dyn Logger>,
    flows: Vec<Flow>,
}

impl<'db, D: Database + ?Sized> Runner<'db, D> {
    pub fn new(db: &'db mut D) -> Self {
        let dialect = db.dialect();
        Self {
            db,
            dialect,
            tracking: TrackingTable::default(),
            logger: Box::new(TracingLogger::default()),
            flows: Vec::new(),
        }
    }

    /// Register flows, appended after any already registered.
    pub fn with_flows(mut self, flows: impl IntoIterator<Item = Flow>) -> Self {
        self.flows.extend(flows);
        self
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Set the tracking table name. `"foo.migrations"` also sets the schema to
    /// `foo`; a bare name leaves the schema as it was. Surrounding `"` are
    /// trimmed from both parts. An empty table part (`"foo."`) keeps the
    /// current table name.
    pub fn with_tracking_table(mut self, name: &str) -> Self {
        let (schema, table) = split_qualified(name);
        if let Some(schema) = schema {
            self.tracking.schema = Some(schema);
        }
        if table.is_empty() {
            self.logger.warn(
                "empty tracking table name, keeping the current one",
                &[("table", &self.tracking.table)],
            );
        } else {
            self.tracking.table = table;
        }
        self
    }

    /// Schema the tracking table is created in. Created if missing where the
    /// dialect supports `CREATE SCHEMA`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.tracking.schema = Some(schema.into());
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn tracking_table(&self) -> &str {
        &self.tracking.table
    }

    pub fn schema(&self) -> Option<&str> {
        self.tracking.schema.as_deref()
    }

    /// Flows still waiting for `up()`.
    pub fn pending_flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Apply every registered step that is not yet tracked, in registration
    /// order, one transaction per step. Returns how many were applied.
    ///
    /// Stops at the first failing step and returns its error; steps committed
    /// before it stay applied.
    pub fn up(&mut self) -> Result<usize> {
        let steps = self.flatten();
        if steps.is_empty() {
            self.logger
                .warn("no migrations, was Up called more than once?", &[]);
            return Ok(0);
        }

        if let Some(id) = first_duplicate(&steps) {
            self.logger
                .error("migration id registered more than once", &[("id", &id)]);
            return Err(Error::DuplicateId(id.to_string()));
        }

        let dialect = self.dialect;
        let schema = self.tracking.schema_name(dialect).to_string();

        if let Err(e) = self.tracking.ensure(&mut *self.db, dialect) {
            self.logger.error(
                "failed to create tracking table",
                &[("table", &self.tracking.table), ("schema", &schema), ("error", &e)],
            );
            return Err(e);
        }
        let applied = self.tracking.applied_ids(&mut *self.db, dialect)?;
        debug!(
            registered = steps.len(),
            tracked = applied.len(),
            "loaded migration state"
        );

        let mut count = 0usize;
        for step in steps.into_iter().filter(|s| !applied.contains(&s.id)) {
            if let Err(e) = self.apply(&step) {
                self.logger
                    .error("migration failed", &[("id", &step.id), ("error", &e)]);
                return Err(e);
            }
            debug!(id = %step.id, "migration applied");
            count += 1;
        }

        self.logger.info(
            &format!("Applied {count} migrations in {schema} schema!"),
            &[("count", &count), ("schema", &schema)],
        );
        Ok(count)
    }

    /// Report applied/pending for every registered step. Does not consume the
    /// flows; creates the tracking table if it is missing.
    pub fn status(&mut self) -> Result<Vec<StepStatus>> {
        let dialect = self.dialect;
        self.tracking.ensure(&mut *self.db, dialect)?;
        let applied: HashMap<String, Option<DateTime<Utc>>> = self
            .tracking
            .applied_records(&mut *self.db, dialect)?
            .into_iter()
            .map(|r| (r.id, r.applied_at))
            .collect();

        Ok(self
            .flows
            .iter()
            .flat_map(Flow::steps)
            .map(|step| StepStatus {
                id: step.id.clone(),
                applied: applied.contains_key(&step.id),
                applied_at: applied.get(&step.id).copied().flatten(),
            })
            .collect())
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        let mut tx = self.db.begin()?;
        tx.execute_script(&step.up)?;
        self.tracking
            .record(&mut *tx, self.dialect, &step.id, Utc::now())?;
        tx.commit()
    }

    /// Move the registered flows out and return their steps in order.
    /// Leaves the runner with no flows, so a second call returns nothing.
    fn flatten(&mut self) -> Vec<Step> {
        std::mem::take(&mut self.flows)
            .into_iter()
            .flat_map(Flow::into_steps)
            .collect()
    }
}

fn first_duplicate(steps: &[Step]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(steps.len());
    steps
        .iter()
        .map(|s| s.id.as_str())
        .find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use super::*;
    use crate::logger::Fields;

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<(&'static str, String)>>,
    }

    impl RecordingLogger {
        fn push(&self, level: &'static str, msg: &str) {
            self.lines.lock().unwrap().push((level, msg.to_string()));
        }

        fn lines(&self) -> Vec<(&'static str, String)> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl Logger for RecordingLogger {
        fn info(&self, msg: &str, _: Fields<'_>) {
            self.push("info", msg);
        }
        fn warn(&self, msg: &str, _: Fields<'_>) {
            self.push("warn", msg);
        }
        fn error(&self, msg: &str, _: Fields<'_>) {
            self.push("error", msg);
        }
    }

    /// Each step logs its own ID so the application order can be read back.
    fn logging_step(id: &str) -> Step {
        Step::new(
            id,
            format!("CREATE TABLE IF NOT EXISTS step_log (n INTEGER PRIMARY KEY AUTOINCREMENT, id TEXT); INSERT INTO step_log (id) VALUES ('{id}');"),
        )
    }

    fn step_log(conn: &mut Connection) -> Vec<String> {
        conn.query_text("SELECT id FROM step_log ORDER BY n", &[])
            .unwrap()
            .into_iter()
            .map(|mut row| row.remove(0))
            .collect()
    }

    fn tracked(conn: &mut Connection) -> Vec<String> {
        let mut ids: Vec<_> = TrackingTable::default()
            .applied_ids(conn, Dialect::Sqlite)
            .unwrap()
            .into_iter()
            .collect();
        ids.sort();
        ids
    }

    fn two_flows() -> Vec<Flow> {
        vec![
            Flow::new([logging_step("f1s1"), logging_step("f1s2")]),
            Flow::new([logging_step("f2s1")]),
        ]
    }

    #[test]
    fn defaults() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = Runner::new(&mut conn);
        assert_eq!(runner.tracking_table(), "mig_applied_migrations");
        assert_eq!(runner.schema(), None);
        assert_eq!(runner.dialect(), Dialect::Sqlite);
        assert!(runner.pending_flows().is_empty());
    }

    #[test]
    fn tracking_table_qualification() {
        let mut conn = Connection::open_in_memory().unwrap();
        {
            let runner = Runner::new(&mut conn).with_tracking_table("foo.migrations");
            assert_eq!(runner.schema(), Some("foo"));
            assert_eq!(runner.tracking_table(), "migrations");

            let runner = runner.with_tracking_table("other");
            assert_eq!(runner.schema(), Some("foo"));
            assert_eq!(runner.tracking_table(), "other");
        }
        {
            let runner = Runner::new(&mut conn).with_tracking_table("migrations");
            assert_eq!(runner.schema(), None);
            assert_eq!(runner.tracking_table(), "migrations");
        }
        {
            let runner = Runner::new(&mut conn).with_tracking_table("\"s\".\"t\"");
            assert_eq!(runner.schema(), Some("s"));
            assert_eq!(runner.tracking_table(), "t");
        }
        {
            let runner = Runner::new(&mut conn)
                .with_tracking_table("a.t")
                .with_schema("b")
                .with_dialect(Dialect::Postgres);
            assert_eq!(runner.schema(), Some("b"));
            assert_eq!(runner.dialect(), Dialect::Postgres);
        }
    }

    #[test]
    fn empty_table_part_keeps_the_current_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        {
            let mut runner = Runner::new(&mut conn)
                .with_tracking_table("main.")
                .with_flows([Flow::new([logging_step("a")])]);
            assert_eq!(runner.schema(), Some("main"));
            assert_eq!(runner.tracking_table(), "mig_applied_migrations");
            assert_eq!(runner.up().unwrap(), 1);
        }
        {
            let runner = Runner::new(&mut conn)
                .with_tracking_table("custom")
                .with_tracking_table("");
            assert_eq!(runner.tracking_table(), "custom");
        }

        assert_eq!(tracked(&mut conn), ["a"]);
        let rows = conn
            .query_text("SELECT name FROM sqlite_master WHERE name = ''", &[])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn with_flows_appends() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = Runner::new(&mut conn)
            .with_flows([Flow::new([logging_step("a")])])
            .with_flows([Flow::new([logging_step("b")])]);
        assert_eq!(runner.pending_flows().len(), 2);
    }

    #[test]
    fn flatten_preserves_order_and_drains() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut runner = Runner::new(&mut conn).with_flows(two_flows());

        let ids: Vec<_> = runner.flatten().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["f1s1", "f1s2", "f2s1"]);
        assert!(runner.pending_flows().is_empty());
        assert!(runner.flatten().is_empty());
    }

    #[test]
    fn order_follows_registration_not_id() {
        let mut conn = Connection::open_in_memory().unwrap();
        let flows = vec![
            Flow::new([logging_step("zz"), logging_step("aa")]),
            Flow::new([logging_step("mm")]),
        ];
        let applied = Runner::new(&mut conn).with_flows(flows).up().unwrap();
        assert_eq!(applied, 3);
        assert_eq!(step_log(&mut conn), ["zz", "aa", "mm"]);
    }

    #[test]
    fn up_applies_all_steps_in_order() {
        let mut conn = Connection::open_in_memory().unwrap();
        let log = Arc::new(RecordingLogger::default());
        let applied = Runner::new(&mut conn)
            .with_logger(Arc::clone(&log))
            .with_flows(two_flows())
            .up()
            .unwrap();

        assert_eq!(applied, 3);
        assert_eq!(step_log(&mut conn), ["f1s1", "f1s2", "f2s1"]);
        assert_eq!(tracked(&mut conn), ["f1s1", "f1s2", "f2s1"]);
        assert_eq!(
            log.lines(),
            vec![("info", "Applied 3 migrations in main schema!".to_string())]
        );
    }

    #[test]
    fn second_up_on_same_runner_is_a_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let log = Arc::new(RecordingLogger::default());
        let mut runner = Runner::new(&mut conn)
            .with_logger(Arc::clone(&log))
            .with_flows(two_flows());

        assert_eq!(runner.up().unwrap(), 3);
        assert_eq!(runner.up().unwrap(), 0);
        assert_eq!(
            log.lines().last(),
            Some(&(
                "warn",
                "no migrations, was Up called more than once?".to_string()
            ))
        );
        drop(runner);

        assert_eq!(step_log(&mut conn).len(), 3);
    }

    #[test]
    fn nothing_registered_is_not_an_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(Runner::new(&mut conn).up().unwrap(), 0);

        // no tracking table is created for an empty run
        let rows = conn
            .query_text("SELECT name FROM sqlite_master WHERE type = 'table'", &[])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn new_runner_with_same_flows_applies_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(Runner::new(&mut conn).with_flows(two_flows()).up().unwrap(), 3);
        assert_eq!(Runner::new(&mut conn).with_flows(two_flows()).up().unwrap(), 0);
        assert_eq!(step_log(&mut conn), ["f1s1", "f1s2", "f2s1"]);
    }

    #[test]
    fn new_steps_are_applied_after_existing_ones() {
        let mut conn = Connection::open_in_memory().unwrap();
        Runner::new(&mut conn).with_flows(two_flows()).up().unwrap();

        let mut flows = two_flows();
        flows[0] = flows[0].clone().step(logging_step("f1s3"));
        flows.push(Flow::new([logging_step("f3s1")]));

        assert_eq!(Runner::new(&mut conn).with_flows(flows).up().unwrap(), 2);
        assert_eq!(step_log(&mut conn), ["f1s1", "f1s2", "f2s1", "f1s3", "f3s1"]);
    }

    #[test]
    fn failing_step_stops_the_run_and_resumes_later() {
        let mut conn = Connection::open_in_memory().unwrap();
        let broken = vec![Flow::new([
            logging_step("s1"),
            Step::new("s2", "CREATE TABLE broken (;"),
            logging_step("s3"),
        ])];

        let log = Arc::new(RecordingLogger::default());
        let err = Runner::new(&mut conn)
            .with_logger(Arc::clone(&log))
            .with_flows(broken)
            .up()
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)), "{err}");
        assert_eq!(log.lines()[0], ("error", "migration failed".to_string()));
        assert_eq!(tracked(&mut conn), ["s1"]);
        assert_eq!(step_log(&mut conn), ["s1"]);

        let fixed = vec![Flow::new([
            logging_step("s1"),
            logging_step("s2"),
            logging_step("s3"),
        ])];
        assert_eq!(Runner::new(&mut conn).with_flows(fixed).up().unwrap(), 2);
        assert_eq!(step_log(&mut conn), ["s1", "s2", "s3"]);
        assert_eq!(tracked(&mut conn), ["s1", "s2", "s3"]);
    }

    #[test]
    fn failed_tracking_insert_rolls_back_the_step() {
        let mut conn = Connection::open_in_memory().unwrap();
        // The step records its own ID first, the way a concurrent runner
        // would, so the runner's insert hits the primary key.
        let racing = Step::new(
            "race",
            "CREATE TABLE side_effect (x TEXT);
             INSERT INTO mig_applied_migrations (id, applied_at) VALUES ('race', '2024-01-01T00:00:00Z');",
        );

        let err = Runner::new(&mut conn)
            .with_flows([Flow::new([racing])])
            .up()
            .unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"), "{err}");

        assert!(tracked(&mut conn).is_empty());
        let rows = conn
            .query_text(
                "SELECT name FROM sqlite_master WHERE name = 'side_effect'",
                &[],
            )
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected_before_touching_the_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        let flows = vec![
            Flow::new([logging_step("dup")]),
            Flow::new([logging_step("other"), logging_step("dup")]),
        ];

        let err = Runner::new(&mut conn).with_flows(flows).up().unwrap_err();
        assert!(matches!(err, Error::DuplicateId(ref id) if id == "dup"));

        let rows = conn
            .query_text("SELECT name FROM sqlite_master WHERE type = 'table'", &[])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn epoch_timestamps_in_the_tracking_table_still_count_as_applied() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_script(
            "CREATE TABLE mig_applied_migrations (id TEXT NOT NULL PRIMARY KEY, applied_at DATETIME NOT NULL);
             INSERT INTO mig_applied_migrations VALUES ('x', 1700000000);",
        )
        .unwrap();

        let applied = Runner::new(&mut conn)
            .with_flows([Flow::new([logging_step("x"), logging_step("a")])])
            .up()
            .unwrap();

        assert_eq!(applied, 1);
        assert_eq!(step_log(&mut conn), ["a"]);
        assert_eq!(tracked(&mut conn), ["a", "x"]);
    }

    #[test]
    fn ids_tracked_by_other_modules_are_ignored() {
        let mut conn = Connection::open_in_memory().unwrap();
        Runner::new(&mut conn)
            .with_flows([Flow::new([logging_step("other001001")])])
            .up()
            .unwrap();

        assert_eq!(Runner::new(&mut conn).with_flows(two_flows()).up().unwrap(), 3);
        assert_eq!(tracked(&mut conn).len(), 4);
    }

    #[test]
    fn custom_table_in_attached_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_script("ATTACH DATABASE ':memory:' AS foo").unwrap();

        let log = Arc::new(RecordingLogger::default());
        Runner::new(&mut conn)
            .with_logger(Arc::clone(&log))
            .with_tracking_table("foo.migrations")
            .with_flows(two_flows())
            .up()
            .unwrap();

        let rows = conn
            .query_text("SELECT id FROM foo.migrations ORDER BY id", &[])
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            log.lines(),
            vec![("info", "Applied 3 migrations in foo schema!".to_string())]
        );
    }

    #[test]
    fn status_reports_applied_and_pending() {
        let mut conn = Connection::open_in_memory().unwrap();
        Runner::new(&mut conn)
            .with_flows([Flow::new([logging_step("f1s1")])])
            .up()
            .unwrap();

        let mut runner = Runner::new(&mut conn).with_flows(two_flows());
        let status = runner.status().unwrap();
        assert_eq!(runner.pending_flows().len(), 2);

        let summary: Vec<_> = status.iter().map(|s| (s.id.as_str(), s.applied)).collect();
        assert_eq!(summary, [("f1s1", true), ("f1s2", false), ("f2s1", false)]);
        assert!(status[0].applied_at.is_some());
        assert!(status[1].applied_at.is_none());
    }
}
