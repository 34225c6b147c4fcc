use flowmig_db::{Flow, Step, make_id};

use super::ID_PREFIX;

pub fn flow001_properties() -> Flow {
    Flow::new([Step::new(
        make_id(ID_PREFIX, 1, 1),
        "CREATE TABLE IF NOT EXISTS properties (
            id         VARCHAR(36)  PRIMARY KEY,
            street     VARCHAR(255) NOT NULL,
            city       VARCHAR(32)  NOT NULL,
            state      VARCHAR(32)  NOT NULL,
            zip        VARCHAR(10)  NOT NULL,

            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .with_down("DROP TABLE IF EXISTS properties;")])
}
