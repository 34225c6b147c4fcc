use flowmig_db::{Flow, Step, make_id};

use super::ID_PREFIX;

pub fn flow002_tenants() -> Flow {
    Flow::new([
        Step::new(
            make_id(ID_PREFIX, 2, 1),
            "CREATE TABLE IF NOT EXISTS tenants (
                id          VARCHAR(36)  PRIMARY KEY,
                full_name   VARCHAR(128) NOT NULL,
                dl_num      VARCHAR(32)  NOT NULL,
                dl_state    VARCHAR(32)  NOT NULL,
                dob         DATE,

                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .with_down("DROP TABLE IF EXISTS tenants;"),
        Step::new(
            make_id(ID_PREFIX, 2, 2),
            "CREATE TABLE IF NOT EXISTS tenant_phones (
                row_num     INTEGER      PRIMARY KEY AUTOINCREMENT,
                tenant_id   VARCHAR(36)  NOT NULL REFERENCES tenants (id) ON DELETE CASCADE,
                phone_num   VARCHAR(32)  NOT NULL,
                note        VARCHAR(128) NOT NULL DEFAULT ''
            );
            CREATE UNIQUE INDEX IF NOT EXISTS tenant_phone_num ON tenant_phones (tenant_id, phone_num);",
        )
        .with_down("DROP TABLE IF EXISTS tenant_phones;"),
    ])
}
