use tracing::error;

/// Largest flow number that fits the 3 hex digit flow field (`fff`).
pub const FLOW_NUM_LIMIT: u32 = 0xFFF;

/// Largest step number accepted for the step field (`0ff`).
pub const STEP_NUM_LIMIT: u32 = 0xFF;

/// Build a migration ID from a prefix plus a flow and step number.
///
/// Both numbers are written as lowercase hex, zero padded to 3 digits, so the
/// suffix is always 6 characters: `make_id("rpm", 2, 1) == "rpm002001"`.
/// Number each flow file (001, 002, ...) and use the step number for follow-up
/// changes to the same tables, so a `CREATE TABLE` and its later `ALTER TABLE`
/// live side by side.
///
/// To get IDs that are valid UUIDs, drop the last 6 characters of a UUID and
/// use the rest as the prefix.
///
/// # Panics
///
/// Panics when `flow_num > FLOW_NUM_LIMIT` or `step_num > STEP_NUM_LIMIT`.
/// IDs are built from constants at registration time, so an out-of-range
/// number is a defect for tests to catch, not a runtime condition.
pub fn make_id(prefix: &str, flow_num: u32, step_num: u32) -> String {
    check_limits(flow_num, step_num);
    format!("{prefix}{flow_num:03x}{step_num:03x}")
}

fn check_limits(flow_num: u32, step_num: u32) {
    if flow_num > FLOW_NUM_LIMIT || step_num > STEP_NUM_LIMIT {
        error!(
            flow_num,
            step_num,
            flow_num_limit = FLOW_NUM_LIMIT,
            step_num_limit = STEP_NUM_LIMIT,
            "flow or step num exceeds limit"
        );
        panic!(
            "flow or step num exceeds limit: flow_num={flow_num} (max {FLOW_NUM_LIMIT}), \
             step_num={step_num} (max {STEP_NUM_LIMIT})"
        );
    }
}
