//! Schema changes for the rental property manager, one module per flow.
//!
//! Flow numbers are permanent: add new flows with the next number and add
//! follow-up changes to an existing table as new steps in its flow. Never edit
//! a step that has shipped.

mod properties;
mod tenants;

use flowmig_db::Flow;

pub use properties::flow001_properties;
pub use tenants::flow002_tenants;

const ID_PREFIX: &str = "rpm";

/// Every flow, in the order it must be applied.
pub fn all() -> Vec<Flow> {
    vec![flow001_properties(), flow002_tenants()]
}
