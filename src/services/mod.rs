//! Engine services. [`fulfillment::FulfillmentEngine`] is the façade external
//! collaborators call; the others are its parts and are usable standalone.

pub mod allocations;
pub mod fulfillment;
pub mod packaging_versions;
pub mod pricing;
pub mod summaries;
pub mod workflow;
