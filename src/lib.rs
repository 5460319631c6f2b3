//! Fulfillment Engine Library
//!
//! In-process engine for an order-fulfillment back office: customers place
//! orders, orders are split into shipping batches, batches are grouped into
//! shipments, and batches/shipments progress through configurable checkpoint
//! workflows. The engine keeps three coupled invariants consistent under
//! concurrent edits:
//!
//! - allocation accounting: quantities committed to batches never exceed the
//!   ordered quantity of a line;
//! - temporal configuration: order lines stay bound to the packaging version
//!   that was current when they were created;
//! - staged workflow progression: macro-status advances only when every
//!   checkpoint of the current phase is complete.
//!
//! Page rendering, authentication, file handling and rate sourcing are the
//! caller's problem; the boundary here is the typed service API under
//! [`services`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

pub use errors::ServiceError;
pub use services::fulfillment::FulfillmentEngine;
