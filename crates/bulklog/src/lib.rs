//! # Bulklog
//!
//! This crate provides a log-shipping adapter that accepts structured log
//! events from an application process and forwards them, batched, to a
//! document-indexing search backend over HTTP bulk writes.
//!
//! ## Overview
//!
//! The shipper implements a multi-stage pipeline:
//!
//! ```text
//!    Log Events
//!        │
//!        v
//!   ┌──────────────┐
//!   │  Document    │  (render templates, coerce fields,
//!   │  Builder     │   project exceptions, merge properties)
//!   └──────┬───────┘
//!          │ (metadata, document) pairs
//!          v
//!   ┌──────────────┐
//!   │    Batch     │  (assemble one bulk payload per call,
//!   │  Dispatcher  │   resolve every completion callback)
//!   └──────┬───────┘
//!          │ bulk payload
//!          v
//!   ┌──────────────┐
//!   │     Bulk     │  (HTTP POST, NDJSON, gzip, auth)
//!   │   Transport  │
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │ Search intake│
//!   └──────────────┘
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - [`document`]: Converts one event into an index-ready document plus
//!   its routing metadata
//! - [`dispatcher`]: Groups events into bulk payloads and reports the
//!   outcome back to every event's completion callback
//! - [`transport`]: The delivery collaborator contract and the default
//!   HTTP implementation
//! - [`connection`]: Connection-pool, authentication, proxy, and
//!   compression settings derived from configuration
//! - [`bounded_queue`]: Fixed-capacity FIFO buffer with drop-oldest
//!   eviction, usable for retry buffering
//! - [`retry`]: Bounded buffering of events that failed to ship
//!
//! ## Failure Policy
//!
//! Nothing in the dispatch path is allowed to escape into the hosting
//! process: transport failures, backend rejections, and template
//! rendering errors are all converted into per-event callback errors.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Fixed-capacity FIFO buffer with drop-oldest-on-overflow semantics
pub mod bounded_queue;

/// Configuration surface - endpoints, credentials, templates, field specs
pub mod config;

/// Connection-pool, authentication, proxy, and compression settings
pub mod connection;

/// Limits and defaults for the bulk intake API
pub mod constants;

/// Document construction - one event to one (metadata, document) pair
pub mod document;

/// Batch dispatch - bulk payload assembly and completion reporting
pub mod dispatcher;

/// Error taxonomy - configuration, queue, render, and shipping errors
pub mod error;

/// Log events, severity levels, and exception records
pub mod event;

/// Template rendering capability supplied by the host logging framework
pub mod render;

/// Bounded retry buffering for events that failed to ship
pub mod retry;

/// Delivery collaborator contract and the default HTTP implementation
pub mod transport;
