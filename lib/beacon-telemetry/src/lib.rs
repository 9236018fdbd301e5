//! Typed key/value records and bounded JSON aggregation.
//!
//! Devices report two kinds of data points: telemetry (time-series values, timestamped by the
//! server) and attributes (device or server-side state). Both are carried as named scalar values,
//! and both are shipped as a single JSON object per send.
//!
//! This crate owns the path from records to payload bytes:
//!
//! - [`DataPoint`] is one named scalar value, a tagged variant over boolean, integer, float, and
//!   text, with an explicit empty state for invalid construction;
//! - [`FieldAggregator`] folds an ordered sequence of records into one JSON document while
//!   enforcing the configured field budget;
//! - [`render_payload`] measures the finished document, provisions an exactly-sized buffer
//!   through `beacon-buffer`, serializes into it, and verifies the written length before handing
//!   the payload to the caller's operation.
//!
//! Every failure surfaces as a typed [`AggregateError`]; nothing in this crate retries.
#![deny(warnings)]
#![deny(missing_docs)]

mod record;
pub use self::record::{ContributeError, DataPoint, Value};

mod aggregate;
pub use self::aggregate::{render_payload, AggregateError, FieldAggregator, FieldLimit, DEFAULT_FIELD_LIMIT};
