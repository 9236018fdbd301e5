//! Exact size measurement and scoped buffer provisioning.
//!
//! ## Overview
//!
//! Device payloads are written into buffers that are sized exactly, never grown. That requires
//! knowing, up front, how many bytes a rendered string or a serialized JSON document will occupy,
//! and it requires deciding where a buffer of that size may live: small payloads belong on the
//! call stack (deterministic, no fragmentation), while anything larger must come from the heap so
//! that a few-kilobyte task stack is never overflowed.
//!
//! This crate provides both halves:
//!
//! - measurement: dry-run length computation for formatted text ([`measured_len`]) and for JSON
//!   documents ([`measured_json_len`]), with one byte reserved for a trailing NUL to keep byte
//!   accounting compatible with C string consumers;
//! - provisioning: [`ProvisionPolicy`], which runs an operation against a [`ScopedBuffer`] backed
//!   by either a fixed local byte region or an exactly-sized heap region, chosen against a
//!   caller-configured stack threshold. The buffer never outlives the operation, and the heap
//!   path releases its storage exactly once on every exit path.
#![deny(warnings)]
#![deny(missing_docs)]

mod estimate;
pub use self::estimate::{measured_json_len, measured_len};

mod scoped;
pub use self::scoped::{
    Backing, ProvisionError, ProvisionPolicy, ScopedBuffer, DEFAULT_MAX_STACK_BYTES, STACK_REGION_BYTES,
};
