use std::fmt;

use snafu::Snafu;
use tracing::debug;

/// Capacity of the fixed local byte region used for stack-backed buffers.
///
/// Buffers provisioned from the call frame are carved out of a region of this size, so no stack
/// threshold above this value can ever be honored. [`ProvisionPolicy`] clamps its threshold
/// accordingly.
pub const STACK_REGION_BYTES: usize = 4096;

/// Default maximum number of bytes provisioned from the call stack before falling back to the heap.
pub const DEFAULT_MAX_STACK_BYTES: usize = 1024;

/// A buffer provisioning error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ProvisionError {
    /// Heap storage for the buffer could not be reserved.
    #[snafu(display("failed to reserve {} bytes of heap storage", required))]
    AllocationFailed {
        /// Number of bytes that were requested.
        required: usize,
    },
}

/// The storage backing a scoped buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backing {
    /// The buffer lives in the enclosing call frame.
    Stack,

    /// The buffer lives in an owned heap region released when the operation returns.
    Heap,
}

/// An exactly-sized byte buffer scoped to a single [`ProvisionPolicy::with_buffer`] call.
///
/// Presents a uniform buffer-with-length view regardless of which backing is active. The buffer
/// cannot escape the operation it was provisioned for: its lifetime is bounded by the borrow
/// handed to the operation closure.
pub struct ScopedBuffer<'a> {
    bytes: &'a mut [u8],
    backing: Backing,
}

impl ScopedBuffer<'_> {
    /// Returns which storage this buffer is backed by.
    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Returns the capacity of the buffer, in bytes.
    ///
    /// This is always exactly the number of bytes that were requested, including the reserved
    /// terminator byte.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the buffer has zero capacity.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a mutable view of the underlying bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.bytes
    }

    /// Renders the given format arguments into the buffer, returning the rendered text.
    ///
    /// The returned string borrows from the buffer and is only valid while the buffer is alive.
    ///
    /// # Panics
    ///
    /// Panics if the rendered text does not fit the buffer. Callers are expected to size the
    /// buffer from [`measured_len`](crate::measured_len) over the same arguments, so an overflow
    /// here means the measurement and the rendering disagree, which is a bug rather than a
    /// runtime condition.
    pub fn write_formatted(&mut self, args: fmt::Arguments<'_>) -> &str {
        let capacity = self.bytes.len();
        let mut writer = SliceWriter {
            buf: &mut *self.bytes,
            written: 0,
        };
        if fmt::write(&mut writer, args).is_err() {
            panic!("rendered text exceeded the provisioned buffer ({} bytes)", capacity);
        }

        let written = writer.written;

        // SAFETY: `SliceWriter` only ever copies whole `&str` fragments into the buffer, so the
        // written prefix is always valid UTF-8.
        unsafe { std::str::from_utf8_unchecked(&self.bytes[..written]) }
    }
}

/// A `fmt::Write` adapter over a fixed byte slice that refuses writes past the end.
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.written + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }

        self.buf[self.written..end].copy_from_slice(s.as_bytes());
        self.written = end;
        Ok(())
    }
}

/// A policy for provisioning exactly-sized, operation-scoped byte buffers.
///
/// The policy decides, per request, whether a buffer of the required size may be carved out of
/// the call frame or must be placed on the heap. Requests at or below the configured
/// `max_stack_bytes` threshold run against a fixed local region and perform no heap allocation;
/// anything larger is provisioned from an owned heap region of exactly the required size, which
/// is released exactly once when the operation returns, on every exit path.
///
/// The threshold trades determinism for flexibility: stack-backed buffers cannot fragment a
/// shared heap but are bounded in size, while heap-backed buffers are unbounded at the cost of
/// fragmentation risk. Embedded callers tune the threshold per deployment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProvisionPolicy {
    max_stack_bytes: usize,
}

impl ProvisionPolicy {
    /// Creates a new `ProvisionPolicy` with the given stack threshold.
    ///
    /// The threshold is clamped to [`STACK_REGION_BYTES`], the capacity of the fixed local region
    /// backing stack-provisioned buffers.
    pub fn new(max_stack_bytes: usize) -> Self {
        Self {
            max_stack_bytes: max_stack_bytes.min(STACK_REGION_BYTES),
        }
    }

    /// Returns the configured stack threshold, in bytes.
    pub fn max_stack_bytes(&self) -> usize {
        self.max_stack_bytes
    }

    /// Updates the stack threshold.
    ///
    /// The threshold is clamped to [`STACK_REGION_BYTES`]. Takes effect for all subsequent
    /// [`with_buffer`](Self::with_buffer) calls.
    pub fn set_max_stack_bytes(&mut self, max_stack_bytes: usize) {
        self.max_stack_bytes = max_stack_bytes.min(STACK_REGION_BYTES);
    }

    /// Runs `op` against a buffer of exactly `required` bytes.
    ///
    /// If `required` is within the stack threshold, the buffer is carved out of a fixed local
    /// region and no heap allocation occurs. Otherwise, heap storage of exactly `required` bytes
    /// is reserved fallibly, and released when `op` returns regardless of its outcome.
    ///
    /// The buffer handed to `op` is zero-initialized and cannot outlive the call.
    ///
    /// # Errors
    ///
    /// If heap storage is needed and cannot be reserved, `Err(ProvisionError::AllocationFailed)`
    /// is returned and `op` is never invoked.
    pub fn with_buffer<T>(&self, required: usize, op: impl FnOnce(&mut ScopedBuffer<'_>) -> T) -> Result<T, ProvisionError> {
        if required <= self.max_stack_bytes {
            let mut region = [0u8; STACK_REGION_BYTES];
            let mut buffer = ScopedBuffer {
                bytes: &mut region[..required],
                backing: Backing::Stack,
            };
            Ok(op(&mut buffer))
        } else {
            debug!(
                required,
                max_stack_bytes = self.max_stack_bytes,
                "Required size exceeds stack threshold. Provisioning from heap."
            );

            let mut storage: Vec<u8> = Vec::new();
            if storage.try_reserve_exact(required).is_err() {
                return Err(ProvisionError::AllocationFailed { required });
            }
            storage.resize(required, 0);

            let mut buffer = ScopedBuffer {
                bytes: &mut storage[..],
                backing: Backing::Heap,
            };
            Ok(op(&mut buffer))
        }
    }
}

impl Default for ProvisionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STACK_BYTES)
    }
}
