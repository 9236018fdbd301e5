use std::io;

use beacon_buffer::{measured_json_len, ProvisionError, ProvisionPolicy};
use serde_json::{Map, Value as JsonValue};
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::{debug, error};

use crate::record::{ContributeError, DataPoint};

/// Default maximum number of fields in one aggregated payload.
pub const DEFAULT_FIELD_LIMIT: usize = 8;

/// An aggregation or payload rendering error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum AggregateError {
    /// More records were supplied than the configured field budget allows.
    #[snafu(display("too many fields for a single payload ({} fields, limit {})", fields, limit))]
    CapacityExceeded {
        /// Number of records supplied.
        fields: usize,

        /// Configured field budget.
        limit: usize,
    },

    /// No non-empty records were supplied, so there is nothing to serialize.
    #[snafu(display("no non-empty records to aggregate"))]
    NothingToSend,

    /// A record's value could not be added to the document.
    #[snafu(display("failed to serialize record '{}': {}", key, source))]
    RecordSerialization {
        /// Key of the offending record.
        key: String,

        /// Underlying contribution failure.
        source: ContributeError,
    },

    /// The document could not be serialized.
    #[snafu(display("failed to serialize payload: {}", source))]
    PayloadSerialization {
        /// Underlying serialization failure.
        source: serde_json::Error,
    },

    /// Fewer bytes were written than the measured payload size.
    #[snafu(display("serialized payload was truncated ({} of {} bytes written)", written, expected))]
    PayloadTruncated {
        /// Number of bytes actually written.
        written: usize,

        /// Number of bytes the measurement called for.
        expected: usize,
    },

    /// The serialized payload was not valid UTF-8.
    #[snafu(display("serialized payload was not valid UTF-8"))]
    MalformedPayload,

    /// The payload buffer could not be provisioned.
    #[snafu(display("failed to provision payload buffer: {}", source))]
    BufferProvisioning {
        /// Underlying provisioning failure.
        source: ProvisionError,
    },
}

/// An upper bound on the number of fields in one aggregated payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldLimit {
    /// At most the given number of fields per payload.
    Bounded(usize),

    /// No bound. Payload size is limited only by available memory.
    Unbounded,
}

impl Default for FieldLimit {
    fn default() -> Self {
        Self::Bounded(DEFAULT_FIELD_LIMIT)
    }
}

/// Folds ordered sequences of data points into single JSON documents.
///
/// The field budget is fixed at construction: a bounded aggregator rejects oversized inputs
/// before any serialization work begins, while an unbounded one accepts inputs of any length.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FieldAggregator {
    limit: FieldLimit,
}

impl FieldAggregator {
    /// Creates a new `FieldAggregator` with the given field budget.
    pub fn new(limit: FieldLimit) -> Self {
        Self { limit }
    }

    /// Returns the configured field budget.
    pub fn limit(&self) -> FieldLimit {
        self.limit
    }

    /// Aggregates the given records into a single JSON document.
    ///
    /// Empty records are skipped silently and do not count against the budget's success: a
    /// document is produced as long as at least one record is non-empty. Field order in the
    /// document follows input order.
    ///
    /// # Errors
    ///
    /// Fails with `CapacityExceeded` if more records are supplied than the budget allows
    /// (checked against the raw input length, before any serialization), with
    /// `RecordSerialization` if any record's value cannot be represented, and with
    /// `NothingToSend` if no record survives to the document.
    pub fn aggregate(&self, records: &[DataPoint<'_>]) -> Result<JsonValue, AggregateError> {
        if let FieldLimit::Bounded(limit) = self.limit {
            if records.len() > limit {
                error!(fields = records.len(), limit, "Too many fields for a single payload.");
                return Err(AggregateError::CapacityExceeded {
                    fields: records.len(),
                    limit,
                });
            }
        }

        let mut fields = Map::new();
        for record in records {
            if record.is_empty() {
                continue;
            }

            record.contribute(&mut fields).map_err(|source| {
                error!(key = record.key(), "Failed to serialize record value.");
                AggregateError::RecordSerialization {
                    key: record.key().to_string(),
                    source,
                }
            })?;
        }

        if fields.is_empty() {
            debug!("No non-empty records to aggregate. Nothing to send.");
            return Err(AggregateError::NothingToSend);
        }

        Ok(JsonValue::Object(fields))
    }
}

/// Serializes the given document into an exactly-sized scoped buffer and runs `op` on the result.
///
/// The document is measured first, a buffer of the measured size is provisioned through the given
/// policy, and the document is serialized into it. The written length is verified against the
/// measurement: a write shorter than the measured length (minus the reserved terminator byte) is
/// a truncated, never partially-valid, payload and fails the operation. The payload string handed
/// to `op` borrows from the buffer and is only valid for the duration of the callback.
///
/// Repeating this with the same document yields byte-identical payloads.
///
/// # Errors
///
/// Fails if the document cannot be measured or serialized, if the buffer cannot be provisioned,
/// or if the written length falls short of the measurement.
pub fn render_payload<T>(
    policy: &ProvisionPolicy, document: &JsonValue, op: impl FnOnce(&str) -> T,
) -> Result<T, AggregateError> {
    let required = measured_json_len(document).context(PayloadSerialization)?;

    policy
        .with_buffer(required, |buffer| {
            let mut cursor = io::Cursor::new(buffer.as_mut_slice());
            serde_json::to_writer(&mut cursor, document).context(PayloadSerialization)?;

            let written = cursor.position() as usize;
            let bytes = cursor.into_inner();

            // The measured size reserves one byte for a trailing NUL, so a complete write lands
            // exactly one byte short of it. Anything shorter is truncation.
            if written < required - 1 {
                error!(written, expected = required - 1, "Serialized payload shorter than measured size.");
                return PayloadTruncated {
                    written,
                    expected: required - 1,
                }
                .fail();
            }

            let payload = std::str::from_utf8(&bytes[..written]).ok().context(MalformedPayload)?;
            Ok(op(payload))
        })
        .context(BufferProvisioning)?
}

#[cfg(test)]
mod tests {
    use beacon_buffer::Backing;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn bounded(limit: usize) -> FieldAggregator {
        FieldAggregator::new(FieldLimit::Bounded(limit))
    }

    #[test]
    fn aggregates_mixed_records_in_order() {
        let records = [
            DataPoint::float("temp", 21.5),
            DataPoint::bool("on", true),
            DataPoint::integer("count", 7),
            DataPoint::text("mode", "eco"),
        ];

        let document = bounded(8).aggregate(&records).unwrap();
        assert_eq!(document, json!({ "temp": 21.5, "on": true, "count": 7, "mode": "eco" }));
        assert_eq!(
            serde_json::to_string(&document).unwrap(),
            r#"{"temp":21.5,"on":true,"count":7,"mode":"eco"}"#
        );
    }

    #[test]
    fn capacity_exceeded_before_any_serialization() {
        let records: Vec<_> = (0..9).map(|_| DataPoint::float("temp", 21.5)).collect();

        let result = bounded(8).aggregate(&records);
        assert!(matches!(result, Err(AggregateError::CapacityExceeded { fields: 9, limit: 8 })));
    }

    #[test]
    fn capacity_counts_raw_input_including_empty_records() {
        let mut records = vec![DataPoint::float("temp", 21.5)];
        records.extend((0..8).map(|_| DataPoint::empty()));

        let result = bounded(8).aggregate(&records);
        assert!(matches!(result, Err(AggregateError::CapacityExceeded { fields: 9, limit: 8 })));
    }

    #[test]
    fn unbounded_accepts_any_length() {
        let keys: Vec<String> = (0..100).map(|i| format!("field{}", i)).collect();
        let records: Vec<_> = keys.iter().map(|key| DataPoint::integer(key, 1)).collect();

        let document = FieldAggregator::new(FieldLimit::Unbounded).aggregate(&records).unwrap();
        assert_eq!(document.as_object().unwrap().len(), 100);
    }

    #[test]
    fn empty_records_skipped_silently() {
        let records = [DataPoint::empty(), DataPoint::bool("on", true), DataPoint::empty()];

        let document = bounded(8).aggregate(&records).unwrap();
        assert_eq!(document, json!({ "on": true }));
    }

    #[test]
    fn all_empty_is_nothing_to_send() {
        let records = [DataPoint::empty(), DataPoint::empty()];
        assert!(matches!(bounded(8).aggregate(&records), Err(AggregateError::NothingToSend)));
        assert!(matches!(bounded(8).aggregate(&[]), Err(AggregateError::NothingToSend)));
    }

    #[test]
    fn non_finite_float_fails_aggregation() {
        let records = [DataPoint::float("temp", f64::NAN)];
        let result = bounded(8).aggregate(&records);
        assert!(matches!(result, Err(AggregateError::RecordSerialization { .. })));
    }

    #[test]
    fn rendered_payload_matches_measured_size() {
        let records = [DataPoint::float("temp", 21.5), DataPoint::bool("on", true)];
        let document = bounded(8).aggregate(&records).unwrap();

        let required = measured_json_len(&document).unwrap();
        assert_eq!(required, serde_json::to_string(&document).unwrap().len() + 1);

        let policy = ProvisionPolicy::default();
        let payload = render_payload(&policy, &document, |payload| payload.to_string()).unwrap();
        assert_eq!(payload.len(), required - 1);
        assert_eq!(payload, r#"{"temp":21.5,"on":true}"#);
    }

    #[test]
    fn rendering_is_deterministic() {
        let records = [DataPoint::float("temp", 21.5), DataPoint::text("mode", "eco")];
        let policy = ProvisionPolicy::default();

        let aggregator = bounded(8);
        let first = render_payload(&policy, &aggregator.aggregate(&records).unwrap(), |p| p.to_string()).unwrap();
        let second = render_payload(&policy, &aggregator.aggregate(&records).unwrap(), |p| p.to_string()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn large_payload_renders_through_heap_backing() {
        let text = "x".repeat(2048);
        let records = [DataPoint::text("blob", &text)];
        let document = bounded(8).aggregate(&records).unwrap();

        let policy = ProvisionPolicy::new(64);
        let required = measured_json_len(&document).unwrap();
        assert!(required > policy.max_stack_bytes());

        let observed = policy
            .with_buffer(required, |buffer| buffer.backing())
            .unwrap();
        assert_eq!(observed, Backing::Heap);

        let payload = render_payload(&policy, &document, |payload| payload.to_string()).unwrap();
        assert_eq!(payload.len(), required - 1);
    }

    proptest! {
        #[test]
        fn property_field_count_matches_non_empty_records(values in proptest::collection::vec(any::<i64>(), 0..8), empties in 0usize..4) {
            let keys: Vec<String> = (0..values.len()).map(|i| format!("k{}", i)).collect();
            let mut records: Vec<DataPoint<'_>> = keys
                .iter()
                .zip(values.iter())
                .map(|(key, value)| DataPoint::integer(key, *value))
                .collect();
            records.extend((0..empties).map(|_| DataPoint::empty()));

            let result = FieldAggregator::new(FieldLimit::Unbounded).aggregate(&records);
            if values.is_empty() {
                prop_assert!(matches!(result, Err(AggregateError::NothingToSend)));
            } else {
                let document = result.unwrap();
                let fields = document.as_object().unwrap();
                prop_assert_eq!(fields.len(), values.len());
                let ordered: Vec<&String> = fields.keys().collect();
                prop_assert_eq!(ordered, keys.iter().collect::<Vec<_>>());
            }
        }
    }
}
