//! Event decoder for recognition records.
//!
//! Payloads are Avro-encoded `RecognitionEvent` records, normally framed in the
//! schema-registry wire format: a zero magic byte, a 4-byte big-endian schema id
//! and the Avro binary datum.

use apache_avro::{from_avro_datum, from_value, to_avro_datum, types::Record, Schema};
use recognition_indexer_shared::RecognitionEvent;
use tracing::{debug, warn};

use crate::consumer::messages::RawMessage;
use crate::errors::IngestError;

/// Avro schema of the `RecognitionEvent` record written by producers.
pub const RECOGNITION_EVENT_SCHEMA: &str = r#"
{
    "type": "record",
    "name": "RecognitionEvent",
    "namespace": "com.recognition",
    "fields": [
        { "name": "timestamp", "type": "long" },
        { "name": "source", "type": "string" },
        { "name": "uniqueId", "type": "string" },
        { "name": "lat", "type": "double" },
        { "name": "lon", "type": "double" },
        { "name": "type", "type": "string" },
        { "name": "confidence", "type": "float" }
    ]
}
"#;

/// Magic byte that prefixes schema-registry framed payloads.
const MAGIC_BYTE: u8 = 0;

/// Magic byte plus 4-byte schema id.
const HEADER_LEN: usize = 5;

/// Turns a raw broker record into a typed event.
///
/// Returns `None` for records that cannot be decoded; the pipeline drops them from
/// the batch.
pub trait EventDecoder: Send + Sync {
    fn decode(&self, message: &RawMessage) -> Option<RecognitionEvent>;
}

/// How payloads are framed on the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Magic byte, schema id, then the Avro datum.
    SchemaRegistry,
    /// The Avro datum only.
    Bare,
}

/// Decodes Avro `RecognitionEvent` payloads.
pub struct AvroEventDecoder {
    schema: Schema,
    wire_format: WireFormat,
}

impl AvroEventDecoder {
    /// Create a decoder for schema-registry framed payloads.
    pub fn new() -> Result<Self, IngestError> {
        Self::with_wire_format(WireFormat::SchemaRegistry)
    }

    /// Create a decoder for the given framing.
    pub fn with_wire_format(wire_format: WireFormat) -> Result<Self, IngestError> {
        let schema = Schema::parse_str(RECOGNITION_EVENT_SCHEMA)?;
        Ok(Self {
            schema,
            wire_format,
        })
    }

    /// Decode a payload into an event.
    pub fn decode_payload(&self, payload: &[u8]) -> Result<RecognitionEvent, IngestError> {
        let mut datum = match self.wire_format {
            WireFormat::Bare => payload,
            WireFormat::SchemaRegistry => {
                if payload.len() < HEADER_LEN {
                    return Err(IngestError::parse(format!(
                        "Payload of {} bytes is shorter than the schema registry header",
                        payload.len()
                    )));
                }
                if payload[0] != MAGIC_BYTE {
                    return Err(IngestError::parse(format!(
                        "Unknown magic byte {}",
                        payload[0]
                    )));
                }
                let schema_id =
                    u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
                debug!(schema_id = schema_id, "Decoding schema registry payload");
                &payload[HEADER_LEN..]
            }
        };

        let value = from_avro_datum(&self.schema, &mut datum, None)?;
        let event = from_value::<RecognitionEvent>(&value)?;
        Ok(event)
    }

    /// Encode an event in this decoder's wire format.
    ///
    /// `schema_id` is written into the header for schema-registry framing and
    /// ignored otherwise.
    pub fn encode(&self, event: &RecognitionEvent, schema_id: u32) -> Result<Vec<u8>, IngestError> {
        let mut record = Record::new(&self.schema)
            .ok_or_else(|| IngestError::parse("RecognitionEvent schema is not a record"))?;
        record.put("timestamp", event.timestamp);
        record.put("source", event.source.as_str());
        record.put("uniqueId", event.unique_id.as_str());
        record.put("lat", event.lat);
        record.put("lon", event.lon);
        record.put("type", event.kind.as_str());
        record.put("confidence", event.confidence);

        let datum = to_avro_datum(&self.schema, record)?;

        match self.wire_format {
            WireFormat::Bare => Ok(datum),
            WireFormat::SchemaRegistry => {
                let mut framed = Vec::with_capacity(HEADER_LEN + datum.len());
                framed.push(MAGIC_BYTE);
                framed.extend_from_slice(&schema_id.to_be_bytes());
                framed.extend_from_slice(&datum);
                Ok(framed)
            }
        }
    }
}

impl EventDecoder for AvroEventDecoder {
    fn decode(&self, message: &RawMessage) -> Option<RecognitionEvent> {
        let Some(payload) = message.payload.as_deref() else {
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Dropping message with empty payload"
            );
            return None;
        };

        match self.decode_payload(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Dropping message that failed to decode"
                );
                None
            }
        }
    }
}
