//! Registry wire framing.
//!
//! Registry-governed payloads are framed with a magic byte and the big-endian
//! schema id; protobuf payloads additionally carry a zigzag-varint
//! message-index list between the id and the message body.

use crate::fleet::serialization::SerializationError;
use prost::encoding::{decode_varint, encode_varint};

/// Leading byte of every registry-framed payload.
pub const WIRE_MAGIC: u8 = 0;

/// Frame a payload with the magic byte and schema id.
pub fn encode_frame(schema_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(5 + payload.len());
    framed.push(WIRE_MAGIC);
    framed.extend_from_slice(&schema_id.to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Split a framed payload into its schema id and body.
pub fn decode_frame(bytes: &[u8]) -> Result<(u32, &[u8]), SerializationError> {
    if bytes.len() < 5 {
        return Err(SerializationError::DeserializationFailed(format!(
            "framed payload is {} bytes, need at least 5",
            bytes.len()
        )));
    }
    if bytes[0] != WIRE_MAGIC {
        return Err(SerializationError::DeserializationFailed(format!(
            "unknown magic byte {:#04x}",
            bytes[0]
        )));
    }
    let schema_id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    Ok((schema_id, &bytes[5..]))
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Append the message-index list for the first message type in the schema
/// (the only case this layer produces), encoded in its compact single-zero
/// form.
pub fn encode_default_message_indexes(buf: &mut Vec<u8>) {
    encode_varint(zigzag_encode(0), buf);
}

/// Skip the message-index list of a protobuf payload body, returning the
/// message bytes.
pub fn skip_message_indexes(mut body: &[u8]) -> Result<&[u8], SerializationError> {
    let count = zigzag_decode(
        decode_varint(&mut body)
            .map_err(|e| SerializationError::deserialize_error("bad message-index count", e))?,
    );
    if count < 0 {
        return Err(SerializationError::DeserializationFailed(format!(
            "negative message-index count {}",
            count
        )));
    }
    for _ in 0..count {
        decode_varint(&mut body)
            .map_err(|e| SerializationError::deserialize_error("bad message index", e))?;
    }
    Ok(body)
}

/// Read a varint from the front of a buffer.
pub fn read_varint(buf: &mut &[u8]) -> Result<u64, SerializationError> {
    decode_varint(buf).map_err(|e| SerializationError::deserialize_error("bad varint", e))
}

/// Append a varint to a buffer.
pub fn write_varint(value: u64, buf: &mut Vec<u8>) {
    encode_varint(value, buf);
}
