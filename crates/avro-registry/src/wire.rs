//! Registry wire framing.
//!
//! Layout: `[0x00][schema id, 4 bytes big-endian][avro body]`.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Leading byte of every framed payload.
pub const MAGIC_BYTE: u8 = 0x00;

/// Magic byte plus schema id.
pub const HEADER_LEN: usize = 5;

/// Prefix an Avro body with the magic byte and schema id.
pub fn frame(schema_id: i32, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.put_u8(MAGIC_BYTE);
    buf.put_i32(schema_id);
    buf.put_slice(body);
    buf
}

/// Split a framed payload into its schema id and Avro body.
pub fn unframe(payload: &[u8]) -> Result<(i32, &[u8])> {
    if payload.len() < HEADER_LEN {
        return Err(Error::Malformed(format!(
            "payload of {} bytes is too short to carry a schema id",
            payload.len()
        )));
    }
    if payload[0] != MAGIC_BYTE {
        return Err(Error::Malformed(format!(
            "invalid magic byte: expected 0x00, got 0x{:02x}",
            payload[0]
        )));
    }

    let mut id_bytes = &payload[1..HEADER_LEN];
    let schema_id = id_bytes.get_i32();
    Ok((schema_id, &payload[HEADER_LEN..]))
}
