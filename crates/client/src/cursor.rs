use std::cmp::Ordering;
use std::io::prelude::*;

use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use torii_proto::{Cursor, OrderDirection, Pagination, PaginationDirection};

use crate::error::TransportError;

/// A value a record can be ordered by.
///
/// Only values of the same variant are meaningfully compared; a field always
/// yields the same variant, or `Missing`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) enum SortValue {
    Missing,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Big endian bytes of wide integers and felts.
    Bytes(Vec<u8>),
    Text(String),
}

/// Position of a record in an ordered result set: its order by values and
/// its insertion sequence, which breaks ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Position {
    pub(crate) values: Vec<SortValue>,
    pub(crate) seq: u64,
}

impl Position {
    /// Compares two positions under `pagination`'s ordering and direction.
    pub(crate) fn cmp_with(&self, other: &Self, pagination: &Pagination) -> Ordering {
        let ordering = pagination
            .order_by
            .iter()
            .zip(self.values.iter().zip(&other.values))
            .map(|(order, (a, b))| match order.direction {
                OrderDirection::Asc => a.cmp(b),
                OrderDirection::Desc => b.cmp(a),
            })
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.seq.cmp(&other.seq));

        match pagination.direction {
            PaginationDirection::Forward => ordering,
            PaginationDirection::Backward => ordering.reverse(),
        }
    }

    pub(crate) fn to_cursor(&self) -> Result<Cursor, TransportError> {
        let json = serde_json::to_string(self)
            .map_err(|e| TransportError::InvalidQuery(format!("Cursor encoding error: {e}")))?;
        Ok(Cursor::new(encode_cursor(&json)?))
    }

    /// Decodes a cursor issued for a query ordered by `expected_len` fields.
    pub(crate) fn from_cursor(cursor: &Cursor, expected_len: usize) -> Result<Self, TransportError> {
        let json = decode_cursor(cursor.as_str())?;
        let position: Position = serde_json::from_str(&json)
            .map_err(|e| TransportError::InvalidQuery(format!("Invalid cursor: {e}")))?;

        if position.values.len() != expected_len {
            return Err(TransportError::InvalidQuery(
                "Invalid cursor values length".to_string(),
            ));
        }
        Ok(position)
    }
}

/// Compresses a string using Deflate and then encodes it using Base64 (no padding).
pub(crate) fn encode_cursor(value: &str) -> Result<String, TransportError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(value.as_bytes())
        .map_err(|e| TransportError::InvalidQuery(format!("Cursor compression error: {e}")))?;
    let compressed_bytes = encoder.finish().map_err(|e| {
        TransportError::InvalidQuery(format!("Cursor compression finish error: {e}"))
    })?;

    Ok(BASE64_URL_SAFE_NO_PAD.encode(compressed_bytes))
}

/// Decodes a Base64 (no padding) string and then decompresses it using Deflate.
pub(crate) fn decode_cursor(encoded_cursor: &str) -> Result<String, TransportError> {
    let compressed_cursor_bytes = BASE64_URL_SAFE_NO_PAD
        .decode(encoded_cursor)
        .map_err(|e| TransportError::InvalidQuery(format!("Base64 decode error: {e}")))?;

    let mut decoder = DeflateDecoder::new(&compressed_cursor_bytes[..]);
    let mut decompressed_str = String::new();
    decoder
        .read_to_string(&mut decompressed_str)
        .map_err(|e| TransportError::InvalidQuery(format!("Decompression error: {e}")))?;

    Ok(decompressed_str)
}
