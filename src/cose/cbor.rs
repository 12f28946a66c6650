/*
 * Copyright (c) 2024 The NAMIB Project Developers.
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Thin adapter around [`ciborium`] used for all CBOR (de-)serialization in this crate.

use core::fmt::Display;

use ciborium::Value;

use crate::error::CoseCipherError;

/// Serializes a CBOR value.
pub(crate) fn encode<BE: Display>(value: &Value) -> Result<Vec<u8>, CoseCipherError<BE>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| CoseCipherError::EncodingFailure(e.to_string()))?;
    Ok(buf)
}

/// Deserializes exactly one CBOR value from `bytes`, rejecting trailing data.
pub(crate) fn decode<BE: Display>(bytes: &[u8]) -> Result<Value, CoseCipherError<BE>> {
    let mut remaining = bytes;
    let value: Value = ciborium::de::from_reader(&mut remaining)
        .map_err(|e| CoseCipherError::MalformedCbor(e.to_string()))?;
    if remaining.is_empty() {
        Ok(value)
    } else {
        Err(CoseCipherError::ExtraneousData)
    }
}

/// Unwraps a CBOR array of exactly `N` elements.
pub(crate) fn expect_array<BE: Display, const N: usize>(
    value: Value,
    context: &'static str,
) -> Result<[Value; N], CoseCipherError<BE>> {
    let error = CoseCipherError::UnexpectedItem {
        expected: "array of the correct length",
        context,
    };
    match value {
        Value::Array(items) => <[Value; N]>::try_from(items).map_err(|_| error),
        _ => Err(error),
    }
}

/// Unwraps a CBOR array of any length.
pub(crate) fn expect_any_array<BE: Display>(
    value: Value,
    context: &'static str,
) -> Result<Vec<Value>, CoseCipherError<BE>> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(CoseCipherError::UnexpectedItem {
            expected: "array",
            context,
        }),
    }
}

/// Unwraps a CBOR byte string.
pub(crate) fn expect_bytes<BE: Display>(
    value: Value,
    context: &'static str,
) -> Result<Vec<u8>, CoseCipherError<BE>> {
    match value {
        Value::Bytes(b) => Ok(b),
        _ => Err(CoseCipherError::UnexpectedItem {
            expected: "byte string",
            context,
        }),
    }
}

/// Unwraps a CBOR byte string or `null`.
pub(crate) fn expect_bytes_or_null<BE: Display>(
    value: Value,
    context: &'static str,
) -> Result<Option<Vec<u8>>, CoseCipherError<BE>> {
    match value {
        Value::Bytes(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        _ => Err(CoseCipherError::UnexpectedItem {
            expected: "byte string or null",
            context,
        }),
    }
}

/// Converts an array index to the `u8` used in header locations.
pub(crate) fn location_index<BE: Display>(
    index: usize,
    context: &'static str,
) -> Result<u8, CoseCipherError<BE>> {
    u8::try_from(index).map_err(|_| CoseCipherError::UnexpectedItem {
        expected: "at most 256 entries",
        context,
    })
}
