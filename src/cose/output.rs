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

use core::fmt::Display;

use crate::error::CoseCipherError;

/// Destination of an encoding operation.
///
/// [`Output::SizeOnly`] computes the exact number of bytes the operation would produce
/// without performing cryptographic operations that are not needed to learn that size
/// (e.g. signatures are replaced by placeholders of the correct length).
#[derive(Debug)]
pub enum Output<'a> {
    /// Write the encoded message into this buffer.
    Buffer(&'a mut [u8]),
    /// Only compute the size of the encoded message.
    SizeOnly,
}

impl Output<'_> {
    /// Returns `true` if this output only computes sizes.
    #[must_use]
    pub fn is_size_only(&self) -> bool {
        matches!(self, Output::SizeOnly)
    }

    /// Places `encoded` into the output and returns its length.
    ///
    /// Nothing is written if the buffer is too small.
    pub(crate) fn write<BE: Display>(self, encoded: &[u8]) -> Result<usize, CoseCipherError<BE>> {
        match self {
            Output::SizeOnly => Ok(encoded.len()),
            Output::Buffer(buf) if buf.len() < encoded.len() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    needed = encoded.len(),
                    available = buf.len(),
                    "output buffer too small"
                );
                Err(CoseCipherError::BufferTooSmall {
                    needed: encoded.len(),
                    available: buf.len(),
                })
            }
            Output::Buffer(buf) => {
                buf[..encoded.len()].copy_from_slice(encoded);
                Ok(encoded.len())
            }
        }
    }
}
