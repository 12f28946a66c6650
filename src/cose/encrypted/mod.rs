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

//! COSE_Encrypt0 and COSE_Encrypt messages.
//!
//! The content is encrypted using an AEAD algorithm (A128GCM, A192GCM, A256GCM or
//! ChaCha20/Poly1305), with the Enc_structure (RFC 9052, Section 5.3) as associated data.
//! For COSE_Encrypt0, the recipient already knows the content encryption key. For
//! COSE_Encrypt, the key is conveyed by one or more COSE_Recipient structures, see
//! [`recipient`](crate::cose::recipient).

use core::fmt::Display;

use ciborium::Value;
use coset::iana::EnumI64;
use coset::{iana, Label};

use crate::cose::message::MessageType;
use crate::cose::{cbor, unsupported, CryptoBackend};
use crate::error::CoseCipherError;

mod decoder;
mod encoder;


pub use decoder::EncryptDecoder;
pub use encoder::EncryptEncoder;

/// Length of the authentication tag appended by all supported AEAD algorithms.
pub const AEAD_TAG_LENGTH: usize = 16;

/// Length of the nonce used by all supported AEAD algorithms.
pub const AEAD_NONCE_LENGTH: usize = 12;

/// Returns the key length in bytes of a content encryption algorithm.
#[must_use]
pub fn content_key_length(alg: iana::Algorithm) -> Option<usize> {
    match alg {
        iana::Algorithm::A128GCM => Some(16),
        iana::Algorithm::A192GCM => Some(24),
        iana::Algorithm::A256GCM | iana::Algorithm::ChaCha20Poly1305 => Some(32),
        _ => None,
    }
}

pub(crate) fn checked_key_length<BE: Display>(
    alg: iana::Algorithm,
) -> Result<usize, CoseCipherError<BE>> {
    content_key_length(alg).ok_or_else(|| unsupported(alg))
}

/// Cryptographic backend capable of authenticated encryption.
///
/// All operations have default implementations that report the algorithm as unsupported.
pub trait EncryptCryptoBackend: CryptoBackend {
    /// Encrypts `plaintext` and returns the ciphertext with the authentication tag appended.
    ///
    /// # Errors
    ///
    /// If the algorithm is not supported or the key or IV do not fit the algorithm.
    #[allow(unused_variables)]
    fn encrypt_aead(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        plaintext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(alg))
    }

    /// Decrypts `ciphertext` (with the authentication tag appended).
    ///
    /// # Errors
    ///
    /// [`CoseCipherError::DataAuthenticationFailure`] if the authentication tag is invalid,
    /// other errors if the algorithm is not supported or the key or IV do not fit the
    /// algorithm.
    #[allow(unused_variables)]
    fn decrypt_aead(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        ciphertext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(alg))
    }
}

/// Builds the Enc_structure used as associated data.
pub(crate) fn enc_structure<BE: Display>(
    message_type: MessageType,
    protected: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CoseCipherError<BE>> {
    cbor::encode(&Value::Array(vec![
        Value::Text(message_type.context().to_string()),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(aad.to_vec()),
    ]))
}

/// Combines a partial IV with the base IV (RFC 9052, Section 3.1).
///
/// The partial IV is left-padded with zeros to the length of the base IV and XORed with it.
pub(crate) fn combine_partial_iv<BE: Display>(
    base_iv: &[u8],
    partial_iv: &[u8],
) -> Result<Vec<u8>, CoseCipherError<BE>> {
    if partial_iv.len() > base_iv.len() {
        return Err(CoseCipherError::InvalidHeaderParam(
            Label::Int(iana::HeaderParameter::PartialIv.to_i64()),
            Value::Bytes(partial_iv.to_vec()),
        ));
    }
    let offset = base_iv.len() - partial_iv.len();
    let mut iv = base_iv.to_vec();
    for (b, p) in iv[offset..].iter_mut().zip(partial_iv) {
        *b ^= p;
    }
    Ok(iv)
}
