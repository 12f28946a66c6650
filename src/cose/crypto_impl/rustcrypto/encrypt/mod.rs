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
use ciborium::Value;
use coset::iana::EnumI64;
use coset::{iana, CoseKey, Label};
use rand::{CryptoRng, RngCore};

use crate::cose::crypto_impl::rustcrypto::{CoseRustCryptoCipherError, RustCryptoContext};
use crate::cose::encrypted::{checked_key_length, AEAD_NONCE_LENGTH};
use crate::cose::{CoseSymmetricKey, EncryptCryptoBackend};
use crate::error::CoseCipherError;

mod aead;

impl From<::aead::Error> for CoseCipherError<CoseRustCryptoCipherError> {
    fn from(_value: ::aead::Error) -> Self {
        CoseCipherError::DataAuthenticationFailure
    }
}

/// Parses `key` and `iv` and checks them against the requirements of `alg`.
fn checked_inputs<'a>(
    alg: iana::Algorithm,
    key: &'a CoseKey,
    iv: &[u8],
) -> Result<&'a [u8], CoseCipherError<CoseRustCryptoCipherError>> {
    let key = CoseSymmetricKey::parse::<CoseRustCryptoCipherError>(key)?
        .with_length(checked_key_length(alg)?)?;
    if iv.len() != AEAD_NONCE_LENGTH {
        return Err(CoseCipherError::InvalidHeaderParam(
            Label::Int(iana::HeaderParameter::Iv.to_i64()),
            Value::Bytes(iv.to_vec()),
        ));
    }
    Ok(key)
}

impl<RNG: RngCore + CryptoRng> EncryptCryptoBackend for RustCryptoContext<RNG> {
    fn encrypt_aead(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        plaintext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let key = checked_inputs(alg, key, iv)?;
        Self::encrypt_with_alg(alg, key, plaintext, aad, iv)
    }

    fn decrypt_aead(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        ciphertext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let key = checked_inputs(alg, key, iv)?;
        Self::decrypt_with_alg(alg, key, ciphertext, aad, iv)
    }
}
