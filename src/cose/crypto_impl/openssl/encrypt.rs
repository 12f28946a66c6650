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
use openssl::cipher::{Cipher, CipherRef};
use openssl::cipher_ctx::CipherCtx;

use crate::cose::crypto_impl::openssl::{CoseOpensslCipherError, OpensslContext};
use crate::cose::encrypted::{checked_key_length, AEAD_NONCE_LENGTH, AEAD_TAG_LENGTH};
use crate::cose::{unsupported, CoseSymmetricKey, EncryptCryptoBackend};
use crate::error::CoseCipherError;

type Error = CoseCipherError<CoseOpensslCipherError>;

fn algorithm_to_cipher(alg: iana::Algorithm) -> Result<&'static CipherRef, Error> {
    match alg {
        iana::Algorithm::A128GCM => Ok(Cipher::aes_128_gcm()),
        iana::Algorithm::A192GCM => Ok(Cipher::aes_192_gcm()),
        iana::Algorithm::A256GCM => Ok(Cipher::aes_256_gcm()),
        iana::Algorithm::ChaCha20Poly1305 => Ok(Cipher::chacha20_poly1305()),
        v => Err(unsupported(v)),
    }
}

/// Parses `key` and `iv` and checks them against the requirements of `alg`.
fn checked_inputs<'a>(alg: iana::Algorithm, key: &'a CoseKey, iv: &[u8]) -> Result<&'a [u8], Error> {
    let key = CoseSymmetricKey::parse::<CoseOpensslCipherError>(key)?
        .with_length(checked_key_length(alg)?)?;
    if iv.len() != AEAD_NONCE_LENGTH {
        return Err(CoseCipherError::InvalidHeaderParam(
            Label::Int(iana::HeaderParameter::Iv.to_i64()),
            Value::Bytes(iv.to_vec()),
        ));
    }
    Ok(key)
}

impl EncryptCryptoBackend for OpensslContext {
    fn encrypt_aead(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        plaintext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let key = checked_inputs(alg, key, iv)?;
        let cipher = algorithm_to_cipher(alg)?;
        let mut ctx = CipherCtx::new()?;
        // See https://wiki.openssl.org/index.php/EVP_Authenticated_Encryption_and_Decryption
        // for the required order of operations.
        ctx.encrypt_init(Some(cipher), None, None)?;
        // The IV length must be set before key and IV.
        ctx.set_iv_length(iv.len())?;
        ctx.encrypt_init(None, Some(key), Some(iv))?;
        // AAD must be provided before the plaintext.
        ctx.cipher_update(aad, None)?;
        let mut ciphertext = Vec::with_capacity(plaintext.len() + AEAD_TAG_LENGTH);
        ctx.cipher_update_vec(plaintext, &mut ciphertext)?;
        ctx.cipher_final_vec(&mut ciphertext)?;
        let ciphertext_len = ciphertext.len();
        ciphertext.resize(ciphertext_len + AEAD_TAG_LENGTH, 0u8);
        ctx.tag(&mut ciphertext[ciphertext_len..])?;
        Ok(ciphertext)
    }

    fn decrypt_aead(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        ciphertext_with_tag: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let key = checked_inputs(alg, key, iv)?;
        let cipher = algorithm_to_cipher(alg)?;
        let Some(split) = ciphertext_with_tag.len().checked_sub(AEAD_TAG_LENGTH) else {
            return Err(CoseCipherError::DataAuthenticationFailure);
        };
        let (ciphertext, auth_tag) = ciphertext_with_tag.split_at(split);

        let mut ctx = CipherCtx::new()?;
        ctx.decrypt_init(Some(cipher), None, None)?;
        ctx.set_iv_length(iv.len())?;
        ctx.decrypt_init(None, Some(key), Some(iv))?;
        ctx.cipher_update(aad, None)?;
        let mut plaintext = Vec::with_capacity(ciphertext.len());
        ctx.cipher_update_vec(ciphertext, &mut plaintext)?;
        // The tag must be set right before finalization.
        ctx.set_tag(auth_tag)?;
        ctx.cipher_final_vec(&mut plaintext)
            .map_err(|_e| CoseCipherError::DataAuthenticationFailure)?;
        Ok(plaintext)
    }
}
