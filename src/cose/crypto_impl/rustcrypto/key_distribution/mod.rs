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
use coset::{iana, CoseKey};
use rand::{CryptoRng, RngCore};

use crate::cose::crypto_impl::rustcrypto::RustCryptoContext;
#[cfg(feature = "rustcrypto-ecdh")]
use crate::cose::HashAlgorithm;
use crate::cose::KeyDistributionCryptoBackend;
use crate::error::CoseCipherError;

#[cfg(feature = "rustcrypto-aes-kw")]
mod aes_key_wrap;
#[cfg(feature = "rustcrypto-ecdh")]
mod ecdh;

impl<RNG: RngCore + CryptoRng> KeyDistributionCryptoBackend for RustCryptoContext<RNG> {
    #[cfg(feature = "rustcrypto-aes-kw")]
    fn aes_key_wrap(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Self::aes_key_wrap(alg, key, plaintext)
    }

    #[cfg(feature = "rustcrypto-aes-kw")]
    fn aes_key_unwrap(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Self::aes_key_unwrap(alg, key, ciphertext)
    }

    #[cfg(feature = "rustcrypto-ecdh")]
    fn ecdh(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        peer: &CoseKey,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Self::ecdh(alg, key, peer)
    }

    #[cfg(feature = "rustcrypto-ecdh")]
    fn hkdf(
        &mut self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Self::hkdf(hash, salt, ikm, info, len)
    }
}
