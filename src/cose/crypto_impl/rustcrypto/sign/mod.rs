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
#[cfg(any(feature = "rustcrypto-ecdsa", feature = "rustcrypto-eddsa"))]
use coset::CoseKey;
#[cfg(feature = "rustcrypto-ecdsa")]
use coset::iana;
use rand::{CryptoRng, RngCore};

use crate::cose::crypto_impl::rustcrypto::RustCryptoContext;
use crate::cose::SignCryptoBackend;
#[cfg(any(feature = "rustcrypto-ecdsa", feature = "rustcrypto-eddsa"))]
use crate::error::CoseCipherError;

#[cfg(feature = "rustcrypto-ecdsa")]
mod ecdsa;
#[cfg(feature = "rustcrypto-eddsa")]
mod eddsa;

impl<RNG: RngCore + CryptoRng> SignCryptoBackend for RustCryptoContext<RNG> {
    #[cfg(feature = "rustcrypto-ecdsa")]
    fn sign_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        digest: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Self::sign_ecdsa(alg, key, digest)
    }

    #[cfg(feature = "rustcrypto-ecdsa")]
    fn verify_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        Self::verify_ecdsa(alg, key, digest, signature)
    }

    #[cfg(feature = "rustcrypto-eddsa")]
    fn sign_eddsa(
        &mut self,
        key: &CoseKey,
        data: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Self::sign_ed25519(key, data)
    }

    #[cfg(feature = "rustcrypto-eddsa")]
    fn verify_eddsa(
        &mut self,
        key: &CoseKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        Self::verify_ed25519(key, data, signature)
    }
}
