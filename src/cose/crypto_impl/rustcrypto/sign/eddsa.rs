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
use coset::{iana, CoseKey};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};

use crate::cose::crypto_impl::rustcrypto::{CoseRustCryptoCipherError, RustCryptoContext};
use crate::cose::{CoseOkpKey, CryptoBackend, EllipticCurve};
use crate::error::CoseCipherError;

type Error = CoseCipherError<CoseRustCryptoCipherError>;

fn ed25519_key(key: &CoseKey) -> Result<CoseOkpKey<'_>, Error> {
    let key = CoseOkpKey::parse::<CoseRustCryptoCipherError>(key)?;
    if key.crv != EllipticCurve::Assigned(iana::EllipticCurve::Ed25519) {
        return Err(CoseCipherError::UnsupportedCurve(key.crv));
    }
    Ok(key)
}

fn signing_key(key: &CoseOkpKey<'_>) -> Result<SigningKey, Error> {
    let d = key.d.ok_or(CoseCipherError::MissingKeyParam(
        iana::OkpKeyParameter::D.into(),
    ))?;
    let d: &[u8; 32] = d.try_into().map_err(|_e| {
        CoseCipherError::InvalidKeyParam(iana::OkpKeyParameter::D.into(), Value::Bytes(d.to_vec()))
    })?;
    Ok(SigningKey::from_bytes(d))
}

fn verifying_key(key: &CoseOkpKey<'_>) -> Result<VerifyingKey, Error> {
    let Some(x) = key.x else {
        return signing_key(key).map(|sk| sk.verifying_key());
    };
    let invalid =
        || CoseCipherError::InvalidKeyParam(iana::OkpKeyParameter::X.into(), Value::Bytes(x.to_vec()));
    let x: &[u8; 32] = x.try_into().map_err(|_e| invalid())?;
    VerifyingKey::from_bytes(x).map_err(|_e| invalid())
}

impl<RNG: RngCore + CryptoRng> RustCryptoContext<RNG> {
    /// Sign `data` using Ed25519.
    pub(super) fn sign_ed25519(
        key: &CoseKey,
        data: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let key = signing_key(&ed25519_key(key)?)?;
        let signature = key
            .try_sign(data)
            .map_err(|e| CoseCipherError::Other(CoseRustCryptoCipherError::EddsaError(e)))?;
        Ok(signature.to_bytes().to_vec())
    }

    /// Verify an Ed25519 `signature` over `data`.
    pub(super) fn verify_ed25519(
        key: &CoseKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<<Self as CryptoBackend>::Error>> {
        let key = verifying_key(&ed25519_key(key)?)?;
        let signature =
            Signature::from_slice(signature).map_err(|_e| CoseCipherError::VerificationFailure)?;
        key.verify_strict(data, &signature)
            .map_err(|_e| CoseCipherError::VerificationFailure)
    }
}
