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
use coset::{iana, CoseKey, KeyType};
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::{Id, PKey, Public};
use openssl::pkey_ctx::PkeyCtx;
use openssl::sign::{Signer, Verifier};

use crate::cose::crypto_impl::ecdsa_curve;
use crate::cose::crypto_impl::openssl::ec::{self, Curve};
use crate::cose::crypto_impl::openssl::{CoseOpensslCipherError, OpensslContext};
use crate::cose::{unsupported, CoseEc2Key, CoseOkpKey, EllipticCurve, SignCryptoBackend};
use crate::error::CoseCipherError;

type Error = CoseCipherError<CoseOpensslCipherError>;

/// Parses `key` and ensures that its curve is the one mandated for `alg`.
fn checked_ecdsa_key<'a>(
    alg: iana::Algorithm,
    key: &'a CoseKey,
) -> Result<(CoseEc2Key<'a>, Curve), Error> {
    let expected = ecdsa_curve(alg).ok_or_else(|| unsupported(alg))?;
    let key = CoseEc2Key::parse::<CoseOpensslCipherError>(key)?;
    let crv = ec::assigned_curve(&key)?;
    if crv != expected {
        return Err(CoseCipherError::KeyTypeCurveMismatch(
            KeyType::Assigned(iana::KeyType::EC2),
            EllipticCurve::Assigned(crv),
        ));
    }
    let curve = ec::curve(crv)?;
    Ok((key, curve))
}

fn ed25519_key(key: &CoseKey) -> Result<CoseOkpKey<'_>, Error> {
    let key = CoseOkpKey::parse::<CoseOpensslCipherError>(key)?;
    if key.crv != EllipticCurve::Assigned(iana::EllipticCurve::Ed25519) {
        return Err(CoseCipherError::UnsupportedCurve(key.crv));
    }
    Ok(key)
}

fn ed25519_private(key: &CoseOkpKey<'_>) -> Result<&[u8], Error> {
    key.d.ok_or(CoseCipherError::MissingKeyParam(
        iana::OkpKeyParameter::D.into(),
    ))
}

impl SignCryptoBackend for OpensslContext {
    fn sign_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        digest: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let (key, curve) = checked_ecdsa_key(alg, key)?;
        let pkey = PKey::from_ec_key(ec::private_ec_key(&key, &curve)?)?;
        let mut ctx = PkeyCtx::new(&pkey)?;
        ctx.sign_init()?;
        let mut der_signature = Vec::new();
        ctx.sign_to_vec(digest, &mut der_signature)?;

        // OpenSSL produces DER, COSE uses r || s with fixed-size integers (RFC 9053, Section 2.1).
        let ecdsa_sig = EcdsaSig::from_der(&der_signature)?;
        let mut signature = ecdsa_sig.r().to_vec_padded(curve.pad_size())?;
        signature.extend(ecdsa_sig.s().to_vec_padded(curve.pad_size())?);
        Ok(signature)
    }

    fn verify_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        let (key, curve) = checked_ecdsa_key(alg, key)?;
        if signature.len() != 2 * curve.size {
            return Err(CoseCipherError::VerificationFailure);
        }
        let pkey = PKey::from_ec_key(ec::public_ec_key(&key, &curve)?)?;

        let r = BigNum::from_slice(&signature[..curve.size])?;
        let s = BigNum::from_slice(&signature[curve.size..])?;
        let der_signature = EcdsaSig::from_private_components(r, s)?.to_der()?;

        let mut ctx = PkeyCtx::new(&pkey)?;
        ctx.verify_init()?;
        if matches!(ctx.verify(digest, &der_signature), Ok(true)) {
            Ok(())
        } else {
            Err(CoseCipherError::VerificationFailure)
        }
    }

    fn sign_eddsa(
        &mut self,
        key: &CoseKey,
        data: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let key = ed25519_key(key)?;
        let pkey = PKey::private_key_from_raw_bytes(ed25519_private(&key)?, Id::ED25519)?;
        let mut signer = Signer::new_without_digest(&pkey)?;
        Ok(signer.sign_oneshot_to_vec(data)?)
    }

    fn verify_eddsa(
        &mut self,
        key: &CoseKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        let key = ed25519_key(key)?;
        let pkey: PKey<Public> = match key.x {
            Some(x) => PKey::public_key_from_raw_bytes(x, Id::ED25519)?,
            None => {
                let private = PKey::private_key_from_raw_bytes(ed25519_private(&key)?, Id::ED25519)?;
                PKey::public_key_from_raw_bytes(&private.raw_public_key()?, Id::ED25519)?
            }
        };
        let mut verifier = Verifier::new_without_digest(&pkey)?;
        if matches!(verifier.verify_oneshot(signature, data), Ok(true)) {
            Ok(())
        } else {
            Err(CoseCipherError::VerificationFailure)
        }
    }
}
