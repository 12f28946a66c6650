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
use core::ops::Add;

use coset::{iana, CoseKey};
use ecdsa::elliptic_curve::generic_array::ArrayLength;
use ecdsa::hazmat::{DigestPrimitive, SignPrimitive, VerifyPrimitive};
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use ecdsa::{PrimeCurve, Signature, SigningKey, VerifyingKey};
use elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::CurveArithmetic;
use p256::NistP256;
use p384::NistP384;
use rand::{CryptoRng, RngCore};

use crate::cose::crypto_impl::ecdsa_curve;
use crate::cose::crypto_impl::rustcrypto::{
    assigned_curve, ec, CoseRustCryptoCipherError, RustCryptoContext,
};
use crate::cose::{unsupported, CoseEc2Key, CryptoBackend, EllipticCurve};
use crate::error::CoseCipherError;

type Error = CoseCipherError<CoseRustCryptoCipherError>;

/// Parses `key` and ensures that its curve is the one mandated for `alg`.
fn checked_key<'a>(
    alg: iana::Algorithm,
    key: &'a CoseKey,
) -> Result<(iana::EllipticCurve, CoseEc2Key<'a>), Error> {
    let expected = ecdsa_curve(alg).ok_or_else(|| unsupported(alg))?;
    let key = CoseEc2Key::parse::<CoseRustCryptoCipherError>(key)?;
    let curve = assigned_curve(&key)?;
    if curve != expected {
        return Err(CoseCipherError::KeyTypeCurveMismatch(
            coset::KeyType::Assigned(iana::KeyType::EC2),
            EllipticCurve::Assigned(curve),
        ));
    }
    Ok((curve, key))
}

impl<RNG: RngCore + CryptoRng> RustCryptoContext<RNG> {
    /// Perform an ECDSA signature operation with the ECDSA variant given in `alg` for the
    /// given precomputed `digest` using the provided `key`.
    pub(super) fn sign_ecdsa(
        alg: iana::Algorithm,
        key: &CoseKey,
        digest: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let (curve, key) = checked_key(alg, key)?;
        match curve {
            iana::EllipticCurve::P_256 => Self::sign_ecdsa_with_curve::<NistP256>(&key, digest),
            iana::EllipticCurve::P_384 => Self::sign_ecdsa_with_curve::<NistP384>(&key, digest),
            // P-521 does not implement the hazmat signing primitives in the version used here.
            v => Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(v))),
        }
    }

    /// Perform an ECDSA verification operation with the ECDSA variant given in `alg` for the
    /// given precomputed `digest` and `signature` using the provided `key`.
    pub(super) fn verify_ecdsa(
        alg: iana::Algorithm,
        key: &CoseKey,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<<Self as CryptoBackend>::Error>> {
        let (curve, key) = checked_key(alg, key)?;
        match curve {
            iana::EllipticCurve::P_256 => {
                Self::verify_ecdsa_with_curve::<NistP256>(&key, digest, signature)
            }
            iana::EllipticCurve::P_384 => {
                Self::verify_ecdsa_with_curve::<NistP384>(&key, digest, signature)
            }
            v => Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(v))),
        }
    }

    /// Sign the `digest` using the curve `CRV`.
    fn sign_ecdsa_with_curve<CRV: PrimeCurve + CurveArithmetic + DigestPrimitive>(
        key: &CoseEc2Key<'_>,
        digest: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>>
    where
        <CRV as CurveArithmetic>::Scalar: SignPrimitive<CRV>,
        <<CRV as ecdsa::elliptic_curve::Curve>::FieldBytesSize as Add>::Output: ArrayLength<u8>,
    {
        let sign_key = SigningKey::<CRV>::from(ec::secret_key::<CRV>(key)?);
        let signature: Signature<CRV> = sign_key
            .sign_prehash(digest)
            .map_err(|e| CoseCipherError::Other(CoseRustCryptoCipherError::EcdsaError(e)))?;
        Ok(signature.to_vec())
    }

    /// Verify the `signature` over `digest` using the curve `CRV`.
    fn verify_ecdsa_with_curve<CRV: PrimeCurve + CurveArithmetic + DigestPrimitive>(
        key: &CoseEc2Key<'_>,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<<Self as CryptoBackend>::Error>>
    where
        <CRV as CurveArithmetic>::AffinePoint: VerifyPrimitive<CRV>,
        <<CRV as ecdsa::elliptic_curve::Curve>::FieldBytesSize as Add>::Output: ArrayLength<u8>,
        <CRV as ecdsa::elliptic_curve::Curve>::FieldBytesSize: ModulusSize,
        <CRV as CurveArithmetic>::AffinePoint: FromEncodedPoint<CRV>,
        <CRV as CurveArithmetic>::AffinePoint: ToEncodedPoint<CRV>,
    {
        let verify_key = VerifyingKey::<CRV>::from(ec::public_key::<CRV>(key)?);
        let signature = Signature::<CRV>::from_slice(signature)
            .map_err(|_e| CoseCipherError::VerificationFailure)?;
        verify_key
            .verify_prehash(digest, &signature)
            .map_err(|_e| CoseCipherError::VerificationFailure)
    }
}
