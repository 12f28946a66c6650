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
use elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::{AffinePoint, CurveArithmetic, FieldBytesSize};
use hkdf::Hkdf;
use p256::NistP256;
use p384::NistP384;
use rand::{CryptoRng, RngCore};
use sha2::{Sha256, Sha384, Sha512};

use crate::cose::crypto_impl::rustcrypto::{assigned_curve, ec, RustCryptoContext};
use crate::cose::recipient::esdh_key_wrap_algorithm;
use crate::cose::{unsupported, CoseEc2Key, CryptoBackend, EllipticCurve, HashAlgorithm};
use crate::error::CoseCipherError;

impl<RNG: RngCore + CryptoRng> RustCryptoContext<RNG> {
    /// Compute the shared secret of the private `key` and the public key `peer` on `CRV`.
    fn ecdh_with_curve<CRV>(
        key: &CoseEc2Key<'_>,
        peer: &CoseEc2Key<'_>,
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>>
    where
        CRV: CurveArithmetic,
        FieldBytesSize<CRV>: ModulusSize,
        AffinePoint<CRV>: FromEncodedPoint<CRV> + ToEncodedPoint<CRV>,
    {
        let secret = ec::secret_key::<CRV>(key)?;
        let public = ec::public_key::<CRV>(peer)?;
        let shared =
            elliptic_curve::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
        Ok(shared.raw_secret_bytes().to_vec())
    }

    /// Perform ECDH between the private `key` and the public key `peer` for use with the
    /// ECDH-ES variant `alg`.
    pub(super) fn ecdh(
        alg: iana::Algorithm,
        key: &CoseKey,
        peer: &CoseKey,
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        esdh_key_wrap_algorithm(alg).ok_or_else(|| unsupported(alg))?;
        let key = CoseEc2Key::parse::<<Self as CryptoBackend>::Error>(key)?;
        let peer = CoseEc2Key::parse::<<Self as CryptoBackend>::Error>(peer)?;
        let curve = assigned_curve(&key)?;
        if peer.crv != key.crv {
            return Err(CoseCipherError::UnsupportedCurve(peer.crv.clone()));
        }
        match curve {
            iana::EllipticCurve::P_256 => Self::ecdh_with_curve::<NistP256>(&key, &peer),
            iana::EllipticCurve::P_384 => Self::ecdh_with_curve::<NistP384>(&key, &peer),
            v => Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(v))),
        }
    }

    /// Derive `len` bytes from the input keying material `ikm` using HKDF with `hash`.
    ///
    /// An empty `salt` is treated like an absent one.
    pub(super) fn hkdf(
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let salt = (!salt.is_empty()).then_some(salt);
        let mut okm = vec![0u8; len];
        match hash {
            HashAlgorithm::Sha256 => Hkdf::<Sha256>::new(salt, ikm).expand(info, &mut okm),
            HashAlgorithm::Sha384 => Hkdf::<Sha384>::new(salt, ikm).expand(info, &mut okm),
            HashAlgorithm::Sha512 => Hkdf::<Sha512>::new(salt, ikm).expand(info, &mut okm),
        }?;
        Ok(okm)
    }
}
