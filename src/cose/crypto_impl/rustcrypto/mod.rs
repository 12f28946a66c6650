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

//! Cryptographic backend based on the RustCrypto crates.

use coset::{iana, CoseKey, CoseKeyBuilder};
use digest::Digest;
use rand::{CryptoRng, RngCore};
use sha2::{Sha256, Sha384, Sha512};
use strum_macros::Display;

use crate::cose::{check_key, CoseEc2Key, CryptoBackend, EllipticCurve, HashAlgorithm};
use crate::error::CoseCipherError;

#[cfg(rustcrypto_ec_base)]
mod ec;
#[cfg(rustcrypto_encrypt_base)]
mod encrypt;
#[cfg(rustcrypto_key_distribution_base)]
mod key_distribution;
#[cfg(rustcrypto_sign_base)]
mod sign;

#[cfg(not(rustcrypto_encrypt_base))]
impl<RNG: RngCore + CryptoRng> crate::cose::EncryptCryptoBackend for RustCryptoContext<RNG> {}
#[cfg(not(rustcrypto_key_distribution_base))]
impl<RNG: RngCore + CryptoRng> crate::cose::KeyDistributionCryptoBackend
    for RustCryptoContext<RNG>
{
}
#[cfg(not(rustcrypto_sign_base))]
impl<RNG: RngCore + CryptoRng> crate::cose::SignCryptoBackend for RustCryptoContext<RNG> {}

#[derive(Debug, Display)]
#[non_exhaustive]
/// Errors that might be returned from the RustCrypto cryptographic backend.
pub enum CoseRustCryptoCipherError {
    /// Error in AES key wrap.
    #[cfg(feature = "rustcrypto-aes-kw")]
    AesKwError(aes_kw::Error),
    /// Requested output of HKDF is too long.
    #[cfg(feature = "rustcrypto-ecdh")]
    HkdfLength(hkdf::InvalidLength),
    /// Error regarding elliptic curve operations.
    #[cfg(rustcrypto_ec_base)]
    EcError(elliptic_curve::Error),
    /// Error in ECDSA operation.
    #[cfg(feature = "rustcrypto-ecdsa")]
    EcdsaError(ecdsa::Error),
    /// Error in EdDSA operation.
    #[cfg(feature = "rustcrypto-eddsa")]
    EddsaError(ed25519_dalek::SignatureError),
    /// Error during AEAD encryption.
    #[cfg(rustcrypto_encrypt_base)]
    AeadError,
    /// Invalid elliptic curve point.
    InvalidPoint,
}

#[cfg(feature = "rustcrypto-aes-kw")]
impl From<aes_kw::Error> for CoseRustCryptoCipherError {
    fn from(value: aes_kw::Error) -> Self {
        CoseRustCryptoCipherError::AesKwError(value)
    }
}

#[cfg(feature = "rustcrypto-ecdh")]
impl From<hkdf::InvalidLength> for CoseRustCryptoCipherError {
    fn from(value: hkdf::InvalidLength) -> Self {
        CoseRustCryptoCipherError::HkdfLength(value)
    }
}

#[cfg(rustcrypto_ec_base)]
impl From<elliptic_curve::Error> for CoseRustCryptoCipherError {
    fn from(value: elliptic_curve::Error) -> Self {
        CoseRustCryptoCipherError::EcError(value)
    }
}

#[cfg(feature = "rustcrypto-ecdh")]
impl From<hkdf::InvalidLength> for CoseCipherError<CoseRustCryptoCipherError> {
    fn from(value: hkdf::InvalidLength) -> Self {
        CoseCipherError::Other(CoseRustCryptoCipherError::from(value))
    }
}

#[cfg(rustcrypto_ec_base)]
impl From<elliptic_curve::Error> for CoseCipherError<CoseRustCryptoCipherError> {
    fn from(value: elliptic_curve::Error) -> Self {
        CoseCipherError::Other(CoseRustCryptoCipherError::from(value))
    }
}

/// State of an incremental hash computation of the RustCrypto backend.
#[derive(Clone)]
pub enum RustCryptoHashContext {
    /// SHA-256
    Sha256(Sha256),
    /// SHA-384
    Sha384(Sha384),
    /// SHA-512
    Sha512(Sha512),
}

/// Context for the RustCrypto cryptographic backend.
///
/// Can be used as a [`CryptoBackend`] for COSE operations, key handles are plain
/// [`CoseKey`]s.
///
/// Generic properties of this backend:
/// - [x] Can derive EC public key components if only the private component (d) is present.
/// - [x] Can work with compressed EC public keys (EC keys using point compression)
///
/// Algorithm support:
/// - Signature Algorithms (for COSE_Sign and COSE_Sign1)
///     - [x] ECDSA (`rustcrypto-ecdsa`)
///         - [x] ES256
///         - [x] ES384
///         - [ ] ES512
///     - [x] EdDSA (`rustcrypto-eddsa`)
///         - [x] Ed25519
///         - [ ] Ed448
/// - Content Encryption Algorithms (for COSE_Encrypt and COSE_Encrypt0)
///     - [x] AES-GCM (`rustcrypto-aes-gcm`)
///         - [x] A128GCM
///         - [x] A192GCM
///         - [x] A256GCM
///     - [x] ChaCha20/Poly1305 (`rustcrypto-chacha20-poly1305`)
/// - Content Key Distribution Methods (for COSE_Recipients)
///     - [x] Direct Encryption
///     - [x] AES Key Wrap (`rustcrypto-aes-kw`)
///         - [x] A128KW
///         - [x] A192KW
///         - [x] A256KW
///     - [x] ECDH with Key Wrap (`rustcrypto-ecdh` and `rustcrypto-aes-kw`)
///         - [x] ECDH-ES + A128KW
///         - [x] ECDH-ES + A192KW
///         - [x] ECDH-ES + A256KW
///
/// Elliptic Curve support (for EC algorithms):
/// - ES256/ES384, ECDH-ES
///     - [x] P-256
///     - [x] P-384
///     - [ ] P-521
/// - EdDSA
///     - [x] Ed25519
pub struct RustCryptoContext<RNG: RngCore + CryptoRng> {
    rng: RNG,
}

impl<RNG: RngCore + CryptoRng> RustCryptoContext<RNG> {
    /// Creates a new RustCrypto context for cryptographic COSE operations using the given random
    /// number generator `rng`.
    pub fn new(rng: RNG) -> RustCryptoContext<RNG> {
        RustCryptoContext { rng }
    }
}

/// Returns the assigned curve of an EC2 key.
fn assigned_curve(
    key: &CoseEc2Key<'_>,
) -> Result<iana::EllipticCurve, CoseCipherError<CoseRustCryptoCipherError>> {
    match &key.crv {
        EllipticCurve::Assigned(crv) => Ok(*crv),
        v => Err(CoseCipherError::UnsupportedCurve(v.clone())),
    }
}

/// Computes the public key of an EC2 key that lacks (uncompressed) public coordinates.
#[cfg(rustcrypto_ec_base)]
fn derive_public_key(
    key: &CoseEc2Key<'_>,
    curve: iana::EllipticCurve,
) -> Result<CoseKey, CoseCipherError<CoseRustCryptoCipherError>> {
    match curve {
        iana::EllipticCurve::P_256 => ec::public_cose_key::<p256::NistP256>(key, curve),
        iana::EllipticCurve::P_384 => ec::public_cose_key::<p384::NistP384>(key, curve),
        v => Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(v))),
    }
}

#[cfg(not(rustcrypto_ec_base))]
fn derive_public_key(
    _key: &CoseEc2Key<'_>,
    curve: iana::EllipticCurve,
) -> Result<CoseKey, CoseCipherError<CoseRustCryptoCipherError>> {
    Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(
        curve,
    )))
}

impl<RNG: RngCore + CryptoRng> CryptoBackend for RustCryptoContext<RNG> {
    type Error = CoseRustCryptoCipherError;
    type Key = CoseKey;
    type HashContext = RustCryptoHashContext;

    fn generate_rand(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.rng.fill_bytes(buf);
        Ok(())
    }

    fn import_key(&mut self, key: &CoseKey) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        check_key::<Self::Error>(key)?;
        Ok(key.clone())
    }

    #[cfg(rustcrypto_ec_base)]
    fn generate_key(
        &mut self,
        curve: iana::EllipticCurve,
    ) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        let key = match curve {
            iana::EllipticCurve::P_256 => {
                ec::generate_key::<p256::NistP256, _>(&mut self.rng, curve)
            }
            iana::EllipticCurve::P_384 => {
                ec::generate_key::<p384::NistP384, _>(&mut self.rng, curve)
            }
            v => Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(v))),
        }?;
        #[cfg(feature = "tracing")]
        tracing::trace!(?curve, "generated ephemeral key pair");
        Ok(key)
    }

    fn export_public_key(
        &mut self,
        key: &Self::Key,
    ) -> Result<CoseKey, CoseCipherError<Self::Error>> {
        let ec2 = CoseEc2Key::parse::<Self::Error>(key)?;
        let curve = assigned_curve(&ec2)?;
        if let (Some(x), Some(y)) = (ec2.x, ec2.y) {
            return Ok(CoseKeyBuilder::new_ec2_pub_key(curve, x.to_vec(), y.to_vec()).build());
        }
        derive_public_key(&ec2, curve)
    }

    fn hash_init(
        &mut self,
        alg: HashAlgorithm,
    ) -> Result<Self::HashContext, CoseCipherError<Self::Error>> {
        Ok(match alg {
            HashAlgorithm::Sha256 => RustCryptoHashContext::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => RustCryptoHashContext::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => RustCryptoHashContext::Sha512(Sha512::new()),
        })
    }

    fn hash_update(
        &mut self,
        ctx: &mut Self::HashContext,
        data: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        match ctx {
            RustCryptoHashContext::Sha256(h) => Digest::update(h, data),
            RustCryptoHashContext::Sha384(h) => Digest::update(h, data),
            RustCryptoHashContext::Sha512(h) => Digest::update(h, data),
        }
        Ok(())
    }

    fn hash_finish(
        &mut self,
        ctx: Self::HashContext,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Ok(match ctx {
            RustCryptoHashContext::Sha256(h) => h.finalize().to_vec(),
            RustCryptoHashContext::Sha384(h) => h.finalize().to_vec(),
            RustCryptoHashContext::Sha512(h) => h.finalize().to_vec(),
        })
    }
}
