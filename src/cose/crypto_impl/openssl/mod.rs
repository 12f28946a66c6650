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

//! Cryptographic backend based on OpenSSL.

mod ec;
mod encrypt;
mod key_distribution;
mod sign;

use coset::{iana, CoseKey, CoseKeyBuilder};
use openssl::error::ErrorStack;
use openssl::hash::{Hasher, MessageDigest};
use strum_macros::Display;

use crate::cose::{check_key, CoseEc2Key, CryptoBackend, HashAlgorithm};
use crate::error::CoseCipherError;

/// Represents an error caused by the OpenSSL cryptographic backend.
#[derive(Debug, Display)]
#[non_exhaustive]
pub enum CoseOpensslCipherError {
    /// Standard OpenSSL error (represented as an [`ErrorStack`] in the openssl library crate).
    OpensslError(ErrorStack),
    /// AES key error.
    AesKeyError(openssl::aes::KeyError),
    /// Other error (error message is provided as a string).
    Other(&'static str),
}

impl From<ErrorStack> for CoseOpensslCipherError {
    fn from(value: ErrorStack) -> Self {
        CoseOpensslCipherError::OpensslError(value)
    }
}

impl From<openssl::aes::KeyError> for CoseOpensslCipherError {
    fn from(value: openssl::aes::KeyError) -> Self {
        CoseOpensslCipherError::AesKeyError(value)
    }
}

impl From<ErrorStack> for CoseCipherError<CoseOpensslCipherError> {
    fn from(value: ErrorStack) -> Self {
        CoseCipherError::Other(value.into())
    }
}

impl From<openssl::aes::KeyError> for CoseCipherError<CoseOpensslCipherError> {
    fn from(value: openssl::aes::KeyError) -> Self {
        CoseCipherError::Other(value.into())
    }
}

/// Context for the OpenSSL cryptographic backend.
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
///     - [x] ECDSA
///         - [x] ES256
///         - [x] ES384
///         - [x] ES512
///     - [x] EdDSA
///         - [x] Ed25519
///         - [ ] Ed448
/// - Content Encryption Algorithms (for COSE_Encrypt and COSE_Encrypt0)
///     - [x] AES-GCM
///         - [x] A128GCM
///         - [x] A192GCM
///         - [x] A256GCM
///     - [x] ChaCha20/Poly1305
/// - Content Key Distribution Methods (for COSE_Recipients)
///     - [x] Direct Encryption
///     - [x] AES Key Wrap
///         - [x] A128KW
///         - [x] A192KW
///         - [x] A256KW
///     - [x] ECDH with Key Wrap
///         - [x] ECDH-ES + A128KW
///         - [x] ECDH-ES + A192KW
///         - [x] ECDH-ES + A256KW
///
/// Elliptic Curve support (for EC algorithms):
/// - ES256/ES384/ES512, ECDH-ES [^1]
///     - [x] P-256
///     - [x] P-384
///     - [x] P-521
/// - EdDSA
///     - [x] Ed25519
///
/// [^1]: ES256 is only accepted with P-256, ES384 with P-384 and ES512 with P-521, as
///       suggested by RFC 9053, Section 2.1.
#[derive(Default)]
pub struct OpensslContext {}

impl OpensslContext {
    /// Creates a new OpenSSL context for use with COSE algorithms.
    #[must_use]
    pub fn new() -> OpensslContext {
        OpensslContext {}
    }
}

/// Returns the OpenSSL [`MessageDigest`] for a hash function.
fn message_digest(alg: HashAlgorithm) -> MessageDigest {
    match alg {
        HashAlgorithm::Sha256 => MessageDigest::sha256(),
        HashAlgorithm::Sha384 => MessageDigest::sha384(),
        HashAlgorithm::Sha512 => MessageDigest::sha512(),
    }
}

impl CryptoBackend for OpensslContext {
    type Error = CoseOpensslCipherError;
    type Key = CoseKey;
    type HashContext = Hasher;

    fn generate_rand(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        openssl::rand::rand_bytes(buf).map_err(CoseOpensslCipherError::from)
    }

    fn import_key(&mut self, key: &CoseKey) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        check_key::<Self::Error>(key)?;
        Ok(key.clone())
    }

    fn generate_key(
        &mut self,
        curve: iana::EllipticCurve,
    ) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        let key = ec::generate_key(curve)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(?curve, "generated ephemeral key pair");
        Ok(key)
    }

    fn export_public_key(
        &mut self,
        key: &Self::Key,
    ) -> Result<CoseKey, CoseCipherError<Self::Error>> {
        let ec2 = CoseEc2Key::parse::<Self::Error>(key)?;
        let curve = ec::assigned_curve(&ec2)?;
        match (ec2.x, ec2.y) {
            (Some(x), Some(y)) => {
                Ok(CoseKeyBuilder::new_ec2_pub_key(curve, x.to_vec(), y.to_vec()).build())
            }
            _ => ec::public_cose_key(&ec2, curve),
        }
    }

    fn hash_init(
        &mut self,
        alg: HashAlgorithm,
    ) -> Result<Self::HashContext, CoseCipherError<Self::Error>> {
        Hasher::new(message_digest(alg)).map_err(CoseCipherError::from)
    }

    fn hash_update(
        &mut self,
        ctx: &mut Self::HashContext,
        data: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        ctx.update(data).map_err(CoseCipherError::from)
    }

    fn hash_finish(
        &mut self,
        mut ctx: Self::HashContext,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Ok(ctx.finish()?.to_vec())
    }
}
