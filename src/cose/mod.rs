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

//! COSE message processing.
//!
//! The building blocks are layered as follows:
//! - [`param`] contains the in-memory representation of header parameters and the
//!   [`ParameterPool`](param::ParameterPool) decoded parameters are stored in.
//! - [`header`] encodes and decodes the protected and unprotected header buckets.
//! - [`signed`] and [`recipient`] define the [`Signer`](signed::Signer),
//!   [`Verifier`](signed::Verifier), [`RecipientEncoder`](recipient::RecipientEncoder) and
//!   [`RecipientDecoder`](recipient::RecipientDecoder) interfaces along with their
//!   implementations.
//! - [`signed`] and [`encrypted`] contain the orchestrators that assemble and disassemble
//!   COSE_Sign, COSE_Sign1, COSE_Encrypt and COSE_Encrypt0 messages.
//!
//! Cryptographic primitives are provided by an implementation of [`CryptoBackend`] and its
//! extension traits, see [`crypto_impl`] for the included implementations.

use core::fmt::{Debug, Display};

use coset::{iana, CoseKey, CoseKeyBuilder};

use crate::error::CoseCipherError;

pub(crate) mod cbor;
pub mod crypto_impl;
pub mod encrypted;
pub mod header;
pub mod key;
pub mod message;
pub mod output;
pub mod param;
pub mod recipient;
pub mod signed;

#[cfg(test)]
pub(crate) mod test_helper;

pub use encrypted::{EncryptCryptoBackend, EncryptDecoder, EncryptEncoder};
pub use header::{decode_headers, encode_headers, SpecialDecode, SpecialDecoder};
pub use key::{
    check_key, ec2_coordinate_size, CoseEc2Key, CoseOkpKey, CoseSymmetricKey, EllipticCurve,
    KeyParam,
};
pub use message::{DecodeFlag, DecodedMessage, EncodeFlag, MessageType};
pub use output::Output;
pub use param::{HeaderLocation, ParamValue, Parameter, ParameterList, ParameterPool, Parameters};
pub use recipient::{KeyDistributionCryptoBackend, RecipientDecoder, RecipientEncoder};
pub use signed::{SignCryptoBackend, SignDecoder, SignEncoder, Signer, Verifier};

/// Hash functions a [`CryptoBackend`] may be asked to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgorithm {
    /// Returns the hash function used by the hash-then-sign signature algorithm `alg`, if any.
    #[must_use]
    pub fn for_signature_algorithm(alg: iana::Algorithm) -> Option<HashAlgorithm> {
        match alg {
            iana::Algorithm::ES256 => Some(HashAlgorithm::Sha256),
            iana::Algorithm::ES384 => Some(HashAlgorithm::Sha384),
            iana::Algorithm::ES512 => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Size of the digest in bytes.
    #[must_use]
    pub const fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

pub(crate) fn unsupported<BE: Display>(alg: iana::Algorithm) -> CoseCipherError<BE> {
    CoseCipherError::UnsupportedAlgorithm(coset::Algorithm::Assigned(alg))
}

/// Result of an operation that may have to be resumed later.
///
/// Only restartable signers ever produce [`Progress::InProgress`], in which case the caller
/// has to invoke the same operation again with the same inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// The operation finished and produced its result.
    Complete(T),
    /// The operation has not finished yet.
    InProgress,
}

impl<T> Progress<T> {
    /// Returns the result of a completed operation, or `None` if it is still in progress.
    pub fn complete(self) -> Option<T> {
        match self {
            Progress::Complete(v) => Some(v),
            Progress::InProgress => None,
        }
    }

    /// Maps the result of a completed operation.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Progress<U> {
        match self {
            Progress::Complete(v) => Progress::Complete(f(v)),
            Progress::InProgress => Progress::InProgress,
        }
    }
}

/// Basic cryptographic operations every backend has to provide.
///
/// Keys are referenced through the opaque [`CryptoBackend::Key`] handle. Handles are created
/// using [`import_key`](CryptoBackend::import_key) or
/// [`generate_key`](CryptoBackend::generate_key) and released using
/// [`free_key`](CryptoBackend::free_key).
pub trait CryptoBackend {
    /// Error type that this backend may return.
    type Error: Display + Debug;

    /// Handle for a key known to this backend.
    type Key;

    /// State of an incremental hash computation.
    type HashContext;

    /// Fills the given buffer with random bytes.
    ///
    /// # Errors
    ///
    /// If the random number generator fails.
    fn generate_rand(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Imports a COSE key into the backend.
    ///
    /// # Errors
    ///
    /// If the key is malformed or uses a key type or curve the backend does not support.
    fn import_key(&mut self, key: &CoseKey) -> Result<Self::Key, CoseCipherError<Self::Error>>;

    /// Imports raw symmetric key material.
    ///
    /// # Errors
    ///
    /// If the backend can not import the key.
    fn import_symmetric_key(
        &mut self,
        k: &[u8],
    ) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        self.import_key(&CoseKeyBuilder::new_symmetric_key(k.to_vec()).build())
    }

    /// Releases a key handle along with all backend resources associated with it.
    fn free_key(&mut self, key: Self::Key) {
        drop(key);
    }

    /// Generates a new key pair on the given curve.
    ///
    /// # Errors
    ///
    /// If the curve is not supported or key generation fails.
    fn generate_key(
        &mut self,
        curve: iana::EllipticCurve,
    ) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(
            curve,
        )))
    }

    /// Exports the public part of a key pair as a COSE key.
    ///
    /// # Errors
    ///
    /// If the key is not an asymmetric key or can not be exported.
    fn export_public_key(
        &mut self,
        key: &Self::Key,
    ) -> Result<CoseKey, CoseCipherError<Self::Error>>;

    /// Starts an incremental hash computation.
    ///
    /// # Errors
    ///
    /// If the hash algorithm is not supported.
    fn hash_init(
        &mut self,
        alg: HashAlgorithm,
    ) -> Result<Self::HashContext, CoseCipherError<Self::Error>>;

    /// Feeds `data` into an incremental hash computation.
    ///
    /// # Errors
    ///
    /// If the backend fails to process the data.
    fn hash_update(
        &mut self,
        ctx: &mut Self::HashContext,
        data: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>>;

    /// Finishes an incremental hash computation and returns the digest.
    ///
    /// # Errors
    ///
    /// If the backend fails to compute the digest.
    fn hash_finish(
        &mut self,
        ctx: Self::HashContext,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>>;

    /// Computes the digest of `data` in one go.
    ///
    /// # Errors
    ///
    /// See [`hash_init`](CryptoBackend::hash_init),
    /// [`hash_update`](CryptoBackend::hash_update) and
    /// [`hash_finish`](CryptoBackend::hash_finish).
    fn hash(
        &mut self,
        alg: HashAlgorithm,
        data: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let mut ctx = self.hash_init(alg)?;
        self.hash_update(&mut ctx, data)?;
        self.hash_finish(ctx)
    }
}
