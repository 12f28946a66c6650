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

//! Content key distribution for COSE_Encrypt messages.
//!
//! Every COSE_Recipient structure of a COSE_Encrypt message is created by a
//! [`RecipientEncoder`] and consumed by a [`RecipientDecoder`]. Decoders are tried in order
//! by the [`EncryptDecoder`](crate::cose::EncryptDecoder): a decoder that does not recognize
//! a recipient (because its algorithm or key ID differ) returns
//! [`RecipientOutcome::Declined`] and the next decoder is tried. A decoder that recognizes a
//! recipient but fails to obtain the content key returns an error, which aborts decryption.
//!
//! Malformed recipients are always reported as errors, never as declines.
//!
//! Supported methods:
//! - direct key ([`DirectRecipientEncoder`], [`DirectRecipientDecoder`]),
//! - AES key wrap ([`KeyWrapRecipientEncoder`], [`KeyWrapRecipientDecoder`]),
//! - ECDH-ES with AES key wrap ([`EsdhRecipientEncoder`], [`EsdhRecipientDecoder`]).

use core::fmt::Display;

use ciborium::Value;
use coset::iana::EnumI64;
use coset::{iana, CoseKey};

use crate::cose::header::algorithm_id;
use crate::cose::param::{HeaderLocation, ParamValue, Parameter, ParameterPool, Parameters};
use crate::cose::{unsupported, CryptoBackend, HashAlgorithm};
use crate::error::CoseCipherError;

mod direct;
mod esdh;
pub mod kdf;
mod key_wrap;

#[cfg(test)]
mod tests;

pub use direct::{DirectRecipientDecoder, DirectRecipientEncoder};
pub use esdh::{EsdhRecipientDecoder, EsdhRecipientEncoder};
pub use kdf::{KdfContext, KdfContextInputs, KdfContextInputsBuilder, DEFAULT_KDF_CONTEXT_SIZE};
pub use key_wrap::{KeyWrapRecipientDecoder, KeyWrapRecipientEncoder};

/// Returns the key size in bytes of an AES key wrap algorithm.
#[must_use]
pub fn key_wrap_key_size(alg: iana::Algorithm) -> Option<usize> {
    match alg {
        iana::Algorithm::A128KW => Some(16),
        iana::Algorithm::A192KW => Some(24),
        iana::Algorithm::A256KW => Some(32),
        _ => None,
    }
}

/// Returns the AES key wrap algorithm used by an ECDH-ES + AES key wrap algorithm.
#[must_use]
pub fn esdh_key_wrap_algorithm(alg: iana::Algorithm) -> Option<iana::Algorithm> {
    match alg {
        iana::Algorithm::ECDH_ES_A128KW => Some(iana::Algorithm::A128KW),
        iana::Algorithm::ECDH_ES_A192KW => Some(iana::Algorithm::A192KW),
        iana::Algorithm::ECDH_ES_A256KW => Some(iana::Algorithm::A256KW),
        _ => None,
    }
}

/// Cryptographic backend capable of the primitives used for content key distribution.
///
/// All operations have default implementations that report the operation as unsupported.
pub trait KeyDistributionCryptoBackend: CryptoBackend {
    /// Wraps `plaintext` using AES key wrap (RFC 3394).
    ///
    /// # Errors
    ///
    /// If the algorithm is not supported or the key does not fit the algorithm.
    #[allow(unused_variables)]
    fn aes_key_wrap(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(alg))
    }

    /// Unwraps `ciphertext` using AES key wrap (RFC 3394).
    ///
    /// # Errors
    ///
    /// [`CoseCipherError::KeyUnwrapFailure`] if the integrity check fails, other errors if the
    /// algorithm is not supported or the key does not fit the algorithm.
    #[allow(unused_variables)]
    fn aes_key_unwrap(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(alg))
    }

    /// Performs an elliptic curve Diffie-Hellman key agreement between the private key `key`
    /// and the public key `peer`, returning the shared secret (the x coordinate).
    ///
    /// # Errors
    ///
    /// If the algorithm or curve is not supported, or the keys do not use the same curve.
    #[allow(unused_variables)]
    fn ecdh(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        peer: &CoseKey,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(alg))
    }

    /// Derives `len` bytes using HKDF (RFC 5869).
    ///
    /// # Errors
    ///
    /// If the hash function is not supported or `len` is too large.
    #[allow(unused_variables)]
    fn hkdf(
        &mut self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(iana::Algorithm::Direct_HKDF_SHA_256))
    }
}

/// Creates one COSE_Recipient structure.
pub trait RecipientEncoder<B: KeyDistributionCryptoBackend> {
    /// Returns the key that has to be used as content encryption key, for methods that do not
    /// transport a key (direct key).
    ///
    /// A recipient returning a key here has to be the only recipient of a message.
    fn content_key(&self) -> Option<&B::Key> {
        None
    }

    /// Creates the COSE_Recipient structure conveying the content encryption key `cek`, which
    /// is used with the content encryption algorithm `content_alg`.
    ///
    /// If `size_only` is set, cryptographic operations are skipped and placeholders of the
    /// correct size are emitted.
    ///
    /// # Errors
    ///
    /// If the structure can not be created.
    fn create(
        &mut self,
        backend: &mut B,
        cek: &[u8],
        content_alg: iana::Algorithm,
        size_only: bool,
    ) -> Result<Value, CoseCipherError<B::Error>>;
}

/// Information about the COSE_Recipient being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientContext {
    /// Header location of the recipient.
    pub location: HeaderLocation,
    /// Content encryption algorithm of the message.
    pub content_alg: iana::Algorithm,
}

/// The content encryption key obtained from a COSE_Recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKey<K> {
    /// Raw key material that has to be imported.
    Bytes(Vec<u8>),
    /// A key already known to the backend.
    Handle(K),
}

/// Outcome of a [`RecipientDecoder`] invocation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome<K> {
    /// The recipient's algorithm or key ID do not belong to this decoder.
    Declined,
    /// The content encryption key was obtained.
    Decoded(ContentKey<K>),
}

/// Consumes a COSE_Recipient structure.
pub trait RecipientDecoder<B: KeyDistributionCryptoBackend> {
    /// Attempts to obtain the content encryption key from `recipient`.
    ///
    /// Header parameters of the recipient are decoded into `pool`. If the decoder declines, the
    /// caller discards them.
    ///
    /// # Errors
    ///
    /// If the recipient is malformed, or it was recognized but the content key could not be
    /// obtained.
    fn try_decode(
        &mut self,
        backend: &mut B,
        ctx: &RecipientContext,
        recipient: &Value,
        pool: &mut ParameterPool,
    ) -> Result<RecipientOutcome<B::Key>, CoseCipherError<B::Error>>;
}

/// Splits a COSE_Recipient into its protected bucket, unprotected bucket and ciphertext.
pub(crate) fn split_recipient<BE: Display>(
    recipient: &Value,
) -> Result<(Value, Value, Value), CoseCipherError<BE>> {
    let [protected, unprotected, ciphertext] =
        crate::cose::cbor::expect_array(recipient.clone(), "COSE_Recipient")?;
    Ok((protected, unprotected, ciphertext))
}

/// Algorithm identifier for recipients whose protected bucket has to stay empty.
pub(crate) fn unprotected_alg(alg: iana::Algorithm) -> Parameter {
    Parameter::new(
        iana::HeaderParameter::Alg.to_i64(),
        ParamValue::Int(alg.to_i64()),
    )
}

/// Ensures that the protected bucket of a recipient is empty, accepting both an empty byte
/// string and a byte string containing an empty map.
pub(crate) fn check_no_protected<BE: Display>(protected: &Value) -> Result<(), CoseCipherError<BE>> {
    match protected {
        Value::Bytes(b) if b.is_empty() || b.as_slice() == [0xa0] => Ok(()),
        Value::Bytes(_) => Err(CoseCipherError::ProtectedHeadersNotAllowed),
        _ => Err(CoseCipherError::UnexpectedItem {
            expected: "byte string",
            context: "protected header bucket",
        }),
    }
}

/// Decides whether a recipient with the given header parameters is meant for a decoder
/// configured with `alg` and `kid`.
///
/// Recipients with a different or unassigned algorithm identifier do not apply.
///
/// # Errors
///
/// If the recipient carries no algorithm identifier or one that is not an integer.
pub(crate) fn recipient_applies<BE: Display>(
    params: &[Parameter],
    alg: iana::Algorithm,
    kid: Option<&[u8]>,
) -> Result<bool, CoseCipherError<BE>> {
    let found_alg = algorithm_id::<BE>(params, false)?;
    if found_alg != alg.to_i64() {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            found_alg,
            expected = alg.to_i64(),
            "declining recipient, algorithm differs"
        );
        return Ok(false);
    }
    match (kid, params.find_kid()) {
        (Some(ours), Some(theirs)) if ours != theirs => {
            #[cfg(feature = "tracing")]
            tracing::debug!("declining recipient, key ID differs");
            Ok(false)
        }
        _ => Ok(true),
    }
}
