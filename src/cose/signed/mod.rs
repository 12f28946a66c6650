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

//! Signing and verification of COSE_Sign and COSE_Sign1 messages.
//!
//! Signature algorithms are plugged into the [`SignEncoder`] and [`SignDecoder`] orchestrators
//! as [`Signer`] and [`Verifier`] trait objects. The orchestrators only ever interact with
//! these traits, concrete implementations are:
//!
//! | Signer                 | Verifier                 | Algorithms                        |
//! |------------------------|--------------------------|-----------------------------------|
//! | [`MainSigner`]         | [`MainVerifier`]         | ES256, ES384, ES512               |
//! | [`EdDsaSigner`]        | [`EdDsaVerifier`]        | EdDSA                             |
//! | [`ShortCircuitSigner`] | [`ShortCircuitVerifier`] | ES256, ES384, ES512 (for testing) |
//! | [`RestartableSigner`]  | [`MainVerifier`]         | ES256, ES384, ES512               |
//!
//! For COSE_Sign1, the header parameters of the single signer are merged into the message
//! body and the signer only produces the raw signature. For COSE_Sign, every signer produces
//! a complete COSE_Signature structure including its own header buckets.

use core::fmt::Display;

use ciborium::Value;
use coset::iana::EnumI64;
use coset::iana;

use crate::cose::header::{encode_headers, EncodedHeaders};
use crate::cose::message::MessageType;
use crate::cose::param::{Parameter, ParameterList, Parameters};
use crate::cose::{cbor, CryptoBackend, HashAlgorithm, Progress};
use crate::error::CoseCipherError;

mod decoder;
mod eddsa;
mod encoder;
mod main_signer;
mod restartable;
mod short_circuit;


pub use decoder::SignDecoder;
pub use eddsa::{EdDsaSigner, EdDsaVerifier};
pub use encoder::SignEncoder;
pub use main_signer::{MainSigner, MainVerifier};
pub use restartable::{RestartState, RestartableSigner};
pub use short_circuit::{ShortCircuitSigner, ShortCircuitVerifier, SHORT_CIRCUIT_KID};

/// Returns the length of a signature produced by `alg`.
#[must_use]
pub fn signature_length(alg: iana::Algorithm) -> Option<usize> {
    match alg {
        iana::Algorithm::ES256 | iana::Algorithm::EdDSA => Some(64),
        iana::Algorithm::ES384 => Some(96),
        iana::Algorithm::ES512 => Some(132),
        _ => None,
    }
}

pub(crate) use crate::cose::unsupported;

/// Cryptographic backend capable of creating and verifying signatures.
///
/// All operations have default implementations that report the algorithm as unsupported, so
/// backends only need to implement the algorithms they provide.
pub trait SignCryptoBackend: CryptoBackend {
    /// Signs a precomputed digest using ECDSA.
    ///
    /// The signature is returned in the fixed-size `r || s` format mandated by COSE.
    ///
    /// # Errors
    ///
    /// If the algorithm is not supported, the key does not fit the algorithm or signing fails.
    #[allow(unused_variables)]
    fn sign_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        digest: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(alg))
    }

    /// Verifies an ECDSA signature over a precomputed digest.
    ///
    /// # Errors
    ///
    /// [`CoseCipherError::VerificationFailure`] if the signature is invalid, other errors if the
    /// algorithm is not supported or the key does not fit the algorithm.
    #[allow(unused_variables)]
    fn verify_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        Err(unsupported(alg))
    }

    /// Signs `data` in one pass using EdDSA.
    ///
    /// # Errors
    ///
    /// If EdDSA is not supported or the key is not an Ed25519 private key.
    #[allow(unused_variables)]
    fn sign_eddsa(
        &mut self,
        key: &Self::Key,
        data: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        Err(unsupported(iana::Algorithm::EdDSA))
    }

    /// Verifies an EdDSA signature over `data`.
    ///
    /// # Errors
    ///
    /// [`CoseCipherError::VerificationFailure`] if the signature is invalid, other errors if
    /// EdDSA is not supported or the key is not an Ed25519 key.
    #[allow(unused_variables)]
    fn verify_eddsa(
        &mut self,
        key: &Self::Key,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        Err(unsupported(iana::Algorithm::EdDSA))
    }

    /// Returns the length of a signature created with `alg` and `key`, without signing.
    ///
    /// # Errors
    ///
    /// If the algorithm is not supported.
    #[allow(unused_variables)]
    fn signature_size(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
    ) -> Result<usize, CoseCipherError<Self::Error>> {
        signature_length(alg).ok_or_else(|| unsupported(alg))
    }

    /// Signs a precomputed digest, possibly over the course of multiple invocations.
    ///
    /// If [`Progress::InProgress`] is returned, the operation has to be resumed by calling this
    /// function again with the same arguments and `resume` set to `true`.
    /// The default implementation completes synchronously using
    /// [`sign_ecdsa_digest`](SignCryptoBackend::sign_ecdsa_digest).
    ///
    /// # Errors
    ///
    /// See [`sign_ecdsa_digest`](SignCryptoBackend::sign_ecdsa_digest).
    #[allow(unused_variables)]
    fn sign_digest_restartable(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        digest: &[u8],
        resume: bool,
    ) -> Result<Progress<Vec<u8>>, CoseCipherError<Self::Error>> {
        self.sign_ecdsa_digest(alg, key, digest)
            .map(Progress::Complete)
    }
}

/// Builds the Sig_structure that is covered by a signature.
pub(crate) fn sig_structure<BE: Display>(
    message_type: MessageType,
    body_protected: &[u8],
    signer_protected: Option<&[u8]>,
    aad: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>, CoseCipherError<BE>> {
    let mut items = vec![
        Value::Text(message_type.context().to_string()),
        Value::Bytes(body_protected.to_vec()),
    ];
    if let Some(signer_protected) = signer_protected {
        items.push(Value::Bytes(signer_protected.to_vec()));
    }
    items.push(Value::Bytes(aad.to_vec()));
    items.push(Value::Bytes(payload.to_vec()));
    cbor::encode(&Value::Array(items))
}

/// Inputs of a signing operation, provided by the [`SignEncoder`].
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    /// Type of the message, either [`MessageType::Sign1`] or [`MessageType::Sign`].
    pub message_type: MessageType,
    /// Encoded protected bucket of the message body.
    pub body_protected: &'a [u8],
    /// The payload (also if it is transmitted detached).
    pub payload: &'a [u8],
    /// Externally supplied additional authenticated data.
    pub aad: &'a [u8],
    /// Whether only the size of the output has to be determined.
    pub size_only: bool,
}

impl SigningContext<'_> {
    /// Encodes the signer's own header buckets, which only exist for COSE_Sign.
    ///
    /// # Errors
    ///
    /// See [`encode_headers`].
    pub fn signer_headers<BE: Display>(
        &self,
        params: &[Parameter],
    ) -> Result<Option<EncodedHeaders>, CoseCipherError<BE>> {
        match self.message_type {
            MessageType::Sign => encode_headers(params).map(Some),
            _ => Ok(None),
        }
    }

    /// Builds the Sig_structure for the given signer headers.
    ///
    /// # Errors
    ///
    /// If the structure can not be encoded.
    pub fn to_be_signed<BE: Display>(
        &self,
        headers: Option<&EncodedHeaders>,
    ) -> Result<Vec<u8>, CoseCipherError<BE>> {
        sig_structure(
            self.message_type,
            self.body_protected,
            headers.map(|h| h.protected.as_slice()),
            self.aad,
            self.payload,
        )
    }

    /// Produces the signer's output: the raw signature for COSE_Sign1, a COSE_Signature
    /// structure for COSE_Sign.
    #[must_use]
    pub fn finish(&self, headers: Option<EncodedHeaders>, signature: Vec<u8>) -> Value {
        match headers {
            Some(headers) => Value::Array(vec![
                headers.protected_value(),
                headers.unprotected,
                Value::Bytes(signature),
            ]),
            None => Value::Bytes(signature),
        }
    }
}

/// Inputs of a verification operation, provided by the [`SignDecoder`].
#[derive(Debug, Clone, Copy)]
pub struct VerificationContext<'a> {
    /// Type of the message.
    pub message_type: MessageType,
    /// Raw protected bucket of the message body.
    pub body_protected: &'a [u8],
    /// Raw protected bucket of the COSE_Signature (COSE_Sign only).
    pub signer_protected: Option<&'a [u8]>,
    /// The payload.
    pub payload: &'a [u8],
    /// Externally supplied additional authenticated data.
    pub aad: &'a [u8],
}

impl VerificationContext<'_> {
    /// Builds the Sig_structure that the signature has to cover.
    ///
    /// # Errors
    ///
    /// If the structure can not be encoded.
    pub fn to_be_signed<BE: Display>(&self) -> Result<Vec<u8>, CoseCipherError<BE>> {
        sig_structure(
            self.message_type,
            self.body_protected,
            self.signer_protected,
            self.aad,
            self.payload,
        )
    }
}

/// Outcome of a [`Verifier`] invocation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The signature was verified.
    Verified,
    /// The signature's algorithm or key ID does not belong to this verifier.
    Declined,
}

/// A signature algorithm instance capable of signing.
pub trait Signer<B: SignCryptoBackend> {
    /// Header parameters this signer contributes, always including the protected algorithm
    /// identifier.
    fn header_parameters(&self) -> ParameterList;

    /// Signs the message described by `ctx`.
    ///
    /// Returns the raw signature (COSE_Sign1) or a COSE_Signature (COSE_Sign).
    ///
    /// # Errors
    ///
    /// If signing fails.
    fn sign(
        &mut self,
        backend: &mut B,
        ctx: &SigningContext<'_>,
    ) -> Result<Progress<Value>, CoseCipherError<B::Error>>;
}

/// A signature algorithm instance capable of verifying.
pub trait Verifier<B: SignCryptoBackend> {
    /// Verifies `signature`, whose header parameters are `params`.
    ///
    /// Returns [`VerifyOutcome::Declined`] if the algorithm or key ID indicate that the
    /// signature was not created by the counterpart of this verifier.
    ///
    /// # Errors
    ///
    /// [`CoseCipherError::VerificationFailure`] if the signature is invalid, or other errors if
    /// the verification could not be performed.
    fn verify(
        &mut self,
        backend: &mut B,
        ctx: &VerificationContext<'_>,
        params: &[Parameter],
        signature: &[u8],
    ) -> Result<VerifyOutcome, CoseCipherError<B::Error>>;
}

/// Returns the hash function for `alg`, or an error if it is not a hash-then-sign algorithm.
pub(crate) fn hash_algorithm<BE: Display>(
    alg: iana::Algorithm,
) -> Result<HashAlgorithm, CoseCipherError<BE>> {
    HashAlgorithm::for_signature_algorithm(alg).ok_or_else(|| unsupported(alg))
}

/// Decides whether a signature with the given header parameters is meant for a verifier
/// configured with `alg` and `kid`.
pub(crate) fn applies_to(
    params: &[Parameter],
    alg: iana::Algorithm,
    kid: Option<&[u8]>,
) -> bool {
    if params.find_alg_id(true) != Some(alg.to_i64()) {
        #[cfg(feature = "tracing")]
        tracing::debug!(expected = alg.to_i64(), "declining signature, algorithm differs");
        return false;
    }
    match (kid, params.find_kid()) {
        (Some(ours), Some(theirs)) if ours != theirs => {
            #[cfg(feature = "tracing")]
            tracing::debug!("declining signature, key ID differs");
            false
        }
        _ => true,
    }
}
