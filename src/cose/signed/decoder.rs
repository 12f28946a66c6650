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

use core::ops::Range;

use ciborium::Value;
use enumflags2::BitFlags;

use crate::cose::cbor;
use crate::cose::header::{
    algorithm_id, check_critical_parameters, decode_headers, SpecialDecoder,
};
use crate::cose::message::{resolve_message_type, DecodeFlag, DecodedMessage, MessageType};
use crate::cose::param::{HeaderLocation, ParameterPool};
use crate::cose::signed::{SignCryptoBackend, VerificationContext, Verifier, VerifyOutcome};
use crate::error::CoseCipherError;

/// Disassembles and verifies COSE_Sign1 and COSE_Sign messages.
///
/// Each signature is offered to the registered verifiers in the order they were added, until
/// one of them verifies it. A verifier that declines (because the algorithm or key ID does
/// not match) is skipped, a verifier that fails aborts the whole operation.
///
/// A COSE_Sign message is accepted if at least one of its signatures was verified, or, if
/// [`DecodeFlag::VerifyAllSignatures`] is set, if all of them were. Signatures with unknown
/// algorithms are declined by every verifier. Header parameters of signatures that no
/// verifier accepted are dropped from the pool.
pub struct SignDecoder<'a, B: SignCryptoBackend> {
    pinned: Option<MessageType>,
    verifiers: Vec<&'a mut dyn Verifier<B>>,
    special: Option<&'a mut dyn SpecialDecoder>,
    understood: Vec<i64>,
    flags: BitFlags<DecodeFlag>,
}

impl<B: SignCryptoBackend> Default for SignDecoder<'_, B> {
    fn default() -> Self {
        SignDecoder {
            pinned: None,
            verifiers: Vec::new(),
            special: None,
            understood: Vec::new(),
            flags: BitFlags::empty(),
        }
    }
}

impl<'a, B: SignCryptoBackend> SignDecoder<'a, B> {
    /// Creates a decoder that determines the message type from the message's tag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder that expects the given message type, which allows untagged messages.
    #[must_use]
    pub fn expecting(message_type: MessageType) -> Self {
        SignDecoder {
            pinned: Some(message_type),
            ..Self::default()
        }
    }

    /// Sets the decoding flags.
    #[must_use]
    pub fn with_flags(mut self, flags: BitFlags<DecodeFlag>) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the decoder for header parameters with non-trivial values.
    #[must_use]
    pub fn with_special_decoder(mut self, special: &'a mut dyn SpecialDecoder) -> Self {
        self.special = Some(special);
        self
    }

    /// Declares that the application understands the header parameter `label`, which allows it
    /// to be marked as critical.
    pub fn understand_label(&mut self, label: i64) {
        self.understood.push(label);
    }

    /// Adds a verifier.
    pub fn add_verifier(&mut self, verifier: &'a mut dyn Verifier<B>) {
        self.verifiers.push(verifier);
    }

    /// Decodes and verifies `message`, using the external additional authenticated data
    /// `aad`.
    ///
    /// Decoded header parameters are placed into `pool`.
    ///
    /// # Errors
    ///
    /// - Format and header errors if the message is malformed.
    /// - [`CoseCipherError::VerificationFailure`] if a signature is invalid.
    /// - [`CoseCipherError::NoApplicableVerifier`] if no signature could be verified.
    pub fn verify(
        &mut self,
        backend: &mut B,
        message: &[u8],
        aad: &[u8],
        pool: &mut ParameterPool,
    ) -> Result<DecodedMessage, CoseCipherError<B::Error>> {
        self.decode(backend, message, None, aad, pool)
    }

    /// Decodes and verifies `message`, whose payload is transmitted separately.
    ///
    /// # Errors
    ///
    /// See [`verify`](SignDecoder::verify). Additionally fails if the message contains a
    /// payload.
    pub fn verify_detached(
        &mut self,
        backend: &mut B,
        message: &[u8],
        payload: &[u8],
        aad: &[u8],
        pool: &mut ParameterPool,
    ) -> Result<DecodedMessage, CoseCipherError<B::Error>> {
        self.decode(backend, message, Some(payload), aad, pool)
    }

    /// Offers the signature to the verifiers until one of them does not decline.
    fn try_verifiers(
        &mut self,
        backend: &mut B,
        ctx: &VerificationContext<'_>,
        pool: &ParameterPool,
        params: Range<usize>,
        signature: &[u8],
    ) -> Result<bool, CoseCipherError<B::Error>> {
        let params = pool.get(params);
        for (index, verifier) in self.verifiers.iter_mut().enumerate() {
            match verifier.verify(backend, ctx, params, signature)? {
                VerifyOutcome::Verified => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(verifier = index, "signature verified");
                    return Ok(true);
                }
                VerifyOutcome::Declined => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(verifier = index, "verifier declined signature");
                    #[cfg(not(feature = "tracing"))]
                    let _ = index;
                }
            }
        }
        Ok(false)
    }

    fn decode(
        &mut self,
        backend: &mut B,
        message: &[u8],
        detached: Option<&[u8]>,
        aad: &[u8],
        pool: &mut ParameterPool,
    ) -> Result<DecodedMessage, CoseCipherError<B::Error>> {
        let (message_type, inner) = resolve_message_type(
            cbor::decode(message)?,
            &[MessageType::Sign1, MessageType::Sign],
            self.pinned,
            self.flags,
        )?;
        let [protected, unprotected, payload, signatures] =
            cbor::expect_array(inner, "signed message")?;

        let body = decode_headers(
            HeaderLocation::BODY,
            &protected,
            &unprotected,
            self.special.as_deref_mut(),
            pool,
        )?;
        check_critical_parameters(pool.get(body.parameters.clone()), &self.understood)?;

        let payload = match (payload, detached) {
            (Value::Bytes(payload), None) => payload,
            (Value::Null, Some(payload)) => payload.to_vec(),
            (Value::Null, None) => {
                return Err(CoseCipherError::UnexpectedItem {
                    expected: "payload (message has a detached payload)",
                    context: "signed message",
                })
            }
            (_, _) => {
                return Err(CoseCipherError::UnexpectedItem {
                    expected: if detached.is_some() {
                        "null payload"
                    } else {
                        "byte string payload"
                    },
                    context: "signed message",
                })
            }
        };

        let verified = if message_type == MessageType::Sign1 {
            algorithm_id::<B::Error>(pool.get(body.parameters.clone()), true)?;
            let signature = cbor::expect_bytes(signatures, "COSE_Sign1 signature")?;
            let ctx = VerificationContext {
                message_type,
                body_protected: &body.protected,
                signer_protected: None,
                payload: &payload,
                aad,
            };
            self.try_verifiers(backend, &ctx, pool, body.parameters.clone(), &signature)?
        } else {
            let signatures = cbor::expect_any_array(signatures, "COSE_Sign signatures")?;
            if signatures.is_empty() {
                return Err(CoseCipherError::InvalidSignerCount(0));
            }
            let mut verified = 0usize;
            let count = signatures.len();
            for (index, signature) in signatures.into_iter().enumerate() {
                let [protected, unprotected, signature] =
                    cbor::expect_array(signature, "COSE_Signature")?;
                let location =
                    HeaderLocation::new(1, cbor::location_index(index, "COSE_Sign signatures")?);
                let mark = pool.used();
                let headers = decode_headers(
                    location,
                    &protected,
                    &unprotected,
                    self.special.as_deref_mut(),
                    pool,
                )?;
                check_critical_parameters(pool.get(headers.parameters.clone()), &self.understood)?;
                // Unknown algorithms are left to the verifiers, which decline them.
                algorithm_id::<B::Error>(pool.get(headers.parameters.clone()), true)?;
                let signature = cbor::expect_bytes(signature, "COSE_Signature signature")?;
                let ctx = VerificationContext {
                    message_type,
                    body_protected: &body.protected,
                    signer_protected: Some(&headers.protected),
                    payload: &payload,
                    aad,
                };
                if self.try_verifiers(backend, &ctx, pool, headers.parameters, &signature)? {
                    verified += 1;
                } else if self.flags.contains(DecodeFlag::VerifyAllSignatures) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(index, "no verifier applicable to signature");
                    return Err(CoseCipherError::NoApplicableVerifier);
                } else {
                    pool.rewind(mark);
                }
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(verified, count, "verified signatures of COSE_Sign message");
            #[cfg(not(feature = "tracing"))]
            let _ = count;
            verified > 0
        };

        if !verified {
            return Err(CoseCipherError::NoApplicableVerifier);
        }
        Ok(DecodedMessage {
            message_type,
            content: payload,
            protected: body.protected,
            body_parameters: body.parameters,
        })
    }
}
