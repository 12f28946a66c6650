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

use core::mem;

use ciborium::Value;
use enumflags2::BitFlags;

use crate::cose::header::encode_headers;
use crate::cose::message::{apply_tag, EncodeFlag, MessageType};
use crate::cose::output::Output;
use crate::cose::param::{Parameter, ParameterList};
use crate::cose::signed::{SignCryptoBackend, Signer, SigningContext};
use crate::cose::{cbor, Progress};
use crate::error::CoseCipherError;

/// Assembles COSE_Sign1 and COSE_Sign messages.
///
/// Signers are invoked in the order they were added, which is also the order of the
/// COSE_Signature structures in a COSE_Sign message.
///
/// If a signer reports [`Progress::InProgress`], [`sign`](SignEncoder::sign) returns
/// [`Progress::InProgress`] as well and has to be called again with the same inputs. Signers
/// that already completed are not invoked again.
///
/// # Example
///
/// ```ignore
/// let mut signer = MainSigner::new(iana::Algorithm::ES256, &key).with_kid(b"11".to_vec());
/// let mut encoder = SignEncoder::sign1();
/// encoder.add_signer(&mut signer);
/// let message = encoder.sign_to_vec(&mut backend, b"payload", b"")?;
/// ```
pub struct SignEncoder<'a, B: SignCryptoBackend> {
    message_type: MessageType,
    signers: Vec<&'a mut dyn Signer<B>>,
    body_parameters: ParameterList,
    flags: BitFlags<EncodeFlag>,
    completed: Vec<Value>,
}

impl<'a, B: SignCryptoBackend> SignEncoder<'a, B> {
    fn new(message_type: MessageType) -> Self {
        SignEncoder {
            message_type,
            signers: Vec::new(),
            body_parameters: ParameterList::new(),
            flags: BitFlags::empty(),
            completed: Vec::new(),
        }
    }

    /// Creates an encoder for COSE_Sign1 messages, which requires exactly one signer.
    #[must_use]
    pub fn sign1() -> Self {
        Self::new(MessageType::Sign1)
    }

    /// Creates an encoder for COSE_Sign messages, which requires at least one signer.
    #[must_use]
    pub fn cose_sign() -> Self {
        Self::new(MessageType::Sign)
    }

    /// Sets the encoding flags.
    #[must_use]
    pub fn with_flags(mut self, flags: BitFlags<EncodeFlag>) -> Self {
        self.flags = flags;
        self
    }

    /// Adds a signer.
    pub fn add_signer(&mut self, signer: &'a mut dyn Signer<B>) {
        self.signers.push(signer);
    }

    /// Adds a header parameter to the message body.
    pub fn add_body_parameter(&mut self, param: Parameter) {
        self.body_parameters.push(param);
    }

    /// Adds header parameters to the message body.
    pub fn add_body_parameters(&mut self, params: ParameterList) {
        self.body_parameters.append(params);
    }

    fn check_signer_count(&self) -> Result<(), CoseCipherError<B::Error>> {
        let count = self.signers.len();
        match self.message_type {
            MessageType::Sign1 if count != 1 => Err(CoseCipherError::InvalidSignerCount(count)),
            MessageType::Sign if count == 0 => Err(CoseCipherError::InvalidSignerCount(count)),
            _ => Ok(()),
        }
    }

    fn encode(
        &mut self,
        backend: &mut B,
        payload: &[u8],
        aad: &[u8],
        size_only: bool,
    ) -> Result<Progress<Vec<u8>>, CoseCipherError<B::Error>> {
        self.check_signer_count()?;

        let mut body_parameters = self.body_parameters.clone();
        if self.message_type == MessageType::Sign1 {
            for signer in &self.signers {
                body_parameters.append(signer.header_parameters());
            }
        }
        let body = encode_headers(&body_parameters)?;

        let ctx = SigningContext {
            message_type: self.message_type,
            body_protected: &body.protected,
            payload,
            aad,
            size_only,
        };
        while self.completed.len() < self.signers.len() {
            let index = self.completed.len();
            match self.signers[index].sign(backend, &ctx) {
                Ok(Progress::Complete(signature)) => self.completed.push(signature),
                Ok(Progress::InProgress) => return Ok(Progress::InProgress),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, index, "signer failed");
                    self.completed.clear();
                    return Err(e);
                }
            }
        }
        let mut signatures = mem::take(&mut self.completed);

        let payload = if self.flags.contains(EncodeFlag::DetachedPayload) {
            Value::Null
        } else {
            Value::Bytes(payload.to_vec())
        };
        let signatures = match (self.message_type, signatures.pop()) {
            (MessageType::Sign1, Some(signature)) => signature,
            _ => Value::Array(signatures),
        };
        let message = Value::Array(vec![
            body.protected_value(),
            body.unprotected,
            payload,
            signatures,
        ]);
        cbor::encode(&apply_tag(self.message_type, message, self.flags)).map(Progress::Complete)
    }

    /// Signs `payload` (with the external additional authenticated data `aad`) and writes the
    /// resulting message to `output`.
    ///
    /// Returns the length of the message.
    ///
    /// # Errors
    ///
    /// - [`CoseCipherError::InvalidSignerCount`] if the number of signers does not fit the
    ///   message type.
    /// - [`CoseCipherError::BufferTooSmall`] if `output` is too small.
    /// - Header encoding errors and errors of the signers.
    pub fn sign(
        &mut self,
        backend: &mut B,
        payload: &[u8],
        aad: &[u8],
        output: Output<'_>,
    ) -> Result<Progress<usize>, CoseCipherError<B::Error>> {
        match self.encode(backend, payload, aad, output.is_size_only())? {
            Progress::Complete(encoded) => output.write(&encoded).map(Progress::Complete),
            Progress::InProgress => Ok(Progress::InProgress),
        }
    }

    /// Signs `payload` and returns the resulting message.
    ///
    /// # Errors
    ///
    /// See [`sign`](SignEncoder::sign).
    pub fn sign_to_vec(
        &mut self,
        backend: &mut B,
        payload: &[u8],
        aad: &[u8],
    ) -> Result<Progress<Vec<u8>>, CoseCipherError<B::Error>> {
        self.encode(backend, payload, aad, false)
    }
}
