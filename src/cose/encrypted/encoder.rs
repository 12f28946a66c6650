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

use ciborium::Value;
use coset::iana;
use enumflags2::BitFlags;

use crate::cose::cbor;
use crate::cose::encrypted::{
    checked_key_length, combine_partial_iv, enc_structure, EncryptCryptoBackend,
    AEAD_NONCE_LENGTH, AEAD_TAG_LENGTH,
};
use crate::cose::header::{check_iv_parameters, encode_headers, EncodedHeaders};
use crate::cose::message::{apply_tag, EncodeFlag, MessageType};
use crate::cose::output::Output;
use crate::cose::param::{Parameter, ParameterList};
use crate::cose::recipient::{KeyDistributionCryptoBackend, RecipientEncoder};
use crate::error::CoseCipherError;

/// How the nonce of the message is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IvSource {
    /// A random IV is generated and transmitted.
    Random,
    /// The given IV is transmitted.
    Full(Vec<u8>),
    /// The partial IV is transmitted, the base IV is known to the recipient.
    Partial { partial: Vec<u8>, base: Vec<u8> },
}

/// Assembles COSE_Encrypt0 and COSE_Encrypt messages.
///
/// For COSE_Encrypt0, the content encryption key is set using
/// [`set_key`](EncryptEncoder::set_key). For COSE_Encrypt, a random content encryption key is
/// generated and conveyed to every recipient, unless a direct key recipient supplies the key,
/// in which case it has to be the only recipient.
///
/// Recipients are created in the order they were added.
pub struct EncryptEncoder<'a, B: EncryptCryptoBackend + KeyDistributionCryptoBackend> {
    message_type: MessageType,
    alg: iana::Algorithm,
    key: Option<&'a B::Key>,
    recipients: Vec<&'a mut dyn RecipientEncoder<B>>,
    body_parameters: ParameterList,
    iv: IvSource,
    flags: BitFlags<EncodeFlag>,
}

impl<'a, B: EncryptCryptoBackend + KeyDistributionCryptoBackend> EncryptEncoder<'a, B> {
    fn new(message_type: MessageType, alg: iana::Algorithm) -> Self {
        EncryptEncoder {
            message_type,
            alg,
            key: None,
            recipients: Vec::new(),
            body_parameters: ParameterList::new(),
            iv: IvSource::Random,
            flags: BitFlags::empty(),
        }
    }

    /// Creates an encoder for COSE_Encrypt0 messages using the content encryption algorithm
    /// `alg`.
    #[must_use]
    pub fn encrypt0(alg: iana::Algorithm) -> Self {
        Self::new(MessageType::Encrypt0, alg)
    }

    /// Creates an encoder for COSE_Encrypt messages using the content encryption algorithm
    /// `alg`.
    #[must_use]
    pub fn cose_encrypt(alg: iana::Algorithm) -> Self {
        Self::new(MessageType::Encrypt, alg)
    }

    /// Sets the encoding flags.
    #[must_use]
    pub fn with_flags(mut self, flags: BitFlags<EncodeFlag>) -> Self {
        self.flags = flags;
        self
    }

    /// Uses the given IV instead of a randomly generated one.
    #[must_use]
    pub fn with_iv(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.iv = IvSource::Full(iv.into());
        self
    }

    /// Transmits `partial_iv` instead of a full IV. The nonce is derived from it and
    /// `base_iv`, which the recipient has to know in advance.
    #[must_use]
    pub fn with_partial_iv(
        mut self,
        partial_iv: impl Into<Vec<u8>>,
        base_iv: impl Into<Vec<u8>>,
    ) -> Self {
        self.iv = IvSource::Partial {
            partial: partial_iv.into(),
            base: base_iv.into(),
        };
        self
    }

    /// Sets the content encryption key of a COSE_Encrypt0 message.
    pub fn set_key(&mut self, key: &'a B::Key) {
        self.key = Some(key);
    }

    /// Adds a recipient to a COSE_Encrypt message.
    pub fn add_recipient(&mut self, recipient: &'a mut dyn RecipientEncoder<B>) {
        self.recipients.push(recipient);
    }

    /// Adds a header parameter to the message body.
    pub fn add_body_parameter(&mut self, param: Parameter) {
        self.body_parameters.push(param);
    }

    /// Adds header parameters to the message body.
    pub fn add_body_parameters(&mut self, params: ParameterList) {
        self.body_parameters.append(params);
    }

    /// Determines the nonce and adds the parameter transmitting it to `params`.
    fn nonce(
        &self,
        backend: &mut B,
        params: &mut ParameterList,
        size_only: bool,
    ) -> Result<Vec<u8>, CoseCipherError<B::Error>> {
        match &self.iv {
            IvSource::Random => {
                let mut iv = vec![0u8; AEAD_NONCE_LENGTH];
                if !size_only {
                    backend.generate_rand(&mut iv).map_err(CoseCipherError::Other)?;
                }
                params.push(Parameter::iv(iv.clone()));
                Ok(iv)
            }
            IvSource::Full(iv) => {
                params.push(Parameter::iv(iv.clone()));
                Ok(iv.clone())
            }
            IvSource::Partial { partial, base } => {
                params.push(Parameter::partial_iv(partial.clone()));
                combine_partial_iv(base, partial)
            }
        }
    }

    /// Creates the COSE_Recipient structures and returns them along with the content key
    /// generated for them, if any.
    fn create_recipients(
        &mut self,
        backend: &mut B,
        size_only: bool,
    ) -> Result<(Vec<Value>, Option<B::Key>), CoseCipherError<B::Error>> {
        if self.recipients.is_empty() {
            return Err(CoseCipherError::NoRecipients);
        }
        let direct = self
            .recipients
            .iter()
            .any(|r| r.content_key().is_some());
        if direct && self.recipients.len() > 1 {
            return Err(CoseCipherError::DirectRecipientNotAlone);
        }

        let mut cek = Vec::new();
        if !direct {
            cek = vec![0u8; checked_key_length(self.alg)?];
            if !size_only {
                backend.generate_rand(&mut cek).map_err(CoseCipherError::Other)?;
            }
        }
        let mut recipients = Vec::with_capacity(self.recipients.len());
        for (index, recipient) in self.recipients.iter_mut().enumerate() {
            match recipient.create(backend, &cek, self.alg, size_only) {
                Ok(value) => recipients.push(value),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, index, "creating recipient failed");
                    #[cfg(not(feature = "tracing"))]
                    let _ = index;
                    return Err(e);
                }
            }
        }
        let generated = if direct || size_only {
            None
        } else {
            Some(backend.import_symmetric_key(&cek)?)
        };
        Ok((recipients, generated))
    }

    /// Encodes the message and returns it along with the ciphertext.
    fn encode(
        &mut self,
        backend: &mut B,
        plaintext: &[u8],
        aad: &[u8],
        size_only: bool,
    ) -> Result<(Vec<u8>, Vec<u8>), CoseCipherError<B::Error>> {
        checked_key_length::<B::Error>(self.alg)?;

        let (recipients, generated) = match self.message_type {
            MessageType::Encrypt => {
                let (recipients, generated) = self.create_recipients(backend, size_only)?;
                (Some(recipients), generated)
            }
            _ => {
                if !self.recipients.is_empty() {
                    return Err(CoseCipherError::UnexpectedMessageType(self.message_type));
                }
                (None, None)
            }
        };

        let result = self.encrypt_body(backend, plaintext, aad, size_only, generated.as_ref());
        if let Some(generated) = generated {
            backend.free_key(generated);
        }
        let (headers, ciphertext) = result?;

        let content = if self.flags.contains(EncodeFlag::DetachedPayload) {
            Value::Null
        } else {
            Value::Bytes(ciphertext.clone())
        };
        let mut message = vec![headers.protected_value(), headers.unprotected, content];
        if let Some(recipients) = recipients {
            message.push(Value::Array(recipients));
        }
        let encoded = cbor::encode(&apply_tag(
            self.message_type,
            Value::Array(message),
            self.flags,
        ))?;
        Ok((encoded, ciphertext))
    }

    /// Encrypts the content and returns the body headers and the ciphertext.
    fn encrypt_body(
        &self,
        backend: &mut B,
        plaintext: &[u8],
        aad: &[u8],
        size_only: bool,
        generated: Option<&B::Key>,
    ) -> Result<(EncodedHeaders, Vec<u8>), CoseCipherError<B::Error>> {
        let mut params = ParameterList::new();
        params.push(Parameter::alg(self.alg));
        params.append(self.body_parameters.clone());
        let nonce = self.nonce(backend, &mut params, size_only)?;
        check_iv_parameters(&params)?;
        let headers = encode_headers(&params)?;

        if size_only {
            return Ok((headers, vec![0u8; plaintext.len() + AEAD_TAG_LENGTH]));
        }
        let key = generated
            .or(self.key)
            .or_else(|| self.recipients.iter().find_map(|r| r.content_key()))
            .ok_or(CoseCipherError::MissingKey)?;
        let aad = enc_structure(self.message_type, &headers.protected, aad)?;
        let ciphertext = backend.encrypt_aead(self.alg, key, plaintext, &aad, &nonce)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            message_type = %self.message_type,
            len = ciphertext.len(),
            "encrypted message content"
        );
        Ok((headers, ciphertext))
    }

    /// Encrypts `plaintext` (with the external additional authenticated data `aad`) and
    /// writes the resulting message to `output`.
    ///
    /// Returns the length of the message. With [`EncodeFlag::DetachedPayload`], the
    /// ciphertext is not part of the message, use
    /// [`encrypt_detached`](EncryptEncoder::encrypt_detached) to obtain it.
    ///
    /// # Errors
    ///
    /// - [`CoseCipherError::MissingKey`] if no key was set for COSE_Encrypt0.
    /// - [`CoseCipherError::NoRecipients`] or [`CoseCipherError::DirectRecipientNotAlone`] if
    ///   the recipients of a COSE_Encrypt message are not valid.
    /// - [`CoseCipherError::BufferTooSmall`] if `output` is too small.
    /// - Header encoding errors, errors of the recipients and of the backend.
    pub fn encrypt(
        &mut self,
        backend: &mut B,
        plaintext: &[u8],
        aad: &[u8],
        output: Output<'_>,
    ) -> Result<usize, CoseCipherError<B::Error>> {
        let (encoded, _) = self.encode(backend, plaintext, aad, output.is_size_only())?;
        output.write(&encoded)
    }

    /// Encrypts `plaintext` and returns the resulting message.
    ///
    /// # Errors
    ///
    /// See [`encrypt`](EncryptEncoder::encrypt).
    pub fn encrypt_to_vec(
        &mut self,
        backend: &mut B,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<B::Error>> {
        self.encode(backend, plaintext, aad, false)
            .map(|(encoded, _)| encoded)
    }

    /// Encrypts `plaintext` and returns the message (with a `null` ciphertext) along with the
    /// ciphertext, which has to be transmitted separately.
    ///
    /// # Errors
    ///
    /// See [`encrypt`](EncryptEncoder::encrypt).
    pub fn encrypt_detached(
        &mut self,
        backend: &mut B,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), CoseCipherError<B::Error>> {
        let flags = self.flags;
        self.flags |= EncodeFlag::DetachedPayload;
        let result = self.encode(backend, plaintext, aad, false);
        self.flags = flags;
        result
    }
}
