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
};
use crate::cose::header::{
    check_critical_parameters, check_iv_parameters, decode_headers, determine_algorithm,
    SpecialDecoder,
};
use crate::cose::message::{resolve_message_type, DecodeFlag, DecodedMessage, MessageType};
use crate::cose::param::{HeaderLocation, ParameterPool, Parameters};
use crate::cose::recipient::{
    ContentKey, KeyDistributionCryptoBackend, RecipientContext, RecipientDecoder,
    RecipientOutcome,
};
use crate::error::CoseCipherError;

/// Content key used for decryption, either borrowed or owned by the decoder.
enum DecryptionKey<'k, K> {
    Borrowed(&'k K),
    Owned(K),
}

/// Disassembles and decrypts COSE_Encrypt0 and COSE_Encrypt messages.
///
/// For COSE_Encrypt messages, every COSE_Recipient is offered to the registered recipient
/// decoders in the order they were added. A decoder that declines is skipped, the first
/// decoder that obtains the content key ends the search, and a decoder that fails aborts the
/// whole operation. Header parameters of declined recipients are removed from the pool again.
pub struct EncryptDecoder<'a, B: EncryptCryptoBackend + KeyDistributionCryptoBackend> {
    pinned: Option<MessageType>,
    key: Option<&'a B::Key>,
    recipients: Vec<&'a mut dyn RecipientDecoder<B>>,
    special: Option<&'a mut dyn SpecialDecoder>,
    understood: Vec<i64>,
    base_iv: Option<Vec<u8>>,
    flags: BitFlags<DecodeFlag>,
}

impl<B: EncryptCryptoBackend + KeyDistributionCryptoBackend> Default for EncryptDecoder<'_, B> {
    fn default() -> Self {
        EncryptDecoder {
            pinned: None,
            key: None,
            recipients: Vec::new(),
            special: None,
            understood: Vec::new(),
            base_iv: None,
            flags: BitFlags::empty(),
        }
    }
}

impl<'a, B: EncryptCryptoBackend + KeyDistributionCryptoBackend> EncryptDecoder<'a, B> {
    /// Creates a decoder that determines the message type from the message's tag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder that expects the given message type, which allows untagged messages.
    #[must_use]
    pub fn expecting(message_type: MessageType) -> Self {
        EncryptDecoder {
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

    /// Sets the base IV that partial IVs are combined with.
    #[must_use]
    pub fn with_base_iv(mut self, base_iv: impl Into<Vec<u8>>) -> Self {
        self.base_iv = Some(base_iv.into());
        self
    }

    /// Sets the decoder for body header parameters with non-trivial values.
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

    /// Sets the content encryption key of COSE_Encrypt0 messages.
    pub fn set_key(&mut self, key: &'a B::Key) {
        self.key = Some(key);
    }

    /// Adds a recipient decoder for COSE_Encrypt messages.
    pub fn add_recipient(&mut self, recipient: &'a mut dyn RecipientDecoder<B>) {
        self.recipients.push(recipient);
    }

    /// Decodes and decrypts `message`, using the external additional authenticated data
    /// `aad`.
    ///
    /// Decoded header parameters are placed into `pool`.
    ///
    /// # Errors
    ///
    /// - Format and header errors if the message is malformed.
    /// - [`CoseCipherError::MissingKey`] if no key was set for a COSE_Encrypt0 message.
    /// - [`CoseCipherError::NoApplicableRecipient`] if all recipient decoders declined all
    ///   recipients.
    /// - [`CoseCipherError::DataAuthenticationFailure`] if the ciphertext or associated data
    ///   were tampered with, or the key is wrong.
    /// - Errors of the recipient decoders.
    pub fn decrypt(
        &mut self,
        backend: &mut B,
        message: &[u8],
        aad: &[u8],
        pool: &mut ParameterPool,
    ) -> Result<DecodedMessage, CoseCipherError<B::Error>> {
        self.decode(backend, message, None, aad, pool)
    }

    /// Decodes and decrypts `message`, whose ciphertext is transmitted separately.
    ///
    /// # Errors
    ///
    /// See [`decrypt`](EncryptDecoder::decrypt). Additionally fails if the message contains a
    /// ciphertext.
    pub fn decrypt_detached(
        &mut self,
        backend: &mut B,
        message: &[u8],
        ciphertext: &[u8],
        aad: &[u8],
        pool: &mut ParameterPool,
    ) -> Result<DecodedMessage, CoseCipherError<B::Error>> {
        self.decode(backend, message, Some(ciphertext), aad, pool)
    }

    /// Runs the recipient trial loop and returns the content key of the first recipient a
    /// decoder did not decline.
    fn find_content_key(
        &mut self,
        backend: &mut B,
        content_alg: iana::Algorithm,
        recipients: Vec<Value>,
        pool: &mut ParameterPool,
    ) -> Result<ContentKey<B::Key>, CoseCipherError<B::Error>> {
        if recipients.is_empty() {
            return Err(CoseCipherError::NoRecipients);
        }
        for (index, recipient) in recipients.iter().enumerate() {
            let ctx = RecipientContext {
                location: HeaderLocation::new(
                    1,
                    cbor::location_index(index, "COSE_Encrypt recipients")?,
                ),
                content_alg,
            };
            for (decoder_index, decoder) in self.recipients.iter_mut().enumerate() {
                let mark = pool.used();
                match decoder.try_decode(backend, &ctx, recipient, pool)? {
                    RecipientOutcome::Decoded(key) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            recipient = index,
                            decoder = decoder_index,
                            "obtained content key"
                        );
                        return Ok(key);
                    }
                    RecipientOutcome::Declined => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(
                            recipient = index,
                            decoder = decoder_index,
                            "recipient declined"
                        );
                        #[cfg(not(feature = "tracing"))]
                        let _ = decoder_index;
                        pool.rewind(mark);
                    }
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            recipients = recipients.len(),
            decoders = self.recipients.len(),
            "no applicable recipient"
        );
        Err(CoseCipherError::NoApplicableRecipient)
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
            &[MessageType::Encrypt0, MessageType::Encrypt],
            self.pinned,
            self.flags,
        )?;
        let (protected, unprotected, ciphertext, recipients) = if message_type
            == MessageType::Encrypt0
        {
            let [protected, unprotected, ciphertext] = cbor::expect_array(inner, "COSE_Encrypt0")?;
            (protected, unprotected, ciphertext, None)
        } else {
            let [protected, unprotected, ciphertext, recipients] =
                cbor::expect_array(inner, "COSE_Encrypt")?;
            let recipients = cbor::expect_any_array(recipients, "COSE_Encrypt recipients")?;
            (protected, unprotected, ciphertext, Some(recipients))
        };

        let body = decode_headers(
            HeaderLocation::BODY,
            &protected,
            &unprotected,
            self.special.as_deref_mut(),
            pool,
        )?;
        let params = pool.get(body.parameters.clone());
        check_critical_parameters(params, &self.understood)?;
        check_iv_parameters(params)?;
        let alg = determine_algorithm(params, true)?;
        checked_key_length::<B::Error>(alg)?;
        let nonce = match (params.find_iv(), params.find_partial_iv()) {
            (Some(iv), _) => iv.to_vec(),
            (None, Some(partial_iv)) => {
                let base_iv = self
                    .base_iv
                    .as_deref()
                    .ok_or(CoseCipherError::MissingHeaderParam(iana::HeaderParameter::Iv))?;
                combine_partial_iv(base_iv, partial_iv)?
            }
            (None, None) => {
                return Err(CoseCipherError::MissingHeaderParam(
                    iana::HeaderParameter::Iv,
                ))
            }
        };

        let ciphertext = match (cbor::expect_bytes_or_null(ciphertext, "ciphertext")?, detached) {
            (Some(ciphertext), None) => ciphertext,
            (None, Some(ciphertext)) => ciphertext.to_vec(),
            (None, None) => {
                return Err(CoseCipherError::UnexpectedItem {
                    expected: "ciphertext (message has a detached ciphertext)",
                    context: "encrypted message",
                })
            }
            (Some(_), Some(_)) => {
                return Err(CoseCipherError::UnexpectedItem {
                    expected: "null ciphertext",
                    context: "encrypted message",
                })
            }
        };

        let key = match recipients {
            None => DecryptionKey::Borrowed(self.key.ok_or(CoseCipherError::MissingKey)?),
            Some(recipients) => match self.find_content_key(backend, alg, recipients, pool)? {
                ContentKey::Handle(key) => DecryptionKey::Owned(key),
                ContentKey::Bytes(cek) => DecryptionKey::Owned(backend.import_symmetric_key(&cek)?),
            },
        };

        let decryption_key = match &key {
            DecryptionKey::Borrowed(key) => *key,
            DecryptionKey::Owned(key) => key,
        };
        let plaintext = enc_structure(message_type, &body.protected, aad)
            .and_then(|aad| backend.decrypt_aead(alg, decryption_key, &ciphertext, &aad, &nonce));
        if let DecryptionKey::Owned(key) = key {
            backend.free_key(key);
        }
        let plaintext = plaintext?;

        Ok(DecodedMessage {
            message_type,
            content: plaintext,
            protected: body.protected,
            body_parameters: body.parameters,
        })
    }
}
