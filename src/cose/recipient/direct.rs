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

use crate::cose::cbor;
use crate::cose::header::{decode_headers, encode_headers};
use crate::cose::param::{Parameter, ParameterList, ParameterPool};
use crate::cose::recipient::{
    check_no_protected, recipient_applies, split_recipient, unprotected_alg, ContentKey,
    KeyDistributionCryptoBackend, RecipientContext, RecipientDecoder, RecipientEncoder,
    RecipientOutcome,
};
use crate::error::CoseCipherError;

/// Recipient for a content encryption key that is already shared with the recipient.
///
/// The shared key is used as the content encryption key itself, so a message can only have
/// one such recipient.
pub struct DirectRecipientEncoder<'a, B: KeyDistributionCryptoBackend> {
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
}

impl<'a, B: KeyDistributionCryptoBackend> DirectRecipientEncoder<'a, B> {
    /// Creates a recipient using the shared `key`.
    #[must_use]
    pub fn new(key: &'a B::Key) -> Self {
        DirectRecipientEncoder { key, kid: None }
    }

    /// Identifies the shared key by `kid`.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

impl<B: KeyDistributionCryptoBackend> RecipientEncoder<B> for DirectRecipientEncoder<'_, B> {
    fn content_key(&self) -> Option<&B::Key> {
        Some(self.key)
    }

    fn create(
        &mut self,
        _backend: &mut B,
        _cek: &[u8],
        _content_alg: iana::Algorithm,
        _size_only: bool,
    ) -> Result<Value, CoseCipherError<B::Error>> {
        // Direct recipients carry no protected headers.
        let mut params = ParameterList::new();
        params.push(unprotected_alg(iana::Algorithm::Direct));
        if let Some(kid) = &self.kid {
            params.push(Parameter::kid(kid.clone()));
        }
        let headers = encode_headers(&params)?;
        Ok(Value::Array(vec![
            headers.protected_value(),
            headers.unprotected,
            Value::Bytes(Vec::new()),
        ]))
    }
}

/// Decoder for recipients using a directly shared content encryption key.
pub struct DirectRecipientDecoder<'a, B: KeyDistributionCryptoBackend> {
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
}

impl<'a, B: KeyDistributionCryptoBackend> DirectRecipientDecoder<'a, B> {
    /// Creates a decoder using the shared `key`.
    #[must_use]
    pub fn new(key: &'a B::Key) -> Self {
        DirectRecipientDecoder { key, kid: None }
    }

    /// Only accepts recipients that carry no key ID or the given one.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

impl<B> RecipientDecoder<B> for DirectRecipientDecoder<'_, B>
where
    B: KeyDistributionCryptoBackend,
    B::Key: Clone,
{
    fn try_decode(
        &mut self,
        _backend: &mut B,
        ctx: &RecipientContext,
        recipient: &Value,
        pool: &mut ParameterPool,
    ) -> Result<RecipientOutcome<B::Key>, CoseCipherError<B::Error>> {
        let (protected, unprotected, ciphertext) = split_recipient(recipient)?;
        let headers = decode_headers(ctx.location, &protected, &unprotected, None, pool)?;
        let params = pool.get(headers.parameters);
        let applies =
            recipient_applies::<B::Error>(params, iana::Algorithm::Direct, self.kid.as_deref())?;
        if !applies {
            return Ok(RecipientOutcome::Declined);
        }
        check_no_protected(&protected)?;
        if !cbor::expect_bytes(ciphertext, "COSE_Recipient ciphertext")?.is_empty() {
            return Err(CoseCipherError::UnexpectedItem {
                expected: "empty ciphertext",
                context: "direct key recipient",
            });
        }
        Ok(RecipientOutcome::Decoded(ContentKey::Handle(self.key.clone())))
    }
}
