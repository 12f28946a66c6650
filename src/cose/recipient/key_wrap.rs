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
    check_no_protected, key_wrap_key_size, recipient_applies, split_recipient, unprotected_alg,
    ContentKey, KeyDistributionCryptoBackend, RecipientContext, RecipientDecoder,
    RecipientEncoder, RecipientOutcome,
};
use crate::cose::unsupported;
use crate::error::CoseCipherError;

/// Length of the integrity check value prepended by AES key wrap.
const KEY_WRAP_OVERHEAD: usize = 8;

fn key_wrap_parameters(alg: iana::Algorithm, kid: Option<&[u8]>) -> ParameterList {
    let mut params = ParameterList::new();
    params.push(unprotected_alg(alg));
    if let Some(kid) = kid {
        params.push(Parameter::kid(kid.to_vec()));
    }
    params
}

/// Recipient that wraps the content encryption key with a key encryption key (A128KW, A192KW
/// or A256KW).
///
/// AES key wrap does not protect any header parameters, so all of them are unprotected.
pub struct KeyWrapRecipientEncoder<'a, B: KeyDistributionCryptoBackend> {
    alg: iana::Algorithm,
    kek: &'a B::Key,
    kid: Option<Vec<u8>>,
}

impl<'a, B: KeyDistributionCryptoBackend> KeyWrapRecipientEncoder<'a, B> {
    /// Creates a recipient wrapping the content key with `kek` using `alg`.
    #[must_use]
    pub fn new(alg: iana::Algorithm, kek: &'a B::Key) -> Self {
        KeyWrapRecipientEncoder {
            alg,
            kek,
            kid: None,
        }
    }

    /// Identifies the key encryption key by `kid`.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

impl<B: KeyDistributionCryptoBackend> RecipientEncoder<B> for KeyWrapRecipientEncoder<'_, B> {
    fn create(
        &mut self,
        backend: &mut B,
        cek: &[u8],
        _content_alg: iana::Algorithm,
        size_only: bool,
    ) -> Result<Value, CoseCipherError<B::Error>> {
        key_wrap_key_size(self.alg).ok_or_else(|| unsupported(self.alg))?;
        let headers = encode_headers(&key_wrap_parameters(self.alg, self.kid.as_deref()))?;
        let wrapped = if size_only {
            vec![0u8; cek.len() + KEY_WRAP_OVERHEAD]
        } else {
            backend.aes_key_wrap(self.alg, self.kek, cek)?
        };
        Ok(Value::Array(vec![
            headers.protected_value(),
            headers.unprotected,
            Value::Bytes(wrapped),
        ]))
    }
}

/// Decoder for recipients whose content key is wrapped with AES key wrap.
pub struct KeyWrapRecipientDecoder<'a, B: KeyDistributionCryptoBackend> {
    alg: iana::Algorithm,
    kek: &'a B::Key,
    kid: Option<Vec<u8>>,
}

impl<'a, B: KeyDistributionCryptoBackend> KeyWrapRecipientDecoder<'a, B> {
    /// Creates a decoder unwrapping content keys with `kek` using `alg`.
    #[must_use]
    pub fn new(alg: iana::Algorithm, kek: &'a B::Key) -> Self {
        KeyWrapRecipientDecoder {
            alg,
            kek,
            kid: None,
        }
    }

    /// Only accepts recipients that carry no key ID or the given one.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

impl<B: KeyDistributionCryptoBackend> RecipientDecoder<B> for KeyWrapRecipientDecoder<'_, B> {
    fn try_decode(
        &mut self,
        backend: &mut B,
        ctx: &RecipientContext,
        recipient: &Value,
        pool: &mut ParameterPool,
    ) -> Result<RecipientOutcome<B::Key>, CoseCipherError<B::Error>> {
        let (protected, unprotected, ciphertext) = split_recipient(recipient)?;
        let headers = decode_headers(ctx.location, &protected, &unprotected, None, pool)?;
        let params = pool.get(headers.parameters);
        if !recipient_applies::<B::Error>(params, self.alg, self.kid.as_deref())? {
            return Ok(RecipientOutcome::Declined);
        }
        check_no_protected(&protected)?;
        let wrapped = cbor::expect_bytes(ciphertext, "COSE_Recipient ciphertext")?;
        let cek = backend.aes_key_unwrap(self.alg, self.kek, &wrapped)?;
        Ok(RecipientOutcome::Decoded(ContentKey::Bytes(cek)))
    }
}
