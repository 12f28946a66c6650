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

//! Ephemeral-static ECDH with AES key wrap (RFC 9053, Section 6.3).
//!
//! The sender generates an ephemeral key pair for every message and transmits its public key
//! in the recipient's unprotected headers. Both sides compute the shared secret from one
//! ephemeral and one static key, derive a key encryption key from it using HKDF-SHA-256 with a
//! [`KdfContext`] as info, and wrap or unwrap the content encryption key with it.

use core::fmt::Display;
use std::sync::Arc;

use ciborium::Value;
use coset::{iana, AsCborValue, CoseKey, CoseKeyBuilder, Label};

use crate::cose::cbor;
use crate::cose::header::{
    check_critical_parameters, decode_headers, encode_headers,
    ParameterPeek, SpecialDecode, SpecialDecoder,
};
use crate::cose::key::{ec2_coordinate_size, CoseEc2Key, EllipticCurve};
use crate::cose::param::{
    ParamValue, Parameter, ParameterList, ParameterPool, Parameters, SpecialParameter,
};
use crate::cose::recipient::kdf::{KdfContext, KdfContextInputs, DEFAULT_KDF_CONTEXT_SIZE};
use crate::cose::recipient::{
    esdh_key_wrap_algorithm, key_wrap_key_size, recipient_applies, split_recipient, ContentKey,
    KeyDistributionCryptoBackend, RecipientContext, RecipientDecoder, RecipientEncoder,
    RecipientOutcome,
};
use crate::cose::{unsupported, HashAlgorithm};
use crate::error::{CoseCipherError, InvalidParameter};

const EPHEMERAL_KEY: i64 = -1;
const PARTY_U_IDENTITY: i64 = -21;
const PARTY_V_IDENTITY: i64 = -24;

/// Length of the integrity check value prepended by AES key wrap.
const KEY_WRAP_OVERHEAD: usize = 8;

impl SpecialParameter for CoseKey {
    fn to_cbor_value(&self) -> Result<Value, InvalidParameter> {
        AsCborValue::to_cbor_value(self.clone())
            .map_err(|_e| InvalidParameter::new(EPHEMERAL_KEY, Value::Null))
    }
}

/// Key wrap algorithm and key size belonging to an ECDH-ES algorithm.
fn key_wrap_parameters<BE: Display>(
    alg: iana::Algorithm,
) -> Result<(iana::Algorithm, usize), CoseCipherError<BE>> {
    esdh_key_wrap_algorithm(alg)
        .and_then(|kw| key_wrap_key_size(kw).map(|size| (kw, size)))
        .ok_or_else(|| unsupported(alg))
}

/// Derives the key encryption key and imports it into the backend.
fn derive_kek<B: KeyDistributionCryptoBackend>(
    backend: &mut B,
    alg: iana::Algorithm,
    private: &B::Key,
    public: &CoseKey,
    context: &[u8],
    key_length: usize,
) -> Result<B::Key, CoseCipherError<B::Error>> {
    let secret = backend.ecdh(alg, private, public)?;
    let kek = backend.hkdf(HashAlgorithm::Sha256, &[], &secret, context, key_length)?;
    backend.import_symmetric_key(&kek)
}

/// Recipient that transports the content encryption key using ECDH-ES + AES key wrap
/// (ECDH-ES+A128KW, ECDH-ES+A192KW or ECDH-ES+A256KW).
///
/// The encoded COSE_KDF_Context may take up at most
/// [`kdf_context_size`](EsdhRecipientEncoder::kdf_context_size) bytes, otherwise
/// [`CoseCipherError::KdfBufferTooSmall`] reports the required size.
#[derive(Debug, Clone)]
pub struct EsdhRecipientEncoder<'a> {
    alg: iana::Algorithm,
    peer: &'a CoseKey,
    kid: Option<Vec<u8>>,
    inputs: KdfContextInputs,
    send_party_identities: bool,
    kdf_context_size: usize,
}

impl<'a> EsdhRecipientEncoder<'a> {
    /// Creates a recipient for the static public key `peer` using `alg`.
    #[must_use]
    pub fn new(alg: iana::Algorithm, peer: &'a CoseKey) -> Self {
        EsdhRecipientEncoder {
            alg,
            peer,
            kid: None,
            inputs: KdfContextInputs::default(),
            send_party_identities: false,
            kdf_context_size: DEFAULT_KDF_CONTEXT_SIZE,
        }
    }

    /// Identifies the recipient's static key by `kid`.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Sets the inputs of the key derivation.
    #[must_use]
    pub fn with_kdf_inputs(mut self, inputs: KdfContextInputs) -> Self {
        self.inputs = inputs;
        self
    }

    /// Transmits the configured PartyU and PartyV identities in the unprotected headers.
    #[must_use]
    pub fn send_party_identities(mut self, send: bool) -> Self {
        self.send_party_identities = send;
        self
    }

    /// Sets the size limit for the encoded COSE_KDF_Context.
    #[must_use]
    pub fn with_kdf_context_size(mut self, size: usize) -> Self {
        self.kdf_context_size = size;
        self
    }

    /// Size limit for the encoded COSE_KDF_Context.
    #[must_use]
    pub fn kdf_context_size(&self) -> usize {
        self.kdf_context_size
    }

    fn peer_curve<BE: Display>(&self) -> Result<iana::EllipticCurve, CoseCipherError<BE>> {
        let peer = CoseEc2Key::parse::<BE>(self.peer)?;
        match peer.crv {
            EllipticCurve::Assigned(crv) => Ok(crv),
            crv => Err(CoseCipherError::UnsupportedCurve(crv)),
        }
    }

    fn header_parameters(&self, ephemeral: CoseKey) -> ParameterList {
        let mut params = ParameterList::new();
        params.push(Parameter::alg(self.alg));
        params.push(Parameter::new(
            EPHEMERAL_KEY,
            ParamValue::Special(Arc::new(ephemeral)),
        ));
        if let Some(kid) = &self.kid {
            params.push(Parameter::kid(kid.clone()));
        }
        if self.send_party_identities {
            if let Some(id) = &self.inputs.party_u_identity {
                params.push(Parameter::new(PARTY_U_IDENTITY, ParamValue::Bytes(id.clone())));
            }
            if let Some(id) = &self.inputs.party_v_identity {
                params.push(Parameter::new(PARTY_V_IDENTITY, ParamValue::Bytes(id.clone())));
            }
        }
        params
    }

    /// Builds the recipient structure, wrapping `cek` with a key agreed on using `ephemeral`.
    ///
    /// Without an ephemeral key, placeholders of the correct size are emitted.
    fn build<B: KeyDistributionCryptoBackend>(
        &self,
        backend: &mut B,
        ephemeral: Option<&B::Key>,
        curve: iana::EllipticCurve,
        cek: &[u8],
    ) -> Result<Value, CoseCipherError<B::Error>> {
        let (kw_alg, key_length) = key_wrap_parameters(self.alg)?;
        let ephemeral_public = match ephemeral {
            Some(key) => backend.export_public_key(key)?,
            None => {
                let size = ec2_coordinate_size(curve).ok_or(CoseCipherError::UnsupportedCurve(
                    EllipticCurve::Assigned(curve),
                ))?;
                CoseKeyBuilder::new_ec2_pub_key(curve, vec![0u8; size], vec![0u8; size]).build()
            }
        };
        let headers = encode_headers(&self.header_parameters(ephemeral_public))?;

        // Also checked in size-only runs.
        let context = KdfContext {
            algorithm: kw_alg,
            key_length,
            protected: &headers.protected,
            party_u_identity: self.inputs.party_u_identity.as_deref(),
            party_v_identity: self.inputs.party_v_identity.as_deref(),
            inputs: &self.inputs,
        }
        .encode(self.kdf_context_size)?;

        let wrapped = match ephemeral {
            Some(private) => {
                let kek = derive_kek(backend, self.alg, private, self.peer, &context, key_length)?;
                let wrapped = backend.aes_key_wrap(kw_alg, &kek, cek);
                backend.free_key(kek);
                wrapped?
            }
            None => vec![0u8; cek.len() + KEY_WRAP_OVERHEAD],
        };
        Ok(Value::Array(vec![
            headers.protected_value(),
            headers.unprotected,
            Value::Bytes(wrapped),
        ]))
    }
}

impl<B: KeyDistributionCryptoBackend> RecipientEncoder<B> for EsdhRecipientEncoder<'_> {
    fn create(
        &mut self,
        backend: &mut B,
        cek: &[u8],
        _content_alg: iana::Algorithm,
        size_only: bool,
    ) -> Result<Value, CoseCipherError<B::Error>> {
        key_wrap_parameters::<B::Error>(self.alg)?;
        let curve = self.peer_curve()?;
        if size_only {
            return self.build(backend, None, curve, cek);
        }
        let ephemeral = backend.generate_key(curve)?;
        let result = self.build(backend, Some(&ephemeral), curve, cek);
        backend.free_key(ephemeral);
        result
    }
}

/// Decoder for ECDH-ES + AES key wrap recipients, using the recipient's static private key.
///
/// PartyU and PartyV identities configured in the [`KdfContextInputs`] take precedence over
/// identities transmitted in the headers. If the inputs of sender and recipient differ,
/// decryption fails with [`CoseCipherError::DataAuthenticationFailure`].
pub struct EsdhRecipientDecoder<'a, B: KeyDistributionCryptoBackend> {
    alg: iana::Algorithm,
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
    inputs: KdfContextInputs,
    kdf_context_size: usize,
}

impl<'a, B: KeyDistributionCryptoBackend> EsdhRecipientDecoder<'a, B> {
    /// Creates a decoder for `alg` using the static private key `key`.
    #[must_use]
    pub fn new(alg: iana::Algorithm, key: &'a B::Key) -> Self {
        EsdhRecipientDecoder {
            alg,
            key,
            kid: None,
            inputs: KdfContextInputs::default(),
            kdf_context_size: DEFAULT_KDF_CONTEXT_SIZE,
        }
    }

    /// Only accepts recipients that carry no key ID or the given one.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Sets the inputs of the key derivation.
    #[must_use]
    pub fn with_kdf_inputs(mut self, inputs: KdfContextInputs) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the size limit for the encoded COSE_KDF_Context.
    #[must_use]
    pub fn with_kdf_context_size(mut self, size: usize) -> Self {
        self.kdf_context_size = size;
        self
    }
}

fn decode_ephemeral_key(
    peek: &ParameterPeek,
    value: &Value,
) -> Result<SpecialDecode, InvalidParameter> {
    if peek.label != EPHEMERAL_KEY {
        return Ok(SpecialDecode::Declined);
    }
    CoseKey::from_cbor_value(value.clone())
        .map(|key| SpecialDecode::Consumed(ParamValue::Special(Arc::new(key))))
        .map_err(|_e| InvalidParameter::new(EPHEMERAL_KEY, value.clone()))
}

fn find_ephemeral_key<BE: Display>(
    params: &[Parameter],
) -> Result<CoseKey, CoseCipherError<BE>> {
    let missing = CoseCipherError::UnexpectedItem {
        expected: "ephemeral key",
        context: "ECDH-ES recipient",
    };
    match params.find(EPHEMERAL_KEY) {
        Some(Parameter {
            value: ParamValue::Special(value),
            ..
        }) => {
            let value = value.to_cbor_value()?;
            CoseKey::from_cbor_value(value.clone())
                .map_err(|_e| CoseCipherError::InvalidHeaderParam(Label::Int(EPHEMERAL_KEY), value))
        }
        _ => Err(missing),
    }
}

impl<B: KeyDistributionCryptoBackend> RecipientDecoder<B> for EsdhRecipientDecoder<'_, B> {
    fn try_decode(
        &mut self,
        backend: &mut B,
        ctx: &RecipientContext,
        recipient: &Value,
        pool: &mut ParameterPool,
    ) -> Result<RecipientOutcome<B::Key>, CoseCipherError<B::Error>> {
        let (protected, unprotected, ciphertext) = split_recipient(recipient)?;
        let mut ephemeral_key_decoder = decode_ephemeral_key;
        let special: &mut dyn SpecialDecoder = &mut ephemeral_key_decoder;
        let headers = decode_headers(ctx.location, &protected, &unprotected, Some(special), pool)?;
        let params = pool.get(headers.parameters);
        if !recipient_applies::<B::Error>(params, self.alg, self.kid.as_deref())? {
            return Ok(RecipientOutcome::Declined);
        }
        if params.find_alg_id(true).is_none() {
            return Err(CoseCipherError::MissingAlgorithm);
        }
        check_critical_parameters(params, &[PARTY_U_IDENTITY, PARTY_V_IDENTITY])?;
        let (kw_alg, key_length) = key_wrap_parameters(self.alg)?;
        let ephemeral = find_ephemeral_key(params)?;

        let context = KdfContext {
            algorithm: kw_alg,
            key_length,
            protected: &headers.protected,
            party_u_identity: self
                .inputs
                .party_u_identity
                .as_deref()
                .or_else(|| params.find_bytes(PARTY_U_IDENTITY)),
            party_v_identity: self
                .inputs
                .party_v_identity
                .as_deref()
                .or_else(|| params.find_bytes(PARTY_V_IDENTITY)),
            inputs: &self.inputs,
        }
        .encode(self.kdf_context_size)?;

        let wrapped = cbor::expect_bytes(ciphertext, "COSE_Recipient ciphertext")?;
        let kek = derive_kek(backend, self.alg, self.key, &ephemeral, &context, key_length)?;
        let cek = backend.aes_key_unwrap(kw_alg, &kek, &wrapped);
        backend.free_key(kek);
        match cek {
            Ok(cek) => Ok(RecipientOutcome::Decoded(ContentKey::Bytes(cek))),
            // A wrong derived key only shows up as a failed integrity check.
            Err(CoseCipherError::KeyUnwrapFailure) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("unwrapping ECDH-ES content key failed");
                Err(CoseCipherError::DataAuthenticationFailure)
            }
            Err(e) => Err(e),
        }
    }
}
