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

//! EdDSA signing and verification.
//!
//! EdDSA can not operate on a digest computed incrementally, it needs the complete
//! to-be-signed structure in one contiguous buffer. That buffer is supplied by the caller
//! using `with_auxiliary_buffer`. After each attempt (including size-only runs and attempts that
//! failed because the buffer was missing or too small), the required size can be queried
//! using `auxiliary_buffer_size`.

use core::fmt::Display;

use ciborium::Value;
use coset::iana;

use crate::cose::param::{Parameter, ParameterList};
use crate::cose::signed::{
    applies_to, signature_length, unsupported, SignCryptoBackend, Signer, SigningContext,
    VerificationContext, Verifier, VerifyOutcome,
};
use crate::cose::{CryptoBackend, Progress};
use crate::error::CoseCipherError;

/// Copies `tbs` into the auxiliary buffer and returns the filled part.
fn fill_auxiliary_buffer<'b, BE: Display>(
    aux: Option<&'b mut [u8]>,
    tbs: &[u8],
) -> Result<&'b [u8], CoseCipherError<BE>> {
    let aux = aux.ok_or(CoseCipherError::NeedAuxiliaryBuffer { needed: tbs.len() })?;
    if aux.len() < tbs.len() {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            needed = tbs.len(),
            available = aux.len(),
            "auxiliary buffer too small"
        );
        return Err(CoseCipherError::AuxiliaryBufferTooSmall {
            needed: tbs.len(),
            available: aux.len(),
        });
    }
    let filled = &mut aux[..tbs.len()];
    filled.copy_from_slice(tbs);
    Ok(filled)
}

/// Signer for EdDSA (Ed25519).
pub struct EdDsaSigner<'a, B: CryptoBackend> {
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
    aux: Option<&'a mut [u8]>,
    aux_needed: usize,
}

impl<'a, B: CryptoBackend> EdDsaSigner<'a, B> {
    /// Creates a signer using the private `key`.
    #[must_use]
    pub fn new(key: &'a B::Key) -> Self {
        EdDsaSigner {
            key,
            kid: None,
            aux: None,
            aux_needed: 0,
        }
    }

    /// Adds the given key ID to the unprotected header parameters.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Sets the buffer the to-be-signed structure is serialized into.
    #[must_use]
    pub fn with_auxiliary_buffer(mut self, aux: &'a mut [u8]) -> Self {
        self.aux = Some(aux);
        self
    }

    /// Replaces the auxiliary buffer.
    pub fn set_auxiliary_buffer(&mut self, aux: &'a mut [u8]) {
        self.aux = Some(aux);
    }

    /// Size of the auxiliary buffer required by the last signing attempt.
    #[must_use]
    pub fn auxiliary_buffer_size(&self) -> usize {
        self.aux_needed
    }
}

impl<B: SignCryptoBackend> Signer<B> for EdDsaSigner<'_, B> {
    fn header_parameters(&self) -> ParameterList {
        let mut params = ParameterList::new();
        params.push(Parameter::alg(iana::Algorithm::EdDSA));
        if let Some(kid) = &self.kid {
            params.push(Parameter::kid(kid.clone()));
        }
        params
    }

    fn sign(
        &mut self,
        backend: &mut B,
        ctx: &SigningContext<'_>,
    ) -> Result<Progress<Value>, CoseCipherError<B::Error>> {
        let headers = ctx.signer_headers(&self.header_parameters())?;
        let tbs = ctx.to_be_signed(headers.as_ref())?;
        self.aux_needed = tbs.len();
        let signature = if ctx.size_only {
            let len = signature_length(iana::Algorithm::EdDSA)
                .ok_or_else(|| unsupported(iana::Algorithm::EdDSA))?;
            vec![0u8; len]
        } else {
            let data = fill_auxiliary_buffer(self.aux.as_deref_mut(), &tbs)?;
            backend.sign_eddsa(self.key, data)?
        };
        Ok(Progress::Complete(ctx.finish(headers, signature)))
    }
}

/// Verifier for EdDSA (Ed25519).
pub struct EdDsaVerifier<'a, B: CryptoBackend> {
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
    aux: Option<&'a mut [u8]>,
    aux_needed: usize,
}

impl<'a, B: CryptoBackend> EdDsaVerifier<'a, B> {
    /// Creates a verifier using the public `key`.
    #[must_use]
    pub fn new(key: &'a B::Key) -> Self {
        EdDsaVerifier {
            key,
            kid: None,
            aux: None,
            aux_needed: 0,
        }
    }

    /// Only consider signatures that either carry no key ID or the given one.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Sets the buffer the to-be-signed structure is serialized into.
    #[must_use]
    pub fn with_auxiliary_buffer(mut self, aux: &'a mut [u8]) -> Self {
        self.aux = Some(aux);
        self
    }

    /// Size of the auxiliary buffer required by the last verification attempt.
    #[must_use]
    pub fn auxiliary_buffer_size(&self) -> usize {
        self.aux_needed
    }
}

impl<B: SignCryptoBackend> Verifier<B> for EdDsaVerifier<'_, B> {
    fn verify(
        &mut self,
        backend: &mut B,
        ctx: &VerificationContext<'_>,
        params: &[Parameter],
        signature: &[u8],
    ) -> Result<VerifyOutcome, CoseCipherError<B::Error>> {
        if !applies_to(params, iana::Algorithm::EdDSA, self.kid.as_deref()) {
            return Ok(VerifyOutcome::Declined);
        }
        let tbs = ctx.to_be_signed()?;
        self.aux_needed = tbs.len();
        let data = fill_auxiliary_buffer(self.aux.as_deref_mut(), &tbs)?;
        backend.verify_eddsa(self.key, data, signature)?;
        Ok(VerifyOutcome::Verified)
    }
}
