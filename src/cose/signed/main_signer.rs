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

use crate::cose::param::{Parameter, ParameterList};
use crate::cose::signed::{
    applies_to, hash_algorithm, SignCryptoBackend, Signer, SigningContext, VerificationContext,
    Verifier, VerifyOutcome,
};
use crate::cose::{CryptoBackend, Progress};
use crate::error::CoseCipherError;

/// Hash-then-sign signer for ECDSA (ES256, ES384 and ES512).
///
/// The to-be-signed structure is hashed by the backend and the digest is signed.
pub struct MainSigner<'a, B: CryptoBackend> {
    alg: iana::Algorithm,
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
}

impl<'a, B: CryptoBackend> MainSigner<'a, B> {
    /// Creates a signer for `alg` using `key`.
    #[must_use]
    pub fn new(alg: iana::Algorithm, key: &'a B::Key) -> Self {
        MainSigner {
            alg,
            key,
            kid: None,
        }
    }

    /// Adds the given key ID to the unprotected header parameters.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

impl<B: SignCryptoBackend> Signer<B> for MainSigner<'_, B> {
    fn header_parameters(&self) -> ParameterList {
        let mut params = ParameterList::new();
        params.push(Parameter::alg(self.alg));
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
        let signature = if ctx.size_only {
            vec![0u8; backend.signature_size(self.alg, self.key)?]
        } else {
            let hash_alg = hash_algorithm(self.alg)?;
            let tbs = ctx.to_be_signed(headers.as_ref())?;
            let mut hash_ctx = backend.hash_init(hash_alg)?;
            backend.hash_update(&mut hash_ctx, &tbs)?;
            let digest = backend.hash_finish(hash_ctx)?;
            backend.sign_ecdsa_digest(self.alg, self.key, &digest)?
        };
        Ok(Progress::Complete(ctx.finish(headers, signature)))
    }
}

/// Verifier counterpart of [`MainSigner`] (and [`RestartableSigner`](super::RestartableSigner)).
pub struct MainVerifier<'a, B: CryptoBackend> {
    alg: iana::Algorithm,
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
}

impl<'a, B: CryptoBackend> MainVerifier<'a, B> {
    /// Creates a verifier for `alg` using the public `key`.
    #[must_use]
    pub fn new(alg: iana::Algorithm, key: &'a B::Key) -> Self {
        MainVerifier {
            alg,
            key,
            kid: None,
        }
    }

    /// Only consider signatures that either carry no key ID or the given one.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

impl<B: SignCryptoBackend> Verifier<B> for MainVerifier<'_, B> {
    fn verify(
        &mut self,
        backend: &mut B,
        ctx: &VerificationContext<'_>,
        params: &[Parameter],
        signature: &[u8],
    ) -> Result<VerifyOutcome, CoseCipherError<B::Error>> {
        if !applies_to(params, self.alg, self.kid.as_deref()) {
            return Ok(VerifyOutcome::Declined);
        }
        let tbs = ctx.to_be_signed()?;
        let digest = backend.hash(hash_algorithm(self.alg)?, &tbs)?;
        backend.verify_ecdsa_digest(self.alg, self.key, &digest, signature)?;
        Ok(VerifyOutcome::Verified)
    }
}
