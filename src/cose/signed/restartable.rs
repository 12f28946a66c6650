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
use coset::iana;

use crate::cose::param::{Parameter, ParameterList};
use crate::cose::signed::{hash_algorithm, SignCryptoBackend, Signer, SigningContext};
use crate::cose::{CryptoBackend, Progress};
use crate::error::CoseCipherError;

/// Progress of a [`RestartableSigner`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RestartState {
    /// No signing operation has been started.
    #[default]
    NotStarted,
    /// The digest has been computed and the backend has not finished signing it yet.
    InProgress(Vec<u8>),
    /// The last signing operation has completed.
    Done,
}

/// ECDSA signer for backends that can not complete a signature synchronously.
///
/// Signing is split into the digest computation, which happens once, and the signature
/// operation itself, which is handed to
/// [`SignCryptoBackend::sign_digest_restartable`]. If the backend reports that it is still
/// busy, [`Signer::sign`] returns [`Progress::InProgress`] and has to be called again with the
/// same inputs. No other operation may be performed on the signer in the meantime.
pub struct RestartableSigner<'a, B: CryptoBackend> {
    alg: iana::Algorithm,
    key: &'a B::Key,
    kid: Option<Vec<u8>>,
    state: RestartState,
}

impl<'a, B: CryptoBackend> RestartableSigner<'a, B> {
    /// Creates a signer for `alg` using `key`.
    #[must_use]
    pub fn new(alg: iana::Algorithm, key: &'a B::Key) -> Self {
        RestartableSigner {
            alg,
            key,
            kid: None,
            state: RestartState::NotStarted,
        }
    }

    /// Adds the given key ID to the unprotected header parameters.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Current state of the signer.
    #[must_use]
    pub fn state(&self) -> &RestartState {
        &self.state
    }
}

impl<B: SignCryptoBackend> Signer<B> for RestartableSigner<'_, B> {
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
        if ctx.size_only {
            let size = backend.signature_size(self.alg, self.key)?;
            return Ok(Progress::Complete(ctx.finish(headers, vec![0u8; size])));
        }

        let (digest, resume) = match mem::take(&mut self.state) {
            RestartState::InProgress(digest) => (digest, true),
            RestartState::NotStarted | RestartState::Done => {
                let tbs = ctx.to_be_signed(headers.as_ref())?;
                (backend.hash(hash_algorithm(self.alg)?, &tbs)?, false)
            }
        };

        // On error, the state stays at NotStarted.
        match backend.sign_digest_restartable(self.alg, self.key, &digest, resume)? {
            Progress::InProgress => {
                #[cfg(feature = "tracing")]
                tracing::trace!(resume, "signature operation still in progress");
                self.state = RestartState::InProgress(digest);
                Ok(Progress::InProgress)
            }
            Progress::Complete(signature) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(resume, "signature operation completed");
                self.state = RestartState::Done;
                Ok(Progress::Complete(ctx.finish(headers, signature)))
            }
        }
    }
}
