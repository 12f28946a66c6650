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

//! Short-circuit signatures for testing.
//!
//! A short-circuit signature is the digest of the to-be-signed structure, repeated to the
//! length of a real signature of the chosen algorithm. It provides no security whatsoever and
//! exists to exercise the complete message processing without any key material. Verifiers
//! refuse such signatures unless explicitly configured otherwise.

use core::fmt::Display;

use ciborium::Value;
use coset::iana;
use coset::iana::EnumI64;

use crate::cose::param::{Parameter, ParameterList, Parameters};
use crate::cose::signed::{
    hash_algorithm, signature_length, unsupported, SignCryptoBackend, Signer, SigningContext,
    VerificationContext, Verifier, VerifyOutcome,
};
use crate::cose::Progress;
use crate::error::CoseCipherError;

/// Fixed, publicly known key ID of short-circuit signatures.
pub const SHORT_CIRCUIT_KID: [u8; 32] = [
    0xef, 0x95, 0x4b, 0x4b, 0xd9, 0xbd, 0xf6, 0x70, 0xd0, 0x33, 0x60, 0x82, 0xf5, 0xef, 0x15,
    0x2a, 0xf8, 0xf3, 0x5b, 0x6a, 0x6c, 0x00, 0xef, 0xa6, 0xa9, 0xa7, 0x1f, 0x49, 0x51, 0x7e,
    0x18, 0xc6,
];

fn short_circuit_signature<BE: Display>(
    alg: iana::Algorithm,
    digest: &[u8],
) -> Result<Vec<u8>, CoseCipherError<BE>> {
    let len = signature_length(alg).ok_or_else(|| unsupported(alg))?;
    Ok(digest.iter().copied().cycle().take(len).collect())
}

fn compute_digest<B: SignCryptoBackend>(
    backend: &mut B,
    alg: iana::Algorithm,
    tbs: &[u8],
) -> Result<Vec<u8>, CoseCipherError<B::Error>> {
    backend.hash(hash_algorithm(alg)?, tbs)
}

/// Signer producing short-circuit signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuitSigner {
    alg: iana::Algorithm,
}

impl ShortCircuitSigner {
    /// Creates a signer that imitates signatures of `alg` (ES256, ES384 or ES512).
    #[must_use]
    pub fn new(alg: iana::Algorithm) -> Self {
        ShortCircuitSigner { alg }
    }
}

impl<B: SignCryptoBackend> Signer<B> for ShortCircuitSigner {
    fn header_parameters(&self) -> ParameterList {
        vec![
            Parameter::alg(self.alg),
            Parameter::kid(SHORT_CIRCUIT_KID.to_vec()),
        ]
        .into()
    }

    fn sign(
        &mut self,
        backend: &mut B,
        ctx: &SigningContext<'_>,
    ) -> Result<Progress<Value>, CoseCipherError<B::Error>> {
        let headers = ctx.signer_headers(&Signer::<B>::header_parameters(self))?;
        let signature = if ctx.size_only {
            vec![0u8; signature_length(self.alg).ok_or_else(|| unsupported(self.alg))?]
        } else {
            let tbs = ctx.to_be_signed(headers.as_ref())?;
            let digest = compute_digest(backend, self.alg, &tbs)?;
            short_circuit_signature(self.alg, &digest)?
        };
        Ok(Progress::Complete(ctx.finish(headers, signature)))
    }
}

/// Verifier for short-circuit signatures.
///
/// Verification is refused with [`CoseCipherError::ShortCircuitNotAllowed`] unless enabled
/// using [`allow_short_circuit`](ShortCircuitVerifier::allow_short_circuit). While disabled,
/// signatures without the short-circuit key ID are declined so that other verifiers for the
/// same algorithm can check them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuitVerifier {
    alg: iana::Algorithm,
    allowed: bool,
}

impl ShortCircuitVerifier {
    /// Creates a verifier for short-circuit signatures imitating `alg`.
    #[must_use]
    pub fn new(alg: iana::Algorithm) -> Self {
        ShortCircuitVerifier {
            alg,
            allowed: false,
        }
    }

    /// Enables or disables the acceptance of short-circuit signatures.
    #[must_use]
    pub fn allow_short_circuit(mut self, allowed: bool) -> Self {
        self.allowed = allowed;
        self
    }
}

impl<B: SignCryptoBackend> Verifier<B> for ShortCircuitVerifier {
    fn verify(
        &mut self,
        backend: &mut B,
        ctx: &VerificationContext<'_>,
        params: &[Parameter],
        signature: &[u8],
    ) -> Result<VerifyOutcome, CoseCipherError<B::Error>> {
        if params.find_alg_id(true) != Some(self.alg.to_i64()) {
            return Ok(VerifyOutcome::Declined);
        }
        let short_circuit_kid = params.find_kid() == Some(SHORT_CIRCUIT_KID.as_slice());
        if !self.allowed {
            if !short_circuit_kid {
                // A regular signature of the same algorithm, left to other verifiers.
                return Ok(VerifyOutcome::Declined);
            }
            #[cfg(feature = "tracing")]
            tracing::warn!("refusing to verify short-circuit signature");
            return Err(CoseCipherError::ShortCircuitNotAllowed);
        }
        if !short_circuit_kid {
            return Err(CoseCipherError::ShortCircuitKidMismatch);
        }
        let tbs = ctx.to_be_signed()?;
        let digest = compute_digest(backend, self.alg, &tbs)?;
        if short_circuit_signature::<B::Error>(self.alg, &digest)? == signature {
            Ok(VerifyOutcome::Verified)
        } else {
            Err(CoseCipherError::VerificationFailure)
        }
    }
}
