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

#![allow(dead_code)]

use ciborium::Value;
use coset::iana::EnumI64;
use coset::{iana, CoseKey, KeyType, Label};
#[cfg(rustcrypto_base)]
use rand::rngs::ThreadRng;
use rstest::fixture;

#[cfg(feature = "openssl")]
use crate::cose::crypto_impl::openssl::OpensslContext;
#[cfg(rustcrypto_base)]
use crate::cose::crypto_impl::rustcrypto::RustCryptoContext;
use crate::cose::{CryptoBackend, HashAlgorithm, Progress, SignCryptoBackend};
use crate::error::CoseCipherError;

#[cfg(feature = "openssl")]
#[fixture]
pub(crate) fn openssl_ctx() -> OpensslContext {
    OpensslContext::new()
}

#[cfg(rustcrypto_base)]
#[fixture]
pub(crate) fn rustcrypto_ctx() -> RustCryptoContext<ThreadRng> {
    RustCryptoContext::new(rand::thread_rng())
}

// RFC 8032, Section 7.1, test 1.
pub(crate) const ED25519_D: &str =
    "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
pub(crate) const ED25519_X: &str =
    "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

fn okp_key(d: Option<&str>, x: Option<&str>) -> CoseKey {
    let mut params = vec![(
        Label::Int(iana::OkpKeyParameter::Crv.to_i64()),
        Value::from(iana::EllipticCurve::Ed25519.to_i64()),
    )];
    if let Some(x) = x {
        params.push((
            Label::Int(iana::OkpKeyParameter::X.to_i64()),
            Value::Bytes(hex::decode(x).expect("invalid hex")),
        ));
    }
    if let Some(d) = d {
        params.push((
            Label::Int(iana::OkpKeyParameter::D.to_i64()),
            Value::Bytes(hex::decode(d).expect("invalid hex")),
        ));
    }
    CoseKey {
        kty: KeyType::Assigned(iana::KeyType::OKP),
        params,
        ..CoseKey::default()
    }
}

/// Ed25519 private key including its public part.
pub(crate) fn ed25519_private_key() -> CoseKey {
    okp_key(Some(ED25519_D), Some(ED25519_X))
}

/// Ed25519 private key without its public part.
pub(crate) fn ed25519_private_key_without_x() -> CoseKey {
    okp_key(Some(ED25519_D), None)
}

/// Ed25519 public key.
pub(crate) fn ed25519_public_key() -> CoseKey {
    okp_key(None, Some(ED25519_X))
}

/// Generates a key pair on `curve` and returns handles for the private and the public key.
pub(crate) fn ec_key_pair<B: CryptoBackend>(
    backend: &mut B,
    curve: iana::EllipticCurve,
) -> (B::Key, B::Key, CoseKey) {
    let private = backend
        .generate_key(curve)
        .expect("key generation failed");
    let public = backend
        .export_public_key(&private)
        .expect("public key export failed");
    let public_handle = backend.import_key(&public).expect("key import failed");
    (private, public_handle, public)
}

/// Symmetric key handle with `len` bytes of key material (0x00, 0x01, ...).
pub(crate) fn symmetric_key<B: CryptoBackend>(backend: &mut B, len: usize) -> B::Key {
    #[allow(clippy::cast_possible_truncation)]
    let k: Vec<u8> = (0..len).map(|i| i as u8).collect();
    backend
        .import_symmetric_key(&k)
        .expect("symmetric key import failed")
}

/// Wraps a backend and lets its restartable signature operations report
/// [`Progress::InProgress`] a number of times before they complete.
pub(crate) struct InProgressBackend<B> {
    pub(crate) inner: B,
    pub(crate) busy_rounds: usize,
    pub(crate) calls: Vec<(Vec<u8>, bool)>,
}

impl<B> InProgressBackend<B> {
    pub(crate) fn new(inner: B, busy_rounds: usize) -> Self {
        InProgressBackend {
            inner,
            busy_rounds,
            calls: Vec::new(),
        }
    }
}

impl<B: CryptoBackend> CryptoBackend for InProgressBackend<B> {
    type Error = B::Error;
    type Key = B::Key;
    type HashContext = B::HashContext;

    fn generate_rand(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.generate_rand(buf)
    }

    fn import_key(&mut self, key: &CoseKey) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        self.inner.import_key(key)
    }

    fn generate_key(
        &mut self,
        curve: iana::EllipticCurve,
    ) -> Result<Self::Key, CoseCipherError<Self::Error>> {
        self.inner.generate_key(curve)
    }

    fn export_public_key(
        &mut self,
        key: &Self::Key,
    ) -> Result<CoseKey, CoseCipherError<Self::Error>> {
        self.inner.export_public_key(key)
    }

    fn hash_init(
        &mut self,
        alg: HashAlgorithm,
    ) -> Result<Self::HashContext, CoseCipherError<Self::Error>> {
        self.inner.hash_init(alg)
    }

    fn hash_update(
        &mut self,
        ctx: &mut Self::HashContext,
        data: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        self.inner.hash_update(ctx, data)
    }

    fn hash_finish(
        &mut self,
        ctx: Self::HashContext,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        self.inner.hash_finish(ctx)
    }
}

impl<B: SignCryptoBackend> SignCryptoBackend for InProgressBackend<B> {
    fn sign_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        digest: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        self.inner.sign_ecdsa_digest(alg, key, digest)
    }

    fn verify_ecdsa_digest(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CoseCipherError<Self::Error>> {
        self.inner.verify_ecdsa_digest(alg, key, digest, signature)
    }

    fn sign_digest_restartable(
        &mut self,
        alg: iana::Algorithm,
        key: &Self::Key,
        digest: &[u8],
        resume: bool,
    ) -> Result<Progress<Vec<u8>>, CoseCipherError<Self::Error>> {
        self.calls.push((digest.to_vec(), resume));
        if self.busy_rounds > 0 {
            self.busy_rounds -= 1;
            return Ok(Progress::InProgress);
        }
        self.inner
            .sign_digest_restartable(alg, key, digest, resume)
    }
}
