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

//! A COSE ([RFC 9052](https://www.rfc-editor.org/rfc/rfc9052) and
//! [RFC 9053](https://www.rfc-editor.org/rfc/rfc9053)) message engine for constrained
//! environments.
//!
//! This crate creates and processes COSE_Sign1, COSE_Sign, COSE_Encrypt0 and COSE_Encrypt
//! messages. Instead of parsing messages into owned structures, decoders verify or decrypt a
//! message in a single pass and place the decoded header parameters into a caller-provided,
//! fixed-size [`ParameterPool`](cose::ParameterPool). Encoders write into a caller-provided
//! buffer and can be asked for the size of their output beforehand
//! ([`Output::SizeOnly`](cose::Output::SizeOnly)).
//!
//! Signature algorithms (ECDSA, EdDSA) and key distribution methods (direct key, AES key
//! wrap, ECDH-ES + AES key wrap) are pluggable components that are registered with the
//! encoders and decoders. For decoding, components are tried in registration order until one
//! of them accepts a signature or recipient.
//!
//! Cryptographic primitives are supplied by an implementation of
//! [`CryptoBackend`](cose::CryptoBackend) and its extension traits. Two implementations are
//! included, one based on the RustCrypto crates (feature `rustcrypto`, enabled by default) and
//! one based on OpenSSL (feature `openssl`).
//!
//! # Usage
//! ```toml
//! [dependencies]
//! cose-engine = { version = "^0.1.0" }
//! ```
//! Or, to use OpenSSL instead of RustCrypto:
//! ```toml
//! [dependencies]
//! cose-engine = { version = "^0.1.0", default-features = false, features = ["openssl", "tracing"] }
//! ```
//!
//! # Example
//! Encrypting and decrypting a COSE_Encrypt0 message with a symmetric key known to both
//! parties:
//! ```
//! # use std::error::Error;
//! use coset::iana;
//! use cose_engine::cose::crypto_impl::rustcrypto::RustCryptoContext;
//! use cose_engine::cose::{CryptoBackend, EncryptDecoder, EncryptEncoder, ParameterPool};
//!
//! let mut backend = RustCryptoContext::new(rand::thread_rng());
//! let key = backend.import_symmetric_key(&[0x42; 16])?;
//!
//! let mut encoder = EncryptEncoder::<RustCryptoContext<_>>::encrypt0(iana::Algorithm::A128GCM);
//! encoder.set_key(&key);
//! let message = encoder.encrypt_to_vec(&mut backend, b"This is the payload", &[])?;
//!
//! let mut decoder = EncryptDecoder::<RustCryptoContext<_>>::new();
//! decoder.set_key(&key);
//! let mut pool = ParameterPool::new(8);
//! let decoded = decoder.decrypt(&mut backend, &message, &[], &mut pool)?;
//! assert_eq!(decoded.content, b"This is the payload");
//! # Ok::<(), Box<dyn Error>>(())
//! ```
//!
//! Signing works the same way, using [`SignEncoder`](cose::SignEncoder) with one or more
//! [`Signer`](cose::Signer)s and [`SignDecoder`](cose::SignDecoder) with one or more
//! [`Verifier`](cose::Verifier)s.
//!
//! # Logging
//! With the (default) `tracing` feature, decisions of the decoders (declined signatures and
//! recipients, failed verifications) are reported using the [`tracing`](https://docs.rs/tracing)
//! crate. Key material is never logged.

#![deny(rustdoc::broken_intra_doc_links, clippy::pedantic)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]
// These ones are a little too eager
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::wildcard_imports
)]
#[macro_use]
extern crate derive_builder;

pub mod cose;
pub mod error;
