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

#![cfg(feature = "rustcrypto")]

use coset::iana::EllipticCurve::P_256;
use coset::{iana, CoseKeyBuilder};
use rand::rngs::ThreadRng;

use cose_engine::cose::crypto_impl::rustcrypto::RustCryptoContext;
use cose_engine::cose::recipient::{
    EsdhRecipientDecoder, EsdhRecipientEncoder, KdfContextInputsBuilder, KeyWrapRecipientDecoder,
    KeyWrapRecipientEncoder,
};
use cose_engine::cose::signed::{MainSigner, MainVerifier};
use cose_engine::cose::{
    CryptoBackend, EncryptDecoder, EncryptEncoder, MessageType, Output, ParameterPool,
    Parameters, SignDecoder, SignEncoder,
};
use cose_engine::error::CoseCipherError;

type Backend = RustCryptoContext<ThreadRng>;

const PAYLOAD: &[u8] = b"This is the payload";

fn backend() -> Backend {
    RustCryptoContext::new(rand::thread_rng())
}

#[test]
fn encrypt0_round_trip() {
    let mut backend = backend();
    let key = backend.import_symmetric_key(&[0x2a; 16]).unwrap();

    let mut encoder = EncryptEncoder::<Backend>::encrypt0(iana::Algorithm::A128GCM);
    encoder.set_key(&key);
    let size = encoder
        .encrypt(&mut backend, PAYLOAD, &[], Output::SizeOnly)
        .unwrap();
    let mut buf = [0u8; 128];
    let len = encoder
        .encrypt(&mut backend, PAYLOAD, &[], Output::Buffer(&mut buf))
        .unwrap();
    assert_eq!(len, size);

    let mut decoder = EncryptDecoder::<Backend>::new();
    decoder.set_key(&key);
    let mut pool = ParameterPool::new(4);
    let decoded = decoder
        .decrypt(&mut backend, &buf[..len], &[], &mut pool)
        .unwrap();
    assert_eq!(decoded.message_type, MessageType::Encrypt0);
    assert_eq!(decoded.content, PAYLOAD);

    let wrong_key = backend.import_symmetric_key(&[0x2b; 16]).unwrap();
    let mut decoder = EncryptDecoder::<Backend>::new();
    decoder.set_key(&wrong_key);
    let mut pool = ParameterPool::new(4);
    assert!(matches!(
        decoder.decrypt(&mut backend, &buf[..len], &[], &mut pool),
        Err(CoseCipherError::DataAuthenticationFailure)
    ));
}

#[test]
fn encrypt_for_several_recipients() {
    let mut backend = backend();
    let kek = backend.import_symmetric_key(&[0x17; 32]).unwrap();
    let static_key = backend.generate_key(P_256).unwrap();
    let static_public = backend.export_public_key(&static_key).unwrap();
    let inputs = KdfContextInputsBuilder::default()
        .party_u_identity(b"lighting-client".to_vec())
        .party_v_identity(b"lighting-server".to_vec())
        .build()
        .unwrap();

    let mut wrapped =
        KeyWrapRecipientEncoder::<Backend>::new(iana::Algorithm::A256KW, &kek).with_kid(b"kek");
    let mut esdh = EsdhRecipientEncoder::new(iana::Algorithm::ECDH_ES_A128KW, &static_public)
        .with_kid(b"meriadoc.brandybuck@buckland.example")
        .with_kdf_inputs(inputs.clone());
    let mut encoder = EncryptEncoder::<Backend>::cose_encrypt(iana::Algorithm::A128GCM);
    encoder.add_recipient(&mut wrapped);
    encoder.add_recipient(&mut esdh);
    let message = encoder.encrypt_to_vec(&mut backend, PAYLOAD, b"aad").unwrap();

    let mut esdh = EsdhRecipientDecoder::<Backend>::new(iana::Algorithm::ECDH_ES_A128KW, &static_key)
        .with_kid(b"meriadoc.brandybuck@buckland.example")
        .with_kdf_inputs(inputs);
    let mut decoder = EncryptDecoder::<Backend>::new();
    decoder.add_recipient(&mut esdh);
    let mut pool = ParameterPool::new(8);
    let decoded = decoder
        .decrypt(&mut backend, &message, b"aad", &mut pool)
        .unwrap();
    assert_eq!(decoded.message_type, MessageType::Encrypt);
    assert_eq!(decoded.content, PAYLOAD);

    let mut wrapped = KeyWrapRecipientDecoder::<Backend>::new(iana::Algorithm::A256KW, &kek);
    let mut decoder = EncryptDecoder::<Backend>::new();
    decoder.add_recipient(&mut wrapped);
    let mut pool = ParameterPool::new(8);
    assert_eq!(
        decoder
            .decrypt(&mut backend, &message, b"aad", &mut pool)
            .unwrap()
            .content,
        PAYLOAD
    );
}

#[test]
fn sign1_round_trip() {
    let mut backend = backend();
    let private = backend.generate_key(P_256).unwrap();
    let public = backend.export_public_key(&private).unwrap();

    let mut signer = MainSigner::<Backend>::new(iana::Algorithm::ES256, &private).with_kid(b"11");
    let mut encoder = SignEncoder::<Backend>::sign1();
    encoder.add_signer(&mut signer);
    let message = encoder
        .sign_to_vec(&mut backend, PAYLOAD, &[])
        .unwrap()
        .complete()
        .unwrap();

    let mut verifier = MainVerifier::<Backend>::new(iana::Algorithm::ES256, &public).with_kid(b"11");
    let mut decoder = SignDecoder::<Backend>::new();
    decoder.add_verifier(&mut verifier);
    let mut pool = ParameterPool::new(4);
    let decoded = decoder.verify(&mut backend, &message, &[], &mut pool).unwrap();
    assert_eq!(decoded.content, PAYLOAD);
    assert_eq!(
        pool.get(decoded.body_parameters).find_kid(),
        Some(b"11".as_slice())
    );
}

// RFC 9052, Appendix C.2.1
#[test]
fn verify_published_sign1_example() {
    let message = hex::decode(
        "d28443a10126a10442313154546869732069732074686520636f6e74656e742e58408eb33e4ca31d1c465ab0\
         5aac34cc6b23d58fef5c083106c4d25a91aef0b0117e2af9a291aa32e14ab834dc56ed2a223444547e01f11d\
         3b0916e5a4c345cacb36",
    )
    .unwrap();
    let key = CoseKeyBuilder::new_ec2_pub_key(
        P_256,
        hex::decode("bac5b11cad8f99f9c72b05cf4b9e26d244dc189f745228255a219a86d6a09eff").unwrap(),
        hex::decode("20138bf82dc1b6d562be0fa54ab7804a3a64b6d72ccfed6b6fb6ed28bbfc117e").unwrap(),
    )
    .key_id(b"11".to_vec())
    .build();

    let mut backend = backend();
    let public = backend.import_key(&key).unwrap();
    let mut verifier = MainVerifier::<Backend>::new(iana::Algorithm::ES256, &public).with_kid(b"11");
    let mut decoder = SignDecoder::<Backend>::new();
    decoder.add_verifier(&mut verifier);
    let mut pool = ParameterPool::new(4);
    let decoded = decoder.verify(&mut backend, &message, &[], &mut pool).unwrap();
    assert_eq!(decoded.message_type, MessageType::Sign1);
    assert_eq!(decoded.content, b"This is the content.");

    let mut tampered = message.clone();
    tampered[20] ^= 0x20;
    let mut verifier = MainVerifier::<Backend>::new(iana::Algorithm::ES256, &public);
    let mut decoder = SignDecoder::<Backend>::new();
    decoder.add_verifier(&mut verifier);
    let mut pool = ParameterPool::new(4);
    assert!(matches!(
        decoder.verify(&mut backend, &tampered, &[], &mut pool),
        Err(CoseCipherError::VerificationFailure)
    ));
}
