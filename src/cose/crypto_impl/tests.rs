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

use coset::{iana, CoseKeyBuilder, Label};
use rstest::rstest;

#[cfg(feature = "openssl")]
use crate::cose::test_helper::openssl_ctx;
#[cfg(rustcrypto_base)]
use crate::cose::test_helper::rustcrypto_ctx;
use crate::cose::test_helper::{
    ec_key_pair, ed25519_private_key, ed25519_private_key_without_x, ed25519_public_key,
    symmetric_key,
};
use crate::cose::{
    CoseEc2Key, CryptoBackend, EncryptCryptoBackend, HashAlgorithm,
    KeyDistributionCryptoBackend, SignCryptoBackend,
};
use crate::error::CoseCipherError;

const PLAINTEXT: &[u8] = b"This is the content.";
const AAD: &[u8] = b"associated data";
const NONCE: [u8; 12] = [0x42; 12];

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(rustcrypto_base, case::rustcrypto(rustcrypto_ctx()))]
fn sha256_incremental_matches_one_shot<B: CryptoBackend>(#[case] mut backend: B) {
    let mut ctx = backend.hash_init(HashAlgorithm::Sha256).unwrap();
    backend.hash_update(&mut ctx, b"a").unwrap();
    backend.hash_update(&mut ctx, b"bc").unwrap();
    let incremental = backend.hash_finish(ctx).unwrap();
    let one_shot = backend.hash(HashAlgorithm::Sha256, b"abc").unwrap();
    assert_eq!(incremental, one_shot);
    assert_eq!(
        hex::encode(one_shot),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(rustcrypto_base, case::rustcrypto(rustcrypto_ctx()))]
fn hash_output_sizes<B: CryptoBackend>(
    #[case] mut backend: B,
    #[values(HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512)]
    alg: HashAlgorithm,
) {
    assert_eq!(backend.hash(alg, b"").unwrap().len(), alg.output_size());
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(rustcrypto_base, case::rustcrypto(rustcrypto_ctx()))]
fn import_rejects_malformed_keys<B: CryptoBackend>(#[case] mut backend: B) {
    let mut key =
        CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, vec![1; 32], vec![2; 32])
            .build();
    // Curve
    key.params.retain(|(label, _)| *label != Label::Int(-1));
    assert!(backend.import_key(&key).is_err());
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-ecdsa", case::rustcrypto(rustcrypto_ctx()))]
fn exported_public_key_has_no_private_part<B: CryptoBackend>(#[case] mut backend: B) {
    let (_private, _public, exported) = ec_key_pair(&mut backend, iana::EllipticCurve::P_256);
    let parsed = CoseEc2Key::parse::<B::Error>(&exported).unwrap();
    assert!(parsed.d.is_none());
    assert_eq!(parsed.x.map(<[u8]>::len), Some(32));
    assert_eq!(parsed.y.map(<[u8]>::len), Some(32));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-ecdsa", case::rustcrypto(rustcrypto_ctx()))]
fn ecdsa_sign_verify<B: SignCryptoBackend>(
    #[case] mut backend: B,
    #[values(
        (iana::Algorithm::ES256, iana::EllipticCurve::P_256, HashAlgorithm::Sha256, 64),
        (iana::Algorithm::ES384, iana::EllipticCurve::P_384, HashAlgorithm::Sha384, 96)
    )]
    params: (iana::Algorithm, iana::EllipticCurve, HashAlgorithm, usize),
) {
    let (alg, curve, hash, signature_len) = params;
    let (private, public, _) = ec_key_pair(&mut backend, curve);
    let digest = backend.hash(hash, PLAINTEXT).unwrap();

    let mut signature = backend.sign_ecdsa_digest(alg, &private, &digest).unwrap();
    assert_eq!(signature.len(), signature_len);
    assert_eq!(backend.signature_size(alg, &private).unwrap(), signature_len);
    backend
        .verify_ecdsa_digest(alg, &public, &digest, &signature)
        .unwrap();
    // Verification with the private key derives the public key.
    backend
        .verify_ecdsa_digest(alg, &private, &digest, &signature)
        .unwrap();

    signature[3] ^= 0x01;
    assert!(matches!(
        backend.verify_ecdsa_digest(alg, &public, &digest, &signature),
        Err(CoseCipherError::VerificationFailure)
    ));
    assert!(matches!(
        backend.verify_ecdsa_digest(alg, &public, &digest, &signature[1..]),
        Err(CoseCipherError::VerificationFailure)
    ));
}

#[cfg(feature = "openssl")]
#[rstest]
#[case::openssl(openssl_ctx())]
fn ecdsa_p521_sign_verify<B: SignCryptoBackend>(#[case] mut backend: B) {
    let (private, public, _) = ec_key_pair(&mut backend, iana::EllipticCurve::P_521);
    let digest = backend.hash(HashAlgorithm::Sha512, PLAINTEXT).unwrap();
    let signature = backend
        .sign_ecdsa_digest(iana::Algorithm::ES512, &private, &digest)
        .unwrap();
    assert_eq!(signature.len(), 132);
    backend
        .verify_ecdsa_digest(iana::Algorithm::ES512, &public, &digest, &signature)
        .unwrap();
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-ecdsa", case::rustcrypto(rustcrypto_ctx()))]
fn ecdsa_rejects_curve_mismatch<B: SignCryptoBackend>(#[case] mut backend: B) {
    let (private, _, _) = ec_key_pair(&mut backend, iana::EllipticCurve::P_256);
    let digest = backend.hash(HashAlgorithm::Sha384, PLAINTEXT).unwrap();
    assert!(matches!(
        backend.sign_ecdsa_digest(iana::Algorithm::ES384, &private, &digest),
        Err(CoseCipherError::KeyTypeCurveMismatch(_, _))
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-eddsa", case::rustcrypto(rustcrypto_ctx()))]
fn eddsa_rfc8032_test_vector<B: SignCryptoBackend>(#[case] mut backend: B) {
    let private = backend.import_key(&ed25519_private_key()).unwrap();
    let public = backend.import_key(&ed25519_public_key()).unwrap();
    let signature = backend.sign_eddsa(&private, b"").unwrap();
    assert_eq!(
        hex::encode(&signature),
        "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
    );
    backend.verify_eddsa(&public, b"", &signature).unwrap();

    let derived = backend
        .import_key(&ed25519_private_key_without_x())
        .unwrap();
    backend.verify_eddsa(&derived, b"", &signature).unwrap();

    assert!(matches!(
        backend.verify_eddsa(&public, b"x", &signature),
        Err(CoseCipherError::VerificationFailure)
    ));
    assert!(matches!(
        backend.sign_eddsa(&public, b""),
        Err(CoseCipherError::MissingKeyParam(_))
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(
    all(
        feature = "rustcrypto-aes-gcm",
        feature = "rustcrypto-chacha20-poly1305"
    ),
    case::rustcrypto(rustcrypto_ctx())
)]
fn aead_round_trip<B: EncryptCryptoBackend>(
    #[case] mut backend: B,
    #[values(
        (iana::Algorithm::A128GCM, 16),
        (iana::Algorithm::A192GCM, 24),
        (iana::Algorithm::A256GCM, 32),
        (iana::Algorithm::ChaCha20Poly1305, 32)
    )]
    params: (iana::Algorithm, usize),
) {
    let (alg, key_len) = params;
    let key = symmetric_key(&mut backend, key_len);
    let ciphertext = backend
        .encrypt_aead(alg, &key, PLAINTEXT, AAD, &NONCE)
        .unwrap();
    assert_eq!(ciphertext.len(), PLAINTEXT.len() + 16);
    let plaintext = backend
        .decrypt_aead(alg, &key, &ciphertext, AAD, &NONCE)
        .unwrap();
    assert_eq!(plaintext, PLAINTEXT);

    let wrong_key = backend.import_symmetric_key(&vec![0xff; key_len]).unwrap();
    assert!(matches!(
        backend.decrypt_aead(alg, &wrong_key, &ciphertext, AAD, &NONCE),
        Err(CoseCipherError::DataAuthenticationFailure)
    ));
    assert!(matches!(
        backend.decrypt_aead(alg, &key, &ciphertext, b"other", &NONCE),
        Err(CoseCipherError::DataAuthenticationFailure)
    ));
    assert!(matches!(
        backend.decrypt_aead(alg, &key, &ciphertext[..10], AAD, &NONCE),
        Err(CoseCipherError::DataAuthenticationFailure)
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-aes-gcm", case::rustcrypto(rustcrypto_ctx()))]
fn aead_rejects_bad_parameters<B: EncryptCryptoBackend>(#[case] mut backend: B) {
    let key = symmetric_key(&mut backend, 16);
    assert!(matches!(
        backend.encrypt_aead(iana::Algorithm::A128GCM, &key, PLAINTEXT, AAD, &[0; 8]),
        Err(CoseCipherError::InvalidHeaderParam(_, _))
    ));
    assert!(matches!(
        backend.encrypt_aead(iana::Algorithm::A256GCM, &key, PLAINTEXT, AAD, &NONCE),
        Err(CoseCipherError::InvalidKeyParam(_, _))
    ));
    assert!(matches!(
        backend.encrypt_aead(iana::Algorithm::A128KW, &key, PLAINTEXT, AAD, &NONCE),
        Err(CoseCipherError::UnsupportedAlgorithm(_))
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-aes-kw", case::rustcrypto(rustcrypto_ctx()))]
fn aes_key_wrap_rfc3394_test_vector<B: KeyDistributionCryptoBackend>(#[case] mut backend: B) {
    let kek = backend
        .import_symmetric_key(&hex::decode("000102030405060708090A0B0C0D0E0F").unwrap())
        .unwrap();
    let key_data = hex::decode("00112233445566778899AABBCCDDEEFF").unwrap();
    let wrapped = backend
        .aes_key_wrap(iana::Algorithm::A128KW, &kek, &key_data)
        .unwrap();
    assert_eq!(
        hex::encode_upper(&wrapped),
        "1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5"
    );
    assert_eq!(
        backend
            .aes_key_unwrap(iana::Algorithm::A128KW, &kek, &wrapped)
            .unwrap(),
        key_data
    );

    let wrong_kek = backend.import_symmetric_key(&[0u8; 16]).unwrap();
    assert!(matches!(
        backend.aes_key_unwrap(iana::Algorithm::A128KW, &wrong_kek, &wrapped),
        Err(CoseCipherError::KeyUnwrapFailure)
    ));
    assert!(matches!(
        backend.aes_key_wrap(iana::Algorithm::A256KW, &kek, &key_data),
        Err(CoseCipherError::InvalidKeyParam(_, _))
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-ecdh", case::rustcrypto(rustcrypto_ctx()))]
fn ecdh_agreement_is_symmetric<B: KeyDistributionCryptoBackend>(
    #[case] mut backend: B,
    #[values(iana::EllipticCurve::P_256, iana::EllipticCurve::P_384)] curve: iana::EllipticCurve,
) {
    let alg = iana::Algorithm::ECDH_ES_A128KW;
    let (a_private, _, a_public) = ec_key_pair(&mut backend, curve);
    let (b_private, _, b_public) = ec_key_pair(&mut backend, curve);
    let ab = backend.ecdh(alg, &a_private, &b_public).unwrap();
    let ba = backend.ecdh(alg, &b_private, &a_public).unwrap();
    assert_eq!(ab, ba);
    let expected_len = if curve == iana::EllipticCurve::P_256 { 32 } else { 48 };
    assert_eq!(ab.len(), expected_len);
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-ecdh", case::rustcrypto(rustcrypto_ctx()))]
fn ecdh_rejects_mixed_curves<B: KeyDistributionCryptoBackend>(#[case] mut backend: B) {
    let (a_private, _, _) = ec_key_pair(&mut backend, iana::EllipticCurve::P_256);
    let (_, _, b_public) = ec_key_pair(&mut backend, iana::EllipticCurve::P_384);
    assert!(matches!(
        backend.ecdh(iana::Algorithm::ECDH_ES_A128KW, &a_private, &b_public),
        Err(CoseCipherError::UnsupportedCurve(_))
    ));
}

// RFC 5869, Appendix A, test cases 1 and 3.
#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-ecdh", case::rustcrypto(rustcrypto_ctx()))]
fn hkdf_rfc5869_test_vectors<B: KeyDistributionCryptoBackend>(#[case] mut backend: B) {
    let ikm = [0x0b; 22];
    let okm = backend
        .hkdf(
            HashAlgorithm::Sha256,
            &hex::decode("000102030405060708090a0b0c").unwrap(),
            &ikm,
            &hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap(),
            42,
        )
        .unwrap();
    assert_eq!(
        hex::encode(okm),
        "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
    );

    let okm = backend
        .hkdf(HashAlgorithm::Sha256, &[], &ikm, &[], 42)
        .unwrap();
    assert_eq!(
        hex::encode(okm),
        "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8"
    );
}
