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
use coset::iana::EnumI64;
use rstest::rstest;

use crate::cose::cbor;
use crate::cose::param::{HeaderLocation, ParamValue, Parameter, ParameterPool, Parameters};
#[cfg(feature = "openssl")]
use crate::cose::test_helper::openssl_ctx;
#[cfg(rustcrypto_base)]
use crate::cose::test_helper::rustcrypto_ctx;
use crate::cose::test_helper::{ec_key_pair, symmetric_key};
use crate::error::CoseCipherError;

use super::{
    check_no_protected, recipient_applies, ContentKey, DirectRecipientDecoder,
    DirectRecipientEncoder, EsdhRecipientDecoder, EsdhRecipientEncoder, KdfContext,
    KdfContextInputs, KdfContextInputsBuilder, KeyDistributionCryptoBackend,
    KeyWrapRecipientDecoder, KeyWrapRecipientEncoder, RecipientContext, RecipientDecoder,
    RecipientEncoder, RecipientOutcome,
};

const CEK: [u8; 16] = [
    0x84, 0x9b, 0x57, 0x21, 0x9d, 0xae, 0x48, 0xde, 0x64, 0x6d, 0x07, 0xdb, 0xb5, 0x33, 0x56,
    0x6e,
];

const CONTEXT: RecipientContext = RecipientContext {
    location: HeaderLocation::new(1, 0),
    content_alg: iana::Algorithm::A128GCM,
};

fn key_bytes<K>(outcome: RecipientOutcome<K>) -> Vec<u8> {
    match outcome {
        RecipientOutcome::Decoded(ContentKey::Bytes(key)) => key,
        RecipientOutcome::Decoded(ContentKey::Handle(_)) => panic!("unexpected key handle"),
        RecipientOutcome::Declined => panic!("recipient was declined"),
    }
}

fn encoded_len(value: &Value) -> usize {
    cbor::encode::<String>(value).unwrap().len()
}

#[test]
fn kdf_context_without_inputs() {
    let inputs = KdfContextInputs::default();
    let context = KdfContext {
        algorithm: iana::Algorithm::A128KW,
        key_length: 16,
        protected: &[],
        party_u_identity: None,
        party_v_identity: None,
        inputs: &inputs,
    };
    let expected = hex::decode("842283f6f6f683f6f6f682188040").unwrap();
    assert_eq!(context.encode::<String>(expected.len()).unwrap(), expected);
    assert!(matches!(
        context.encode::<String>(expected.len() - 1),
        Err(CoseCipherError::KdfBufferTooSmall { needed: 14, available: 13 })
    ));
}

#[test]
fn kdf_context_with_inputs() {
    let inputs = KdfContextInputsBuilder::default()
        .party_u_nonce(vec![0x01])
        .party_v_other(b"v".to_vec())
        .supp_pub_other(b"pub".to_vec())
        .supp_priv_info(b"priv".to_vec())
        .build()
        .unwrap();
    let context = KdfContext {
        algorithm: iana::Algorithm::A256KW,
        key_length: 32,
        protected: &[0xa1, 0x01, 0x38, 0x1f],
        party_u_identity: Some(b"u".as_slice()),
        party_v_identity: None,
        inputs: &inputs,
    };
    let expected = Value::Array(vec![
        Value::from(-5),
        Value::Array(vec![
            Value::Bytes(b"u".to_vec()),
            Value::Bytes(vec![0x01]),
            Value::Null,
        ]),
        Value::Array(vec![Value::Null, Value::Null, Value::Bytes(b"v".to_vec())]),
        Value::Array(vec![
            Value::from(256),
            Value::Bytes(vec![0xa1, 0x01, 0x38, 0x1f]),
            Value::Bytes(b"pub".to_vec()),
        ]),
        Value::Bytes(b"priv".to_vec()),
    ]);
    assert_eq!(context.to_cbor_value(), expected);
}

#[rstest]
#[case::empty(Value::Bytes(vec![]), true)]
#[case::empty_map(Value::Bytes(vec![0xa0]), true)]
#[case::alg(Value::Bytes(vec![0xa1, 0x01, 0x22]), false)]
fn protected_bucket_of_recipients(#[case] protected: Value, #[case] accepted: bool) {
    let result = check_no_protected::<String>(&protected);
    if accepted {
        assert!(result.is_ok());
    } else {
        assert!(matches!(
            result,
            Err(CoseCipherError::ProtectedHeadersNotAllowed)
        ));
    }
}

#[test]
fn protected_bucket_must_be_bytes() {
    assert!(matches!(
        check_no_protected::<String>(&Value::Map(vec![])),
        Err(CoseCipherError::UnexpectedItem { .. })
    ));
}

fn recipient_params(alg: Option<ParamValue>, kid: Option<&[u8]>) -> Vec<Parameter> {
    let mut params = Vec::new();
    if let Some(alg) = alg {
        params.push(Parameter::new(iana::HeaderParameter::Alg.to_i64(), alg));
    }
    if let Some(kid) = kid {
        params.push(Parameter::kid(kid));
    }
    params
}

#[rstest]
#[case::same(iana::Algorithm::A128KW.to_i64(), Some(b"a".as_slice()), Some(b"a".as_slice()), true)]
#[case::no_kid_in_recipient(iana::Algorithm::A128KW.to_i64(), None, Some(b"a".as_slice()), true)]
#[case::no_kid_configured(iana::Algorithm::A128KW.to_i64(), Some(b"a".as_slice()), None, true)]
#[case::kid_differs(iana::Algorithm::A128KW.to_i64(), Some(b"a".as_slice()), Some(b"b".as_slice()), false)]
#[case::alg_differs(iana::Algorithm::A256KW.to_i64(), None, None, false)]
#[case::private_use_alg(-65537, None, None, false)]
#[case::unassigned_alg(-4711, Some(b"a".as_slice()), Some(b"a".as_slice()), false)]
fn recipient_selection(
    #[case] found_alg: i64,
    #[case] found_kid: Option<&[u8]>,
    #[case] kid: Option<&[u8]>,
    #[case] applies: bool,
) {
    let params = recipient_params(Some(ParamValue::Int(found_alg)), found_kid);
    assert_eq!(
        recipient_applies::<String>(&params, iana::Algorithm::A128KW, kid).unwrap(),
        applies
    );
}

#[test]
fn recipient_without_algorithm_is_malformed() {
    let params = recipient_params(None, Some(b"a".as_slice()));
    assert!(matches!(
        recipient_applies::<String>(&params, iana::Algorithm::A128KW, None),
        Err(CoseCipherError::MissingAlgorithm)
    ));
    let params = recipient_params(Some(ParamValue::Text("A128KW".into())), None);
    assert!(matches!(
        recipient_applies::<String>(&params, iana::Algorithm::A128KW, None),
        Err(CoseCipherError::InvalidAlgorithmType(_))
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(rustcrypto_base, case::rustcrypto(rustcrypto_ctx()))]
fn direct_recipient<B: KeyDistributionCryptoBackend>(#[case] mut backend: B)
where
    B::Key: Clone,
{
    let key = symmetric_key(&mut backend, 16);
    let mut encoder = DirectRecipientEncoder::<B>::new(&key).with_kid(b"our-key");
    assert!(encoder.content_key().is_some());
    let recipient = encoder
        .create(&mut backend, &[], iana::Algorithm::A128GCM, false)
        .unwrap();
    // [h'', {1: -6, 4: h'6f75722d6b6579'}, h'']
    assert_eq!(
        cbor::encode::<String>(&recipient).unwrap(),
        hex::decode("8340a2012504476f75722d6b657940").unwrap()
    );

    let mut pool = ParameterPool::new(8);
    let mut decoder = DirectRecipientDecoder::<B>::new(&key).with_kid(b"our-key");
    let outcome = decoder
        .try_decode(&mut backend, &CONTEXT, &recipient, &mut pool)
        .unwrap();
    assert!(matches!(
        outcome,
        RecipientOutcome::Decoded(ContentKey::Handle(_))
    ));

    let mut decoder = DirectRecipientDecoder::<B>::new(&key).with_kid(b"other-key");
    assert!(matches!(
        decoder.try_decode(&mut backend, &CONTEXT, &recipient, &mut pool),
        Ok(RecipientOutcome::Declined)
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-aes-kw", case::rustcrypto(rustcrypto_ctx()))]
fn key_wrap_recipient<B: KeyDistributionCryptoBackend>(
    #[case] mut backend: B,
    #[values(
        (iana::Algorithm::A128KW, 16),
        (iana::Algorithm::A192KW, 24),
        (iana::Algorithm::A256KW, 32)
    )]
    params: (iana::Algorithm, usize),
) {
    let (alg, size) = params;
    let kek = symmetric_key(&mut backend, size);
    let mut encoder = KeyWrapRecipientEncoder::<B>::new(alg, &kek).with_kid(b"kek");
    let recipient = encoder
        .create(&mut backend, &CEK, iana::Algorithm::A128GCM, false)
        .unwrap();
    let size_only = encoder
        .create(&mut backend, &CEK, iana::Algorithm::A128GCM, true)
        .unwrap();
    assert_eq!(encoded_len(&size_only), encoded_len(&recipient));

    let Value::Array(items) = &recipient else {
        panic!("recipient is not an array");
    };
    assert_eq!(items[0], Value::Bytes(vec![]));
    assert_eq!(items[2].as_bytes().map(Vec::len), Some(CEK.len() + 8));

    let mut pool = ParameterPool::new(8);
    let mut decoder = KeyWrapRecipientDecoder::<B>::new(alg, &kek).with_kid(b"kek");
    let outcome = decoder
        .try_decode(&mut backend, &CONTEXT, &recipient, &mut pool)
        .unwrap();
    assert_eq!(key_bytes(outcome), CEK);
    assert_eq!(pool.as_slice().find_kid(), Some(b"kek".as_slice()));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(feature = "rustcrypto-aes-kw", case::rustcrypto(rustcrypto_ctx()))]
fn key_wrap_recipient_failures<B: KeyDistributionCryptoBackend>(#[case] mut backend: B) {
    let kek = symmetric_key(&mut backend, 16);
    let mut encoder = KeyWrapRecipientEncoder::<B>::new(iana::Algorithm::A128KW, &kek);
    let recipient = encoder
        .create(&mut backend, &CEK, iana::Algorithm::A128GCM, false)
        .unwrap();
    let mut pool = ParameterPool::new(8);

    let mut other_alg = KeyWrapRecipientDecoder::<B>::new(iana::Algorithm::A256KW, &kek);
    assert!(matches!(
        other_alg.try_decode(&mut backend, &CONTEXT, &recipient, &mut pool),
        Ok(RecipientOutcome::Declined)
    ));

    let wrong_kek = backend.import_symmetric_key(&[0xff; 16]).unwrap();
    let mut wrong = KeyWrapRecipientDecoder::<B>::new(iana::Algorithm::A128KW, &wrong_kek);
    assert!(matches!(
        wrong.try_decode(&mut backend, &CONTEXT, &recipient, &mut pool),
        Err(CoseCipherError::KeyUnwrapFailure)
    ));

    // {1: -3} in the protected bucket.
    let protected = Value::Array(vec![
        Value::Bytes(vec![0xa1, 0x01, 0x22]),
        Value::Map(vec![]),
        Value::Bytes(vec![0u8; 24]),
    ]);
    let mut decoder = KeyWrapRecipientDecoder::<B>::new(iana::Algorithm::A128KW, &kek);
    assert!(matches!(
        decoder.try_decode(&mut backend, &CONTEXT, &protected, &mut pool),
        Err(CoseCipherError::ProtectedHeadersNotAllowed)
    ));

    let malformed = Value::Array(vec![Value::Bytes(vec![]), Value::Map(vec![])]);
    assert!(matches!(
        decoder.try_decode(&mut backend, &CONTEXT, &malformed, &mut pool),
        Err(CoseCipherError::UnexpectedItem { .. })
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(
    all(feature = "rustcrypto-ecdh", feature = "rustcrypto-aes-kw"),
    case::rustcrypto(rustcrypto_ctx())
)]
fn esdh_recipient<B: KeyDistributionCryptoBackend>(
    #[case] mut backend: B,
    #[values(
        (iana::Algorithm::ECDH_ES_A128KW, iana::EllipticCurve::P_256),
        (iana::Algorithm::ECDH_ES_A256KW, iana::EllipticCurve::P_384)
    )]
    params: (iana::Algorithm, iana::EllipticCurve),
) {
    let (alg, curve) = params;
    let (private, _, public) = ec_key_pair(&mut backend, curve);
    let inputs = KdfContextInputsBuilder::default()
        .party_v_identity(b"recipient".to_vec())
        .build()
        .unwrap();

    let mut encoder = EsdhRecipientEncoder::new(alg, &public)
        .with_kid(b"static")
        .with_kdf_inputs(inputs.clone());
    let recipient = RecipientEncoder::<B>::create(
        &mut encoder,
        &mut backend,
        &CEK,
        iana::Algorithm::A128GCM,
        false,
    )
    .unwrap();
    let size_only = RecipientEncoder::<B>::create(
        &mut encoder,
        &mut backend,
        &CEK,
        iana::Algorithm::A128GCM,
        true,
    )
    .unwrap();
    assert_eq!(encoded_len(&size_only), encoded_len(&recipient));

    let mut pool = ParameterPool::new(8);
    let mut decoder = EsdhRecipientDecoder::<B>::new(alg, &private)
        .with_kid(b"static")
        .with_kdf_inputs(inputs);
    let outcome = decoder
        .try_decode(&mut backend, &CONTEXT, &recipient, &mut pool)
        .unwrap();
    assert_eq!(key_bytes(outcome), CEK);

    let other_inputs = KdfContextInputsBuilder::default()
        .party_v_identity(b"someone else".to_vec())
        .build()
        .unwrap();
    let mut decoder = EsdhRecipientDecoder::<B>::new(alg, &private).with_kdf_inputs(other_inputs);
    assert!(matches!(
        decoder.try_decode(&mut backend, &CONTEXT, &recipient, &mut pool),
        Err(CoseCipherError::DataAuthenticationFailure)
    ));

    let mut decoder = EsdhRecipientDecoder::<B>::new(alg, &private).with_kid(b"other");
    assert!(matches!(
        decoder.try_decode(&mut backend, &CONTEXT, &recipient, &mut pool),
        Ok(RecipientOutcome::Declined)
    ));
}

fn all_kdf_inputs() -> KdfContextInputs {
    KdfContextInputs {
        party_u_identity: Some(b"sender".to_vec()),
        party_u_nonce: Some(vec![0x01; 8]),
        party_u_other: Some(b"sender info".to_vec()),
        party_v_identity: Some(b"recipient".to_vec()),
        party_v_nonce: Some(vec![0x02; 8]),
        party_v_other: Some(b"recipient info".to_vec()),
        supp_pub_other: Some(b"public".to_vec()),
        supp_priv_info: Some(b"private".to_vec()),
    }
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(
    all(feature = "rustcrypto-ecdh", feature = "rustcrypto-aes-kw"),
    case::rustcrypto(rustcrypto_ctx())
)]
fn esdh_kdf_input_mismatch<B: KeyDistributionCryptoBackend>(
    #[case] mut backend: B,
    #[values(
        "party_u_identity",
        "party_u_nonce",
        "party_u_other",
        "party_v_identity",
        "party_v_nonce",
        "party_v_other",
        "supp_pub_other",
        "supp_priv_info"
    )]
    field: &str,
) {
    let alg = iana::Algorithm::ECDH_ES_A128KW;
    let (private, _, public) = ec_key_pair(&mut backend, iana::EllipticCurve::P_256);
    let mut encoder = EsdhRecipientEncoder::new(alg, &public)
        .with_kdf_inputs(all_kdf_inputs())
        .with_kdf_context_size(256);
    let recipient = RecipientEncoder::<B>::create(
        &mut encoder,
        &mut backend,
        &CEK,
        iana::Algorithm::A128GCM,
        false,
    )
    .unwrap();

    let mut decoder = EsdhRecipientDecoder::<B>::new(alg, &private)
        .with_kdf_inputs(all_kdf_inputs())
        .with_kdf_context_size(256);
    let mut pool = ParameterPool::new(8);
    let outcome = decoder
        .try_decode(&mut backend, &CONTEXT, &recipient, &mut pool)
        .unwrap();
    assert_eq!(key_bytes(outcome), CEK);

    let mut inputs = all_kdf_inputs();
    let changed = Some(b"changed".to_vec());
    match field {
        "party_u_identity" => inputs.party_u_identity = changed,
        "party_u_nonce" => inputs.party_u_nonce = changed,
        "party_u_other" => inputs.party_u_other = changed,
        "party_v_identity" => inputs.party_v_identity = changed,
        "party_v_nonce" => inputs.party_v_nonce = changed,
        "party_v_other" => inputs.party_v_other = changed,
        "supp_pub_other" => inputs.supp_pub_other = changed,
        "supp_priv_info" => inputs.supp_priv_info = changed,
        _ => unreachable!("unknown KDF context field {field}"),
    }
    let mut decoder = EsdhRecipientDecoder::<B>::new(alg, &private)
        .with_kdf_inputs(inputs)
        .with_kdf_context_size(256);
    let mut pool = ParameterPool::new(8);
    assert!(matches!(
        decoder.try_decode(&mut backend, &CONTEXT, &recipient, &mut pool),
        Err(CoseCipherError::DataAuthenticationFailure)
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(
    all(feature = "rustcrypto-ecdh", feature = "rustcrypto-aes-kw"),
    case::rustcrypto(rustcrypto_ctx())
)]
fn esdh_transmitted_party_identities<B: KeyDistributionCryptoBackend>(#[case] mut backend: B) {
    let alg = iana::Algorithm::ECDH_ES_A128KW;
    let (private, _, public) = ec_key_pair(&mut backend, iana::EllipticCurve::P_256);
    let inputs = KdfContextInputsBuilder::default()
        .party_u_identity(b"sender".to_vec())
        .build()
        .unwrap();
    let mut encoder = EsdhRecipientEncoder::new(alg, &public)
        .with_kdf_inputs(inputs)
        .send_party_identities(true);
    let recipient = RecipientEncoder::<B>::create(
        &mut encoder,
        &mut backend,
        &CEK,
        iana::Algorithm::A128GCM,
        false,
    )
    .unwrap();

    // The decoder learns the PartyU identity from the headers.
    let mut pool = ParameterPool::new(8);
    let mut decoder = EsdhRecipientDecoder::<B>::new(alg, &private);
    let outcome = decoder
        .try_decode(&mut backend, &CONTEXT, &recipient, &mut pool)
        .unwrap();
    assert_eq!(key_bytes(outcome), CEK);
    assert_eq!(pool.as_slice().find_bytes(-21), Some(b"sender".as_slice()));
    assert!(pool.as_slice().find(-1).is_some());

    // Configured identities take precedence over transmitted ones.
    let configured = KdfContextInputsBuilder::default()
        .party_u_identity(b"impostor".to_vec())
        .build()
        .unwrap();
    let mut decoder = EsdhRecipientDecoder::<B>::new(alg, &private).with_kdf_inputs(configured);
    let mut pool = ParameterPool::new(8);
    assert!(matches!(
        decoder.try_decode(&mut backend, &CONTEXT, &recipient, &mut pool),
        Err(CoseCipherError::DataAuthenticationFailure)
    ));
}

#[rstest]
#[cfg_attr(feature = "openssl", case::openssl(openssl_ctx()))]
#[cfg_attr(
    all(feature = "rustcrypto-ecdh", feature = "rustcrypto-aes-kw"),
    case::rustcrypto(rustcrypto_ctx())
)]
fn esdh_kdf_context_limit<B: KeyDistributionCryptoBackend>(
    #[case] mut backend: B,
    #[values(false, true)] size_only: bool,
) {
    let (_, _, public) = ec_key_pair(&mut backend, iana::EllipticCurve::P_256);
    let inputs = KdfContextInputsBuilder::default()
        .supp_pub_other(vec![0x55; 64])
        .build()
        .unwrap();
    let mut encoder = EsdhRecipientEncoder::new(iana::Algorithm::ECDH_ES_A128KW, &public)
        .with_kdf_inputs(inputs);
    let result = RecipientEncoder::<B>::create(
        &mut encoder,
        &mut backend,
        &CEK,
        iana::Algorithm::A128GCM,
        size_only,
    );
    let Err(CoseCipherError::KdfBufferTooSmall { needed, available }) = result else {
        panic!("KDF context limit was not enforced");
    };
    assert_eq!(available, super::DEFAULT_KDF_CONTEXT_SIZE);
    assert!(needed > available);

    let mut encoder = encoder.with_kdf_context_size(needed);
    assert!(RecipientEncoder::<B>::create(
        &mut encoder,
        &mut backend,
        &CEK,
        iana::Algorithm::A128GCM,
        size_only,
    )
    .is_ok());
}
