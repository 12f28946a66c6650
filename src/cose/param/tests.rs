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

use crate::cose::param::{
    ContentType, HeaderLocation, ParamValue, Parameter, ParameterList, ParameterPool, Parameters,
};
use crate::error::PoolExhausted;

#[test]
fn pool_reports_exhaustion() {
    let mut pool = ParameterPool::new(2);
    pool.alloc().expect("first allocation failed").label = 1;
    pool.alloc().expect("second allocation failed").label = 2;
    assert_eq!(pool.alloc().unwrap_err(), PoolExhausted { size: 2 });
    assert_eq!(pool.used(), 2);
    assert_eq!(pool.size(), 2);
    assert_eq!(
        pool.as_slice().iter().map(|p| p.label).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn pool_get_out_of_range_is_empty() {
    let mut pool = ParameterPool::new(4);
    pool.alloc().expect("allocation failed");
    assert_eq!(pool.get(0..1).len(), 1);
    assert!(pool.get(1..3).is_empty());
}

#[test]
fn pool_rewind_discards_tail() {
    let mut pool = ParameterPool::new(4);
    pool.alloc().expect("allocation failed").label = 1;
    let mark = pool.used();
    pool.alloc().expect("allocation failed").label = 2;
    pool.alloc().expect("allocation failed").label = 3;
    pool.rewind(mark);
    assert_eq!(pool.used(), 1);
    pool.alloc().expect("allocation after rewind failed");
    assert_eq!(pool.used(), 2);
}

#[test]
fn append_preserves_order() {
    let mut list = ParameterList::new();
    list.push(Parameter::alg(iana::Algorithm::ES256));
    list.push(Parameter::kid(b"kid".to_vec()));
    let tail: ParameterList = vec![Parameter::iv(vec![0u8; 12]), Parameter::content_type(60)]
        .into_iter()
        .collect();
    list.append(tail);
    let labels: Vec<i64> = list.iter().map(|p| p.label).collect();
    assert_eq!(
        labels,
        vec![
            iana::HeaderParameter::Alg.to_i64(),
            iana::HeaderParameter::Kid.to_i64(),
            iana::HeaderParameter::Iv.to_i64(),
            iana::HeaderParameter::ContentType.to_i64(),
        ]
    );
}

#[test]
fn equality_ignores_location() {
    let a = Parameter::kid(b"abc".to_vec()).at(HeaderLocation::new(1, 3));
    let b = Parameter::kid(b"abc".to_vec());
    assert_eq!(a, b);
    assert_ne!(a, b.clone().protected());
    assert_ne!(
        Parameter::new(-70_000, ParamValue::special(Value::Array(vec![Value::from(1)]))),
        Parameter::new(-70_000, ParamValue::special(Value::Array(vec![Value::from(2)])))
    );
}

#[rstest]
#[case::protected_requested(true, Some(-7))]
#[case::any_requested(false, Some(-7))]
fn find_alg_id_protected(#[case] protected: bool, #[case] expected: Option<i64>) {
    let params = vec![Parameter::alg(iana::Algorithm::ES256)];
    assert_eq!(params.find_alg_id(protected), expected);
}

#[rstest]
#[case::protected_requested(true, None)]
#[case::any_requested(false, Some(-7))]
fn find_alg_id_unprotected(#[case] protected: bool, #[case] expected: Option<i64>) {
    let params = vec![Parameter::new(
        iana::HeaderParameter::Alg.to_i64(),
        ParamValue::Int(-7),
    )];
    assert_eq!(params.find_alg_id(protected), expected);
}

#[test]
fn typed_finders_reject_wrong_types() {
    let params = vec![
        Parameter::new(
            iana::HeaderParameter::Alg.to_i64(),
            ParamValue::Text("ES256".to_string()),
        ),
        Parameter::new(iana::HeaderParameter::Kid.to_i64(), ParamValue::Int(5)),
        Parameter::new(
            iana::HeaderParameter::ContentType.to_i64(),
            ParamValue::Int(70_000),
        ),
    ];
    assert_eq!(params.find_alg_id(false), None);
    assert_eq!(params.find_kid(), None);
    assert_eq!(params.find_iv(), None);
    assert_eq!(params.find_content_type(), None);
    assert!(params.find(iana::HeaderParameter::Kid.to_i64()).is_some());
}

#[test]
fn typed_finders_return_values() {
    let params = vec![
        Parameter::kid(b"key-1".to_vec()),
        Parameter::partial_iv(vec![1, 2]),
        Parameter::content_type_text("application/cbor"),
    ];
    assert_eq!(params.find_kid(), Some(b"key-1".as_slice()));
    assert_eq!(params.find_partial_iv(), Some([1u8, 2].as_slice()));
    assert_eq!(
        params.find_content_type(),
        Some(ContentType::Text("application/cbor"))
    );
    let params = vec![Parameter::content_type(60)];
    assert_eq!(params.find_content_type(), Some(ContentType::Format(60)));
}
