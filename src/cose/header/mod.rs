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

//! Encoding and decoding of the protected and unprotected header buckets.
//!
//! A header location (the message body, a COSE_Signature or a COSE_Recipient) carries two
//! buckets: the protected bucket is a byte string wrapping a CBOR map (so that its exact bytes
//! can be covered by a signature or AEAD tag), the unprotected bucket is a plain map.
//!
//! Both directions enforce the same rules:
//! - a label may only occur once across both buckets of one location,
//! - critical parameters must be protected and are announced using the "crit" parameter,
//! - critical parameters that are not understood abort decoding.
//!
//! Parameters whose value is not an integer or string are handed to a [`SpecialDecoder`]
//! during decoding, and encoded using their [`SpecialParameter`](crate::cose::param::SpecialParameter)
//! implementation.

use core::fmt::Display;
use core::ops::Range;

use ciborium::Value;
use coset::iana::EnumI64;
use coset::{iana, Algorithm, Label};

use crate::cose::cbor;
use crate::cose::param::{HeaderLocation, ParamValue, Parameter, ParameterPool, Parameters};
use crate::error::{CoseCipherError, InvalidParameter};


/// Labels of the header parameters understood by every consumer.
const STANDARD_LABELS: [iana::HeaderParameter; 5] = [
    iana::HeaderParameter::Alg,
    iana::HeaderParameter::ContentType,
    iana::HeaderParameter::Kid,
    iana::HeaderParameter::Iv,
    iana::HeaderParameter::PartialIv,
];

/// Encoded form of the headers of one location.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedHeaders {
    /// Contents of the protected bucket (the serialized map, empty if there are no protected
    /// parameters). This is what signatures and AEAD tags cover.
    pub protected: Vec<u8>,
    /// The unprotected bucket.
    pub unprotected: Value,
}

impl EncodedHeaders {
    /// Returns the protected bucket wrapped as a CBOR byte string.
    #[must_use]
    pub fn protected_value(&self) -> Value {
        Value::Bytes(self.protected.clone())
    }
}

/// Result of decoding the headers of one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeaders {
    /// Raw contents of the protected bucket.
    pub protected: Vec<u8>,
    /// Range of the decoded parameters in the [`ParameterPool`].
    pub parameters: Range<usize>,
}

/// Information about a parameter handed to a [`SpecialDecoder`] before its value is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterPeek {
    /// Label of the parameter.
    pub label: i64,
    /// Whether the parameter is located in the protected bucket.
    pub in_protected: bool,
    /// Whether the parameter is listed as critical.
    pub critical: bool,
    /// Location of the headers the parameter belongs to.
    pub location: HeaderLocation,
}

/// Outcome of a [`SpecialDecoder`] invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialDecode {
    /// The decoder understood the parameter and produced its value.
    Consumed(ParamValue),
    /// The decoder does not know the parameter.
    Declined,
}

/// Callback for header parameters whose value is not a plain integer or string.
///
/// Declined parameters are silently dropped unless they are critical, in which case decoding
/// fails with [`CoseCipherError::UnknownCriticalParameter`].
pub trait SpecialDecoder {
    /// Decodes the value of the parameter described by `peek`.
    ///
    /// # Errors
    ///
    /// If the parameter is known, but its value is invalid.
    fn decode_special(
        &mut self,
        peek: &ParameterPeek,
        value: &Value,
    ) -> Result<SpecialDecode, InvalidParameter>;
}

impl<F> SpecialDecoder for F
where
    F: FnMut(&ParameterPeek, &Value) -> Result<SpecialDecode, InvalidParameter>,
{
    fn decode_special(
        &mut self,
        peek: &ParameterPeek,
        value: &Value,
    ) -> Result<SpecialDecode, InvalidParameter> {
        self(peek, value)
    }
}

fn check_for_duplicate_labels<BE: Display>(params: &[Parameter]) -> Result<(), CoseCipherError<BE>> {
    for (i, param) in params.iter().enumerate() {
        if params[..i].iter().any(|p| p.label == param.label) {
            return Err(CoseCipherError::DuplicateParameter(Label::Int(param.label)));
        }
    }
    Ok(())
}

/// Encodes the given parameters into a protected and an unprotected bucket.
///
/// If any protected parameter is critical, a "crit" parameter listing the critical labels is
/// added to the protected bucket.
///
/// # Errors
///
/// - [`CoseCipherError::DuplicateParameter`] if a label occurs more than once.
/// - [`CoseCipherError::CriticalParameterUnprotected`] if a critical parameter is unprotected.
/// - [`CoseCipherError::InvalidCriticalList`] if the list contains a "crit" parameter itself.
/// - [`CoseCipherError::InvalidHeaderParam`] if the encode callback of a special value fails.
pub fn encode_headers<BE: Display>(
    params: &[Parameter],
) -> Result<EncodedHeaders, CoseCipherError<BE>> {
    check_for_duplicate_labels(params)?;

    let crit_label = iana::HeaderParameter::Crit.to_i64();
    let mut protected = Vec::new();
    let mut unprotected = Vec::new();
    let mut crit = Vec::new();
    for param in params {
        if param.label == crit_label {
            return Err(CoseCipherError::InvalidCriticalList);
        }
        let entry = (Value::from(param.label), param.value.to_cbor_value()?);
        if param.in_protected {
            if param.critical {
                crit.push(Value::from(param.label));
            }
            protected.push(entry);
        } else if param.critical {
            return Err(CoseCipherError::CriticalParameterUnprotected(param.label));
        } else {
            unprotected.push(entry);
        }
    }
    if !crit.is_empty() {
        protected.push((Value::from(crit_label), Value::Array(crit)));
    }

    let protected = if protected.is_empty() {
        Vec::new()
    } else {
        cbor::encode(&Value::Map(protected))?
    };
    Ok(EncodedHeaders {
        protected,
        unprotected: Value::Map(unprotected),
    })
}

fn decode_label<BE: Display>(key: &Value) -> Result<Label, CoseCipherError<BE>> {
    match key {
        Value::Integer(i) => i64::try_from(*i)
            .map(Label::Int)
            .map_err(|_e| CoseCipherError::UnexpectedItem {
                expected: "label within the 64-bit signed integer range",
                context: "header parameter label",
            }),
        Value::Text(t) => Ok(Label::Text(t.clone())),
        _ => Err(CoseCipherError::UnexpectedItem {
            expected: "integer or text string",
            context: "header parameter label",
        }),
    }
}

/// Extracts the labels listed in the "crit" parameter of a protected bucket.
fn critical_labels<BE: Display>(map: &[(Value, Value)]) -> Result<Vec<Label>, CoseCipherError<BE>> {
    let crit_label = Value::from(iana::HeaderParameter::Crit.to_i64());
    match map.iter().find(|(k, _)| *k == crit_label) {
        None => Ok(Vec::new()),
        Some((_, Value::Array(labels))) if !labels.is_empty() => labels
            .iter()
            .map(|l| decode_label::<BE>(l).map_err(|_e| CoseCipherError::InvalidCriticalList))
            .collect(),
        Some(_) => Err(CoseCipherError::InvalidCriticalList),
    }
}

fn plain_value(value: &Value) -> Option<ParamValue> {
    match value {
        Value::Integer(i) => i64::try_from(*i).ok().map(ParamValue::Int),
        Value::Bytes(b) => Some(ParamValue::Bytes(b.clone())),
        Value::Text(t) => Some(ParamValue::Text(t.clone())),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_bucket<BE: Display>(
    location: HeaderLocation,
    map: &[(Value, Value)],
    in_protected: bool,
    crit: &[Label],
    seen: &mut Vec<Label>,
    special: &mut Option<&mut (dyn SpecialDecoder + '_)>,
    pool: &mut ParameterPool,
) -> Result<(), CoseCipherError<BE>> {
    let crit_label = iana::HeaderParameter::Crit.to_i64();
    for (key, value) in map {
        let label = decode_label(key)?;
        if seen.contains(&label) {
            return Err(CoseCipherError::DuplicateParameter(label));
        }
        seen.push(label.clone());

        let critical = in_protected && crit.contains(&label);
        let label = match label {
            Label::Int(l) => l,
            Label::Text(_) if critical => {
                return Err(CoseCipherError::UnknownCriticalParameter(label));
            }
            Label::Text(_) => continue,
        };
        if label == crit_label {
            if in_protected {
                // Already evaluated by critical_labels.
                continue;
            }
            return Err(CoseCipherError::InvalidCriticalList);
        }

        let value = if let Some(v) = plain_value(value) {
            v
        } else {
            let peek = ParameterPeek {
                label,
                in_protected,
                critical,
                location,
            };
            let outcome = match special.as_mut() {
                Some(decoder) => decoder.decode_special(&peek, value)?,
                None => SpecialDecode::Declined,
            };
            match outcome {
                SpecialDecode::Consumed(v) => v,
                SpecialDecode::Declined if critical => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(label, "critical header parameter was not understood");
                    return Err(CoseCipherError::UnknownCriticalParameter(Label::Int(label)));
                }
                SpecialDecode::Declined => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(label, "dropping unknown header parameter");
                    continue;
                }
            }
        };

        *pool.alloc()? = Parameter {
            label,
            in_protected,
            critical,
            location,
            value,
        };
    }
    Ok(())
}

/// Decodes the protected and unprotected buckets of one header location.
///
/// The decoded parameters are appended to `pool` and stamped with `location`. Parameters
/// whose value is neither an integer nor a string are handed to `special`.
///
/// # Errors
///
/// - Format errors if the buckets are not a byte string and a map respectively.
/// - [`CoseCipherError::DuplicateParameter`] if a label occurs more than once.
/// - [`CoseCipherError::InvalidCriticalList`] if the "crit" parameter is malformed or
///   unprotected.
/// - [`CoseCipherError::UnknownCriticalParameter`] if a critical parameter was declined.
/// - [`CoseCipherError::TooManyParameters`] if the pool is exhausted.
pub fn decode_headers<BE: Display>(
    location: HeaderLocation,
    protected: &Value,
    unprotected: &Value,
    special: Option<&mut (dyn SpecialDecoder + '_)>,
    pool: &mut ParameterPool,
) -> Result<DecodedHeaders, CoseCipherError<BE>> {
    let Value::Bytes(protected_bytes) = protected else {
        return Err(CoseCipherError::UnexpectedItem {
            expected: "byte string",
            context: "protected header bucket",
        });
    };
    let Value::Map(unprotected_map) = unprotected else {
        return Err(CoseCipherError::UnexpectedItem {
            expected: "map",
            context: "unprotected header bucket",
        });
    };

    let mut special = special;
    let start = pool.used();
    let mut seen = Vec::new();
    if !protected_bytes.is_empty() {
        let Value::Map(protected_map) = cbor::decode(protected_bytes)? else {
            return Err(CoseCipherError::UnexpectedItem {
                expected: "map",
                context: "protected header bucket",
            });
        };
        let crit = critical_labels(&protected_map)?;
        decode_bucket(
            location,
            &protected_map,
            true,
            &crit,
            &mut seen,
            &mut special,
            pool,
        )?;
    }
    decode_bucket(
        location,
        unprotected_map,
        false,
        &[],
        &mut seen,
        &mut special,
        pool,
    )?;

    Ok(DecodedHeaders {
        protected: protected_bytes.clone(),
        parameters: start..pool.used(),
    })
}

/// Ensures that every critical parameter is understood.
///
/// Parameters with special values were consumed by a [`SpecialDecoder`] and count as
/// understood. Plain parameters are understood if their label is one of the standard labels
/// (algorithm, content type, key ID, IV, partial IV) or is contained in `understood`.
///
/// # Errors
///
/// [`CoseCipherError::UnknownCriticalParameter`] for the first critical parameter not
/// understood.
pub fn check_critical_parameters<BE: Display>(
    params: &[Parameter],
    understood: &[i64],
) -> Result<(), CoseCipherError<BE>> {
    let unknown = params.iter().find(|p| {
        p.critical
            && !matches!(p.value, ParamValue::Special(_))
            && !STANDARD_LABELS.iter().any(|l| l.to_i64() == p.label)
            && !understood.contains(&p.label)
    });
    match unknown {
        Some(p) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(label = p.label, "critical header parameter was not understood");
            Err(CoseCipherError::UnknownCriticalParameter(Label::Int(p.label)))
        }
        None => Ok(()),
    }
}

/// Ensures that at most one of IV and partial IV is present.
///
/// # Errors
///
/// [`CoseCipherError::IvAndPartialIv`] if both are present.
pub fn check_iv_parameters<BE: Display>(params: &[Parameter]) -> Result<(), CoseCipherError<BE>> {
    if params.find(iana::HeaderParameter::Iv.to_i64()).is_some()
        && params
            .find(iana::HeaderParameter::PartialIv.to_i64())
            .is_some()
    {
        return Err(CoseCipherError::IvAndPartialIv);
    }
    Ok(())
}

/// Finds the integer algorithm identifier without resolving it.
///
/// # Errors
///
/// - [`CoseCipherError::MissingAlgorithm`] if there is no algorithm identifier (or it is not
///   protected although `protected` is set).
/// - [`CoseCipherError::InvalidAlgorithmType`] if the identifier is not an integer.
pub(crate) fn algorithm_id<BE: Display>(
    params: &[Parameter],
    protected: bool,
) -> Result<i64, CoseCipherError<BE>> {
    if let Some(alg) = params.find_alg_id(protected) {
        return Ok(alg);
    }
    match params.find(iana::HeaderParameter::Alg.to_i64()) {
        Some(Parameter {
            value: ParamValue::Int(_),
            ..
        })
        | None => Err(CoseCipherError::MissingAlgorithm),
        Some(p) => Err(CoseCipherError::InvalidAlgorithmType(
            p.value.to_cbor_value().unwrap_or(Value::Null),
        )),
    }
}

/// Determines the algorithm from the given parameters.
///
/// # Errors
///
/// See [`algorithm_id`]. Additionally fails with [`CoseCipherError::UnsupportedAlgorithm`] if
/// the identifier is not an assigned algorithm.
pub(crate) fn determine_algorithm<BE: Display>(
    params: &[Parameter],
    protected: bool,
) -> Result<iana::Algorithm, CoseCipherError<BE>> {
    let alg = algorithm_id::<BE>(params, protected)?;
    iana::Algorithm::from_i64(alg)
        .ok_or(CoseCipherError::UnsupportedAlgorithm(Algorithm::PrivateUse(alg)))
}
