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

//! In-memory representation of COSE header parameters.
//!
//! Parameters that should be encoded are collected by the caller in a [`ParameterList`].
//! Decoded parameters are stored in a [`ParameterPool`], a fixed-capacity arena that is only
//! ever appended to. Each decoded parameter carries the [`HeaderLocation`] it was found at.

use core::fmt::Debug;
use core::ops::{Deref, Range};
use std::sync::Arc;

use ciborium::Value;
use coset::iana;
use coset::iana::EnumI64;

use crate::error::{InvalidParameter, PoolExhausted};

#[cfg(test)]
mod tests;

/// Position of a header bucket within a COSE message.
///
/// `nesting` is 0 for the message body and 1 for the first level of COSE_Signature or
/// COSE_Recipient structures. `index` is the position within that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeaderLocation {
    /// Nesting level, 0 being the message body.
    pub nesting: u8,
    /// Index of the structure within its nesting level.
    pub index: u8,
}

impl HeaderLocation {
    /// Location of the message body headers.
    pub const BODY: HeaderLocation = HeaderLocation {
        nesting: 0,
        index: 0,
    };

    /// Creates a new header location.
    #[must_use]
    pub const fn new(nesting: u8, index: u8) -> HeaderLocation {
        HeaderLocation { nesting, index }
    }
}

/// A header parameter value that is not a plain integer or string.
///
/// [`to_cbor_value`](SpecialParameter::to_cbor_value) is called when the parameter is encoded.
pub trait SpecialParameter: Debug + Send + Sync {
    /// Produces the CBOR value of this parameter.
    ///
    /// # Errors
    ///
    /// If the value can not be represented in CBOR.
    fn to_cbor_value(&self) -> Result<Value, InvalidParameter>;
}

impl SpecialParameter for Value {
    fn to_cbor_value(&self) -> Result<Value, InvalidParameter> {
        Ok(self.clone())
    }
}

/// Value of a header parameter.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// Integer value.
    Int(i64),
    /// Byte string value.
    Bytes(Vec<u8>),
    /// Text string value.
    Text(String),
    /// Any other value, encoded and decoded by callbacks.
    Special(Arc<dyn SpecialParameter>),
}

impl ParamValue {
    /// Wraps a CBOR value as a special parameter value.
    #[must_use]
    pub fn special(value: Value) -> ParamValue {
        ParamValue::Special(Arc::new(value))
    }

    /// Returns the CBOR value of this parameter value.
    ///
    /// # Errors
    ///
    /// If the value is a special value whose encode callback fails.
    pub fn to_cbor_value(&self) -> Result<Value, InvalidParameter> {
        match self {
            ParamValue::Int(v) => Ok(Value::from(*v)),
            ParamValue::Bytes(v) => Ok(Value::Bytes(v.clone())),
            ParamValue::Text(v) => Ok(Value::Text(v.clone())),
            ParamValue::Special(v) => v.to_cbor_value(),
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Bytes(a), ParamValue::Bytes(b)) => a == b,
            (ParamValue::Text(a), ParamValue::Text(b)) => a == b,
            (ParamValue::Special(a), ParamValue::Special(b)) => {
                match (a.to_cbor_value(), b.to_cbor_value()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// A single COSE header parameter.
///
/// Two parameters are equal if their label, protected-ness, critical-ness and value are
/// equal. The location is not compared.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Label of the parameter.
    pub label: i64,
    /// Whether the parameter is (to be) located in the protected bucket.
    pub in_protected: bool,
    /// Whether the parameter is (to be) listed in the "crit" header parameter.
    pub critical: bool,
    /// Where the parameter was decoded from.
    pub location: HeaderLocation,
    /// Value of the parameter.
    pub value: ParamValue,
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.in_protected == other.in_protected
            && self.critical == other.critical
            && self.value == other.value
    }
}

impl Default for Parameter {
    fn default() -> Self {
        Parameter {
            label: 0,
            in_protected: false,
            critical: false,
            location: HeaderLocation::BODY,
            value: ParamValue::Int(0),
        }
    }
}

impl Parameter {
    /// Creates a new unprotected, non-critical parameter.
    #[must_use]
    pub fn new(label: i64, value: ParamValue) -> Parameter {
        Parameter {
            label,
            value,
            ..Parameter::default()
        }
    }

    /// Moves the parameter into the protected bucket.
    #[must_use]
    pub fn protected(mut self) -> Parameter {
        self.in_protected = true;
        self
    }

    /// Marks the parameter as critical.
    ///
    /// Critical parameters have to be protected.
    #[must_use]
    pub fn critical(mut self) -> Parameter {
        self.critical = true;
        self
    }

    /// Sets the location of the parameter.
    #[must_use]
    pub fn at(mut self, location: HeaderLocation) -> Parameter {
        self.location = location;
        self
    }

    /// Protected algorithm identifier.
    #[must_use]
    pub fn alg(alg: iana::Algorithm) -> Parameter {
        Parameter::new(
            iana::HeaderParameter::Alg.to_i64(),
            ParamValue::Int(alg.to_i64()),
        )
        .protected()
    }

    /// Unprotected key identifier.
    #[must_use]
    pub fn kid(kid: impl Into<Vec<u8>>) -> Parameter {
        Parameter::new(
            iana::HeaderParameter::Kid.to_i64(),
            ParamValue::Bytes(kid.into()),
        )
    }

    /// Unprotected initialization vector.
    #[must_use]
    pub fn iv(iv: impl Into<Vec<u8>>) -> Parameter {
        Parameter::new(
            iana::HeaderParameter::Iv.to_i64(),
            ParamValue::Bytes(iv.into()),
        )
    }

    /// Unprotected partial initialization vector.
    #[must_use]
    pub fn partial_iv(partial_iv: impl Into<Vec<u8>>) -> Parameter {
        Parameter::new(
            iana::HeaderParameter::PartialIv.to_i64(),
            ParamValue::Bytes(partial_iv.into()),
        )
    }

    /// Protected content type given as a CoAP content format.
    #[must_use]
    pub fn content_type(format: u16) -> Parameter {
        Parameter::new(
            iana::HeaderParameter::ContentType.to_i64(),
            ParamValue::Int(i64::from(format)),
        )
        .protected()
    }

    /// Protected content type given as a media type string.
    #[must_use]
    pub fn content_type_text(media_type: impl Into<String>) -> Parameter {
        Parameter::new(
            iana::HeaderParameter::ContentType.to_i64(),
            ParamValue::Text(media_type.into()),
        )
        .protected()
    }
}

/// An ordered list of parameters to be encoded, owned by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterList(Vec<Parameter>);

impl ParameterList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> ParameterList {
        ParameterList(Vec::new())
    }

    /// Appends a single parameter.
    pub fn push(&mut self, param: Parameter) {
        self.0.push(param);
    }

    /// Splices `tail` onto the end of this list.
    pub fn append(&mut self, mut tail: ParameterList) {
        self.0.append(&mut tail.0);
    }

    /// Returns the parameters as a vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Parameter> {
        self.0
    }
}

impl Deref for ParameterList {
    type Target = [Parameter];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Parameter>> for ParameterList {
    fn from(value: Vec<Parameter>) -> Self {
        ParameterList(value)
    }
}

impl FromIterator<Parameter> for ParameterList {
    fn from_iter<T: IntoIterator<Item = Parameter>>(iter: T) -> Self {
        ParameterList(iter.into_iter().collect())
    }
}

impl Extend<Parameter> for ParameterList {
    fn extend<T: IntoIterator<Item = Parameter>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ParameterList {
    type Item = Parameter;
    type IntoIter = std::vec::IntoIter<Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Fixed-capacity arena holding decoded parameters.
///
/// Parameters are carved sequentially and never released individually; dropping the pool
/// releases all of them.
#[derive(Debug, Clone)]
pub struct ParameterPool {
    storage: Vec<Parameter>,
    size: usize,
}

impl ParameterPool {
    /// Creates an empty pool that can hold up to `size` parameters.
    #[must_use]
    pub fn new(size: usize) -> ParameterPool {
        ParameterPool {
            storage: Vec::with_capacity(size),
            size,
        }
    }

    /// Allocates a new default parameter at the end of the pool.
    ///
    /// # Errors
    ///
    /// If the pool is full.
    pub fn alloc(&mut self) -> Result<&mut Parameter, PoolExhausted> {
        if self.storage.len() >= self.size {
            return Err(PoolExhausted { size: self.size });
        }
        self.storage.push(Parameter::default());
        let last = self.storage.len() - 1;
        Ok(&mut self.storage[last])
    }

    /// Number of parameters allocated so far.
    #[must_use]
    pub fn used(&self) -> usize {
        self.storage.len()
    }

    /// Capacity of the pool.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the parameters in the given range, as returned by the header decoder.
    ///
    /// Out of range indices yield an empty slice.
    #[must_use]
    pub fn get(&self, range: Range<usize>) -> &[Parameter] {
        self.storage.get(range).unwrap_or(&[])
    }

    /// Returns all parameters allocated so far.
    #[must_use]
    pub fn as_slice(&self) -> &[Parameter] {
        &self.storage
    }

    /// Drops everything allocated after `mark`.
    ///
    /// Used to discard the parameters of recipients and signatures that were declined.
    pub(crate) fn rewind(&mut self, mark: usize) {
        self.storage.truncate(mark);
    }
}

/// Content type of a message, as stored in the content type header parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType<'a> {
    /// CoAP content format number.
    Format(u16),
    /// Media type string.
    Text(&'a str),
}

/// Lookup functions on a sequence of parameters.
///
/// The typed finders return `None` both if the parameter is absent and if it has an
/// unexpected type.
pub trait Parameters {
    /// Finds the first parameter with the given label.
    fn find(&self, label: i64) -> Option<&Parameter>;

    /// Finds the algorithm identifier.
    ///
    /// If `protected` is set, only a protected algorithm identifier is returned.
    fn find_alg_id(&self, protected: bool) -> Option<i64>;

    /// Finds the byte string value of the parameter with the given label.
    fn find_bytes(&self, label: i64) -> Option<&[u8]>;

    /// Finds the key identifier.
    fn find_kid(&self) -> Option<&[u8]> {
        self.find_bytes(iana::HeaderParameter::Kid.to_i64())
    }

    /// Finds the initialization vector.
    fn find_iv(&self) -> Option<&[u8]> {
        self.find_bytes(iana::HeaderParameter::Iv.to_i64())
    }

    /// Finds the partial initialization vector.
    fn find_partial_iv(&self) -> Option<&[u8]> {
        self.find_bytes(iana::HeaderParameter::PartialIv.to_i64())
    }

    /// Finds the content type.
    fn find_content_type(&self) -> Option<ContentType<'_>>;
}

impl Parameters for [Parameter] {
    fn find(&self, label: i64) -> Option<&Parameter> {
        self.iter().find(|p| p.label == label)
    }

    fn find_alg_id(&self, protected: bool) -> Option<i64> {
        match self.find(iana::HeaderParameter::Alg.to_i64()) {
            Some(Parameter {
                value: ParamValue::Int(alg),
                in_protected,
                ..
            }) if *in_protected || !protected => Some(*alg),
            _ => None,
        }
    }

    fn find_bytes(&self, label: i64) -> Option<&[u8]> {
        match self.find(label) {
            Some(Parameter {
                value: ParamValue::Bytes(v),
                ..
            }) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn find_content_type(&self) -> Option<ContentType<'_>> {
        match self.find(iana::HeaderParameter::ContentType.to_i64()) {
            Some(Parameter {
                value: ParamValue::Int(v),
                ..
            }) => u16::try_from(*v).ok().map(ContentType::Format),
            Some(Parameter {
                value: ParamValue::Text(v),
                ..
            }) => Some(ContentType::Text(v.as_str())),
            _ => None,
        }
    }
}
