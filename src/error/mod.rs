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

//! Contains the error types used across this crate.
//!
//! All COSE operations report failures through [`CoseCipherError`], which is generic over the
//! error type of the cryptographic backend in use. Errors produced by the backend itself are
//! wrapped in [`CoseCipherError::Other`].

use core::fmt::{Debug, Display, Formatter};

use ciborium::Value;
use coset::{iana, Algorithm, KeyType, Label};

use crate::cose::key::{EllipticCurve, KeyParam};
use crate::cose::message::MessageType;

/// Error returned by a special header parameter callback when it cannot handle a value it
/// claimed responsibility for.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidParameter {
    /// Label of the offending header parameter.
    pub label: Label,
    /// The value that could not be processed.
    pub value: Value,
}

impl InvalidParameter {
    /// Creates a new error for the integer `label` and the offending `value`.
    #[must_use]
    pub fn new(label: i64, value: Value) -> InvalidParameter {
        InvalidParameter {
            label: Label::Int(label),
            value,
        }
    }
}

impl Display for InvalidParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid value for header parameter {:?}", self.label)
    }
}

/// Error returned when a [`ParameterPool`](crate::cose::param::ParameterPool) has no room
/// left for another parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted {
    /// Capacity of the exhausted pool.
    pub size: usize,
}

impl Display for PoolExhausted {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "parameter pool of size {} is exhausted", self.size)
    }
}

/// Errors that may occur while encoding, decoding, signing, verifying, encrypting or
/// decrypting COSE structures.
///
/// `T` is the error type of the cryptographic backend.
#[derive(Debug)]
#[non_exhaustive]
pub enum CoseCipherError<T>
where
    T: Display,
{
    /// The input is not well-formed CBOR (or ends prematurely).
    MalformedCbor(String),
    /// A CBOR item of a different type or shape than required was found.
    UnexpectedItem {
        /// What was expected.
        expected: &'static str,
        /// Where it was expected.
        context: &'static str,
    },
    /// Additional data follows the end of the COSE structure.
    ExtraneousData,
    /// A value could not be serialized to CBOR.
    EncodingFailure(String),
    /// The same header parameter label occurs more than once for one header location.
    DuplicateParameter(Label),
    /// A parameter was marked as critical, but was not understood by any consumer.
    UnknownCriticalParameter(Label),
    /// A parameter marked as critical is located in the unprotected bucket.
    CriticalParameterUnprotected(i64),
    /// The "crit" header parameter is malformed or not protected.
    InvalidCriticalList,
    /// The mandatory algorithm identifier is missing (or not protected where it must be).
    MissingAlgorithm,
    /// The algorithm identifier has the wrong CBOR type.
    InvalidAlgorithmType(Value),
    /// Both an IV and a partial IV were provided.
    IvAndPartialIv,
    /// A header parameter required for the operation is missing.
    MissingHeaderParam(iana::HeaderParameter),
    /// A header parameter has an invalid value.
    InvalidHeaderParam(Label, Value),
    /// A CBOR tag identifying the message type was required but not present.
    MissingTag,
    /// The message carries a tag that does not match the expected message type.
    UnexpectedTag(u64),
    /// The message carries a tag although tags were prohibited.
    TagProhibited(u64),
    /// The message is of a type that this decoder cannot process.
    UnexpectedMessageType(MessageType),
    /// Protected headers were provided for a recipient that does not allow them.
    ProtectedHeadersNotAllowed,
    /// The number of signers does not fit the message type.
    InvalidSignerCount(usize),
    /// A COSE_Encrypt message must have at least one recipient.
    NoRecipients,
    /// A direct key recipient has to be the only recipient of a message.
    DirectRecipientNotAlone,
    /// No key was provided for an operation that needs one.
    MissingKey,
    /// The parameter pool has no room left.
    TooManyParameters(PoolExhausted),
    /// The output buffer is too small for the encoded structure.
    BufferTooSmall {
        /// Size required for the output.
        needed: usize,
        /// Size of the provided buffer.
        available: usize,
    },
    /// The scratch buffer for the COSE_KDF_Context structure is too small.
    KdfBufferTooSmall {
        /// Size of the encoded KDF context.
        needed: usize,
        /// Configured size of the scratch buffer.
        available: usize,
    },
    /// The algorithm requires an auxiliary buffer, but none was configured.
    NeedAuxiliaryBuffer {
        /// Size the auxiliary buffer needs to have.
        needed: usize,
    },
    /// The configured auxiliary buffer is too small.
    AuxiliaryBufferTooSmall {
        /// Size the auxiliary buffer needs to have.
        needed: usize,
        /// Size of the configured buffer.
        available: usize,
    },
    /// Signature verification failed.
    VerificationFailure,
    /// Authenticated decryption failed.
    DataAuthenticationFailure,
    /// Integrity check of an AES key unwrap operation failed.
    KeyUnwrapFailure,
    /// The algorithm is not supported by the backend or the operation.
    UnsupportedAlgorithm(Algorithm),
    /// The elliptic curve is not supported.
    UnsupportedCurve(EllipticCurve),
    /// The key type is not supported.
    UnsupportedKeyType(KeyType),
    /// A key parameter that is required for the operation is missing.
    MissingKeyParam(KeyParam),
    /// A key parameter has an invalid value.
    InvalidKeyParam(KeyParam, Value),
    /// The key type and the curve of a key do not fit together.
    KeyTypeCurveMismatch(KeyType, EllipticCurve),
    /// A short-circuit signature was encountered, but the verifier does not allow them.
    ShortCircuitNotAllowed,
    /// The key ID of a short-circuit signature is not the well-known short-circuit key ID.
    ShortCircuitKidMismatch,
    /// No recipient decoder was applicable to any recipient of the message.
    NoApplicableRecipient,
    /// No verifier was applicable to the signature(s) of the message.
    NoApplicableVerifier,
    /// Error of the cryptographic backend.
    Other(T),
}

impl<T: Display> From<PoolExhausted> for CoseCipherError<T> {
    fn from(value: PoolExhausted) -> Self {
        CoseCipherError::TooManyParameters(value)
    }
}

impl<T: Display> From<InvalidParameter> for CoseCipherError<T> {
    fn from(value: InvalidParameter) -> Self {
        CoseCipherError::InvalidHeaderParam(value.label, value.value)
    }
}

impl<T> Display for CoseCipherError<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            CoseCipherError::MalformedCbor(e) => write!(f, "malformed CBOR input: {e}"),
            CoseCipherError::UnexpectedItem { expected, context } => {
                write!(f, "expected {expected} in {context}")
            }
            CoseCipherError::ExtraneousData => write!(f, "extraneous data after COSE structure"),
            CoseCipherError::EncodingFailure(e) => write!(f, "unable to encode CBOR: {e}"),
            CoseCipherError::DuplicateParameter(l) => {
                write!(f, "duplicate header parameter with label {l:?}")
            }
            CoseCipherError::UnknownCriticalParameter(l) => {
                write!(f, "critical header parameter {l:?} was not understood")
            }
            CoseCipherError::CriticalParameterUnprotected(l) => {
                write!(f, "critical header parameter {l} is not protected")
            }
            CoseCipherError::InvalidCriticalList => write!(f, "invalid crit header parameter"),
            CoseCipherError::MissingAlgorithm => {
                write!(f, "protected algorithm header parameter is missing")
            }
            CoseCipherError::InvalidAlgorithmType(v) => {
                write!(f, "algorithm identifier has invalid type: {v:?}")
            }
            CoseCipherError::IvAndPartialIv => {
                write!(f, "both IV and partial IV header parameters are present")
            }
            CoseCipherError::MissingHeaderParam(p) => {
                write!(f, "required header parameter {p:?} is missing")
            }
            CoseCipherError::InvalidHeaderParam(l, v) => {
                write!(f, "header parameter {l:?} has invalid value {v:?}")
            }
            CoseCipherError::MissingTag => write!(f, "message type tag is missing"),
            CoseCipherError::UnexpectedTag(t) => write!(f, "unexpected message tag {t}"),
            CoseCipherError::TagProhibited(t) => write!(f, "message tag {t} is prohibited"),
            CoseCipherError::UnexpectedMessageType(t) => {
                write!(f, "message type {t} can not be processed here")
            }
            CoseCipherError::ProtectedHeadersNotAllowed => {
                write!(f, "protected header parameters are not allowed for this recipient")
            }
            CoseCipherError::InvalidSignerCount(n) => {
                write!(f, "invalid number of signers for message type: {n}")
            }
            CoseCipherError::NoRecipients => write!(f, "no recipients were provided"),
            CoseCipherError::DirectRecipientNotAlone => {
                write!(f, "direct key recipient must be the only recipient")
            }
            CoseCipherError::MissingKey => write!(f, "no key was provided"),
            CoseCipherError::TooManyParameters(e) => write!(f, "{e}"),
            CoseCipherError::BufferTooSmall { needed, available } => {
                write!(f, "output buffer too small ({available} < {needed} bytes)")
            }
            CoseCipherError::KdfBufferTooSmall { needed, available } => write!(
                f,
                "KDF context buffer too small ({available} < {needed} bytes)"
            ),
            CoseCipherError::NeedAuxiliaryBuffer { needed } => {
                write!(f, "auxiliary buffer of {needed} bytes required")
            }
            CoseCipherError::AuxiliaryBufferTooSmall { needed, available } => write!(
                f,
                "auxiliary buffer too small ({available} < {needed} bytes)"
            ),
            CoseCipherError::VerificationFailure => write!(f, "signature verification failed"),
            CoseCipherError::DataAuthenticationFailure => {
                write!(f, "data authentication failed")
            }
            CoseCipherError::KeyUnwrapFailure => write!(f, "key unwrap integrity check failed"),
            CoseCipherError::UnsupportedAlgorithm(a) => write!(f, "unsupported algorithm {a:?}"),
            CoseCipherError::UnsupportedCurve(c) => write!(f, "unsupported curve {c:?}"),
            CoseCipherError::UnsupportedKeyType(k) => write!(f, "unsupported key type {k:?}"),
            CoseCipherError::MissingKeyParam(p) => write!(f, "missing key parameter {p:?}"),
            CoseCipherError::InvalidKeyParam(p, v) => {
                write!(f, "key parameter {p:?} has invalid value {v:?}")
            }
            CoseCipherError::KeyTypeCurveMismatch(k, c) => {
                write!(f, "key type {k:?} can not be used with curve {c:?}")
            }
            CoseCipherError::ShortCircuitNotAllowed => {
                write!(f, "short-circuit signatures are not allowed")
            }
            CoseCipherError::ShortCircuitKidMismatch => {
                write!(f, "short-circuit signature has an unexpected key ID")
            }
            CoseCipherError::NoApplicableRecipient => write!(f, "no applicable recipient found"),
            CoseCipherError::NoApplicableVerifier => write!(f, "no applicable verifier found"),
            CoseCipherError::Other(e) => write!(f, "backend error: {e}"),
        }
    }
}

impl<T: Debug + Display> std::error::Error for CoseCipherError<T> {}
