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

//! The COSE_KDF_Context structure (RFC 9053, Section 5.2).
//!
//! ```cddl
//! PartyInfo = (
//!     identity : bstr / nil,
//!     nonce : bstr / int / nil,
//!     other : bstr / nil
//! )
//!
//! COSE_KDF_Context = [
//!     AlgorithmID : int / tstr,
//!     PartyUInfo : [ PartyInfo ],
//!     PartyVInfo : [ PartyInfo ],
//!     SuppPubInfo : [
//!         keyDataLength : uint,
//!         protected : empty_or_serialized_map,
//!         ? other : bstr
//!     ],
//!     ? SuppPrivInfo : bstr
//! ]
//! ```

use core::fmt::Display;

use ciborium::Value;
use coset::iana;
use coset::iana::EnumI64;

use crate::cose::cbor;
use crate::error::CoseCipherError;

/// Default size limit for the encoded COSE_KDF_Context.
pub const DEFAULT_KDF_CONTEXT_SIZE: usize = 50;

/// Optional inputs of the COSE_KDF_Context, shared out of band between sender and recipient.
///
/// Sender and recipient have to use identical values, otherwise they derive different keys.
///
/// # Example
///
/// ```
/// # use cose_engine::cose::recipient::KdfContextInputsBuilder;
/// let inputs = KdfContextInputsBuilder::default()
///     .party_u_identity(b"sender".to_vec())
///     .supp_pub_other(b"session 1".to_vec())
///     .build()
///     .unwrap();
/// assert_eq!(inputs.party_v_identity, None);
/// ```
#[derive(Debug, Default, PartialEq, Eq, Clone, Builder)]
#[builder(setter(into, strip_option), derive(Debug, PartialEq))]
pub struct KdfContextInputs {
    /// Identity of the sender (PartyU).
    #[builder(default)]
    pub party_u_identity: Option<Vec<u8>>,
    /// Nonce of the sender (PartyU).
    #[builder(default)]
    pub party_u_nonce: Option<Vec<u8>>,
    /// Other information about the sender (PartyU).
    #[builder(default)]
    pub party_u_other: Option<Vec<u8>>,
    /// Identity of the recipient (PartyV).
    #[builder(default)]
    pub party_v_identity: Option<Vec<u8>>,
    /// Nonce of the recipient (PartyV).
    #[builder(default)]
    pub party_v_nonce: Option<Vec<u8>>,
    /// Other information about the recipient (PartyV).
    #[builder(default)]
    pub party_v_other: Option<Vec<u8>>,
    /// Additional public information (`other` field of SuppPubInfo).
    #[builder(default)]
    pub supp_pub_other: Option<Vec<u8>>,
    /// Additional private information (SuppPrivInfo).
    #[builder(default)]
    pub supp_priv_info: Option<Vec<u8>>,
}

/// A fully determined COSE_KDF_Context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfContext<'a> {
    /// Algorithm the derived key is used with.
    pub algorithm: iana::Algorithm,
    /// Length of the derived key in bytes.
    pub key_length: usize,
    /// Contents of the protected header bucket of the recipient.
    pub protected: &'a [u8],
    /// Identity of PartyU, after merging configured and transmitted values.
    pub party_u_identity: Option<&'a [u8]>,
    /// Identity of PartyV, after merging configured and transmitted values.
    pub party_v_identity: Option<&'a [u8]>,
    /// The remaining inputs.
    pub inputs: &'a KdfContextInputs,
}

fn bytes_or_null(value: Option<&[u8]>) -> Value {
    value.map_or(Value::Null, |v| Value::Bytes(v.to_vec()))
}

impl KdfContext<'_> {
    /// Builds the CBOR structure of this context.
    #[must_use]
    pub fn to_cbor_value(&self) -> Value {
        let inputs = self.inputs;
        let key_bits = u64::try_from(self.key_length * 8).unwrap_or(u64::MAX);
        let mut supp_pub = vec![
            Value::from(key_bits),
            Value::Bytes(self.protected.to_vec()),
        ];
        if let Some(other) = &inputs.supp_pub_other {
            supp_pub.push(Value::Bytes(other.clone()));
        }
        let mut context = vec![
            Value::from(self.algorithm.to_i64()),
            Value::Array(vec![
                bytes_or_null(self.party_u_identity),
                bytes_or_null(inputs.party_u_nonce.as_deref()),
                bytes_or_null(inputs.party_u_other.as_deref()),
            ]),
            Value::Array(vec![
                bytes_or_null(self.party_v_identity),
                bytes_or_null(inputs.party_v_nonce.as_deref()),
                bytes_or_null(inputs.party_v_other.as_deref()),
            ]),
            Value::Array(supp_pub),
        ];
        if let Some(private) = &inputs.supp_priv_info {
            context.push(Value::Bytes(private.clone()));
        }
        Value::Array(context)
    }

    /// Serializes this context, which may take up at most `limit` bytes.
    ///
    /// # Errors
    ///
    /// [`CoseCipherError::KdfBufferTooSmall`] if the encoded context is larger than `limit`,
    /// reporting the required size.
    pub fn encode<BE: Display>(&self, limit: usize) -> Result<Vec<u8>, CoseCipherError<BE>> {
        let encoded = cbor::encode(&self.to_cbor_value())?;
        if encoded.len() > limit {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                needed = encoded.len(),
                available = limit,
                "KDF context does not fit into buffer"
            );
            return Err(CoseCipherError::KdfBufferTooSmall {
                needed: encoded.len(),
                available: limit,
            });
        }
        Ok(encoded)
    }
}
