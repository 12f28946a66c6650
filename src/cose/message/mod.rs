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

//! Message types, their CBOR tags and the flags controlling encoding and decoding.

use core::fmt::Display;
use core::ops::Range;

use ciborium::Value;
use enumflags2::{bitflags, BitFlags};

use crate::error::CoseCipherError;


/// The COSE message shapes handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum MessageType {
    /// COSE_Sign1: a message with a single signature.
    Sign1,
    /// COSE_Sign: a message with one or more signatures.
    Sign,
    /// COSE_Encrypt0: an encrypted message whose key is known to the recipient.
    Encrypt0,
    /// COSE_Encrypt: an encrypted message with one or more recipients.
    Encrypt,
}

impl MessageType {
    /// CBOR tag number of this message type.
    #[must_use]
    pub const fn tag(self) -> u64 {
        match self {
            MessageType::Sign1 => 18,
            MessageType::Sign => 98,
            MessageType::Encrypt0 => 16,
            MessageType::Encrypt => 96,
        }
    }

    /// Determines the message type from a CBOR tag number.
    #[must_use]
    pub const fn from_tag(tag: u64) -> Option<MessageType> {
        match tag {
            18 => Some(MessageType::Sign1),
            98 => Some(MessageType::Sign),
            16 => Some(MessageType::Encrypt0),
            96 => Some(MessageType::Encrypt),
            _ => None,
        }
    }

    /// Context string used in the to-be-signed or to-be-encrypted structure.
    pub(crate) const fn context(self) -> &'static str {
        match self {
            MessageType::Sign1 => "Signature1",
            MessageType::Sign => "Signature",
            MessageType::Encrypt0 => "Encrypt0",
            MessageType::Encrypt => "Encrypt",
        }
    }
}

/// Options for encoding a message.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFlag {
    /// Do not prepend the CBOR tag of the message type.
    OmitTag,
    /// Transmit `null` in place of the payload, which has to be conveyed separately.
    DetachedPayload,
}

/// Options for decoding a message.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFlag {
    /// Fail if the message does not carry a CBOR tag.
    TagRequired,
    /// Fail if the message carries a CBOR tag.
    TagProhibited,
    /// Require every COSE_Signature of a COSE_Sign message to be verified.
    VerifyAllSignatures,
}

/// A successfully decoded, verified or decrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Type of the message.
    pub message_type: MessageType,
    /// The payload (for signed messages) or the plaintext (for encrypted messages).
    pub content: Vec<u8>,
    /// Raw protected header bucket of the message body.
    pub protected: Vec<u8>,
    /// Range of the body parameters in the parameter pool used for decoding.
    pub body_parameters: Range<usize>,
}

/// Wraps an encoded message in its CBOR tag unless tagging was disabled.
pub(crate) fn apply_tag(message_type: MessageType, value: Value, flags: BitFlags<EncodeFlag>) -> Value {
    if flags.contains(EncodeFlag::OmitTag) {
        value
    } else {
        Value::Tag(message_type.tag(), Box::new(value))
    }
}

/// Determines the type of a message and strips its tag.
///
/// `allowed` lists the message types the caller can process, `pinned` is the type the caller
/// expects (if known in advance).
///
/// # Errors
///
/// - [`CoseCipherError::TagProhibited`] if a tag is present although
///   [`DecodeFlag::TagProhibited`] is set.
/// - [`CoseCipherError::UnexpectedTag`] if the tag is unknown or does not match `pinned`.
/// - [`CoseCipherError::MissingTag`] if no tag is present although [`DecodeFlag::TagRequired`]
///   is set or no message type was pinned.
/// - [`CoseCipherError::UnexpectedMessageType`] if the message type is not in `allowed`.
pub fn resolve_message_type<BE: Display>(
    value: Value,
    allowed: &[MessageType],
    pinned: Option<MessageType>,
    flags: BitFlags<DecodeFlag>,
) -> Result<(MessageType, Value), CoseCipherError<BE>> {
    let (message_type, inner) = match value {
        Value::Tag(tag, _) if flags.contains(DecodeFlag::TagProhibited) => {
            return Err(CoseCipherError::TagProhibited(tag));
        }
        Value::Tag(tag, inner) => {
            let message_type =
                MessageType::from_tag(tag).ok_or(CoseCipherError::UnexpectedTag(tag))?;
            if pinned.is_some_and(|p| p != message_type) {
                return Err(CoseCipherError::UnexpectedTag(tag));
            }
            (message_type, *inner)
        }
        untagged => match pinned {
            Some(_) if flags.contains(DecodeFlag::TagRequired) => {
                return Err(CoseCipherError::MissingTag);
            }
            Some(p) => (p, untagged),
            None => return Err(CoseCipherError::MissingTag),
        },
    };
    if !allowed.contains(&message_type) {
        return Err(CoseCipherError::UnexpectedMessageType(message_type));
    }
    #[cfg(feature = "tracing")]
    tracing::trace!(%message_type, "resolved message type");
    Ok((message_type, inner))
}
