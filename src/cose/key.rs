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

//! Checked access to the key material of [`CoseKey`]s.
//!
//! Backends keep keys as plain [`CoseKey`]s and parse them into one of the views below right
//! before an operation. Parsing checks the key type, the curve (RFC 9053, Section 7) and the
//! presence and CBOR types of the parameters, so backends only deal with raw byte strings.

use core::fmt::Display;

use ciborium::Value;
use coset::iana::EnumI64;
use coset::{iana, AsCborValue, CoseKey, KeyType, Label, RegisteredLabelWithPrivate};

use crate::error::CoseCipherError;

/// Elliptic curve identifier as used in COSE keys.
pub type EllipticCurve = RegisteredLabelWithPrivate<iana::EllipticCurve>;

/// A key type specific parameter, as reported in key errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyParam {
    /// Parameter of EC2 keys.
    Ec2(iana::Ec2KeyParameter),
    /// Parameter of OKP keys.
    Okp(iana::OkpKeyParameter),
    /// Parameter of symmetric keys.
    Symmetric(iana::SymmetricKeyParameter),
}

impl KeyParam {
    fn label(self) -> i64 {
        match self {
            KeyParam::Ec2(p) => p.to_i64(),
            KeyParam::Okp(p) => p.to_i64(),
            KeyParam::Symmetric(p) => p.to_i64(),
        }
    }
}

impl From<iana::Ec2KeyParameter> for KeyParam {
    fn from(value: iana::Ec2KeyParameter) -> Self {
        KeyParam::Ec2(value)
    }
}

impl From<iana::OkpKeyParameter> for KeyParam {
    fn from(value: iana::OkpKeyParameter) -> Self {
        KeyParam::Okp(value)
    }
}

impl From<iana::SymmetricKeyParameter> for KeyParam {
    fn from(value: iana::SymmetricKeyParameter) -> Self {
        KeyParam::Symmetric(value)
    }
}

/// Size of a single coordinate (and of the private scalar) for the given EC2 curve.
#[must_use]
pub fn ec2_coordinate_size(curve: iana::EllipticCurve) -> Option<usize> {
    match curve {
        iana::EllipticCurve::P_256 | iana::EllipticCurve::Secp256k1 => Some(32),
        iana::EllipticCurve::P_384 => Some(48),
        iana::EllipticCurve::P_521 => Some(66),
        _ => None,
    }
}

/// Parameter lookup on a key whose type was already checked.
struct KeyReader<'a>(&'a CoseKey);

impl<'a> KeyReader<'a> {
    fn expect_type<OE: Display>(
        key: &'a CoseKey,
        kty: iana::KeyType,
    ) -> Result<Self, CoseCipherError<OE>> {
        if key.kty == KeyType::Assigned(kty) {
            Ok(KeyReader(key))
        } else {
            Err(CoseCipherError::UnsupportedKeyType(key.kty.clone()))
        }
    }

    fn value(&self, param: KeyParam) -> Option<&'a Value> {
        let label = Label::Int(param.label());
        self.0
            .params
            .iter()
            .find_map(|(l, v)| (*l == label).then_some(v))
    }

    fn bytes<OE: Display>(
        &self,
        param: KeyParam,
    ) -> Result<Option<&'a [u8]>, CoseCipherError<OE>> {
        match self.value(param) {
            None => Ok(None),
            Some(Value::Bytes(b)) => Ok(Some(b.as_slice())),
            Some(v) => Err(CoseCipherError::InvalidKeyParam(param, v.clone())),
        }
    }

    fn curve<OE: Display>(&self, param: KeyParam) -> Result<EllipticCurve, CoseCipherError<OE>> {
        let Some(value) = self.value(param) else {
            return Err(CoseCipherError::MissingKeyParam(param));
        };
        EllipticCurve::from_cbor_value(value.clone())
            .map_err(|_e| CoseCipherError::InvalidKeyParam(param, value.clone()))
    }
}

/// Checks that `key` is a well-formed EC2, OKP or symmetric key.
///
/// # Errors
///
/// If the key type is not supported or the key is malformed.
pub fn check_key<OE: Display>(key: &CoseKey) -> Result<(), CoseCipherError<OE>> {
    match &key.kty {
        KeyType::Assigned(iana::KeyType::EC2) => CoseEc2Key::parse(key).map(|_| ()),
        KeyType::Assigned(iana::KeyType::OKP) => CoseOkpKey::parse(key).map(|_| ()),
        KeyType::Assigned(iana::KeyType::Symmetric) => CoseSymmetricKey::parse(key).map(|_| ()),
        kty => Err(CoseCipherError::UnsupportedKeyType(kty.clone())),
    }
}

/// An EC2 key (RFC 9053, Section 7.1.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseEc2Key<'a> {
    /// Curve of the key.
    pub crv: EllipticCurve,
    /// Private scalar.
    pub d: Option<&'a [u8]>,
    /// X coordinate of the public key.
    pub x: Option<&'a [u8]>,
    /// Y coordinate of the public key.
    pub y: Option<&'a [u8]>,
    /// Sign bit of the y coordinate, for compressed public keys.
    pub sign: Option<bool>,
}

impl<'a> CoseEc2Key<'a> {
    /// Parses `key` as an EC2 key.
    ///
    /// Keys on private use curves are accepted and left to the backend.
    ///
    /// # Errors
    ///
    /// - [`CoseCipherError::UnsupportedKeyType`] if `key` is not an EC2 key.
    /// - [`CoseCipherError::KeyTypeCurveMismatch`] if the curve is not an EC2 curve.
    /// - [`CoseCipherError::MissingKeyParam`] if neither a private key nor a complete public
    ///   key is present.
    /// - [`CoseCipherError::InvalidKeyParam`] if a parameter has the wrong type.
    pub fn parse<OE: Display>(key: &'a CoseKey) -> Result<Self, CoseCipherError<OE>> {
        let reader = KeyReader::expect_type::<OE>(key, iana::KeyType::EC2)?;
        let crv = reader.curve::<OE>(iana::Ec2KeyParameter::Crv.into())?;
        if let EllipticCurve::Assigned(assigned) = crv {
            if ec2_coordinate_size(assigned).is_none() {
                return Err(CoseCipherError::KeyTypeCurveMismatch(
                    KeyType::Assigned(iana::KeyType::EC2),
                    crv,
                ));
            }
        }
        let d = reader.bytes::<OE>(iana::Ec2KeyParameter::D.into())?;
        let x = reader.bytes::<OE>(iana::Ec2KeyParameter::X.into())?;
        let (y, sign) = match reader.value(iana::Ec2KeyParameter::Y.into()) {
            None => (None, None),
            Some(Value::Bytes(y)) => (Some(y.as_slice()), None),
            Some(Value::Bool(sign)) => (None, Some(*sign)),
            Some(v) => {
                return Err(CoseCipherError::InvalidKeyParam(
                    iana::Ec2KeyParameter::Y.into(),
                    v.clone(),
                ))
            }
        };
        let has_public = x.is_some() && (y.is_some() || sign.is_some());
        if d.is_none() && !has_public {
            return Err(CoseCipherError::MissingKeyParam(
                iana::Ec2KeyParameter::D.into(),
            ));
        }
        Ok(CoseEc2Key {
            crv,
            d,
            x,
            y,
            sign,
        })
    }

    /// Returns the private scalar.
    ///
    /// # Errors
    ///
    /// If this is a public key.
    pub fn private<OE: Display>(&self) -> Result<&'a [u8], CoseCipherError<OE>> {
        self.d.ok_or(CoseCipherError::MissingKeyParam(
            iana::Ec2KeyParameter::D.into(),
        ))
    }

    /// Returns the SEC1 encoding (compressed or uncompressed) of the public key, if present.
    #[must_use]
    pub fn sec1_public_key(&self) -> Option<Vec<u8>> {
        let x = self.x?;
        let (prefix, y): (u8, &[u8]) = match (self.y, self.sign) {
            (Some(y), _) => (0x04, y),
            (None, Some(true)) => (0x03, &[]),
            (None, Some(false)) => (0x02, &[]),
            (None, None) => return None,
        };
        let mut encoded = Vec::with_capacity(1 + x.len() + y.len());
        encoded.push(prefix);
        encoded.extend_from_slice(x);
        encoded.extend_from_slice(y);
        Some(encoded)
    }
}

/// An octet key pair (RFC 9053, Section 7.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseOkpKey<'a> {
    /// Curve of the key.
    pub crv: EllipticCurve,
    /// Private key.
    pub d: Option<&'a [u8]>,
    /// Public key.
    pub x: Option<&'a [u8]>,
}

impl<'a> CoseOkpKey<'a> {
    /// Parses `key` as an octet key pair.
    ///
    /// # Errors
    ///
    /// - [`CoseCipherError::UnsupportedKeyType`] if `key` is not an OKP key.
    /// - [`CoseCipherError::UnsupportedCurve`] if the curve is not an OKP curve.
    /// - [`CoseCipherError::MissingKeyParam`] if neither the private nor the public key is
    ///   present.
    /// - [`CoseCipherError::InvalidKeyParam`] if a parameter has the wrong type.
    pub fn parse<OE: Display>(key: &'a CoseKey) -> Result<Self, CoseCipherError<OE>> {
        let reader = KeyReader::expect_type::<OE>(key, iana::KeyType::OKP)?;
        let crv = reader.curve::<OE>(iana::OkpKeyParameter::Crv.into())?;
        if !matches!(
            crv,
            EllipticCurve::Assigned(
                iana::EllipticCurve::Ed25519
                    | iana::EllipticCurve::Ed448
                    | iana::EllipticCurve::X25519
                    | iana::EllipticCurve::X448
            )
        ) {
            return Err(CoseCipherError::UnsupportedCurve(crv));
        }
        let d = reader.bytes::<OE>(iana::OkpKeyParameter::D.into())?;
        let x = reader.bytes::<OE>(iana::OkpKeyParameter::X.into())?;
        if d.is_none() && x.is_none() {
            return Err(CoseCipherError::MissingKeyParam(
                iana::OkpKeyParameter::D.into(),
            ));
        }
        Ok(CoseOkpKey { crv, d, x })
    }
}

/// A symmetric key (RFC 9053, Section 7.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseSymmetricKey<'a> {
    /// The key material.
    pub k: &'a [u8],
}

impl<'a> CoseSymmetricKey<'a> {
    /// Parses `key` as a symmetric key.
    ///
    /// # Errors
    ///
    /// If `key` is not a symmetric key or has no usable key material.
    pub fn parse<OE: Display>(key: &'a CoseKey) -> Result<Self, CoseCipherError<OE>> {
        let reader = KeyReader::expect_type::<OE>(key, iana::KeyType::Symmetric)?;
        let param = KeyParam::from(iana::SymmetricKeyParameter::K);
        match reader.bytes::<OE>(param)? {
            Some(k) => Ok(CoseSymmetricKey { k }),
            None => Err(CoseCipherError::MissingKeyParam(param)),
        }
    }

    /// Returns the key material, which has to be exactly `len` bytes long.
    ///
    /// # Errors
    ///
    /// If the key has a different length.
    pub fn with_length<OE: Display>(&self, len: usize) -> Result<&'a [u8], CoseCipherError<OE>> {
        if self.k.len() == len {
            Ok(self.k)
        } else {
            Err(CoseCipherError::InvalidKeyParam(
                iana::SymmetricKeyParameter::K.into(),
                Value::Bytes(self.k.to_vec()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use ciborium::Value;
    use coset::iana::EnumI64;
    use coset::{iana, CoseKey, CoseKeyBuilder, KeyType, Label};
    use rstest::rstest;

    use crate::cose::test_helper::{ed25519_private_key, ed25519_public_key};
    use crate::error::CoseCipherError;

    use super::{check_key, CoseEc2Key, CoseOkpKey, CoseSymmetricKey, EllipticCurve, KeyParam};

    type Error = CoseCipherError<String>;

    fn p256_public() -> CoseKey {
        CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, vec![1; 32], vec![2; 32])
            .build()
    }

    fn set_param(key: &mut CoseKey, label: i64, value: Value) {
        key.params.retain(|(l, _)| *l != Label::Int(label));
        key.params.push((Label::Int(label), value));
    }

    #[test]
    fn ec2_public_key_encodings() {
        let key = p256_public();
        let parsed = CoseEc2Key::parse::<String>(&key).unwrap();
        assert_eq!(
            parsed.crv,
            EllipticCurve::Assigned(iana::EllipticCurve::P_256)
        );
        let sec1 = parsed.sec1_public_key().unwrap();
        assert_eq!(sec1.len(), 65);
        assert_eq!(sec1[0], 0x04);
        assert!(matches!(
            parsed.private::<String>(),
            Err(CoseCipherError::MissingKeyParam(KeyParam::Ec2(
                iana::Ec2KeyParameter::D
            )))
        ));

        let compressed =
            CoseKeyBuilder::new_ec2_pub_key_y_sign(iana::EllipticCurve::P_256, vec![1; 32], true)
                .build();
        let parsed = CoseEc2Key::parse::<String>(&compressed).unwrap();
        assert_eq!(parsed.sign, Some(true));
        assert_eq!(parsed.sec1_public_key().map(|p| (p[0], p.len())), Some((0x03, 33)));
    }

    #[test]
    fn ec2_private_key_without_public_part() {
        let mut key = p256_public();
        key.params.retain(|(l, _)| {
            *l != Label::Int(iana::Ec2KeyParameter::X.to_i64())
                && *l != Label::Int(iana::Ec2KeyParameter::Y.to_i64())
        });
        set_param(
            &mut key,
            iana::Ec2KeyParameter::D.to_i64(),
            Value::Bytes(vec![3; 32]),
        );
        let parsed = CoseEc2Key::parse::<String>(&key).unwrap();
        assert_eq!(parsed.private::<String>().unwrap(), [3; 32].as_slice());
        assert_eq!(parsed.sec1_public_key(), None);
    }

    #[rstest]
    #[case::missing_curve(|k: &mut CoseKey| k.params.retain(|(l, _)| *l != Label::Int(-1)))]
    #[case::okp_curve(|k: &mut CoseKey| set_param(k, -1, Value::from(iana::EllipticCurve::Ed25519.to_i64())))]
    #[case::text_x(|k: &mut CoseKey| set_param(k, -2, Value::Text("x".into())))]
    #[case::integer_y(|k: &mut CoseKey| set_param(k, -3, Value::from(1)))]
    #[case::no_y(|k: &mut CoseKey| k.params.retain(|(l, _)| *l != Label::Int(-3)))]
    fn ec2_rejects_malformed_keys(#[case] modify: fn(&mut CoseKey)) {
        let mut key = p256_public();
        modify(&mut key);
        let result: Result<_, Error> = CoseEc2Key::parse(&key);
        assert!(matches!(
            result,
            Err(CoseCipherError::MissingKeyParam(_)
                | CoseCipherError::KeyTypeCurveMismatch(_, _)
                | CoseCipherError::InvalidKeyParam(_, _))
        ));
        assert!(check_key::<String>(&key).is_err());
    }

    #[test]
    fn ec2_accepts_private_use_curve() {
        let mut key = p256_public();
        set_param(&mut key, -1, Value::from(-65537));
        let parsed = CoseEc2Key::parse::<String>(&key).unwrap();
        assert_eq!(parsed.crv, EllipticCurve::PrivateUse(-65537));
    }

    #[test]
    fn okp_keys() {
        let public_key = ed25519_public_key();
        let public = CoseOkpKey::parse::<String>(&public_key).unwrap();
        assert!(public.d.is_none());
        assert_eq!(public.x.map(<[u8]>::len), Some(32));
        let private_key = ed25519_private_key();
        let private = CoseOkpKey::parse::<String>(&private_key).unwrap();
        assert_eq!(private.d.map(<[u8]>::len), Some(32));

        let mut wrong_curve = ed25519_public_key();
        set_param(
            &mut wrong_curve,
            iana::OkpKeyParameter::Crv.to_i64(),
            Value::from(iana::EllipticCurve::P_256.to_i64()),
        );
        assert!(matches!(
            CoseOkpKey::parse::<String>(&wrong_curve),
            Err(CoseCipherError::UnsupportedCurve(_))
        ));

        let mut empty = ed25519_public_key();
        empty
            .params
            .retain(|(l, _)| *l != Label::Int(iana::OkpKeyParameter::X.to_i64()));
        assert!(matches!(
            CoseOkpKey::parse::<String>(&empty),
            Err(CoseCipherError::MissingKeyParam(_))
        ));
    }

    #[test]
    fn symmetric_key_length() {
        let key = CoseKeyBuilder::new_symmetric_key(vec![7; 16]).build();
        let parsed = CoseSymmetricKey::parse::<String>(&key).unwrap();
        assert_eq!(parsed.with_length::<String>(16).unwrap(), [7; 16].as_slice());
        assert!(matches!(
            parsed.with_length::<String>(32),
            Err(CoseCipherError::InvalidKeyParam(
                KeyParam::Symmetric(iana::SymmetricKeyParameter::K),
                _
            ))
        ));
        assert!(check_key::<String>(&key).is_ok());
    }

    #[test]
    fn key_type_is_checked() {
        let symmetric = CoseKeyBuilder::new_symmetric_key(vec![7; 16]).build();
        assert!(matches!(
            CoseEc2Key::parse::<String>(&symmetric),
            Err(CoseCipherError::UnsupportedKeyType(_))
        ));
        assert!(matches!(
            CoseOkpKey::parse::<String>(&p256_public()),
            Err(CoseCipherError::UnsupportedKeyType(_))
        ));
        let rsa = CoseKey {
            kty: KeyType::Assigned(iana::KeyType::RSA),
            ..CoseKey::default()
        };
        assert!(matches!(
            check_key::<String>(&rsa),
            Err(CoseCipherError::UnsupportedKeyType(_))
        ));
    }
}
