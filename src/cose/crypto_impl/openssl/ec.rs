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

//! Conversions between COSE EC2 keys and their OpenSSL representations.

use coset::{iana, CoseKey, CoseKeyBuilder};
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcPoint, EcPointRef};
use openssl::nid::Nid;
use openssl::pkey::{Private, Public};

use crate::cose::crypto_impl::openssl::CoseOpensslCipherError;
use crate::cose::{CoseEc2Key, EllipticCurve};
use crate::error::CoseCipherError;

type Error = CoseCipherError<CoseOpensslCipherError>;

/// An OpenSSL curve along with the size of its coordinates in bytes.
pub(super) struct Curve {
    pub(super) group: EcGroup,
    pub(super) size: usize,
}

impl Curve {
    /// Coordinate size in the form expected by [`BigNum::to_vec_padded`].
    // Coordinates are at most 66 bytes long.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(super) fn pad_size(&self) -> i32 {
        self.size as i32
    }

    /// Returns the uncompressed affine coordinates of `point`.
    pub(super) fn coordinates(&self, point: &EcPointRef) -> Result<(Vec<u8>, Vec<u8>), Error> {
        let mut ctx = BigNumContext::new()?;
        let mut x = BigNum::new()?;
        let mut y = BigNum::new()?;
        point.affine_coordinates(&self.group, &mut x, &mut y, &mut ctx)?;
        Ok((
            x.to_vec_padded(self.pad_size())?,
            y.to_vec_padded(self.pad_size())?,
        ))
    }
}

/// Returns the assigned curve of an EC2 key.
pub(super) fn assigned_curve(key: &CoseEc2Key<'_>) -> Result<iana::EllipticCurve, Error> {
    match &key.crv {
        EllipticCurve::Assigned(crv) => Ok(*crv),
        v => Err(CoseCipherError::UnsupportedCurve(v.clone())),
    }
}

/// Determine the OpenSSL [`EcGroup`] and coordinate size for `curve`.
pub(super) fn curve(curve: iana::EllipticCurve) -> Result<Curve, Error> {
    let (nid, size) = match curve {
        iana::EllipticCurve::P_256 => (Nid::X9_62_PRIME256V1, 32),
        iana::EllipticCurve::P_384 => (Nid::SECP384R1, 48),
        // 521 bits rounded up to full bytes.
        iana::EllipticCurve::P_521 => (Nid::SECP521R1, 66),
        v => {
            return Err(CoseCipherError::UnsupportedCurve(EllipticCurve::Assigned(
                v,
            )))
        }
    };
    Ok(Curve {
        group: EcGroup::from_curve_name(nid)?,
        size,
    })
}

/// Returns the public point of `key`, computing it from the private key if necessary.
fn public_point(
    key: &CoseEc2Key<'_>,
    curve: &Curve,
) -> Result<EcPoint, Error> {
    let mut ctx = BigNumContext::new()?;
    if let Some(sec1) = key.sec1_public_key() {
        return EcPoint::from_bytes(&curve.group, &sec1, &mut ctx).map_err(CoseCipherError::from);
    }
    let d = BigNum::from_slice(key.private::<CoseOpensslCipherError>()?)?;
    let mut point = EcPoint::new(&curve.group)?;
    point.mul_generator(&curve.group, &d, &ctx)?;
    Ok(point)
}

/// Converts a public or private [`CoseEc2Key`] to an OpenSSL public key.
pub(super) fn public_ec_key(
    key: &CoseEc2Key<'_>,
    curve: &Curve,
) -> Result<EcKey<Public>, Error> {
    let point = public_point(key, curve)?;
    EcKey::from_public_key(&curve.group, &point).map_err(CoseCipherError::from)
}

/// Converts a private [`CoseEc2Key`] to an OpenSSL private key.
pub(super) fn private_ec_key(
    key: &CoseEc2Key<'_>,
    curve: &Curve,
) -> Result<EcKey<Private>, Error> {
    let d = BigNum::from_slice(key.private::<CoseOpensslCipherError>()?)?;
    let point = public_point(key, curve)?;
    let private = EcKey::from_private_components(&curve.group, &d, &point)?;
    private.check_key()?;
    Ok(private)
}

/// Returns a COSE key containing only the public part of `key`.
pub(super) fn public_cose_key(
    key: &CoseEc2Key<'_>,
    crv: iana::EllipticCurve,
) -> Result<CoseKey, Error> {
    let curve = curve(crv)?;
    let (x, y) = curve.coordinates(&public_point(key, &curve)?)?;
    Ok(CoseKeyBuilder::new_ec2_pub_key(crv, x, y).build())
}

/// Generates a new key pair on `crv`.
pub(super) fn generate_key(crv: iana::EllipticCurve) -> Result<CoseKey, Error> {
    let curve = curve(crv)?;
    let key = EcKey::generate(&curve.group)?;
    let (x, y) = curve.coordinates(key.public_key())?;
    let d = key.private_key().to_vec_padded(curve.pad_size())?;
    Ok(CoseKeyBuilder::new_ec2_priv_key(crv, x, y, d).build())
}
