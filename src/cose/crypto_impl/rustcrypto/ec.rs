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

//! Conversions between COSE EC2 keys and their RustCrypto representations.

use coset::{iana, CoseKey, CoseKeyBuilder};
use elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::{AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey, SecretKey};
use rand::{CryptoRng, RngCore};

use super::CoseRustCryptoCipherError;
use crate::cose::CoseEc2Key;
use crate::error::CoseCipherError;

type Error = CoseCipherError<CoseRustCryptoCipherError>;

/// Converts the private component of a COSE EC2 key to its RustCrypto representation.
pub(super) fn secret_key<CRV: CurveArithmetic>(
    key: &CoseEc2Key<'_>,
) -> Result<SecretKey<CRV>, Error> {
    SecretKey::<CRV>::from_slice(key.private::<CoseRustCryptoCipherError>()?)
        .map_err(CoseCipherError::from)
}

/// Converts a public or private COSE EC2 key to its public key RustCrypto representation.
///
/// Compressed points are supported. If the key has no public component, the public key is
/// computed from the private one.
pub(super) fn public_key<CRV>(
    key: &CoseEc2Key<'_>,
) -> Result<PublicKey<CRV>, Error>
where
    CRV: CurveArithmetic,
    FieldBytesSize<CRV>: ModulusSize,
    AffinePoint<CRV>: FromEncodedPoint<CRV> + ToEncodedPoint<CRV>,
{
    match key.sec1_public_key() {
        Some(sec1) => PublicKey::<CRV>::from_sec1_bytes(&sec1)
            .map_err(|_e| CoseCipherError::Other(CoseRustCryptoCipherError::InvalidPoint)),
        None => secret_key::<CRV>(key).map(|sk| sk.public_key()),
    }
}

/// Returns the uncompressed affine coordinates of a public key.
fn coordinates<CRV>(public: &PublicKey<CRV>) -> Result<(Vec<u8>, Vec<u8>), Error>
where
    CRV: CurveArithmetic,
    FieldBytesSize<CRV>: ModulusSize,
    AffinePoint<CRV>: FromEncodedPoint<CRV> + ToEncodedPoint<CRV>,
{
    let point = public.to_encoded_point(false);
    match (point.x(), point.y()) {
        (Some(x), Some(y)) => Ok((x.to_vec(), y.to_vec())),
        _ => Err(CoseCipherError::Other(
            CoseRustCryptoCipherError::InvalidPoint,
        )),
    }
}

/// Returns a COSE key containing only the public part of `key`.
pub(super) fn public_cose_key<CRV>(
    key: &CoseEc2Key<'_>,
    curve: iana::EllipticCurve,
) -> Result<CoseKey, Error>
where
    CRV: CurveArithmetic,
    FieldBytesSize<CRV>: ModulusSize,
    AffinePoint<CRV>: FromEncodedPoint<CRV> + ToEncodedPoint<CRV>,
{
    let (x, y) = coordinates(&public_key::<CRV>(key)?)?;
    Ok(CoseKeyBuilder::new_ec2_pub_key(curve, x, y).build())
}

/// Generates a new key pair on `CRV`.
pub(super) fn generate_key<CRV, RNG>(
    rng: &mut RNG,
    curve: iana::EllipticCurve,
) -> Result<CoseKey, Error>
where
    CRV: CurveArithmetic,
    FieldBytesSize<CRV>: ModulusSize,
    AffinePoint<CRV>: FromEncodedPoint<CRV> + ToEncodedPoint<CRV>,
    RNG: RngCore + CryptoRng,
{
    let secret = SecretKey::<CRV>::random(rng);
    let (x, y) = coordinates(&secret.public_key())?;
    Ok(CoseKeyBuilder::new_ec2_priv_key(curve, x, y, secret.to_bytes().to_vec()).build())
}
