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

//! Implementations of [`CryptoBackend`](crate::cose::CryptoBackend) and its extension traits
//! ([`SignCryptoBackend`](crate::cose::SignCryptoBackend),
//! [`EncryptCryptoBackend`](crate::cose::EncryptCryptoBackend),
//! [`KeyDistributionCryptoBackend`](crate::cose::KeyDistributionCryptoBackend)) for different
//! cryptographic libraries.
//!
//! Both included backends use plain [`CoseKey`](coset::CoseKey)s as key handles.

use coset::iana;

#[cfg(feature = "openssl")]
pub mod openssl;
#[cfg(rustcrypto_base)]
pub mod rustcrypto;

#[cfg(test)]
mod tests;

/// Returns the curve an ECDSA algorithm has to be used with.
#[cfg_attr(not(any(feature = "openssl", rustcrypto_base)), allow(dead_code))]
pub(crate) fn ecdsa_curve(alg: iana::Algorithm) -> Option<iana::EllipticCurve> {
    match alg {
        iana::Algorithm::ES256 => Some(iana::EllipticCurve::P_256),
        iana::Algorithm::ES384 => Some(iana::EllipticCurve::P_384),
        iana::Algorithm::ES512 => Some(iana::EllipticCurve::P_521),
        _ => None,
    }
}
