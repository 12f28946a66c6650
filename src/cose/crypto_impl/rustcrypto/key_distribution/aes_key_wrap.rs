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
use aes::cipher::{BlockCipher, BlockDecrypt, BlockEncrypt, BlockSizeUser};
use aes::{Aes128, Aes192, Aes256};
use aes_kw::Kek;
use coset::{iana, CoseKey};
use crypto_common::{Key, KeyInit};
use rand::{CryptoRng, RngCore};
use typenum::consts::U16;

use crate::cose::crypto_impl::rustcrypto::RustCryptoContext;
use crate::cose::recipient::key_wrap_key_size;
use crate::cose::{unsupported, CoseSymmetricKey, CryptoBackend};
use crate::error::CoseCipherError;

impl<RNG: RngCore + CryptoRng> RustCryptoContext<RNG> {
    /// Wrap `plaintext` with the key encryption key `key` using the AES variant `AES`.
    fn aes_key_wrap_with_alg<
        AES: KeyInit + BlockCipher + BlockSizeUser<BlockSize = U16> + BlockEncrypt + BlockDecrypt,
    >(
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let key_wrap = Kek::<AES>::new(Key::<AES>::from_slice(key));
        key_wrap
            .wrap_vec(plaintext)
            .map_err(|e| CoseCipherError::Other(e.into()))
    }

    /// Unwrap `ciphertext` with the key encryption key `key` using the AES variant `AES`.
    ///
    /// A failed integrity check is reported as [`CoseCipherError::KeyUnwrapFailure`].
    fn aes_key_unwrap_with_alg<
        AES: KeyInit + BlockCipher + BlockSizeUser<BlockSize = U16> + BlockEncrypt + BlockDecrypt,
    >(
        key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let key_wrap = Kek::<AES>::new(Key::<AES>::from_slice(key));
        key_wrap.unwrap_vec(ciphertext).map_err(|e| match e {
            aes_kw::Error::IntegrityCheckFailed => CoseCipherError::KeyUnwrapFailure,
            e => CoseCipherError::Other(e.into()),
        })
    }

    /// Returns the key encryption key material after checking its length against `alg`.
    fn key_encryption_key(
        alg: iana::Algorithm,
        key: &CoseKey,
    ) -> Result<&[u8], CoseCipherError<<Self as CryptoBackend>::Error>> {
        let size = key_wrap_key_size(alg).ok_or_else(|| unsupported(alg))?;
        CoseSymmetricKey::parse::<<Self as CryptoBackend>::Error>(key)?.with_length(size)
    }

    /// Wrap the content key `plaintext` with `key` using the AES variant of `alg`.
    pub(super) fn aes_key_wrap(
        alg: iana::Algorithm,
        key: &CoseKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let key = Self::key_encryption_key(alg, key)?;
        match alg {
            iana::Algorithm::A128KW => Self::aes_key_wrap_with_alg::<Aes128>(key, plaintext),
            iana::Algorithm::A192KW => Self::aes_key_wrap_with_alg::<Aes192>(key, plaintext),
            iana::Algorithm::A256KW => Self::aes_key_wrap_with_alg::<Aes256>(key, plaintext),
            a => Err(unsupported(a)),
        }
    }

    /// Unwrap the content key contained in `ciphertext` with `key` using the AES variant of
    /// `alg`.
    pub(super) fn aes_key_unwrap(
        alg: iana::Algorithm,
        key: &CoseKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let key = Self::key_encryption_key(alg, key)?;
        match alg {
            iana::Algorithm::A128KW => Self::aes_key_unwrap_with_alg::<Aes128>(key, ciphertext),
            iana::Algorithm::A192KW => Self::aes_key_unwrap_with_alg::<Aes192>(key, ciphertext),
            iana::Algorithm::A256KW => Self::aes_key_unwrap_with_alg::<Aes256>(key, ciphertext),
            a => Err(unsupported(a)),
        }
    }
}
