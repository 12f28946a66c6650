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
use aead::{Aead, AeadCore, Key, KeyInit, Nonce, Payload};
use coset::iana;
use rand::{CryptoRng, RngCore};

use crate::cose::crypto_impl::rustcrypto::{CoseRustCryptoCipherError, RustCryptoContext};
use crate::cose::{unsupported, CryptoBackend};
use crate::error::CoseCipherError;

#[cfg(feature = "rustcrypto-aes-gcm")]
type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, typenum::U12>;

impl<RNG: RngCore + CryptoRng> RustCryptoContext<RNG> {
    /// Encrypts `plaintext` using the AEAD algorithm `alg`.
    ///
    /// The lengths of `key` and `iv` must already have been checked.
    pub(super) fn encrypt_with_alg(
        alg: iana::Algorithm,
        key: &[u8],
        plaintext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        match alg {
            #[cfg(feature = "rustcrypto-aes-gcm")]
            iana::Algorithm::A128GCM => {
                Self::encrypt_aead_with::<aes_gcm::Aes128Gcm>(key, plaintext, aad, iv)
            }
            #[cfg(feature = "rustcrypto-aes-gcm")]
            iana::Algorithm::A192GCM => {
                Self::encrypt_aead_with::<Aes192Gcm>(key, plaintext, aad, iv)
            }
            #[cfg(feature = "rustcrypto-aes-gcm")]
            iana::Algorithm::A256GCM => {
                Self::encrypt_aead_with::<aes_gcm::Aes256Gcm>(key, plaintext, aad, iv)
            }
            #[cfg(feature = "rustcrypto-chacha20-poly1305")]
            iana::Algorithm::ChaCha20Poly1305 => {
                Self::encrypt_aead_with::<chacha20poly1305::ChaCha20Poly1305>(
                    key, plaintext, aad, iv,
                )
            }
            a => Err(unsupported(a)),
        }
    }

    /// Decrypts `ciphertext` using the AEAD algorithm `alg`.
    ///
    /// The lengths of `key` and `iv` must already have been checked.
    pub(super) fn decrypt_with_alg(
        alg: iana::Algorithm,
        key: &[u8],
        ciphertext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        match alg {
            #[cfg(feature = "rustcrypto-aes-gcm")]
            iana::Algorithm::A128GCM => {
                Self::decrypt_aead_with::<aes_gcm::Aes128Gcm>(key, ciphertext, aad, iv)
            }
            #[cfg(feature = "rustcrypto-aes-gcm")]
            iana::Algorithm::A192GCM => {
                Self::decrypt_aead_with::<Aes192Gcm>(key, ciphertext, aad, iv)
            }
            #[cfg(feature = "rustcrypto-aes-gcm")]
            iana::Algorithm::A256GCM => {
                Self::decrypt_aead_with::<aes_gcm::Aes256Gcm>(key, ciphertext, aad, iv)
            }
            #[cfg(feature = "rustcrypto-chacha20-poly1305")]
            iana::Algorithm::ChaCha20Poly1305 => {
                Self::decrypt_aead_with::<chacha20poly1305::ChaCha20Poly1305>(
                    key, ciphertext, aad, iv,
                )
            }
            a => Err(unsupported(a)),
        }
    }

    /// Perform an AEAD encryption operation on `plaintext` and the additional authenticated
    /// data `aad` using the given `iv` and `key`.
    fn encrypt_aead_with<AEAD: Aead + AeadCore + KeyInit>(
        key: &[u8],
        plaintext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let cipher = AEAD::new(Key::<AEAD>::from_slice(key));
        let nonce = Nonce::<AEAD>::from_slice(iv);
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        cipher
            .encrypt(nonce, payload)
            .map_err(|_e| CoseCipherError::Other(CoseRustCryptoCipherError::AeadError))
    }

    /// Perform an AEAD decryption operation on `ciphertext` and the additional authenticated
    /// data `aad` using the given `iv` and `key`.
    fn decrypt_aead_with<AEAD: Aead + AeadCore + KeyInit>(
        key: &[u8],
        ciphertext: &[u8],
        aad: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<<Self as CryptoBackend>::Error>> {
        let cipher = AEAD::new(Key::<AEAD>::from_slice(key));
        let nonce = Nonce::<AEAD>::from_slice(iv);
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        cipher
            .decrypt(nonce, payload)
            .map_err(CoseCipherError::from)
    }
}
