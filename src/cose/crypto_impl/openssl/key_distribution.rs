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
use coset::{iana, CoseKey};
use openssl::aes::{unwrap_key, wrap_key, AesKey};
use openssl::derive::Deriver;
use openssl::md::{Md, MdRef};
use openssl::pkey::{Id, PKey};
use openssl::pkey_ctx::PkeyCtx;

use crate::cose::crypto_impl::openssl::{ec, CoseOpensslCipherError, OpensslContext};
use crate::cose::recipient::{esdh_key_wrap_algorithm, key_wrap_key_size};
use crate::cose::{
    unsupported, CoseEc2Key, CoseSymmetricKey, HashAlgorithm, KeyDistributionCryptoBackend,
};
use crate::error::CoseCipherError;

type Error = CoseCipherError<CoseOpensslCipherError>;

/// Length of the integrity check value prepended by AES key wrap.
const KEY_WRAP_OVERHEAD: usize = 8;

/// Returns the key encryption key material after checking its length against `alg`.
fn key_encryption_key(alg: iana::Algorithm, key: &CoseKey) -> Result<&[u8], Error> {
    let size = key_wrap_key_size(alg).ok_or_else(|| unsupported(alg))?;
    CoseSymmetricKey::parse::<CoseOpensslCipherError>(key)?.with_length(size)
}

fn hkdf_md(hash: HashAlgorithm) -> &'static MdRef {
    match hash {
        HashAlgorithm::Sha256 => Md::sha256(),
        HashAlgorithm::Sha384 => Md::sha384(),
        HashAlgorithm::Sha512 => Md::sha512(),
    }
}

impl KeyDistributionCryptoBackend for OpensslContext {
    fn aes_key_wrap(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let key = AesKey::new_encrypt(key_encryption_key(alg, key)?)?;
        // RFC 3394 operates on 64-bit blocks, with at least two of them.
        if plaintext.len() < 16 || plaintext.len() % 8 != 0 {
            return Err(CoseCipherError::Other(CoseOpensslCipherError::Other(
                "key wrap input must be a multiple of 8 bytes and at least 16 bytes long",
            )));
        }
        let mut output = vec![0u8; plaintext.len() + KEY_WRAP_OVERHEAD];
        let output_len = wrap_key(&key, None, output.as_mut_slice(), plaintext)?;
        output.truncate(output_len);
        Ok(output)
    }

    fn aes_key_unwrap(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let key = AesKey::new_decrypt(key_encryption_key(alg, key)?)?;
        if ciphertext.len() < 24 || ciphertext.len() % 8 != 0 {
            return Err(CoseCipherError::KeyUnwrapFailure);
        }
        let mut output = vec![0u8; ciphertext.len() - KEY_WRAP_OVERHEAD];
        let output_len = unwrap_key(&key, None, output.as_mut_slice(), ciphertext)
            .map_err(|_e| CoseCipherError::KeyUnwrapFailure)?;
        output.truncate(output_len);
        Ok(output)
    }

    fn ecdh(
        &mut self,
        alg: iana::Algorithm,
        key: &CoseKey,
        peer: &CoseKey,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        esdh_key_wrap_algorithm(alg).ok_or_else(|| unsupported(alg))?;
        let key = CoseEc2Key::parse::<CoseOpensslCipherError>(key)?;
        let peer = CoseEc2Key::parse::<CoseOpensslCipherError>(peer)?;
        if peer.crv != key.crv {
            return Err(CoseCipherError::UnsupportedCurve(peer.crv.clone()));
        }
        let curve = ec::curve(ec::assigned_curve(&key)?)?;
        let private = PKey::from_ec_key(ec::private_ec_key(&key, &curve)?)?;
        let public = PKey::from_ec_key(ec::public_ec_key(&peer, &curve)?)?;
        let mut deriver = Deriver::new(&private)?;
        deriver.set_peer(&public)?;
        Ok(deriver.derive_to_vec()?)
    }

    fn hkdf(
        &mut self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CoseCipherError<Self::Error>> {
        let mut ctx = PkeyCtx::new_id(Id::HKDF)?;
        ctx.derive_init()?;
        ctx.set_hkdf_md(hkdf_md(hash))?;
        if !salt.is_empty() {
            ctx.set_hkdf_salt(salt)?;
        }
        ctx.set_hkdf_key(ikm)?;
        ctx.add_hkdf_info(info)?;
        let mut okm = vec![0u8; len];
        let written = ctx.derive(Some(&mut okm))?;
        okm.truncate(written);
        Ok(okm)
    }
}
