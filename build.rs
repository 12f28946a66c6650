#![recursion_limit = "512"]

use cfg_aliases::cfg_aliases;

fn main() {
    cfg_aliases! {
        rustcrypto_encrypt_base: {
            any(
                feature = "rustcrypto-aes-gcm",
                feature = "rustcrypto-chacha20-poly1305"
            )
        },
        rustcrypto_sign_base: {
            any(
                feature = "rustcrypto-ecdsa",
                feature = "rustcrypto-eddsa"
            )
        },
        rustcrypto_key_distribution_base: {
            any(
                feature = "rustcrypto-aes-kw",
                feature = "rustcrypto-ecdh"
            )
        },
        rustcrypto_ec_base: {
            any(
                feature = "rustcrypto-ecdsa",
                feature = "rustcrypto-ecdh"
            )
        },
        rustcrypto_base: {
            any(
                rustcrypto_encrypt_base,
                rustcrypto_sign_base,
                rustcrypto_key_distribution_base
            )
        },
    }
}
