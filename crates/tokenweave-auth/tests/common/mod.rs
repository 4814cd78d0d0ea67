//! Shared fixtures for tokenweave-auth integration tests

#![allow(dead_code)]

use tokenweave_auth::SecretString;

pub const RSA_PKCS8: &str = include_str!("../fixtures/rsa_pkcs8.pem");
pub const RSA_PKCS1: &str = include_str!("../fixtures/rsa_pkcs1.pem");
pub const EC_P256_SEC1: &str = include_str!("../fixtures/ec_p256_sec1.pem");
pub const EC_P256_PKCS8: &str = include_str!("../fixtures/ec_p256_pkcs8.pem");
pub const EC_P384_SEC1: &str = include_str!("../fixtures/ec_p384_sec1.pem");

pub fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string())
}
