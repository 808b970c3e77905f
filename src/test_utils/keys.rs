//! Key fixtures. The PEM files under `fixtures/` are throwaway 2048-bit RSA keys.

use secrecy::SecretString;

use crate::application::keys::KeyMaterial;

pub const IDENTITY_PRIVATE_PEM: &str = include_str!("../../fixtures/identity_private_test.pem");
pub const IDENTITY_PUBLIC_PEM: &str = include_str!("../../fixtures/identity_public_test.pem");
pub const OTHER_PRIVATE_PEM: &str = include_str!("../../fixtures/other_private_test.pem");
pub const OTHER_PUBLIC_PEM: &str = include_str!("../../fixtures/other_public_test.pem");

pub const TEST_REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";

pub fn test_refresh_secret() -> SecretString {
    SecretString::new(TEST_REFRESH_SECRET.into())
}

/// Full key material: identity key pair and refresh secret.
pub fn test_key_material() -> KeyMaterial {
    KeyMaterial::from_pem(
        IDENTITY_PRIVATE_PEM.as_bytes(),
        IDENTITY_PUBLIC_PEM.as_bytes(),
        &test_refresh_secret(),
    )
    .expect("test key fixtures must load")
}
