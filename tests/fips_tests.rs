//! FIPS validator boundary tests
//!
//! Fixtures under `tests/fixtures/` were generated with openssl and cover
//! both sides of every boundary: key sizes, curves, signature algorithms,
//! key types, and encrypted PKCS#8 handling.

use trust_stack_operator::pki::{FipsError, FipsMode};

const RSA_2048: &[u8] = include_bytes!("fixtures/rsa2048.pem");
const RSA_1024: &[u8] = include_bytes!("fixtures/rsa1024.pem");
const RSA_2048_PUB: &[u8] = include_bytes!("fixtures/rsa2048_pub.pem");
const RSA_1024_PUB: &[u8] = include_bytes!("fixtures/rsa1024_pub.pem");
const EC_P256: &[u8] = include_bytes!("fixtures/ec_p256.pem");
const EC_P384: &[u8] = include_bytes!("fixtures/ec_p384.pem");
const EC_P521: &[u8] = include_bytes!("fixtures/ec_p521.pem");
const EC_P224: &[u8] = include_bytes!("fixtures/ec_p224.pem");
const EC_P256_PUB: &[u8] = include_bytes!("fixtures/ec_p256_pub.pem");
const EC_P224_PUB: &[u8] = include_bytes!("fixtures/ec_p224_pub.pem");
const EC_P384_ENCRYPTED: &[u8] = include_bytes!("fixtures/ec_p384_encrypted.pem");
const ED25519: &[u8] = include_bytes!("fixtures/ed25519.pem");
const CERT_ECDSA_SHA384: &[u8] = include_bytes!("fixtures/cert_ecdsa_sha384.pem");
const CERT_RSA_SHA256: &[u8] = include_bytes!("fixtures/cert_rsa_sha256.pem");
const CERT_RSA_SHA224: &[u8] = include_bytes!("fixtures/cert_rsa_sha224.pem");
const CERT_EC_P224: &[u8] = include_bytes!("fixtures/cert_ec_p224.pem");
const CERT_RSA_1024: &[u8] = include_bytes!("fixtures/cert_rsa_1024.pem");

const ENCRYPTION_PASSWORD: &[u8] = b"fixture-password";

fn fips_on() -> FipsMode {
    FipsMode::new(true)
}

fn fips_off() -> FipsMode {
    FipsMode::new(false)
}

#[test]
fn test_compliant_private_keys_pass() {
    let fips = fips_on();
    fips.validate_private_key_pem(RSA_2048, None).unwrap();
    fips.validate_private_key_pem(EC_P256, None).unwrap();
    fips.validate_private_key_pem(EC_P384, None).unwrap();
    fips.validate_private_key_pem(EC_P521, None).unwrap();
}

#[test]
fn test_small_rsa_key_is_rejected_with_size() {
    let err = fips_on().validate_private_key_pem(RSA_1024, None).unwrap_err();
    assert!(matches!(err, FipsError::KeyTooSmall(1024)));
}

#[test]
fn test_p224_curve_is_rejected_by_name() {
    let err = fips_on().validate_private_key_pem(EC_P224, None).unwrap_err();
    match err {
        FipsError::NonCompliantCurve(curve) => assert_eq!(curve, "P-224"),
        other => panic!("expected NonCompliantCurve, got {other:?}"),
    }
}

#[test]
fn test_ed25519_is_an_unsupported_key_type() {
    let err = fips_on().validate_private_key_pem(ED25519, None).unwrap_err();
    assert!(matches!(err, FipsError::UnsupportedKeyType(kind) if kind == "Ed25519"));
}

#[test]
fn test_encrypted_key_requires_password() {
    let err = fips_on()
        .validate_private_key_pem(EC_P384_ENCRYPTED, None)
        .unwrap_err();
    assert!(matches!(err, FipsError::PasswordRequired));
}

#[test]
fn test_encrypted_key_wrong_password_fails_distinctly() {
    let err = fips_on()
        .validate_private_key_pem(EC_P384_ENCRYPTED, Some(b"nope"))
        .unwrap_err();
    assert!(matches!(err, FipsError::DecryptFailed));
}

#[test]
fn test_encrypted_key_decrypts_and_validates() {
    fips_on()
        .validate_private_key_pem(EC_P384_ENCRYPTED, Some(ENCRYPTION_PASSWORD))
        .unwrap();
}

#[test]
fn test_public_key_boundaries() {
    let fips = fips_on();
    fips.validate_public_key_pem(RSA_2048_PUB).unwrap();
    fips.validate_public_key_pem(EC_P256_PUB).unwrap();

    let err = fips.validate_public_key_pem(RSA_1024_PUB).unwrap_err();
    assert!(matches!(err, FipsError::KeyTooSmall(1024)));

    let err = fips.validate_public_key_pem(EC_P224_PUB).unwrap_err();
    assert!(matches!(err, FipsError::NonCompliantCurve(curve) if curve == "P-224"));
}

#[test]
fn test_approved_certificate_signatures_pass() {
    let fips = fips_on();
    fips.validate_certificate_pem(CERT_ECDSA_SHA384).unwrap();
    fips.validate_certificate_pem(CERT_RSA_SHA256).unwrap();
}

#[test]
fn test_sha224_signature_is_disallowed() {
    let err = fips_on()
        .validate_certificate_pem(CERT_RSA_SHA224)
        .unwrap_err();
    assert!(matches!(err, FipsError::DisallowedSignatureAlgorithm(_)));
}

#[test]
fn test_certificate_with_p224_subject_key_is_rejected() {
    // The signature algorithm (ecdsa-with-SHA256) is approved; the subject
    // public key's curve is not.
    let err = fips_on().validate_certificate_pem(CERT_EC_P224).unwrap_err();
    assert!(matches!(err, FipsError::NonCompliantCurve(curve) if curve == "P-224"));
}

#[test]
fn test_certificate_with_small_rsa_key_is_rejected() {
    let err = fips_on()
        .validate_certificate_pem(CERT_RSA_1024)
        .unwrap_err();
    assert!(matches!(err, FipsError::KeyTooSmall(1024)));
}

#[test]
fn test_everything_passes_when_compliance_is_off() {
    let fips = fips_off();
    fips.validate_private_key_pem(RSA_1024, None).unwrap();
    fips.validate_private_key_pem(EC_P224, None).unwrap();
    fips.validate_private_key_pem(ED25519, None).unwrap();
    fips.validate_private_key_pem(EC_P384_ENCRYPTED, None).unwrap();
    fips.validate_public_key_pem(RSA_1024_PUB).unwrap();
    fips.validate_certificate_pem(CERT_RSA_SHA224).unwrap();
    fips.validate_certificate_pem(CERT_RSA_1024).unwrap();
}
