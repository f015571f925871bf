// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::crypto::{
    concat_data_and_nonce, create_signature_data, random, tests::*, verify_signature_data,
    KeySize, RsaPadding, SecurityPolicy,
};
use crate::types::ByteString;

#[test]
fn sign_verify_sha1() {
    let (_, pkey) = make_test_cert_1024();
    let data = b"the quick brown fox";
    let mut signature = vec![0u8; pkey.size()];
    let size = pkey.sign_sha1(data, &mut signature).unwrap();
    assert_eq!(size, pkey.size());

    let public_key = pkey.public_key();
    assert!(public_key.verify_sha1(data, &signature).unwrap());
    assert!(!public_key.verify_sha1(b"other data", &signature).unwrap());

    // Flip a bit in the signature
    signature[0] ^= 0x80;
    assert!(!public_key.verify_sha1(data, &signature).unwrap());
}

#[test]
fn sign_verify_sha256() {
    let (_, pkey) = make_test_cert_2048();
    let data = b"the quick brown fox";
    let mut signature = vec![0u8; pkey.size()];
    let size = pkey.sign_sha256(data, &mut signature).unwrap();
    assert_eq!(size, pkey.size());

    let public_key = pkey.public_key();
    assert!(public_key.verify_sha256(data, &signature).unwrap());
    assert!(!public_key.verify_sha1(data, &signature).unwrap());
}

#[test]
fn sign_verify_sha256_pss() {
    let (_, pkey) = make_test_cert_2048();
    let data = b"the quick brown fox";
    let mut signature = vec![0u8; pkey.size()];
    let size = pkey.sign_sha256_pss(data, &mut signature).unwrap();
    assert_eq!(size, pkey.size());

    let public_key = pkey.public_key();
    assert!(public_key.verify_sha256_pss(data, &signature).unwrap());
    // PSS and PKCS#1 v1.5 signatures are not interchangeable
    assert!(!public_key.verify_sha256(data, &signature).unwrap());
    signature[10] ^= 0x01;
    assert!(!public_key.verify_sha256_pss(data, &signature).unwrap());
}

/// Round trips a plaintext through the chunked encryption for every supported padding and a
/// spread of sizes, including exact multiples of the plaintext block size.
#[test]
fn chunked_rsa_round_trip() {
    let (_, pkey) = make_test_cert_2048();
    let public_key = pkey.public_key();

    for padding in [RsaPadding::Pkcs1, RsaPadding::OaepSha1, RsaPadding::OaepSha256] {
        let block_size = public_key.plain_text_block_size(padding);
        for size in [
            1,
            17,
            block_size - 1,
            block_size,
            block_size + 1,
            2 * block_size,
            3 * block_size + 5,
        ] {
            let plain = random::bytes(size);
            let cipher_size = public_key.calculate_cipher_text_size(size, padding);
            let mut cipher = vec![0u8; cipher_size];
            let actual = public_key.public_encrypt(&plain, &mut cipher, padding).unwrap();
            assert_eq!(actual, cipher_size, "padding {:?} size {}", padding, size);

            // An exact multiple of the block size must not produce an empty trailing block
            let expected_blocks = (size + block_size - 1) / block_size;
            assert_eq!(cipher_size, expected_blocks * public_key.cipher_text_block_size());

            let mut decrypted = vec![0u8; cipher_size];
            let decrypted_size = pkey.private_decrypt(&cipher, &mut decrypted, padding).unwrap();
            assert_eq!(&decrypted[..decrypted_size], &plain[..]);
        }
    }
}

#[test]
fn plain_text_block_overheads() {
    let (_, pkey) = make_test_cert_2048();
    let k = pkey.size();
    assert_eq!(k, 256);
    assert_eq!(pkey.plain_text_block_size(RsaPadding::Pkcs1), k - 11);
    assert_eq!(pkey.plain_text_block_size(RsaPadding::OaepSha1), k - 42);
    assert_eq!(pkey.plain_text_block_size(RsaPadding::OaepSha256), k - 66);
}

#[test]
fn signature_data_binds_cert_and_nonce() {
    let (cert, pkey) = make_test_cert_2048();
    let policy = SecurityPolicy::Basic256Sha256;

    let signed_cert = cert.as_byte_string();
    let nonce = random::nonce();
    let signature = create_signature_data(&pkey, policy, &signed_cert, &nonce).unwrap();
    assert_eq!(signature.algorithm.as_ref(), policy.asymmetric_signature_algorithm());

    // Valid over the original operands
    assert!(verify_signature_data(&signature, policy, &cert, &signed_cert, &nonce).is_ok());

    // Mutating any byte of either operand fails verification
    let mut bad_cert = signed_cert.as_ref().to_vec();
    bad_cert[10] ^= 0x01;
    assert!(verify_signature_data(
        &signature,
        policy,
        &cert,
        &ByteString::from(bad_cert),
        &nonce
    )
    .is_err());

    let mut bad_nonce = nonce.as_ref().to_vec();
    bad_nonce[0] ^= 0x01;
    assert!(verify_signature_data(
        &signature,
        policy,
        &cert,
        &signed_cert,
        &ByteString::from(bad_nonce)
    )
    .is_err());
}

#[test]
fn signature_data_none_policy_is_null() {
    let (cert, pkey) = make_test_cert_1024();
    let signature = create_signature_data(
        &pkey,
        SecurityPolicy::None,
        &cert.as_byte_string(),
        &random::nonce(),
    )
    .unwrap();
    assert!(signature.is_null());
}

#[test]
fn concat_order_matters() {
    let a = concat_data_and_nonce(b"abc", b"123");
    assert_eq!(&a, b"abc123");
    assert_ne!(a, concat_data_and_nonce(b"123", b"abc"));
}

#[test]
fn cert_application_uri_and_hostname() {
    let (cert, _) = make_test_cert_1024();
    assert_eq!(cert.application_uri().unwrap(), APPLICATION_URI);
    assert!(cert.is_hostname_valid(APPLICATION_HOSTNAME));
    assert!(cert.is_hostname_valid("FOO"));
    assert!(!cert.is_hostname_valid("elsewhere"));
}

#[test]
fn cert_der_round_trip() {
    use crate::crypto::X509;

    let (cert, _) = make_test_cert_1024();
    let der = cert.as_byte_string();
    let cert2 = X509::from_byte_string(&der).unwrap();
    assert_eq!(cert, cert2);
    assert_eq!(cert.thumbprint(), cert2.thumbprint());
    assert!(cert.is_self_signed());
}
