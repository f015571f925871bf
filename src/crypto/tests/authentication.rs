// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::crypto::{
    self as crypto, decrypt_token_secret, make_identity_token, random, tests::*, verify_signature_data,
    SecurityPolicy, UserIdentity,
};
use crate::types::{
    ByteString, SignatureData, UAString, UserIdentityToken, UserTokenPolicy, UserTokenType,
};

fn token_policy(token_type: UserTokenType, security_policy_uri: UAString) -> UserTokenPolicy {
    UserTokenPolicy {
        policy_id: UAString::from("policy-1"),
        token_type,
        issued_token_type: UAString::null(),
        issuer_endpoint_url: UAString::null(),
        security_policy_uri,
    }
}

#[test]
fn anonymous_token() {
    let policies = vec![token_policy(UserTokenType::Anonymous, UAString::null())];
    let (token, signature) = make_identity_token(
        &UserIdentity::Anonymous,
        &policies,
        SecurityPolicy::None,
        None,
        &[],
    )
    .unwrap();
    let UserIdentityToken::Anonymous(token) = token else {
        panic!("Expected an anonymous token");
    };
    assert_eq!(token.policy_id.as_ref(), "policy-1");
    assert!(signature.is_null());
}

#[test]
fn no_matching_policy_is_rejected() {
    // The endpoint only advertises anonymous, the client brings a user name
    let policies = vec![token_policy(UserTokenType::Anonymous, UAString::null())];
    let result = make_identity_token(
        &UserIdentity::UserName {
            user: "root".to_string(),
            password: "secret".to_string(),
        },
        &policies,
        SecurityPolicy::Basic256Sha256,
        None,
        &[],
    );
    assert_eq!(
        result.unwrap_err(),
        crate::types::StatusCode::BadIdentityTokenRejected
    );
}

/// These cases correspond to rows in OPC UA Part 4 Table 187 - combinations of channel policy
/// and token policy decide between plaintext and each encryption algorithm.
#[test]
fn user_name_token_policy_resolution() {
    let password = "abcdef123456";
    let nonce = random::nonce();
    let (cert, pkey) = make_test_cert_2048();

    let channel_and_token_to_algorithm = [
        // channel policy, token policy uri, expected algorithm (None = plaintext)
        (SecurityPolicy::None, UAString::null(), None),
        (
            SecurityPolicy::None,
            UAString::from(SecurityPolicy::None.to_uri()),
            None,
        ),
        // Token policy takes precedence over the channel
        (
            SecurityPolicy::None,
            UAString::from(SecurityPolicy::Basic128Rsa15.to_uri()),
            Some(crypto::algorithms::ENC_RSA_15),
        ),
        (
            SecurityPolicy::Basic128Rsa15,
            UAString::null(),
            Some(crypto::algorithms::ENC_RSA_15),
        ),
        // An explicit None on the token policy turns protection off even on a secure channel
        (
            SecurityPolicy::Basic128Rsa15,
            UAString::from(SecurityPolicy::None.to_uri()),
            None,
        ),
        (
            SecurityPolicy::Basic256,
            UAString::null(),
            Some(crypto::algorithms::ENC_RSA_OAEP),
        ),
        (
            SecurityPolicy::Basic256Sha256,
            UAString::null(),
            Some(crypto::algorithms::ENC_RSA_OAEP),
        ),
        (
            SecurityPolicy::Aes128Sha256RsaOaep,
            UAString::null(),
            Some(crypto::algorithms::ENC_RSA_OAEP),
        ),
        (
            SecurityPolicy::Aes256Sha256RsaPss,
            UAString::null(),
            Some(crypto::algorithms::ENC_RSA_OAEP_SHA256),
        ),
    ];

    for (channel_policy, token_policy_uri, expected_algorithm) in channel_and_token_to_algorithm {
        let policies = vec![token_policy(UserTokenType::UserName, token_policy_uri.clone())];
        let (token, signature) = make_identity_token(
            &UserIdentity::UserName {
                user: "user1".to_string(),
                password: password.to_string(),
            },
            &policies,
            channel_policy,
            Some(&cert),
            nonce.as_ref(),
        )
        .unwrap();
        assert!(signature.is_null());
        let UserIdentityToken::UserName(token) = token else {
            panic!("Expected a user name token");
        };
        assert_eq!(token.user_name.as_ref(), "user1");

        match expected_algorithm {
            None => {
                assert!(
                    token.encryption_algorithm.is_empty(),
                    "{:?} / {:?}",
                    channel_policy,
                    token_policy_uri
                );
                assert_eq!(token.password.as_ref(), password.as_bytes());
            }
            Some(algorithm) => {
                assert_eq!(token.encryption_algorithm.as_ref(), algorithm);
                assert_ne!(token.password.as_ref(), password.as_bytes());
                // And the server can recover the password
                let decrypted = decrypt_token_secret(
                    &token.password,
                    &token.encryption_algorithm,
                    nonce.as_ref(),
                    &pkey,
                )
                .unwrap();
                assert_eq!(decrypted, password.as_bytes());
            }
        }
    }
}

#[test]
fn encrypted_secret_rejects_wrong_nonce() {
    let nonce = random::nonce();
    let (cert, pkey) = make_test_cert_2048();
    let policies = vec![token_policy(UserTokenType::UserName, UAString::null())];
    let (token, _) = make_identity_token(
        &UserIdentity::UserName {
            user: "user1".to_string(),
            password: "pwd".to_string(),
        },
        &policies,
        SecurityPolicy::Basic256Sha256,
        Some(&cert),
        nonce.as_ref(),
    )
    .unwrap();
    let UserIdentityToken::UserName(token) = token else {
        panic!();
    };

    let other_nonce = random::nonce();
    let result = decrypt_token_secret(
        &token.password,
        &token.encryption_algorithm,
        other_nonce.as_ref(),
        &pkey,
    );
    assert_eq!(
        result.unwrap_err(),
        crate::types::StatusCode::BadIdentityTokenInvalid
    );
}

#[test]
fn issued_token_is_encrypted_like_a_password() {
    let nonce = random::nonce();
    let (cert, pkey) = make_test_cert_2048();
    let token_data = ByteString::from(b"an opaque issued token");
    let policies = vec![token_policy(UserTokenType::IssuedToken, UAString::null())];

    let (token, signature) = make_identity_token(
        &UserIdentity::Issued {
            token_data: token_data.clone(),
        },
        &policies,
        SecurityPolicy::Aes256Sha256RsaPss,
        Some(&cert),
        nonce.as_ref(),
    )
    .unwrap();
    assert!(signature.is_null());
    let UserIdentityToken::Issued(token) = token else {
        panic!("Expected an issued token");
    };
    assert_eq!(
        token.encryption_algorithm.as_ref(),
        crypto::algorithms::ENC_RSA_OAEP_SHA256
    );
    let decrypted = decrypt_token_secret(
        &token.token_data,
        &token.encryption_algorithm,
        nonce.as_ref(),
        &pkey,
    )
    .unwrap();
    assert_eq!(decrypted, token_data.as_ref());
}

#[test]
fn x509_token_signs_server_cert_and_nonce() {
    let nonce = random::nonce();
    let (server_cert, _) = make_test_cert_2048();
    let (user_cert, user_key) = make_test_cert_2048();
    let policies = vec![token_policy(UserTokenType::Certificate, UAString::null())];

    let channel_policy = SecurityPolicy::Aes256Sha256RsaPss;
    let (token, signature) = make_identity_token(
        &UserIdentity::X509 {
            certificate: user_cert.clone(),
            private_key: user_key,
        },
        &policies,
        channel_policy,
        Some(&server_cert),
        nonce.as_ref(),
    )
    .unwrap();
    let UserIdentityToken::X509(token) = token else {
        panic!("Expected an X509 token");
    };
    assert_eq!(token.certificate_data, user_cert.as_byte_string());
    assert_eq!(
        signature.algorithm.as_ref(),
        crypto::algorithms::DSIG_RSA_PSS_SHA256
    );

    // The signature is over serverCertificate || serverNonce with the user's key
    assert!(verify_signature_data(
        &signature,
        channel_policy,
        &user_cert,
        &server_cert.as_byte_string(),
        &nonce
    )
    .is_ok());

    // A signature over different operands must not verify
    let bad: SignatureData = SignatureData {
        algorithm: signature.algorithm.clone(),
        signature: ByteString::from(random::bytes(256)),
    };
    assert!(verify_signature_data(
        &bad,
        channel_policy,
        &user_cert,
        &server_cert.as_byte_string(),
        &nonce
    )
    .is_err());
}
