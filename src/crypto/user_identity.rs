// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Builds the user identity token sent in `ActivateSession` - selecting the endpoint's token
//! policy, resolving the effective security policy, and encrypting or signing the identity
//! material accordingly.

use crate::comms::buffer::buffer_pool;
use crate::crypto::{
    create_signature_data, KeySize, PrivateKey, SecurityPolicy, X509,
};
use crate::types::{
    AnonymousIdentityToken, ByteString, IssuedIdentityToken, SignatureData, StatusCode, UAString,
    UserIdentityToken, UserNameIdentityToken, UserTokenPolicy, UserTokenType,
    X509IdentityToken,
};

/// The client's identity material, one variant per supported token type. A closed sum so the
/// builder's case analysis below is exhaustive at compile time.
#[derive(Debug)]
pub enum UserIdentity {
    Anonymous,
    UserName {
        user: String,
        password: String,
    },
    X509 {
        certificate: X509,
        private_key: PrivateKey,
    },
    Issued {
        token_data: ByteString,
    },
}

impl UserIdentity {
    pub fn token_type(&self) -> UserTokenType {
        match self {
            UserIdentity::Anonymous => UserTokenType::Anonymous,
            UserIdentity::UserName { .. } => UserTokenType::UserName,
            UserIdentity::X509 { .. } => UserTokenType::Certificate,
            UserIdentity::Issued { .. } => UserTokenType::IssuedToken,
        }
    }
}

/// Builds the identity token and its proof-of-possession signature for `ActivateSession`.
///
/// The endpoint's token policies are scanned in advertised order for the first whose token type
/// matches the identity; no match is `BadIdentityTokenRejected`. The token is then protected
/// under the policy's own security policy uri, or the channel's when the policy leaves it empty
/// (OPC UA Part 4 Table 187).
pub fn make_identity_token(
    identity: &UserIdentity,
    user_token_policies: &[UserTokenPolicy],
    channel_security_policy: SecurityPolicy,
    server_certificate: Option<&X509>,
    server_nonce: &[u8],
) -> Result<(UserIdentityToken, SignatureData), StatusCode> {
    let token_policy = user_token_policies
        .iter()
        .find(|t| t.token_type == identity.token_type())
        .ok_or_else(|| {
            error!(
                "Endpoint has no user token policy for token type {:?}",
                identity.token_type()
            );
            StatusCode::BadIdentityTokenRejected
        })?;

    let security_policy = effective_security_policy(token_policy, channel_security_policy);

    match identity {
        UserIdentity::Anonymous => {
            let token = AnonymousIdentityToken {
                policy_id: token_policy.policy_id.clone(),
            };
            Ok((UserIdentityToken::Anonymous(token), SignatureData::null()))
        }
        UserIdentity::UserName { user, password } => {
            let (password, encryption_algorithm) = match security_policy {
                SecurityPolicy::None => {
                    if channel_security_policy == SecurityPolicy::None {
                        warn!("A user identity's password is being sent over the network in plain text. This could be a serious security issue");
                    }
                    (ByteString::from(password.as_bytes()), UAString::null())
                }
                security_policy => encrypt_token_secret(
                    password.as_bytes(),
                    server_nonce,
                    server_certificate,
                    security_policy,
                )?,
            };
            let token = UserNameIdentityToken {
                policy_id: token_policy.policy_id.clone(),
                user_name: UAString::from(user),
                password,
                encryption_algorithm,
            };
            Ok((UserIdentityToken::UserName(token), SignatureData::null()))
        }
        UserIdentity::X509 {
            certificate,
            private_key,
        } => {
            // Proof of possession - sign serverCertificate || serverNonce with the user key
            // under the effective policy. Policy None produces the null signature.
            let signature = match security_policy {
                SecurityPolicy::None => SignatureData::null(),
                security_policy => {
                    let server_certificate = server_certificate.ok_or_else(|| {
                        error!("Cannot sign the user token, there is no server certificate");
                        StatusCode::BadIdentityTokenRejected
                    })?;
                    create_signature_data(
                        private_key,
                        security_policy,
                        &server_certificate.as_byte_string(),
                        &ByteString::from(server_nonce),
                    )?
                }
            };
            let token = X509IdentityToken {
                policy_id: token_policy.policy_id.clone(),
                certificate_data: certificate.as_byte_string(),
            };
            Ok((UserIdentityToken::X509(token), signature))
        }
        UserIdentity::Issued { token_data } => {
            let (token_data, encryption_algorithm) = match security_policy {
                SecurityPolicy::None => (token_data.clone(), UAString::null()),
                security_policy => encrypt_token_secret(
                    token_data.as_ref(),
                    server_nonce,
                    server_certificate,
                    security_policy,
                )?,
            };
            let token = IssuedIdentityToken {
                policy_id: token_policy.policy_id.clone(),
                token_data,
                encryption_algorithm,
            };
            Ok((UserIdentityToken::Issued(token), SignatureData::null()))
        }
    }
}

/// The UserTokenPolicy.SecurityPolicy takes precedence over the SecureChannel.SecurityPolicy,
/// except there's a distinction between the cases when the former is null/empty and explicitly
/// set to None. In the first case the channel's policy applies, in the latter the token goes
/// unprotected. An unrecognized policy uri also falls back to None.
fn effective_security_policy(
    token_policy: &UserTokenPolicy,
    channel_security_policy: SecurityPolicy,
) -> SecurityPolicy {
    if token_policy.security_policy_uri.is_empty() {
        channel_security_policy
    } else {
        let security_policy = SecurityPolicy::from_uri(token_policy.security_policy_uri.as_ref());
        if security_policy == SecurityPolicy::Unknown {
            SecurityPolicy::None
        } else {
            security_policy
        }
    }
}

/// Encrypts an identity secret - a password or an issued token - with the server's public key
/// under the policy's encryption scheme. The plaintext is
/// `length(u32 LE) || secret || serverNonce`, where the prefix counts the secret and nonce but
/// not itself; the server uses it to find the boundary before the nonce after decrypting. The
/// plaintext is processed in RSA blocks sized to the policy's padding overhead.
fn encrypt_token_secret(
    secret: &[u8],
    server_nonce: &[u8],
    server_certificate: Option<&X509>,
    security_policy: SecurityPolicy,
) -> Result<(ByteString, UAString), StatusCode> {
    let server_certificate = server_certificate.ok_or_else(|| {
        error!("Cannot encrypt the token secret, there is no server certificate");
        StatusCode::BadIdentityTokenRejected
    })?;
    let public_key = server_certificate
        .public_key()
        .map_err(|_| StatusCode::BadIdentityTokenRejected)?;
    let padding = security_policy.asymmetric_encryption_padding();

    // Plaintext and ciphertext buffers come from the pool and go back when this function
    // returns, whichever way it returns.
    let mut plain = buffer_pool().take();
    plain.extend_from_slice(&((secret.len() + server_nonce.len()) as u32).to_le_bytes());
    plain.extend_from_slice(secret);
    plain.extend_from_slice(server_nonce);

    let mut cipher = buffer_pool().take();
    cipher.resize(public_key.calculate_cipher_text_size(plain.len(), padding), 0);
    let cipher_size = public_key
        .public_encrypt(&plain, &mut cipher, padding)
        .map_err(|_| {
            error!("Cannot encrypt the token secret with the server's public key");
            StatusCode::BadIdentityTokenRejected
        })?;

    let encryption_algorithm =
        UAString::from(security_policy.asymmetric_encryption_algorithm());
    Ok((ByteString::from(&cipher[..cipher_size]), encryption_algorithm))
}

/// Decrypts an identity secret produced by [`encrypt_token_secret`] and validates its framing -
/// the length prefix must account for the remaining plaintext and the trailing nonce must be
/// the nonce of this handshake. This is the server half of the exchange; the client carries it
/// for round-trip verification.
pub fn decrypt_token_secret(
    secret: &ByteString,
    encryption_algorithm: &UAString,
    server_nonce: &[u8],
    server_key: &PrivateKey,
) -> Result<Vec<u8>, StatusCode> {
    use crate::crypto::{algorithms, RsaPadding};

    let padding = match encryption_algorithm.as_ref() {
        algorithms::ENC_RSA_15 => RsaPadding::Pkcs1,
        algorithms::ENC_RSA_OAEP => RsaPadding::OaepSha1,
        algorithms::ENC_RSA_OAEP_SHA256 => RsaPadding::OaepSha256,
        other => {
            error!(
                "Token secret uses an unsupported encryption algorithm \"{}\"",
                other
            );
            return Err(StatusCode::BadIdentityTokenInvalid);
        }
    };

    if secret.is_null() {
        return Err(StatusCode::BadIdentityTokenInvalid);
    }
    let src = secret.as_ref();
    let mut plain = buffer_pool().take();
    plain.resize(src.len(), 0);
    let size = server_key
        .private_decrypt(src, &mut plain, padding)
        .map_err(|_| StatusCode::BadIdentityTokenInvalid)?;

    if size < 4 {
        return Err(StatusCode::BadIdentityTokenInvalid);
    }
    let length = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]) as usize;
    if length + 4 != size || length < server_nonce.len() {
        error!("Token secret length prefix does not match the decrypted plaintext");
        return Err(StatusCode::BadIdentityTokenInvalid);
    }
    let nonce_begin = size - server_nonce.len();
    if &plain[nonce_begin..size] != server_nonce {
        error!("Token secret does not contain this handshake's server nonce");
        return Err(StatusCode::BadIdentityTokenInvalid);
    }
    Ok(plain[4..nonce_begin].to_vec())
}
