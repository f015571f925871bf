// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Crypto related functionality - establishing trust between client and server through
//! certificate exchange, signing and verifying the handshake nonces, and encrypting user
//! identity secrets.

pub mod certificate_store;
pub mod hash;
pub mod pkey;
pub mod random;
pub mod security_policy;
pub mod user_identity;
pub mod x509;

pub use self::certificate_store::*;
pub use self::pkey::*;
pub use self::security_policy::*;
pub use self::user_identity::*;
pub use self::x509::*;

use crate::types::{ByteString, SignatureData, StatusCode, UAString};

/// Size of a SHA1 hash value in bytes
pub const SHA1_SIZE: usize = 20;
/// Size of a SHA256 hash value in bytes
pub const SHA256_SIZE: usize = 32;

/// These are the algorithm identifiers that policies use. Some of the strings are passed over
/// the wire, e.g. as the encryption algorithm of an identity token, and code needs to test them
/// to see if the algorithm is supported.
pub mod algorithms {
    /// Asymmetric encryption algorithm RSA15
    pub const ENC_RSA_15: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";

    /// Asymmetric encryption algorithm RSA-OAEP
    pub const ENC_RSA_OAEP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep";

    /// Asymmetric encryption algorithm RSA-OAEP with SHA256 mask generation
    pub const ENC_RSA_OAEP_SHA256: &str = "http://opcfoundation.org/UA/security/rsa-oaep-sha2-256";

    /// SymmetricSignatureAlgorithm - HmacSha1
    pub const DSIG_HMAC_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#hmac-sha1";

    /// SymmetricSignatureAlgorithm - HmacSha256
    pub const DSIG_HMAC_SHA256: &str = "http://www.w3.org/2000/09/xmldsig#hmac-sha256";

    /// Asymmetric digital signature algorithm using RSA-SHA1
    pub const DSIG_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

    /// Asymmetric digital signature algorithm using RSA-SHA256
    pub const DSIG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    /// Asymmetric digital signature algorithm using RSA-PSS-SHA256
    pub const DSIG_RSA_PSS_SHA256: &str = "http://opcfoundation.org/UA/security/rsa-pss-sha2-256";

    /// Key derivation algorithm P_SHA1
    pub const KEY_P_SHA1: &str =
        "http://docs.oasis-open.org/ws-sx/ws-secureconversation/200512/dk/p_sha1";

    /// Key derivation algorithm P_SHA256
    pub const KEY_P_SHA256: &str =
        "http://docs.oasis-open.org/ws-sx/ws-secureconversation/200512/dk/p_sha256";
}

/// Both handshake signatures are computed over a certificate concatenated with a nonce - the
/// client signs `serverCertificate || serverNonce`, the server signs
/// `clientCertificate || clientNonce`.
pub fn concat_data_and_nonce(data: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(data.len() + nonce.len());
    buffer.extend_from_slice(data);
    buffer.extend_from_slice(nonce);
    buffer
}

/// Creates a `SignatureData` by signing the supplied certificate and nonce with the key, under
/// the hash and padding of the security policy. Policy `None` produces the null signature.
pub fn create_signature_data(
    signing_key: &PrivateKey,
    security_policy: SecurityPolicy,
    contained_cert: &ByteString,
    nonce: &ByteString,
) -> Result<SignatureData, StatusCode> {
    let signature_data = match security_policy {
        SecurityPolicy::None => SignatureData::null(),
        SecurityPolicy::Unknown => {
            error!("An unknown security policy was passed to create_signature_data and rejected");
            return Err(StatusCode::BadSecurityPolicyRejected);
        }
        security_policy => {
            if contained_cert.is_null() || nonce.is_null() {
                error!("Cannot create a signature, certificate or nonce is null");
                return Err(StatusCode::BadUnexpectedError);
            }
            let data = concat_data_and_nonce(contained_cert.as_ref(), nonce.as_ref());
            let signature = security_policy.asymmetric_sign(signing_key, &data)?;
            SignatureData {
                algorithm: UAString::from(security_policy.asymmetric_signature_algorithm()),
                signature: ByteString::from(&signature),
            }
        }
    };
    trace!("Created signature data {:?}", signature_data);
    Ok(signature_data)
}

/// Verifies that the signature data was produced by the owner of the signing certificate over
/// the contained certificate and nonce. Mismatches yield `BadApplicationSignatureInvalid`, which
/// is what both signature checks of the handshake report.
pub fn verify_signature_data(
    signature: &SignatureData,
    security_policy: SecurityPolicy,
    signing_cert: &X509,
    contained_cert: &ByteString,
    contained_nonce: &ByteString,
) -> Result<(), StatusCode> {
    let verification_key = signing_cert.public_key().map_err(|_| {
        error!("Signature verification failed, signing certificate has no public key");
        StatusCode::BadUnexpectedError
    })?;
    let data = concat_data_and_nonce(contained_cert.as_ref(), contained_nonce.as_ref());
    let valid = security_policy.asymmetric_verify_signature(
        &verification_key,
        &data,
        signature.signature.as_ref(),
    )?;
    if valid {
        Ok(())
    } else {
        error!("Signature verification failed, signature does not match the signed data");
        Err(StatusCode::BadApplicationSignatureInvalid)
    }
}

#[cfg(test)]
mod tests;
