// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Security policy is the asymmetric / symmetric encryption and signing algorithm bundle
//! negotiated for a secure channel. Each recognized policy URI maps to a fixed parameter set -
//! signature hash and padding, encryption padding and plaintext block overhead, nonce and
//! derived key lengths - so the signing, verifying and encrypting code is a single lookup plus
//! dispatch instead of a per-policy branch forest.

use std::fmt;
use std::str::FromStr;

use crate::crypto::{
    hash,
    pkey::{KeySize, PrivateKey, PublicKey, RsaPadding},
    random, SHA1_SIZE, SHA256_SIZE,
};
use crate::types::{ByteString, StatusCode};

pub const SECURITY_POLICY_NONE: &str = "None";
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
pub const SECURITY_POLICY_BASIC_128_RSA_15: &str = "Basic128Rsa15";
pub const SECURITY_POLICY_BASIC_128_RSA_15_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
pub const SECURITY_POLICY_BASIC_256: &str = "Basic256";
pub const SECURITY_POLICY_BASIC_256_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
pub const SECURITY_POLICY_BASIC_256_SHA_256: &str = "Basic256Sha256";
pub const SECURITY_POLICY_BASIC_256_SHA_256_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
pub const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP: &str = "Aes128-Sha256-RsaOaep";
pub const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
pub const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS: &str = "Aes256-Sha256-RsaPss";
pub const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

/// The sentinel a client passes to mean "pick whatever the server offers that fits".
pub const SECURITY_POLICY_URI_BEST_AVAILABLE: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#BestAvailable";

/// Basic128Rsa15 - RSA15 key wrap, 128-bit symmetric encryption. Deprecated by OPC UA 1.04 but
/// still widely deployed.
pub mod basic_128_rsa_15 {
    use crate::crypto::algorithms::*;

    pub const ASYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_RSA_SHA1;
    pub const ASYMMETRIC_ENCRYPTION_ALGORITHM: &str = ENC_RSA_15;
    pub const SYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_HMAC_SHA1;
    pub const KEY_DERIVATION_ALGORITHM: &str = KEY_P_SHA1;

    /// SecureChannelNonceLength in bytes
    pub const SECURE_CHANNEL_NONCE_LENGTH: usize = 16;
    /// DerivedSignatureKeyLength in bytes
    pub const DERIVED_SIGNATURE_KEY_LENGTH: usize = 16;
    /// Symmetric encryption key length in bytes
    pub const DERIVED_ENCRYPTION_KEY_LENGTH: usize = 16;
}

/// Basic256 - RSA-OAEP key wrap, 256-bit symmetric encryption. Deprecated by OPC UA 1.04.
pub mod basic_256 {
    use crate::crypto::algorithms::*;

    pub const ASYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_RSA_SHA1;
    pub const ASYMMETRIC_ENCRYPTION_ALGORITHM: &str = ENC_RSA_OAEP;
    pub const SYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_HMAC_SHA1;
    pub const KEY_DERIVATION_ALGORITHM: &str = KEY_P_SHA1;

    pub const SECURE_CHANNEL_NONCE_LENGTH: usize = 32;
    pub const DERIVED_SIGNATURE_KEY_LENGTH: usize = 24;
    pub const DERIVED_ENCRYPTION_KEY_LENGTH: usize = 32;
}

/// Basic256Sha256 - like Basic256 but with SHA256 signatures.
pub mod basic_256_sha_256 {
    use crate::crypto::algorithms::*;

    pub const ASYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_RSA_SHA256;
    pub const ASYMMETRIC_ENCRYPTION_ALGORITHM: &str = ENC_RSA_OAEP;
    pub const SYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_HMAC_SHA256;
    pub const KEY_DERIVATION_ALGORITHM: &str = KEY_P_SHA256;

    pub const SECURE_CHANNEL_NONCE_LENGTH: usize = 32;
    pub const DERIVED_SIGNATURE_KEY_LENGTH: usize = 32;
    pub const DERIVED_ENCRYPTION_KEY_LENGTH: usize = 32;
}

/// Aes128-Sha256-RsaOaep - SHA256 signatures, 128-bit symmetric encryption.
pub mod aes_128_sha_256_rsa_oaep {
    use crate::crypto::algorithms::*;

    pub const ASYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_RSA_SHA256;
    pub const ASYMMETRIC_ENCRYPTION_ALGORITHM: &str = ENC_RSA_OAEP;
    pub const SYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_HMAC_SHA256;
    pub const KEY_DERIVATION_ALGORITHM: &str = KEY_P_SHA256;

    pub const SECURE_CHANNEL_NONCE_LENGTH: usize = 32;
    pub const DERIVED_SIGNATURE_KEY_LENGTH: usize = 32;
    pub const DERIVED_ENCRYPTION_KEY_LENGTH: usize = 16;
}

/// Aes256-Sha256-RsaPss - PSS signatures, OAEP-SHA256 key wrap, 256-bit symmetric encryption.
pub mod aes_256_sha_256_rsa_pss {
    use crate::crypto::algorithms::*;

    pub const ASYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_RSA_PSS_SHA256;
    pub const ASYMMETRIC_ENCRYPTION_ALGORITHM: &str = ENC_RSA_OAEP_SHA256;
    pub const SYMMETRIC_SIGNATURE_ALGORITHM: &str = DSIG_HMAC_SHA256;
    pub const KEY_DERIVATION_ALGORITHM: &str = KEY_P_SHA256;

    pub const SECURE_CHANNEL_NONCE_LENGTH: usize = 32;
    pub const DERIVED_SIGNATURE_KEY_LENGTH: usize = 32;
    pub const DERIVED_ENCRYPTION_KEY_LENGTH: usize = 32;
}

/// SecurityPolicy implies what encryption and signing algorithms and their relevant key strengths
/// are used during an encrypted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityPolicy {
    Unknown,
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            SECURITY_POLICY_NONE | SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            SECURITY_POLICY_BASIC_128_RSA_15 | SECURITY_POLICY_BASIC_128_RSA_15_URI => {
                SecurityPolicy::Basic128Rsa15
            }
            SECURITY_POLICY_BASIC_256 | SECURITY_POLICY_BASIC_256_URI => SecurityPolicy::Basic256,
            SECURITY_POLICY_BASIC_256_SHA_256 | SECURITY_POLICY_BASIC_256_SHA_256_URI => {
                SecurityPolicy::Basic256Sha256
            }
            SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP
            | SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI => SecurityPolicy::Aes128Sha256RsaOaep,
            SECURITY_POLICY_AES_256_SHA_256_RSA_PSS
            | SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!("Specified security policy \"{}\" is not recognized", s);
                SecurityPolicy::Unknown
            }
        })
    }
}

impl From<SecurityPolicy> for String {
    fn from(v: SecurityPolicy) -> String {
        v.to_str().to_string()
    }
}

impl SecurityPolicy {
    pub fn from_uri(uri: &str) -> SecurityPolicy {
        match uri {
            SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            SECURITY_POLICY_BASIC_128_RSA_15_URI => SecurityPolicy::Basic128Rsa15,
            SECURITY_POLICY_BASIC_256_URI => SecurityPolicy::Basic256,
            SECURITY_POLICY_BASIC_256_SHA_256_URI => SecurityPolicy::Basic256Sha256,
            SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI => SecurityPolicy::Aes128Sha256RsaOaep,
            SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!("Specified security policy uri \"{}\" is not recognized", uri);
                SecurityPolicy::Unknown
            }
        }
    }

    /// Tests if the uri is one of the six recognized policy uris. The endpoint selector uses
    /// this to skip endpoints this implementation cannot talk to.
    pub fn is_recognized_uri(uri: &str) -> bool {
        !matches!(Self::from_uri(uri), SecurityPolicy::Unknown)
    }

    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => SECURITY_POLICY_NONE_URI,
            SecurityPolicy::Basic128Rsa15 => SECURITY_POLICY_BASIC_128_RSA_15_URI,
            SecurityPolicy::Basic256 => SECURITY_POLICY_BASIC_256_URI,
            SecurityPolicy::Basic256Sha256 => SECURITY_POLICY_BASIC_256_SHA_256_URI,
            SecurityPolicy::Aes128Sha256RsaOaep => SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI,
            SecurityPolicy::Aes256Sha256RsaPss => SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI,
            SecurityPolicy::Unknown => {
                panic!("Shouldn't be turning an unknown policy into a uri");
            }
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            SecurityPolicy::None => SECURITY_POLICY_NONE,
            SecurityPolicy::Basic128Rsa15 => SECURITY_POLICY_BASIC_128_RSA_15,
            SecurityPolicy::Basic256 => SECURITY_POLICY_BASIC_256,
            SecurityPolicy::Basic256Sha256 => SECURITY_POLICY_BASIC_256_SHA_256,
            SecurityPolicy::Aes128Sha256RsaOaep => SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP,
            SecurityPolicy::Aes256Sha256RsaPss => SECURITY_POLICY_AES_256_SHA_256_RSA_PSS,
            SecurityPolicy::Unknown => {
                panic!("Shouldn't be turning an unknown policy into a string");
            }
        }
    }

    pub fn asymmetric_signature_algorithm(&self) -> &'static str {
        match self {
            SecurityPolicy::Basic128Rsa15 => basic_128_rsa_15::ASYMMETRIC_SIGNATURE_ALGORITHM,
            SecurityPolicy::Basic256 => basic_256::ASYMMETRIC_SIGNATURE_ALGORITHM,
            SecurityPolicy::Basic256Sha256 => basic_256_sha_256::ASYMMETRIC_SIGNATURE_ALGORITHM,
            SecurityPolicy::Aes128Sha256RsaOaep => {
                aes_128_sha_256_rsa_oaep::ASYMMETRIC_SIGNATURE_ALGORITHM
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                aes_256_sha_256_rsa_pss::ASYMMETRIC_SIGNATURE_ALGORITHM
            }
            _ => {
                panic!("Invalid policy");
            }
        }
    }

    pub fn asymmetric_encryption_algorithm(&self) -> &'static str {
        match self {
            SecurityPolicy::Basic128Rsa15 => basic_128_rsa_15::ASYMMETRIC_ENCRYPTION_ALGORITHM,
            SecurityPolicy::Basic256 => basic_256::ASYMMETRIC_ENCRYPTION_ALGORITHM,
            SecurityPolicy::Basic256Sha256 => basic_256_sha_256::ASYMMETRIC_ENCRYPTION_ALGORITHM,
            SecurityPolicy::Aes128Sha256RsaOaep => {
                aes_128_sha_256_rsa_oaep::ASYMMETRIC_ENCRYPTION_ALGORITHM
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                aes_256_sha_256_rsa_pss::ASYMMETRIC_ENCRYPTION_ALGORITHM
            }
            _ => {
                panic!("Invalid policy");
            }
        }
    }

    /// The RSA padding the policy uses for asymmetric encryption. This is what decides the
    /// plaintext block overhead - 11 for PKCS#1 v1.5, 42 for OAEP-SHA1, 66 for OAEP-SHA256.
    pub fn asymmetric_encryption_padding(&self) -> RsaPadding {
        match self {
            SecurityPolicy::Basic128Rsa15 => RsaPadding::Pkcs1,
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep => RsaPadding::OaepSha1,
            SecurityPolicy::Aes256Sha256RsaPss => RsaPadding::OaepSha256,
            _ => {
                panic!("Invalid policy");
            }
        }
    }

    /// Length in bytes of the nonce exchanged in `OpenSecureChannel`.
    pub fn secure_channel_nonce_length(&self) -> usize {
        match self {
            SecurityPolicy::None => 0,
            SecurityPolicy::Basic128Rsa15 => basic_128_rsa_15::SECURE_CHANNEL_NONCE_LENGTH,
            SecurityPolicy::Basic256 => basic_256::SECURE_CHANNEL_NONCE_LENGTH,
            SecurityPolicy::Basic256Sha256 => basic_256_sha_256::SECURE_CHANNEL_NONCE_LENGTH,
            SecurityPolicy::Aes128Sha256RsaOaep => {
                aes_128_sha_256_rsa_oaep::SECURE_CHANNEL_NONCE_LENGTH
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                aes_256_sha_256_rsa_pss::SECURE_CHANNEL_NONCE_LENGTH
            }
            _ => {
                panic!("Cannot make a nonce because the policy is unknown");
            }
        }
    }

    /// Creates a random nonce in a byte string with a length appropriate for the policy.
    pub fn random_nonce(&self) -> ByteString {
        match self {
            SecurityPolicy::None => ByteString::null(),
            _ => random::byte_string(self.secure_channel_nonce_length()),
        }
    }

    /// Size in bytes of the symmetric signature produced under this policy.
    pub fn symmetric_signature_size(&self) -> usize {
        match self {
            SecurityPolicy::None => 0,
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => SHA1_SIZE,
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => SHA256_SIZE,
            _ => {
                panic!("Invalid policy");
            }
        }
    }

    fn derived_signature_key_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 => basic_128_rsa_15::DERIVED_SIGNATURE_KEY_LENGTH,
            SecurityPolicy::Basic256 => basic_256::DERIVED_SIGNATURE_KEY_LENGTH,
            SecurityPolicy::Basic256Sha256 => basic_256_sha_256::DERIVED_SIGNATURE_KEY_LENGTH,
            SecurityPolicy::Aes128Sha256RsaOaep => {
                aes_128_sha_256_rsa_oaep::DERIVED_SIGNATURE_KEY_LENGTH
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                aes_256_sha_256_rsa_pss::DERIVED_SIGNATURE_KEY_LENGTH
            }
            _ => {
                panic!("Invalid policy");
            }
        }
    }

    fn derived_encryption_key_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 => basic_128_rsa_15::DERIVED_ENCRYPTION_KEY_LENGTH,
            SecurityPolicy::Basic256 => basic_256::DERIVED_ENCRYPTION_KEY_LENGTH,
            SecurityPolicy::Basic256Sha256 => basic_256_sha_256::DERIVED_ENCRYPTION_KEY_LENGTH,
            SecurityPolicy::Aes128Sha256RsaOaep => {
                aes_128_sha_256_rsa_oaep::DERIVED_ENCRYPTION_KEY_LENGTH
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                aes_256_sha_256_rsa_pss::DERIVED_ENCRYPTION_KEY_LENGTH
            }
            _ => {
                panic!("Invalid policy");
            }
        }
    }

    /// Signs the data under the policy's asymmetric signature scheme and returns the signature,
    /// which is always the byte size of the signing key's modulus.
    pub fn asymmetric_sign(
        &self,
        signing_key: &PrivateKey,
        data: &[u8],
    ) -> Result<Vec<u8>, StatusCode> {
        let mut signature = vec![0u8; signing_key.size()];
        let size = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                signing_key.sign_sha1(data, &mut signature)?
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                signing_key.sign_sha256(data, &mut signature)?
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                signing_key.sign_sha256_pss(data, &mut signature)?
            }
            _ => {
                panic!("Invalid policy");
            }
        };
        signature.truncate(size);
        Ok(signature)
    }

    /// Verifies a signature over the data against the policy's asymmetric signature scheme.
    /// Returns `Ok(false)` when the signature does not match; errors are reserved for malformed
    /// input.
    pub fn asymmetric_verify_signature(
        &self,
        verification_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, StatusCode> {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                verification_key.verify_sha1(data, signature)
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                verification_key.verify_sha256(data, signature)
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                verification_key.verify_sha256_pss(data, signature)
            }
            _ => {
                panic!("Invalid policy");
            }
        }
    }

    /// Encrypts the data with the remote party's public key, chunking the plaintext per the
    /// policy's padding overhead. Returns the number of bytes written to `dst`.
    pub fn asymmetric_encrypt(
        &self,
        encryption_key: &PublicKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        encryption_key
            .public_encrypt(src, dst, self.asymmetric_encryption_padding())
            .map_err(|_| StatusCode::BadSecurityChecksFailed)
    }

    /// Decrypts data with our private key that was encrypted to the policy's padding. Returns
    /// the number of plaintext bytes written to `dst`.
    pub fn asymmetric_decrypt(
        &self,
        decryption_key: &PrivateKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        decryption_key
            .private_decrypt(src, dst, self.asymmetric_encryption_padding())
            .map_err(|_| {
                error!("Asymmetric decryption failed");
                StatusCode::BadSecurityChecksFailed
            })
    }

    /// Pseudo random function used as the key derivation algorithm - P_SHA1 or P_SHA256
    /// depending on the policy.
    fn prf(&self, secret: &[u8], seed: &[u8], length: usize, offset: usize) -> Vec<u8> {
        let result = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                hash::p_sha1(secret, seed, offset + length)
            }
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => hash::p_sha256(secret, seed, offset + length),
            _ => {
                panic!("Invalid policy");
            }
        };
        result[offset..(offset + length)].to_vec()
    }

    /// Once the secure channel is established, messages are signed and encrypted with keys
    /// derived from the nonces exchanged in the `OpenSecureChannel` call - see OPC UA Part 6
    /// 6.7.5, Table 33. The client keys come from (serverNonce, clientNonce), the server keys
    /// from (clientNonce, serverNonce). Returns (signing key, encryption key, IV).
    pub fn make_secure_channel_keys(
        &self,
        secret: &[u8],
        seed: &[u8],
    ) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let signing_key_length = self.derived_signature_key_size();
        let encrypting_key_length = self.derived_encryption_key_size();
        // All supported policies use a 16 byte AES block
        let encrypting_block_size = 16;

        let signing_key = self.prf(secret, seed, signing_key_length, 0);
        let encrypting_key = self.prf(secret, seed, encrypting_key_length, signing_key_length);
        let iv = self.prf(
            secret,
            seed,
            encrypting_block_size,
            signing_key_length + encrypting_key_length,
        );

        (signing_key, encrypting_key, iv)
    }
}
