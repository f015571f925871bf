// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Asymmetric encryption / decryption, signing / verification wrapper around an RSA key pair.

use std::{
    fmt::{self, Debug, Formatter},
    path::Path,
};

use rsa::{
    pkcs1, pkcs1v15, pkcs8, pss,
    signature::{RandomizedSigner, SignatureEncoding, Verifier},
    traits::PublicKeyParts,
    Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
};

use crate::types::StatusCode;

/// The RSA padding schemes used across the supported security policies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RsaPadding {
    Pkcs1,
    OaepSha1,
    OaepSha256,
}

impl RsaPadding {
    /// The number of bytes of a ciphertext block the padding consumes, i.e. how much smaller a
    /// plaintext block is than the key's modulus:
    /// PKCS#1 v1.5 - 11; OAEP - 2 * hash size + 2, so 42 for SHA1 and 66 for SHA256.
    pub fn block_overhead(&self) -> usize {
        match self {
            RsaPadding::Pkcs1 => 11,
            RsaPadding::OaepSha1 => 42,
            RsaPadding::OaepSha256 => 66,
        }
    }
}

#[derive(Debug)]
pub struct PKeyError;

impl fmt::Display for PKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PKeyError")
    }
}

impl std::error::Error for PKeyError {}

impl From<pkcs8::Error> for PKeyError {
    fn from(_: pkcs8::Error) -> Self {
        PKeyError
    }
}

impl From<pkcs1::Error> for PKeyError {
    fn from(_: pkcs1::Error) -> Self {
        PKeyError
    }
}

impl From<rsa::Error> for PKeyError {
    fn from(_: rsa::Error) -> Self {
        PKeyError
    }
}

/// A wrapper around either half of an RSA key pair.
pub struct PKey<T> {
    pub(crate) value: T,
}

/// A public key
pub type PublicKey = PKey<RsaPublicKey>;
/// A private key
pub type PrivateKey = PKey<RsaPrivateKey>;

impl<T> Debug for PKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Deliberately never writes key material out
        write!(f, "[pkey]")
    }
}

impl<T: Clone> Clone for PKey<T> {
    fn clone(&self) -> Self {
        PKey {
            value: self.value.clone(),
        }
    }
}

pub trait KeySize {
    /// Key (modulus) size in bytes
    fn size(&self) -> usize;

    fn bit_length(&self) -> usize {
        self.size() * 8
    }

    /// The number of plaintext bytes a single RSA block can carry under the padding.
    fn plain_text_block_size(&self, padding: RsaPadding) -> usize {
        self.size() - padding.block_overhead()
    }

    /// Each plaintext block encrypts to one ciphertext block of the key size.
    fn cipher_text_block_size(&self) -> usize {
        self.size()
    }

    /// The ciphertext size for a plaintext of `data_size` bytes - one full ciphertext block per
    /// started plaintext block. An exact multiple of the plaintext block size does not produce
    /// an empty trailing block.
    fn calculate_cipher_text_size(&self, data_size: usize, padding: RsaPadding) -> usize {
        let plain_text_block_size = self.plain_text_block_size(padding);
        let block_count = if data_size % plain_text_block_size == 0 {
            data_size / plain_text_block_size
        } else {
            (data_size / plain_text_block_size) + 1
        };
        block_count * self.cipher_text_block_size()
    }
}

impl KeySize for PrivateKey {
    fn size(&self) -> usize {
        self.value.size()
    }
}

impl KeySize for PublicKey {
    fn size(&self) -> usize {
        self.value.size()
    }
}

impl PrivateKey {
    /// Generates a fresh key pair. Used for sample / test certificates.
    pub fn new(bit_length: u32) -> Result<PrivateKey, PKeyError> {
        let mut rng = rand::thread_rng();
        let value = RsaPrivateKey::new(&mut rng, bit_length as usize)?;
        Ok(PKey { value })
    }

    pub fn read_pem_file(path: &Path) -> Result<PrivateKey, PKeyError> {
        use rsa::pkcs1::DecodeRsaPrivateKey;
        use rsa::pkcs8::DecodePrivateKey;

        // PKCS#8 first, PKCS#1 as the fallback
        match RsaPrivateKey::read_pkcs8_pem_file(path) {
            Ok(value) => Ok(PKey { value }),
            Err(_) => {
                let value = RsaPrivateKey::read_pkcs1_pem_file(path)?;
                Ok(PKey { value })
            }
        }
    }

    pub fn from_pem(bytes: &[u8]) -> Result<PrivateKey, PKeyError> {
        use rsa::pkcs1::DecodeRsaPrivateKey;
        use rsa::pkcs8::DecodePrivateKey;

        let pem = std::str::from_utf8(bytes).map_err(|_| PKeyError)?;
        match RsaPrivateKey::from_pkcs8_pem(pem) {
            Ok(value) => Ok(PKey { value }),
            Err(_) => {
                let value = RsaPrivateKey::from_pkcs1_pem(pem)?;
                Ok(PKey { value })
            }
        }
    }

    pub fn to_pem(&self) -> Result<String, PKeyError> {
        use rsa::pkcs8::EncodePrivateKey;
        let pem = self.value.to_pkcs8_pem(pkcs8::LineEnding::LF)?;
        Ok(pem.to_string())
    }

    pub fn public_key(&self) -> PublicKey {
        PKey {
            value: self.value.to_public_key(),
        }
    }

    /// Signs the data using RSA-SHA1 PKCS#1 v1.5
    pub fn sign_sha1(&self, data: &[u8], signature: &mut [u8]) -> Result<usize, StatusCode> {
        let mut rng = rand::thread_rng();
        let signing_key = pkcs1v15::SigningKey::<sha1::Sha1>::new(self.value.clone());
        match signing_key.try_sign_with_rng(&mut rng, data) {
            Err(_) => Err(StatusCode::BadUnexpectedError),
            Ok(signed) => copy_signature(&signed.to_vec(), signature),
        }
    }

    /// Signs the data using RSA-SHA256 PKCS#1 v1.5
    pub fn sign_sha256(&self, data: &[u8], signature: &mut [u8]) -> Result<usize, StatusCode> {
        let mut rng = rand::thread_rng();
        let signing_key = pkcs1v15::SigningKey::<sha2::Sha256>::new(self.value.clone());
        match signing_key.try_sign_with_rng(&mut rng, data) {
            Err(_) => Err(StatusCode::BadUnexpectedError),
            Ok(signed) => copy_signature(&signed.to_vec(), signature),
        }
    }

    /// Signs the data using RSA-SHA256 PSS. The salt length equals the hash length, which is
    /// what the `Aes256-Sha256-RsaPss` policy requires.
    pub fn sign_sha256_pss(&self, data: &[u8], signature: &mut [u8]) -> Result<usize, StatusCode> {
        let mut rng = rand::thread_rng();
        let signing_key = pss::BlindedSigningKey::<sha2::Sha256>::new(self.value.clone());
        match signing_key.try_sign_with_rng(&mut rng, data) {
            Err(_) => Err(StatusCode::BadUnexpectedError),
            Ok(signed) => copy_signature(&signed.to_vec(), signature),
        }
    }

    fn decrypt_block(&self, src: &[u8], padding: RsaPadding) -> rsa::errors::Result<Vec<u8>> {
        match padding {
            RsaPadding::Pkcs1 => self.value.decrypt(Pkcs1v15Encrypt, src),
            RsaPadding::OaepSha1 => self.value.decrypt(Oaep::new::<sha1::Sha1>(), src),
            RsaPadding::OaepSha256 => self.value.decrypt(Oaep::new::<sha2::Sha256>(), src),
        }
    }

    /// Decrypts a sequence of ciphertext blocks in `src` to `dst` using the specified padding,
    /// returning the total size of the decrypted data in bytes. `src` must be a whole number of
    /// ciphertext blocks.
    pub fn private_decrypt(
        &self,
        src: &[u8],
        dst: &mut [u8],
        padding: RsaPadding,
    ) -> Result<usize, PKeyError> {
        let cipher_text_block_size = self.cipher_text_block_size();
        if src.len() % cipher_text_block_size != 0 {
            return Err(PKeyError);
        }

        let mut dst_idx = 0;
        for block in src.chunks(cipher_text_block_size) {
            let decrypted = self.decrypt_block(block, padding)?;
            dst[dst_idx..(dst_idx + decrypted.len())].copy_from_slice(&decrypted);
            dst_idx += decrypted.len();
        }
        Ok(dst_idx)
    }
}

fn copy_signature(signed: &[u8], signature: &mut [u8]) -> Result<usize, StatusCode> {
    if signature.len() < signed.len() {
        error!(
            "Signature buffer of {} bytes is too small to receive a {} byte signature",
            signature.len(),
            signed.len()
        );
        Err(StatusCode::BadInvalidArgument)
    } else {
        signature[..signed.len()].copy_from_slice(signed);
        Ok(signed.len())
    }
}

impl PublicKey {
    /// Verifies the data using RSA-SHA1 PKCS#1 v1.5
    pub fn verify_sha1(&self, data: &[u8], signature: &[u8]) -> Result<bool, StatusCode> {
        let verifying_key = pkcs1v15::VerifyingKey::<sha1::Sha1>::new(self.value.clone());
        match pkcs1v15::Signature::try_from(signature) {
            Err(_) => Err(StatusCode::BadSecurityChecksFailed),
            Ok(signature) => Ok(verifying_key.verify(data, &signature).is_ok()),
        }
    }

    /// Verifies the data using RSA-SHA256 PKCS#1 v1.5
    pub fn verify_sha256(&self, data: &[u8], signature: &[u8]) -> Result<bool, StatusCode> {
        let verifying_key = pkcs1v15::VerifyingKey::<sha2::Sha256>::new(self.value.clone());
        match pkcs1v15::Signature::try_from(signature) {
            Err(_) => Err(StatusCode::BadSecurityChecksFailed),
            Ok(signature) => Ok(verifying_key.verify(data, &signature).is_ok()),
        }
    }

    /// Verifies the data using RSA-SHA256 PSS
    pub fn verify_sha256_pss(&self, data: &[u8], signature: &[u8]) -> Result<bool, StatusCode> {
        let verifying_key = pss::VerifyingKey::<sha2::Sha256>::new(self.value.clone());
        match pss::Signature::try_from(signature) {
            Err(_) => Err(StatusCode::BadSecurityChecksFailed),
            Ok(signature) => Ok(verifying_key.verify(data, &signature).is_ok()),
        }
    }

    fn encrypt_block(&self, src: &[u8], padding: RsaPadding) -> rsa::errors::Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        match padding {
            RsaPadding::Pkcs1 => self.value.encrypt(&mut rng, Pkcs1v15Encrypt, src),
            RsaPadding::OaepSha1 => self.value.encrypt(&mut rng, Oaep::new::<sha1::Sha1>(), src),
            RsaPadding::OaepSha256 => {
                self.value.encrypt(&mut rng, Oaep::new::<sha2::Sha256>(), src)
            }
        }
    }

    /// Encrypts data from `src` to `dst` using the specified padding and returns the size of the
    /// encrypted data in bytes. The plaintext is processed in blocks of the key size minus the
    /// padding overhead; the final block consumes whatever remains and is not padded out to full
    /// width by the caller - the padding scheme handles short input. An input that is an exact
    /// multiple of the block size produces no trailing block.
    pub fn public_encrypt(
        &self,
        src: &[u8],
        dst: &mut [u8],
        padding: RsaPadding,
    ) -> Result<usize, PKeyError> {
        let plain_text_block_size = self.plain_text_block_size(padding);

        let mut dst_idx = 0;
        for block in src.chunks(plain_text_block_size) {
            let encrypted = self.encrypt_block(block, padding)?;
            dst[dst_idx..(dst_idx + encrypted.len())].copy_from_slice(&encrypted);
            dst_idx += encrypted.len();
        }
        Ok(dst_idx)
    }
}
