// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Cryptographically strong random bytes, used for the nonces that bind signatures and
//! ciphertexts to a single handshake instance.

use rand::{rngs::OsRng, RngCore};

use crate::types::ByteString;

/// Length in bytes of the nonce exchanged by `CreateSession` / `ActivateSession`. Part 4
/// requires at least 32 bytes regardless of the channel's security policy.
pub const NONCE_LENGTH: usize = 32;

pub fn bytes(length: usize) -> Vec<u8> {
    let mut data = vec![0u8; length];
    OsRng.fill_bytes(&mut data);
    data
}

pub fn byte_string(length: usize) -> ByteString {
    ByteString::from(bytes(length))
}

/// A fresh session nonce.
pub fn nonce() -> ByteString {
    byte_string(NONCE_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_length() {
        assert_eq!(nonce().as_ref().len(), NONCE_LENGTH);
        assert_eq!(bytes(16).len(), 16);
        assert!(byte_string(0).is_empty());
    }

    #[test]
    fn nonces_differ() {
        // Not a randomness test, just a check the source isn't constant
        assert_ne!(nonce(), nonce());
    }
}
