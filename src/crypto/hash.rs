// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Hashing functions used for deriving the symmetric keys of a secure channel.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Pseudo random `P_SHA` implementation creating a pseudo random range of bytes from an input
///
/// <https://tools.ietf.org/html/rfc5246>
///
/// P_SHA1(secret, seed) = HMAC_SHA1(secret, A(1) + seed) +
///                        HMAC_SHA1(secret, A(2) + seed) +
///                        HMAC_SHA1(secret, A(3) + seed) + ...
///
/// Where A(n) is defined as:
///   A(0) = seed
///   A(n) = HMAC_SHA1(secret, A(n-1))
/// + indicates that the results are appended to previous results.
pub fn p_sha1(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
    p_sha(secret, seed, length, hmac_sha1)
}

pub fn p_sha256(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
    p_sha(secret, seed, length, hmac_sha256)
}

fn p_sha(
    secret: &[u8],
    seed: &[u8],
    length: usize,
    sign: fn(&[u8], &[u8]) -> Vec<u8>,
) -> Vec<u8> {
    let mut result = Vec::with_capacity(length);

    // A(0) = seed
    let mut a_last = seed.to_vec();
    while result.len() < length {
        // A(n) = HMAC(secret, A(n-1))
        let a_next = sign(secret, &a_last);

        let mut input = Vec::with_capacity(a_next.len() + seed.len());
        input.extend_from_slice(&a_next);
        input.extend_from_slice(seed);
        result.extend(sign(secret, &input));

        a_last = a_next;
    }

    result.truncate(length);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_sha_lengths() {
        let secret = b"a secret";
        let seed = b"a seed value";
        for length in [1usize, 19, 20, 21, 32, 33, 80, 256] {
            assert_eq!(p_sha1(secret, seed, length).len(), length);
            assert_eq!(p_sha256(secret, seed, length).len(), length);
        }
    }

    #[test]
    fn p_sha_deterministic() {
        let a = p_sha256(b"secret", b"seed", 64);
        let b = p_sha256(b"secret", b"seed", 64);
        assert_eq!(a, b);
        // A prefix of a longer run is the shorter run
        let c = p_sha256(b"secret", b"seed", 16);
        assert_eq!(&a[..16], &c[..]);
        // Different inputs diverge
        assert_ne!(a, p_sha256(b"secret2", b"seed", 64));
        assert_ne!(a, p_sha1(b"secret", b"seed", 64));
    }
}
