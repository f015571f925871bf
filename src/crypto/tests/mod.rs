// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::crypto::{x509::X509Data, PrivateKey, X509};

const APPLICATION_URI: &str = "urn:testhost:testapplication";
const APPLICATION_HOSTNAME: &str = "testhost";

fn make_test_cert(key_size: u32) -> (X509, PrivateKey) {
    let args = X509Data {
        key_size,
        common_name: "x".to_string(),
        organization: "x.org".to_string(),
        application_uri: APPLICATION_URI.to_string(),
        alt_host_names: vec![APPLICATION_HOSTNAME.to_string(), "foo".to_string()],
        certificate_duration_days: 60,
    };
    X509::cert_and_pkey(&args).unwrap()
}

fn make_test_cert_1024() -> (X509, PrivateKey) {
    make_test_cert(1024)
}

fn make_test_cert_2048() -> (X509, PrivateKey) {
    make_test_cert(2048)
}

mod authentication;
mod crypto;
