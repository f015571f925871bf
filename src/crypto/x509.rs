// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! X509 certificate wrapper - DER parsing and emitting, public key extraction, thumbprints, the
//! subject alternative name fields the handshake cares about, and a self-signed certificate
//! builder for tests and sample key pairs.

use std::{
    fmt::{self, Debug, Formatter},
    str::FromStr,
    time::SystemTime,
};

use sha1::{Digest, Sha1};
use x509_cert::{
    builder::{Builder, CertificateBuilder, Profile},
    der::{asn1::Ia5String, referenced::OwnedToRef, Decode, DecodePem, Encode},
    ext::pkix::{name::GeneralName, SubjectAltName},
    name::Name,
    serial_number::SerialNumber,
    time::Validity,
    Certificate,
};

use rsa::{pkcs1v15, RsaPublicKey};

use crate::crypto::pkey::{PrivateKey, PublicKey};
use crate::types::{ByteString, StatusCode};

#[derive(Debug)]
pub struct X509Error;

impl fmt::Display for X509Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X509Error")
    }
}

impl std::error::Error for X509Error {}

/// Arguments for creating a self-signed X509v3 application instance certificate.
#[derive(Debug, Clone)]
pub struct X509Data {
    pub key_size: u32,
    pub common_name: String,
    pub organization: String,
    /// The application uri, stored as a URI subject alternative name. The handshake requires
    /// the uri in the client's assertions to match the one embedded in its certificate.
    pub application_uri: String,
    /// DNS host names stored as subject alternative names.
    pub alt_host_names: Vec<String>,
    pub certificate_duration_days: u32,
}

/// An X509v3 certificate. The wrapper keeps the parsed certificate and the exact DER bytes it
/// came from, because the protocol pins and signs the bytes, not the parsed form.
#[derive(Clone)]
pub struct X509 {
    value: Certificate,
    der: Vec<u8>,
}

impl Debug for X509 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // This impl will not write out the cert and exists to keep derive happy on structs
        // that contain an X509 instance
        write!(f, "[x509]")
    }
}

impl PartialEq for X509 {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl X509 {
    pub fn from_der(data: &[u8]) -> Result<Self, X509Error> {
        let value = Certificate::from_der(data).map_err(|_| X509Error)?;
        Ok(X509 {
            value,
            der: data.to_vec(),
        })
    }

    pub fn from_pem(data: &[u8]) -> Result<Self, X509Error> {
        let value = Certificate::from_pem(data).map_err(|_| X509Error)?;
        let der = value.to_der().map_err(|_| X509Error)?;
        Ok(X509 { value, der })
    }

    pub fn from_byte_string(data: &ByteString) -> Result<X509, StatusCode> {
        if data.is_null() {
            error!("Cannot make a certificate from a null bytestring");
            Err(StatusCode::BadCertificateInvalid)
        } else {
            Self::from_der(data.as_ref()).map_err(|_| StatusCode::BadCertificateInvalid)
        }
    }

    /// The DER encoded form of the certificate.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(&self.der)
    }

    /// The SHA-1 digest of the DER form, used to address the receiver's certificate in the
    /// asymmetric security header and to name rejected certificate files.
    pub fn thumbprint(&self) -> Vec<u8> {
        let mut digest = Sha1::new();
        digest.update(&self.der);
        digest.finalize().to_vec()
    }

    pub fn thumbprint_hex(&self) -> String {
        self.thumbprint()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn public_key(&self) -> Result<PublicKey, StatusCode> {
        let spki = self.value.tbs_certificate.subject_public_key_info.owned_to_ref();
        match RsaPublicKey::try_from(spki) {
            Err(_) => Err(StatusCode::BadCertificateInvalid),
            Ok(value) => Ok(PublicKey { value }),
        }
    }

    fn subject_alt_names(&self) -> Option<Vec<GeneralName>> {
        let result: Result<Option<(bool, SubjectAltName)>, _> = self.value.tbs_certificate.get();
        match result {
            Ok(Some((_, san))) => Some(san.0),
            _ => None,
        }
    }

    /// The URI entry of the subject alternative name, which holds the application instance uri.
    pub fn application_uri(&self) -> Option<String> {
        self.subject_alt_names()?.iter().find_map(|name| match name {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
            _ => None,
        })
    }

    /// Tests if the supplied host name matches any of the DNS subject alternative names.
    pub fn is_hostname_valid(&self, hostname: &str) -> bool {
        self.subject_alt_names()
            .map(|names| {
                names.iter().any(|name| match name {
                    GeneralName::DnsName(dns) => dns.as_str().eq_ignore_ascii_case(hostname),
                    _ => false,
                })
            })
            .unwrap_or(false)
    }

    /// Tests the certificate's not-before / not-after window against the supplied time.
    pub fn is_time_valid(&self, now: SystemTime) -> StatusCode {
        let validity = &self.value.tbs_certificate.validity;
        let not_before = validity.not_before.to_system_time();
        let not_after = validity.not_after.to_system_time();
        if now < not_before {
            error!("Certificate is not yet valid (before its not-before date)");
            StatusCode::BadCertificateTimeInvalid
        } else if now > not_after {
            error!("Certificate has expired (after its not-after date)");
            StatusCode::BadCertificateTimeInvalid
        } else {
            StatusCode::Good
        }
    }

    /// Tests if the certificate is self-signed, i.e. issuer and subject are the same name.
    /// Chain validation proper is the trust store's business, this only drives the
    /// chain-incomplete check.
    pub fn is_self_signed(&self) -> bool {
        self.value.tbs_certificate.issuer == self.value.tbs_certificate.subject
    }

    /// Creates a self-signed X509v3 certificate and public/private key pair from the supplied
    /// creation args. The certificate identifies an instance of the application running on a
    /// host and carries its application uri; see OPC UA Part 6 Table 23 for the full set of
    /// requirements.
    pub fn cert_and_pkey(x509_data: &X509Data) -> Result<(Self, PrivateKey), String> {
        let pkey = PrivateKey::new(x509_data.key_size)
            .map_err(|_| "Cannot generate a key pair".to_string())?;
        let cert = Self::from_pkey(&pkey, x509_data)?;
        Ok((cert, pkey))
    }

    pub fn from_pkey(pkey: &PrivateKey, x509_data: &X509Data) -> Result<Self, String> {
        use rsa::pkcs8::EncodePublicKey;
        use std::time::Duration;
        use x509_cert::spki::SubjectPublicKeyInfoOwned;

        let public_key_der = pkey
            .value
            .to_public_key()
            .to_public_key_der()
            .map_err(|_| "Invalid public key".to_string())?;
        let spki = SubjectPublicKeyInfoOwned::try_from(public_key_der.as_bytes())
            .map_err(|_| "Invalid public key info".to_string())?;

        let validity = Validity::from_now(Duration::from_secs(
            86400 * x509_data.certificate_duration_days as u64,
        ))
        .map_err(|_| "Invalid validity".to_string())?;

        let mut subject = format!("CN={}", x509_data.common_name);
        if !x509_data.organization.is_empty() {
            subject.push_str(&format!(",O={}", x509_data.organization));
        }
        let subject = Name::from_str(&subject).map_err(|_| "Invalid subject".to_string())?;

        // Issuer and subject shall be the same for a self-signed cert
        let profile = Profile::Manual {
            issuer: Some(subject.clone()),
        };

        let signing_key = pkcs1v15::SigningKey::<sha2::Sha256>::new(pkey.value.clone());
        let mut builder = CertificateBuilder::new(
            profile,
            SerialNumber::from(1u32),
            validity,
            subject,
            spki,
            &signing_key,
        )
        .map_err(|_| "Cannot create certificate builder".to_string())?;

        let mut names = Vec::with_capacity(1 + x509_data.alt_host_names.len());
        let uri = Ia5String::new(&x509_data.application_uri)
            .map_err(|_| "Invalid application uri".to_string())?;
        names.push(GeneralName::UniformResourceIdentifier(uri));
        for host in &x509_data.alt_host_names {
            let dns = Ia5String::new(host).map_err(|_| "Invalid host name".to_string())?;
            names.push(GeneralName::DnsName(dns));
        }
        builder
            .add_extension(&SubjectAltName(names))
            .map_err(|_| "Cannot add subject alt names".to_string())?;

        let value = builder.build().map_err(|_| "Cannot sign certificate".to_string())?;
        let der = value.to_der().map_err(|_| "Invalid der".to_string())?;
        Ok(X509 { value, der })
    }
}
