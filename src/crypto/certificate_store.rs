// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The certificate store is the client's window onto its PKI state on disk - its own key pair,
//! the trusted / issuer certificate directories, and the rejected certificates directory where
//! servers that failed validation are deposited for an operator to inspect and promote.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::crypto::{PrivateKey, X509};
use crate::types::StatusCode;

/// Controls how much of a failed server certificate validation is forgiven. Each flag softens
/// one specific check for test environments; none of them affect the trust check itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Accept a certificate whose subject alternative names do not contain the host connected to
    pub suppress_hostname_invalid: bool,
    /// Accept a certificate outside its validity period
    pub suppress_certificate_expired: bool,
    /// Accept a certificate whose issuer is not present in the issuer directory
    pub suppress_certificate_chain_incomplete: bool,
    /// Accept a certificate whose revocation status cannot be established
    pub suppress_certificate_revocation_unknown: bool,
}

pub struct CertificateStore {
    trusted_certs_path: Option<PathBuf>,
    trusted_crls_path: Option<PathBuf>,
    issuer_certs_path: Option<PathBuf>,
    #[allow(dead_code)]
    issuer_crls_path: Option<PathBuf>,
    rejected_certs_path: Option<PathBuf>,
    validation_options: ValidationOptions,
    /// Skip validation entirely. For testing/samples only unless you're sure what you're doing.
    skip_verify: bool,
}

impl CertificateStore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trusted_certs_path: Option<PathBuf>,
        trusted_crls_path: Option<PathBuf>,
        issuer_certs_path: Option<PathBuf>,
        issuer_crls_path: Option<PathBuf>,
        rejected_certs_path: Option<PathBuf>,
        validation_options: ValidationOptions,
        skip_verify: bool,
    ) -> CertificateStore {
        CertificateStore {
            trusted_certs_path,
            trusted_crls_path,
            issuer_certs_path,
            issuer_crls_path,
            rejected_certs_path,
            validation_options,
            skip_verify,
        }
    }

    /// Reads a certificate from a .der or .pem file.
    pub fn read_cert(path: &Path) -> Result<X509, String> {
        let data = fs::read(path)
            .map_err(|e| format!("Cannot read certificate from {}, error = {}", path.display(), e))?;
        let is_pem = path.extension().map_or(false, |e| e == "pem" || e == "crt");
        let result = if is_pem {
            X509::from_pem(&data)
        } else {
            X509::from_der(&data)
        };
        result.map_err(|_| format!("Certificate in {} cannot be parsed", path.display()))
    }

    /// Reads a private key from a .pem file.
    pub fn read_pkey(path: &Path) -> Result<PrivateKey, String> {
        let data = fs::read(path)
            .map_err(|e| format!("Cannot read private key from {}, error = {}", path.display(), e))?;
        PrivateKey::from_pem(&data)
            .map_err(|_| format!("Private key in {} cannot be parsed", path.display()))
    }

    /// Validates the server's certificate against the connected host name, the certificate's
    /// validity period, the trust directory and the chain / revocation expectations, honoring
    /// the suppression flags. A certificate that fails is written to the rejected directory so
    /// it can be inspected and, if appropriate, moved to the trusted directory.
    pub fn validate_server_certificate(&self, cert: &X509, hostname: &str) -> StatusCode {
        if self.skip_verify {
            debug!("Server certificate validation is disabled");
            return StatusCode::Good;
        }

        let result = self.validate(cert, hostname);
        if result.is_bad() {
            warn!(
                "Server certificate {} failed validation with {}",
                cert.thumbprint_hex(),
                result
            );
            self.store_rejected_cert(cert);
        }
        result
    }

    fn validate(&self, cert: &X509, hostname: &str) -> StatusCode {
        let options = &self.validation_options;

        let time_status = cert.is_time_valid(SystemTime::now());
        if time_status.is_bad() && !options.suppress_certificate_expired {
            return time_status;
        }

        if !cert.is_hostname_valid(hostname) && !options.suppress_hostname_invalid {
            error!("Server certificate does not carry host name {}", hostname);
            return StatusCode::BadCertificateHostNameInvalid;
        }

        // Without CRLs there is no way to establish revocation status
        if self.trusted_crls_path.is_none() && !options.suppress_certificate_revocation_unknown {
            return StatusCode::BadCertificateRevocationUnknown;
        }

        // A certificate that is not self-signed needs its issuer on disk to complete the chain.
        // Path validation proper is outside this store; presence is what is checked here.
        if !cert.is_self_signed()
            && self.issuer_certs_path.is_none()
            && !options.suppress_certificate_chain_incomplete
        {
            return StatusCode::BadCertificateChainIncomplete;
        }

        match &self.trusted_certs_path {
            None => {
                error!("No trusted certificates directory is configured, rejecting");
                StatusCode::BadCertificateUntrusted
            }
            Some(path) => {
                if self.is_trusted(path, cert) {
                    StatusCode::Good
                } else {
                    error!(
                        "Server certificate {} is not in the trusted directory",
                        cert.thumbprint_hex()
                    );
                    StatusCode::BadCertificateUntrusted
                }
            }
        }
    }

    /// A certificate is trusted when a byte-identical DER copy is present in the trusted
    /// directory.
    fn is_trusted(&self, trusted_path: &Path, cert: &X509) -> bool {
        let Ok(entries) = fs::read_dir(trusted_path) else {
            return false;
        };
        for entry in entries.flatten() {
            if let Ok(data) = fs::read(entry.path()) {
                if data == cert.as_der() {
                    return true;
                }
            }
        }
        false
    }

    /// Deposits the DER form of a certificate that failed validation into the rejected
    /// directory, named by thumbprint. This is the only on-disk state the client writes.
    fn store_rejected_cert(&self, cert: &X509) {
        let Some(path) = &self.rejected_certs_path else {
            return;
        };
        let file = path.join(format!("{}.der", cert.thumbprint_hex()));
        if let Err(e) = fs::create_dir_all(path).and_then(|_| fs::write(&file, cert.as_der())) {
            warn!("Cannot write rejected certificate {}, error = {}", file.display(), e);
        } else {
            info!("Rejected certificate was written to {}", file.display());
        }
    }
}
