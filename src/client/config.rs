// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Client configuration data. The configuration is an immutable record populated by the
//! [`ClientBuilder`](crate::client::ClientBuilder); there is no process-wide state.

use std::path::PathBuf;

use crate::client::IdentityToken;
use crate::crypto::{security_policy::SECURITY_POLICY_URI_BEST_AVAILABLE, ValidationOptions};
use crate::types::MessageSecurityMode;

pub const DEFAULT_SESSION_TIMEOUT_MS: f64 = 120_000.0;
pub const DEFAULT_TIMEOUT_HINT_MS: u32 = 1_500;
pub const DEFAULT_DIAGNOSTICS_HINT: u32 = 0;
pub const DEFAULT_TOKEN_LIFETIME_MS: u32 = 60 * 60 * 1_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u32 = 5_000;
pub const DEFAULT_MAX_BUFFER_SIZE: u32 = 64 * 1_024;
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 16 * 1_024 * 1_024;
pub const DEFAULT_MAX_CHUNK_COUNT: u32 = 4 * 1_024;

/// Client OPC UA configuration. This is the exhaustive set of knobs the client recognizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The url of the endpoint to discover and connect to
    pub endpoint_url: String,
    /// Name the client presents itself as to the server
    pub application_name: String,
    /// The application instance uri. When empty it is derived as `urn:<hostname>:<name>`,
    /// unless the client certificate carries a subject alternative name uri, which then wins.
    pub application_uri: String,
    pub product_uri: String,
    /// Requested security policy uri, or the best-available sentinel
    pub security_policy_uri: String,
    /// Requested security mode; `Invalid` means any
    pub security_mode: MessageSecurityMode,
    /// The user identity presented in `ActivateSession`
    pub user_identity: IdentityToken,
    /// Requested session timeout in milliseconds
    pub session_timeout: f64,
    pub session_name: String,
    /// Per request timeout in milliseconds, enforced locally and sent as the timeout hint
    pub timeout_hint: u32,
    /// Diagnostic bits requested on every request
    pub diagnostics_hint: u32,
    /// Requested lifetime in milliseconds of the channel's symmetric keys
    pub token_lifetime: u32,
    /// Socket connect timeout in milliseconds
    pub connect_timeout: u32,
    pub max_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    /// PKI directories. Trusted / issuer certificates and CRLs are read; rejected server
    /// certificates are written.
    pub trusted_certs_path: Option<PathBuf>,
    pub trusted_crls_path: Option<PathBuf>,
    pub issuer_certs_path: Option<PathBuf>,
    pub issuer_crls_path: Option<PathBuf>,
    pub rejected_certs_path: Option<PathBuf>,
    /// Softens specific certificate validation failures for test environments
    #[serde(flatten)]
    pub validation_options: ValidationOptions,
    /// Skip server certificate verification entirely. For testing/samples only.
    pub verify_server_certs: bool,
    /// Verbose frame logging
    pub trace: bool,
    /// Connect to `endpoint_url` itself rather than the url the selected endpoint advertises,
    /// while still applying the endpoint's policy, mode and certificate. Preserves SNI /
    /// redirect setups where the advertised host is not reachable.
    pub forced_endpoint: bool,
    /// The client's own certificate and key, required for any policy other than `None`
    pub local_certificate_path: Option<PathBuf>,
    pub local_private_key_path: Option<PathBuf>,
    /// Locales sent in `ActivateSession`; `["en"]` when empty
    pub preferred_locales: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint_url: String::new(),
            application_name: "application".to_string(),
            application_uri: String::new(),
            product_uri: String::new(),
            security_policy_uri: SECURITY_POLICY_URI_BEST_AVAILABLE.to_string(),
            security_mode: MessageSecurityMode::Invalid,
            user_identity: IdentityToken::Anonymous,
            session_timeout: DEFAULT_SESSION_TIMEOUT_MS,
            session_name: String::new(),
            timeout_hint: DEFAULT_TIMEOUT_HINT_MS,
            diagnostics_hint: DEFAULT_DIAGNOSTICS_HINT,
            token_lifetime: DEFAULT_TOKEN_LIFETIME_MS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_MS,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_chunk_count: DEFAULT_MAX_CHUNK_COUNT,
            trusted_certs_path: None,
            trusted_crls_path: None,
            issuer_certs_path: None,
            issuer_crls_path: None,
            rejected_certs_path: None,
            validation_options: Default::default(),
            verify_server_certs: true,
            trace: false,
            forced_endpoint: false,
            local_certificate_path: None,
            local_private_key_path: None,
            preferred_locales: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Tests if the config is in a state where a connection could be attempted.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.endpoint_url.is_empty() {
            error!("Endpoint url is empty");
            valid = false;
        }
        if self.application_name.is_empty() {
            error!("Application name is empty");
            valid = false;
        }
        if self.local_certificate_path.is_some() != self.local_private_key_path.is_some() {
            error!("A client certificate path and a private key path must be supplied together");
            valid = false;
        }
        valid
    }

    pub fn has_local_certificate(&self) -> bool {
        self.local_certificate_path.is_some() && self.local_private_key_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_valid_without_url() {
        let config = ClientConfig::default();
        assert!(!config.is_valid());
        let config = ClientConfig {
            endpoint_url: "opc.tcp://localhost:4855".to_string(),
            ..Default::default()
        };
        assert!(config.is_valid());
    }

    #[test]
    fn cert_and_key_come_together() {
        let config = ClientConfig {
            endpoint_url: "opc.tcp://localhost:4855".to_string(),
            local_certificate_path: Some("client.der".into()),
            ..Default::default()
        };
        assert!(!config.is_valid());
    }

    #[test]
    fn serde_round_trip() {
        let config = ClientConfig {
            endpoint_url: "opc.tcp://localhost:4855".to_string(),
            user_identity: crate::client::IdentityToken::UserName(
                "root".to_string(),
                "secret".to_string(),
            ),
            trusted_certs_path: Some("pki/trusted".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let config2: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, config2);
    }
}
