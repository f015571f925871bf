// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::{Client, ClientConfig, IdentityToken};
use crate::comms::{Connector, MessageCodec};
use crate::crypto::SecurityPolicy;
use crate::types::{ByteString, MessageSecurityMode, StatusCode};

/// Builds a [`ClientConfig`] and from it a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    cancel: Option<CancellationToken>,
}

impl ClientBuilder {
    /// Creates a `ClientBuilder` for the given endpoint url.
    pub fn new(endpoint_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            config: ClientConfig {
                endpoint_url: endpoint_url.into(),
                ..Default::default()
            },
            cancel: None,
        }
    }

    /// Yields a [`Client`] from the values set by the builder, wired to the supplied transport
    /// connector and message codec.
    pub fn client(
        self,
        connector: Box<dyn Connector>,
        codec: Arc<dyn MessageCodec>,
    ) -> Result<Client, StatusCode> {
        if !self.config.is_valid() {
            return Err(StatusCode::BadConfigurationError);
        }
        Ok(Client::new(
            self.config,
            connector,
            codec,
            self.cancel.unwrap_or_default(),
        ))
    }

    /// Yields the [`ClientConfig`] from the values set by the builder.
    pub fn config(self) -> ClientConfig {
        self.config
    }

    /// Sets the application name.
    pub fn application_name(mut self, application_name: impl Into<String>) -> Self {
        self.config.application_name = application_name.into();
        self
    }

    /// Sets the application uri. When unset the uri is derived from the host name and
    /// application name, or taken from the client certificate.
    pub fn application_uri(mut self, application_uri: impl Into<String>) -> Self {
        self.config.application_uri = application_uri.into();
        self
    }

    pub fn product_uri(mut self, product_uri: impl Into<String>) -> Self {
        self.config.product_uri = product_uri.into();
        self
    }

    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.config.session_name = session_name.into();
        self
    }

    /// Requested session timeout in milliseconds. The server revises it.
    pub fn session_timeout(mut self, session_timeout: f64) -> Self {
        self.config.session_timeout = session_timeout;
        self
    }

    /// Requests a specific security policy and mode instead of the best available.
    pub fn security_policy(
        mut self,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> Self {
        self.config.security_policy_uri = security_policy.to_uri().to_string();
        self.config.security_mode = security_mode;
        self
    }

    /// Requests a specific security policy uri and mode. An empty uri matches any policy, as
    /// `MessageSecurityMode::Invalid` matches any mode.
    pub fn security_policy_uri(
        mut self,
        security_policy_uri: impl Into<String>,
        security_mode: MessageSecurityMode,
    ) -> Self {
        self.config.security_policy_uri = security_policy_uri.into();
        self.config.security_mode = security_mode;
        self
    }

    /// Connect anonymously. This is the default.
    pub fn anonymous_identity(mut self) -> Self {
        self.config.user_identity = IdentityToken::Anonymous;
        self
    }

    /// Connect with a user name and password.
    pub fn user_name_identity(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.user_identity = IdentityToken::UserName(user.into(), password.into());
        self
    }

    /// Connect with an X509 user certificate and key read from the supplied paths.
    pub fn x509_identity(
        mut self,
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        self.config.user_identity =
            IdentityToken::X509(certificate_path.into(), private_key_path.into());
        self
    }

    /// Connect with an externally issued token.
    pub fn issued_token_identity(mut self, token_data: ByteString) -> Self {
        self.config.user_identity = IdentityToken::IssuedToken(token_data);
        self
    }

    /// Sets the client's own application instance certificate and private key paths, required
    /// for any security policy other than `None`.
    pub fn client_certificate_paths(
        mut self,
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        self.config.local_certificate_path = Some(certificate_path.into());
        self.config.local_private_key_path = Some(private_key_path.into());
        self
    }

    /// Per request timeout in milliseconds.
    pub fn timeout_hint(mut self, timeout_hint: u32) -> Self {
        self.config.timeout_hint = timeout_hint;
        self
    }

    pub fn diagnostics_hint(mut self, diagnostics_hint: u32) -> Self {
        self.config.diagnostics_hint = diagnostics_hint;
        self
    }

    /// Requested lifetime in milliseconds of the channel's symmetric keys.
    pub fn token_lifetime(mut self, token_lifetime: u32) -> Self {
        self.config.token_lifetime = token_lifetime;
        self
    }

    /// Socket connect timeout in milliseconds.
    pub fn connect_timeout(mut self, connect_timeout: u32) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    pub fn max_buffer_size(mut self, max_buffer_size: u32) -> Self {
        self.config.max_buffer_size = max_buffer_size;
        self
    }

    pub fn max_message_size(mut self, max_message_size: u32) -> Self {
        self.config.max_message_size = max_message_size;
        self
    }

    pub fn max_chunk_count(mut self, max_chunk_count: u32) -> Self {
        self.config.max_chunk_count = max_chunk_count;
        self
    }

    pub fn trusted_certs_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.trusted_certs_path = Some(path.into());
        self
    }

    pub fn trusted_crls_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.trusted_crls_path = Some(path.into());
        self
    }

    pub fn issuer_certs_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.issuer_certs_path = Some(path.into());
        self
    }

    pub fn issuer_crls_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.issuer_crls_path = Some(path.into());
        self
    }

    /// Where server certificates that fail validation are deposited as DER files.
    pub fn rejected_certs_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rejected_certs_path = Some(path.into());
        self
    }

    /// Accept a server certificate whose host name does not match the host connected to.
    pub fn suppress_hostname_invalid(mut self) -> Self {
        self.config.validation_options.suppress_hostname_invalid = true;
        self
    }

    /// Accept a server certificate outside its validity period.
    pub fn suppress_certificate_expired(mut self) -> Self {
        self.config.validation_options.suppress_certificate_expired = true;
        self
    }

    /// Accept a server certificate whose chain cannot be completed from the issuer directory.
    pub fn suppress_certificate_chain_incomplete(mut self) -> Self {
        self.config
            .validation_options
            .suppress_certificate_chain_incomplete = true;
        self
    }

    /// Accept a server certificate whose revocation status cannot be established.
    pub fn suppress_certificate_revocation_unknown(mut self) -> Self {
        self.config
            .validation_options
            .suppress_certificate_revocation_unknown = true;
        self
    }

    /// Skips verification of the server certificate entirely. For testing/samples only.
    pub fn insecure_skip_verify(mut self) -> Self {
        self.config.verify_server_certs = false;
        self
    }

    /// Turns on verbose frame logging.
    pub fn trace(mut self) -> Self {
        self.config.trace = true;
        self
    }

    /// Connect to the url given to the builder even if the selected endpoint advertises a
    /// different one. The endpoint's policy, mode and certificate still apply.
    pub fn forced_endpoint(mut self) -> Self {
        self.config.forced_endpoint = true;
        self
    }

    /// Locales for `ActivateSession`, most preferred first.
    pub fn preferred_locales(mut self, preferred_locales: Vec<String>) -> Self {
        self.config.preferred_locales = preferred_locales;
        self
    }

    /// Supplies an external cancellation token. Cancelling it aborts the channel; operations in
    /// flight complete with `BadOperationAbandoned`.
    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}
