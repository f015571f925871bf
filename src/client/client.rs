// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The client-side entry point. A [`Client`] owns the configuration, the certificate store and
//! the collaborator seams; [`Client::connect`] runs the whole establishment pipeline from
//! endpoint discovery to a ready [`Session`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::{
    endpoint::{select_endpoint, EndpointPreference},
    process_service_result, process_unexpected_response, ClientConfig, Session,
};
use crate::comms::{
    channel::{SecureChannel, SecureChannelConfig},
    transport::TRANSPORT_PROFILE_URI_BINARY,
    url::{hostname_from_url, is_opc_ua_binary_url},
    Connector, MessageCodec,
};
use crate::crypto::{CertificateStore, PrivateKey, SecurityPolicy, X509};
use crate::types::{
    ApplicationDescription, ApplicationType, EndpointDescription, GetEndpointsRequest,
    LocalizedText, StatusCode, SupportedMessage, UAString,
};

pub struct Client {
    /// Client configuration
    config: ClientConfig,
    /// Where certificates are read from and rejected server certificates go
    certificate_store: Arc<CertificateStore>,
    /// Dials the endpoint urls
    connector: Arc<dyn Connector>,
    /// The UA-Binary encoder / decoder
    codec: Arc<dyn MessageCodec>,
    /// External cancellation of every operation this client starts
    cancel: CancellationToken,
}

impl Client {
    /// Creates a new `Client` instance from its configuration and collaborators. Note that this
    /// does not make any connection to the server.
    pub fn new(
        config: ClientConfig,
        connector: Box<dyn Connector>,
        codec: Arc<dyn MessageCodec>,
        cancel: CancellationToken,
    ) -> Client {
        let certificate_store = Arc::new(CertificateStore::new(
            config.trusted_certs_path.clone(),
            config.trusted_crls_path.clone(),
            config.issuer_certs_path.clone(),
            config.issuer_crls_path.clone(),
            config.rejected_certs_path.clone(),
            config.validation_options.clone(),
            !config.verify_server_certs,
        ));
        Client {
            config,
            certificate_store,
            connector: Arc::from(connector),
            codec,
            cancel,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a filled `ApplicationDescription` using information from the config and, when a
    /// client certificate is present, its embedded application uri - the uri in the client's
    /// identity assertions must match the certificate's.
    fn application_description(&self, certificate: Option<&X509>) -> ApplicationDescription {
        let application_uri = certificate
            .and_then(|cert| cert.application_uri())
            .or_else(|| {
                if self.config.application_uri.is_empty() {
                    None
                } else {
                    Some(self.config.application_uri.clone())
                }
            })
            .unwrap_or_else(|| {
                let hostname = gethostname::gethostname()
                    .into_string()
                    .unwrap_or_else(|_| "localhost".to_string());
                format!("urn:{}:{}", hostname, self.config.application_name)
            });
        ApplicationDescription {
            application_uri: UAString::from(application_uri),
            product_uri: UAString::from(&self.config.product_uri),
            application_name: LocalizedText::new("", &self.config.application_name),
            application_type: ApplicationType::Client,
            gateway_server_uri: UAString::null(),
            discovery_profile_uri: UAString::null(),
            discovery_urls: None,
        }
    }

    fn channel_config(
        &self,
        security_policy: SecurityPolicy,
        security_mode: crate::types::MessageSecurityMode,
    ) -> SecureChannelConfig {
        SecureChannelConfig {
            security_policy,
            security_mode,
            connect_timeout: std::time::Duration::from_millis(self.config.connect_timeout as u64),
            request_timeout: std::time::Duration::from_millis(self.config.timeout_hint as u64),
            diagnostics_hint: self.config.diagnostics_hint,
            token_lifetime: self.config.token_lifetime,
            max_buffer_size: self.config.max_buffer_size,
            max_message_size: self.config.max_message_size,
            max_chunk_count: self.config.max_chunk_count,
            trace: self.config.trace,
        }
    }

    /// Makes a None/None connection to the server to obtain the list of endpoints it
    /// advertises, filtered to the binary transport profile.
    pub async fn get_server_endpoints(&self) -> Result<Vec<EndpointDescription>, StatusCode> {
        if !is_opc_ua_binary_url(&self.config.endpoint_url) {
            error!(
                "Endpoint url {} is not a valid / supported url",
                self.config.endpoint_url
            );
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }
        let channel = SecureChannel::new(
            self.config.endpoint_url.clone(),
            self.channel_config(
                SecurityPolicy::None,
                crate::types::MessageSecurityMode::None,
            ),
            self.connector.clone(),
            self.codec.clone(),
            self.cancel.child_token(),
        );
        channel.open().await?;

        let request = GetEndpointsRequest {
            request_header: channel.make_request_header(),
            endpoint_url: UAString::from(&self.config.endpoint_url),
            locale_ids: None,
            profile_uris: Some(vec![UAString::from(TRANSPORT_PROFILE_URI_BINARY)]),
        };
        let result = channel.request(request.into()).await;
        channel.close().await;

        match result? {
            SupportedMessage::GetEndpointsResponse(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.endpoints.unwrap_or_default())
            }
            response => Err(process_unexpected_response(response)),
        }
    }

    /// Connects to the configured endpoint and establishes an activated session - discovery,
    /// endpoint selection, secure channel handshake, `CreateSession` / `ActivateSession` and
    /// the namespace bootstrap. The first failure of any step aborts the channel and is
    /// returned; no retry is attempted at this layer.
    pub async fn connect(&self) -> Result<Session, StatusCode> {
        let endpoints = self.get_server_endpoints().await?;
        debug!("Server advertises {} endpoints", endpoints.len());

        let preference = EndpointPreference {
            security_policy_uri: self.config.security_policy_uri.clone(),
            security_mode: self.config.security_mode,
            has_client_certificate: self.config.has_local_certificate(),
        };
        let endpoint = select_endpoint(&endpoints, &preference)?;
        let security_policy = SecurityPolicy::from_uri(endpoint.security_policy_uri.as_ref());

        // The caller may pin the url it dialled; the endpoint's security parameters apply
        // either way
        let endpoint_url = if self.config.forced_endpoint {
            self.config.endpoint_url.clone()
        } else {
            endpoint.endpoint_url.as_ref().to_string()
        };

        let (local_certificate, local_private_key) = self.load_local_keypair()?;
        if security_policy != SecurityPolicy::None && local_certificate.is_none() {
            error!(
                "Policy {} requires a client certificate and none is configured",
                security_policy
            );
            return Err(StatusCode::BadConfigurationError);
        }

        self.validate_server_certificate(&endpoint, security_policy, &endpoint_url)?;

        let channel = Arc::new(SecureChannel::new(
            endpoint_url,
            self.channel_config(security_policy, endpoint.security_mode),
            self.connector.clone(),
            self.codec.clone(),
            self.cancel.child_token(),
        ));
        channel.set_local_keypair(local_certificate.clone(), local_private_key.clone());
        channel.set_remote_certificate(&endpoint.server_certificate)?;
        channel.open().await?;

        let session = Session::new(
            channel,
            endpoint,
            self.application_description(local_certificate.as_ref()),
            self.config.clone(),
            local_certificate,
            local_private_key,
        );
        match session.establish().await {
            Ok(()) => Ok(session),
            Err(status) => {
                error!("Session establishment failed with {}", status);
                session.abort().await;
                Err(status)
            }
        }
    }

    fn load_local_keypair(&self) -> Result<(Option<X509>, Option<PrivateKey>), StatusCode> {
        let (Some(certificate_path), Some(private_key_path)) = (
            &self.config.local_certificate_path,
            &self.config.local_private_key_path,
        ) else {
            return Ok((None, None));
        };
        let certificate = CertificateStore::read_cert(certificate_path).map_err(|e| {
            error!("{}", e);
            StatusCode::BadConfigurationError
        })?;
        let private_key = CertificateStore::read_pkey(private_key_path).map_err(|e| {
            error!("{}", e);
            StatusCode::BadConfigurationError
        })?;
        Ok((Some(certificate), Some(private_key)))
    }

    /// Validates the endpoint's server certificate before any connection is attempted with it.
    /// A failed certificate ends up in the rejected directory.
    fn validate_server_certificate(
        &self,
        endpoint: &EndpointDescription,
        security_policy: SecurityPolicy,
        endpoint_url: &str,
    ) -> Result<(), StatusCode> {
        if endpoint.server_certificate.is_empty() {
            if security_policy != SecurityPolicy::None {
                error!("The selected endpoint advertises no server certificate");
                return Err(StatusCode::BadCertificateInvalid);
            }
            return Ok(());
        }
        let certificate = X509::from_byte_string(&endpoint.server_certificate)?;
        let hostname = hostname_from_url(endpoint_url)?;
        let result = self
            .certificate_store
            .validate_server_certificate(&certificate, &hostname);
        if result.is_bad() {
            Err(result)
        } else {
            Ok(())
        }
    }
}
