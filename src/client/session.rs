// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The session - created and activated over an open secure channel, then used to exchange
//! service requests until it is closed or aborted.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::client::{
    process_service_result, process_unexpected_response, ClientConfig, IdentityToken,
};
use crate::comms::channel::SecureChannel;
use crate::crypto::{
    create_signature_data, random, user_identity::make_identity_token, verify_signature_data,
    CertificateStore, PrivateKey, SecurityPolicy, UserIdentity, X509,
};
use crate::types::{
    variable_ids, ActivateSessionRequest, ByteString, CloseSessionRequest, CreateSessionRequest,
    DataValue, EndpointDescription, MessageSecurityMode, NodeId, ReadRequest, ReadValueId,
    SignatureData, StatusCode, SupportedMessage, TimestampsToReturn, UAString,
};

/// Session lifecycle. Advances only on confirmed server responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session exists on the server yet
    None,
    /// `CreateSession` succeeded
    Created,
    /// `ActivateSession` succeeded - the session is usable
    Active,
    /// `CloseSession` in flight
    Closing,
    Closed,
}

pub struct Session {
    channel: Arc<SecureChannel>,
    endpoint: EndpointDescription,
    state: RwLock<SessionState>,
    session_id: RwLock<NodeId>,
    session_name: UAString,
    /// Revised by the server on create
    session_timeout: RwLock<f64>,
    /// The server nonce from `CreateSession`, signed and embedded during activation. The nonce
    /// returned by `ActivateSession` is deliberately not retained - reactivation is out of
    /// scope.
    server_nonce: RwLock<Vec<u8>>,
    application_description: crate::types::ApplicationDescription,
    config: ClientConfig,
    local_certificate: Option<X509>,
    local_private_key: Option<PrivateKey>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        channel: Arc<SecureChannel>,
        endpoint: EndpointDescription,
        application_description: crate::types::ApplicationDescription,
        config: ClientConfig,
        local_certificate: Option<X509>,
        local_private_key: Option<PrivateKey>,
    ) -> Session {
        Session {
            channel,
            endpoint,
            state: RwLock::new(SessionState::None),
            session_id: RwLock::new(NodeId::null()),
            session_name: UAString::from(&config.session_name),
            session_timeout: RwLock::new(config.session_timeout),
            server_nonce: RwLock::new(Vec::new()),
            application_description,
            config,
            local_certificate,
            local_private_key,
        }
    }

    /// Runs create, activate and the namespace bootstrap in order. Each step starts only after
    /// the previous one's response was decoded and validated.
    pub(crate) async fn establish(&self) -> Result<(), StatusCode> {
        self.create_session().await?;
        self.activate_session().await?;
        self.read_server_arrays().await?;
        Ok(())
    }

    /// Sends a `CreateSessionRequest`, pins the server certificate against the endpoint's and
    /// verifies the server's signature over `clientCertificate || clientNonce`.
    async fn create_session(&self) -> Result<(), StatusCode> {
        let client_nonce = random::nonce();
        let client_certificate = self
            .local_certificate
            .as_ref()
            .map(|cert| cert.as_byte_string())
            .unwrap_or_else(ByteString::null);

        let request = CreateSessionRequest {
            request_header: self.channel.make_request_header(),
            client_description: self.application_description.clone(),
            server_uri: UAString::null(),
            endpoint_url: UAString::from(self.channel.endpoint_url()),
            session_name: self.session_name.clone(),
            client_nonce: client_nonce.clone(),
            client_certificate: client_certificate.clone(),
            requested_session_timeout: self.config.session_timeout,
            max_response_message_size: self.config.max_message_size,
        };
        let response = self.channel.request(request.into()).await?;
        let SupportedMessage::CreateSessionResponse(response) = response else {
            return Err(process_unexpected_response(response));
        };
        process_service_result(&response.response_header)?;

        // The certificate the server presents now must be the certificate the endpoint
        // advertised, byte for byte - anything else means the channel is not talking to the
        // endpoint it selected.
        if response.server_certificate.as_ref() != self.endpoint.server_certificate.as_ref() {
            error!("The server certificate in the CreateSession response differs from the selected endpoint's");
            return Err(StatusCode::BadCertificateInvalid);
        }

        let security_policy = self.channel.security_policy();
        if security_policy != SecurityPolicy::None {
            let Some(remote_certificate) = self.channel.remote_certificate() else {
                return Err(StatusCode::BadCertificateInvalid);
            };
            verify_signature_data(
                &response.server_signature,
                security_policy,
                &remote_certificate,
                &client_certificate,
                &client_nonce,
            )?;
        }

        debug!(
            "Session {} created, revised timeout {}ms",
            response.session_id, response.revised_session_timeout
        );
        *self.session_id.write() = response.session_id.clone();
        *self.session_timeout.write() = response.revised_session_timeout;
        *self.server_nonce.write() = response.server_nonce.as_ref().to_vec();
        self.channel
            .set_authentication_token(response.authentication_token);
        self.channel
            .set_max_request_message_size(response.max_request_message_size);
        *self.state.write() = SessionState::Created;
        Ok(())
    }

    /// Builds the identity token for the configured user identity, signs
    /// `serverCertificate || serverNonce` with the client key and sends an
    /// `ActivateSessionRequest`.
    async fn activate_session(&self) -> Result<(), StatusCode> {
        let security_policy = self.channel.security_policy();
        let server_certificate = self.channel.remote_certificate();
        let server_nonce = self.server_nonce.read().clone();

        let identity = self.resolve_user_identity()?;
        let token_policies = self
            .endpoint
            .user_identity_tokens
            .clone()
            .unwrap_or_default();
        let (user_identity_token, user_token_signature) = make_identity_token(
            &identity,
            &token_policies,
            security_policy,
            server_certificate.as_ref(),
            &server_nonce,
        )?;

        let client_signature = match security_policy {
            SecurityPolicy::None => SignatureData::null(),
            security_policy => {
                let Some(private_key) = &self.local_private_key else {
                    error!("Cannot create the client signature - no private key");
                    return Err(StatusCode::BadConfigurationError);
                };
                let Some(server_certificate) = &server_certificate else {
                    error!("Cannot create the client signature - no server certificate");
                    return Err(StatusCode::BadCertificateInvalid);
                };
                create_signature_data(
                    private_key,
                    security_policy,
                    &server_certificate.as_byte_string(),
                    &ByteString::from(server_nonce.as_slice()),
                )?
            }
        };

        let locale_ids = if self.config.preferred_locales.is_empty() {
            vec![UAString::from("en")]
        } else {
            self.config
                .preferred_locales
                .iter()
                .map(UAString::from)
                .collect()
        };

        let request = ActivateSessionRequest {
            request_header: self.channel.make_request_header(),
            client_signature,
            client_software_certificates: None,
            locale_ids: Some(locale_ids),
            user_identity_token,
            user_token_signature,
        };
        let response = self.channel.request(request.into()).await?;
        let SupportedMessage::ActivateSessionResponse(response) = response else {
            return Err(process_unexpected_response(response));
        };
        process_service_result(&response.response_header)?;

        *self.state.write() = SessionState::Active;
        debug!("Session {} is active", self.session_id());
        Ok(())
    }

    fn resolve_user_identity(&self) -> Result<UserIdentity, StatusCode> {
        match &self.config.user_identity {
            IdentityToken::Anonymous => Ok(UserIdentity::Anonymous),
            IdentityToken::UserName(user, password) => Ok(UserIdentity::UserName {
                user: user.clone(),
                password: password.clone(),
            }),
            IdentityToken::X509(certificate_path, private_key_path) => {
                let certificate = CertificateStore::read_cert(certificate_path).map_err(|e| {
                    error!("{}", e);
                    StatusCode::BadConfigurationError
                })?;
                let private_key = CertificateStore::read_pkey(private_key_path).map_err(|e| {
                    error!("{}", e);
                    StatusCode::BadConfigurationError
                })?;
                Ok(UserIdentity::X509 {
                    certificate,
                    private_key,
                })
            }
            IdentityToken::IssuedToken(token_data) => Ok(UserIdentity::Issued {
                token_data: token_data.clone(),
            }),
        }
    }

    /// Reads the server's namespace and server arrays into the channel so subsequent requests
    /// can translate namespace indices. A transport failure here fails the handshake; a Bad
    /// status on either individual read does not - only Good results are applied.
    async fn read_server_arrays(&self) -> Result<(), StatusCode> {
        let nodes_to_read = vec![
            ReadValueId::value_of(NodeId::new(0, variable_ids::SERVER_NAMESPACE_ARRAY)),
            ReadValueId::value_of(NodeId::new(0, variable_ids::SERVER_SERVER_ARRAY)),
        ];
        let results = self.read(&nodes_to_read).await?;
        if results.len() != 2 {
            warn!("Namespace bootstrap read returned {} results", results.len());
            return Ok(());
        }
        if results[0].status().is_good() {
            if let Some(uris) = results[0].value.as_ref().and_then(|v| v.as_string_array()) {
                debug!("Namespace array has {} entries", uris.len());
                self.channel.set_namespace_uris(uris);
            }
        } else {
            warn!(
                "Namespace array read failed with {}, continuing without it",
                results[0].status()
            );
        }
        if results[1].status().is_good() {
            if let Some(uris) = results[1].value.as_ref().and_then(|v| v.as_string_array()) {
                self.channel.set_server_uris(uris);
            }
        } else {
            warn!(
                "Server array read failed with {}, continuing without it",
                results[1].status()
            );
        }
        Ok(())
    }

    /// Sends a service request over the channel. Fails with `BadSessionNotActivated` unless the
    /// session is active.
    pub async fn request(
        &self,
        request: SupportedMessage,
    ) -> Result<SupportedMessage, StatusCode> {
        if *self.state.read() != SessionState::Active {
            return Err(StatusCode::BadSessionNotActivated);
        }
        self.channel.request(request).await
    }

    /// Reads the `Value` (or any other) attribute of a set of nodes. Per-node failures are
    /// carried in each result's status, not raised.
    pub async fn read(
        &self,
        nodes_to_read: &[ReadValueId],
    ) -> Result<Vec<DataValue>, StatusCode> {
        if nodes_to_read.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let request = ReadRequest {
            request_header: self.channel.make_request_header(),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Neither,
            nodes_to_read: Some(nodes_to_read.to_vec()),
        };
        let response = self.request(request.into()).await?;
        match response {
            SupportedMessage::ReadResponse(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.results.unwrap_or_default())
            }
            response => Err(process_unexpected_response(response)),
        }
    }

    /// Closes the session - `CloseSessionRequest` deleting its subscriptions - and then the
    /// channel. Closing an already closed session does nothing.
    pub async fn close(&self) -> Result<(), StatusCode> {
        self.close_delete_subscriptions(true).await
    }

    /// Closes the session with a caller-chosen `deleteSubscriptions`.
    pub async fn close_delete_subscriptions(
        &self,
        delete_subscriptions: bool,
    ) -> Result<(), StatusCode> {
        {
            let mut state = self.state.write();
            match *state {
                SessionState::Closing | SessionState::Closed => return Ok(()),
                _ => *state = SessionState::Closing,
            }
        }
        let request = CloseSessionRequest {
            request_header: self.channel.make_request_header(),
            delete_subscriptions,
        };
        let result = self.channel.request(request.into()).await;
        self.channel.close().await;
        *self.state.write() = SessionState::Closed;
        match result {
            Ok(SupportedMessage::CloseSessionResponse(response)) => {
                process_service_result(&response.response_header)
            }
            Ok(response) => Err(process_unexpected_response(response)),
            Err(status) => Err(status),
        }
    }

    /// Closes the client abruptly - no `CloseSession`, no protocol goodbye. Idempotent, also
    /// after `close`.
    pub async fn abort(&self) {
        *self.state.write() = SessionState::Closed;
        self.channel.abort().await;
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    /// The id the server assigned to this session.
    pub fn session_id(&self) -> NodeId {
        self.session_id.read().clone()
    }

    /// The maximum number of milliseconds the session remains open without activity, as revised
    /// by the server.
    pub fn session_timeout(&self) -> f64 {
        *self.session_timeout.read()
    }

    pub fn endpoint_url(&self) -> &str {
        self.channel.endpoint_url()
    }

    pub fn security_policy_uri(&self) -> &'static str {
        self.channel.security_policy().to_uri()
    }

    pub fn security_mode(&self) -> MessageSecurityMode {
        self.channel.security_mode()
    }

    /// The largest request body the server accepts. Zero means no limit.
    pub fn max_request_message_size(&self) -> u32 {
        self.channel.max_request_message_size()
    }

    pub fn namespace_uris(&self) -> Vec<String> {
        self.channel.namespace_uris()
    }

    pub fn server_uris(&self) -> Vec<String> {
        self.channel.server_uris()
    }
}
