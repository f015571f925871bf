// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The secure channel. It owns the dialled transport, performs the `Hello` / `Acknowledge`
//! negotiation and the asymmetric `OpenSecureChannel` exchange, and then multiplexes the
//! connection between an IO task and any number of caller tasks - requests are assigned
//! monotonically increasing ids and responses are matched back to their callers through a
//! waiter map.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
    sync::Arc,
    time::Duration,
};

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::process_unexpected_response;
use crate::comms::{
    codec::MessageCodec,
    handle::AtomicHandle,
    transport::{
        AsymmetricSecurityHeader, ChunkType, Connector, MessageChunk, SecurityHeader,
        SymmetricSecurityHeader, Transport, TransportMessage, PROTOCOL_VERSION,
    },
};
use crate::crypto::{KeySize, PrivateKey, PublicKey, SecurityPolicy, X509};
use crate::types::{
    ByteString, ChannelSecurityToken, CloseSecureChannelRequest, DiagnosticBits,
    MessageSecurityMode, NodeId, OpenSecureChannelRequest, RequestHeader,
    SecurityTokenRequestType, StatusCode, SupportedMessage, UAString,
};

/// The lifecycle of a channel. Transitions are driven by the coordinator and by fatal IO
/// errors; there is no way back to `Open` other than a fresh `open` from `Closed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    /// `Hello` sent, waiting for `Acknowledge`
    Hello,
    /// `OpenSecureChannel` in flight
    Opening,
    Open,
    Closing,
}

/// The configuration surface of a channel, fed from the client configuration.
#[derive(Debug, Clone)]
pub struct SecureChannelConfig {
    pub security_policy: SecurityPolicy,
    pub security_mode: MessageSecurityMode,
    /// Socket connect timeout
    pub connect_timeout: Duration,
    /// Per request timeout, enforced locally and carried as the header's timeout hint
    pub request_timeout: Duration,
    /// Diagnostic bits requested on every request
    pub diagnostics_hint: u32,
    /// Requested lifetime in milliseconds of the symmetric security token
    pub token_lifetime: u32,
    pub max_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    /// Verbose frame logging
    pub trace: bool,
}

impl Default for SecureChannelConfig {
    fn default() -> Self {
        use crate::client::config::{
            DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_MAX_CHUNK_COUNT,
            DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_TIMEOUT_HINT_MS, DEFAULT_TOKEN_LIFETIME_MS,
        };
        SecureChannelConfig {
            security_policy: SecurityPolicy::None,
            security_mode: MessageSecurityMode::None,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS as u64),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_HINT_MS as u64),
            diagnostics_hint: 0,
            token_lifetime: DEFAULT_TOKEN_LIFETIME_MS,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_chunk_count: DEFAULT_MAX_CHUNK_COUNT,
            trace: false,
        }
    }
}

/// Buffer and message limits after the server's `Acknowledge` revised them.
#[derive(Debug, Clone, Copy, Default)]
struct NegotiatedLimits {
    send_buffer_size: u32,
    receive_buffer_size: u32,
    max_message_size: u32,
    max_chunk_count: u32,
}

/// Certificates, nonces and key material of the channel. Read-only after open except through
/// the coordinator.
#[derive(Default)]
struct SecurityState {
    local_certificate: Option<X509>,
    local_private_key: Option<PrivateKey>,
    remote_certificate: Option<X509>,
    remote_public_key: Option<PublicKey>,
    local_nonce: Vec<u8>,
    remote_nonce: Vec<u8>,
    token: Option<ChannelSecurityToken>,
    /// Keys securing what the client sends - (signing key, encryption key, IV). Derived after
    /// `OpenSecureChannel`, never handed out of the channel.
    local_keys: Option<(Vec<u8>, Vec<u8>, Vec<u8>)>,
    /// Keys securing what the server sends
    remote_keys: Option<(Vec<u8>, Vec<u8>, Vec<u8>)>,
}

struct Waiter {
    sender: oneshot::Sender<Result<SupportedMessage, StatusCode>>,
    deadline: Instant,
}

type WaiterMap = Arc<Mutex<HashMap<u32, Waiter>>>;

struct OutgoingMessage {
    request_id: u32,
    chunk_type: ChunkType,
    body: Vec<u8>,
}

pub struct SecureChannel {
    endpoint_url: String,
    config: SecureChannelConfig,
    connector: Arc<dyn Connector>,
    codec: Arc<dyn MessageCodec>,
    /// External cancellation - cancelling aborts the channel and abandons in-flight requests
    cancel: CancellationToken,
    state: Arc<RwLock<ChannelState>>,
    security: Arc<RwLock<SecurityState>>,
    limits: RwLock<NegotiatedLimits>,
    /// From the CreateSession response - the largest request body the server accepts
    max_request_message_size: AtomicU32,
    /// The session authentication token placed on request headers once a session is created
    authentication_token: ArcSwap<NodeId>,
    request_handle: AtomicHandle,
    request_id: AtomicHandle,
    /// Namespace and server tables read during the session bootstrap, used by callers to
    /// translate namespace indices
    namespace_uris: ArcSwap<Vec<String>>,
    server_uris: ArcSwap<Vec<String>>,
    waiters: WaiterMap,
    sender: ArcSwapOption<mpsc::Sender<OutgoingMessage>>,
    io_cancel: Mutex<CancellationToken>,
}

impl SecureChannel {
    const FIRST_REQUEST_HANDLE: u32 = 1;
    const FIRST_REQUEST_ID: u32 = 1;
    const SEND_QUEUE_DEPTH: usize = 32;

    pub fn new(
        endpoint_url: impl Into<String>,
        config: SecureChannelConfig,
        connector: Arc<dyn Connector>,
        codec: Arc<dyn MessageCodec>,
        cancel: CancellationToken,
    ) -> SecureChannel {
        SecureChannel {
            endpoint_url: endpoint_url.into(),
            config,
            connector,
            codec,
            cancel,
            state: Arc::new(RwLock::new(ChannelState::Closed)),
            security: Arc::new(RwLock::new(SecurityState::default())),
            limits: RwLock::new(NegotiatedLimits::default()),
            max_request_message_size: AtomicU32::new(0),
            authentication_token: ArcSwap::new(Arc::new(NodeId::null())),
            request_handle: AtomicHandle::new(Self::FIRST_REQUEST_HANDLE),
            request_id: AtomicHandle::new(Self::FIRST_REQUEST_ID),
            namespace_uris: ArcSwap::new(Arc::new(Vec::new())),
            server_uris: ArcSwap::new(Arc::new(Vec::new())),
            waiters: Arc::new(Mutex::new(HashMap::new())),
            sender: ArcSwapOption::empty(),
            io_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        self.config.security_policy
    }

    pub fn security_mode(&self) -> MessageSecurityMode {
        self.config.security_mode
    }

    pub fn state(&self) -> ChannelState {
        *self.state.read()
    }

    fn set_state(&self, state: ChannelState) {
        trace!("Setting channel state to {:?}", state);
        *self.state.write() = state;
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Supplies the client's own certificate and private key, which secure the
    /// `OpenSecureChannel` exchange.
    pub fn set_local_keypair(&self, certificate: Option<X509>, private_key: Option<PrivateKey>) {
        let mut security = self.security.write();
        security.local_certificate = certificate;
        security.local_private_key = private_key;
    }

    /// Supplies the server certificate taken from the selected endpoint. The channel holds its
    /// public key for the asymmetric exchange.
    pub fn set_remote_certificate(&self, certificate: &ByteString) -> Result<(), StatusCode> {
        if certificate.is_null() || certificate.is_empty() {
            if self.config.security_policy != SecurityPolicy::None {
                error!("The endpoint did not supply a server certificate, cannot use policy {}", self.config.security_policy);
                return Err(StatusCode::BadCertificateInvalid);
            }
            return Ok(());
        }
        let certificate = X509::from_byte_string(certificate)?;
        let public_key = certificate.public_key()?;
        let mut security = self.security.write();
        security.remote_certificate = Some(certificate);
        security.remote_public_key = Some(public_key);
        Ok(())
    }

    pub fn remote_certificate(&self) -> Option<X509> {
        self.security.read().remote_certificate.clone()
    }

    /// All requests after create session are expected to supply the session's authentication
    /// token in their header.
    pub fn set_authentication_token(&self, token: NodeId) {
        self.authentication_token.store(Arc::new(token));
    }

    pub fn max_request_message_size(&self) -> u32 {
        self.max_request_message_size.load(Ordering::Relaxed)
    }

    pub fn set_max_request_message_size(&self, size: u32) {
        self.max_request_message_size.store(size, Ordering::Relaxed);
    }

    pub fn namespace_uris(&self) -> Vec<String> {
        self.namespace_uris.load().as_ref().clone()
    }

    pub fn set_namespace_uris(&self, uris: Vec<String>) {
        self.namespace_uris.store(Arc::new(uris));
    }

    pub fn server_uris(&self) -> Vec<String> {
        self.server_uris.load().as_ref().clone()
    }

    pub fn set_server_uris(&self, uris: Vec<String>) {
        self.server_uris.store(Arc::new(uris));
    }

    /// Constructs a request header carrying the next request handle, the authentication token
    /// and the timeout hint that the server is expected to honour.
    pub fn make_request_header(&self) -> RequestHeader {
        RequestHeader {
            authentication_token: self.authentication_token.load().as_ref().clone(),
            timestamp: crate::types::now(),
            request_handle: self.request_handle.next(),
            return_diagnostics: DiagnosticBits::from_bits_truncate(self.config.diagnostics_hint),
            audit_entry_id: UAString::null(),
            timeout_hint: self.config.request_timeout.as_millis().min(u32::MAX as u128) as u32,
        }
    }

    /// Performs the transport handshake - dial, `Hello` / `Acknowledge`, then the asymmetric
    /// `OpenSecureChannel` exchange - and on success starts the IO task and transitions the
    /// channel to `Open`.
    pub async fn open(&self) -> Result<(), StatusCode> {
        {
            let mut state = self.state.write();
            if *state != ChannelState::Closed {
                error!("Cannot open the channel from state {:?}", *state);
                return Err(StatusCode::BadInvalidState);
            }
            *state = ChannelState::Hello;
        }
        match self.open_inner().await {
            Ok(()) => Ok(()),
            Err(status) => {
                self.set_state(ChannelState::Closed);
                Err(status)
            }
        }
    }

    async fn open_inner(&self) -> Result<(), StatusCode> {
        let connect = self
            .connector
            .connect(&self.endpoint_url, self.config.connect_timeout);
        let mut transport = tokio::select! {
            _ = self.cancel.cancelled() => return Err(StatusCode::BadOperationAbandoned),
            result = tokio::time::timeout(self.config.connect_timeout, connect) => match result {
                Err(_) => {
                    error!("Connection to {} timed out", self.endpoint_url);
                    return Err(StatusCode::BadTimeout);
                }
                Ok(result) => result?,
            }
        };

        debug!(
            "Connected to {}, sending HEL, policy = {}, mode = {:?}",
            self.endpoint_url, self.config.security_policy, self.config.security_mode
        );
        let hello = crate::comms::transport::HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: self.config.max_buffer_size,
            send_buffer_size: self.config.max_buffer_size,
            max_message_size: self.config.max_message_size,
            max_chunk_count: self.config.max_chunk_count,
            endpoint_url: UAString::from(&self.endpoint_url),
        };
        if self.config.trace {
            trace!("-> {:?}", hello);
        }
        transport.send(TransportMessage::Hello(hello)).await?;

        let ack = match self.handshake_receive(&mut transport).await? {
            TransportMessage::Acknowledge(ack) => ack,
            TransportMessage::Error(e) => {
                error!("Server responded to HEL with ERR {} ({})", e.error, e.reason);
                return Err(e.error);
            }
            other => {
                error!("Server responded to HEL with an unexpected frame {:?}", other);
                return Err(StatusCode::BadTcpMessageTypeInvalid);
            }
        };
        if self.config.trace {
            trace!("<- {:?}", ack);
        }

        // The server's receive limits cap what we send and vice versa. A zero max message size
        // or chunk count means unlimited.
        *self.limits.write() = NegotiatedLimits {
            send_buffer_size: self.config.max_buffer_size.min(ack.receive_buffer_size),
            receive_buffer_size: self.config.max_buffer_size.min(ack.send_buffer_size),
            max_message_size: revise_limit(self.config.max_message_size, ack.max_message_size),
            max_chunk_count: revise_limit(self.config.max_chunk_count, ack.max_chunk_count),
        };

        self.set_state(ChannelState::Opening);

        let client_nonce = self.config.security_policy.random_nonce();
        {
            let mut security = self.security.write();
            security.local_nonce = client_nonce.as_ref().to_vec();
        }
        let request = OpenSecureChannelRequest {
            request_header: self.make_request_header(),
            client_protocol_version: PROTOCOL_VERSION,
            request_type: SecurityTokenRequestType::Issue,
            security_mode: self.config.security_mode,
            client_nonce,
            requested_lifetime: self.config.token_lifetime,
        };
        let request_id = self.request_id.next();
        let body = self.codec.encode(&request.into())?;
        let (security_header, body) = self.apply_asymmetric_security(body)?;
        transport
            .send(TransportMessage::Chunk(MessageChunk {
                chunk_type: ChunkType::OpenSecureChannel,
                secure_channel_id: 0,
                security_header: SecurityHeader::Asymmetric(security_header),
                request_id,
                body,
            }))
            .await?;

        let chunk = loop {
            match self.handshake_receive(&mut transport).await? {
                TransportMessage::Chunk(chunk)
                    if chunk.chunk_type == ChunkType::OpenSecureChannel =>
                {
                    break chunk
                }
                TransportMessage::Error(e) => {
                    error!("Server responded to OPN with ERR {} ({})", e.error, e.reason);
                    return Err(e.error);
                }
                other => {
                    warn!("Discarding unexpected frame {:?} while opening", other);
                }
            }
        };
        let body = self.remove_asymmetric_security(chunk.body)?;
        let response = self.codec.decode(&body)?;
        let SupportedMessage::OpenSecureChannelResponse(response) = response else {
            return Err(process_unexpected_response(response));
        };
        let service_result = response.response_header.service_result;
        if service_result.is_bad() {
            error!("OpenSecureChannel was rejected, result = {}", service_result);
            return Err(service_result);
        }

        debug!(
            "Secure channel {} token {} opened, lifetime {}ms",
            response.security_token.channel_id,
            response.security_token.token_id,
            response.security_token.revised_lifetime
        );
        {
            let mut security = self.security.write();
            security.remote_nonce = response.server_nonce.as_ref().to_vec();
            security.token = Some(response.security_token.clone());
            if self.config.security_policy != SecurityPolicy::None
                && self.config.security_mode != MessageSecurityMode::None
            {
                // Part 6 Table 33 - client keys from (serverNonce, clientNonce), server keys
                // from (clientNonce, serverNonce)
                let policy = self.config.security_policy;
                security.local_keys = Some(
                    policy.make_secure_channel_keys(&security.remote_nonce, &security.local_nonce),
                );
                security.remote_keys = Some(
                    policy.make_secure_channel_keys(&security.local_nonce, &security.remote_nonce),
                );
            }
        }

        let (sender, receiver) = mpsc::channel(Self::SEND_QUEUE_DEPTH);
        let io_cancel = CancellationToken::new();
        *self.io_cancel.lock() = io_cancel.clone();
        self.sender.store(Some(Arc::new(sender)));
        self.set_state(ChannelState::Open);

        let io = IoTask {
            transport,
            receiver,
            codec: self.codec.clone(),
            waiters: self.waiters.clone(),
            state: self.state.clone(),
            security: self.security.clone(),
            cancel: self.cancel.clone(),
            io_cancel,
            trace: self.config.trace,
        };
        tokio::spawn(io.run());
        Ok(())
    }

    /// Receives one frame during the linearized handshake, bounded by the request timeout and
    /// the cancellation token.
    async fn handshake_receive(
        &self,
        transport: &mut Box<dyn Transport>,
    ) -> Result<TransportMessage, StatusCode> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(StatusCode::BadOperationAbandoned),
            result = tokio::time::timeout(self.config.request_timeout, transport.receive()) => match result {
                Err(_) => Err(StatusCode::BadTimeout),
                Ok(result) => result,
            }
        }
    }

    /// Secures the OPN body per the negotiated policy - sign with our key, encrypt the body and
    /// signature to the server's public key - and builds the asymmetric security header that
    /// lets the server reverse the process.
    fn apply_asymmetric_security(
        &self,
        body: Vec<u8>,
    ) -> Result<(AsymmetricSecurityHeader, Vec<u8>), StatusCode> {
        let policy = self.config.security_policy;
        if policy == SecurityPolicy::None {
            return Ok((AsymmetricSecurityHeader::none(), body));
        }
        let security = self.security.read();
        let (Some(local_certificate), Some(local_private_key)) = (
            &security.local_certificate,
            &security.local_private_key,
        ) else {
            error!("Policy {} requires a client certificate and private key", policy);
            return Err(StatusCode::BadConfigurationError);
        };
        let (Some(remote_certificate), Some(remote_public_key)) = (
            &security.remote_certificate,
            &security.remote_public_key,
        ) else {
            error!("Policy {} requires the server certificate", policy);
            return Err(StatusCode::BadCertificateInvalid);
        };

        let signature = policy.asymmetric_sign(local_private_key, &body)?;
        let mut plain = Vec::with_capacity(body.len() + signature.len());
        plain.extend_from_slice(&body);
        plain.extend_from_slice(&signature);

        let padding = policy.asymmetric_encryption_padding();
        let mut cipher =
            vec![0u8; remote_public_key.calculate_cipher_text_size(plain.len(), padding)];
        let size = policy.asymmetric_encrypt(remote_public_key, &plain, &mut cipher)?;
        cipher.truncate(size);

        let header = AsymmetricSecurityHeader {
            security_policy_uri: UAString::from(policy.to_uri()),
            sender_certificate: local_certificate.as_byte_string(),
            receiver_certificate_thumbprint: ByteString::from(remote_certificate.thumbprint()),
        };
        Ok((header, cipher))
    }

    /// Reverses [`Self::apply_asymmetric_security`] for the server's OPN response - decrypt
    /// with our private key, split off and verify the server's signature.
    fn remove_asymmetric_security(&self, body: Vec<u8>) -> Result<Vec<u8>, StatusCode> {
        let policy = self.config.security_policy;
        if policy == SecurityPolicy::None {
            return Ok(body);
        }
        let security = self.security.read();
        let Some(local_private_key) = &security.local_private_key else {
            return Err(StatusCode::BadConfigurationError);
        };
        let Some(remote_public_key) = &security.remote_public_key else {
            return Err(StatusCode::BadCertificateInvalid);
        };

        let mut plain = vec![0u8; body.len()];
        let size = policy.asymmetric_decrypt(local_private_key, &body, &mut plain)?;
        plain.truncate(size);

        let signature_size = remote_public_key.size();
        if plain.len() <= signature_size {
            error!("Decrypted OPN response is too short to carry a signature");
            return Err(StatusCode::BadSecurityChecksFailed);
        }
        let (message, signature) = plain.split_at(plain.len() - signature_size);
        if !policy.asymmetric_verify_signature(remote_public_key, message, signature)? {
            error!("OPN response signature verification failed");
            return Err(StatusCode::BadSecurityChecksFailed);
        }
        Ok(message.to_vec())
    }

    /// Serializes the request, assigns it the next request id, sends it and awaits the
    /// correlated response. Callers from any task may overlap; ordering of ids follows the
    /// order calls enter here.
    pub async fn request(
        &self,
        request: SupportedMessage,
    ) -> Result<SupportedMessage, StatusCode> {
        if self.state() != ChannelState::Open {
            return Err(StatusCode::BadConnectionClosed);
        }
        let Some(sender) = self.sender.load_full() else {
            return Err(StatusCode::BadConnectionClosed);
        };

        let body = self.codec.encode(&request)?;
        let max_message_size = self.limits.read().max_message_size;
        if max_message_size != 0 && body.len() > max_message_size as usize {
            error!(
                "Request of {} bytes exceeds the negotiated message limit {}",
                body.len(),
                max_message_size
            );
            return Err(StatusCode::BadTcpMessageTooLarge);
        }

        let request_id = self.request_id.next();
        if self.config.trace {
            trace!("-> {} as request id {}", request.type_name(), request_id);
        }
        let (response_sender, response_receiver) = oneshot::channel();
        self.waiters.lock().insert(
            request_id,
            Waiter {
                sender: response_sender,
                deadline: Instant::now() + self.config.request_timeout,
            },
        );

        let outgoing = OutgoingMessage {
            request_id,
            chunk_type: ChunkType::Message,
            body,
        };
        if sender.send(outgoing).await.is_err() {
            self.waiters.lock().remove(&request_id);
            return Err(StatusCode::BadConnectionClosed);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.waiters.lock().remove(&request_id);
                self.abort().await;
                Err(StatusCode::BadOperationAbandoned)
            }
            result = tokio::time::timeout(self.config.request_timeout, response_receiver) => match result {
                Err(_) => {
                    info!("Timeout waiting for a response to request id {}", request_id);
                    self.waiters.lock().remove(&request_id);
                    Err(StatusCode::BadTimeout)
                }
                Ok(Err(_)) => Err(StatusCode::BadConnectionClosed),
                Ok(Ok(result)) => result,
            }
        }
    }

    /// Sends `CloseSecureChannel` - which has no response - and closes the socket gracefully.
    /// Closing an already closed channel does nothing.
    pub async fn close(&self) {
        if self.state() != ChannelState::Open {
            self.set_state(ChannelState::Closed);
            return;
        }
        self.set_state(ChannelState::Closing);
        let request = CloseSecureChannelRequest {
            request_header: self.make_request_header(),
        };
        if let Ok(body) = self.codec.encode(&request.into()) {
            if let Some(sender) = self.sender.load_full() {
                let outgoing = OutgoingMessage {
                    request_id: self.request_id.next(),
                    chunk_type: ChunkType::CloseSecureChannel,
                    body,
                };
                if sender.send(outgoing).await.is_err() {
                    debug!("The IO task is already gone, skipping the CLO frame");
                }
            }
        }
        self.sender.store(None);
    }

    /// Closes the socket without a protocol level goodbye. Idempotent.
    pub async fn abort(&self) {
        let io_cancel = self.io_cancel.lock().clone();
        io_cancel.cancel();
        self.sender.store(None);
        self.set_state(ChannelState::Closed);
    }
}

fn revise_limit(ours: u32, theirs: u32) -> u32 {
    match (ours, theirs) {
        (0, theirs) => theirs,
        (ours, 0) => ours,
        (ours, theirs) => ours.min(theirs),
    }
}

/// The task that owns the transport once the channel is open. It multiplexes the socket
/// between outgoing requests and incoming responses, sweeps expired waiters, and on any fatal
/// condition fails every in-flight request with the closing status.
struct IoTask {
    transport: Box<dyn Transport>,
    receiver: mpsc::Receiver<OutgoingMessage>,
    codec: Arc<dyn MessageCodec>,
    waiters: WaiterMap,
    state: Arc<RwLock<ChannelState>>,
    security: Arc<RwLock<SecurityState>>,
    cancel: CancellationToken,
    io_cancel: CancellationToken,
    trace: bool,
}

impl IoTask {
    const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

    async fn run(mut self) {
        let mut sweep = tokio::time::interval(Self::SWEEP_INTERVAL);
        let close_status = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break StatusCode::BadOperationAbandoned,
                _ = self.io_cancel.cancelled() => break StatusCode::BadConnectionClosed,
                _ = sweep.tick() => self.sweep_expired_waiters(),
                outgoing = self.receiver.recv() => match outgoing {
                    None => break StatusCode::BadConnectionClosed,
                    Some(outgoing) => {
                        let is_close = outgoing.chunk_type == ChunkType::CloseSecureChannel;
                        let chunk = self.make_chunk(outgoing);
                        if self.trace {
                            trace!("-> chunk {:?} request id {}", chunk.chunk_type, chunk.request_id);
                        }
                        if let Err(status) = self.transport.send(TransportMessage::Chunk(chunk)).await {
                            error!("Failed to send a chunk, error = {}", status);
                            break status;
                        }
                        if is_close {
                            // Goodbye flushed, take the socket down
                            break StatusCode::BadConnectionClosed;
                        }
                    }
                },
                incoming = self.transport.receive() => match incoming {
                    Err(status) => {
                        debug!("Transport receive failed, error = {}", status);
                        break status;
                    }
                    Ok(TransportMessage::Chunk(chunk)) if chunk.chunk_type == ChunkType::Message => {
                        self.deliver(chunk);
                    }
                    Ok(TransportMessage::Error(e)) => {
                        error!("Server sent ERR {} ({})", e.error, e.reason);
                        break e.error;
                    }
                    Ok(other) => {
                        warn!("Discarding an unexpected frame {:?}", other);
                    }
                },
            }
        };

        self.transport.close().await;
        *self.state.write() = ChannelState::Closed;
        let mut waiters = self.waiters.lock();
        for (_, waiter) in waiters.drain() {
            let _ = waiter.sender.send(Err(close_status));
        }
        debug!("IO task has finished with status {}", close_status);
    }

    fn make_chunk(&self, outgoing: OutgoingMessage) -> MessageChunk {
        let security = self.security.read();
        let (secure_channel_id, token_id) = security
            .token
            .as_ref()
            .map(|t| (t.channel_id, t.token_id))
            .unwrap_or((0, 0));
        MessageChunk {
            chunk_type: outgoing.chunk_type,
            secure_channel_id,
            security_header: SecurityHeader::Symmetric(SymmetricSecurityHeader { token_id }),
            request_id: outgoing.request_id,
            body: outgoing.body,
        }
    }

    /// Responses are decoded in receive order and handed to the waiter registered under their
    /// request id. A response nobody waits for - say its caller already timed out - is dropped.
    fn deliver(&self, chunk: MessageChunk) {
        let waiter = self.waiters.lock().remove(&chunk.request_id);
        match waiter {
            None => {
                debug!(
                    "Response to request id {} has no waiter and will be ignored",
                    chunk.request_id
                );
            }
            Some(waiter) => {
                let result = self.codec.decode(&chunk.body);
                if self.trace {
                    match &result {
                        Ok(message) => trace!("<- {} for request id {}", message.type_name(), chunk.request_id),
                        Err(status) => trace!("<- undecodable response for request id {}, error = {}", chunk.request_id, status),
                    }
                }
                let _ = waiter.sender.send(result);
            }
        }
    }

    fn sweep_expired_waiters(&self) {
        let now = Instant::now();
        let mut waiters = self.waiters.lock();
        let expired: Vec<u32> = waiters
            .iter()
            .filter(|(_, waiter)| waiter.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(waiter) = waiters.remove(&id) {
                let _ = waiter.sender.send(Err(StatusCode::BadTimeout));
            }
        }
    }
}
