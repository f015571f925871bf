// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! End to end session establishment scenarios, driven against an in-process scripted server
//! speaking the crate's frame types over an in-memory transport.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use uasession::client::ClientBuilder;
use uasession::comms::{
    AcknowledgeMessage, AsymmetricSecurityHeader, ChunkType, Connector, MessageChunk,
    MessageCodec, SecurityHeader, SymmetricSecurityHeader, Transport, TransportMessage,
};
use uasession::crypto::{
    self, create_signature_data, decrypt_token_secret, random, verify_signature_data, KeySize,
    PrivateKey, SecurityPolicy, X509,
};
use uasession::crypto::x509::X509Data;
use uasession::types::*;

const ENDPOINT_URL: &str = "opc.tcp://localhost:46010/";
const NAMESPACE_URIS: [&str; 2] = ["http://opcfoundation.org/UA/", "urn:mock:namespace"];
const SERVER_URIS: [&str; 1] = ["urn:mock:server"];

// ---------------------------------------------------------------------------------------------
// Test codec - the UA-Binary codec is a collaborator, any self-describing encoding will do here
// ---------------------------------------------------------------------------------------------

struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &SupportedMessage) -> Result<Vec<u8>, StatusCode> {
        serde_json::to_vec(message).map_err(|_| StatusCode::BadEncodingError)
    }

    fn decode(&self, body: &[u8]) -> Result<SupportedMessage, StatusCode> {
        serde_json::from_slice(body).map_err(|_| StatusCode::BadDecodingError)
    }
}

// ---------------------------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------------------------

struct PairTransport {
    sender: Option<mpsc::Sender<TransportMessage>>,
    receiver: mpsc::Receiver<TransportMessage>,
}

#[async_trait]
impl Transport for PairTransport {
    async fn send(&mut self, message: TransportMessage) -> Result<(), StatusCode> {
        match &self.sender {
            None => Err(StatusCode::BadConnectionClosed),
            Some(sender) => sender
                .send(message)
                .await
                .map_err(|_| StatusCode::BadConnectionClosed),
        }
    }

    async fn receive(&mut self) -> Result<TransportMessage, StatusCode> {
        self.receiver
            .recv()
            .await
            .ok_or(StatusCode::BadConnectionClosed)
    }

    async fn close(&mut self) {
        self.sender = None;
        self.receiver.close();
    }
}

struct MockConnector {
    server: Arc<MockServer>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _endpoint_url: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn Transport>, StatusCode> {
        let (client_sender, server_receiver) = mpsc::channel(32);
        let (server_sender, client_receiver) = mpsc::channel(32);
        let server = self.server.clone();
        tokio::spawn(async move {
            server.serve(server_sender, server_receiver).await;
        });
        Ok(Box::new(PairTransport {
            sender: Some(client_sender),
            receiver: client_receiver,
        }))
    }
}

// ---------------------------------------------------------------------------------------------
// Scripted server
// ---------------------------------------------------------------------------------------------

#[derive(Default)]
struct ServerScript {
    /// Advertise only an anonymous token policy
    anonymous_only: bool,
    /// Return a different certificate in the CreateSession response than the endpoint's
    mismatched_session_certificate: bool,
    /// Answer the server array read with a bad status
    fail_server_array: bool,
    /// Swallow read requests without replying
    swallow_reads: bool,
}

/// What the server observed, for the assertions.
#[derive(Default)]
struct ServerLog {
    requests: Vec<&'static str>,
    decrypted_password: Option<Vec<u8>>,
    user_token_signature_algorithm: Option<String>,
    user_token_signature_valid: Option<bool>,
    client_signature_valid: Option<bool>,
}

struct MockServer {
    security_policy: SecurityPolicy,
    security_mode: MessageSecurityMode,
    certificate: X509,
    private_key: PrivateKey,
    script: ServerScript,
    codec: JsonCodec,
    log: Mutex<ServerLog>,
}

impl MockServer {
    fn new(
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
        script: ServerScript,
    ) -> Arc<MockServer> {
        let keypair = server_keypair();
        Arc::new(MockServer {
            security_policy,
            security_mode,
            certificate: keypair.0.clone(),
            private_key: keypair.1.clone(),
            script,
            codec: JsonCodec,
            log: Mutex::new(ServerLog::default()),
        })
    }

    fn requests(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().requests.clone()
    }

    fn endpoints(&self) -> Vec<EndpointDescription> {
        let user_identity_tokens = if self.script.anonymous_only {
            vec![token_policy("anonymous", UserTokenType::Anonymous)]
        } else {
            vec![
                token_policy("anonymous", UserTokenType::Anonymous),
                token_policy("username", UserTokenType::UserName),
                token_policy("x509", UserTokenType::Certificate),
                token_policy("issued", UserTokenType::IssuedToken),
            ]
        };
        vec![EndpointDescription {
            endpoint_url: UAString::from(ENDPOINT_URL),
            server: ApplicationDescription::default(),
            server_certificate: self.certificate.as_byte_string(),
            security_mode: self.security_mode,
            security_policy_uri: UAString::from(self.security_policy.to_uri()),
            user_identity_tokens: Some(user_identity_tokens),
            transport_profile_uri: UAString::null(),
            security_level: if self.security_policy == SecurityPolicy::None { 0 } else { 3 },
        }]
    }

    async fn serve(
        &self,
        sender: mpsc::Sender<TransportMessage>,
        mut receiver: mpsc::Receiver<TransportMessage>,
    ) {
        // HEL / ACK
        let Some(TransportMessage::Hello(hello)) = receiver.recv().await else {
            return;
        };
        let ack = AcknowledgeMessage {
            protocol_version: hello.protocol_version,
            receive_buffer_size: hello.send_buffer_size,
            send_buffer_size: hello.receive_buffer_size,
            max_message_size: hello.max_message_size,
            max_chunk_count: hello.max_chunk_count,
        };
        if sender.send(TransportMessage::Acknowledge(ack)).await.is_err() {
            return;
        }

        // Per connection session state
        let mut client_certificate: Option<X509> = None;
        let mut session_nonce: Vec<u8> = Vec::new();

        while let Some(message) = receiver.recv().await {
            let TransportMessage::Chunk(chunk) = message else {
                return;
            };
            match chunk.chunk_type {
                ChunkType::CloseSecureChannel => return,
                ChunkType::OpenSecureChannel => {
                    let Some(response) = self.handle_open(&chunk, &mut client_certificate) else {
                        return;
                    };
                    if sender.send(response).await.is_err() {
                        return;
                    }
                }
                ChunkType::Message => {
                    let Ok(request) = self.codec.decode(&chunk.body) else {
                        return;
                    };
                    self.log.lock().unwrap().requests.push(request.type_name());
                    let response = self.handle_service(
                        request,
                        &mut client_certificate,
                        &mut session_nonce,
                    );
                    let Some(response) = response else {
                        continue;
                    };
                    let Ok(body) = self.codec.encode(&response) else {
                        return;
                    };
                    let reply = TransportMessage::Chunk(MessageChunk {
                        chunk_type: ChunkType::Message,
                        secure_channel_id: 1,
                        security_header: SecurityHeader::Symmetric(SymmetricSecurityHeader {
                            token_id: 1,
                        }),
                        request_id: chunk.request_id,
                        body,
                    });
                    if sender.send(reply).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Unsecures the OPN request, verifies the client's signature when the policy calls for
    /// one, and produces a secured OPN response.
    fn handle_open(
        &self,
        chunk: &MessageChunk,
        client_certificate: &mut Option<X509>,
    ) -> Option<TransportMessage> {
        let SecurityHeader::Asymmetric(security_header) = &chunk.security_header else {
            return None;
        };
        // The discovery connection always opens with policy None, whatever the session
        // connection will negotiate - go by the header, not by this server's configuration
        let policy = SecurityPolicy::from_uri(security_header.security_policy_uri.as_ref());

        let body = if policy == SecurityPolicy::None {
            chunk.body.clone()
        } else {
            let sender_certificate =
                X509::from_byte_string(&security_header.sender_certificate).ok()?;
            let sender_key = sender_certificate.public_key().ok()?;

            let mut plain = vec![0u8; chunk.body.len()];
            let size = self
                .private_key
                .private_decrypt(
                    &chunk.body,
                    &mut plain,
                    policy.asymmetric_encryption_padding(),
                )
                .ok()?;
            plain.truncate(size);
            let signature_size = sender_key.size();
            if plain.len() <= signature_size {
                return None;
            }
            let (message, signature) = plain.split_at(plain.len() - signature_size);
            if !policy
                .asymmetric_verify_signature(&sender_key, message, signature)
                .ok()?
            {
                return None;
            }
            *client_certificate = Some(sender_certificate);
            message.to_vec()
        };

        let request = self.codec.decode(&body).ok()?;
        self.log.lock().unwrap().requests.push(request.type_name());
        let SupportedMessage::OpenSecureChannelRequest(request) = request else {
            return None;
        };

        let response: SupportedMessage = OpenSecureChannelResponse {
            response_header: ResponseHeader::new(&request.request_header, StatusCode::Good),
            server_protocol_version: 0,
            security_token: ChannelSecurityToken {
                channel_id: 1,
                token_id: 1,
                created_at: uasession::types::now(),
                revised_lifetime: request.requested_lifetime,
            },
            server_nonce: policy.random_nonce(),
        }
        .into();
        let body = self.codec.encode(&response).ok()?;

        let body = if policy == SecurityPolicy::None {
            body
        } else {
            let client_key = client_certificate.as_ref()?.public_key().ok()?;
            let signature = policy.asymmetric_sign(&self.private_key, &body).ok()?;
            let mut plain = body;
            plain.extend_from_slice(&signature);
            let padding = policy.asymmetric_encryption_padding();
            let mut cipher = vec![0u8; client_key.calculate_cipher_text_size(plain.len(), padding)];
            let size = policy
                .asymmetric_encrypt(&client_key, &plain, &mut cipher)
                .ok()?;
            cipher.truncate(size);
            cipher
        };

        Some(TransportMessage::Chunk(MessageChunk {
            chunk_type: ChunkType::OpenSecureChannel,
            secure_channel_id: 1,
            security_header: SecurityHeader::Asymmetric(AsymmetricSecurityHeader {
                security_policy_uri: UAString::from(policy.to_uri()),
                sender_certificate: self.certificate.as_byte_string(),
                receiver_certificate_thumbprint: ByteString::null(),
            }),
            request_id: chunk.request_id,
            body,
        }))
    }

    fn handle_service(
        &self,
        request: SupportedMessage,
        client_certificate: &mut Option<X509>,
        session_nonce: &mut Vec<u8>,
    ) -> Option<SupportedMessage> {
        match request {
            SupportedMessage::GetEndpointsRequest(request) => Some(
                GetEndpointsResponse {
                    response_header: ResponseHeader::new(&request.request_header, StatusCode::Good),
                    endpoints: Some(self.endpoints()),
                }
                .into(),
            ),
            SupportedMessage::CreateSessionRequest(request) => {
                if !request.client_certificate.is_empty() {
                    *client_certificate =
                        X509::from_byte_string(&request.client_certificate).ok();
                }
                *session_nonce = random::nonce().as_ref().to_vec();

                let server_certificate = if self.script.mismatched_session_certificate {
                    intruder_keypair().0.as_byte_string()
                } else {
                    self.certificate.as_byte_string()
                };
                let server_signature = if self.security_policy == SecurityPolicy::None {
                    SignatureData::null()
                } else {
                    create_signature_data(
                        &self.private_key,
                        self.security_policy,
                        &request.client_certificate,
                        &request.client_nonce,
                    )
                    .unwrap()
                };
                Some(
                    CreateSessionResponse {
                        response_header: ResponseHeader::new(
                            &request.request_header,
                            StatusCode::Good,
                        ),
                        session_id: NodeId::new(1, 42u32),
                        authentication_token: NodeId::new(0, "auth-token"),
                        revised_session_timeout: request.requested_session_timeout.min(30_000.0),
                        server_nonce: ByteString::from(session_nonce.as_slice()),
                        server_certificate,
                        server_endpoints: Some(self.endpoints()),
                        server_signature,
                        max_request_message_size: 8 * 1024 * 1024,
                    }
                    .into(),
                )
            }
            SupportedMessage::ActivateSessionRequest(request) => {
                let mut log = self.log.lock().unwrap();
                if self.security_policy != SecurityPolicy::None {
                    let valid = client_certificate.as_ref().map(|cert| {
                        verify_signature_data(
                            &request.client_signature,
                            self.security_policy,
                            cert,
                            &self.certificate.as_byte_string(),
                            &ByteString::from(session_nonce.as_slice()),
                        )
                        .is_ok()
                    });
                    log.client_signature_valid = valid;
                }
                match &request.user_identity_token {
                    UserIdentityToken::UserName(token) => {
                        if !token.encryption_algorithm.is_empty() {
                            log.decrypted_password = decrypt_token_secret(
                                &token.password,
                                &token.encryption_algorithm,
                                session_nonce,
                                &self.private_key,
                            )
                            .ok();
                        } else {
                            log.decrypted_password = Some(token.password.as_ref().to_vec());
                        }
                    }
                    UserIdentityToken::X509(token) => {
                        log.user_token_signature_algorithm =
                            Some(request.user_token_signature.algorithm.as_ref().to_string());
                        let valid = X509::from_byte_string(&token.certificate_data)
                            .ok()
                            .map(|user_cert| {
                                verify_signature_data(
                                    &request.user_token_signature,
                                    self.security_policy,
                                    &user_cert,
                                    &self.certificate.as_byte_string(),
                                    &ByteString::from(session_nonce.as_slice()),
                                )
                                .is_ok()
                            });
                        log.user_token_signature_valid = valid;
                    }
                    _ => {}
                }
                Some(
                    ActivateSessionResponse {
                        response_header: ResponseHeader::new(
                            &request.request_header,
                            StatusCode::Good,
                        ),
                        server_nonce: random::nonce(),
                        results: None,
                    }
                    .into(),
                )
            }
            SupportedMessage::ReadRequest(request) => {
                if self.script.swallow_reads {
                    return None;
                }
                let nodes = request.nodes_to_read.clone().unwrap_or_default();
                let results = nodes
                    .iter()
                    .map(|node| match &node.node_id.identifier {
                        Identifier::Numeric(variable_ids::SERVER_NAMESPACE_ARRAY) => {
                            DataValue::new(Variant::from(NAMESPACE_URIS.to_vec()))
                        }
                        Identifier::Numeric(variable_ids::SERVER_SERVER_ARRAY) => {
                            if self.script.fail_server_array {
                                DataValue::error(StatusCode::BadNotReadable)
                            } else {
                                DataValue::new(Variant::from(SERVER_URIS.to_vec()))
                            }
                        }
                        _ => DataValue::error(StatusCode::BadNodeIdUnknown),
                    })
                    .collect();
                Some(
                    ReadResponse {
                        response_header: ResponseHeader::new(
                            &request.request_header,
                            StatusCode::Good,
                        ),
                        results: Some(results),
                    }
                    .into(),
                )
            }
            SupportedMessage::CloseSessionRequest(request) => Some(
                CloseSessionResponse {
                    response_header: ResponseHeader::new(&request.request_header, StatusCode::Good),
                }
                .into(),
            ),
            request => Some(
                ServiceFault {
                    response_header: ResponseHeader::new(
                        &RequestHeader {
                            request_handle: request.request_handle(),
                            ..Default::default()
                        },
                        StatusCode::BadServiceUnsupported,
                    ),
                }
                .into(),
            ),
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Key material, generated once and shared across the tests
// ---------------------------------------------------------------------------------------------

fn make_keypair(common_name: &str) -> (X509, PrivateKey) {
    X509::cert_and_pkey(&X509Data {
        key_size: 1024,
        common_name: common_name.to_string(),
        organization: "tests".to_string(),
        application_uri: format!("urn:localhost:{}", common_name),
        alt_host_names: vec!["localhost".to_string()],
        certificate_duration_days: 1,
    })
    .unwrap()
}

fn server_keypair() -> &'static (X509, PrivateKey) {
    static KEYPAIR: OnceLock<(X509, PrivateKey)> = OnceLock::new();
    KEYPAIR.get_or_init(|| make_keypair("mock-server"))
}

fn client_keypair() -> &'static (X509, PrivateKey) {
    static KEYPAIR: OnceLock<(X509, PrivateKey)> = OnceLock::new();
    KEYPAIR.get_or_init(|| make_keypair("mock-client"))
}

fn user_keypair() -> &'static (X509, PrivateKey) {
    static KEYPAIR: OnceLock<(X509, PrivateKey)> = OnceLock::new();
    KEYPAIR.get_or_init(|| make_keypair("mock-user"))
}

fn intruder_keypair() -> &'static (X509, PrivateKey) {
    static KEYPAIR: OnceLock<(X509, PrivateKey)> = OnceLock::new();
    KEYPAIR.get_or_init(|| make_keypair("mock-intruder"))
}

fn token_policy(policy_id: &str, token_type: UserTokenType) -> UserTokenPolicy {
    UserTokenPolicy {
        policy_id: UAString::from(policy_id),
        token_type,
        issued_token_type: UAString::null(),
        issuer_endpoint_url: UAString::null(),
        security_policy_uri: UAString::null(),
    }
}

/// Writes a keypair to disk the way a deployment would reference it - DER certificate, PEM key.
fn write_keypair(dir: &tempdir::TempDir, name: &str, keypair: &(X509, PrivateKey)) -> (PathBuf, PathBuf) {
    let cert_path = dir.path().join(format!("{}.der", name));
    let key_path = dir.path().join(format!("{}.pem", name));
    std::fs::write(&cert_path, keypair.0.as_der()).unwrap();
    std::fs::write(&key_path, keypair.1.to_pem().unwrap()).unwrap();
    (cert_path, key_path)
}

fn test_builder() -> ClientBuilder {
    ClientBuilder::new(ENDPOINT_URL)
        .application_name("integration-test")
        .session_name("integration session")
        .timeout_hint(5_000)
        .insecure_skip_verify()
}

// ---------------------------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------------------------

/// S1 - anonymous dial against a None/None server, plus idempotent teardown.
#[tokio::test]
async fn none_none_anonymous() {
    let server = MockServer::new(
        SecurityPolicy::None,
        MessageSecurityMode::None,
        ServerScript::default(),
    );
    let client = test_builder()
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();
    let session = client.connect().await.unwrap();

    assert_eq!(session.security_policy_uri(), SecurityPolicy::None.to_uri());
    assert_eq!(session.security_mode(), MessageSecurityMode::None);
    assert!(!session.session_id().is_null());
    assert_eq!(session.session_timeout(), 30_000.0);
    assert_eq!(session.namespace_uris(), NAMESPACE_URIS.to_vec());
    assert_eq!(session.server_uris(), SERVER_URIS.to_vec());

    // Close succeeds, and doing it twice - or aborting afterwards - is harmless
    session.close().await.unwrap();
    session.close().await.unwrap();
    session.abort().await;

    // A request after close is refused at the session level
    let status = session
        .read(&[ReadValueId::value_of(NodeId::new(0, 2255))])
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BadSessionNotActivated);
}

/// S2 - user name identity over Basic256Sha256 / SignAndEncrypt. The scripted server decrypts
/// the password and validates the client's application signature with real RSA.
#[tokio::test]
async fn user_name_over_basic256sha256() {
    let server = MockServer::new(
        SecurityPolicy::Basic256Sha256,
        MessageSecurityMode::SignAndEncrypt,
        ServerScript::default(),
    );
    let dir = tempdir::TempDir::new("pki").unwrap();
    let (cert_path, key_path) = write_keypair(&dir, "client", client_keypair());

    let client = test_builder()
        .security_policy(
            SecurityPolicy::Basic256Sha256,
            MessageSecurityMode::SignAndEncrypt,
        )
        .client_certificate_paths(cert_path, key_path)
        .user_name_identity("root", "secret")
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();
    let session = client.connect().await.unwrap();

    assert_eq!(
        session.security_policy_uri(),
        SecurityPolicy::Basic256Sha256.to_uri()
    );
    assert_eq!(session.security_mode(), MessageSecurityMode::SignAndEncrypt);
    assert_eq!(session.max_request_message_size(), 8 * 1024 * 1024);
    assert_eq!(session.namespace_uris(), NAMESPACE_URIS.to_vec());

    {
        let log = server.log.lock().unwrap();
        assert_eq!(log.decrypted_password.as_deref(), Some(&b"secret"[..]));
        assert_eq!(log.client_signature_valid, Some(true));
    }
    session.close().await.unwrap();
}

/// S3 - X509 user identity over Aes256Sha256RsaPss. The user token signature must use the PSS
/// algorithm uri and verify over serverCertificate || serverNonce.
#[tokio::test]
async fn x509_identity_over_aes256sha256rsapss() {
    let server = MockServer::new(
        SecurityPolicy::Aes256Sha256RsaPss,
        MessageSecurityMode::SignAndEncrypt,
        ServerScript::default(),
    );
    let dir = tempdir::TempDir::new("pki").unwrap();
    let (cert_path, key_path) = write_keypair(&dir, "client", client_keypair());
    let (user_cert_path, user_key_path) = write_keypair(&dir, "user", user_keypair());

    let client = test_builder()
        .security_policy(
            SecurityPolicy::Aes256Sha256RsaPss,
            MessageSecurityMode::SignAndEncrypt,
        )
        .client_certificate_paths(cert_path, key_path)
        .x509_identity(user_cert_path, user_key_path)
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();
    let session = client.connect().await.unwrap();

    {
        let log = server.log.lock().unwrap();
        assert_eq!(
            log.user_token_signature_algorithm.as_deref(),
            Some(crypto::algorithms::DSIG_RSA_PSS_SHA256)
        );
        assert_eq!(log.user_token_signature_valid, Some(true));
        assert_eq!(log.client_signature_valid, Some(true));
    }
    session.close().await.unwrap();
}

/// S4 - the server advertises only anonymous token policies; a user name identity is rejected
/// before any ActivateSession is sent.
#[tokio::test]
async fn missing_token_policy_is_rejected() {
    let server = MockServer::new(
        SecurityPolicy::None,
        MessageSecurityMode::None,
        ServerScript {
            anonymous_only: true,
            ..Default::default()
        },
    );
    let client = test_builder()
        .user_name_identity("root", "secret")
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();
    let status = client.connect().await.unwrap_err();
    assert_eq!(status, StatusCode::BadIdentityTokenRejected);
    assert!(!server.requests().contains(&"ActivateSessionRequest"));
}

/// S5 - the certificate in the CreateSession response differs from the endpoint's; the
/// handshake aborts with BadCertificateInvalid and ActivateSession is never sent.
#[tokio::test]
async fn certificate_mismatch_aborts() {
    let server = MockServer::new(
        SecurityPolicy::None,
        MessageSecurityMode::None,
        ServerScript {
            mismatched_session_certificate: true,
            ..Default::default()
        },
    );
    let client = test_builder()
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();
    let status = client.connect().await.unwrap_err();
    assert_eq!(status, StatusCode::BadCertificateInvalid);
    let requests = server.requests();
    assert!(requests.contains(&"CreateSessionRequest"));
    assert!(!requests.contains(&"ActivateSessionRequest"));
}

/// S6 - a bad status on the server array read does not fail the dial; the namespace array that
/// did read well is applied.
#[tokio::test]
async fn namespace_bootstrap_tolerates_bad_reads() {
    let server = MockServer::new(
        SecurityPolicy::None,
        MessageSecurityMode::None,
        ServerScript {
            fail_server_array: true,
            ..Default::default()
        },
    );
    let client = test_builder()
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();
    let session = client.connect().await.unwrap();
    assert_eq!(session.namespace_uris(), NAMESPACE_URIS.to_vec());
    assert!(session.server_uris().is_empty());
    session.close().await.unwrap();
}

/// A server that never answers a request trips the local per-request timer.
#[tokio::test]
async fn unanswered_request_times_out() {
    let server = MockServer::new(
        SecurityPolicy::None,
        MessageSecurityMode::None,
        ServerScript {
            swallow_reads: true,
            ..Default::default()
        },
    );
    // The bootstrap read is also swallowed, so the dial itself must time out
    let client = test_builder()
        .timeout_hint(500)
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();
    let status = client.connect().await.unwrap_err();
    assert_eq!(status, StatusCode::BadTimeout);
}

/// Cancelling the external token mid-handshake abandons the operation.
#[tokio::test]
async fn cancellation_abandons_the_handshake() {
    let server = MockServer::new(
        SecurityPolicy::None,
        MessageSecurityMode::None,
        ServerScript {
            swallow_reads: true,
            ..Default::default()
        },
    );
    let cancel = tokio_util::sync::CancellationToken::new();
    let client = test_builder()
        .cancellation_token(cancel.clone())
        .client(
            Box::new(MockConnector {
                server: server.clone(),
            }),
            Arc::new(JsonCodec),
        )
        .unwrap();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });
    let status = client.connect().await.unwrap_err();
    assert_eq!(status, StatusCode::BadOperationAbandoned);
}
