// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Service types for the discovery, secure channel and session services, and the supporting
//! enumerations and structures they carry.

use crate::types::{
    variant::DataValue, ByteString, DateTime, DiagnosticBits, LocalizedText, NodeId, StatusCode,
    UAString,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum MessageSecurityMode {
    Invalid = 0,
    None = 1,
    Sign = 2,
    SignAndEncrypt = 3,
}

impl Default for MessageSecurityMode {
    fn default() -> Self {
        MessageSecurityMode::Invalid
    }
}

impl From<&str> for MessageSecurityMode {
    fn from(value: &str) -> Self {
        match value {
            "None" => MessageSecurityMode::None,
            "Sign" => MessageSecurityMode::Sign,
            "SignAndEncrypt" => MessageSecurityMode::SignAndEncrypt,
            _ => MessageSecurityMode::Invalid,
        }
    }
}

impl From<MessageSecurityMode> for &'static str {
    fn from(value: MessageSecurityMode) -> Self {
        match value {
            MessageSecurityMode::None => "None",
            MessageSecurityMode::Sign => "Sign",
            MessageSecurityMode::SignAndEncrypt => "SignAndEncrypt",
            MessageSecurityMode::Invalid => "Invalid",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ApplicationType {
    Server = 0,
    Client = 1,
    ClientAndServer = 2,
    DiscoveryServer = 3,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum UserTokenType {
    Anonymous = 0,
    UserName = 1,
    Certificate = 2,
    IssuedToken = 3,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum SecurityTokenRequestType {
    Issue = 0,
    Renew = 1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum TimestampsToReturn {
    Source = 0,
    Server = 1,
    Both = 2,
    Neither = 3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescription {
    pub application_uri: UAString,
    pub product_uri: UAString,
    pub application_name: LocalizedText,
    pub application_type: ApplicationType,
    pub gateway_server_uri: UAString,
    pub discovery_profile_uri: UAString,
    pub discovery_urls: Option<Vec<UAString>>,
}

impl Default for ApplicationDescription {
    fn default() -> Self {
        ApplicationDescription {
            application_uri: UAString::null(),
            product_uri: UAString::null(),
            application_name: LocalizedText::null(),
            application_type: ApplicationType::Client,
            gateway_server_uri: UAString::null(),
            discovery_profile_uri: UAString::null(),
            discovery_urls: None,
        }
    }
}

/// A server advertised rule describing which identity token types are acceptable on an endpoint
/// and under which security policy they must be protected. An empty `security_policy_uri` means
/// "inherit the channel's policy".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTokenPolicy {
    pub policy_id: UAString,
    pub token_type: UserTokenType,
    pub issued_token_type: UAString,
    pub issuer_endpoint_url: UAString,
    pub security_policy_uri: UAString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescription {
    pub endpoint_url: UAString,
    pub server: ApplicationDescription,
    pub server_certificate: ByteString,
    pub security_mode: MessageSecurityMode,
    pub security_policy_uri: UAString,
    pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
    pub transport_profile_uri: UAString,
    pub security_level: u8,
}

impl EndpointDescription {
    /// Finds the first user token policy on the endpoint with the given token type, which is the
    /// order of preference the server advertised.
    pub fn find_policy(&self, token_type: UserTokenType) -> Option<&UserTokenPolicy> {
        self.user_identity_tokens
            .as_ref()?
            .iter()
            .find(|t| t.token_type == token_type)
    }
}

/// A signature and the URI of the algorithm that produced it. The null value (both fields null)
/// is carried when the security policy requires no signature.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignatureData {
    pub algorithm: UAString,
    pub signature: ByteString,
}

impl SignatureData {
    pub fn null() -> SignatureData {
        SignatureData {
            algorithm: UAString::null(),
            signature: ByteString::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.algorithm.is_null() && self.signature.is_null()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSecurityToken {
    pub channel_id: u32,
    pub token_id: u32,
    pub created_at: DateTime,
    pub revised_lifetime: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub authentication_token: NodeId,
    pub timestamp: DateTime,
    pub request_handle: u32,
    pub return_diagnostics: DiagnosticBits,
    pub audit_entry_id: UAString,
    pub timeout_hint: u32,
}

impl Default for RequestHeader {
    fn default() -> Self {
        RequestHeader {
            authentication_token: NodeId::null(),
            timestamp: crate::types::now(),
            request_handle: 0,
            return_diagnostics: DiagnosticBits::empty(),
            audit_entry_id: UAString::null(),
            timeout_hint: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub timestamp: DateTime,
    pub request_handle: u32,
    pub service_result: StatusCode,
    pub string_table: Option<Vec<UAString>>,
}

impl ResponseHeader {
    pub fn new(request_header: &RequestHeader, service_result: StatusCode) -> ResponseHeader {
        ResponseHeader {
            timestamp: crate::types::now(),
            request_handle: request_header.request_handle,
            service_result,
            string_table: None,
        }
    }
}

// User identity tokens. The protocol carries these as extension objects; here they form a closed
// sum so the builder's case analysis is exhaustive at compile time.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousIdentityToken {
    pub policy_id: UAString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNameIdentityToken {
    pub policy_id: UAString,
    pub user_name: UAString,
    /// Password bytes - plaintext under policy `None`, otherwise ciphertext produced per the
    /// `encryption_algorithm`.
    pub password: ByteString,
    pub encryption_algorithm: UAString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct X509IdentityToken {
    pub policy_id: UAString,
    pub certificate_data: ByteString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedIdentityToken {
    pub policy_id: UAString,
    pub token_data: ByteString,
    pub encryption_algorithm: UAString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserIdentityToken {
    Anonymous(AnonymousIdentityToken),
    UserName(UserNameIdentityToken),
    X509(X509IdentityToken),
    Issued(IssuedIdentityToken),
}

impl UserIdentityToken {
    pub fn policy_id(&self) -> &UAString {
        match self {
            UserIdentityToken::Anonymous(t) => &t.policy_id,
            UserIdentityToken::UserName(t) => &t.policy_id,
            UserIdentityToken::X509(t) => &t.policy_id,
            UserIdentityToken::Issued(t) => &t.policy_id,
        }
    }
}

// Discovery service

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetEndpointsRequest {
    pub request_header: RequestHeader,
    pub endpoint_url: UAString,
    pub locale_ids: Option<Vec<UAString>>,
    pub profile_uris: Option<Vec<UAString>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetEndpointsResponse {
    pub response_header: ResponseHeader,
    pub endpoints: Option<Vec<EndpointDescription>>,
}

// Secure channel service

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSecureChannelRequest {
    pub request_header: RequestHeader,
    pub client_protocol_version: u32,
    pub request_type: SecurityTokenRequestType,
    pub security_mode: MessageSecurityMode,
    pub client_nonce: ByteString,
    pub requested_lifetime: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSecureChannelResponse {
    pub response_header: ResponseHeader,
    pub server_protocol_version: u32,
    pub security_token: ChannelSecurityToken,
    pub server_nonce: ByteString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseSecureChannelRequest {
    pub request_header: RequestHeader,
}

// Session service

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub request_header: RequestHeader,
    pub client_description: ApplicationDescription,
    pub server_uri: UAString,
    pub endpoint_url: UAString,
    pub session_name: UAString,
    pub client_nonce: ByteString,
    pub client_certificate: ByteString,
    pub requested_session_timeout: f64,
    pub max_response_message_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub response_header: ResponseHeader,
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    pub revised_session_timeout: f64,
    pub server_nonce: ByteString,
    pub server_certificate: ByteString,
    pub server_endpoints: Option<Vec<EndpointDescription>>,
    pub server_signature: SignatureData,
    pub max_request_message_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateSessionRequest {
    pub request_header: RequestHeader,
    pub client_signature: SignatureData,
    pub client_software_certificates: Option<Vec<ByteString>>,
    pub locale_ids: Option<Vec<UAString>>,
    pub user_identity_token: UserIdentityToken,
    pub user_token_signature: SignatureData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateSessionResponse {
    pub response_header: ResponseHeader,
    pub server_nonce: ByteString,
    pub results: Option<Vec<StatusCode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseSessionRequest {
    pub request_header: RequestHeader,
    pub delete_subscriptions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    pub response_header: ResponseHeader,
}

// Attribute service

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: UAString,
    pub data_encoding: UAString,
}

impl ReadValueId {
    /// A read of the `Value` attribute of a node.
    pub fn value_of(node_id: NodeId) -> ReadValueId {
        ReadValueId {
            node_id,
            attribute_id: crate::types::AttributeId::Value as u32,
            index_range: UAString::null(),
            data_encoding: UAString::null(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub request_header: RequestHeader,
    pub max_age: f64,
    pub timestamps_to_return: TimestampsToReturn,
    pub nodes_to_read: Option<Vec<ReadValueId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<DataValue>>,
}

/// The generic failure response a server sends when a service call fails as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}
