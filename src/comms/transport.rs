// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The transport seam and the frame types that pass through it.
//!
//! A [`Connector`] dials an endpoint url and yields a [`Transport`]. The transport owns the
//! socket loop and the UA TCP framing - the 8 byte `HEL`/`ACK`/`OPN`/`MSG`/`CLO`/`ERR` chunk
//! headers, splitting outgoing messages into chunks and reassembling incoming ones - so what
//! crosses this seam are whole, typed frames.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{ByteString, StatusCode, UAString};

/// The transport profile this client speaks, sent as the profile filter of `GetEndpoints`.
pub const TRANSPORT_PROFILE_URI_BINARY: &str =
    "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";

/// The UA TCP protocol version in `Hello`.
pub const PROTOCOL_VERSION: u32 = 0;

/// Implementation of the HEL message - the client's buffer / message / chunk limits and the
/// endpoint url it is connecting to.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    pub endpoint_url: UAString,
}

/// Implementation of the ACK message - the server's revision of the limits.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

/// Implementation of the ERR message.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub error: StatusCode,
    pub reason: UAString,
}

/// The secured chunk kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChunkType {
    /// OPN - asymmetrically secured `OpenSecureChannel`
    OpenSecureChannel,
    /// MSG - symmetrically secured service message
    Message,
    /// CLO - symmetrically secured `CloseSecureChannel`
    CloseSecureChannel,
}

/// The security header of an OPN chunk. The sender's certificate travels in full; the intended
/// receiver is addressed by certificate thumbprint.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymmetricSecurityHeader {
    pub security_policy_uri: UAString,
    pub sender_certificate: ByteString,
    pub receiver_certificate_thumbprint: ByteString,
}

impl AsymmetricSecurityHeader {
    pub fn none() -> AsymmetricSecurityHeader {
        AsymmetricSecurityHeader {
            security_policy_uri: UAString::from(
                crate::crypto::security_policy::SECURITY_POLICY_NONE_URI,
            ),
            sender_certificate: ByteString::null(),
            receiver_certificate_thumbprint: ByteString::null(),
        }
    }
}

/// The security header of MSG / CLO chunks, identifying the symmetric token securing them.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricSecurityHeader {
    pub token_id: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SecurityHeader {
    Asymmetric(AsymmetricSecurityHeader),
    Symmetric(SymmetricSecurityHeader),
}

/// A whole secured message as it crosses the transport seam - chunk splitting and reassembly
/// happen below it.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunk {
    pub chunk_type: ChunkType,
    pub secure_channel_id: u32,
    pub security_header: SecurityHeader,
    /// Assigned by the channel in the order requests enter it; responses carry the id of the
    /// request they answer.
    pub request_id: u32,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportMessage {
    Hello(HelloMessage),
    Acknowledge(AcknowledgeMessage),
    Error(ErrorMessage),
    Chunk(MessageChunk),
}

/// One established connection. `send` and `receive` may suspend; `receive` must be cancel safe
/// because the channel selects over it.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: TransportMessage) -> Result<(), StatusCode>;
    async fn receive(&mut self) -> Result<TransportMessage, StatusCode>;
    async fn close(&mut self);
}

/// Dials endpoint urls. Connect failures surface as `BadConnectionClosed` or
/// `BadTcpEndpointUrlInvalid`; the channel enforces the connect timeout around this call.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint_url: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Transport>, StatusCode>;
}
