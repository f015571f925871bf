// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Defines the `SupportedMessage` enum - the closed set of service messages the client can send
//! or receive over a channel.

use crate::types::service_types::*;

/// Implements the message enum, `From` conversions for each message type and the accessors that
/// need to reach into every variant.
macro_rules! supported_messages {
    ($($x:ident),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum SupportedMessage {
            /// A message the decoder did not recognize
            Invalid,
            $( $x(Box<$x>), )*
        }

        $(
            impl From<$x> for SupportedMessage {
                fn from(value: $x) -> Self {
                    SupportedMessage::$x(Box::new(value))
                }
            }
        )*
    };
}

supported_messages![
    // Secure channel service
    OpenSecureChannelRequest,
    OpenSecureChannelResponse,
    CloseSecureChannelRequest,
    // Discovery service
    GetEndpointsRequest,
    GetEndpointsResponse,
    // Session service
    CreateSessionRequest,
    CreateSessionResponse,
    ActivateSessionRequest,
    ActivateSessionResponse,
    CloseSessionRequest,
    CloseSessionResponse,
    // Attribute service
    ReadRequest,
    ReadResponse,
    // Failure
    ServiceFault,
];

impl SupportedMessage {
    /// The request handle from the message's request or response header. Invalid messages
    /// yield 0, which is never a valid handle.
    pub fn request_handle(&self) -> u32 {
        match self {
            SupportedMessage::Invalid => 0,
            SupportedMessage::OpenSecureChannelRequest(v) => v.request_header.request_handle,
            SupportedMessage::OpenSecureChannelResponse(v) => v.response_header.request_handle,
            SupportedMessage::CloseSecureChannelRequest(v) => v.request_header.request_handle,
            SupportedMessage::GetEndpointsRequest(v) => v.request_header.request_handle,
            SupportedMessage::GetEndpointsResponse(v) => v.response_header.request_handle,
            SupportedMessage::CreateSessionRequest(v) => v.request_header.request_handle,
            SupportedMessage::CreateSessionResponse(v) => v.response_header.request_handle,
            SupportedMessage::ActivateSessionRequest(v) => v.request_header.request_handle,
            SupportedMessage::ActivateSessionResponse(v) => v.response_header.request_handle,
            SupportedMessage::CloseSessionRequest(v) => v.request_header.request_handle,
            SupportedMessage::CloseSessionResponse(v) => v.response_header.request_handle,
            SupportedMessage::ReadRequest(v) => v.request_header.request_handle,
            SupportedMessage::ReadResponse(v) => v.response_header.request_handle,
            SupportedMessage::ServiceFault(v) => v.response_header.request_handle,
        }
    }

    /// A short name for trace logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            SupportedMessage::Invalid => "Invalid",
            SupportedMessage::OpenSecureChannelRequest(_) => "OpenSecureChannelRequest",
            SupportedMessage::OpenSecureChannelResponse(_) => "OpenSecureChannelResponse",
            SupportedMessage::CloseSecureChannelRequest(_) => "CloseSecureChannelRequest",
            SupportedMessage::GetEndpointsRequest(_) => "GetEndpointsRequest",
            SupportedMessage::GetEndpointsResponse(_) => "GetEndpointsResponse",
            SupportedMessage::CreateSessionRequest(_) => "CreateSessionRequest",
            SupportedMessage::CreateSessionResponse(_) => "CreateSessionResponse",
            SupportedMessage::ActivateSessionRequest(_) => "ActivateSessionRequest",
            SupportedMessage::ActivateSessionResponse(_) => "ActivateSessionResponse",
            SupportedMessage::CloseSessionRequest(_) => "CloseSessionRequest",
            SupportedMessage::CloseSessionResponse(_) => "CloseSessionResponse",
            SupportedMessage::ReadRequest(_) => "ReadRequest",
            SupportedMessage::ReadResponse(_) => "ReadResponse",
            SupportedMessage::ServiceFault(_) => "ServiceFault",
        }
    }
}
