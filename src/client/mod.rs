// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The client module wires the crate's components into the session establishment pipeline and
//! exposes the connected [`Session`] surface.

mod builder;
mod client;
pub mod config;
mod endpoint;
mod session;

pub use builder::ClientBuilder;
pub use client::Client;
pub use config::ClientConfig;
pub use endpoint::{select_endpoint, EndpointPreference};
pub use session::{Session, SessionState};

use std::path::PathBuf;

use crate::types::{ByteString, ResponseHeader, StatusCode, SupportedMessage};

/// The user identity the client will present in `ActivateSession`, as configured. Certificate
/// material is referenced by path and loaded when the session is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdentityToken {
    /// No identity, the session is anonymous.
    Anonymous,
    /// User name and password.
    UserName(String, String),
    /// X509 certificate and private key paths.
    X509(PathBuf, PathBuf),
    /// An externally issued token, e.g. OAuth, carried opaquely.
    IssuedToken(ByteString),
}

impl Default for IdentityToken {
    fn default() -> Self {
        IdentityToken::Anonymous
    }
}

/// Process the service result, i.e. where the request "succeeded" but the response header
/// contains a failure status code. Uncertain results pass - the channel surfaces them to the
/// caller verbatim.
pub(crate) fn process_service_result(response_header: &ResponseHeader) -> Result<(), StatusCode> {
    if response_header.service_result.is_bad() {
        info!(
            "Received a bad service result {} from the request",
            response_header.service_result
        );
        Err(response_header.service_result)
    } else {
        Ok(())
    }
}

pub(crate) fn process_unexpected_response(response: SupportedMessage) -> StatusCode {
    match response {
        SupportedMessage::ServiceFault(service_fault) => {
            error!(
                "Received a service fault of {} for the request",
                service_fault.response_header.service_result
            );
            service_fault.response_header.service_result
        }
        _ => {
            error!("Received an unexpected response to the request");
            StatusCode::BadUnknownResponse
        }
    }
}
