// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Selects the endpoint to connect to from the set the server advertises.

use crate::crypto::security_policy::{
    SecurityPolicy, SECURITY_POLICY_NONE_URI, SECURITY_POLICY_URI_BEST_AVAILABLE,
};
use crate::types::{EndpointDescription, MessageSecurityMode, StatusCode};

/// What the caller asked for. An empty policy uri matches any policy; the best-available
/// sentinel defers to what the server offers. `MessageSecurityMode::Invalid` matches any mode.
#[derive(Debug, Clone)]
pub struct EndpointPreference {
    pub security_policy_uri: String,
    pub security_mode: MessageSecurityMode,
    /// Whether a client certificate is configured - without one only policy `None` is usable
    pub has_client_certificate: bool,
}

/// Picks the first endpoint compatible with the preference.
///
/// Endpoints are ordered by `security_level` ascending before scanning. The ordering contract
/// here is that the `None` endpoint sorts first when present, which together with the
/// best-available coercion below means a client without a certificate lands on `None`/`None`.
/// It also means the weakest endpoint that fits an explicit filter wins when a server
/// advertises several matching levels.
pub fn select_endpoint(
    endpoints: &[EndpointDescription],
    preference: &EndpointPreference,
) -> Result<EndpointDescription, StatusCode> {
    let mut ordered: Vec<&EndpointDescription> = endpoints.iter().collect();
    ordered.sort_by_key(|e| e.security_level);

    // A client without a certificate cannot complete any secured handshake, so best available
    // degrades to None/None before matching.
    let (security_policy_uri, security_mode) = if preference.security_policy_uri
        == SECURITY_POLICY_URI_BEST_AVAILABLE
        && !preference.has_client_certificate
    {
        (
            SECURITY_POLICY_NONE_URI.to_string(),
            MessageSecurityMode::None,
        )
    } else if preference.security_policy_uri == SECURITY_POLICY_URI_BEST_AVAILABLE {
        (String::new(), preference.security_mode)
    } else {
        (
            preference.security_policy_uri.clone(),
            preference.security_mode,
        )
    };

    let selected = ordered.into_iter().find(|e| {
        if !SecurityPolicy::is_recognized_uri(e.security_policy_uri.as_ref()) {
            return false;
        }
        (security_policy_uri.is_empty() || e.security_policy_uri.as_ref() == security_policy_uri)
            && (security_mode == MessageSecurityMode::Invalid
                || e.security_mode == security_mode)
    });

    match selected {
        Some(endpoint) => {
            debug!(
                "Selected endpoint {} with {} / {:?}",
                endpoint.endpoint_url, endpoint.security_policy_uri, endpoint.security_mode
            );
            Ok(endpoint.clone())
        }
        None => {
            error!(
                "No advertised endpoint matches policy \"{}\" and mode {:?}",
                security_policy_uri, security_mode
            );
            Err(StatusCode::BadSecurityModeRejected)
        }
    }
}
