// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides functions for parsing Urls from strings.

use url::Url;

use crate::types::StatusCode;

pub const OPC_TCP_SCHEME: &str = "opc.tcp";
pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;

fn opc_url_from_str(s: &str) -> Result<Url, StatusCode> {
    Url::parse(s).map_err(|_| {
        error!("Cannot parse url \"{}\"", s);
        StatusCode::BadTcpEndpointUrlInvalid
    })
}

/// Tests if this url is an opc.tcp url with the binary transport.
pub fn is_opc_ua_binary_url(url: &str) -> bool {
    match opc_url_from_str(url) {
        Ok(url) => url.scheme() == OPC_TCP_SCHEME,
        Err(_) => false,
    }
}

/// The host name from the url, used to validate the server certificate against the host
/// actually connected to.
pub fn hostname_from_url(url: &str) -> Result<String, StatusCode> {
    let url = opc_url_from_str(url)?;
    match url.host_str() {
        Some(host) => Ok(host.to_string()),
        None => {
            error!("Url \"{}\" has no host name", url);
            Err(StatusCode::BadTcpEndpointUrlInvalid)
        }
    }
}

pub fn hostname_port_from_url(url: &str, default_port: u16) -> Result<(String, u16), StatusCode> {
    let hostname = hostname_from_url(url)?;
    let port = opc_url_from_str(url)?.port().unwrap_or(default_port);
    Ok((hostname, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_url() {
        assert!(is_opc_ua_binary_url("opc.tcp://localhost:4855/"));
        assert!(is_opc_ua_binary_url("opc.tcp://localhost:4855/some/path"));
        assert!(!is_opc_ua_binary_url("http://localhost:4855/"));
        assert!(!is_opc_ua_binary_url("not a url"));
    }

    #[test]
    fn hostname() {
        assert_eq!(hostname_from_url("opc.tcp://mango:4855/x").unwrap(), "mango");
        assert_eq!(
            hostname_port_from_url("opc.tcp://mango/x", DEFAULT_OPC_UA_SERVER_PORT).unwrap(),
            ("mango".to_string(), 4840)
        );
        assert!(hostname_from_url("nonsense").is_err());
    }
}
