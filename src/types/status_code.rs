// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the `StatusCode` type - the 32-bit OPC UA status code catalogue, reduced to the
//! codes the client side distinguishes. Values are the standard values from the OPC UA
//! status code CSV.

use std::{error::Error, fmt};

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

/// A 32-bit status code. The top two bits hold the severity - `00` Good, `01` Uncertain,
/// `10` Bad - and the remaining bits identify the condition. Unrecognized codes received from a
/// server are carried verbatim.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatusCode(u32);

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Good
    }
}

#[allow(non_upper_case_globals)]
impl StatusCode {
    pub const Good: StatusCode = StatusCode(0x0000_0000);
    pub const Uncertain: StatusCode = StatusCode(0x4000_0000);
    pub const Bad: StatusCode = StatusCode(0x8000_0000);

    pub const BadUnexpectedError: StatusCode = StatusCode(0x8001_0000);
    pub const BadInternalError: StatusCode = StatusCode(0x8002_0000);
    pub const BadOutOfMemory: StatusCode = StatusCode(0x8003_0000);
    pub const BadCommunicationError: StatusCode = StatusCode(0x8005_0000);
    pub const BadEncodingError: StatusCode = StatusCode(0x8006_0000);
    pub const BadDecodingError: StatusCode = StatusCode(0x8007_0000);
    pub const BadUnknownResponse: StatusCode = StatusCode(0x8009_0000);
    pub const BadTimeout: StatusCode = StatusCode(0x800A_0000);
    pub const BadServiceUnsupported: StatusCode = StatusCode(0x800B_0000);
    pub const BadNothingToDo: StatusCode = StatusCode(0x800F_0000);
    pub const BadTooManyOperations: StatusCode = StatusCode(0x8010_0000);
    pub const BadCertificateInvalid: StatusCode = StatusCode(0x8012_0000);
    pub const BadSecurityChecksFailed: StatusCode = StatusCode(0x8013_0000);
    pub const BadCertificateTimeInvalid: StatusCode = StatusCode(0x8014_0000);
    pub const BadCertificateHostNameInvalid: StatusCode = StatusCode(0x8016_0000);
    pub const BadCertificateUriInvalid: StatusCode = StatusCode(0x8017_0000);
    pub const BadCertificateUntrusted: StatusCode = StatusCode(0x801A_0000);
    pub const BadCertificateRevocationUnknown: StatusCode = StatusCode(0x801B_0000);
    pub const BadCertificateRevoked: StatusCode = StatusCode(0x801D_0000);
    pub const BadUserAccessDenied: StatusCode = StatusCode(0x801F_0000);
    pub const BadIdentityTokenInvalid: StatusCode = StatusCode(0x8020_0000);
    pub const BadIdentityTokenRejected: StatusCode = StatusCode(0x8021_0000);
    pub const BadSecureChannelIdInvalid: StatusCode = StatusCode(0x8022_0000);
    pub const BadNonceInvalid: StatusCode = StatusCode(0x8024_0000);
    pub const BadSessionIdInvalid: StatusCode = StatusCode(0x8025_0000);
    pub const BadSessionClosed: StatusCode = StatusCode(0x8026_0000);
    pub const BadSessionNotActivated: StatusCode = StatusCode(0x8027_0000);
    pub const BadRequestHeaderInvalid: StatusCode = StatusCode(0x802A_0000);
    pub const BadNodeIdInvalid: StatusCode = StatusCode(0x8033_0000);
    pub const BadNodeIdUnknown: StatusCode = StatusCode(0x8034_0000);
    pub const BadAttributeIdInvalid: StatusCode = StatusCode(0x8035_0000);
    pub const BadNotReadable: StatusCode = StatusCode(0x803A_0000);
    pub const BadInvalidArgument: StatusCode = StatusCode(0x80AB_0000);
    pub const BadApplicationSignatureInvalid: StatusCode = StatusCode(0x8058_0000);
    pub const BadUserSignatureInvalid: StatusCode = StatusCode(0x8059_0000);
    pub const BadTcpServerTooBusy: StatusCode = StatusCode(0x807D_0000);
    pub const BadTcpMessageTypeInvalid: StatusCode = StatusCode(0x807E_0000);
    pub const BadTcpSecureChannelUnknown: StatusCode = StatusCode(0x807F_0000);
    pub const BadTcpMessageTooLarge: StatusCode = StatusCode(0x8080_0000);
    pub const BadTcpInternalError: StatusCode = StatusCode(0x8082_0000);
    pub const BadTcpEndpointUrlInvalid: StatusCode = StatusCode(0x8083_0000);
    pub const BadRequestInterrupted: StatusCode = StatusCode(0x8084_0000);
    pub const BadRequestTimeout: StatusCode = StatusCode(0x8085_0000);
    pub const BadSecureChannelClosed: StatusCode = StatusCode(0x8086_0000);
    pub const BadSecureChannelTokenUnknown: StatusCode = StatusCode(0x8087_0000);
    pub const BadSequenceNumberInvalid: StatusCode = StatusCode(0x8088_0000);
    pub const BadConfigurationError: StatusCode = StatusCode(0x8089_0000);
    pub const BadNotConnected: StatusCode = StatusCode(0x808A_0000);
    pub const BadConnectionClosed: StatusCode = StatusCode(0x80AE_0000);
    pub const BadInvalidState: StatusCode = StatusCode(0x80AF_0000);
    pub const BadEndOfStream: StatusCode = StatusCode(0x80B0_0000);
    pub const BadOperationAbandoned: StatusCode = StatusCode(0x80B3_0000);
    pub const BadSecurityModeRejected: StatusCode = StatusCode(0x80E7_0000);
    pub const BadSecurityPolicyRejected: StatusCode = StatusCode(0x80E8_0000);
    pub const BadCertificateChainIncomplete: StatusCode = StatusCode(0x810D_0000);

    const SEVERITY_MASK: u32 = 0xC000_0000;
    const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
    const SEVERITY_BAD: u32 = 0x8000_0000;

    pub fn from_u32(value: u32) -> StatusCode {
        StatusCode(value)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == Self::SEVERITY_BAD
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == Self::SEVERITY_UNCERTAIN
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }

    /// The symbolic name of the code, or `"Unknown"` for codes outside the subset this crate
    /// recognizes. Unknown codes still compare and carry their value.
    pub fn name(&self) -> &'static str {
        match *self {
            StatusCode::Good => "Good",
            StatusCode::Uncertain => "Uncertain",
            StatusCode::Bad => "Bad",
            StatusCode::BadUnexpectedError => "BadUnexpectedError",
            StatusCode::BadInternalError => "BadInternalError",
            StatusCode::BadOutOfMemory => "BadOutOfMemory",
            StatusCode::BadCommunicationError => "BadCommunicationError",
            StatusCode::BadEncodingError => "BadEncodingError",
            StatusCode::BadDecodingError => "BadDecodingError",
            StatusCode::BadUnknownResponse => "BadUnknownResponse",
            StatusCode::BadTimeout => "BadTimeout",
            StatusCode::BadServiceUnsupported => "BadServiceUnsupported",
            StatusCode::BadNothingToDo => "BadNothingToDo",
            StatusCode::BadTooManyOperations => "BadTooManyOperations",
            StatusCode::BadCertificateInvalid => "BadCertificateInvalid",
            StatusCode::BadSecurityChecksFailed => "BadSecurityChecksFailed",
            StatusCode::BadCertificateTimeInvalid => "BadCertificateTimeInvalid",
            StatusCode::BadCertificateHostNameInvalid => "BadCertificateHostNameInvalid",
            StatusCode::BadCertificateUriInvalid => "BadCertificateUriInvalid",
            StatusCode::BadCertificateUntrusted => "BadCertificateUntrusted",
            StatusCode::BadCertificateRevocationUnknown => "BadCertificateRevocationUnknown",
            StatusCode::BadCertificateRevoked => "BadCertificateRevoked",
            StatusCode::BadUserAccessDenied => "BadUserAccessDenied",
            StatusCode::BadIdentityTokenInvalid => "BadIdentityTokenInvalid",
            StatusCode::BadIdentityTokenRejected => "BadIdentityTokenRejected",
            StatusCode::BadSecureChannelIdInvalid => "BadSecureChannelIdInvalid",
            StatusCode::BadNonceInvalid => "BadNonceInvalid",
            StatusCode::BadSessionIdInvalid => "BadSessionIdInvalid",
            StatusCode::BadSessionClosed => "BadSessionClosed",
            StatusCode::BadSessionNotActivated => "BadSessionNotActivated",
            StatusCode::BadRequestHeaderInvalid => "BadRequestHeaderInvalid",
            StatusCode::BadNodeIdInvalid => "BadNodeIdInvalid",
            StatusCode::BadNodeIdUnknown => "BadNodeIdUnknown",
            StatusCode::BadAttributeIdInvalid => "BadAttributeIdInvalid",
            StatusCode::BadNotReadable => "BadNotReadable",
            StatusCode::BadInvalidArgument => "BadInvalidArgument",
            StatusCode::BadApplicationSignatureInvalid => "BadApplicationSignatureInvalid",
            StatusCode::BadUserSignatureInvalid => "BadUserSignatureInvalid",
            StatusCode::BadTcpServerTooBusy => "BadTcpServerTooBusy",
            StatusCode::BadTcpMessageTypeInvalid => "BadTcpMessageTypeInvalid",
            StatusCode::BadTcpSecureChannelUnknown => "BadTcpSecureChannelUnknown",
            StatusCode::BadTcpMessageTooLarge => "BadTcpMessageTooLarge",
            StatusCode::BadTcpInternalError => "BadTcpInternalError",
            StatusCode::BadTcpEndpointUrlInvalid => "BadTcpEndpointUrlInvalid",
            StatusCode::BadRequestInterrupted => "BadRequestInterrupted",
            StatusCode::BadRequestTimeout => "BadRequestTimeout",
            StatusCode::BadSecureChannelClosed => "BadSecureChannelClosed",
            StatusCode::BadSecureChannelTokenUnknown => "BadSecureChannelTokenUnknown",
            StatusCode::BadSequenceNumberInvalid => "BadSequenceNumberInvalid",
            StatusCode::BadConfigurationError => "BadConfigurationError",
            StatusCode::BadNotConnected => "BadNotConnected",
            StatusCode::BadConnectionClosed => "BadConnectionClosed",
            StatusCode::BadInvalidState => "BadInvalidState",
            StatusCode::BadEndOfStream => "BadEndOfStream",
            StatusCode::BadOperationAbandoned => "BadOperationAbandoned",
            StatusCode::BadSecurityModeRejected => "BadSecurityModeRejected",
            StatusCode::BadSecurityPolicyRejected => "BadSecurityPolicyRejected",
            StatusCode::BadCertificateChainIncomplete => "BadCertificateChainIncomplete",
            _ => "Unknown",
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if name == "Unknown" {
            write!(f, "StatusCode({:#010x})", self.0)
        } else {
            write!(f, "{}", name)
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Error for StatusCode {}

// Serialize / Deserialize pass the raw 32-bit value through, as the wire encoding does.

impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

struct StatusCodeVisitor;

impl<'de> Visitor<'de> for StatusCodeVisitor {
    type Value = u32;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an unsigned 32-bit integer")
    }

    fn visit_u32<E>(self, value: u32) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value as u32)
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_u32(StatusCodeVisitor)
            .map(StatusCode::from_u32)
    }
}

#[cfg(test)]
mod tests {
    use super::StatusCode;

    #[test]
    fn severity_bits() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(!StatusCode::Good.is_uncertain());

        assert!(StatusCode::BadDecodingError.is_bad());
        assert!(!StatusCode::BadDecodingError.is_good());
        assert!(!StatusCode::BadDecodingError.is_uncertain());

        assert!(StatusCode::Uncertain.is_uncertain());
        assert!(!StatusCode::Uncertain.is_good());
        assert!(!StatusCode::Uncertain.is_bad());

        // Unknown codes keep their severity and value
        let unknown = StatusCode::from_u32(0x40A4_0000);
        assert!(unknown.is_uncertain());
        assert_eq!(unknown.bits(), 0x40A4_0000);
        assert_eq!(unknown.name(), "Unknown");
    }

    #[test]
    fn display() {
        assert_eq!(
            format!("{}", StatusCode::BadSecurityModeRejected),
            "BadSecurityModeRejected"
        );
        assert_eq!(
            format!("{}", StatusCode::from_u32(0x8123_0000)),
            "StatusCode(0x81230000)"
        );
    }
}
