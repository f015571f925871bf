// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Basic OPC UA types used by the session establishment pipeline, plus the service types of the
//! handshake itself. Wire encoding of these types is the business of the [`MessageCodec`]
//! collaborator, so they are plain data carriers here.
//!
//! [`MessageCodec`]: crate::comms::MessageCodec

use std::fmt;

pub mod service_types;
pub mod status_code;
pub mod supported_message;
pub mod variant;

pub use service_types::*;
pub use status_code::StatusCode;
pub use supported_message::SupportedMessage;
pub use variant::{DataValue, Variant};

/// UA timestamps are carried as UTC date times; the codec is responsible for the 100ns tick
/// representation on the wire.
pub type DateTime = chrono::DateTime<chrono::Utc>;

pub fn now() -> DateTime {
    chrono::Utc::now()
}

bitflags! {
    /// Diagnostic bits requested in a request header.
    pub struct DiagnosticBits: u32 {
        const SERVICE_LEVEL_SYMBOLIC_ID = 0x0000_0001;
        const SERVICE_LEVEL_LOCALIZED_TEXT = 0x0000_0002;
        const SERVICE_LEVEL_ADDITIONAL_INFO = 0x0000_0004;
        const SERVICE_LEVEL_INNER_STATUS_CODE = 0x0000_0008;
        const SERVICE_LEVEL_INNER_DIAGNOSTICS = 0x0000_0010;
        const OPERATIONAL_LEVEL_SYMBOLIC_ID = 0x0000_0020;
        const OPERATIONAL_LEVEL_LOCALIZED_TEXT = 0x0000_0040;
        const OPERATIONAL_LEVEL_ADDITIONAL_INFO = 0x0000_0080;
        const OPERATIONAL_LEVEL_INNER_STATUS_CODE = 0x0000_0100;
        const OPERATIONAL_LEVEL_INNER_DIAGNOSTICS = 0x0000_0200;
    }
}

impl Default for DiagnosticBits {
    fn default() -> Self {
        DiagnosticBits::empty()
    }
}

impl serde::Serialize for DiagnosticBits {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> serde::Deserialize<'de> for DiagnosticBits {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = <u32 as serde::Deserialize>::deserialize(deserializer)?;
        Ok(DiagnosticBits::from_bits_truncate(bits))
    }
}

/// A UA string, where the null value is distinct from the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UAString {
    pub value: Option<String>,
}

impl UAString {
    pub fn null() -> UAString {
        UAString { value: None }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Tests if the string is null or empty - the two are interchangeable for most of the
    /// protocol's "absent value" semantics.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, |v| v.is_empty())
    }

    pub fn as_ref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for UAString {
    fn from(value: &str) -> Self {
        UAString {
            value: Some(value.to_string()),
        }
    }
}

impl From<&String> for UAString {
    fn from(value: &String) -> Self {
        UAString {
            value: Some(value.clone()),
        }
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        UAString { value: Some(value) }
    }
}

/// A string of bytes. As with [`UAString`], null and empty are distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ByteString {
    pub value: Option<Vec<u8>>,
}

impl ByteString {
    pub fn null() -> ByteString {
        ByteString { value: None }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, |v| v.is_empty())
    }

    pub fn as_ref(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }
}

impl<'a, T> From<&'a T> for ByteString
where
    T: AsRef<[u8]> + ?Sized,
{
    fn from(value: &'a T) -> Self {
        ByteString {
            value: Some(value.as_ref().to_vec()),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        ByteString { value: Some(value) }
    }
}

/// Node identifiers as used by the handshake - numeric, string and opaque forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(UAString),
    ByteString(ByteString),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl NodeId {
    pub fn new(namespace: u16, identifier: impl Into<Identifier>) -> NodeId {
        NodeId {
            namespace,
            identifier: identifier.into(),
        }
    }

    pub fn null() -> NodeId {
        NodeId {
            namespace: 0,
            identifier: Identifier::Numeric(0),
        }
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "ns={};i={}", self.namespace, v),
            Identifier::String(v) => write!(f, "ns={};s={}", self.namespace, v),
            Identifier::ByteString(v) => write!(f, "ns={};b={}b", self.namespace, v.as_ref().len()),
        }
    }
}

impl From<u32> for Identifier {
    fn from(value: u32) -> Self {
        Identifier::Numeric(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::String(value.into())
    }
}

impl From<ByteString> for Identifier {
    fn from(value: ByteString) -> Self {
        Identifier::ByteString(value)
    }
}

/// Human readable text with an optional locale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    pub locale: UAString,
    pub text: UAString,
}

impl LocalizedText {
    pub fn new(locale: &str, text: &str) -> LocalizedText {
        LocalizedText {
            locale: locale.into(),
            text: text.into(),
        }
    }

    pub fn null() -> LocalizedText {
        LocalizedText {
            locale: UAString::null(),
            text: UAString::null(),
        }
    }
}

/// Well known variables under the `Server` object that the client reads while bootstrapping.
pub mod variable_ids {
    pub const SERVER_SERVER_ARRAY: u32 = 2254;
    pub const SERVER_NAMESPACE_ARRAY: u32 = 2255;
}

/// Attribute ids used by the read service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum AttributeId {
    NodeId = 1,
    NodeClass = 2,
    BrowseName = 3,
    DisplayName = 4,
    Value = 13,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ua_string_null_vs_empty() {
        let s = UAString::null();
        assert!(s.is_null());
        assert!(s.is_empty());
        let s = UAString::from("");
        assert!(!s.is_null());
        assert!(s.is_empty());
        let s = UAString::from("x");
        assert!(!s.is_empty());
        assert_eq!(s.as_ref(), "x");
    }

    #[test]
    fn node_id_null() {
        assert!(NodeId::null().is_null());
        assert!(!NodeId::new(0, 2255).is_null());
        assert!(!NodeId::new(1, "s").is_null());
    }
}
