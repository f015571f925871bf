// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! `Variant` and `DataValue`, reduced to the value shapes that the session bootstrap and simple
//! attribute reads deal in.

use crate::types::{ByteString, DateTime, LocalizedText, NodeId, StatusCode, UAString};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Empty,
    Boolean(bool),
    Byte(u8),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    Double(f64),
    String(UAString),
    ByteString(ByteString),
    NodeId(Box<NodeId>),
    LocalizedText(Box<LocalizedText>),
    StringArray(Vec<UAString>),
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Empty
    }
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Extracts a string array value, the shape of the server's namespace and server arrays.
    pub fn as_string_array(&self) -> Option<Vec<String>> {
        match self {
            Variant::StringArray(values) => {
                Some(values.iter().map(|v| v.as_ref().to_string()).collect())
            }
            _ => None,
        }
    }
}

impl From<Vec<&str>> for Variant {
    fn from(value: Vec<&str>) -> Self {
        Variant::StringArray(value.into_iter().map(UAString::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: Option<StatusCode>,
    pub source_timestamp: Option<DateTime>,
    pub server_timestamp: Option<DateTime>,
}

impl DataValue {
    pub fn new(value: Variant) -> DataValue {
        DataValue {
            value: Some(value),
            status: Some(StatusCode::Good),
            source_timestamp: Some(crate::types::now()),
            server_timestamp: Some(crate::types::now()),
        }
    }

    pub fn error(status: StatusCode) -> DataValue {
        DataValue {
            value: None,
            status: Some(status),
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// The status of the value. An absent status means Good.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }
}
