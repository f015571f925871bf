// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The seam to the UA-Binary encoder / decoder. The channel hands a [`SupportedMessage`] to the
//! codec to obtain the body bytes of a chunk, and the other way around for received chunks. The
//! codec is schema driven and external to this crate; tests plug in a trivial self-describing
//! codec instead.

use crate::types::{StatusCode, SupportedMessage};

pub trait MessageCodec: Send + Sync {
    /// Encodes a service message into body bytes. Fails with `BadEncodingError`.
    fn encode(&self, message: &SupportedMessage) -> Result<Vec<u8>, StatusCode>;

    /// Decodes body bytes into a service message. Fails with `BadDecodingError`.
    fn decode(&self, body: &[u8]) -> Result<SupportedMessage, StatusCode>;
}
