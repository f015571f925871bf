// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Communication layer - the transport and codec collaborator seams, the secure channel that
//! drives them, and the supporting pieces (request id handles, the buffer pool, URL helpers).

pub mod buffer;
pub mod channel;
pub mod codec;
pub mod handle;
pub mod transport;
pub mod url;

pub use buffer::{buffer_pool, BufferPool, PooledBuffer};
pub use channel::{ChannelState, SecureChannel, SecureChannelConfig};
pub use codec::MessageCodec;
pub use transport::{
    AcknowledgeMessage, AsymmetricSecurityHeader, ChunkType, Connector, ErrorMessage,
    HelloMessage, MessageChunk, SecurityHeader, SymmetricSecurityHeader, Transport,
    TransportMessage,
};
