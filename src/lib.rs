// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `uasession` crate is the client half of an OPC UA binary protocol stack - UA-SecureConversation
//! 1.0 over TCP with the UA-Binary 1.0 message encoding. It negotiates a secure, authenticated,
//! session-scoped channel to an OPC UA server endpoint and exchanges request / response service
//! messages over it.
//!
//! Clients start off by creating a [`ClientBuilder`] and constructing a [`Client`] from that. Calling
//! [`Client::connect`] runs the whole establishment pipeline - endpoint discovery and selection,
//! the `Hello` / `Acknowledge` transport negotiation, the asymmetric `OpenSecureChannel` exchange,
//! `CreateSession` / `ActivateSession` with the configured user identity, and the namespace
//! bootstrap - and yields a ready [`Session`].
//!
//! The byte level concerns live behind three collaborator traits - [`Connector`] / [`Transport`]
//! for the socket loop and chunk assembly, and [`MessageCodec`] for the UA-Binary encoder /
//! decoder - so the crate can be driven against any conforming implementation, including the
//! in-memory pair used by its own tests.
//!
//! [`ClientBuilder`]: crate::client::ClientBuilder
//! [`Client`]: crate::client::Client
//! [`Client::connect`]: crate::client::Client::connect
//! [`Session`]: crate::client::Session
//! [`Connector`]: crate::comms::Connector
//! [`Transport`]: crate::comms::Transport
//! [`MessageCodec`]: crate::comms::MessageCodec

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate serde_derive;

pub mod client;
pub mod comms;
pub mod crypto;
pub mod types;

pub mod prelude {
    pub use crate::client::*;
    pub use crate::comms::{Connector, MessageCodec, Transport};
    pub use crate::crypto::{SecurityPolicy, UserIdentity};
    pub use crate::types::*;
}
