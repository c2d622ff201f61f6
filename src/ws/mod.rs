//! Game gateway connection: wire protocol, session state machine and client

pub mod client;
pub mod protocol;
pub mod session;

pub use client::{ClientError, DisconnectHandler, GameClient};
