//! Client side of the third-party user API.

mod client;
mod error;
mod payload;

pub use client::RemoteUserGateway;
pub use error::RemoteError;
pub use payload::RemoteUserPayload;
