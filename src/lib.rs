#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;

pub use auth::AuthParameters;
pub use client::Client;
pub use config::Config;
pub use error::Error;
pub use protocol::{Envelope, OpCode, ServiceEvent, ServicePayload};
pub use session::SessionState;

pub type Result<T> = std::result::Result<T, Error>;
