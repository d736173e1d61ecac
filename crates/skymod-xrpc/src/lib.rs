//! HTTP clients for the atproto services used by skymod: XRPC calls against
//! a PDS and identity document lookups against a PLC directory.

mod client;
mod config;
mod error;
mod plc;
mod services;
mod session;

pub use client::{ActorView, MutesPage, XrpcClient};
pub use config::{DEFAULT_PDS_URL, DEFAULT_PLC_URL, ServiceConfig, http_client};
pub use error::XrpcError;
pub use plc::{PlcClient, PlcDocument};
pub use services::MuteList;
pub use session::{APP_PASSWORD_SCOPE, Session, ensure_app_password};
