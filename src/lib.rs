//! Share one local directory over HTTP on the LAN: peers can upload into it,
//! browse it and download from it, and recent uploads are logged.

pub mod config;
pub mod download;
pub mod error;
pub mod history;
pub mod listing;
pub mod network;
pub mod pages;
pub mod paths;
pub mod router;
pub mod sanitize;
pub mod server;
pub mod upload;

pub use config::{Preferences, ServerConfig};
pub use error::{ShareError, StartupError};
pub use server::{ServerStatus, ShareServer};
