//! Azure access layer for Logic Apps tooling
//!
//! Cloud endpoint resolution, settings loading, two token-provider trust
//! models, an ARM / workflow runtime request client and a closed error
//! taxonomy.

pub mod api;
pub mod auth;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;

pub use api::{AccessContext, ArmClient};
pub use auth::{LocalCredentialProvider, PassthroughTokenProvider, TokenProvider};
pub use cloud::{CloudEndpoints, CloudRegistry};
pub use config::{Settings, SettingsLoader};
pub use error::{AccessError, ErrorKind, FormattedError, format_error};
