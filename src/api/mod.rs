//! Azure Resource Manager and workflow runtime access
//!
//! [`ArmClient`] issues authenticated, retried and paginated calls;
//! [`AccessContext`] bundles it with the settings and token provider a tool
//! handler needs.

pub mod client;
pub mod constants;
pub mod context;
pub mod models;
pub mod resilience;

pub use client::{ArmClient, ArmClientBuilder, validate_app_name};
pub use context::AccessContext;
pub use models::{ArmList, ArmPage};
pub use reqwest::Method;
pub use resilience::{LogLevel, MonitoringConfig, ResilienceConfig, RetryConfig, RetryPolicy, RetryableError};
