pub mod auth;
pub mod clouds;
pub mod raw;

pub use auth::{AuthCommands, handle_auth_command};
pub use clouds::{CloudsCommands, handle_clouds_command};
pub use raw::{RawCommands, handle_raw_command};
