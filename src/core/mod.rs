pub mod config;
pub mod config_loader;
pub mod error;
pub mod manifest;
pub mod retry;
pub mod step_log;
pub mod traits;
pub mod version;

pub use config::*;
pub use config_loader::*;
pub use error::*;
pub use manifest::*;
pub use retry::*;
pub use step_log::*;
pub use traits::*;
pub use version::*;
