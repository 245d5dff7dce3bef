mod args;
pub mod cmdline;
pub mod config;
pub mod data;
mod edit;
pub mod error;
pub mod host;
mod parse;
pub mod profile;
pub mod store;
mod utils;

pub use args::generate;
pub use config::VmHardwareConfig;
pub use host::HostCapabilities;
pub use parse::parse;
pub use utils::ArgDisplay;
