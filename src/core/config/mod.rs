pub mod data;
pub mod io;

pub use data::{Config, ProviderConfig, SearchSection};
pub use io::ConfigError;
