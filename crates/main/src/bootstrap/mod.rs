pub mod configuration;
pub mod main;

pub use configuration::Configuration;
pub use main::{BootstrapStats, Main};
