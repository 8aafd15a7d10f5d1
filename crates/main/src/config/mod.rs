pub mod main_config;
pub mod properties;
pub mod sources;
pub mod validation;

pub use main_config::*;
pub use properties::*;
pub use sources::*;
pub use validation::*;
