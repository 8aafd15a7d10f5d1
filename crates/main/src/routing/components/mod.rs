pub mod direct;
pub mod mock;
pub mod seda;

pub use direct::{DirectComponent, DirectEndpoint};
pub use mock::{MockComponent, MockEndpoint};
pub use seda::{SedaComponent, SedaEndpoint};
