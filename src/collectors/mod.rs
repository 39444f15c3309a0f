pub mod types;
pub mod varnishstat;

pub use types::*;
pub use varnishstat::VarnishStatCollector;
