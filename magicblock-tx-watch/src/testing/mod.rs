#[cfg(any(test, feature = "dev-context"))]
pub mod ledger_source_mock;
#[cfg(any(test, feature = "dev-context"))]
pub mod utils;

#[cfg(any(test, feature = "dev-context"))]
pub use utils::init_logger;
