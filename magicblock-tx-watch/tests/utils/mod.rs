#![cfg(any(test, feature = "dev-context"))]

pub mod test_context;
