//! Router-level tests for the Clownlist API.
//!
//! ## Test Modules
//!
//! - **api_tests**: Requests driven through the full router and pipelines
//! - **error_tests**: Error response shapes and status codes
//! - **config_tests**: Configuration defaults and validation
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test api_tests
//! ```
