pub mod apply;
pub mod audit;
pub mod canon;
pub mod compat;
pub mod config;
pub mod digest;
pub mod error;
pub mod io;
pub mod keys;
pub mod manifest;
pub mod paths;
pub mod reason;
pub mod rollback;
pub mod semver;
pub mod signature;
pub mod store;

pub use error::{PackError, Result};
