pub mod config;
pub mod error;
pub mod handle;
pub mod io;
pub mod mapping;
pub mod model;
pub mod remote;
pub mod sync;

pub use error::{Result, ToolError};
