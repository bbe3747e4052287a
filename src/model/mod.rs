pub mod config;
pub mod document;
pub mod replacement;
pub mod tag;

pub use config::*;
pub use document::*;
pub use replacement::*;
pub use tag::*;
