pub use error::Error;

pub mod error;
