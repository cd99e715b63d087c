#![deny(clippy::all)]
#![deny(clippy::pedantic)]

pub use crate::errors::{Error, ErrorKind, Result};

pub mod batch;
pub mod config;
pub mod convert;
pub mod errors;
pub mod extractor;
pub mod mirror;
pub mod normalize;
pub mod scratch;
