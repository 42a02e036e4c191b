pub mod adapter;
pub mod cache;
pub mod check;
pub mod config;
pub mod decode;
pub mod digest;
pub mod encode;
pub mod error;
pub mod fragment;
pub mod galois;
pub mod header;
pub mod matrix;
pub mod overlay;
pub mod path_safety;
pub mod report;
pub mod verify;

pub use error::{EccError, Result};
