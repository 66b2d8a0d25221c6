//! Data directory parsers

pub mod debug;
pub mod export;
