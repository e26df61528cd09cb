//! Utilities shared by the Tayori packages.

pub mod logger;
pub mod time;
