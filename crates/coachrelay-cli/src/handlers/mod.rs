//! Command handlers.

pub mod profiles;
pub mod serve;
