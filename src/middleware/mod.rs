//! Middleware module
//!
//! Request logging and gateway authentication

pub mod auth;
pub mod logging;
