//! Gateway middleware

pub mod auth;
