//! Route handlers for the HTTP API.

pub mod admin;
pub mod config;
pub mod events;
pub mod health;
pub mod videos;
