//! Route handlers for the HTTP API.

pub mod health;
pub mod progress;
pub mod transcode;
pub mod videos;
pub mod ws;
