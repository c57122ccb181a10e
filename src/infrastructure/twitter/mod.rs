//! Twitter API over HTTPS

pub mod client;
pub mod stream;
pub mod wire;

pub use client::TwitterClient;
