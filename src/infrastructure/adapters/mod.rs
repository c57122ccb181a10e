//! Chat platform adapters

pub mod console;
pub mod discord;

pub use console::ConsoleAdapter;
pub use discord::DiscordAdapter;
