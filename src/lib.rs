//! Chat-bot host with the crab rave and tweets cogs

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

#[cfg(test)]
pub(crate) mod testing;
