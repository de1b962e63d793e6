pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod hooks;
pub mod lock;
pub mod platform;
pub mod prune;
pub mod transfer;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
