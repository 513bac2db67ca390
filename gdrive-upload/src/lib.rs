pub mod actions;
pub mod config;
pub mod conflict;
pub mod error;
pub mod folders;
pub mod logging;
pub mod retry;
pub mod runner;
pub mod store;
pub mod target;
pub mod upload;

#[cfg(test)]
mod test_support;
