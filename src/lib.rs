pub mod api;
pub mod client;
pub mod config;
pub mod server;
pub mod text;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
