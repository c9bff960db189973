pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod server;
pub mod view_state;

#[cfg(test)]
pub(crate) mod test_support;
