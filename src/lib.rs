pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::http::HttpRecClient;
pub use config::RecConfig;
pub use core::concurrent_helper::{AsyncRequest, ConcurrentHelper};
pub use core::request_helper::RequestHelper;
pub use domain::ports::RecClient;
pub use utils::error::{RecError, Result};
