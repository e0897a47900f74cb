pub mod api;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod uptime;
