pub mod api;
pub mod authz;
pub mod clients;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod utils;
