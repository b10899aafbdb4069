pub mod api;
pub mod config;
pub mod database;
pub mod mapper;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
