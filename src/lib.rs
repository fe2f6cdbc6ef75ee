pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod generator;
pub mod model;
pub mod router;
