pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod request;
pub mod store;
pub mod wire;
