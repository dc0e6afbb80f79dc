pub mod analysis;
pub mod artifact;
pub mod config;
pub mod context;
pub mod entity;
pub mod ioc;
pub mod request;

pub use config::Config;
