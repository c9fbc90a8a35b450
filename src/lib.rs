pub mod app;
pub mod config;
pub mod console;
pub mod draft;
pub mod index;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod sync;
pub mod workflow;
