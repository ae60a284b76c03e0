pub mod api;
pub mod catalog;
pub mod cfg;
pub mod cmd;
pub mod engine;
pub mod logging;
pub mod probe;
pub mod stat;
