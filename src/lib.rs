pub mod app;
pub mod core;
pub mod local;
pub mod notifications;
pub mod ops;
pub mod orchestrator;
pub mod producer;
pub mod relay;
pub mod runner;
pub mod transport;

include!(concat!(env!("OUT_DIR"), "/version.rs"));
