pub mod auth;
pub mod context;
pub mod encoder;
pub mod fetcher;
pub mod interpreter;
pub mod orchestrator;
pub mod poller;
pub mod upstream;
