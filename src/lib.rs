pub mod config;
pub mod debounce;
pub mod error;
pub mod http;
pub mod runner;
pub mod save;
pub mod state;
pub mod storage;
