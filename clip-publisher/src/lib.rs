pub mod cli;
pub mod load_config;
pub mod openai;
pub mod storage;
pub mod youtube;

pub use cli::{run, Cli, Commands};
