pub mod config;
pub mod logger;
pub mod pipechain_toml;

pub use config::*;
pub use logger::setup_logging;
pub use pipechain_toml::{
    PipechainToml, apply_file_to_opts, file_verbose, find_pipechain_toml, load_pipechain_toml,
    parse_pipechain_toml,
};
