//! Demo CLI: argument parsing, config layering, demo pipeline, progress and report.

pub mod arg_parser;
pub mod cli;
pub mod demo;
pub mod opts;
pub mod progress;
pub mod report;

pub use arg_parser::Cli;
pub use cli::{apply_cli_to_opts, handle_run};
pub use demo::{build_demo_pipeline, demo_handler};
pub use opts::{RunOpts, StageOpts};
pub use report::{RunReport, print_report};
