pub mod alarm;
pub mod config;
pub mod run;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;
