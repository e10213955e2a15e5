//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod init_session;
pub mod scrape;

pub use scrape::{run as scrape_run, ScrapeArgs};
