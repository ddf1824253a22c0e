//! netcrawl-discover: concurrent network topology crawler.
//!
//! Logs into a root device over SSH, parses its CDP neighbor listing, and
//! fans out to every neighbor until the reachable topology is mapped. The
//! result is a deduplicated graph of `netcrawl_core::Node`s plus the devices
//! that could not be reached or parsed.

pub mod cdp;
pub mod config;
pub mod error;
pub mod explorer;
pub mod fake;
pub mod lines;
pub mod report;
pub mod result;
pub mod session;
pub mod ssh;
pub mod strategy;

pub use error::{CrawlError, DiscoverError, DiscoveryFailure, ParseError, SessionError};
pub use explorer::{ExploreOptions, Explorer};
pub use result::CrawlResult;
