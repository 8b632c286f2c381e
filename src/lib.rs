//! Land patent scraper.
//!
//! Walks the state/county hierarchy of the land records archive, groups the
//! multi-row listing into patent records, enriches each from its detail page,
//! resolves the scanned image and snapshots progress after every record.

mod error;
mod macros;
mod parse;

pub mod assemble;
pub mod config;
pub mod detail;
pub mod image;
pub mod listing;
pub mod model;
pub mod names;
pub mod process;
pub mod progress;
pub mod request;

pub use error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://glorecords.blm.gov";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const RECORD_TYPE: &str = "Land Patent";
/// Delay between records, to go easy on the archive.
pub const REQUEST_DELAY_MS: u64 = 1000;
pub const IMAGE_MAX_RETRIES: u32 = 10;
pub const IMAGE_RETRY_DELAY_MS: u64 = 3000;
const MAPPING_FILE: &str = "county_mapping.json";
