use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::{DEFAULT_BASE_URL, IMAGE_MAX_RETRIES, IMAGE_RETRY_DELAY_MS, REQUEST_DELAY_MS};

/// Crawl settings, read from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "landpatents", about = "Scrape land patent records county by county")]
pub struct CrawlConfig {
    /// Root of the land records archive
    #[arg(long, env = "LANDPATENTS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Pre-built state/county list
    #[arg(long, env = "LANDPATENTS_STATES_FILE", default_value = "state_counties.json")]
    pub states_file: PathBuf,

    /// Directory receiving json/, images/ and the county mapping
    #[arg(long, env = "LANDPATENTS_OUTPUT_DIR", default_value = "land_records")]
    pub output_dir: PathBuf,

    /// Pause between records
    #[arg(long, env = "LANDPATENTS_REQUEST_DELAY_MS", default_value_t = REQUEST_DELAY_MS)]
    pub request_delay_ms: u64,

    /// Image conversion status polls before giving up
    #[arg(long, env = "LANDPATENTS_IMAGE_RETRIES", default_value_t = IMAGE_MAX_RETRIES)]
    pub image_max_retries: u32,

    /// Pause between image conversion status polls
    #[arg(long, env = "LANDPATENTS_IMAGE_RETRY_MS", default_value_t = IMAGE_RETRY_DELAY_MS)]
    pub image_retry_delay_ms: u64,

    /// Stop each county after this many records (default: all)
    #[arg(short = 'n', long, env = "LANDPATENTS_MAX_RECORDS")]
    pub max_records: Option<usize>,

    /// Only crawl the first N counties of every state (default: all)
    #[arg(long, env = "LANDPATENTS_COUNTIES")]
    pub counties_per_state: Option<usize>,

    /// Only crawl these state abbreviations, e.g. `AL,MS`
    #[arg(long, env = "LANDPATENTS_STATES", value_delimiter = ',')]
    pub states: Vec<String>,

    /// Resolve image links but don't download the scans
    #[arg(long, env = "LANDPATENTS_SKIP_IMAGES")]
    pub skip_images: bool,
}

impl CrawlConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn image_retry_delay(&self) -> Duration {
        Duration::from_millis(self.image_retry_delay_ms)
    }

    /// Whether the state with this abbreviation is part of the run.
    pub fn wants_state(&self, abbreviation: &str) -> bool {
        self.states.is_empty()
            || self
                .states
                .iter()
                .any(|s| s.trim().eq_ignore_ascii_case(abbreviation))
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            states_file: PathBuf::from("state_counties.json"),
            output_dir: PathBuf::from("land_records"),
            request_delay_ms: REQUEST_DELAY_MS,
            image_max_retries: IMAGE_MAX_RETRIES,
            image_retry_delay_ms: IMAGE_RETRY_DELAY_MS,
            max_records: None,
            counties_per_state: None,
            states: Vec::new(),
            skip_images: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_crate_constants() {
        let config = CrawlConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.image_max_retries, 10);
        assert_eq!(config.image_retry_delay(), Duration::from_secs(3));
        assert_eq!(config.request_delay(), Duration::from_secs(1));
        assert!(config.states.is_empty());
        assert!(config.max_records.is_none());
        assert!(!config.skip_images);
    }

    #[test]
    fn state_filter_is_case_insensitive() {
        let config = CrawlConfig::parse_from(["landpatents", "--states", "al,MS", "-n", "5"]);
        assert!(config.wants_state("AL"));
        assert!(config.wants_state("MS"));
        assert!(!config.wants_state("AR"));
        assert_eq!(config.max_records, Some(5));
    }
}
