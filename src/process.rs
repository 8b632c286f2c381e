use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use reqwest::Url;
use tokio::{fs, time::sleep};
use tracing::{error, info, warn};

use crate::assemble::RecordAssembler;
use crate::config::CrawlConfig;
use crate::image::ImageResolver;
use crate::listing::{count_unique_accessions, fetch_listing};
use crate::model::{CrawlUnit, Record, StateEntry};
use crate::progress::{images_rel_dir, ProgressTracker, UnitOutput};
use crate::request::{listing_url, Fetch, HttpFetcher};
use crate::{info_time, Error, Result};

/// Totals of one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub units_processed: usize,
    pub units_skipped: usize,
    pub records_written: usize,
    pub images_downloaded: usize,
}

/// Crawls every configured state and county over HTTP.
pub async fn process_site(config: &CrawlConfig) -> Result<CrawlSummary> {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new()?);
    Crawler::new(config.clone(), fetcher).run().await
}

/// Reads the pre-built state/county list. Any failure here is fatal.
pub async fn load_states(path: &Path) -> Result<Vec<StateEntry>> {
    let load = async {
        let bytes = fs::read(path).await?;
        Ok::<Vec<StateEntry>, Error>(serde_json::from_slice(&bytes)?)
    };
    load.await.map_err(|e| Error::StateInput {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

pub struct Crawler {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetch>,
    assembler: RecordAssembler,
    tracker: ProgressTracker,
    summary: CrawlSummary,
}

impl Crawler {
    pub fn new(config: CrawlConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let images = ImageResolver::new(
            fetcher.clone(),
            config.base_url.clone(),
            config.image_max_retries,
            config.image_retry_delay(),
        );
        let assembler = RecordAssembler::new(fetcher.clone(), images, config.base_url.clone());
        let tracker = ProgressTracker::new(config.output_dir.clone());
        Self {
            config,
            fetcher,
            assembler,
            tracker,
            summary: CrawlSummary::default(),
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Walks states and counties in input order. Only a bad input file stops the run;
    /// a county that fails is logged and skipped.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        let start_time = Local::now();
        let states = load_states(&self.config.states_file).await?;
        fs::create_dir_all(self.config.output_dir.join("json")).await?;
        info_time!("Loaded {} states, started crawling", states.len());

        for state in &states {
            if !self.config.wants_state(&state.abbreviation) {
                continue;
            }
            if state.counties.is_empty() {
                info!(state = %state.abbreviation, "no counties, skipping state");
                continue;
            }

            let county_limit = self.config.counties_per_state.unwrap_or(usize::MAX);
            for county in state.counties.iter().take(county_limit) {
                let unit = CrawlUnit::new(state, county);
                match self.process_unit(&unit).await {
                    Ok(written) => {
                        self.summary.units_processed += 1;
                        self.summary.records_written += written;
                    }
                    Err(e) => {
                        error!(unit = %unit, error = %e, "skipping county");
                        self.summary.units_skipped += 1;
                    }
                }
            }
        }

        info_time!(
            start_time,
            "Crawl finished: {} records from {} counties, {} counties skipped. Mapping: {}",
            self.summary.records_written,
            self.summary.units_processed,
            self.summary.units_skipped,
            self.tracker.mapping_path().display()
        );
        Ok(self.summary.clone())
    }

    /// Fetches a county's listing and works through it one record at a time.
    /// Returns the number of records written.
    async fn process_unit(&mut self, unit: &CrawlUnit) -> Result<usize> {
        let start_time = Local::now();
        let url = listing_url(&self.config.base_url, &unit.state_abbr, &unit.county_id);
        info!(unit = %unit, "fetching search results");

        let rows = fetch_listing(self.fetcher.as_ref(), &url).await?;
        if rows.is_empty() {
            info!(unit = %unit, "no records found");
            return Ok(0);
        }

        let total = count_unique_accessions(&rows);
        info!(
            rows = rows.len(),
            patents = total,
            "found listing rows for {}",
            unit
        );

        let mut output = self.tracker.open_unit(unit, total).await?;
        let max_records = self.config.max_records.unwrap_or(usize::MAX);
        let mut index = 0;

        while output.records().len() < max_records && index < rows.len() {
            let Some((mut record, consumed)) = self.assembler.next_record(&rows, index, unit).await
            else {
                warn!(unit = %unit, index, "malformed listing row, skipping it");
                index += 1;
                continue;
            };
            index += consumed;

            sleep(self.config.request_delay()).await;
            self.assembler.enrich(&mut record, &unit.state_name).await;

            if !self.config.skip_images
                && download_patent_image(self.fetcher.as_ref(), &mut record, &output).await
            {
                self.summary.images_downloaded += 1;
            }

            let progress = self.tracker.commit(&mut output, record).await?;
            info!(
                processed = progress.processed_records,
                total = progress.total_records,
                percent = progress.completion_percentage,
                "saved to {}",
                output.path().display()
            );
        }

        info_time!(
            start_time,
            "Completed {}/{} records for {}",
            output.records().len(),
            output.total_records(),
            unit
        );
        Ok(output.records().len())
    }
}

/// Last path segment of an image link.
pub fn image_file_name(link: &str) -> Option<String> {
    Url::parse(link)
        .ok()?
        .path_segments()?
        .last()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Downloads the record's scan into the county's image directory and sets
/// `local_image_path`. Returns whether a file was written.
pub async fn download_patent_image(fetcher: &dyn Fetch, record: &mut Record, output: &UnitOutput) -> bool {
    let Some(link) = record.document_access.image_link.clone() else {
        info!(accession = record.accession(), "no image link available");
        return false;
    };

    let file_name = image_file_name(&link).unwrap_or_else(|| {
        format!(
            "{}-{}.pdf",
            record.basic_info.doc_class.as_deref().unwrap_or_default(),
            record.accession()
        )
    });
    let path = output.images_dir().join(&file_name);

    match fetcher.download(&link, &path).await {
        Ok(bytes) => {
            info!(accession = record.accession(), bytes, "downloaded image to {}", path.display());
            record.document_access.local_image_path =
                Some(format!("{}/{}", images_rel_dir(output.unit()), file_name));
            true
        }
        Err(e) => {
            warn!(accession = record.accession(), link = %link, error = %e, "image download failed");
            false
        }
    }
}
