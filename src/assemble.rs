use std::sync::Arc;

use tracing::{info, warn};

use crate::detail::enrich_from_html;
use crate::image::ImageResolver;
use crate::listing::{accession_info, assemble_record, ListingRow};
use crate::model::{CrawlUnit, Record};
use crate::request::Fetch;

/// Builds complete records out of listing rows: grouping, image link, detail page.
pub struct RecordAssembler {
    fetcher: Arc<dyn Fetch>,
    images: ImageResolver,
    base_url: String,
}

impl RecordAssembler {
    pub fn new(fetcher: Arc<dyn Fetch>, images: ImageResolver, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            images,
            base_url: base_url.into(),
        }
    }

    /// Groups the record starting at `index` and resolves its image link.
    ///
    /// `None` means the row was malformed and nothing was consumed.
    pub async fn next_record(
        &self,
        rows: &[ListingRow],
        index: usize,
        unit: &CrawlUnit,
    ) -> Option<(Record, usize)> {
        let (mut record, consumed) = assemble_record(rows, index, &self.base_url, &unit.county_id)?;
        self.attach_image_link(&mut record).await;
        Some((record, consumed))
    }

    /// Sets `document_access.image_link`, or leaves it empty if resolution fails.
    pub async fn attach_image_link(&self, record: &mut Record) {
        let Some((accession, doc_class)) = record
            .document_access
            .detail_link
            .as_deref()
            .and_then(accession_info)
        else {
            warn!(accession = record.accession(), "no accession/docClass in detail link");
            return;
        };

        match self.images.resolve(&accession, &doc_class).await {
            Ok(link) => record.document_access.image_link = Some(link),
            Err(e) => warn!(accession = %accession, error = %e, "continuing without image link"),
        }
    }

    /// Fetches the detail page and folds it into the record.
    /// A page that can't be fetched leaves the record as it was.
    pub async fn enrich(&self, record: &mut Record, state_name: &str) {
        let Some(url) = record.document_access.detail_link.clone() else {
            warn!(accession = record.accession(), "no detail link, skipping enrichment");
            return;
        };

        info!(accession = record.accession(), "fetching details");
        match self.fetcher.get_text(&url).await {
            Ok(html) => enrich_from_html(record, &html, state_name),
            Err(e) => warn!(
                accession = record.accession(),
                url = %url,
                error = %e,
                "couldn't fetch detail page"
            ),
        }
    }
}
