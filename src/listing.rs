//! Search-results listing: table parsing and grouping of rows into records.
//!
//! A patent covering several parcels shows up as several adjacent rows with the
//! same accession, one row per parcel.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::model::{Parcel, Record};
use crate::names::parse_people;
use crate::parse::{create_selector, element_text, static_regex};
use crate::request::Fetch;
use crate::{Error, Result};

pub const ACCESSION: usize = 0;
pub const PATENTEE: usize = 1;
pub const ISSUE_DATE: usize = 2;
pub const DOC_NUMBER: usize = 3;
pub const STATE: usize = 4;
pub const MERIDIAN: usize = 5;
pub const TOWNSHIP_RANGE: usize = 6;
pub const ALIQUOTS: usize = 7;
pub const SECTION: usize = 8;
pub const COUNTY: usize = 9;
/// Columns a row needs to be usable.
pub const COLUMN_COUNT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingCell {
    /// Trimmed text content.
    pub text: String,
    /// Raw markup of the whole cell.
    pub markup: String,
    /// `href` of the first link in the cell.
    pub href: Option<String>,
}

#[cfg(test)]
impl ListingCell {
    pub(crate) fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            markup: format!("<td>{text}</td>"),
            text,
            href: None,
        }
    }
}

/// One `<tr>` of the results table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRow {
    pub cells: Vec<ListingCell>,
}

impl ListingRow {
    pub fn accession(&self) -> Option<&str> {
        self.cells.get(ACCESSION).map(|c| c.text.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.cells.len() >= COLUMN_COUNT
    }

    fn text(&self, column: usize) -> &str {
        &self.cells[column].text
    }

    pub fn parcel(&self) -> Option<Parcel> {
        if !self.is_complete() {
            return None;
        }
        Some(Parcel {
            meridian: self.text(MERIDIAN).to_string(),
            township_range: self.text(TOWNSHIP_RANGE).to_string(),
            aliquots: self.text(ALIQUOTS).to_string(),
            section_number: self.text(SECTION).to_string(),
            county: self.text(COUNTY).to_string(),
        })
    }
}

/// Fetches a listing page and parses it off the async runtime.
pub async fn fetch_listing(fetcher: &dyn Fetch, url: &str) -> Result<Vec<ListingRow>> {
    let html = fetcher.get_text(url).await?;
    let rows = spawn_blocking(move || parse_listing(&html)).await??;
    rows.ok_or_else(|| Error::MissingListingTable(url.to_string()))
}

/// Extracts the data rows of the results table, header row dropped.
/// Returns `None` if the page has no results table.
pub fn parse_listing(html: &str) -> Result<Option<Vec<ListingRow>>> {
    let doc = Html::parse_document(html);

    let table_selector = create_selector("table.resultsPF")?;
    let row_selector = create_selector("tr")?;
    let cell_selector = create_selector("td")?;
    let link_selector = create_selector("a")?;

    let Some(table) = doc.select(&table_selector).next() else {
        return Ok(None);
    };

    let rows = table
        .select(&row_selector)
        .skip(1)
        .map(|tr| ListingRow {
            cells: tr
                .select(&cell_selector)
                .map(|td| ListingCell {
                    text: element_text(td),
                    markup: td.html(),
                    href: td
                        .select(&link_selector)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                        .map(str::to_string),
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    debug!(rows = rows.len(), "parsed listing table");
    Ok(Some(rows))
}

/// Number of distinct accessions in the listing, used as the unit's record estimate.
pub fn count_unique_accessions(rows: &[ListingRow]) -> usize {
    rows.iter()
        .filter_map(ListingRow::accession)
        .collect::<HashSet<_>>()
        .len()
}

/// Groups the row at `index` and every directly following row with the same
/// accession into one record.
///
/// Returns the record and the number of rows it consumed (at least 1). A row
/// that lacks the expected columns gives `None`: nothing is consumed and it's up
/// to the caller to step past it.
pub fn assemble_record(
    rows: &[ListingRow],
    index: usize,
    base_url: &str,
    county_id: &str,
) -> Option<(Record, usize)> {
    let row = rows.get(index)?;
    let key = row.accession()?;
    let mut record = base_record(row, base_url, county_id)?;

    let mut consumed = 1;
    for next in &rows[index + 1..] {
        if next.accession() != Some(key) {
            break;
        }
        // Same patent but unusable parcel: the whole group is malformed.
        record.parcels.push(next.parcel()?);
        consumed += 1;
    }

    Some((record, consumed))
}

/// The record as far as one listing row can tell.
fn base_record(row: &ListingRow, base_url: &str, county_id: &str) -> Option<Record> {
    let parcel = row.parcel()?;
    let accession_cell = &row.cells[ACCESSION];

    let detail_link = accession_cell
        .href
        .as_deref()
        .map(|href| normalize_detail_link(base_url, href));
    let doc_class = detail_link
        .as_deref()
        .and_then(accession_info)
        .map(|(_, doc_class)| doc_class);

    let mut record = Record::with_accession(&accession_cell.text);
    record.basic_info.doc_class = doc_class;
    record.document_numbers.doc_number = row.text(DOC_NUMBER).to_string();
    record.dates.issue_date = row.text(ISSUE_DATE).to_string();
    record.parcels.push(parcel);
    record.location.state = row.text(STATE).to_string();
    record.location.county_id = county_id.to_string();
    record.people.patentees = parse_people(&row.cells[PATENTEE].markup);
    record.document_access.detail_link = detail_link;
    Some(record)
}

/// Makes a listing link absolute and points it at the print-friendly page.
pub fn normalize_detail_link(base_url: &str, href: &str) -> String {
    let link = if href.starts_with("http") {
        href.to_string()
    } else {
        let relative = href.strip_prefix("../").unwrap_or(href);
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    };
    link.replace("/default.aspx", "/default_pf.aspx")
}

/// `(accession, doc_class)` from a detail link's query string.
pub fn accession_info(link: &str) -> Option<(String, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = static_regex(&RE, r"accession=([^&#]+)&docClass=([^&#]+)").captures(link)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}
