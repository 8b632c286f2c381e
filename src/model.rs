//! Persisted shapes: the land patent `Record`, its sections, and the state/county input.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RECORD_TYPE;

/// Role of a person named on a patent, taken from the icon preceding the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    Patentee,
    Warrantee,
    Assignee,
    Widow,
    Heir,
    Unknown,
}

impl PersonType {
    /// Icon filename fragments, checked in this order.
    pub const ICONS: [(&'static str, PersonType); 5] = [
        ("patentee.png", PersonType::Patentee),
        ("warrantee.png", PersonType::Warrantee),
        ("assignee.png", PersonType::Assignee),
        ("widow.png", PersonType::Widow),
        ("heir.png", PersonType::Heir),
    ];

    pub fn from_markup(markup: &str) -> Self {
        Self::ICONS
            .iter()
            .find(|(icon, _)| markup.contains(icon))
            .map(|(_, kind)| *kind)
            .unwrap_or(PersonType::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PersonType,
    /// Reserved, always `None` for now.
    pub additional_info: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>, kind: PersonType) -> Self {
        Self {
            name: name.into(),
            kind,
            additional_info: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub accession: String,
    pub doc_class: Option<String>,
    #[serde(rename = "type")]
    pub record_type: String,
    pub cancelled: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiscInfo {
    pub land_office: Option<String>,
    pub us_reservations: Option<String>,
    pub mineral_reservations: Option<String>,
    pub tribe: Option<String>,
    pub militia: Option<String>,
    pub state_in_favor_of: Option<String>,
    pub authority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyInfo {
    pub total_acres: Option<String>,
    pub survey_date: Option<String>,
    pub geographic_name: Option<String>,
    pub metes_and_bounds: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentNumbers {
    pub doc_number: String,
    pub misc_doc_number: Option<String>,
    pub blm_serial_number: Option<String>,
    pub indian_allotment_number: Option<String>,
    pub coal_entry_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dates {
    pub issue_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub meridian: String,
    pub township_range: String,
    pub aliquots: String,
    pub section_number: String,
    pub county: String,
}

impl Parcel {
    /// One clause of the consolidated legal description.
    pub fn legal_description(&self) -> String {
        format!(
            "{} of Section {}, {}, {} Meridian, {} County",
            self.aliquots, self.section_number, self.township_range, self.meridian, self.county
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub state: String,
    pub state_name: Option<String>,
    pub county_id: String,
    pub legal_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct People {
    pub patentees: Vec<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warrantees: Option<Vec<Person>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<Person>>,
    pub military_rank: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAccess {
    pub detail_link: Option<String>,
    pub image_link: Option<String>,
    pub local_image_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub scraped_date: String,
    pub last_updated: String,
}

/// One land patent, possibly covering several parcels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub basic_info: BasicInfo,
    pub misc_info: MiscInfo,
    pub survey_info: SurveyInfo,
    pub document_numbers: DocumentNumbers,
    pub dates: Dates,
    pub parcels: Vec<Parcel>,
    pub location: Location,
    pub people: People,
    pub document_access: DocumentAccess,
    pub metadata: Metadata,
}

impl Record {
    /// A record with the fixed defaults every listing-derived record starts from.
    pub fn with_accession(accession: impl Into<String>) -> Self {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        Self {
            basic_info: BasicInfo {
                accession: accession.into(),
                record_type: RECORD_TYPE.to_string(),
                ..Default::default()
            },
            metadata: Metadata {
                scraped_date: today.clone(),
                last_updated: today,
            },
            ..Default::default()
        }
    }

    pub fn accession(&self) -> &str {
        &self.basic_info.accession
    }

    /// Rebuild `location.legal_description` from the current parcels.
    pub fn rebuild_legal_description(&mut self) {
        let description = self
            .parcels
            .iter()
            .map(Parcel::legal_description)
            .collect::<Vec<_>>()
            .join("; ");
        self.location.legal_description = Some(description);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct County {
    pub id: String,
    pub name: String,
}

/// One (state, county) pair being crawled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlUnit {
    pub state_name: String,
    pub state_abbr: String,
    pub county_id: String,
    pub county_name: String,
}

impl CrawlUnit {
    pub fn new(state: &StateEntry, county: &County) -> Self {
        Self {
            state_name: state.state.clone(),
            state_abbr: state.abbreviation.clone(),
            county_id: county.id.clone(),
            county_name: county.name.clone(),
        }
    }
}

impl fmt::Display for CrawlUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} County ({}), {} ({})",
            self.county_name, self.county_id, self.state_name, self.state_abbr
        )
    }
}

/// One entry of the pre-built state/county input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub state: String,
    pub abbreviation: String,
    #[serde(default)]
    pub counties: Vec<County>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_type_picks_first_known_icon() {
        let markup = r#"<img src="/images/warrantee.png"> JONES"#;
        assert_eq!(PersonType::from_markup(markup), PersonType::Warrantee);
        assert_eq!(PersonType::from_markup("JONES"), PersonType::Unknown);
    }

    #[test]
    fn legal_description_joins_parcels() {
        let mut record = Record::with_accession("AL0010__.001");
        record.parcels = vec![
            Parcel {
                meridian: "Huntsville".into(),
                township_range: "3S 1W".into(),
                aliquots: "NE¼".into(),
                section_number: "12".into(),
                county: "Madison".into(),
            },
            Parcel {
                meridian: "Huntsville".into(),
                township_range: "3S 1W".into(),
                aliquots: "SW¼".into(),
                section_number: "13".into(),
                county: "Madison".into(),
            },
        ];
        record.rebuild_legal_description();
        assert_eq!(
            record.location.legal_description.as_deref(),
            Some(
                "NE¼ of Section 12, 3S 1W, Huntsville Meridian, Madison County; \
                 SW¼ of Section 13, 3S 1W, Huntsville Meridian, Madison County"
            )
        );
    }

    #[test]
    fn person_serializes_with_type_key() {
        let person = Person::new("SMITH, JOHN", PersonType::Patentee);
        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(json["type"], "patentee");
        assert!(json["additional_info"].is_null());
    }

    #[test]
    fn state_entry_without_counties_parses() {
        let entry: StateEntry =
            serde_json::from_str(r#"{"state":"Alabama","abbreviation":"AL"}"#).unwrap();
        assert!(entry.counties.is_empty());
    }
}
