//! Detail page enrichment.
//!
//! Every field is looked up by element id first. When the id is missing, the
//! first text matching the field's label (case-insensitive) is found and the
//! text of its parent's next sibling element is taken instead. Fields are
//! independent: one that can't be read keeps its listing value.

use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use crate::model::{PersonType, Record};
use crate::names::parse_people;
use crate::parse::element_text;

/// Where a detail page value lands in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Cancelled,
    LandOffice,
    Authority,
    DocClass,
    State,
    Accession,
    IssueDate,
    UsReservations,
    MineralReservations,
    Tribe,
    Militia,
    StateInFavorOf,
    DocNumber,
    TotalAcres,
    MiscDocNumber,
    SurveyDate,
    BlmSerialNumber,
    GeographicName,
    IndianAllotmentNumber,
    MetesAndBounds,
    MilitaryRank,
}

impl Target {
    pub fn apply(self, record: &mut Record, value: String) {
        match self {
            Target::Cancelled => record.basic_info.cancelled = Some(value),
            Target::LandOffice => record.misc_info.land_office = Some(value),
            Target::Authority => record.misc_info.authority = Some(value),
            Target::DocClass => record.basic_info.doc_class = Some(value),
            Target::State => record.location.state = value,
            Target::Accession => record.basic_info.accession = value,
            Target::IssueDate => record.dates.issue_date = value,
            Target::UsReservations => record.misc_info.us_reservations = Some(value),
            Target::MineralReservations => record.misc_info.mineral_reservations = Some(value),
            Target::Tribe => record.misc_info.tribe = Some(value),
            Target::Militia => record.misc_info.militia = Some(value),
            Target::StateInFavorOf => record.misc_info.state_in_favor_of = Some(value),
            Target::DocNumber => record.document_numbers.doc_number = value,
            Target::TotalAcres => record.survey_info.total_acres = Some(value),
            Target::MiscDocNumber => record.document_numbers.misc_doc_number = Some(value),
            Target::SurveyDate => record.survey_info.survey_date = Some(value),
            Target::BlmSerialNumber => record.document_numbers.blm_serial_number = Some(value),
            Target::GeographicName => record.survey_info.geographic_name = Some(value),
            Target::IndianAllotmentNumber => {
                record.document_numbers.indian_allotment_number = Some(value)
            }
            Target::MetesAndBounds => record.survey_info.metes_and_bounds = Some(value),
            Target::MilitaryRank => record.people.military_rank = Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DetailField {
    /// Element id, if the page has one for this field.
    pub id: Option<&'static str>,
    /// Label pattern used when the id lookup fails.
    pub label: &'static str,
    pub target: Target,
}

const fn field(id: &'static str, label: &'static str, target: Target) -> DetailField {
    DetailField {
        id: Some(id),
        label,
        target,
    }
}

pub const DETAIL_FIELDS: [DetailField; 21] = [
    field("cancelled", "Cancelled", Target::Cancelled),
    field("landOffice", "Land Office", Target::LandOffice),
    field("authority", "Authority", Target::Authority),
    field("documentType", "Document Type", Target::DocClass),
    field("stateName", "State", Target::State),
    field("accessionNr", "Accession", Target::Accession),
    field("issueDate", "Issue Date", Target::IssueDate),
    field("usReservations", "US Reservations", Target::UsReservations),
    field("mineralReservations", "Mineral Reservations", Target::MineralReservations),
    field("tribe", "Tribe", Target::Tribe),
    field("militia", "Militia", Target::Militia),
    field("stateInFavorOf", "State In Favor Of:", Target::StateInFavorOf),
    field("documentNr", "Document Nr", Target::DocNumber),
    field("totalAcres", "Total Acres", Target::TotalAcres),
    field("miscDocumentNr", "Misc. Doc. Nr", Target::MiscDocNumber),
    field("surveyDate", "Survey Date", Target::SurveyDate),
    field("blmSerialNr", "BLM Serial Nr", Target::BlmSerialNumber),
    field("geographicName", "Geographic Name", Target::GeographicName),
    field("indianAllotmentNr", "Indian Allot. Nr", Target::IndianAllotmentNumber),
    field("metesBounds", "Metes/Bounds", Target::MetesAndBounds),
    DetailField {
        id: None,
        label: "Military Rank",
        target: Target::MilitaryRank,
    },
];

const NAMES_ID: &str = "names";

pub struct DetailPage {
    doc: Html,
}

impl DetailPage {
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
        }
    }

    fn by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(id))
    }

    /// Text of the element following the first label matching `pattern`.
    fn by_label(&self, pattern: &Regex) -> Option<String> {
        let label = self.doc.root_element().descendants().find(|node| {
            node.value()
                .as_text()
                .is_some_and(|text| pattern.is_match(text))
        })?;
        let sibling = label.parent()?.next_siblings().find_map(ElementRef::wrap)?;
        Some(element_text(sibling))
    }

    /// Value of one field, id first, then label.
    pub fn lookup(&self, field: &DetailField) -> Result<Option<String>, regex::Error> {
        if let Some(el) = field.id.and_then(|id| self.by_id(id)) {
            return Ok(Some(element_text(el)));
        }
        let pattern = RegexBuilder::new(field.label)
            .case_insensitive(true)
            .build()?;
        Ok(self.by_label(&pattern))
    }

    /// Raw markup of the names block, if any.
    pub fn names_markup(&self) -> Option<String> {
        self.by_id(NAMES_ID).map(|el| el.html())
    }
}

/// Applies a fetched detail page to a listing-derived record.
///
/// Never touches the parcels; only overwrites or fills fields.
pub fn enrich_from_html(record: &mut Record, html: &str, state_name: &str) {
    record.location.state_name = Some(state_name.to_string());
    record.rebuild_legal_description();

    let page = DetailPage::parse(html);
    for field in &DETAIL_FIELDS {
        match page.lookup(field) {
            Ok(Some(value)) => field.target.apply(record, value),
            Ok(None) => debug!(label = field.label, "field not on detail page"),
            Err(e) => warn!(
                accession = record.accession(),
                label = field.label,
                error = %e,
                "couldn't extract detail field"
            ),
        }
    }

    if let Some(markup) = page.names_markup() {
        let people = parse_people(&markup);
        let of_kind = |kind: PersonType| -> Vec<_> {
            people.iter().filter(|p| p.kind == kind).cloned().collect()
        };

        let patentees = of_kind(PersonType::Patentee);
        if !patentees.is_empty() {
            record.people.patentees = patentees;
        }
        let warrantees = of_kind(PersonType::Warrantee);
        if !warrantees.is_empty() {
            record.people.warrantees = Some(warrantees);
        }
        let assignees = of_kind(PersonType::Assignee);
        if !assignees.is_empty() {
            record.people.assignees = Some(assignees);
        }
    }
}
