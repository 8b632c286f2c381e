//! Person extraction from a names cell.
//!
//! The archive marks every person in a cell with a small role icon
//! (`patentee.png`, `warrantee.png`, ...) followed by the name, one person per
//! line. A line may also hold several comma separated names sharing one icon.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Person, PersonType};
use crate::parse::{fragment_text, static_regex};

const BREAK: &str = "|BREAK|";
/// Column header lines that sometimes end up inside the cell.
const HEADER_LABELS: [&str; 2] = ["Patentee", "Warrantee"];

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_regex(&RE, r"(?i)<br\s*/?>")
}

/// Parses the markup of a names cell into people, in document order.
///
/// Never returns an empty list: if nothing could be recognised the whole cell
/// text becomes a single `unknown` person.
pub fn parse_people(cell_markup: &str) -> Vec<Person> {
    let marked = line_break_re().replace_all(cell_markup, BREAK);
    let text = fragment_text(&marked);

    // Markup and text are split on the same marker so their segments line up.
    let markup_parts: Vec<&str> = marked.split(BREAK).collect();
    let mut people = Vec::new();

    for (i, part) in text.trim().split(BREAK).enumerate() {
        let part = part.trim();
        if part.is_empty() || HEADER_LABELS.iter().any(|label| part.starts_with(label)) {
            continue;
        }

        let kind = PersonType::from_markup(markup_parts.get(i).copied().unwrap_or_default());
        people.extend(split_names(part, kind));
    }

    if people.is_empty() {
        people.push(Person::new(
            fragment_text(cell_markup).trim(),
            PersonType::Unknown,
        ));
    }
    people
}

/// Splits one line on commas.
///
/// Exactly two tokens with a short second token read as `LAST, FIRST` and stay
/// one name. This is a guess: two people whose second name is short
/// ("SMITH, JOHN DOE" vs "SMITH, JONES") can't be told apart.
fn split_names(line: &str, kind: PersonType) -> Vec<Person> {
    let names: Vec<&str> = line
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    let single_name = names.len() <= 1
        || (names.len() == 2 && names[1].split_whitespace().count() <= 2);

    if single_name {
        vec![Person::new(line, kind)]
    } else {
        names.into_iter().map(|name| Person::new(name, kind)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_and_kinds(people: &[Person]) -> Vec<(&str, PersonType)> {
        people.iter().map(|p| (p.name.as_str(), p.kind)).collect()
    }

    #[test]
    fn last_first_without_icon_is_one_unknown_person() {
        let people = parse_people("<td>SMITH, JOHN</td>");
        assert_eq!(names_and_kinds(&people), [("SMITH, JOHN", PersonType::Unknown)]);
        assert!(people[0].additional_info.is_none());
    }

    #[test]
    fn icons_assign_roles_per_line() {
        let cell = r#"<td><img src="/images/patentee.png" alt="">SMITH<br><img src="/images/warrantee.png" alt="">JONES</td>"#;
        let people = parse_people(cell);
        assert_eq!(
            names_and_kinds(&people),
            [("SMITH", PersonType::Patentee), ("JONES", PersonType::Warrantee)]
        );
    }

    #[test]
    fn all_break_spellings_split_lines() {
        let cell = r#"<img src="heir.png">A<br/><img src="widow.png">B<BR /><img src="assignee.png">C"#;
        let people = parse_people(cell);
        assert_eq!(
            names_and_kinds(&people),
            [
                ("A", PersonType::Heir),
                ("B", PersonType::Widow),
                ("C", PersonType::Assignee)
            ]
        );
    }

    #[test]
    fn long_comma_lists_split_into_people_sharing_the_icon() {
        let cell = r#"<img src="patentee.png">SMITH, JOHN, DOE, JANE"#;
        let people = parse_people(cell);
        assert_eq!(people.len(), 4);
        assert!(people.iter().all(|p| p.kind == PersonType::Patentee));
        assert_eq!(people[3].name, "JANE");
    }

    #[test]
    fn long_second_token_splits_two_names() {
        let people = parse_people("SMITH, JOHN HENRY ALBERT");
        assert_eq!(
            names_and_kinds(&people),
            [
                ("SMITH", PersonType::Unknown),
                ("JOHN HENRY ALBERT", PersonType::Unknown)
            ]
        );
    }

    #[test]
    fn two_word_second_token_stays_one_name() {
        // Boundary of the LAST, FIRST heuristic: still one person.
        let people = parse_people("SMITH, JOHN HENRY");
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "SMITH, JOHN HENRY");
    }

    #[test]
    fn header_lines_are_skipped() {
        let cell = r#"Patentee / Warrantee<br><img src="patentee.png">DOE, JANE"#;
        let people = parse_people(cell);
        assert_eq!(names_and_kinds(&people), [("DOE, JANE", PersonType::Patentee)]);
    }

    #[test]
    fn nothing_recognised_falls_back_to_whole_cell() {
        let people = parse_people("<td> Patentee </td>");
        assert_eq!(names_and_kinds(&people), [("Patentee", PersonType::Unknown)]);

        let people = parse_people("<td></td>");
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "");
    }
}
