pub mod codes;
pub mod degree;
pub mod prereq;
pub mod section;

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::model::DegreeRequirement;
use crate::record::{self, DegreeMeta};

/// Full degree pipeline: locate the major's section in the catalog text,
/// structure it, assemble the persisted document. Ok(None) is the normal
/// "section not found" outcome; empty inputs are caller errors.
pub fn extract_degree_requirement(
    document: &str,
    major: &str,
    catalog_year: &str,
    source: &str,
    config: &EngineConfig,
) -> Result<Option<DegreeRequirement>> {
    if document.trim().is_empty() {
        bail!("catalog text is empty");
    }
    if major.trim().is_empty() {
        bail!("major name is empty");
    }

    let Some(section) = section::locate(document, major, config) else {
        info!("no qualifying section for '{}'", major);
        return Ok(None);
    };
    info!(
        "section for '{}' at {}..{} (score {})",
        major, section.start, section.end, section.score
    );

    let categories = degree::structure(&section.text);
    if categories.is_empty() {
        warn!("section for '{}' matched but yielded no categories", major);
    }
    let meta = DegreeMeta {
        catalog_year: catalog_year.to_string(),
        source: source.to_string(),
        total_credit_hours: degree::find_total_hours(&section.text),
        honors: degree::find_honors(&section.text),
    };

    Ok(Some(record::to_degree_requirement(categories, major, meta)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CourseCode;

    #[test]
    fn end_to_end_on_fixture() {
        let doc = std::fs::read_to_string("tests/fixtures/cs_catalog.txt").unwrap();
        let req = extract_degree_requirement(
            &doc,
            "Computer Science",
            "2025-26",
            "tests/fixtures/cs_catalog.txt",
            &EngineConfig::default(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(req.major, "Computer Science");
        assert_eq!(req.total_credit_hours, Some(120));
        assert!(!req.categories.is_empty());
        assert!(req.all_courses.contains(&CourseCode::new("CS", "3250")));
        assert!(req.all_courses.contains(&CourseCode::new("MATH", "2410")));
    }

    #[test]
    fn missing_major_is_not_found() {
        let doc = std::fs::read_to_string("tests/fixtures/cs_catalog.txt").unwrap();
        let result = extract_degree_requirement(
            &doc,
            "Medieval Studies",
            "2025-26",
            "fixture",
            &EngineConfig::default(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn empty_inputs_are_errors() {
        let config = EngineConfig::default();
        assert!(extract_degree_requirement("", "CS", "2025", "x", &config).is_err());
        assert!(extract_degree_requirement("text", "", "2025", "x", &config).is_err());
    }

    #[test]
    fn partial_tree_still_returned() {
        // A matched section with no numbered markers yields an empty but
        // valid document, not an error.
        let doc = "Computer Science major requirements: see the department for \
                   details on CS 2201 and credit hours.";
        let req = extract_degree_requirement(
            doc,
            "Computer Science",
            "2025-26",
            "inline",
            &EngineConfig::default(),
        )
        .unwrap()
        .unwrap();
        assert!(req.categories.is_empty());
        assert!(req.all_courses.is_empty());
    }
}
