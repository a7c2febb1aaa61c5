use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::extract::codes;
use crate::model::{CourseCode, PrereqType, PrerequisiteRecord};

/// Ordered label cascade. Priority is list position: the first pattern that
/// matches wins, regardless of match length. Each captures the span after
/// the label up to the next sentence boundary, capped at 200 chars.
static LABEL_CASCADE: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("prerequisite", r"(?i)prerequisites?\s*:\s*([^.\n]{0,200})"),
        ("prereq", r"(?i)prereqs?\s*:\s*([^.\n]{0,200})"),
        ("required", r"(?i)required\s*:\s*([^.\n]{0,200})"),
        ("completion-of", r"(?i)completion of\s+([^.\n]{0,200})"),
        ("must-have-completed", r"(?i)must have completed\s+([^.\n]{0,200})"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

/// Whether any cascade label appears in `text`. Used by strategies to tell
/// a prerequisite hit from a plain course description.
pub fn has_label(text: &str) -> bool {
    LABEL_CASCADE.iter().any(|(_, re)| re.is_match(text))
}

/// Extract and normalize the prerequisite phrase from a course description.
/// Returns None when no label matches or the captured span is too short to
/// mean anything (≤3 chars).
pub fn extract(description: &str, course_id: &CourseCode) -> Option<PrerequisiteRecord> {
    let captured = LABEL_CASCADE
        .iter()
        .find_map(|(_, re)| re.captures(description).map(|caps| caps[1].to_string()))?;

    // Collapse internal whitespace, strip one trailing period.
    let captured = captured.split_whitespace().collect::<Vec<_>>().join(" ");
    let captured = captured.strip_suffix('.').unwrap_or(&captured).to_string();
    if captured.len() <= 3 {
        return None;
    }

    let mut courses: BTreeSet<CourseCode> = codes::find_course_codes(&captured)
        .into_iter()
        .collect();
    let cites_itself = courses.remove(course_id);

    // Offering metadata lives in the surrounding description, not in the
    // captured prerequisite span.
    let credit_hours = codes::find_credit_hours(description);
    let terms_offered = codes::find_terms_offered(description);

    // A course citing only itself is a catalog error, not "no prerequisite".
    if courses.is_empty() && cites_itself {
        return Some(PrerequisiteRecord {
            course_id: course_id.clone(),
            raw_text: captured,
            prereq_type: PrereqType::Error,
            courses: BTreeSet::new(),
            description: format!("{} lists itself as its own prerequisite", course_id),
            credit_hours,
            terms_offered,
            source_method: String::new(),
            scraped_at: Utc::now(),
        });
    }

    let lower = captured.to_lowercase();
    let prereq_type = if lower.contains("none") {
        PrereqType::None
    } else if lower.contains(" or ") {
        PrereqType::Or
    } else if lower.contains(';') || lower.contains(" and ") || courses.len() > 1 {
        PrereqType::And
    } else {
        PrereqType::Single
    };

    if prereq_type == PrereqType::None {
        courses.clear();
    }

    Some(PrerequisiteRecord {
        course_id: course_id.clone(),
        raw_text: captured.clone(),
        prereq_type,
        courses,
        description: captured,
        credit_hours,
        terms_offered,
        source_method: String::new(),
        scraped_at: Utc::now(),
    })
}

/// Cross-check course-number ordering. A prerequisite numbered at or above
/// the dependent course is suspect but not proof of error, so this returns
/// warnings for the caller to log rather than rejecting the record.
pub fn validate_ordering(record: &PrerequisiteRecord) -> Vec<String> {
    let own = record.course_id.numeric();
    record
        .courses
        .iter()
        .filter(|c| c.numeric() >= own)
        .map(|c| {
            format!(
                "{} requires {} with an equal or higher course number",
                record.course_id, c
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(number: &str) -> CourseCode {
        CourseCode::new("CS", number)
    }

    #[test]
    fn and_pair_with_terms_and_hours() {
        let text = "Prerequisite: CS 2201, CS 2212. FALL, SPRING. [3]";
        let record = extract(text, &cs("3250")).unwrap();
        assert_eq!(record.prereq_type, PrereqType::And);
        assert_eq!(
            record.courses,
            [cs("2201"), cs("2212")].into_iter().collect()
        );
        assert_eq!(record.credit_hours, Some(3.0));
        assert_eq!(
            record.terms_offered.as_deref().unwrap(),
            ["FALL", "SPRING"]
        );
    }

    #[test]
    fn single() {
        let record = extract("Prerequisite: CS 2201.", &cs("3250")).unwrap();
        assert_eq!(record.prereq_type, PrereqType::Single);
        assert_eq!(record.courses.len(), 1);
    }

    #[test]
    fn or_choice() {
        let record = extract("Prerequisite: MATH 1300 or MATH 1301.", &cs("2201")).unwrap();
        assert_eq!(record.prereq_type, PrereqType::Or);
        assert_eq!(record.courses.len(), 2);
    }

    #[test]
    fn explicit_none() {
        let record = extract("Prerequisite: none required.", &cs("1101")).unwrap();
        assert_eq!(record.prereq_type, PrereqType::None);
        assert!(record.courses.is_empty());
    }

    #[test]
    fn self_reference_is_error() {
        let record = extract("Prerequisite: CS 3250.", &cs("3250")).unwrap();
        assert_eq!(record.prereq_type, PrereqType::Error);
        assert!(record.courses.is_empty());
        assert!(record.description.contains("itself"));
    }

    #[test]
    fn self_among_others_dropped_silently() {
        let record = extract("Prerequisite: CS 3250, CS 2201.", &cs("3250")).unwrap();
        assert_ne!(record.prereq_type, PrereqType::Error);
        assert!(!record.courses.contains(&cs("3250")));
        assert!(record.courses.contains(&cs("2201")));
    }

    #[test]
    fn never_contains_own_code() {
        for text in [
            "Prerequisite: CS 3250.",
            "Prereq: CS 3250 and CS 2201.",
            "Must have completed CS 3250 or CS 2212.",
        ] {
            if let Some(record) = extract(text, &cs("3250")) {
                assert!(!record.courses.contains(&cs("3250")), "in: {}", text);
            }
        }
    }

    #[test]
    fn cascade_priority_is_list_order() {
        // Both labels present: "prerequisite" wins because it is first.
        let record = extract(
            "Must have completed CS 1101. Prerequisite: CS 2201.",
            &cs("3250"),
        )
        .unwrap();
        assert_eq!(record.courses, [cs("2201")].into_iter().collect());
    }

    #[test]
    fn alternate_labels() {
        assert!(extract("Prereqs: CS 2201.", &cs("3250")).is_some());
        assert!(extract("Required: CS 2201.", &cs("3250")).is_some());
        assert!(extract("Completion of CS 2201 is expected.", &cs("3250")).is_some());
    }

    #[test]
    fn no_label_no_record() {
        assert!(extract("A survey of programming languages.", &cs("3250")).is_none());
    }

    #[test]
    fn tiny_capture_rejected() {
        assert!(extract("Prerequisite: no.", &cs("3250")).is_none());
    }

    #[test]
    fn whitespace_collapsed() {
        let record = extract("Prerequisite:   CS   2201\tand  CS 2212.", &cs("3250")).unwrap();
        assert_eq!(record.raw_text, "CS 2201 and CS 2212");
    }

    #[test]
    fn ordering_warning_on_higher_prereq() {
        let record = extract("Prerequisite: CS 4240.", &cs("3250")).unwrap();
        let warnings = validate_ordering(&record);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("CS 4240"));
    }

    #[test]
    fn ordering_clean_on_lower_prereq() {
        let record = extract("Prerequisite: CS 2201.", &cs("3250")).unwrap();
        assert!(validate_ordering(&record).is_empty());
    }
}
