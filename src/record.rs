use std::collections::BTreeSet;

use chrono::Utc;
use tracing::warn;

use crate::model::{
    CourseCode, DegreeRequirement, HonorsInfo, PrereqType, PrerequisiteRecord, RequirementCategory,
};

/// Metadata accompanying a degree-requirement assembly.
#[derive(Debug, Clone)]
pub struct DegreeMeta {
    pub catalog_year: String,
    pub source: String,
    pub total_credit_hours: Option<u32>,
    pub honors: Option<HonorsInfo>,
}

/// Persisted shape for a prerequisite extraction, or None when the
/// extraction classified as ERROR: known-bad data is logged for operator
/// review instead of written.
pub fn to_prerequisite_record(record: PrerequisiteRecord) -> Option<PrerequisiteRecord> {
    if record.prereq_type == PrereqType::Error {
        warn!(
            "not persisting {}: {}",
            record.course_id, record.description
        );
        return None;
    }
    Some(record)
}

/// Assemble the persisted degree-requirement document. Pure assembly: the
/// structurer already guarantees the tree's shape. `allCourses` is the
/// deduplicated union of every category's (duplicate-preserving) list.
pub fn to_degree_requirement(
    categories: Vec<RequirementCategory>,
    major: &str,
    meta: DegreeMeta,
) -> DegreeRequirement {
    let all_courses: BTreeSet<CourseCode> = categories
        .iter()
        .flat_map(|c| c.courses.iter().cloned())
        .collect();

    DegreeRequirement {
        major: major.to_string(),
        catalog_year: meta.catalog_year,
        total_credit_hours: meta.total_credit_hours,
        categories,
        all_courses,
        honors: meta.honors,
        source: meta.source,
        last_updated: Utc::now(),
    }
}
