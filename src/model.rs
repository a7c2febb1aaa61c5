use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical course identifier: `DEPT NNNN[L]`.
///
/// Department is stored uppercased so derived equality/hashing is
/// case-insensitive with respect to the input text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseCode {
    pub department: String,
    pub number: String,
}

impl CourseCode {
    pub fn new(department: &str, number: &str) -> Self {
        Self {
            department: department.to_uppercase(),
            number: number.to_uppercase(),
        }
    }

    /// Parse "CS 3250", "cs3250" or "MATH 2410W". Returns None for anything
    /// that is not exactly one course code.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let split = trimmed.find(|c: char| c.is_ascii_digit())?;
        let (dept, num) = trimmed.split_at(split);
        let dept = dept.trim();
        if dept.len() < 2 || dept.len() > 5 || !dept.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let digits: String = num.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() != 4 {
            return None;
        }
        let rest = &num[digits.len()..];
        let suffix = match rest.chars().next() {
            None => String::new(),
            Some(c) if c.is_ascii_alphabetic() && rest.len() == 1 => c.to_string(),
            Some(_) => return None,
        };
        Some(Self::new(dept, &format!("{}{}", digits, suffix)))
    }

    /// Numeric part of the course number, e.g. 3250 for "3250W".
    pub fn numeric(&self) -> u32 {
        self.number
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0)
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.department, self.number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrereqType {
    None,
    Single,
    And,
    Or,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteRecord {
    pub course_id: CourseCode,
    pub raw_text: String,
    #[serde(rename = "type")]
    pub prereq_type: PrereqType,
    pub courses: BTreeSet<CourseCode>,
    pub description: String,
    pub credit_hours: Option<f32>,
    pub terms_offered: Option<Vec<String>>,
    pub source_method: String,
    pub scraped_at: DateTime<Utc>,
}

/// Leaf "choose one of" group inside a subcategory, keyed by roman numeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementOption {
    pub order: String,
    pub description: String,
    pub courses: Vec<CourseCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementSubcategory {
    pub order: String,
    pub name: String,
    pub credit_hours: Option<String>,
    pub description: String,
    pub courses: Vec<CourseCode>,
    pub options: Vec<RequirementOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementCategory {
    pub order: u32,
    pub name: String,
    pub credit_hours: Option<String>,
    pub description: String,
    pub courses: Vec<CourseCode>,
    pub subcategories: Vec<RequirementSubcategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HonorsInfo {
    pub name: String,
    pub description: String,
    pub courses: Vec<CourseCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegreeRequirement {
    pub major: String,
    pub catalog_year: String,
    pub total_credit_hours: Option<u32>,
    pub categories: Vec<RequirementCategory>,
    pub all_courses: BTreeSet<CourseCode>,
    pub honors: Option<HonorsInfo>,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

/// Transient output of the section scorer. Never persisted.
#[derive(Debug, Clone)]
pub struct CandidateSection {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub score: i64,
}
