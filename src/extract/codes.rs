use std::sync::LazyLock;

use regex::Regex;

use crate::model::CourseCode;

// Catalog headers sometimes omit the space ("CS3250"), so the separator is
// optional. Word boundaries keep "MATH 2410" from matching inside
// "AMATH 2410x"-style runs.
static COURSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,5})\s?(\d{4}[A-Z]?)\b").unwrap());
static CREDIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+(?:\.\d+)?)\]\s*$").unwrap());
static TERMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:FALL|SPRING|SUMMER|WINTER)(?:\s*,\s*(?:FALL|SPRING|SUMMER|WINTER))*)\b")
        .unwrap()
});

/// All course codes in `text`, first-occurrence order, not deduplicated.
/// Callers that need a set (e.g. allCourses) dedupe themselves.
pub fn find_course_codes(text: &str) -> Vec<CourseCode> {
    find_course_codes_at(text).into_iter().map(|(_, c)| c).collect()
}

/// Course codes with their byte offsets, for window scoring.
pub fn find_course_codes_at(text: &str) -> Vec<(usize, CourseCode)> {
    COURSE_RE
        .captures_iter(text)
        .map(|caps| {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            (start, CourseCode::new(&caps[1], &caps[2]))
        })
        .collect()
}

/// Trailing bracketed credit-hour annotation: "... [3]" or "... [4.5]".
pub fn find_credit_hours(text: &str) -> Option<f32> {
    CREDIT_RE
        .captures(text.trim_end())
        .and_then(|caps| caps[1].parse().ok())
}

/// Comma-separated run of term tokens, uppercased: "FALL, SPRING" ->
/// ["FALL", "SPRING"]. None when no term token appears.
pub fn find_terms_offered(text: &str) -> Option<Vec<String>> {
    let caps = TERMS_RE.captures(text)?;
    let terms: Vec<String> = caps[1]
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() { None } else { Some(terms) }
}
