use std::sync::LazyLock;

use regex::Regex;

use crate::config::EngineConfig;
use crate::extract::codes;
use crate::model::CandidateSection;
use tracing::debug;

static PAGE_FOOTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)page \d+ of \d+").unwrap());

/// Find the best-matching section for `program` inside a full catalog
/// document. Every case-insensitive occurrence of the program name is a
/// candidate; each gets a surrounding window scored by the weight table.
/// Returns None when no occurrence survives the hard-reject filters.
pub fn locate(document: &str, program: &str, config: &EngineConfig) -> Option<CandidateSection> {
    if document.is_empty() || program.trim().is_empty() {
        return None;
    }

    let occurrence_re = Regex::new(&format!("(?i){}", regex::escape(program)))
        .expect("escaped program name is a valid pattern");

    let mut best: Option<CandidateSection> = None;

    for m in occurrence_re.find_iter(document) {
        if !at_word_boundary(document, m.start(), m.end()) {
            continue;
        }

        let start = floor_char_boundary(document, m.start().saturating_sub(config.window_before));
        let end = ceil_char_boundary(
            document,
            (m.end() + config.window_after).min(document.len()),
        );
        let window = &document[start..end];

        let Some(score) = score_window(window, program, config) else {
            debug!("hard-rejected occurrence at {}", m.start());
            continue;
        };
        debug!("occurrence at {} scored {}", m.start(), score);

        // Strict comparison keeps the leftmost window on ties.
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(CandidateSection {
                start,
                end,
                text: window.to_string(),
                score,
            });
        }
    }

    best
}

/// Additive score for one candidate window. None means hard reject: a
/// configured disambiguation phrase marks this as a different program's
/// section, and no score can save it.
fn score_window(window: &str, program: &str, config: &EngineConfig) -> Option<i64> {
    let lower = window.to_lowercase();

    for phrase in &config.hard_reject_phrases {
        if lower.contains(&phrase.to_lowercase()) {
            return None;
        }
    }

    let w = &config.weights;
    let mut score = 0i64;

    if lower.contains("major") {
        score += w.major_keyword;
    }
    if lower.contains("bachelor") {
        score += w.degree_keyword;
    }
    if lower.contains("degree") {
        score += w.degree_keyword;
    }
    if lower.contains("requirement") {
        score += w.requirement_keyword;
    }
    if lower.contains("credit hours") {
        score += w.credit_hours_keyword;
    }
    if lower.contains("prerequisite") {
        score += w.prerequisite_keyword;
    }
    if lower.contains("core") {
        score += w.core_elective_keyword;
    }
    if lower.contains("elective") {
        score += w.core_elective_keyword;
    }

    let course_weight = if config.core_keyword_mode {
        w.core_course_match
    } else {
        w.course_match
    };
    let found = codes::find_course_codes(window);
    score += course_weight * found.len() as i64;

    // Soft penalty when a competing program's codes outnumber the rest of
    // the window's codes.
    if !config.competing_departments.is_empty() {
        let competing = found
            .iter()
            .filter(|c| config.competing_departments.iter().any(|d| d.eq_ignore_ascii_case(&c.department)))
            .count() as i64;
        let own = found.len() as i64 - competing;
        if competing > own {
            score += w.competing_course_penalty * (competing - own);
        }
    }

    if PAGE_FOOTER_RE.is_match(window) {
        score += w.page_footer_penalty;
    }
    if looks_like_menu(window) {
        score += w.menu_block_penalty;
    }
    // Opening of the window = pre-match radius plus ~200 chars, so the
    // occurrence itself is always inside the slice examined for a title.
    let head_len = config.window_before + 200;
    if title_match(&lower, &program.to_lowercase(), head_len) {
        score += w.title_match_bonus;
    }

    Some(score)
}

/// Program name immediately followed by a program/degree keyword near the
/// top of the window, i.e. the occurrence is a section title rather than a
/// passing mention.
fn title_match(lower_window: &str, lower_program: &str, head_len: usize) -> bool {
    let head = &lower_window[..floor_char_boundary(lower_window, head_len.min(lower_window.len()))];
    head.match_indices(lower_program).any(|(pos, _)| {
        let after = head[pos + lower_program.len()..].trim_start_matches([' ', ',', '-', ':', '(']);
        ["major", "minor", "program", "degree", "bachelor", "b.s", "b.a", "bs", "ba"]
            .iter()
            .any(|kw| after.starts_with(kw))
    })
}

/// Navigation/menu blocks read as many very short lines.
fn looks_like_menu(window: &str) -> bool {
    let lines: Vec<&str> = window.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 5 {
        return false;
    }
    let total: usize = lines.iter().map(|l| l.trim().len()).sum();
    total / lines.len() < 15
}

fn at_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before_ok = start == 0
        || text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_alphanumeric());
    let after_ok = end == text.len()
        || text[end..].chars().next().is_some_and(|c| !c.is_alphanumeric());
    before_ok && after_ok
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn finds_requirements_section() {
        let doc = std::fs::read_to_string("tests/fixtures/cs_catalog.txt").unwrap();
        let section = locate(&doc, "Computer Science", &config()).unwrap();
        assert!(section.text.contains("CS 2201"));
        assert!(section.text.to_lowercase().contains("requirement"));
    }

    #[test]
    fn deterministic_tie_break() {
        let doc = std::fs::read_to_string("tests/fixtures/cs_catalog.txt").unwrap();
        let a = locate(&doc, "Computer Science", &config()).unwrap();
        let b = locate(&doc, "Computer Science", &config()).unwrap();
        assert_eq!(a.start, b.start);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn prefers_standalone_section_over_ece_mention() {
        // The fixture mentions "Computer Science" inside the ECE section
        // (a cross-reference surrounded by EECE codes) and again as its own
        // titled section. The titled section must win.
        let doc = std::fs::read_to_string("tests/fixtures/cs_catalog.txt").unwrap();
        let mut cfg = config();
        // Radius scaled down to the fixture so the two sections' windows
        // do not overlap.
        cfg.window_after = 600;
        cfg.competing_departments = vec!["ECE".to_string(), "EECE".to_string()];
        let section = locate(&doc, "Computer Science", &cfg).unwrap();
        assert!(section.text.contains("CS 3250"));
        assert!(!section.text.contains("ECE 2112"));
    }

    #[test]
    fn hard_reject_beats_score() {
        let doc = "Computer Science requirements: core courses CS 2201, CS 2212, \
                   CS 3250, CS 3251 with 120 credit hours for the bachelor degree.";
        let mut cfg = config();
        cfg.hard_reject_phrases = vec!["core courses".to_string()];
        assert!(locate(doc, "Computer Science", &cfg).is_none());
        cfg.hard_reject_phrases.clear();
        assert!(locate(doc, "Computer Science", &cfg).is_some());
    }

    #[test]
    fn word_boundary_rejects_substring() {
        let doc = "The Computer Sciences building is unrelated.";
        // "Computer Science" is a substring of "Computer Sciences".
        assert!(locate(doc, "Computer Science", &config()).is_none());
    }

    #[test]
    fn no_occurrence_is_none() {
        assert!(locate("Nothing relevant here.", "Computer Science", &config()).is_none());
    }

    #[test]
    fn empty_inputs_are_none() {
        assert!(locate("", "Computer Science", &config()).is_none());
        assert!(locate("some text", "  ", &config()).is_none());
    }

    #[test]
    fn title_bonus_prefers_headed_section() {
        let doc = "Many students enjoy Computer Science as a topic of conversation \
                   in the dining hall.\n\n\
                   Computer Science Major Requirements\n\
                   Complete CS 1101 and CS 2201 for 6 credit hours.";
        let section = locate(doc, "Computer Science", &config()).unwrap();
        assert!(section.text.contains("Major Requirements"));
    }

    #[test]
    fn core_keyword_mode_prefers_code_dense_window() {
        let filler = "Advising notes and contact information for the office.\n".repeat(3);
        let doc = format!(
            "Computer Science overview: degree requirements, bachelor study, \
             credit hours, electives.\n\
             {}\
             Computer Science listings: CS 1101, CS 2201, CS 2212, CS 3250, CS 3251.",
            filler
        );
        let mut cfg = config();
        // Small radii keep the two occurrences' windows disjoint.
        cfg.window_before = 0;
        cfg.window_after = 120;
        let plain = locate(&doc, "Computer Science", &cfg).unwrap();
        assert!(plain.text.contains("degree requirements"));
        cfg.core_keyword_mode = true;
        let core = locate(&doc, "Computer Science", &cfg).unwrap();
        assert!(core.text.contains("CS 3251"));
        assert!(core.score > plain.score);
    }

    #[test]
    fn footer_penalty_applies() {
        let clean = "Computer Science degree requirements: CS 2201. credit hours";
        let noisy = "Computer Science degree requirements: CS 2201. credit hours Page 3 of 12";
        let s_clean = locate(clean, "Computer Science", &config()).unwrap();
        let s_noisy = locate(noisy, "Computer Science", &config()).unwrap();
        assert!(s_noisy.score < s_clean.score);
    }
}
