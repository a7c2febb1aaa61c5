use std::sync::LazyLock;

use regex::Regex;

use crate::extract::codes;
use crate::model::{CourseCode, HonorsInfo, RequirementCategory, RequirementOption, RequirementSubcategory};

static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)\.\s+(.+)$").unwrap());
static SUBCAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*([a-z])\.\s+(.+)$").unwrap());
static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([ivxlc]+)\.\s+(.+)$").unwrap());
static HOURS_ANNOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(([^()]*?)\s*hours?\)").unwrap());
static TOTAL_HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:total\s*:?\s*(?:of\s+)?|requires\s+)(\d{2,3})\s*(?:credit\s+)?hours")
        .unwrap()
});
static HONORS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(.{0,60}\bhonors\b.{0,60})\s*$").unwrap());

/// Parse a located requirements section into the category tree. Three
/// levels: `1.` categories, `a.` subcategories, `i.`/`ii.` options. Prose
/// that matches no marker stays attached to the enclosing node and is still
/// scanned for course codes; a node's course list is its own matches
/// followed by the concatenation (not deduplication) of its children's.
pub fn structure(section_text: &str) -> Vec<RequirementCategory> {
    let lines: Vec<&str> = section_text.lines().collect();
    let mut categories = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = CATEGORY_RE.captures(lines[i]) else {
            // Preamble prose before the first numbered marker belongs to no
            // category.
            i += 1;
            continue;
        };
        let order: u32 = caps[1].parse().unwrap_or(0);
        let header = caps[2].to_string();
        let body_start = i + 1;
        let mut j = body_start;
        while j < lines.len() && !CATEGORY_RE.is_match(lines[j]) {
            j += 1;
        }
        categories.push(build_category(order, &header, &lines[body_start..j]));
        i = j;
    }

    categories
}

fn build_category(order: u32, header: &str, body: &[&str]) -> RequirementCategory {
    let (name, credit_hours) = split_hours(header);
    let mut own_prose = Vec::new();
    let mut subcategories = Vec::new();
    let mut expected = 'a';
    let mut i = 0;

    while i < body.len() {
        let Some(caps) = subcat_marker(body[i], expected) else {
            own_prose.push(body[i]);
            i += 1;
            continue;
        };
        let sub_order = caps[1].to_string();
        let sub_header = caps[2].to_string();
        expected = (expected as u8 + 1) as char;
        let start = i + 1;
        let mut j = start;
        while j < body.len() && subcat_marker(body[j], expected).is_none() {
            j += 1;
        }
        subcategories.push(build_subcategory(&sub_order, &sub_header, &body[start..j]));
        i = j;
    }

    let description = own_prose.join("\n").trim().to_string();
    let mut courses = codes::find_course_codes(&format!("{}\n{}", header, description));
    for sub in &subcategories {
        courses.extend(sub.courses.iter().cloned());
    }

    RequirementCategory {
        order,
        name,
        credit_hours,
        description,
        courses,
        subcategories,
    }
}

/// A lettered marker opens a subcategory only when its letter is the next
/// one in sequence. Single-letter roman numerals (`i.`, `v.`, `x.`) match
/// the same line shape and must stay in the current body as options.
fn subcat_marker<'t>(line: &'t str, expected: char) -> Option<regex::Captures<'t>> {
    SUBCAT_RE
        .captures(line)
        .filter(|caps| caps[1].starts_with(expected))
}

fn build_subcategory(order: &str, header: &str, body: &[&str]) -> RequirementSubcategory {
    let (name, credit_hours) = split_hours(header);
    let mut own_prose = Vec::new();
    let mut options = Vec::new();
    let mut i = 0;

    while i < body.len() {
        let Some(caps) = OPTION_RE.captures(body[i]) else {
            own_prose.push(body[i]);
            i += 1;
            continue;
        };
        let opt_order = caps[1].to_string();
        let mut text = vec![caps[2].to_string()];
        let mut j = i + 1;
        while j < body.len() && !OPTION_RE.is_match(body[j]) && !body[j].trim().is_empty() {
            text.push(body[j].trim().to_string());
            j += 1;
        }
        let description = text.join(" ");
        options.push(RequirementOption {
            order: opt_order,
            courses: codes::find_course_codes(&description),
            description,
        });
        i = j;
    }

    let description = own_prose.join("\n").trim().to_string();
    let mut courses = codes::find_course_codes(&format!("{}\n{}", header, description));
    for opt in &options {
        courses.extend(opt.courses.iter().cloned());
    }

    RequirementSubcategory {
        order: order.to_string(),
        name,
        credit_hours,
        description,
        courses,
        options,
    }
}

/// Split an inline "(X hours)" annotation off a heading. Missing annotation
/// means None, never zero.
fn split_hours(header: &str) -> (String, Option<String>) {
    match HOURS_ANNOT_RE.captures(header) {
        Some(caps) => {
            let hours = caps[1].trim().to_string();
            let name = HOURS_ANNOT_RE.replace(header, "").trim().to_string();
            (name, Some(hours))
        }
        None => (header.trim().to_string(), None),
    }
}

/// Total credit hours for the degree, from "Total: 120 hours" or
/// "requires 120 credit hours" phrasing.
pub fn find_total_hours(text: &str) -> Option<u32> {
    TOTAL_HOURS_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Honors program blurb inside a requirements section: a short line naming
/// an honors program, plus the paragraph that follows it.
pub fn find_honors(text: &str) -> Option<HonorsInfo> {
    let lines: Vec<&str> = text.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = HONORS_RE.captures(line) else {
            continue;
        };
        let name = caps[1].trim().to_string();
        let description: String = lines[i + 1..]
            .iter()
            .take_while(|l| !l.trim().is_empty())
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join(" ");
        let courses: Vec<CourseCode> = codes::find_course_codes(&description);
        return Some(HonorsInfo {
            name,
            description,
            courses,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = "\
1. Core Computer Science (31 hours)
Required of all majors: CS 1101, CS 2201, CS 2212, CS 3250, CS 3251,
CS 3270, and CS 4959.
a. Systems (6 hours)
CS 2231 and CS 3281.
b. Theory
Choose from the approved list:
i. CS 4260 or CS 4262.
ii. CS 3252.

2. Mathematics (15 hours)
MATH 1300, MATH 1301, MATH 2410, and MATH 2810 or MATH 2820.
";

    #[test]
    fn category_split() {
        let cats = structure(SECTION);
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].order, 1);
        assert_eq!(cats[0].name, "Core Computer Science");
        assert_eq!(cats[0].credit_hours.as_deref(), Some("31"));
        assert_eq!(cats[1].name, "Mathematics");
        assert_eq!(cats[1].credit_hours.as_deref(), Some("15"));
    }

    #[test]
    fn subcategories_and_options() {
        let cats = structure(SECTION);
        let subs = &cats[0].subcategories;
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].order, "a");
        assert_eq!(subs[0].name, "Systems");
        assert_eq!(subs[0].credit_hours.as_deref(), Some("6"));
        assert_eq!(subs[1].order, "b");
        assert_eq!(subs[1].credit_hours, None);
        let opts = &subs[1].options;
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].order, "i");
        assert_eq!(opts[0].courses.len(), 2);
        assert_eq!(opts[1].order, "ii");
        assert_eq!(opts[1].courses, vec![CourseCode::new("CS", "3252")]);
    }

    #[test]
    fn out_of_sequence_letters_stay_options() {
        // "i." and "v." satisfy the single-letter marker shape; only the
        // next letter in sequence may open a subcategory.
        let cats = structure(
            "1. Electives\n\
             a. Approved sequences\n\
             i. BSCI 1510 and BSCI 1511.\n\
             ii. CHEM 1601 and CHEM 1602.\n\
             v. PHYS 1601.",
        );
        let subs = &cats[0].subcategories;
        assert_eq!(subs.len(), 1);
        let orders: Vec<&str> = subs[0].options.iter().map(|o| o.order.as_str()).collect();
        assert_eq!(orders, ["i", "ii", "v"]);
        assert_eq!(subs[0].courses.len(), 5);
    }

    #[test]
    fn parent_courses_concatenate_children() {
        let cats = structure(SECTION);
        let core = &cats[0];
        // 7 own + 2 systems + 3 theory options = 12, duplicates kept.
        assert_eq!(core.courses.len(), 12);
        assert_eq!(core.subcategories[0].courses.len(), 2);
        assert_eq!(core.subcategories[1].courses.len(), 3);
    }

    #[test]
    fn course_count_round_trips() {
        let total: usize = structure(SECTION).iter().map(|c| c.courses.len()).sum();
        assert_eq!(total, codes::find_course_codes(SECTION).len());
    }

    #[test]
    fn missing_hours_is_none() {
        let cats = structure("1. Writing Requirement\nComplete ENGL 1250W.");
        assert_eq!(cats[0].credit_hours, None);
        assert_eq!(cats[0].courses, vec![CourseCode::new("ENGL", "1250W")]);
    }

    #[test]
    fn prose_only_category_still_scanned() {
        let cats = structure(
            "1. Breadth (18 hours)\nAny approved humanities sequence, for example HIST 1200.",
        );
        assert_eq!(cats[0].subcategories.len(), 0);
        assert_eq!(cats[0].courses, vec![CourseCode::new("HIST", "1200")]);
        assert!(cats[0].description.contains("humanities"));
    }

    #[test]
    fn no_markers_no_categories() {
        assert!(structure("Just a paragraph about advising.").is_empty());
    }

    #[test]
    fn fixture_section_parses() {
        let doc = std::fs::read_to_string("tests/fixtures/cs_catalog.txt").unwrap();
        let start = doc.find("1. Core").unwrap();
        let cats = structure(&doc[start..]);
        assert_eq!(cats.len(), 3);
        assert_eq!(cats[2].name, "Science Electives");
        assert!(cats[2]
            .courses
            .contains(&CourseCode::new("PHYS", "1601A")));
    }

    #[test]
    fn total_hours() {
        assert_eq!(find_total_hours("Total: 120 hours."), Some(120));
        assert_eq!(find_total_hours("requires 120 credit hours"), Some(120));
        assert_eq!(find_total_hours("no total given"), None);
    }

    #[test]
    fn honors_blurb() {
        let text = "Departmental Honors Program\nOpen to seniors who complete CS 4998 \
                    and CS 4999 with distinction.\n\nUnrelated paragraph.";
        let honors = find_honors(text).unwrap();
        assert!(honors.name.contains("Honors"));
        assert_eq!(honors.courses.len(), 2);
    }

    #[test]
    fn no_honors() {
        assert!(find_honors("1. Core (31 hours)\nCS 1101.").is_none());
    }
}
