use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::extract::prereq;
use crate::model::{CourseCode, PrereqType, PrerequisiteRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Already-rendered page text plus metadata, as supplied by the external
/// page-rendering layer. The engine never issues network calls itself.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub text: String,
    pub url: String,
    pub title: String,
}

/// The external fetch collaborator. Implementations own their transport,
/// timeouts and retries; a failed fetch surfaces as an Err that the
/// orchestrator logs and skips.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedPage>>;
}

/// One attempt's outcome. `prerequisites: None` means "Not found": the
/// source answered but had no prerequisite text for this course.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub prerequisites: Option<String>,
    pub found_course: bool,
    pub url: Option<String>,
    pub excerpt: Option<String>,
}

impl ExtractionAttempt {
    pub fn not_found() -> Self {
        Self {
            prerequisites: None,
            found_course: false,
            url: None,
            excerpt: None,
        }
    }
}

/// One named method of locating source text for a course.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> u32;
    /// Remote strategies pay the politeness delay between attempts.
    fn is_remote(&self) -> bool {
        true
    }
    fn run<'a>(&'a self, course: &'a CourseCode) -> BoxFuture<'a, Result<ExtractionAttempt>>;
}

/// Audit-trail entry, recorded for every strategy invoked, success or not.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptLogEntry {
    pub strategy: String,
    pub found_course: bool,
    pub prerequisites: Option<String>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Result of one orchestrated run. `found` distinguishes "verified no
/// prerequisite" (every source answered "Not found") from a real hit;
/// `normalized` is false when a winning raw text resisted normalization and
/// the record carries it unparsed. The record itself is always present.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub found: bool,
    pub normalized: bool,
    pub record: PrerequisiteRecord,
    pub attempts: Vec<AttemptLogEntry>,
}

/// Try every strategy in priority order. Individual failures are recorded
/// and skipped, never propagated. The first hit supplies the winning raw
/// text, but lower-priority strategies still run for the audit trail unless
/// the config short-circuits. A run deadline, if set, is checked between
/// strategies only; an in-flight strategy is never interrupted.
pub async fn resolve(
    course: &CourseCode,
    strategies: &[Box<dyn Strategy>],
    config: &EngineConfig,
) -> Resolution {
    let mut order: Vec<&dyn Strategy> = strategies.iter().map(|s| s.as_ref()).collect();
    order.sort_by_key(|s| s.priority());

    let started = Instant::now();
    let deadline = config.run_timeout_ms.map(Duration::from_millis);
    let delay = Duration::from_millis(config.inter_request_delay_ms);

    let mut attempts: Vec<AttemptLogEntry> = Vec::new();
    let mut winner: Option<(String, String)> = None;
    let mut slept_once = false;

    for strategy in order {
        if let Some(limit) = deadline {
            if started.elapsed() >= limit {
                warn!(
                    "run deadline reached after {} attempts for {}",
                    attempts.len(),
                    course
                );
                break;
            }
        }
        if winner.is_some() && config.short_circuit_on_first_hit {
            break;
        }
        if strategy.is_remote() {
            // Politeness delay between remote attempts, not before the first.
            if slept_once {
                tokio::time::sleep(delay).await;
            }
            slept_once = true;
        }

        debug!("trying strategy '{}' for {}", strategy.name(), course);
        match strategy.run(course).await {
            Ok(attempt) => {
                if winner.is_none() {
                    if let Some(raw) = &attempt.prerequisites {
                        info!("'{}' found prerequisites for {}", strategy.name(), course);
                        winner = Some((strategy.name().to_string(), raw.clone()));
                    }
                }
                attempts.push(AttemptLogEntry {
                    strategy: strategy.name().to_string(),
                    found_course: attempt.found_course,
                    prerequisites: attempt.prerequisites,
                    error: None,
                    at: Utc::now(),
                });
            }
            Err(e) => {
                warn!("strategy '{}' failed for {}: {}", strategy.name(), course, e);
                attempts.push(AttemptLogEntry {
                    strategy: strategy.name().to_string(),
                    found_course: false,
                    prerequisites: None,
                    error: Some(e.to_string()),
                    at: Utc::now(),
                });
            }
        }
    }

    match winner {
        Some((method, raw)) => {
            let (record, normalized) = match prereq::extract(&raw, course) {
                Some(mut record) => {
                    record.source_method = method;
                    for warning in prereq::validate_ordering(&record) {
                        warn!("{}", warning);
                    }
                    (record, true)
                }
                None => {
                    // Source claimed a hit but the phrase did not survive
                    // normalization; keep the raw text for review.
                    warn!("winning text for {} did not normalize: {:?}", course, raw);
                    (empty_record(course, PrereqType::None, &raw, &method), false)
                }
            };
            Resolution {
                found: true,
                normalized,
                record,
                attempts,
            }
        }
        None => Resolution {
            found: false,
            normalized: true,
            record: empty_record(course, PrereqType::None, "", ""),
            attempts,
        },
    }
}

fn empty_record(
    course: &CourseCode,
    prereq_type: PrereqType,
    raw: &str,
    method: &str,
) -> PrerequisiteRecord {
    PrerequisiteRecord {
        course_id: course.clone(),
        raw_text: raw.to_string(),
        prereq_type,
        courses: BTreeSet::new(),
        description: String::new(),
        credit_hours: None,
        terms_offered: None,
        source_method: method.to_string(),
        scraped_at: Utc::now(),
    }
}

/// Strategy that fetches a page by URL template (`{dept}` / `{number}`
/// placeholders) and slices out the text following the course's own
/// heading.
pub struct PageStrategy {
    pub name: String,
    pub priority: u32,
    pub remote: bool,
    pub url_template: String,
    pub fetcher: Arc<dyn Fetcher>,
}

impl Strategy for PageStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn run<'a>(&'a self, course: &'a CourseCode) -> BoxFuture<'a, Result<ExtractionAttempt>> {
        Box::pin(async move {
            let url = self
                .url_template
                .replace("{dept}", &course.department.to_lowercase())
                .replace("{number}", &course.number.to_lowercase());
            let page = self.fetcher.fetch(&url).await?;
            Ok(attempt_from_page(&page, course))
        })
    }
}

/// Slice the course's description out of a rendered page: the text after
/// the first occurrence of the course code (spaced or not), capped at 600
/// chars. The code is matched case-insensitively in place; positions from a
/// lowercased copy are not valid offsets into the original text. The slice
/// counts as a prerequisite hit only when it carries a prerequisite label.
fn attempt_from_page(page: &FetchedPage, course: &CourseCode) -> ExtractionAttempt {
    let spaced = course.to_string();
    let compact = format!("{}{}", course.department, course.number);
    let heading_re = Regex::new(&format!(
        "(?i)(?:{}|{})",
        regex::escape(&spaced),
        regex::escape(&compact)
    ))
    .expect("escaped course code is a valid pattern");

    let Some(m) = heading_re.find(&page.text) else {
        return ExtractionAttempt::not_found();
    };

    let mut cut = page.text.len().min(m.end() + 600);
    while !page.text.is_char_boundary(cut) {
        cut += 1;
    }
    let excerpt = page.text[m.start()..cut].to_string();

    let prerequisites = if prereq::has_label(&excerpt) {
        Some(excerpt.clone())
    } else {
        None
    };

    ExtractionAttempt {
        prerequisites,
        found_course: true,
        url: Some(page.url.clone()),
        excerpt: Some(excerpt),
    }
}
