use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Section-scoring signal weights. These are tuning data, not engine
/// constants: defaults below work for the Vanderbilt-style catalogs the
/// tool was built against, and a JSON config file can override any of them
/// per institution or per program.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScorerWeights {
    pub major_keyword: i64,
    pub degree_keyword: i64,
    pub requirement_keyword: i64,
    pub credit_hours_keyword: i64,
    pub prerequisite_keyword: i64,
    pub core_elective_keyword: i64,
    /// Per course-code match inside the window.
    pub course_match: i64,
    /// Per course-code match when disambiguating closely related programs.
    pub core_course_match: i64,
    pub title_match_bonus: i64,
    pub page_footer_penalty: i64,
    pub menu_block_penalty: i64,
    /// Per competing-program course code in excess of the target's own.
    pub competing_course_penalty: i64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            major_keyword: 2,
            degree_keyword: 3,
            requirement_keyword: 5,
            credit_hours_keyword: 5,
            prerequisite_keyword: 3,
            core_elective_keyword: 4,
            course_match: 2,
            core_course_match: 8,
            title_match_bonus: 15,
            page_footer_penalty: -10,
            menu_block_penalty: -5,
            competing_course_penalty: -2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Window radius around a program-name occurrence, in characters.
    /// Asymmetric by default: requirements text follows the heading.
    pub window_before: usize,
    pub window_after: usize,
    /// Politeness delay between remote-source attempts.
    pub inter_request_delay_ms: u64,
    /// Stop invoking lower-priority strategies after the first hit instead
    /// of collecting a full multi-source audit trail.
    pub short_circuit_on_first_hit: bool,
    /// Overall deadline for one orchestrator run, checked between
    /// strategies. None = no deadline.
    pub run_timeout_ms: Option<u64>,
    /// Phrases that disqualify a candidate window outright, regardless of
    /// score, because they mark a *different* program's section. Supplied
    /// per major (e.g. ECE phrases when targeting Computer Science).
    pub hard_reject_phrases: Vec<String>,
    /// Competing-program course prefixes (departments) counted against the
    /// window by the soft penalty.
    pub competing_departments: Vec<String>,
    /// Score course matches with the stronger core weight.
    pub core_keyword_mode: bool,
    pub weights: ScorerWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_before: 200,
            window_after: 8000,
            inter_request_delay_ms: 1000,
            short_circuit_on_first_hit: false,
            run_timeout_ms: None,
            hard_reject_phrases: Vec::new(),
            competing_departments: Vec::new(),
            core_keyword_mode: false,
            weights: ScorerWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}
