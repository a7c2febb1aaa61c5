mod config;
mod db;
mod extract;
mod model;
mod orchestrator;
mod record;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use config::EngineConfig;
use model::CourseCode;
use orchestrator::{PageStrategy, Strategy};

#[derive(Parser)]
#[command(name = "catalog_scraper", about = "Course catalog extraction and normalization")]
struct Cli {
    /// Tuning config (JSON): scoring weights, window radii, hard-reject phrases
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a rendered page (from the external fetch layer) to the cache
    Load {
        /// Page URL, used as the cache key
        url: String,
        /// Plain-text file holding the rendered page
        #[arg(short, long)]
        file: PathBuf,
        /// Page title
        #[arg(short, long, default_value = "")]
        title: String,
    },
    /// Resolve one course's prerequisites across all cached sources
    Prereq {
        /// Course code, e.g. "CS 3250"
        course: String,
        /// Print the record without persisting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract a major's degree requirements from a catalog text file
    Degree {
        /// Program name to locate, e.g. "Computer Science"
        major: String,
        /// Catalog text file
        #[arg(short, long)]
        file: PathBuf,
        /// Catalog year label, e.g. "2025-26"
        #[arg(short = 'y', long, default_value = "unknown")]
        catalog_year: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Batch-extract prerequisites from every cached page
    Process {
        /// Max pages to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show cache and extraction counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let engine_config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let result = match cli.command {
        Commands::Load { url, file, title } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let text = std::fs::read_to_string(&file)?;
            if text.trim().is_empty() {
                bail!("{} is empty", file.display());
            }
            db::insert_page(&conn, &url, &title, &text)?;
            println!("Cached {} ({} chars)", url, text.len());
            Ok(())
        }
        Commands::Prereq { course, dry_run } => {
            if course.trim().is_empty() {
                bail!("course code is empty");
            }
            let Some(course) = CourseCode::parse(&course) else {
                bail!("'{}' is not a course code (expected DEPT NNNN)", course);
            };

            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::all_pages(&conn)?;
            if pages.is_empty() {
                println!("No cached pages. Run 'load' first.");
                return Ok(());
            }

            // Each cached page is one source, tried in cache order. The
            // fetcher gets its own connection so the orchestrator owns it.
            let fetcher: Arc<dyn orchestrator::Fetcher> =
                Arc::new(db::StoredPageFetcher::new(db::connect()?));
            let strategies: Vec<Box<dyn Strategy>> = pages
                .iter()
                .enumerate()
                .map(|(i, page)| {
                    Box::new(PageStrategy {
                        name: format!("cached:{}", page.url),
                        priority: i as u32,
                        remote: false,
                        url_template: page.url.clone(),
                        fetcher: Arc::clone(&fetcher),
                    }) as Box<dyn Strategy>
                })
                .collect();

            let resolution = orchestrator::resolve(&course, &strategies, &engine_config).await;
            if !resolution.found {
                println!(
                    "{}: not found in any of {} sources",
                    course,
                    resolution.attempts.len()
                );
                return Ok(());
            }

            println!("{}", serde_json::to_string_pretty(&resolution.record)?);
            match record::to_prerequisite_record(resolution.record) {
                Some(clean) if !dry_run => {
                    db::upsert_prerequisite(
                        &conn,
                        &clean,
                        true,
                        resolution.normalized,
                        &resolution.attempts,
                    )?;
                    println!(
                        "Saved {} ({} attempts logged)",
                        clean.course_id,
                        resolution.attempts.len()
                    );
                }
                Some(_) => {}
                None => println!("Record classified ERROR; not persisted."),
            }
            Ok(())
        }
        Commands::Degree {
            major,
            file,
            catalog_year,
            dry_run,
        } => {
            let document = std::fs::read_to_string(&file)?;
            let source = file.display().to_string();
            let Some(req) = extract::extract_degree_requirement(
                &document,
                &major,
                &catalog_year,
                &source,
                &engine_config,
            )?
            else {
                println!("No section found for '{}'.", major);
                return Ok(());
            };

            println!("{}", serde_json::to_string_pretty(&req)?);
            if !dry_run {
                let conn = db::connect()?;
                db::init_schema(&conn)?;
                db::upsert_degree_requirement(&conn, &req)?;
                println!(
                    "Saved {} / {} ({} categories, {} courses)",
                    req.major,
                    req.catalog_year,
                    req.categories.len(),
                    req.all_courses.len()
                );
            }
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let mut pages = db::all_pages(&conn)?;
            if let Some(n) = limit {
                pages.truncate(n);
            }
            if pages.is_empty() {
                println!("No cached pages. Run 'load' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let saved = process_pages(&conn, &pages)?;
            println!("Saved {} prerequisite records.", saved);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Pages:               {}", s.pages);
            println!("Prerequisites:       {}", s.prerequisites);
            println!("  verified none:     {}", s.verified_none);
            println!("  unnormalized:      {}", s.unnormalized);
            println!("Degree requirements: {}", s.degree_requirements);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Batch extraction over cached pages: parse each page's course entries in
/// parallel, save per chunk.
fn process_pages(
    conn: &rusqlite::Connection,
    pages: &[orchestrator::FetchedPage],
) -> Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut saved = 0usize;
    for chunk in pages.chunks(50) {
        let extracted: Vec<_> = chunk.par_iter().map(extract_page_prerequisites).collect();
        for records in extracted {
            for record in records {
                db::upsert_prerequisite(conn, &record, true, true, &[])?;
                saved += 1;
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(saved)
}

/// Treat every line-leading course code in a page as a course entry and
/// extract the prerequisite phrase from the text up to the next entry.
/// ERROR-classified entries are dropped by the record builder.
fn extract_page_prerequisites(page: &orchestrator::FetchedPage) -> Vec<model::PrerequisiteRecord> {
    let text = &page.text;
    let headings: Vec<(usize, CourseCode)> = extract::codes::find_course_codes_at(text)
        .into_iter()
        .filter(|(at, _)| *at == 0 || text.as_bytes()[at - 1] == b'\n')
        .collect();

    let mut records = Vec::new();
    for (i, (start, course)) in headings.iter().enumerate() {
        let end = headings.get(i + 1).map(|(at, _)| *at).unwrap_or(text.len());
        let entry = &text[*start..end];
        if let Some(mut record) = extract::prereq::extract(entry, course) {
            record.source_method = format!("cached:{}", page.url);
            if let Some(clean) = record::to_prerequisite_record(record) {
                records.push(clean);
            }
        }
    }
    records
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
