//! Static site rendering and the `status.json` snapshot artifact.
//!
//! Two pages are rendered from the tracked state: `index.html` (current
//! status table) and `history.html` (full event log). Templates are Jinja
//! syntax via `minijinja`; the built-in ones can be overridden per file by
//! pointing `templates_dir` at a directory containing same-named files.

use std::path::{Path, PathBuf};

use chrono::Utc;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::{debug, info, instrument};

use skywatch_shared::{AirportRecord, Result, SkywatchError, Status, StatusSnapshot};

/// Built-in templates, compiled into the binary.
const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("index.html", include_str!("../templates/index.html")),
    ("history.html", include_str!("../templates/history.html")),
];

/// Snapshot artifact file name.
const SNAPSHOT_FILE_NAME: &str = "status.json";

// ---------------------------------------------------------------------------
// Config & result
// ---------------------------------------------------------------------------

/// Where and how to render the site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Directory the pages are written to (created if missing).
    pub site_dir: PathBuf,
    /// Optional directory of user templates overriding the built-ins.
    pub templates_dir: Option<PathBuf>,
    /// Tool version shown in the page footer.
    pub version: String,
}

/// Summary of a completed render.
#[derive(Debug)]
pub struct RenderResult {
    /// Directory the pages were written to.
    pub site_dir: PathBuf,
    /// Page file names written.
    pub pages: Vec<String>,
}

// ---------------------------------------------------------------------------
// Template view models
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AirportView {
    icao: String,
    name: String,
    current_class: &'static str,
    current_label: &'static str,
    last_ts: String,
    events: Vec<EventView>,
}

#[derive(Serialize)]
struct EventView {
    ts: String,
    status: &'static str,
    label: &'static str,
}

fn status_class(status: Option<Status>) -> &'static str {
    match status {
        Some(Status::Open) => "open",
        Some(Status::Closed) => "closed",
        None => "unknown",
    }
}

fn status_label(status: Option<Status>) -> &'static str {
    match status {
        Some(Status::Open) => "открыт",
        Some(Status::Closed) => "закрыт",
        None => "нет данных",
    }
}

fn format_ts(ts: chrono::DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn airport_view(record: &AirportRecord) -> AirportView {
    // Newest first on the history page.
    let mut events: Vec<EventView> = record
        .events
        .iter()
        .map(|e| EventView {
            ts: format_ts(e.ts),
            status: status_class(Some(e.status)),
            label: status_label(Some(e.status)),
        })
        .collect();
    events.reverse();

    AirportView {
        icao: record.icao.to_string(),
        name: record.name.clone(),
        current_class: status_class(record.current),
        current_label: status_label(record.current),
        last_ts: record
            .events
            .last()
            .map(|e| format_ts(e.ts))
            .unwrap_or_else(|| "—".to_string()),
        events,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the site from a snapshot. An empty snapshot renders the pages'
/// "no data" state rather than failing.
#[instrument(skip_all, fields(site_dir = %config.site_dir.display(), airports = snapshot.len()))]
pub fn render_site(snapshot: &StatusSnapshot, config: &SiteConfig) -> Result<RenderResult> {
    let env = build_env(config.templates_dir.as_deref())?;

    let airports: Vec<AirportView> = snapshot
        .sorted_by_name()
        .into_iter()
        .map(airport_view)
        .collect();
    let generated_at = format_ts(Utc::now());

    std::fs::create_dir_all(&config.site_dir)
        .map_err(|e| SkywatchError::io(&config.site_dir, e))?;

    let mut pages = Vec::new();
    for (name, _) in DEFAULT_TEMPLATES {
        let template = env
            .get_template(name)
            .map_err(|e| SkywatchError::Render(e.to_string()))?;
        let html = template
            .render(context! {
                airports => airports,
                generated_at => generated_at,
                version => config.version,
            })
            .map_err(|e| SkywatchError::Render(format!("{name}: {e}")))?;

        let path = config.site_dir.join(name);
        std::fs::write(&path, html).map_err(|e| SkywatchError::io(&path, e))?;
        debug!(page = name, "page written");
        pages.push((*name).to_string());
    }

    info!(pages = pages.len(), "site rendered");

    Ok(RenderResult {
        site_dir: config.site_dir.clone(),
        pages,
    })
}

/// Write the `status.json` snapshot artifact. Returns the file path.
pub fn write_snapshot(snapshot: &StatusSnapshot, data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir).map_err(|e| SkywatchError::io(data_dir, e))?;

    let path = data_dir.join(SNAPSHOT_FILE_NAME);
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| SkywatchError::Render(format!("snapshot serialization: {e}")))?;
    std::fs::write(&path, json).map_err(|e| SkywatchError::io(&path, e))?;

    Ok(path)
}

/// Build the template environment: built-ins, overridden per file when a
/// same-named file exists in `templates_dir`.
fn build_env(templates_dir: Option<&Path>) -> Result<Environment<'static>> {
    let mut env = Environment::new();

    for (name, default_src) in DEFAULT_TEMPLATES {
        let source = match templates_dir.map(|dir| dir.join(name)) {
            Some(path) if path.is_file() => {
                debug!(template = name, path = %path.display(), "using user template");
                std::fs::read_to_string(&path).map_err(|e| SkywatchError::io(&path, e))?
            }
            _ => (*default_src).to_string(),
        };
        env.add_template_owned((*name).to_string(), source)
            .map_err(|e| SkywatchError::Render(format!("{name}: {e}")))?;
    }

    Ok(env)
}
