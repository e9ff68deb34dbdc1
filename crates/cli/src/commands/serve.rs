//! `mcptest serve`: browse run reports and their screenshots over HTTP

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use clap::Args;
use mcptest_e2e::report::{escape_html, REPORT_FILE, STYLESHEET_FILE};
use mcptest_e2e::scenario::SCREENSHOT_DIR;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Root directory holding run directories
    #[arg(long, env = "MCPTEST_OUTPUT_DIR", default_value = mcptest_common::config::DEFAULT_OUTPUT_DIR)]
    pub results: PathBuf,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
}

#[derive(Clone)]
struct ServeState {
    root: Arc<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ScreenshotQuery {
    pub build: String,
    pub scenario: String,
    pub file: String,
}

pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!(
        "Serving reports from {} on http://{}",
        args.results.display(),
        listener.local_addr()?
    );
    axum::serve(listener, router(args.results)).await?;
    Ok(())
}

pub fn router(root: PathBuf) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/:run_id/report.html", get(report_handler))
        .route("/:run_id/report.css", get(stylesheet_handler))
        .route("/:run_id/screenshot", get(screenshot_handler))
        .with_state(ServeState {
            root: Arc::new(root),
        })
}

/// A single path segment: non-empty, no separators, not `.` or `..`
pub fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(&['/', '\\', '\0'][..])
}

/// Run directory names under `root`, newest first
pub fn list_runs(root: &Path) -> std::io::Result<Vec<String>> {
    let mut runs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                runs.push(name.to_string());
            }
        }
    }
    // run ids start with a sortable timestamp
    runs.sort_unstable_by(|a, b| b.cmp(a));
    Ok(runs)
}

async fn index_handler(State(state): State<ServeState>) -> Response {
    let runs = match list_runs(&state.root) {
        Ok(runs) => runs,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"><title>Test Runs</title></head>\n<body>\n<h1>Test Runs</h1>\n<ul class=\"runs\">\n",
    );
    for run in &runs {
        let run = escape_html(run);
        html.push_str(&format!(
            "<li><a href=\"{run}/{REPORT_FILE}\">{run}</a></li>\n"
        ));
    }
    if runs.is_empty() {
        html.push_str("<li>No runs yet.</li>\n");
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    Html(html).into_response()
}

async fn report_handler(State(state): State<ServeState>, UrlPath(run_id): UrlPath<String>) -> Response {
    serve_run_file(&state, &run_id, REPORT_FILE).await
}

async fn stylesheet_handler(State(state): State<ServeState>, UrlPath(run_id): UrlPath<String>) -> Response {
    serve_run_file(&state, &run_id, STYLESHEET_FILE).await
}

async fn serve_run_file(state: &ServeState, run_id: &str, file: &str) -> Response {
    if !is_safe_component(run_id) {
        return (StatusCode::BAD_REQUEST, "Invalid run id").into_response();
    }
    serve_file(state.root.join(run_id).join(file)).await
}

async fn screenshot_handler(
    State(state): State<ServeState>,
    UrlPath(run_id): UrlPath<String>,
    Query(query): Query<ScreenshotQuery>,
) -> Response {
    if !is_safe_component(&run_id) || query.build != run_id {
        return (StatusCode::BAD_REQUEST, "Invalid build").into_response();
    }
    let Ok(scenario) = query.scenario.parse::<usize>() else {
        return (StatusCode::BAD_REQUEST, "Invalid scenario index").into_response();
    };
    if !is_safe_component(&query.file) {
        return (StatusCode::BAD_REQUEST, "Invalid file name").into_response();
    }

    let path = state
        .root
        .join(&run_id)
        .join(scenario.to_string())
        .join(SCREENSHOT_DIR)
        .join(&query.file);
    serve_file(path).await
}

async fn serve_file(path: PathBuf) -> Response {
    debug!("serving {}", path.display());
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.essence_str().to_string())],
                bytes,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
