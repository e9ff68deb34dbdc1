//! HTML report rendering

use std::path::PathBuf;

use mcptest_common::{RunReport, ScenarioOutcome};

use crate::error::E2eResult;

pub const REPORT_FILE: &str = "report.html";
pub const STYLESHEET_FILE: &str = "report.css";

/// Stylesheet written next to every report
pub const REPORT_CSS: &str = include_str!("../assets/report.css");

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn status_class(status: bool) -> &'static str {
    if status {
        "success"
    } else {
        "failed"
    }
}

/// Relative URL under which the report server resolves a screenshot
pub fn screenshot_url(run_id: &str, index: usize, file: &str) -> String {
    format!("screenshot?build={}&scenario={}&file={}", run_id, index, file)
}

/// Render the whole run. Output depends only on `report`.
pub fn render_report(report: &RunReport) -> String {
    let started = report.started_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Test Report - {started}</title>
    <link rel="stylesheet" href="{STYLESHEET_FILE}">
</head>
<body>
<div class="header">
    <h1>Test Execution Report</h1>
    <p>Run: {run_id}</p>
    <p>Execution Time: {started}</p>
    <p>Duration: {duration:.2}s</p>
</div>
<div class="summary">
    <h2>Summary</h2>
    <p>Total Scenarios: {total}</p>
    <p>Success: {passed}</p>
    <p>Failure: {failed}</p>
</div>
<div class="steps"><h2>Detailed Scenarios</h2>
"#,
        run_id = escape_html(&report.run_id),
        duration = report.duration.as_secs_f64(),
        total = report.total(),
        passed = report.passed(),
        failed = report.failed(),
    ));

    for outcome in &report.outcomes {
        render_scenario(&mut html, &report.run_id, outcome);
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn render_scenario(html: &mut String, run_id: &str, outcome: &ScenarioOutcome) {
    let result = &outcome.result;
    html.push_str(&format!(
        r#"<div class="step {class}">
<h3>Scenario {index}: {title}</h3>
<p>Status: {status}</p>
<p>Duration: {duration:.2}s</p>
<h4>Scenario Feedback</h4>
<p>{feedback}</p>
"#,
        class = status_class(result.status),
        index = outcome.index,
        title = escape_html(&result.title),
        status = if result.status { "Success" } else { "Failed" },
        duration = result.duration,
        feedback = escape_html(&result.feedback),
    ));

    if let Some(fail) = result.fail.as_ref().filter(|f| !f.is_empty()) {
        html.push_str("<div class=\"fail\"><h5>Fail Reasons</h5><ul>\n");
        for failed in fail {
            html.push_str(&format!(
                "<li>Step {}: {}</li>\n",
                failed.num,
                escape_html(&failed.message)
            ));
        }
        html.push_str("</ul></div>\n");
    }

    html.push_str("<div class=\"substeps\"><h4>Step Results</h4>\n");
    for step in &result.steps {
        html.push_str(&format!(
            r#"<div class="substep {class}">
<p><strong>Step {num}:</strong> {action}</p>
<p>Status: {status}</p>
<p>Duration: {duration:.2}s</p>
<p>Feedback: {feedback}</p>
"#,
            class = status_class(step.status),
            num = step.num,
            action = escape_html(&step.action),
            status = if step.status { "✅ Success" } else { "❌ Failed" },
            duration = step.duration,
            feedback = escape_html(&step.feedback),
        ));
        if let Some(reason) = &step.fail {
            html.push_str(&format!("<p>Failure Reason: {}</p>\n", escape_html(reason)));
        }
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n");

    for file in &outcome.screenshots {
        html.push_str(&format!(
            "<img class=\"screenshot\" src=\"{}\" alt=\"Screenshot {}\"/>\n",
            escape_html(&screenshot_url(run_id, outcome.index, file)),
            escape_html(file)
        ));
    }

    html.push_str("</div>\n");
}

/// Write `report.html` and `report.css` into the run directory
pub fn write_report(report: &RunReport) -> E2eResult<PathBuf> {
    let dir = &report.output_dir;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(REPORT_FILE);
    std::fs::write(&path, render_report(report))?;
    std::fs::write(dir.join(STYLESHEET_FILE), REPORT_CSS)?;
    Ok(path)
}
