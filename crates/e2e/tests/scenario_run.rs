//! Full runs against a scripted model and an in-memory tool host

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mcptest_common::{
    FailurePolicy, PersistedResult, ProviderKind, ProviderSettings, RunConfig, ScenarioBatch,
};
use mcptest_e2e::harvest::LEGACY_MARKER;
use mcptest_e2e::{
    AssistantTurn, ChatModel, E2eError, E2eResult, Message, MessagePart, TestRunner, Tool, ToolCall,
    ToolHost, ToolOutput,
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Replays a fixed list of turns across the whole run
struct ScriptedModel {
    turns: Mutex<Vec<AssistantTurn>>,
    seen_systems: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(turns: Vec<AssistantTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns),
            seen_systems: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn describe(&self) -> String {
        "scripted/test".to_string()
    }

    async fn complete(&self, messages: &[Message], _tools: &[Tool]) -> E2eResult<AssistantTurn> {
        if let Some(Message::System(system)) = messages.first() {
            self.seen_systems.lock().unwrap().push(system.clone());
        }
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            return Err(E2eError::Provider("script exhausted".into()));
        }
        Ok(turns.remove(0))
    }
}

/// Browser stand-in: screenshots return PNG artifacts, `legacy_capture`
/// returns a legacy path reference, everything else returns text.
struct FakeBrowser {
    tools: Vec<Tool>,
    legacy_file: PathBuf,
    shots: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeBrowser {
    fn new(legacy_file: PathBuf) -> Self {
        let tools = ["browser_navigate", "browser_take_screenshot", "legacy_capture"]
            .iter()
            .map(|name| Tool {
                name: name.to_string(),
                description: None,
                input_schema: json!({"type": "object"}),
            })
            .collect();
        Self {
            tools,
            legacy_file,
            shots: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ToolHost for FakeBrowser {
    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> E2eResult<ToolOutput> {
        self.calls.lock().unwrap().push(name.to_string());
        let parts = match name {
            "browser_take_screenshot" => {
                let n = self.shots.fetch_add(1, Ordering::SeqCst) + 1;
                vec![
                    MessagePart::text("Took a screenshot"),
                    MessagePart::Image {
                        data: STANDARD.encode(format!("shot-{n}")),
                        mime_type: "image/png".into(),
                    },
                ]
            }
            "legacy_capture" => vec![MessagePart::text(
                json!([format!("{}{}", LEGACY_MARKER, self.legacy_file.display())]).to_string(),
            )],
            _ => vec![MessagePart::text("- Page URL: https://example.com")],
        };
        Ok(ToolOutput { parts, is_error: false })
    }
}

fn call(name: &str) -> AssistantTurn {
    AssistantTurn {
        parts: vec![],
        tool_calls: vec![ToolCall {
            id: format!("call-{name}"),
            name: name.to_string(),
            arguments: json!({}),
        }],
    }
}

fn verdict(title: &str, statuses: &[bool], reported: bool) -> AssistantTurn {
    let steps: Vec<Value> = statuses
        .iter()
        .enumerate()
        .map(|(i, ok)| {
            json!({
                "num": i + 1,
                "action": format!("step {}", i + 1),
                "status": ok,
                "duration": 1.0,
                "feedback": "checked",
                "fail": if *ok { Value::Null } else { json!("not found") },
            })
        })
        .collect();
    let body = json!({
        "title": title,
        "status": reported,
        "duration": 999.0,
        "feedback": "Scenario finished",
        "fail": null,
        "steps": steps,
    });
    AssistantTurn {
        parts: vec![MessagePart::text(format!(
            "All steps done.\n```json\n{}\n```\nLet me know if you need more.",
            serde_json::to_string_pretty(&body).unwrap()
        ))],
        tool_calls: vec![],
    }
}

fn config(root: &Path, policy: FailurePolicy) -> RunConfig {
    let mut config = RunConfig::new(
        42,
        ProviderSettings::new(ProviderKind::Anthropic, "scripted", "test-key"),
    );
    config.output_root = root.to_path_buf();
    config.language = "ko".into();
    config.max_iterations = 10;
    config.failure_policy = policy;
    config
}

fn batch(json: &str) -> ScenarioBatch {
    ScenarioBatch::from_json(json).unwrap()
}

#[tokio::test]
async fn search_check_scenario_passes_and_is_reported() {
    let tmp = TempDir::new().unwrap();
    let legacy = tmp.path().join("legacy-shot.png");
    std::fs::write(&legacy, b"legacy").unwrap();
    let results = tmp.path().join("results");

    let model = ScriptedModel::new(vec![
        call("browser_navigate"),
        call("browser_take_screenshot"),
        call("browser_take_screenshot"),
        call("browser_navigate"),
        call("browser_take_screenshot"),
        call("legacy_capture"),
        verdict("agent picked title", &[true, true], true),
    ]);
    let host = FakeBrowser::new(legacy);

    let runner = TestRunner::with_model(config(&results, FailurePolicy::Abort), model.clone()).unwrap();
    let report = runner
        .run_with_host(
            &host,
            &batch(r#"{"scenarios":[{"title":"Search check","steps":["Open homepage","Confirm search box exists"]}]}"#),
        )
        .await
        .unwrap();

    assert_eq!(report.total(), 1);
    assert!(report.all_passed());
    assert!(report.run_id.ends_with("_report_42"));
    assert_eq!(report.output_dir, results.join(&report.run_id));

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.index, 1);
    assert_eq!(outcome.screenshots, vec!["1.png", "2.png", "3.png", "4.png"]);

    let scenario_dir = report.output_dir.join("1");
    let shots = scenario_dir.join("screenshots");
    assert_eq!(std::fs::read(shots.join("1.png")).unwrap(), b"shot-1");
    assert_eq!(std::fs::read(shots.join("3.png")).unwrap(), b"shot-3");
    assert_eq!(std::fs::read(shots.join("4.png")).unwrap(), b"legacy");

    let persisted = PersistedResult::load(&scenario_dir).unwrap();
    assert!(persisted.status);
    assert_eq!(persisted.title, "Search check");
    assert_ne!(persisted.duration, 999.0);
    assert!(persisted.duration < 60.0);
    assert_eq!(persisted.screenshots.len(), 4);

    let html = std::fs::read_to_string(report.output_dir.join("report.html")).unwrap();
    assert!(html.contains("<div class=\"step success\">"));
    assert!(html.contains("Scenario 1: Search check"));
    assert!(report.output_dir.join("report.css").exists());

    assert!(model.seen_systems.lock().unwrap()[0].contains("Korean"));
}

#[tokio::test]
async fn inconsistent_status_is_reconciled() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![verdict("x", &[true, false], true)]);
    let host = FakeBrowser::new(tmp.path().join("none.png"));

    let runner = TestRunner::with_model(config(tmp.path(), FailurePolicy::Abort), model).unwrap();
    let report = runner
        .run_with_host(&host, &batch(r#"{"scenarios":[{"title":"Login","steps":["a","b"]}]}"#))
        .await
        .unwrap();

    assert!(!report.outcomes[0].result.status);
    assert!(!PersistedResult::load(&report.output_dir.join("1")).unwrap().status);
    assert_eq!(report.failed(), 1);
}

const TWO_SCENARIOS: &str = r#"{"scenarios":[
    {"title":"Broken","steps":["Open homepage"]},
    {"title":"Healthy","steps":["Open homepage"]}
]}"#;

fn no_fence() -> AssistantTurn {
    AssistantTurn {
        parts: vec![MessagePart::text("I could not finish the scenario.")],
        tool_calls: vec![],
    }
}

#[tokio::test]
async fn abort_policy_stops_the_batch_without_report() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![no_fence(), verdict("Healthy", &[true], true)]);
    let host = FakeBrowser::new(tmp.path().join("none.png"));

    let runner = TestRunner::with_model(config(tmp.path(), FailurePolicy::Abort), model.clone()).unwrap();
    let err = runner.run_with_host(&host, &batch(TWO_SCENARIOS)).await.unwrap_err();

    match err {
        E2eError::ScenarioExecution { index, title, source, .. } => {
            assert_eq!(index, 1);
            assert_eq!(title, "Broken");
            assert!(matches!(*source, E2eError::Extraction(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    // second scenario never started
    assert_eq!(model.turns.lock().unwrap().len(), 1);

    let run_dir = std::fs::read_dir(tmp.path()).unwrap().next().unwrap().unwrap().path();
    assert!(!run_dir.join("report.html").exists());
    assert!(!run_dir.join("1").join("result.json").exists());
}

#[tokio::test]
async fn continue_policy_records_failure_and_runs_the_rest() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![no_fence(), verdict("Healthy", &[true], true)]);
    let host = FakeBrowser::new(tmp.path().join("none.png"));

    let runner = TestRunner::with_model(config(tmp.path(), FailurePolicy::Continue), model).unwrap();
    let report = runner.run_with_host(&host, &batch(TWO_SCENARIOS)).await.unwrap();

    assert_eq!(report.total(), 2);
    assert_eq!(report.passed(), 1);
    assert_eq!(
        report.outcomes.iter().map(|o| o.index).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let broken = PersistedResult::load(&report.output_dir.join("1")).unwrap();
    assert!(!broken.status);
    assert!(broken.feedback.contains("fence"));
    assert_eq!(broken.fail.unwrap()[0].num, 0);

    let html = std::fs::read_to_string(report.output_dir.join("report.html")).unwrap();
    assert!(html.contains("<div class=\"step failed\">"));
    assert!(html.contains("<div class=\"step success\">"));
}

#[tokio::test]
async fn failed_extraction_keeps_harvested_screenshots() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![
        call("browser_take_screenshot"),
        no_fence(),
        verdict("Healthy", &[true], true),
    ]);
    let host = FakeBrowser::new(tmp.path().join("none.png"));

    let runner = TestRunner::with_model(config(tmp.path(), FailurePolicy::Continue), model).unwrap();
    let report = runner.run_with_host(&host, &batch(TWO_SCENARIOS)).await.unwrap();

    let broken = &report.outcomes[0];
    assert!(!broken.result.status);
    assert_eq!(broken.screenshots, vec!["1.png"]);

    let scenario_dir = report.output_dir.join("1");
    assert!(scenario_dir.join("screenshots").join("1.png").exists());
    let persisted = PersistedResult::load(&scenario_dir).unwrap();
    assert_eq!(persisted.screenshots, vec!["1.png"]);

    let html = std::fs::read_to_string(report.output_dir.join("report.html")).unwrap();
    assert!(html.contains("scenario=1&amp;file=1.png"));
}

#[tokio::test]
async fn iteration_cap_fails_the_scenario() {
    let tmp = TempDir::new().unwrap();
    let turns = (0..20).map(|_| call("browser_navigate")).collect();
    let model = ScriptedModel::new(turns);
    let host = FakeBrowser::new(tmp.path().join("none.png"));

    let mut config = config(tmp.path(), FailurePolicy::Continue);
    config.max_iterations = 3;
    let runner = TestRunner::with_model(config, model).unwrap();
    let report = runner
        .run_with_host(&host, &batch(r#"{"scenarios":[{"title":"Loop","steps":["spin"]}]}"#))
        .await
        .unwrap();

    assert_eq!(host.calls.lock().unwrap().len(), 3);
    assert!(!report.outcomes[0].result.status);
}

#[tokio::test]
async fn empty_batch_produces_empty_report() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![]);
    let host = FakeBrowser::new(tmp.path().join("none.png"));

    let runner = TestRunner::with_model(config(tmp.path(), FailurePolicy::Abort), model).unwrap();
    let report = runner.run_with_host(&host, &ScenarioBatch::default()).await.unwrap();

    assert_eq!(report.total(), 0);
    let html = std::fs::read_to_string(report.output_dir.join("report.html")).unwrap();
    assert!(html.contains("Total Scenarios: 0"));
}
