//! Core types for mcptest

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// One named, ordered sequence of natural-language test steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    pub steps: Vec<String>,
}

/// Batch input file: `{"scenarios": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBatch {
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl ScenarioBatch {
    /// Parse a batch from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    /// Load a batch from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::InvalidBatch {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::InvalidBatch {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Per-step verdict reported by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub num: u32,
    pub action: String,
    pub status: bool,
    /// Seconds
    pub duration: f64,
    pub feedback: String,
    pub fail: Option<String>,
}

/// Summary entry for a failed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStep {
    pub num: u32,
    pub message: String,
}

/// Scenario verdict, as emitted by the agent in its fenced JSON block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub title: String,
    pub status: bool,
    /// Seconds. Overwritten with the measured wall-clock time after parsing.
    pub duration: f64,
    pub feedback: String,
    pub fail: Option<Vec<FailedStep>>,
    pub steps: Vec<StepResult>,
}

impl ScenarioResult {
    /// Status implied by the step verdicts and the failure list.
    ///
    /// A scenario passes iff no step failed and no failure was recorded.
    pub fn derived_status(&self) -> bool {
        let any_step_failed = self.steps.iter().any(|s| !s.status);
        let has_failures = self.fail.as_ref().map(|f| !f.is_empty()).unwrap_or(false);
        !(any_step_failed || has_failures)
    }

    /// Whether `status` agrees with [`Self::derived_status`]
    pub fn is_consistent(&self) -> bool {
        self.status == self.derived_status()
    }

    /// Force `status` to the derived value and collapse an empty `fail` list
    /// to `None`. Returns the agent-reported status when it was overridden.
    pub fn reconcile(&mut self) -> Option<bool> {
        if matches!(&self.fail, Some(f) if f.is_empty()) {
            self.fail = None;
        }
        let derived = self.derived_status();
        if self.status != derived {
            let reported = self.status;
            self.status = derived;
            Some(reported)
        } else {
            None
        }
    }

    /// Failed result for a scenario whose pipeline errored before a verdict existed
    pub fn from_error(title: impl Into<String>, message: impl Into<String>, duration: f64) -> Self {
        let message = message.into();
        Self {
            title: title.into(),
            status: false,
            duration,
            feedback: message.clone(),
            fail: Some(vec![FailedStep { num: 0, message }]),
            steps: Vec::new(),
        }
    }
}

/// Contents of a scenario's `result.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedResult {
    pub title: String,
    pub status: bool,
    pub duration: f64,
    pub feedback: String,
    pub fail: Option<Vec<FailedStep>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub screenshots: Vec<String>,
}

impl PersistedResult {
    pub fn new(result: &ScenarioResult, screenshots: &[String]) -> Self {
        Self {
            title: result.title.clone(),
            status: result.status,
            duration: result.duration,
            feedback: result.feedback.clone(),
            fail: result.fail.clone().filter(|f| !f.is_empty()),
            screenshots: screenshots.to_vec(),
        }
    }

    /// Write as pretty JSON to `<scenario_dir>/result.json`
    pub fn save(&self, scenario_dir: &Path) -> Result<PathBuf> {
        let path = scenario_dir.join(RESULT_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Read `<scenario_dir>/result.json`
    pub fn load(scenario_dir: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(scenario_dir.join(RESULT_FILE))?;
        serde_json::from_str(&content).map_err(Error::from)
    }
}

/// Name of the per-scenario record file
pub const RESULT_FILE: &str = "result.json";

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One finished scenario: 1-based batch index, verdict, screenshot filenames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub index: usize,
    pub result: ScenarioResult,
    pub screenshots: Vec<String>,
}

/// A completed run, handed to the report aggregator exactly once
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub output_dir: PathBuf,
    /// Local wall-clock time at run start
    pub started_at: NaiveDateTime,
    pub duration: Duration,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.status).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Run identifier: `<YYYYMMDD-HHMMSS>_report_<build>`
pub fn run_id(started_at: &NaiveDateTime, build: u64) -> String {
    format!("{}_report_{}", started_at.format("%Y%m%d-%H%M%S"), build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn step(num: u32, status: bool) -> StepResult {
        StepResult {
            num,
            action: format!("step {num}"),
            status,
            duration: 0.5,
            feedback: "ok".to_string(),
            fail: if status { None } else { Some("broken".to_string()) },
        }
    }

    fn result(status: bool, steps: Vec<StepResult>, fail: Option<Vec<FailedStep>>) -> ScenarioResult {
        ScenarioResult {
            title: "t".to_string(),
            status,
            duration: 1.0,
            feedback: "fb".to_string(),
            fail,
            steps,
        }
    }

    #[test]
    fn test_parse_batch() {
        let batch = ScenarioBatch::from_json(
            r#"{"scenarios":[{"title":"Search check","steps":["Open homepage","Confirm search box exists"]}]}"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.scenarios[0].steps.len(), 2);
    }

    #[test]
    fn test_missing_batch_file_is_invalid_batch() {
        let err = ScenarioBatch::from_file(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(matches!(err, Error::InvalidBatch { .. }));
    }

    #[test]
    fn test_derived_status() {
        assert!(result(true, vec![step(1, true), step(2, true)], None).derived_status());
        assert!(!result(true, vec![step(1, true), step(2, false)], None).derived_status());
        let fail = vec![FailedStep { num: 1, message: "x".to_string() }];
        assert!(!result(true, vec![step(1, true)], Some(fail)).derived_status());
        assert!(result(true, vec![], Some(vec![])).derived_status());
    }

    #[test]
    fn test_reconcile_overrides_reported_status() {
        let mut r = result(true, vec![step(1, false)], None);
        assert_eq!(r.reconcile(), Some(true));
        assert!(!r.status);
        assert!(r.is_consistent());

        let mut r = result(true, vec![step(1, true)], Some(vec![]));
        assert_eq!(r.reconcile(), None);
        assert_eq!(r.fail, None);
    }

    #[test]
    fn test_persisted_result_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let r = result(
            false,
            vec![step(1, false)],
            Some(vec![FailedStep { num: 1, message: "broken".to_string() }]),
        );
        let record = PersistedResult::new(&r, &["1.png".to_string()]);
        record.save(tmp.path()).unwrap();

        let loaded = PersistedResult::load(tmp.path()).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_persisted_screenshots_never_null() {
        let tmp = TempDir::new().unwrap();
        let record = PersistedResult::new(&result(true, vec![], None), &[]);
        record.save(tmp.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join(RESULT_FILE)).unwrap()).unwrap();
        assert!(raw["screenshots"].is_array());
        assert!(raw["fail"].is_null());

        let legacy = r#"{"title":"t","status":true,"duration":1.0,"feedback":"","fail":null,"screenshots":null}"#;
        let parsed: PersistedResult = serde_json::from_str(legacy).unwrap();
        assert!(parsed.screenshots.is_empty());
    }

    #[test]
    fn test_run_id_format() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        assert_eq!(run_id(&started, 42), "20240309-140507_report_42");
    }
}
