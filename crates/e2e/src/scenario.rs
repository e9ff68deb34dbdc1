//! Per-scenario pipeline: instruct, drive the agent, harvest, extract, persist

use std::path::{Path, PathBuf};
use std::time::Instant;

use mcptest_common::{PersistedResult, Scenario, ScenarioOutcome, ScenarioResult};
use tracing::{debug, error, info, warn};

use crate::agent::Agent;
use crate::error::{E2eError, E2eResult};
use crate::extract::{extract_from_message, parse_result};
use crate::harvest::ScreenshotHarvester;
use crate::instruction::{build_instruction, system_directive};
use crate::mcp::ToolHost;
use crate::message::Message;
use crate::provider::ChatModel;

/// Directory holding a scenario's images, relative to the scenario directory
pub const SCREENSHOT_DIR: &str = "screenshots";

/// Runs scenarios of one run against a shared model and tool session
pub struct ScenarioExecutor<'a> {
    model: &'a dyn ChatModel,
    host: &'a dyn ToolHost,
    run_dir: &'a Path,
    language: &'a str,
    max_iterations: usize,
}

impl<'a> ScenarioExecutor<'a> {
    pub fn new(
        model: &'a dyn ChatModel,
        host: &'a dyn ToolHost,
        run_dir: &'a Path,
        language: &'a str,
        max_iterations: usize,
    ) -> Self {
        Self {
            model,
            host,
            run_dir,
            language,
            max_iterations,
        }
    }

    /// `<run_dir>/<index>`
    pub fn scenario_dir(&self, index: usize) -> PathBuf {
        self.run_dir.join(index.to_string())
    }

    /// Execute scenario `index` (1-based) and persist its `result.json`.
    ///
    /// Errors are logged with the scenario's index and title and returned
    /// wrapped in [`E2eError::ScenarioExecution`], together with any
    /// screenshots already written for the scenario.
    pub async fn execute(&self, index: usize, scenario: &Scenario) -> E2eResult<ScenarioOutcome> {
        info!("[{}] {} ({} steps)", index, scenario.title, scenario.steps.len());
        let start = Instant::now();

        let (verdict, screenshots) = match self.drive(index, scenario).await {
            Ok(transcript) => {
                let screenshots = ScreenshotHarvester::new(self.scenario_dir(index).join(SCREENSHOT_DIR))
                    .harvest(&transcript);
                let verdict = self.conclude(index, scenario, start, &transcript, &screenshots);
                (verdict, screenshots)
            }
            Err(e) => (Err(e), Vec::new()),
        };

        match verdict {
            Ok(result) => {
                info!(
                    "[{}] {} {} ({:.2}s, {} screenshot(s))",
                    index,
                    if result.status { "✓" } else { "✗" },
                    scenario.title,
                    result.duration,
                    screenshots.len()
                );
                Ok(ScenarioOutcome {
                    index,
                    result,
                    screenshots,
                })
            }
            Err(e) => {
                error!("[{}] {} failed: {}", index, scenario.title, e);
                Err(E2eError::ScenarioExecution {
                    index,
                    title: scenario.title.clone(),
                    screenshots,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Prepare the scenario directory and run the agent to completion
    async fn drive(&self, index: usize, scenario: &Scenario) -> E2eResult<Vec<Message>> {
        std::fs::create_dir_all(self.scenario_dir(index).join(SCREENSHOT_DIR))?;

        let agent = Agent::new(self.model, self.host, self.max_iterations);
        agent
            .invoke(&system_directive(self.language), &build_instruction(&scenario.steps))
            .await
    }

    /// Extract the verdict from the final message and persist it
    fn conclude(
        &self,
        index: usize,
        scenario: &Scenario,
        start: Instant,
        transcript: &[Message],
        screenshots: &[String],
    ) -> E2eResult<ScenarioResult> {
        let last = transcript
            .last()
            .ok_or_else(|| E2eError::Extraction("agent produced no messages".to_string()))?;
        let json = extract_from_message(last)?;
        debug!("[{}] verdict: {}", index, json);
        let mut result = parse_result(&json)?;

        result.duration = start.elapsed().as_secs_f64();
        result.title = scenario.title.clone();
        if let Some(reported) = result.reconcile() {
            warn!(
                "[{}] agent reported status={} but step verdicts imply {}; using {}",
                index, reported, result.status, result.status
            );
        }

        PersistedResult::new(&result, screenshots).save(&self.scenario_dir(index))?;
        Ok(result)
    }

    /// Persist a failed verdict for a scenario whose pipeline errored,
    /// keeping the screenshots it already produced
    pub fn record_failure(
        &self,
        index: usize,
        scenario: &Scenario,
        err: &E2eError,
        duration: f64,
    ) -> E2eResult<ScenarioOutcome> {
        let scenario_dir = self.scenario_dir(index);
        std::fs::create_dir_all(scenario_dir.join(SCREENSHOT_DIR))?;

        let (message, screenshots) = match err {
            E2eError::ScenarioExecution {
                source,
                screenshots,
                ..
            } => (source.to_string(), screenshots.clone()),
            other => (other.to_string(), Vec::new()),
        };
        let result = ScenarioResult::from_error(&scenario.title, message, duration);
        PersistedResult::new(&result, &screenshots).save(&scenario_dir)?;

        Ok(ScenarioOutcome {
            index,
            result,
            screenshots,
        })
    }
}
