//! Test-run orchestration: one tool session, scenarios in order, one report

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use mcptest_common::{run_id, FailurePolicy, RunConfig, RunReport, ScenarioBatch};
use tracing::{error, info, warn};

use crate::error::E2eResult;
use crate::mcp::{McpSession, ToolHost};
use crate::provider::{build_model, ChatModel};
use crate::report::write_report;
use crate::scenario::ScenarioExecutor;

/// Identity and clock of a run in progress
struct RunStart {
    run_id: String,
    output_dir: PathBuf,
    started_at: NaiveDateTime,
    clock: Instant,
}

/// Main scenario runner
pub struct TestRunner {
    config: RunConfig,
    model: Arc<dyn ChatModel>,
}

impl TestRunner {
    /// Validate the configuration and build the configured provider client
    pub fn new(config: RunConfig) -> E2eResult<Self> {
        config.validate()?;
        let model = build_model(&config.provider)?;
        Ok(Self { config, model })
    }

    /// Use an explicit model instead of the configured provider
    pub fn with_model(config: RunConfig, model: Arc<dyn ChatModel>) -> E2eResult<Self> {
        config.validate()?;
        Ok(Self { config, model })
    }

    /// Run a batch against a freshly spawned tool server.
    ///
    /// The session is shut down on every path out of the scenario loop.
    pub async fn run(&self, batch: &ScenarioBatch) -> E2eResult<RunReport> {
        let run = self.begin()?;

        let session = McpSession::open(&self.config.tool_server).await?;
        let info = session.server_info();
        info!("Connected to {} {}", info.name, info.version);

        let result = self.execute(&session, batch, run).await;
        session.shutdown().await;

        let report = result?;
        self.finish(&report)?;
        Ok(report)
    }

    /// Run a batch against an already connected tool host
    pub async fn run_with_host(&self, host: &dyn ToolHost, batch: &ScenarioBatch) -> E2eResult<RunReport> {
        let run = self.begin()?;
        let report = self.execute(host, batch, run).await?;
        self.finish(&report)?;
        Ok(report)
    }

    fn begin(&self) -> E2eResult<RunStart> {
        let started_at = Local::now().naive_local();
        let run_id = run_id(&started_at, self.config.build);
        let output_dir = self.config.output_root.join(&run_id);
        std::fs::create_dir_all(&output_dir)?;

        info!("Run {} -> {}", run_id, output_dir.display());
        info!("Model: {}", self.model.describe());

        Ok(RunStart {
            run_id,
            output_dir,
            started_at,
            clock: Instant::now(),
        })
    }

    async fn execute(
        &self,
        host: &dyn ToolHost,
        batch: &ScenarioBatch,
        run: RunStart,
    ) -> E2eResult<RunReport> {
        let executor = ScenarioExecutor::new(
            self.model.as_ref(),
            host,
            &run.output_dir,
            &self.config.language,
            self.config.max_iterations,
        );

        info!("Running {} scenario(s)...", batch.len());
        let mut outcomes = Vec::with_capacity(batch.len());

        for (position, scenario) in batch.scenarios.iter().enumerate() {
            let index = position + 1;
            let start = Instant::now();

            match executor.execute(index, scenario).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_fatal_to_run() => return Err(e),
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        error!("Aborting run after scenario {}", index);
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        warn!("Recording scenario {} as failed and continuing", index);
                        let elapsed = start.elapsed().as_secs_f64();
                        outcomes.push(executor.record_failure(index, scenario, &e, elapsed)?);
                    }
                },
            }
        }

        let report = RunReport {
            run_id: run.run_id,
            output_dir: run.output_dir,
            started_at: run.started_at,
            duration: run.clock.elapsed(),
            outcomes,
        };

        info!("");
        info!(
            "Results: {} passed, {} failed ({:.2}s)",
            report.passed(),
            report.failed(),
            report.duration.as_secs_f64()
        );
        Ok(report)
    }

    fn finish(&self, report: &RunReport) -> E2eResult<()> {
        let path = write_report(report)?;
        info!("Report: {}", path.display());
        Ok(())
    }
}
