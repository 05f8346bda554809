//! Application wiring.
//!
//! Builds the guard from `AppConfig`, attaches the repository and alerter,
//! and drives the subcommands.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::sample;
use guard_alert::{AlertSender, GuardAlerter, LogAlertSender};
use guard_core::{Clock, ConfigPreset, GuardDecisionOutput, GuardInput, SystemClock};
use guard_engine::{GuardPipeline, TradeGuard};
use guard_persistence::{GuardRepository, InMemoryGuardRepository, JournalRepository};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

pub struct Application {
    config: AppConfig,
    pipeline: GuardPipeline,
    repository: Arc<dyn GuardRepository>,
    journal: Option<Arc<JournalRepository>>,
}

impl Application {
    pub fn new(config: AppConfig, preset: Option<ConfigPreset>) -> AppResult<Self> {
        Self::with_clock(config, preset, Arc::new(SystemClock))
    }

    pub fn with_clock(
        mut config: AppConfig,
        preset: Option<ConfigPreset>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        if let Some(preset) = preset {
            config.preset = preset;
        }
        let guard_config = config.guard_config()?;
        info!(preset = %config.preset, "Guard configuration loaded");

        let journal = if config.persistence.enabled {
            Some(Arc::new(JournalRepository::open(
                &config.persistence.data_dir,
                config.persistence.buffer_size,
                clock.clone(),
            )?))
        } else {
            None
        };
        let repository: Arc<dyn GuardRepository> = match &journal {
            Some(journal) => journal.clone(),
            None => Arc::new(InMemoryGuardRepository::new(clock.clone())),
        };

        let sender: Option<Arc<dyn AlertSender>> = if config.alerts.log_sender {
            Some(Arc::new(LogAlertSender))
        } else {
            None
        };
        let alerter = GuardAlerter::new(guard_config.alerting.clone(), sender);

        let guard = Arc::new(TradeGuard::with_clock(guard_config, clock)?);
        let pipeline = GuardPipeline::new(guard)
            .with_repository(repository.clone())
            .with_alerter(alerter);

        Ok(Self {
            config,
            pipeline,
            repository,
            journal,
        })
    }

    pub fn guard(&self) -> &TradeGuard {
        self.pipeline.guard()
    }

    pub fn evaluate(&self, input: &GuardInput) -> GuardDecisionOutput {
        self.pipeline.evaluate(input)
    }

    /// Evaluate one line of JSON. An unparseable line is evaluated as an
    /// empty input, which blocks.
    fn evaluate_line(&self, line_no: usize, line: &str) -> GuardDecisionOutput {
        let input = match serde_json::from_str::<GuardInput>(line) {
            Ok(input) => input,
            Err(e) => {
                warn!(line = line_no, error = %e, "Unparseable input, evaluating as empty");
                GuardInput::default()
            }
        };
        self.evaluate(&input)
    }

    /// Evaluate a single JSON document, or JSON Lines if the content is not
    /// one document. Returns the decisions in input order.
    pub fn evaluate_str(&self, content: &str) -> Vec<GuardDecisionOutput> {
        if let Ok(input) = serde_json::from_str::<GuardInput>(content) {
            return vec![self.evaluate(&input)];
        }
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| self.evaluate_line(i + 1, line))
            .collect()
    }

    /// Evaluate a JSON Lines stream, writing one decision per line to `out`.
    pub async fn evaluate_stream<R, W>(&self, reader: R, out: &mut W) -> AppResult<usize>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = reader.lines();
        let mut count = 0;
        let mut line_no = 0;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let output = self.evaluate_line(line_no, &line);
            write_decision(out, &output)?;
            count += 1;
        }
        Ok(count)
    }

    /// Validators, health and effective configuration.
    pub fn info(&self) -> AppResult<Value> {
        let guard = self.guard();
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "preset": self.config.preset,
            "validators": guard.validator_info(),
            "health": guard.health_check(),
            "config": serde_json::to_value(guard.config())?,
        }))
    }

    /// Healthy sample twice (the second is a duplicate), then a halted sample.
    pub fn demo(&self) -> Vec<GuardDecisionOutput> {
        let now = self.guard().clock().now();
        let request_id = format!("demo-{}", now.timestamp_millis());
        let inputs = [
            sample::healthy(now, &request_id),
            sample::healthy(now, &request_id),
            sample::halted(now, &format!("{request_id}-halt")),
        ];
        inputs.iter().map(|input| self.evaluate(input)).collect()
    }

    /// Log today's stats, prune old records and flush the journal.
    pub fn shutdown(&self) -> AppResult<()> {
        for stats in self.repository.get_stats_range(1)? {
            info!(
                date = %stats.date,
                total = stats.total_evaluations,
                executed = stats.execute_count,
                blocked = stats.block_count,
                block_rate_pct = stats.block_rate(),
                avg_ms = stats.avg_evaluation_time_ms,
                max_ms = stats.max_evaluation_time_ms,
                alerts_sent = stats.alerts_sent,
                alerts_rate_limited = stats.alerts_rate_limited,
                "Daily guard summary"
            );
        }
        let removed = self
            .repository
            .cleanup_old_records(self.config.persistence.retention_days)?;
        if removed > 0 {
            info!(removed, "Pruned old guard records");
        }
        if let Some(journal) = &self.journal {
            journal.flush()?;
        }
        Ok(())
    }
}

pub fn write_decision<W: Write>(out: &mut W, output: &GuardDecisionOutput) -> AppResult<()> {
    serde_json::to_writer(&mut *out, output)?;
    writeln!(out)?;
    Ok(())
}
