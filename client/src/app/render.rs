//! Terminal progress rendering
//!
//! Pure consumer of reconciled state: prints a line whenever a step's
//! status changes and a summary once the attempt is terminal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::deploy::progress::ProgressView;
use crate::deploy::reconciler::{DeployStatus, DeploymentState, ReconciledStep};
use crate::models::deployment::StepStatus;

/// Incremental renderer for one deployment attempt
pub struct Renderer {
    printed: HashMap<String, StepStatus>,
    gap_warned: bool,
    started_at: DateTime<Utc>,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            printed: HashMap::new(),
            gap_warned: false,
            started_at: Utc::now(),
        }
    }

    /// Print one line per step whose status changed since the last call
    pub fn render(&mut self, state: &DeploymentState) {
        for step in &state.steps {
            if self.printed.get(&step.step) != Some(&step.status) {
                println!("{}", step_line(step));
                self.printed.insert(step.step.clone(), step.status);
            }
        }
    }

    /// Print the terminal summary for a finished attempt
    pub fn render_summary(&self, state: &DeploymentState, view: &ProgressView) {
        let elapsed = (Utc::now() - self.started_at).num_seconds();

        println!();
        match state.status {
            DeployStatus::Success => {
                println!(
                    "{} ({}% of {} steps, {}s)",
                    view.badge.label().green().bold(),
                    view.percentage,
                    view.total,
                    elapsed
                );
                if let Some(result) = &state.result {
                    if let Some(url) = &result.url {
                        println!("  URL:       {}", url.cyan());
                    }
                    if let Some(instance_id) = &result.instance_id {
                        println!("  Instance:  {}", instance_id);
                    }
                    if let Some(container_name) = &result.container_name {
                        println!("  Container: {}", container_name);
                    }
                }
            }
            DeployStatus::Failed => {
                println!(
                    "{} ({}% of {} steps, {}s)",
                    view.badge.label().red().bold(),
                    view.percentage,
                    view.total,
                    elapsed
                );
                let error = state
                    .result
                    .as_ref()
                    .and_then(|r| r.error.as_deref())
                    .unwrap_or("unknown error");
                println!("  Error: {}", error.red());
            }
            _ => {
                println!("{}", view.badge.label().yellow());
            }
        }
    }

    /// One-shot warning for a disconnected gap: the server does not replay
    /// missed events, so anything emitted while offline is gone.
    pub fn warn_connection_gap(&mut self) {
        if !self.gap_warned {
            println!(
                "{}",
                "connection lost; progress may be incomplete".yellow().bold()
            );
            self.gap_warned = true;
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn step_line(step: &ReconciledStep) -> String {
    let glyph = match step.status {
        StepStatus::Success => "✓".green(),
        StepStatus::Error => "✗".red(),
        StepStatus::InProgress => ">".yellow(),
        StepStatus::Pending | StepStatus::Unknown => "·".dimmed(),
    };

    match step.message.as_deref() {
        Some(message) => format!("  {} {}: {}", glyph, step.step.bold(), message.dimmed()),
        None => format!("  {} {}", glyph, step.step.bold()),
    }
}
