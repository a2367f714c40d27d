//! Executor
//!
//! Runs a single job from a previously generated plan:
//! - build the template context from core job fields and inputs
//! - run pre-steps, main commands, post-steps through a shell, serially
//! - stream child output (verbose) or surface it only on failure
//!
//! The executor offers no parallelism; running independent jobs
//! concurrently is the caller's business, via `dependsOn`.

mod template;

pub use template::TemplateError;

use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::types::{ActionStep, Job};

/// Execution phase of a failing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreSteps,
    Commands,
    PostSteps,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::PreSteps => "pre-steps",
            Phase::Commands => "commands",
            Phase::PostSteps => "post-steps",
        };
        f.write_str(text)
    }
}

/// First failure encountered while executing a job
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{phase} step '{step}': {source}")]
    Template {
        phase: Phase,
        step: String,
        #[source]
        source: TemplateError,
    },

    #[error("{phase} step '{step}' failed to run: {source}")]
    Process {
        phase: Phase,
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{phase} step '{step}' failed with exit code {exit_code}")]
    CommandFailed {
        phase: Phase,
        step: String,
        exit_code: i32,
    },
}

/// Executes one job locally, spawning one shell per step
pub struct Executor {
    verbose: bool,
    dry_run: bool,
}

impl Executor {
    pub fn new(verbose: bool, dry_run: bool) -> Self {
        Self { verbose, dry_run }
    }

    /// Run the job's phases in order: pre-steps, main commands,
    /// post-steps. The first non-zero exit or template failure aborts
    /// the remaining steps and phases.
    pub async fn execute_job(&self, job: &Job) -> Result<(), ExecError> {
        log_section(&format!("Executing Job: {}", job.id));
        log_info(&format!("Component: {}", job.component));
        log_info(&format!("Action: {}", job.action));

        let started = Instant::now();
        let context = template_context(job);

        let pre_steps = job.extra_steps("preSteps");
        let commands = job.extra_commands();
        let post_steps = job.extra_steps("postSteps");

        if !pre_steps.is_empty() {
            log_section("Pre-Steps");
            self.run_steps(Phase::PreSteps, &pre_steps, &context).await?;
        }

        if !commands.is_empty() {
            log_section("Main Commands");
            self.run_commands(&commands, &context).await?;
        }

        if !post_steps.is_empty() {
            log_section("Post-Steps");
            self.run_steps(Phase::PostSteps, &post_steps, &context)
                .await?;
        }

        log_success(&format!(
            "Job completed successfully in {:.2?}",
            started.elapsed()
        ));
        Ok(())
    }

    async fn run_steps(
        &self,
        phase: Phase,
        steps: &[ActionStep],
        context: &HashMap<String, String>,
    ) -> Result<(), ExecError> {
        for (idx, step) in steps.iter().enumerate() {
            log_step(idx + 1, &step.name);
            self.run_one(phase, &step.name, &step.command, context)
                .await?;
        }
        Ok(())
    }

    async fn run_commands(
        &self,
        commands: &[String],
        context: &HashMap<String, String>,
    ) -> Result<(), ExecError> {
        for (idx, command) in commands.iter().enumerate() {
            let name = format!("Command {}", idx + 1);
            log_step(idx + 1, &name);
            self.run_one(Phase::Commands, &name, command, context).await?;
        }
        Ok(())
    }

    async fn run_one(
        &self,
        phase: Phase,
        step: &str,
        command: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), ExecError> {
        let resolved = template::render(command, context).map_err(|source| {
            log_error(&format!("Template resolution failed: {source}"));
            ExecError::Template {
                phase,
                step: step.to_string(),
                source,
            }
        })?;

        if self.verbose {
            println!("  ├─ Command: {resolved}");
            println!("  ├─ Output:");
        }

        if self.dry_run {
            log_info(&format!("[DRY RUN] {resolved}"));
            return Ok(());
        }

        if self.verbose {
            self.run_streaming(phase, step, &resolved).await
        } else {
            self.run_captured(phase, step, &resolved).await
        }
    }

    /// Verbose mode: stream child stdout/stderr line by line, prefixed
    /// for readability.
    async fn run_streaming(&self, phase: Phase, step: &str, command: &str) -> Result<(), ExecError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Process {
                phase,
                step: step.to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stream_stdout = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    println!("  │ {line}");
                }
            }
        };
        let stream_stderr = async {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("  │ {line}");
                }
            }
        };

        let (status, (), ()) = tokio::join!(child.wait(), stream_stdout, stream_stderr);
        let status = status.map_err(|source| ExecError::Process {
            phase,
            step: step.to_string(),
            source,
        })?;

        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            log_error(&format!("Command failed with exit code {exit_code}"));
            log_error(&format!("Command was: {command}"));
            return Err(ExecError::CommandFailed {
                phase,
                step: step.to_string(),
                exit_code,
            });
        }
        Ok(())
    }

    /// Non-verbose mode: capture output and surface it only on failure,
    /// in delimited blocks.
    async fn run_captured(&self, phase: Phase, step: &str, command: &str) -> Result<(), ExecError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|source| ExecError::Process {
                phase,
                step: step.to_string(),
                source,
            })?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            log_error(&format!("Command failed with exit code {exit_code}"));
            log_error(&format!("Command was: {command}"));

            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                dump_block("Error Output", &stderr);
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                dump_block("Standard Output", &stdout);
            }

            return Err(ExecError::CommandFailed {
                phase,
                step: step.to_string(),
                exit_code,
            });
        }
        Ok(())
    }
}

/// Flat template context: core job fields, then every input
/// stringified, then fallback defaults for conventional keys.
fn template_context(job: &Job) -> HashMap<String, String> {
    let mut context = HashMap::new();

    context.insert("id".to_string(), job.id.clone());
    context.insert("component".to_string(), job.component.clone());
    context.insert("provider".to_string(), job.provider.clone());
    context.insert("action".to_string(), job.action.clone());

    for (key, value) in &job.inputs {
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        context.insert(key.clone(), text);
    }

    let fallbacks = [
        ("releaseName", job.component.as_str()),
        ("namespace", "default"),
        ("chartPath", "."),
        ("valuesPath", "values.yaml"),
        ("timeout", "10m"),
    ];
    for (key, fallback) in fallbacks {
        context
            .entry(key.to_string())
            .or_insert_with(|| fallback.to_string());
    }

    context
}

// CI-log output helpers; this is user-facing output, not diagnostics.

fn log_section(message: &str) {
    println!();
    println!("{}", "━".repeat(78));
    println!("  {message}");
    println!("{}", "━".repeat(78));
}

fn log_step(num: usize, name: &str) {
    println!("\n  ▸ Step {num}: {name}");
}

fn log_info(message: &str) {
    println!("  ℹ {message}");
}

fn log_success(message: &str) {
    println!("\n  ✓ {message}");
}

fn log_error(message: &str) {
    eprintln!("\n  ✗ {message}");
}

fn dump_block(label: &str, content: &str) {
    eprintln!("\n  ┌─ {label}:");
    for line in content.trim().lines() {
        eprintln!("  │ {line}");
    }
    eprintln!("  └─");
}
