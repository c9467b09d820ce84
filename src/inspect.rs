//! Human-readable rendering of a transaction.

use crate::core::{State, Step};
use crate::effects::{ExecuteOptions, TransactionLog};
use crate::enforcement::{list_violations, preflight, ViolationError};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;

/// One-line call description, e.g. `state['y'] = scale(3, by=2, x=state['x'])`.
///
/// # Example
///
/// ```rust
/// use resumable::builder::StepBuilder;
/// use resumable::inspect::describe_step;
/// use serde_json::json;
///
/// let step = StepBuilder::call("scale")
///     .arg(json!(3))
///     .kwarg("by", json!(2))
///     .kwarg_from_state("x", "x")
///     .returns("y")
///     .build()
///     .unwrap();
///
/// assert_eq!(describe_step(&step), "state['y'] = scale(3, by=2, x=state['x'])");
/// ```
pub fn describe_step(step: &Step) -> String {
    let target = step
        .result_target()
        .map(|target| format!("state['{target}'] = "))
        .unwrap_or_default();

    let arguments: Vec<String> = step
        .args()
        .iter()
        .map(|value| value.to_string())
        .chain(
            step.keyword_args()
                .map(|(name, value)| format!("{name}={value}")),
        )
        .chain(
            step.state_keyword_args()
                .map(|(name, key)| format!("{name}=state['{key}']")),
        )
        .collect();

    format!("{target}{}({})", function_label(step), arguments.join(", "))
}

fn function_label(step: &Step) -> String {
    if step.is_resolved() {
        step.function().to_string()
    } else {
        format!("{{UNRESOLVED:{}}}", step.function())
    }
}

fn seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}

/// Inspection report: overall state, error information, timings, one line
/// per step, and preflight findings for the next default run.
pub struct Report<'a> {
    log: &'a TransactionLog,
    violations: Vec<ViolationError>,
}

impl<'a> Report<'a> {
    pub fn new(log: &'a TransactionLog) -> Self {
        let unresolved = log.unresolved_steps();
        if !unresolved.is_empty() {
            warn!(
                tx_id = %log.id(),
                steps = ?unresolved,
                "Inspecting a transaction with unregistered step functions; \
                 register them before resuming"
            );
        }

        Self {
            log,
            violations: list_violations(&preflight(log, ExecuteOptions::default())),
        }
    }

    /// Problems the next default `execute` call would hit.
    pub fn violations(&self) -> &[ViolationError] {
        &self.violations
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = self.log;

        writeln!(f, "Transaction:       {}", log.id())?;
        writeln!(f, "Transaction state: {}", log.state().name())?;
        match log.error_info() {
            Some(info) => {
                let at = info
                    .step
                    .map(|index| format!(" (step {index})"))
                    .unwrap_or_default();
                writeln!(f, "Error information: {}: {}{at}", info.kind, info.message)?;
                for frame in &info.frames {
                    writeln!(f, "    {frame}")?;
                }
            }
            None => writeln!(f, "Error information: none")?,
        }
        writeln!(f, "Started at:        {}", timestamp(log.started_at()))?;
        writeln!(f, "Finished/Ended at: {}", timestamp(log.finished_at()))?;
        match (log.started_at(), log.finished_at()) {
            (Some(start), Some(end)) => {
                writeln!(f, "Elapsed time:      {:.3}s", seconds(start, end))?
            }
            _ => writeln!(f, "Elapsed time:      -")?,
        }

        writeln!(f)?;
        writeln!(f, "Steps:")?;
        writeln!(f)?;
        for step in log.steps() {
            write!(f, "{}  # {}", describe_step(step), step.state().name())?;
            if let (Some(base), Some(start)) = (log.started_at(), step.started_at()) {
                write!(f, " at {:.3}s", seconds(base, start))?;
            }
            if let (Some(start), Some(end)) = (step.started_at(), step.finished_at()) {
                write!(f, " took {:.3}s", seconds(start, end))?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        if self.violations.is_empty() {
            write!(f, "Preflight: ok")
        } else {
            write!(f, "Preflight:")?;
            for violation in &self.violations {
                write!(f, "\n  - {violation}")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StepBuilder;
    use crate::checkpoint::{FileStore, StoreConfig};
    use crate::core::StepError;
    use crate::effects::FunctionRegistry;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> FunctionRegistry {
        FunctionRegistry::new()
            .register("a", |_, _| Ok(json!(1)))
            .register("fail", |_, _| Err(StepError::new("Boom", "always fails")))
    }

    #[test]
    fn describes_calls_without_target() {
        let step = StepBuilder::call("ping")
            .arg(json!("host"))
            .build()
            .unwrap();
        // not bound to a registry, so marked unresolved
        assert_eq!(describe_step(&step), r#"{UNRESOLVED:ping}("host")"#);
    }

    #[test]
    fn pending_report_has_no_timings() {
        let mut log = TransactionLog::new(registry());
        log.append(StepBuilder::call("a").returns("x")).unwrap();

        let report = Report::new(&log).to_string();

        assert!(report.contains("Transaction state: pending"));
        assert!(report.contains("Error information: none"));
        assert!(report.contains("Elapsed time:      -"));
        assert!(report.contains("state['x'] = a()  # pending\n"));
        assert!(report.ends_with("Preflight: ok"));
    }

    #[test]
    fn aborted_report_shows_error_and_step_states() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(StoreConfig::new(dir.path()).with_cleanup(false));
        let mut log = TransactionLog::new(registry());
        log.append(StepBuilder::call("a")).unwrap();
        log.append(StepBuilder::call("fail")).unwrap();
        log.append(StepBuilder::call("a")).unwrap();
        assert!(log.execute(&store).is_err());

        let report = Report::new(&log).to_string();
        let lines: Vec<&str> = report.lines().collect();

        assert!(report.contains("Transaction state: aborted"));
        assert!(report.contains("Error information: Boom: always fails (step 1)"));
        assert!(lines.iter().any(|l| l.starts_with("a()  # finished at ")));
        assert!(lines.iter().any(|l| l.starts_with("fail()  # error at ")));
        assert!(lines.iter().any(|l| *l == "a()  # pending"));
    }

    #[test]
    fn unresolved_steps_show_up_in_preflight() {
        let mut log = TransactionLog::new(registry());
        log.append(StepBuilder::call("fail")).unwrap();
        log.bind(&FunctionRegistry::new());

        let report = Report::new(&log);
        assert_eq!(report.violations().len(), 1);

        let text = report.to_string();
        assert!(text.contains("{UNRESOLVED:fail}()  # pending"));
        assert!(text.contains("Preflight:\n  - Step 0 calls 'fail', which is not registered"));
    }
}
