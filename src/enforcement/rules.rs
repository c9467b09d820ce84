//! Preflight rules over a transaction log, using Validation.

use crate::effects::{ExecuteOptions, TransactionLog};
use crate::enforcement::violations::ViolationError;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Check every step `options` would run, accumulating ALL violations.
///
/// A state key counts as available if it is already in the state store or
/// is the result target of an earlier step that will run. Steps that will
/// be skipped are not checked and produce nothing new.
pub fn preflight(
    log: &TransactionLog,
    options: ExecuteOptions,
) -> Validation<(), NonEmptyVec<ViolationError>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<ViolationError>>> = Vec::new();
    let mut available: HashSet<&str> = log.store().iter().map(|(key, _)| key).collect();

    for (index, step) in log.steps().iter().enumerate() {
        if !options.selects(step.state()) {
            continue;
        }

        let check = if step.is_resolved() {
            Validation::success(())
        } else {
            Validation::fail(ViolationError::UnresolvedFunction {
                index,
                function: step.function().to_string(),
            })
        };
        checks.push(check);

        for (argument, key) in step.state_keyword_args() {
            let check = if available.contains(key) {
                Validation::success(())
            } else {
                Validation::fail(ViolationError::UnproducedStateKey {
                    index,
                    argument: argument.to_string(),
                    key: key.to_string(),
                })
            };
            checks.push(check);
        }

        if let Some(target) = step.result_target() {
            available.insert(target);
        }
    }

    if checks.is_empty() {
        return Validation::success(());
    }
    Validation::all_vec(checks).map(|_| ())
}

/// Flatten a preflight result into a list, empty when everything passed.
pub fn list_violations(
    result: &Validation<(), NonEmptyVec<ViolationError>>,
) -> Vec<ViolationError> {
    match result {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errors) => errors.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StepBuilder;
    use crate::checkpoint::{FileStore, SnapshotStore, StoreConfig};
    use crate::core::StepError;
    use crate::effects::FunctionRegistry;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> FunctionRegistry {
        FunctionRegistry::new()
            .register("a", |_, _| Ok(json!(1)))
            .register("b", |_, _| Ok(json!(2)))
            .register("fail", |_, _| Err(StepError::new("Boom", "no")))
    }

    #[test]
    fn well_formed_log_passes() {
        let mut log = TransactionLog::new(registry());
        log.append(StepBuilder::call("a").returns("x")).unwrap();
        log.append(StepBuilder::call("b").kwarg_from_state("x", "x"))
            .unwrap();

        let result = preflight(&log, ExecuteOptions::default());
        assert!(result.is_success());
        assert!(list_violations(&result).is_empty());
    }

    #[test]
    fn empty_log_passes() {
        let log = TransactionLog::new(registry());
        assert!(preflight(&log, ExecuteOptions::default()).is_success());
    }

    #[test]
    fn accumulates_all_violations() {
        let mut log = TransactionLog::new(registry());
        log.append(StepBuilder::call("a").kwarg_from_state("n", "later"))
            .unwrap();
        log.append(StepBuilder::call("b").returns("later")).unwrap();
        log.bind(&FunctionRegistry::new().register("a", |_, _| Ok(json!(1))));

        let found = list_violations(&preflight(&log, ExecuteOptions::default()));

        assert_eq!(
            found,
            vec![
                ViolationError::UnproducedStateKey {
                    index: 0,
                    argument: "n".into(),
                    key: "later".into(),
                },
                ViolationError::UnresolvedFunction {
                    index: 1,
                    function: "b".into(),
                },
            ]
        );
        assert_eq!(found[1].step(), 1);
    }

    #[test]
    fn skipped_error_step_does_not_produce_its_target() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(StoreConfig::new(dir.path()).with_cleanup(false));
        let mut log = TransactionLog::new(registry());
        log.append(StepBuilder::call("fail").returns("x")).unwrap();
        log.append(StepBuilder::call("b").kwarg_from_state("x", "x"))
            .unwrap();
        assert!(log.execute(&store).is_err());

        assert!(preflight(&log, ExecuteOptions::default()).is_success());

        let found = list_violations(&preflight(&log, ExecuteOptions::skip_errors()));
        assert!(matches!(
            found.as_slice(),
            [ViolationError::UnproducedStateKey { index: 1, .. }]
        ));

        let reloaded = store
            .load(log.backing_location().unwrap(), &registry())
            .unwrap();
        assert!(preflight(&reloaded, ExecuteOptions::default()).is_success());
    }

    #[test]
    fn stored_results_satisfy_later_steps() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(StoreConfig::new(dir.path()).with_cleanup(false));
        let mut log = TransactionLog::new(registry());
        log.append(StepBuilder::call("a").returns("x")).unwrap();
        log.append(StepBuilder::call("fail").kwarg_from_state("x", "x"))
            .unwrap();
        assert!(log.execute(&store).is_err());

        // step 0 is finished and skipped, but its result is in the store
        assert!(preflight(&log, ExecuteOptions::default()).is_success());
    }
}
