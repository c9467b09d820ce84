//! The transaction log and its execution loop.

use crate::builder::StepBuilder;
use crate::checkpoint::SnapshotStore;
use crate::core::{
    ArgSource, ErrorInfo, IllegalTransition, State, StateStore, Step, StepError, StepState,
    TransactionState,
};
use crate::effects::registry::FunctionRegistry;
use crate::error::TransactionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which steps an `execute` call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Skip steps that already reached `Finished`
    pub only_pending: bool,
    /// Re-attempt steps left in `Error`, or in `Started` by a crash
    pub treat_error_as_pending: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            only_pending: true,
            treat_error_as_pending: true,
        }
    }
}

impl ExecuteOptions {
    /// Leave failed steps failed and carry on with the rest.
    pub fn skip_errors() -> Self {
        Self {
            treat_error_as_pending: false,
            ..Self::default()
        }
    }

    /// Whether a step in `state` is run (pure).
    ///
    /// A `Started` step was in flight when the process died. It is retried
    /// like an `Error` one, and like any non-pending step it also runs when
    /// `only_pending` is off.
    pub fn selects(&self, state: StepState) -> bool {
        match state {
            StepState::Pending => true,
            StepState::Started => self.treat_error_as_pending || !self.only_pending,
            StepState::Error => self.treat_error_as_pending,
            StepState::Finished => !self.only_pending,
        }
    }
}

/// Ordered steps plus the transaction's own lifecycle, results, and error
/// information.
///
/// Steps are appended while the transaction is `Pending` and never reordered.
/// `execute` runs them one at a time in that order, persisting a snapshot
/// after every state change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionLog {
    id: Uuid,
    state: TransactionState,
    steps: Vec<Step>,
    store: StateStore,
    error_info: Option<ErrorInfo>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    backing: Option<PathBuf>,
    #[serde(skip)]
    registry: FunctionRegistry,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new(FunctionRegistry::new())
    }
}

impl TransactionLog {
    /// Create an empty, pending transaction whose steps resolve against
    /// `registry`.
    pub fn new(registry: FunctionRegistry) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: TransactionState::Pending,
            steps: Vec::new(),
            store: StateStore::new(),
            error_info: None,
            started_at: None,
            finished_at: None,
            backing: None,
            registry,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn error_info(&self) -> Option<&ErrorInfo> {
        self.error_info.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Stable location of the durable snapshot, once one has been written.
    pub fn backing_location(&self) -> Option<&Path> {
        self.backing.as_deref()
    }

    pub(crate) fn set_backing_location(&mut self, location: PathBuf) {
        self.backing = Some(location);
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Bind every step against `registry`, returning the indices of steps
    /// whose function it does not know.
    pub fn bind(&mut self, registry: &FunctionRegistry) -> Vec<usize> {
        self.registry = registry.clone();
        for step in &mut self.steps {
            step.resolved = registry.contains(step.function.as_str());
        }
        self.unresolved_steps()
    }

    /// Indices of steps without a bound handler.
    pub fn unresolved_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, step)| !step.is_resolved())
            .map(|(index, _)| index)
            .collect()
    }

    /// Append a step, returning its index.
    ///
    /// Only valid while the transaction is `Pending`. The step's function
    /// must be registered.
    pub fn append(&mut self, builder: StepBuilder) -> Result<usize, TransactionError> {
        if self.state != TransactionState::Pending {
            return Err(TransactionError::AppendAfterStart { state: self.state });
        }

        let mut step = builder.build()?;
        let index = self.steps.len();
        if !self.registry.contains(step.function.as_str()) {
            return Err(TransactionError::UnresolvedFunction {
                index,
                function: step.function,
                location: None,
            });
        }

        step.resolved = true;
        self.steps.push(step);
        Ok(index)
    }

    /// Execute with the default options: run pending steps and re-attempt
    /// failed ones.
    pub fn execute<S>(&mut self, store: &S) -> Result<(), TransactionError>
    where
        S: SnapshotStore + ?Sized,
    {
        self.execute_with(store, ExecuteOptions::default())
    }

    /// Run the selected steps in order, persisting after every transition.
    ///
    /// Stops at the first failing step. By the time an error is returned the
    /// failure is already in the snapshot, unless the error is itself a
    /// snapshot failure.
    pub fn execute_with<S>(
        &mut self,
        store: &S,
        options: ExecuteOptions,
    ) -> Result<(), TransactionError>
    where
        S: SnapshotStore + ?Sized,
    {
        self.transition(TransactionState::Started)?;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        store.save(self)?;

        info!(
            tx_id = %self.id,
            steps = self.steps.len(),
            only_pending = options.only_pending,
            treat_error_as_pending = options.treat_error_as_pending,
            "Executing transaction"
        );

        for index in 0..self.steps.len() {
            let state = self.steps[index].state;
            if !options.selects(state) {
                debug!(tx_id = %self.id, step = index, state = %state, "Skipping step");
                continue;
            }
            self.run_step(index, store)?;
        }

        self.transition(TransactionState::Finished)?;
        self.finished_at = Some(Utc::now());
        store.save(self)?;
        info!(tx_id = %self.id, "Transaction finished");

        if store.config().cleanup {
            store.remove(self)?;
        }
        Ok(())
    }

    fn run_step<S>(&mut self, index: usize, store: &S) -> Result<(), TransactionError>
    where
        S: SnapshotStore + ?Sized,
    {
        let Some(handler) = self.registry.resolve(&self.steps[index].function).cloned() else {
            return self.abort_unresolved(index, store);
        };

        self.steps[index]
            .start(Utc::now())
            .map_err(|e| step_transition_error(index, e))?;
        store.save(self)?;

        let step = &self.steps[index];
        debug!(
            tx_id = %self.id,
            step = index,
            function = %step.function,
            attempt = step.attempts,
            "Step started"
        );

        let outcome = self
            .resolve_kwargs(step)
            .and_then(|kwargs| handler(&step.args, &kwargs));

        match outcome {
            Ok(value) => {
                if let Some(target) = self.steps[index].result_target.clone() {
                    self.store.insert(target, value);
                }
                self.steps[index]
                    .finish(StepState::Finished, Utc::now())
                    .map_err(|e| step_transition_error(index, e))?;
                store.save(self)?;
                debug!(tx_id = %self.id, step = index, "Step finished");
                Ok(())
            }
            Err(error) => self.abort_failed(index, error, store),
        }
    }

    /// Literal kwargs overlaid with current state store values.
    fn resolve_kwargs(&self, step: &Step) -> Result<Map<String, Value>, StepError> {
        let mut kwargs = Map::new();
        for (name, source) in &step.kwargs {
            let value = match source {
                ArgSource::Literal(value) => value.clone(),
                ArgSource::State(key) => self
                    .store
                    .get(key)
                    .cloned()
                    .ok_or_else(|| StepError::missing_state_key(name, key))?,
            };
            kwargs.insert(name.clone(), value);
        }
        Ok(kwargs)
    }

    fn abort_failed<S>(
        &mut self,
        index: usize,
        error: StepError,
        store: &S,
    ) -> Result<(), TransactionError>
    where
        S: SnapshotStore + ?Sized,
    {
        let now = Utc::now();
        self.error_info = Some(ErrorInfo::capture(Some(index), &error));
        self.steps[index]
            .finish(StepState::Error, now)
            .map_err(|e| step_transition_error(index, e))?;
        self.transition(TransactionState::Aborted)?;
        self.finished_at = Some(now);
        store.save(self)?;

        warn!(
            tx_id = %self.id,
            step = index,
            kind = %error.kind,
            error = %error.message,
            path = ?self.backing,
            "Step failed, transaction aborted"
        );

        Err(TransactionError::StepFailed {
            index,
            function: self.steps[index].function.clone(),
            location: self.reported_location(store),
            source: error,
        })
    }

    /// The step is never invoked and keeps its state; only the transaction
    /// records the failure.
    fn abort_unresolved<S>(&mut self, index: usize, store: &S) -> Result<(), TransactionError>
    where
        S: SnapshotStore + ?Sized,
    {
        let function = self.steps[index].function.clone();
        self.steps[index].resolved = false;
        let error = StepError::new(
            "UnresolvedFunction",
            format!("'{function}' is not registered"),
        );
        self.error_info = Some(ErrorInfo::capture(Some(index), &error));
        self.transition(TransactionState::Aborted)?;
        self.finished_at = Some(Utc::now());
        store.save(self)?;

        warn!(
            tx_id = %self.id,
            step = index,
            function = %function,
            "Step function is not registered, transaction aborted"
        );

        Err(TransactionError::UnresolvedFunction {
            index,
            function,
            location: self.reported_location(store),
        })
    }

    /// Abandon a transaction that failed while being assembled.
    pub(crate) fn abandon(&mut self, error: &StepError) -> Result<(), TransactionError> {
        self.error_info = Some(ErrorInfo::capture(None, error));
        self.transition(TransactionState::Aborted)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn reported_location<S>(&self, store: &S) -> Option<PathBuf>
    where
        S: SnapshotStore + ?Sized,
    {
        if store.config().verbose_errors {
            self.backing.clone()
        } else {
            None
        }
    }

    fn transition(&mut self, to: TransactionState) -> Result<(), TransactionError> {
        if !self.state.can_transition_to(&to) {
            return Err(TransactionError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

fn step_transition_error(index: usize, e: IllegalTransition) -> TransactionError {
    TransactionError::IllegalStepTransition {
        index,
        from: e.from,
        to: e.to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointError, FileStore, StoreConfig};
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Records the transaction state at every save instead of writing files.
    struct RecordingStore {
        config: StoreConfig,
        saves: RefCell<Vec<(TransactionState, Vec<StepState>)>>,
        fail_after: Option<usize>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                config: StoreConfig::default().with_cleanup(false),
                saves: RefCell::new(Vec::new()),
                fail_after: None,
            }
        }
    }

    impl SnapshotStore for RecordingStore {
        fn save(&self, log: &mut TransactionLog) -> Result<PathBuf, CheckpointError> {
            let mut saves = self.saves.borrow_mut();
            if self.fail_after == Some(saves.len()) {
                return Err(CheckpointError::ShortWrite {
                    written: 0,
                    expected: 1,
                });
            }
            saves.push((
                log.state(),
                log.steps().iter().map(Step::state).collect(),
            ));
            let location = PathBuf::from("/virtual/transaction.json");
            log.set_backing_location(location.clone());
            Ok(location)
        }

        fn load(
            &self,
            _location: &Path,
            _registry: &FunctionRegistry,
        ) -> Result<TransactionLog, CheckpointError> {
            unimplemented!("not used by these tests")
        }

        fn remove(&self, _log: &TransactionLog) -> Result<(), CheckpointError> {
            Ok(())
        }

        fn config(&self) -> &StoreConfig {
            &self.config
        }
    }

    fn arithmetic() -> FunctionRegistry {
        FunctionRegistry::new()
            .register("one", |_, _| Ok(json!(1)))
            .register("add", |args, kwargs| {
                let positional: i64 = args.iter().filter_map(Value::as_i64).sum();
                let keyword: i64 = kwargs.values().filter_map(Value::as_i64).sum();
                Ok(json!(positional + keyword))
            })
            .register("fail", |_, _| Err(StepError::new("Boom", "always fails")))
    }

    #[test]
    fn persists_after_every_transition() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one").returns("x")).unwrap();
        log.append(StepBuilder::call("add").kwarg_from_state("a", "x"))
            .unwrap();

        log.execute(&store).unwrap();

        use StepState::*;
        use TransactionState as T;
        let saves = store.saves.borrow();
        assert_eq!(
            *saves,
            vec![
                (T::Started, vec![Pending, Pending]),
                (T::Started, vec![Started, Pending]),
                (T::Started, vec![Finished, Pending]),
                (T::Started, vec![Finished, Started]),
                (T::Started, vec![Finished, Finished]),
                (T::Finished, vec![Finished, Finished]),
            ]
        );
    }

    #[test]
    fn failure_is_persisted_before_it_is_returned() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one")).unwrap();
        log.append(StepBuilder::call("fail")).unwrap();
        log.append(StepBuilder::call("one")).unwrap();

        let err = log.execute(&store).unwrap_err();

        assert!(matches!(err, TransactionError::StepFailed { index: 1, .. }));
        assert_eq!(err.step_error().unwrap().kind, "Boom");
        assert_eq!(
            err.location(),
            Some(Path::new("/virtual/transaction.json"))
        );

        let saves = store.saves.borrow();
        let last = saves.last().unwrap();
        assert_eq!(
            *last,
            (
                TransactionState::Aborted,
                vec![StepState::Finished, StepState::Error, StepState::Pending]
            )
        );

        let info = log.error_info().unwrap();
        assert_eq!(info.step, Some(1));
        assert_eq!(info.kind, "Boom");
        assert_eq!(info.message, "always fails");
        assert!(log.finished_at().is_some());
    }

    #[test]
    fn quiet_store_hides_location_in_error() {
        let mut store = RecordingStore::new();
        store.config = store.config.with_verbose_errors(false);
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("fail")).unwrap();

        let err = log.execute(&store).unwrap_err();
        assert!(err.location().is_none());
        assert!(log.backing_location().is_some());
    }

    #[test]
    fn missing_state_key_fails_the_step() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("add").kwarg_from_state("a", "nowhere"))
            .unwrap();

        let err = log.execute(&store).unwrap_err();

        assert_eq!(err.step_error().unwrap().kind, "MissingStateKey");
        assert_eq!(log.steps()[0].state(), StepState::Error);
        assert_eq!(log.state(), TransactionState::Aborted);
    }

    #[test]
    fn state_lookups_overlay_literals() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one").returns("x")).unwrap();
        log.append(
            StepBuilder::call("add")
                .arg(json!(10))
                .kwarg("b", json!(100))
                .kwarg_from_state("a", "x")
                .returns("sum"),
        )
        .unwrap();

        log.execute(&store).unwrap();
        assert_eq!(log.store().get("sum"), Some(&json!(111)));
    }

    #[test]
    fn result_target_overwrites_previous_value() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one").returns("n")).unwrap();
        log.append(
            StepBuilder::call("add")
                .arg(json!(1))
                .kwarg_from_state("prev", "n")
                .returns("n"),
        )
        .unwrap();

        log.execute(&store).unwrap();
        assert_eq!(log.store().get("n"), Some(&json!(2)));
        assert_eq!(log.store().len(), 1);
    }

    #[test]
    fn append_rejects_unknown_functions() {
        let mut log = TransactionLog::new(arithmetic());
        let err = log.append(StepBuilder::call("nope")).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::UnresolvedFunction { index: 0, .. }
        ));
        assert!(log.steps().is_empty());
    }

    #[test]
    fn append_after_start_is_rejected() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one")).unwrap();
        log.execute(&store).unwrap();

        let err = log.append(StepBuilder::call("one")).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::AppendAfterStart {
                state: TransactionState::Finished
            }
        ));
    }

    #[test]
    fn unresolved_step_aborts_without_invoking() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one")).unwrap();
        log.append(StepBuilder::call("fail")).unwrap();
        log.bind(&FunctionRegistry::new().register("one", |_, _| Ok(json!(1))));

        let err = log.execute(&store).unwrap_err();

        assert!(matches!(
            err,
            TransactionError::UnresolvedFunction { index: 1, .. }
        ));
        assert_eq!(log.steps()[1].state(), StepState::Pending);
        assert_eq!(log.steps()[1].attempts(), 0);
        assert_eq!(log.state(), TransactionState::Aborted);
        assert_eq!(log.error_info().unwrap().kind, "UnresolvedFunction");
    }

    #[test]
    fn unresolved_but_skipped_step_is_harmless() {
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one")).unwrap();
        log.execute(&store).unwrap();

        log.bind(&FunctionRegistry::new());
        assert_eq!(log.unresolved_steps(), vec![0]);
        log.execute(&store).unwrap();
        assert_eq!(log.state(), TransactionState::Finished);
    }

    #[test]
    fn rerun_everything_when_not_only_pending() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = FunctionRegistry::new().register("count", move |_, _| {
            Ok(json!(counter.fetch_add(1, Ordering::SeqCst)))
        });
        let store = RecordingStore::new();
        let mut log = TransactionLog::new(registry);
        log.append(StepBuilder::call("count")).unwrap();

        log.execute(&store).unwrap();
        log.execute(&store).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        log.execute_with(
            &store,
            ExecuteOptions {
                only_pending: false,
                treat_error_as_pending: true,
            },
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(log.steps()[0].attempts(), 2);
    }

    #[test]
    fn snapshot_failure_is_fatal_and_stops_the_loop() {
        let mut store = RecordingStore::new();
        store.fail_after = Some(2);
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one")).unwrap();
        log.append(StepBuilder::call("one")).unwrap();

        let err = log.execute(&store).unwrap_err();

        assert!(matches!(
            err,
            TransactionError::Checkpoint(CheckpointError::ShortWrite { .. })
        ));
        assert_eq!(log.steps()[1].state(), StepState::Pending);
    }

    #[test]
    fn cleanup_removes_snapshot_on_success() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(StoreConfig::new(dir.path()));
        let mut log = TransactionLog::new(arithmetic());
        log.append(StepBuilder::call("one")).unwrap();

        log.execute(&store).unwrap();

        let location = log.backing_location().unwrap();
        assert!(!location.exists());
    }

    #[test]
    fn options_select_steps() {
        let default = ExecuteOptions::default();
        assert!(default.selects(StepState::Pending));
        assert!(default.selects(StepState::Error));
        assert!(default.selects(StepState::Started));
        assert!(!default.selects(StepState::Finished));

        let skip = ExecuteOptions::skip_errors();
        assert!(skip.selects(StepState::Pending));
        assert!(!skip.selects(StepState::Error));
        assert!(!skip.selects(StepState::Started));
    }
}
