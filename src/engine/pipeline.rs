//! # Pipeline
//!
//! Ordered action list executed against one resource instance per
//! reconciliation request.
//!
//! Actions run strictly in list order; the first outcome that is not
//! `Continue` short-circuits the rest of the list. Exhausting the list with
//! all `Continue` means steady state: no requeue, the next pass comes from
//! the watch. Terminal errors pin `Ready=False/Failure` on the instance and
//! are handed back to the caller so the error-policy layer can back off;
//! transient errors retry on a fixed delay without touching conditions.

use crate::constants;
use crate::crd::conditions::{set_condition, Condition, ConditionedResource};
use crate::engine::action::Action;
use crate::engine::outcome::{ActionError, Outcome, TRANSIENT_REQUEUE};
use crate::engine::store::ObjectStore;
use kube::Resource;
use kube_runtime::controller::Action as RequeueDirective;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reconciliation failed: {0}")]
    Terminal(#[source] anyhow::Error),
}

pub struct Pipeline<R> {
    kind: &'static str,
    store: Arc<dyn ObjectStore<R>>,
    actions: Vec<Box<dyn Action<R>>>,
}

impl<R> std::fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("kind", &self.kind)
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

impl<R> Pipeline<R>
where
    R: ConditionedResource,
{
    #[must_use]
    pub fn new(kind: &'static str, store: Arc<dyn ObjectStore<R>>) -> Self {
        Self {
            kind,
            store,
            actions: Vec::new(),
        }
    }

    /// Append an action; order of calls is execution order
    #[must_use]
    pub fn with(mut self, action: impl Action<R> + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// Run the pipeline against one instance and translate the stopping
    /// outcome into the controller's requeue directive.
    pub async fn run(&self, instance: &mut R) -> Result<RequeueDirective, ReconcileError> {
        for action in &self.actions {
            if !action.can_handle(instance) {
                continue;
            }
            debug!(kind = self.kind, action = action.name(), "running action");

            let outcome = match action.handle(instance).await {
                Outcome::Error(err) if action.can_handle_error(instance, &err) => {
                    action.handle_error(instance, err).await
                }
                other => other,
            };

            match outcome {
                Outcome::Continue => {}
                Outcome::Stop => return Ok(RequeueDirective::await_change()),
                Outcome::Requeue(delay) => return Ok(RequeueDirective::requeue(delay)),
                Outcome::Error(ActionError::Transient(err)) => {
                    warn!(
                        kind = self.kind,
                        action = action.name(),
                        error = %err,
                        "transient failure, retrying"
                    );
                    return Ok(RequeueDirective::requeue(TRANSIENT_REQUEUE));
                }
                Outcome::Error(ActionError::Terminal(err)) => {
                    error!(
                        kind = self.kind,
                        action = action.name(),
                        error = %err,
                        "terminal failure"
                    );
                    self.record_failure(instance, &err).await;
                    return Err(ReconcileError::Terminal(err));
                }
            }
        }
        // Every action reported Continue: the instance is in steady state.
        Ok(RequeueDirective::await_change())
    }

    /// Pin `Ready=False/Failure` on the instance and persist it. A failed
    /// persist is only logged; the caller's backoff retry will re-read and
    /// recompute anyway.
    async fn record_failure(&self, instance: &mut R, err: &anyhow::Error) {
        let generation = instance.meta().generation;
        let changed = set_condition(
            instance.conditions_mut(),
            Condition::failed(constants::CONDITION_READY, &err.to_string(), generation),
        );
        if changed {
            if let Err(write_err) = self.store.update_status(instance).await {
                warn!(
                    kind = self.kind,
                    error = %write_err,
                    "failed to persist failure condition"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::conditions::{find_condition, STATUS_FALSE};
    use crate::crd::{TimestampAuthority, TimestampAuthoritySpec};
    use crate::engine::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn instance() -> TimestampAuthority {
        let mut tsa = TimestampAuthority::new("tsa", TimestampAuthoritySpec::default());
        tsa.metadata.namespace = Some("default".to_string());
        tsa
    }

    struct Scripted {
        name: &'static str,
        outcome: fn() -> Outcome,
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Action<TimestampAuthority> for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn can_handle(&self, _instance: &TimestampAuthority) -> bool {
            true
        }

        async fn handle(&self, _instance: &mut TimestampAuthority) -> Outcome {
            self.ran.store(true, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn scripted(name: &'static str, outcome: fn() -> Outcome) -> (Scripted, Arc<AtomicBool>) {
        let ran = Arc::new(AtomicBool::new(false));
        (
            Scripted {
                name,
                outcome,
                ran: Arc::clone(&ran),
            },
            ran,
        )
    }

    #[tokio::test]
    async fn test_stop_short_circuits_remaining_actions() {
        let store = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let (first, first_ran) = scripted("first", || Outcome::Stop);
        let (second, second_ran) = scripted("second", || Outcome::Continue);
        let pipeline = Pipeline::new("TimestampAuthority", store).with(first).with(second);

        let mut tsa = instance();
        pipeline.run(&mut tsa).await.unwrap();
        assert!(first_ran.load(Ordering::SeqCst));
        assert!(!second_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_all_continue_reaches_steady_state() {
        let store = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let (first, _) = scripted("first", || Outcome::Continue);
        let (second, second_ran) = scripted("second", || Outcome::Continue);
        let pipeline = Pipeline::new("TimestampAuthority", store).with(first).with(second);

        let mut tsa = instance();
        let directive = pipeline.run(&mut tsa).await.unwrap();
        assert!(second_ran.load(Ordering::SeqCst));
        assert_eq!(directive, RequeueDirective::await_change());
    }

    #[tokio::test]
    async fn test_requeue_is_propagated() {
        let store = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let (action, _) = scripted("requeue", || Outcome::Requeue(Duration::from_secs(7)));
        let pipeline = Pipeline::new("TimestampAuthority", store).with(action);

        let mut tsa = instance();
        let directive = pipeline.run(&mut tsa).await.unwrap();
        assert_eq!(directive, RequeueDirective::requeue(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_transient_error_requeues_without_touching_ready() {
        let store = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let (action, _) = scripted("flaky", || Outcome::transient(anyhow::anyhow!("hiccup")));
        let pipeline = Pipeline::new("TimestampAuthority", store).with(action);

        let mut tsa = instance();
        let directive = pipeline.run(&mut tsa).await.unwrap();
        assert_eq!(directive, RequeueDirective::requeue(Duration::from_secs(5)));
        assert!(tsa.status.is_none(), "transient errors must not flap conditions");
    }

    #[tokio::test]
    async fn test_terminal_error_pins_ready_failure_and_persists() {
        let store = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let mut tsa = instance();
        store.seed(&tsa);
        // Run against the stored copy so the status write carries the right
        // version token.
        tsa = store.get("default", "tsa").await.unwrap().unwrap();

        let (action, _) = scripted("broken", || {
            Outcome::terminal(anyhow::anyhow!("malformed immutable field"))
        });
        let pipeline = Pipeline::new(
            "TimestampAuthority",
            Arc::clone(&store) as Arc<dyn ObjectStore<TimestampAuthority>>,
        )
        .with(action);

        let err = pipeline.run(&mut tsa).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Terminal(_)));

        let ready = find_condition(tsa.conditions(), constants::CONDITION_READY).unwrap();
        assert_eq!(ready.status, STATUS_FALSE);
        assert!(ready.is_failure());

        let persisted = store.get("default", "tsa").await.unwrap().unwrap();
        let ready = find_condition(persisted.conditions(), constants::CONDITION_READY).unwrap();
        assert!(ready.is_failure());
        assert_eq!(
            ready.message.as_deref(),
            Some("malformed immutable field")
        );
    }

    #[tokio::test]
    async fn test_guard_skips_action() {
        struct Guarded(Arc<AtomicBool>);

        #[async_trait]
        impl Action<TimestampAuthority> for Guarded {
            fn name(&self) -> &'static str {
                "guarded"
            }

            fn can_handle(&self, _instance: &TimestampAuthority) -> bool {
                false
            }

            async fn handle(&self, _instance: &mut TimestampAuthority) -> Outcome {
                self.0.store(true, Ordering::SeqCst);
                Outcome::Stop
            }
        }

        let store = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let ran = Arc::new(AtomicBool::new(false));
        let pipeline =
            Pipeline::new("TimestampAuthority", store).with(Guarded(Arc::clone(&ran)));

        let mut tsa = instance();
        let directive = pipeline.run(&mut tsa).await.unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(directive, RequeueDirective::await_change());
    }
}
