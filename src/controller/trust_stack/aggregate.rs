//! # Aggregate Status
//!
//! Last action of the composite pipeline: folds the dependency conditions
//! into the `Ready` condition with worst-state-wins ordering and performs
//! the pipeline's single status write, skipped entirely when nothing
//! changed.

use crate::constants;
use crate::crd::conditions::{
    aggregate, set_condition, Aggregate, Condition, ConditionedResource, Phase, STATUS_FALSE,
    STATUS_TRUE,
};
use crate::crd::TrustStack;
use crate::engine::action::Action;
use crate::engine::outcome::Outcome;
use crate::engine::store::ObjectStore;
use async_trait::async_trait;
use kube::Resource;
use std::sync::Arc;

pub struct AggregateStatus {
    store: Arc<dyn ObjectStore<TrustStack>>,
}

impl AggregateStatus {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<TrustStack>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action<TrustStack> for AggregateStatus {
    fn name(&self) -> &'static str {
        "aggregate-status"
    }

    fn can_handle(&self, _instance: &TrustStack) -> bool {
        true
    }

    async fn handle(&self, instance: &mut TrustStack) -> Outcome {
        let generation = instance.meta().generation;

        // Components removed from the spec fall back to NotDefined so they
        // stop holding the aggregate down.
        let mut changed = false;
        for (condition_type, configured) in super::component_states(instance) {
            if !configured {
                changed |= set_condition(
                    instance.conditions_mut(),
                    Condition::not_defined(condition_type, generation),
                );
            }
        }

        let dependencies: Vec<Condition> = instance
            .conditions()
            .iter()
            .filter(|condition| {
                super::COMPONENT_CONDITIONS.contains(&condition.r#type.as_str())
            })
            .cloned()
            .collect();
        let ready = match aggregate(dependencies.iter()) {
            Aggregate::Failed(message) => {
                Condition::failed(constants::CONDITION_READY, &message, generation)
            }
            Aggregate::InPhase(Phase::Ready) => Condition::in_phase(
                constants::CONDITION_READY,
                STATUS_TRUE,
                Phase::Ready,
                Some("all components ready"),
                generation,
            ),
            Aggregate::InPhase(phase) => Condition::in_phase(
                constants::CONDITION_READY,
                STATUS_FALSE,
                phase,
                None,
                generation,
            ),
        };
        changed |= set_condition(instance.conditions_mut(), ready);

        if let Some(status) = instance.status.as_mut() {
            if status.observed_generation != generation {
                status.observed_generation = generation;
                changed = true;
            }
        }

        if changed {
            Outcome::from_status_write(self.store.update_status(instance).await)
        } else {
            Outcome::Continue
        }
    }
}
