//! # Initialize Status
//!
//! Seeds the aggregate `Ready` condition plus one dependency condition per
//! component: `Pending` for configured components, `NotDefined` for absent
//! ones so they never hold the composite back.

use crate::constants;
use crate::crd::conditions::{
    find_condition, set_condition, Condition, ConditionedResource, Phase, STATUS_UNKNOWN,
};
use crate::crd::TrustStack;
use crate::engine::action::Action;
use crate::engine::outcome::Outcome;
use crate::engine::store::ObjectStore;
use async_trait::async_trait;
use kube::Resource;
use std::sync::Arc;

pub struct InitializeStatus {
    store: Arc<dyn ObjectStore<TrustStack>>,
}

impl InitializeStatus {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<TrustStack>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action<TrustStack> for InitializeStatus {
    fn name(&self) -> &'static str {
        "initialize-status"
    }

    fn can_handle(&self, instance: &TrustStack) -> bool {
        find_condition(instance.conditions(), constants::CONDITION_READY).is_none()
    }

    async fn handle(&self, instance: &mut TrustStack) -> Outcome {
        let generation = instance.meta().generation;
        set_condition(
            instance.conditions_mut(),
            Condition::in_phase(
                constants::CONDITION_READY,
                STATUS_UNKNOWN,
                Phase::Pending,
                Some("reconciliation started"),
                generation,
            ),
        );
        for (condition_type, configured) in super::component_states(instance) {
            let condition = if configured {
                Condition::in_phase(condition_type, STATUS_UNKNOWN, Phase::Pending, None, generation)
            } else {
                Condition::not_defined(condition_type, generation)
            };
            set_condition(instance.conditions_mut(), condition);
        }
        if let Some(status) = instance.status.as_mut() {
            status.observed_generation = generation;
        }
        Outcome::from_status_write(self.store.update_status(instance).await)
    }
}
