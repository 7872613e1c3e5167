//! # Initialize Status
//!
//! First action of the pipeline: seeds the condition set on a freshly
//! created resource so every later action and every observer sees a
//! well-formed status.

use crate::constants;
use crate::crd::conditions::{
    find_condition, set_condition, Condition, ConditionedResource, Phase, STATUS_UNKNOWN,
};
use crate::crd::TimestampAuthority;
use crate::engine::action::Action;
use crate::engine::outcome::Outcome;
use crate::engine::store::ObjectStore;
use async_trait::async_trait;
use kube::Resource;
use std::sync::Arc;

pub struct InitializeStatus {
    store: Arc<dyn ObjectStore<TimestampAuthority>>,
}

impl InitializeStatus {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<TimestampAuthority>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action<TimestampAuthority> for InitializeStatus {
    fn name(&self) -> &'static str {
        "initialize-status"
    }

    fn can_handle(&self, instance: &TimestampAuthority) -> bool {
        find_condition(instance.conditions(), constants::CONDITION_READY).is_none()
    }

    async fn handle(&self, instance: &mut TimestampAuthority) -> Outcome {
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
        set_condition(
            instance.conditions_mut(),
            Condition::in_phase(
                constants::CONDITION_CERT_CHAIN,
                STATUS_UNKNOWN,
                Phase::Pending,
                None,
                generation,
            ),
        );
        if let Some(status) = instance.status.as_mut() {
            status.observed_generation = generation;
        }
        Outcome::from_status_write(self.store.update_status(instance).await)
    }
}
