//! # Component Actions
//!
//! One ensure-and-copy-status action per sub-system. Each action drives the
//! child custom resource toward the desired state derived from the
//! composite's spec, then mirrors the child's `Ready` condition into the
//! parent's dependency condition. Status is only persisted later, by the
//! aggregation action, so the pipeline performs at most one status write.

use crate::constants;
use crate::crd::conditions::{
    find_condition, set_condition, Condition, ConditionedResource, Phase, STATUS_UNKNOWN,
};
use crate::crd::{
    CertificateAuthority, MetadataService, TimestampAuthority, TransparencyLog, TreeLog, TrustStack,
};
use crate::engine::action::Action;
use crate::engine::ensure::{ensure, inherit_metadata, owned_by, EnsurePolicy};
use crate::engine::outcome::Outcome;
use crate::engine::store::ObjectStore;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

/// Ensure one owned child resource and mirror its readiness
pub struct EnsureComponent<C: ConditionedResource> {
    action_name: &'static str,
    condition_type: &'static str,
    store: Arc<dyn ObjectStore<C>>,
    build: fn(&TrustStack) -> Option<C>,
}

impl<C: ConditionedResource> EnsureComponent<C> {
    #[must_use]
    pub fn new(
        action_name: &'static str,
        condition_type: &'static str,
        store: Arc<dyn ObjectStore<C>>,
        build: fn(&TrustStack) -> Option<C>,
    ) -> Self {
        Self {
            action_name,
            condition_type,
            store,
            build,
        }
    }
}

#[async_trait]
impl<C> Action<TrustStack> for EnsureComponent<C>
where
    C: ConditionedResource + Serialize + DeserializeOwned + Debug + 'static,
{
    fn name(&self) -> &'static str {
        self.action_name
    }

    fn can_handle(&self, instance: &TrustStack) -> bool {
        (self.build)(instance).is_some()
    }

    async fn handle(&self, instance: &mut TrustStack) -> Outcome {
        let Some(desired) = (self.build)(instance) else {
            return Outcome::Continue;
        };
        let child_name = desired.name_any();
        let Some(namespace) = instance.meta().namespace.clone() else {
            return Outcome::terminal(anyhow::anyhow!("resource has no namespace"));
        };

        let policies: Vec<EnsurePolicy<C>> = vec![
            owned_by::<C, TrustStack>(instance),
            inherit_metadata::<C, TrustStack>(instance),
        ];
        if let Err(err) = ensure(self.store.as_ref(), desired, &policies).await {
            return Outcome::from_ensure_error(err);
        }

        // Mirror the child's Ready condition into the parent's dependency
        // condition; a child that has not reported yet counts as Pending.
        let generation = instance.meta().generation;
        let child = match self.store.get(&namespace, &child_name).await {
            Ok(child) => child,
            Err(err) => return Outcome::transient(err),
        };
        let ready = child
            .as_ref()
            .and_then(|child| find_condition(child.conditions(), constants::CONDITION_READY));
        let mirrored = match ready {
            Some(ready) if ready.is_failure() => Condition::failed(
                self.condition_type,
                ready
                    .message
                    .as_deref()
                    .unwrap_or("component reported a failure"),
                generation,
            ),
            Some(ready) => Condition::in_phase(
                self.condition_type,
                &ready.status,
                ready.phase(),
                ready.message.as_deref(),
                generation,
            ),
            None => Condition::in_phase(
                self.condition_type,
                STATUS_UNKNOWN,
                Phase::Pending,
                Some("waiting for component status"),
                generation,
            ),
        };
        set_condition(instance.conditions_mut(), mirrored);
        Outcome::Continue
    }
}

fn in_parent_namespace<C: ConditionedResource>(stack: &TrustStack, mut child: C) -> C {
    child.meta_mut().namespace = stack.meta().namespace.clone();
    child
}

fn child_name(stack: &TrustStack, suffix: &str) -> String {
    format!("{}-{suffix}", stack.name_any())
}

/// Desired-state builders, one per component. Pure functions of the
/// composite's spec.
#[must_use]
pub fn desired_timestamp_authority(stack: &TrustStack) -> Option<TimestampAuthority> {
    let spec = stack.spec.timestamp_authority.clone()?;
    Some(in_parent_namespace(
        stack,
        TimestampAuthority::new(&child_name(stack, "tsa"), spec),
    ))
}

#[must_use]
pub fn desired_transparency_log(stack: &TrustStack) -> Option<TransparencyLog> {
    let spec = stack.spec.transparency_log.clone()?;
    Some(in_parent_namespace(
        stack,
        TransparencyLog::new(&child_name(stack, "transparency-log"), spec),
    ))
}

#[must_use]
pub fn desired_tree_log(stack: &TrustStack) -> Option<TreeLog> {
    let spec = stack.spec.tree_log.clone()?;
    Some(in_parent_namespace(
        stack,
        TreeLog::new(&child_name(stack, "tree-log"), spec),
    ))
}

#[must_use]
pub fn desired_certificate_authority(stack: &TrustStack) -> Option<CertificateAuthority> {
    let spec = stack.spec.certificate_authority.clone()?;
    Some(in_parent_namespace(
        stack,
        CertificateAuthority::new(&child_name(stack, "ca"), spec),
    ))
}

#[must_use]
pub fn desired_metadata_service(stack: &TrustStack) -> Option<MetadataService> {
    let spec = stack.spec.metadata_service.clone()?;
    Some(in_parent_namespace(
        stack,
        MetadataService::new(&child_name(stack, "metadata"), spec),
    ))
}
