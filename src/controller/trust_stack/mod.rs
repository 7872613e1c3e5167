//! # TrustStack Controller
//!
//! Pipeline: initialize-status → one ensure/copy-status action per
//! component (fixed order) → aggregate-status. Components are *attempted*
//! in this deterministic sequence; each child's own readiness progresses
//! asynchronously and is mirrored on subsequent passes.

mod aggregate;
mod components;
mod initialize;

pub use aggregate::AggregateStatus;
pub use components::{
    desired_certificate_authority, desired_metadata_service, desired_timestamp_authority,
    desired_transparency_log, desired_tree_log, EnsureComponent,
};
pub use initialize::InitializeStatus;

use crate::constants;
use crate::controller::context::Context;
use crate::crd::TrustStack;
use crate::engine::pipeline::{Pipeline, ReconcileError};
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action as RequeueDirective;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Dependency condition types, in the order components are reconciled
pub const COMPONENT_CONDITIONS: &[&str] = &[
    constants::CONDITION_TREE_LOG,
    constants::CONDITION_TRANSPARENCY_LOG,
    constants::CONDITION_CERTIFICATE_AUTHORITY,
    constants::CONDITION_TIMESTAMP_AUTHORITY,
    constants::CONDITION_METADATA_SERVICE,
];

/// Which components the spec configures, keyed by condition type
#[must_use]
pub fn component_states(stack: &TrustStack) -> [(&'static str, bool); 5] {
    [
        (
            constants::CONDITION_TREE_LOG,
            stack.spec.tree_log.is_some(),
        ),
        (
            constants::CONDITION_TRANSPARENCY_LOG,
            stack.spec.transparency_log.is_some(),
        ),
        (
            constants::CONDITION_CERTIFICATE_AUTHORITY,
            stack.spec.certificate_authority.is_some(),
        ),
        (
            constants::CONDITION_TIMESTAMP_AUTHORITY,
            stack.spec.timestamp_authority.is_some(),
        ),
        (
            constants::CONDITION_METADATA_SERVICE,
            stack.spec.metadata_service.is_some(),
        ),
    ]
}

/// Assemble the action list for one reconciliation
#[must_use]
pub fn pipeline(ctx: &Context) -> Pipeline<TrustStack> {
    Pipeline::new("TrustStack", Arc::clone(&ctx.trust_stacks))
        .with(InitializeStatus::new(Arc::clone(&ctx.trust_stacks)))
        .with(EnsureComponent::new(
            "ensure-tree-log",
            constants::CONDITION_TREE_LOG,
            Arc::clone(&ctx.tree_logs),
            desired_tree_log,
        ))
        .with(EnsureComponent::new(
            "ensure-transparency-log",
            constants::CONDITION_TRANSPARENCY_LOG,
            Arc::clone(&ctx.transparency_logs),
            desired_transparency_log,
        ))
        .with(EnsureComponent::new(
            "ensure-certificate-authority",
            constants::CONDITION_CERTIFICATE_AUTHORITY,
            Arc::clone(&ctx.certificate_authorities),
            desired_certificate_authority,
        ))
        .with(EnsureComponent::new(
            "ensure-timestamp-authority",
            constants::CONDITION_TIMESTAMP_AUTHORITY,
            Arc::clone(&ctx.timestamp_authorities),
            desired_timestamp_authority,
        ))
        .with(EnsureComponent::new(
            "ensure-metadata-service",
            constants::CONDITION_METADATA_SERVICE,
            Arc::clone(&ctx.metadata_services),
            desired_metadata_service,
        ))
        .with(AggregateStatus::new(Arc::clone(&ctx.trust_stacks)))
}

/// Main reconciliation entry point for TrustStack resources
pub async fn reconcile(
    instance: Arc<TrustStack>,
    ctx: Arc<Context>,
) -> Result<RequeueDirective, ReconcileError> {
    let start = Instant::now();
    let name = instance.name_any();
    let namespace = instance.namespace().unwrap_or_else(|| "default".to_string());
    info!("🔄 Reconciling TrustStack {namespace}/{name}");
    metrics::increment_reconciliations("TrustStack");

    let mut object = (*instance).clone();
    let result = pipeline(&ctx).run(&mut object).await;

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    match &result {
        Ok(_) => info!(
            "✅ Reconciled TrustStack {namespace}/{name} ({:.2}s)",
            start.elapsed().as_secs_f64()
        ),
        Err(_) => metrics::increment_reconciliation_errors("TrustStack"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::conditions::{
        find_condition, set_condition, Condition, ConditionedResource, Phase, STATUS_FALSE,
        STATUS_TRUE,
    };
    use crate::crd::{
        TimestampAuthority, TimestampAuthoritySpec, TreeLog, TreeLogSpec, TrustStackSpec,
    };
    use crate::engine::memory::MemoryStore;
    use crate::engine::store::ObjectStore;
    use crate::pki::FipsMode;
    use k8s_openapi::api::core::v1::Secret;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Harness {
        ctx: Arc<Context>,
        stacks: Arc<MemoryStore<TrustStack>>,
        tsas: Arc<MemoryStore<TimestampAuthority>>,
        tree_logs: Arc<MemoryStore<TreeLog>>,
    }

    fn harness() -> Harness {
        let stacks = Arc::new(MemoryStore::<TrustStack>::new());
        let tsas = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let tree_logs = Arc::new(MemoryStore::<TreeLog>::new());
        let ctx = Arc::new(Context {
            trust_stacks: Arc::clone(&stacks) as Arc<dyn ObjectStore<TrustStack>>,
            timestamp_authorities: Arc::clone(&tsas) as Arc<dyn ObjectStore<TimestampAuthority>>,
            transparency_logs: Arc::new(MemoryStore::<crate::crd::TransparencyLog>::new()),
            tree_logs: Arc::clone(&tree_logs) as Arc<dyn ObjectStore<TreeLog>>,
            certificate_authorities: Arc::new(MemoryStore::<crate::crd::CertificateAuthority>::new()),
            metadata_services: Arc::new(MemoryStore::<crate::crd::MetadataService>::new()),
            secrets: Arc::new(MemoryStore::<Secret>::new()),
            fips: FipsMode::new(false),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        });
        Harness {
            ctx,
            stacks,
            tsas,
            tree_logs,
        }
    }

    fn fresh_stack() -> TrustStack {
        let mut stack = TrustStack::new(
            "stack",
            TrustStackSpec {
                timestamp_authority: Some(TimestampAuthoritySpec::default()),
                tree_log: Some(TreeLogSpec::default()),
                ..TrustStackSpec::default()
            },
        );
        stack.metadata.namespace = Some("default".to_string());
        stack.metadata.uid = Some("uid-stack".to_string());
        stack.metadata.generation = Some(1);
        stack
    }

    async fn reconcile_once(h: &Harness) -> RequeueDirective {
        let stored = h.stacks.get("default", "stack").await.unwrap().unwrap();
        reconcile(Arc::new(stored), Arc::clone(&h.ctx))
            .await
            .unwrap()
    }

    /// Flip a child's Ready condition as its own controller would
    async fn mark_child_ready<C>(store: &MemoryStore<C>, name: &str)
    where
        C: ConditionedResource + serde::Serialize + serde::de::DeserializeOwned + std::fmt::Debug,
    {
        let mut child = store.get("default", name).await.unwrap().unwrap();
        set_condition(
            child.conditions_mut(),
            Condition::in_phase(
                crate::constants::CONDITION_READY,
                STATUS_TRUE,
                Phase::Ready,
                None,
                None,
            ),
        );
        store.update_status(&child).await.unwrap();
    }

    #[tokio::test]
    async fn test_first_pass_seeds_conditions() {
        let h = harness();
        h.stacks.seed(&fresh_stack());

        reconcile_once(&h).await;

        let stack = h.stacks.get("default", "stack").await.unwrap().unwrap();
        let ready = find_condition(stack.conditions(), crate::constants::CONDITION_READY).unwrap();
        assert_eq!(ready.phase(), Phase::Pending);
        let tsa_dep = find_condition(
            stack.conditions(),
            crate::constants::CONDITION_TIMESTAMP_AUTHORITY,
        )
        .unwrap();
        assert_eq!(tsa_dep.phase(), Phase::Pending);
        let metadata_dep = find_condition(
            stack.conditions(),
            crate::constants::CONDITION_METADATA_SERVICE,
        )
        .unwrap();
        assert_eq!(metadata_dep.phase(), Phase::NotDefined);
    }

    #[tokio::test]
    async fn test_second_pass_creates_children_with_owner_refs() {
        let h = harness();
        h.stacks.seed(&fresh_stack());

        reconcile_once(&h).await;
        reconcile_once(&h).await;

        let tsa = h.tsas.get("default", "stack-tsa").await.unwrap().unwrap();
        let refs = tsa.metadata.owner_references.unwrap();
        assert_eq!(refs[0].uid, "uid-stack");
        assert_eq!(refs[0].kind, "TrustStack");

        assert!(h
            .tree_logs
            .get("default", "stack-tree-log")
            .await
            .unwrap()
            .is_some());

        // Children have not reported yet, so the composite stays down.
        let stack = h.stacks.get("default", "stack").await.unwrap().unwrap();
        let ready = find_condition(stack.conditions(), crate::constants::CONDITION_READY).unwrap();
        assert_eq!(ready.status, STATUS_FALSE);
        assert_eq!(ready.phase(), Phase::Pending);
    }

    #[tokio::test]
    async fn test_composite_ready_is_minimum_of_children() {
        let h = harness();
        h.stacks.seed(&fresh_stack());
        reconcile_once(&h).await;
        reconcile_once(&h).await;

        // One child ready, the other still pending: composite stays Pending.
        mark_child_ready(&h.tree_logs, "stack-tree-log").await;
        reconcile_once(&h).await;
        let stack = h.stacks.get("default", "stack").await.unwrap().unwrap();
        let ready = find_condition(stack.conditions(), crate::constants::CONDITION_READY).unwrap();
        assert_eq!(ready.status, STATUS_FALSE);
        assert_eq!(ready.phase(), Phase::Pending);

        // All children ready: composite flips to Ready; the absent optional
        // components never block it.
        mark_child_ready(&h.tsas, "stack-tsa").await;
        reconcile_once(&h).await;
        let stack = h.stacks.get("default", "stack").await.unwrap().unwrap();
        let ready = find_condition(stack.conditions(), crate::constants::CONDITION_READY).unwrap();
        assert_eq!(ready.status, STATUS_TRUE);
        assert_eq!(ready.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_child_failure_forces_composite_failure() {
        let h = harness();
        h.stacks.seed(&fresh_stack());
        reconcile_once(&h).await;
        reconcile_once(&h).await;

        mark_child_ready(&h.tree_logs, "stack-tree-log").await;
        let mut tsa = h.tsas.get("default", "stack-tsa").await.unwrap().unwrap();
        set_condition(
            tsa.conditions_mut(),
            Condition::failed(crate::constants::CONDITION_READY, "signer exploded", None),
        );
        h.tsas.update_status(&tsa).await.unwrap();

        reconcile_once(&h).await;
        let stack = h.stacks.get("default", "stack").await.unwrap().unwrap();
        let ready = find_condition(stack.conditions(), crate::constants::CONDITION_READY).unwrap();
        assert!(ready.is_failure());
        assert_eq!(ready.message.as_deref(), Some("signer exploded"));
    }

    #[tokio::test]
    async fn test_steady_state_writes_nothing() {
        let h = harness();
        h.stacks.seed(&fresh_stack());
        reconcile_once(&h).await;
        reconcile_once(&h).await;
        mark_child_ready(&h.tree_logs, "stack-tree-log").await;
        mark_child_ready(&h.tsas, "stack-tsa").await;
        reconcile_once(&h).await;

        let stack_writes = h.stacks.writes();
        let tsa_writes = h.tsas.writes();
        let directive = reconcile_once(&h).await;
        assert_eq!(directive, RequeueDirective::await_change());
        assert_eq!(h.stacks.writes(), stack_writes);
        assert_eq!(h.tsas.writes(), tsa_writes);
    }
}
