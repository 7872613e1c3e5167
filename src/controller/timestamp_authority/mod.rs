//! # TimestampAuthority Controller
//!
//! Pipeline: initialize-status → generate-signer → mark-ready.
//!
//! The signer action re-runs only when the spec stops deriving from the
//! resolved configuration in status, so steady-state passes perform no key
//! generation and no writes.

mod initialize;
mod ready;
mod signer;

pub use initialize::InitializeStatus;
pub use ready::MarkReady;
pub use signer::GenerateSigner;

use crate::controller::context::Context;
use crate::crd::TimestampAuthority;
use crate::engine::pipeline::{Pipeline, ReconcileError};
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action as RequeueDirective;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Assemble the action list for one reconciliation
#[must_use]
pub fn pipeline(ctx: &Context) -> Pipeline<TimestampAuthority> {
    Pipeline::new("TimestampAuthority", Arc::clone(&ctx.timestamp_authorities))
        .with(InitializeStatus::new(Arc::clone(
            &ctx.timestamp_authorities,
        )))
        .with(GenerateSigner::new(
            Arc::clone(&ctx.timestamp_authorities),
            Arc::clone(&ctx.secrets),
            ctx.fips,
        ))
        .with(MarkReady::new(
            Arc::clone(&ctx.timestamp_authorities),
            Arc::clone(&ctx.secrets),
        ))
}

/// Main reconciliation entry point for TimestampAuthority resources
pub async fn reconcile(
    instance: Arc<TimestampAuthority>,
    ctx: Arc<Context>,
) -> Result<RequeueDirective, ReconcileError> {
    let start = Instant::now();
    let name = instance.name_any();
    let namespace = instance.namespace().unwrap_or_else(|| "default".to_string());
    info!("🔄 Reconciling TimestampAuthority {namespace}/{name}");
    metrics::increment_reconciliations("TimestampAuthority");

    let mut object = (*instance).clone();
    let result = pipeline(&ctx).run(&mut object).await;

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    match &result {
        Ok(_) => info!(
            "✅ Reconciled TimestampAuthority {namespace}/{name} ({:.2}s)",
            start.elapsed().as_secs_f64()
        ),
        Err(_) => metrics::increment_reconciliation_errors("TimestampAuthority"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::crd::conditions::{find_condition, ConditionedResource, STATUS_TRUE};
    use crate::crd::signer::{CertificateChainConfig, SecretKeySelector, SignerConfig};
    use crate::crd::{TimestampAuthoritySpec, TrustStack};
    use crate::engine::memory::MemoryStore;
    use crate::engine::store::ObjectStore;
    use crate::pki::FipsMode;
    use k8s_openapi::api::core::v1::Secret;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Harness {
        ctx: Arc<Context>,
        tsas: Arc<MemoryStore<TimestampAuthority>>,
        secrets: Arc<MemoryStore<Secret>>,
    }

    fn harness() -> Harness {
        let tsas = Arc::new(MemoryStore::<TimestampAuthority>::new());
        let secrets = Arc::new(MemoryStore::<Secret>::new());
        let ctx = Arc::new(Context {
            trust_stacks: Arc::new(MemoryStore::<TrustStack>::new()),
            timestamp_authorities: Arc::clone(&tsas) as Arc<dyn ObjectStore<TimestampAuthority>>,
            transparency_logs: Arc::new(MemoryStore::<crate::crd::TransparencyLog>::new()),
            tree_logs: Arc::new(MemoryStore::<crate::crd::TreeLog>::new()),
            certificate_authorities: Arc::new(MemoryStore::<crate::crd::CertificateAuthority>::new()),
            metadata_services: Arc::new(MemoryStore::<crate::crd::MetadataService>::new()),
            secrets: Arc::clone(&secrets) as Arc<dyn ObjectStore<Secret>>,
            fips: FipsMode::new(false),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        });
        Harness { ctx, tsas, secrets }
    }

    fn fresh_tsa() -> TimestampAuthority {
        let mut tsa = TimestampAuthority::new("tsa", TimestampAuthoritySpec::default());
        tsa.metadata.namespace = Some("default".to_string());
        tsa.metadata.uid = Some("uid-tsa".to_string());
        tsa.metadata.generation = Some(1);
        tsa
    }

    async fn reconcile_once(h: &Harness) -> RequeueDirective {
        let stored = h.tsas.get("default", "tsa").await.unwrap().unwrap();
        reconcile(Arc::new(stored), Arc::clone(&h.ctx)).await.unwrap()
    }

    async fn converge(h: &Harness) {
        // initialize-status, generate-signer, mark-ready, steady state
        for _ in 0..4 {
            reconcile_once(h).await;
        }
    }

    fn signer_secret_names(h: &Harness) -> Vec<String> {
        h.secrets
            .names_in("default")
            .into_iter()
            .filter(|name| name.starts_with("tsa-signer-config-"))
            .collect()
    }

    #[tokio::test]
    async fn test_fresh_resource_converges_to_ready_with_bundle() {
        let h = harness();
        h.tsas.seed(&fresh_tsa());

        converge(&h).await;

        let tsa = h.tsas.get("default", "tsa").await.unwrap().unwrap();
        let ready = find_condition(tsa.conditions(), constants::CONDITION_READY).unwrap();
        assert_eq!(ready.status, STATUS_TRUE);
        assert!(tsa.status.as_ref().unwrap().url.is_some());

        let bundles = signer_secret_names(&h);
        assert_eq!(bundles.len(), 1);

        // One bundle: root key, one intermediate, leaf, and the 3-cert chain.
        let bundle = h
            .secrets
            .get("default", &bundles[0])
            .await
            .unwrap()
            .unwrap();
        let data = bundle.data.unwrap();
        assert!(data.contains_key("rootPrivateKey"));
        assert!(data.contains_key("intermediatePrivateKey-0"));
        assert!(data.contains_key("leafPrivateKey"));
        let chain = pem::parse_many(data["certificateChain"].0.as_slice()).unwrap();
        assert_eq!(chain.len(), 3);

        let chain_ref = tsa
            .status
            .as_ref()
            .unwrap()
            .signer
            .as_ref()
            .unwrap()
            .certificate_chain
            .certificate_chain_ref
            .clone()
            .unwrap();
        assert_eq!(chain_ref.name, bundles[0]);
    }

    #[tokio::test]
    async fn test_steady_state_performs_no_rotation_and_no_writes() {
        let h = harness();
        h.tsas.seed(&fresh_tsa());
        converge(&h).await;

        let secret_writes = h.secrets.writes();
        let status_writes = h.tsas.writes();
        let bundles_before = signer_secret_names(&h);

        // Two more passes with nothing changed: zero key generations, zero
        // writes of any kind.
        reconcile_once(&h).await;
        let directive = reconcile_once(&h).await;
        assert_eq!(directive, RequeueDirective::await_change());
        assert_eq!(h.secrets.writes(), secret_writes);
        assert_eq!(h.tsas.writes(), status_writes);
        assert_eq!(signer_secret_names(&h), bundles_before);
    }

    #[tokio::test]
    async fn test_spec_edit_rotates_to_new_secret_and_deletes_marked_bundle() {
        let h = harness();
        h.tsas.seed(&fresh_tsa());
        converge(&h).await;

        let old_bundles = signer_secret_names(&h);
        assert_eq!(old_bundles.len(), 1);

        // Stage operator-supplied chain material from the old bundle.
        let old_bundle = h
            .secrets
            .get("default", &old_bundles[0])
            .await
            .unwrap()
            .unwrap();
        let chain_bytes = old_bundle.data.as_ref().unwrap()["certificateChain"]
            .0
            .clone();
        let supplied = Secret {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("operator-chain".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            data: Some(std::collections::BTreeMap::from([(
                "chain.pem".to_string(),
                k8s_openapi::ByteString(chain_bytes),
            )])),
            ..Secret::default()
        };
        h.secrets.seed(&supplied);

        // Point the spec at the supplied material.
        let mut tsa = h.tsas.get("default", "tsa").await.unwrap().unwrap();
        tsa.spec.signer = SignerConfig {
            certificate_chain: CertificateChainConfig {
                certificate_chain_ref: Some(SecretKeySelector::new("operator-chain", "chain.pem")),
                ..CertificateChainConfig::default()
            },
        };
        tsa.metadata.generation = Some(2);
        h.tsas.update(&tsa).await.unwrap();

        // generate-signer (rotation), then mark-ready again.
        reconcile_once(&h).await;
        reconcile_once(&h).await;

        let new_bundles = signer_secret_names(&h);
        assert_eq!(new_bundles.len(), 1, "old marked bundle must be deleted");
        assert_ne!(new_bundles[0], old_bundles[0], "rotation lands in a new secret");

        // The supplied secret itself is untouched.
        assert!(h
            .secrets
            .get("default", "operator-chain")
            .await
            .unwrap()
            .is_some());

        let tsa = h.tsas.get("default", "tsa").await.unwrap().unwrap();
        let resolved = tsa.status.as_ref().unwrap().signer.clone().unwrap();
        assert_eq!(
            resolved.certificate_chain.certificate_chain_ref,
            Some(SecretKeySelector::new("operator-chain", "chain.pem"))
        );
    }
}
