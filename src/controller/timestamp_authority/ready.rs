//! # Mark Ready
//!
//! Final action: once the signer is resolved and its bundle secret exists,
//! the resource is ready and its service URL is published. A vanished
//! bundle clears the resolved signer so the next pass regenerates it.

use crate::constants;
use crate::crd::conditions::{
    find_condition, set_condition, Condition, ConditionedResource, Phase, STATUS_FALSE,
    STATUS_TRUE,
};
use crate::crd::TimestampAuthority;
use crate::engine::action::Action;
use crate::engine::outcome::Outcome;
use crate::engine::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use std::sync::Arc;
use tracing::warn;

pub struct MarkReady {
    tsas: Arc<dyn ObjectStore<TimestampAuthority>>,
    secrets: Arc<dyn ObjectStore<Secret>>,
}

impl MarkReady {
    #[must_use]
    pub fn new(
        tsas: Arc<dyn ObjectStore<TimestampAuthority>>,
        secrets: Arc<dyn ObjectStore<Secret>>,
    ) -> Self {
        Self { tsas, secrets }
    }
}

#[async_trait]
impl Action<TimestampAuthority> for MarkReady {
    fn name(&self) -> &'static str {
        "mark-ready"
    }

    fn can_handle(&self, instance: &TimestampAuthority) -> bool {
        let resolved = instance
            .status
            .as_ref()
            .is_some_and(|status| status.signer.is_some());
        let already_ready = find_condition(instance.conditions(), constants::CONDITION_READY)
            .is_some_and(|ready| ready.status == STATUS_TRUE);
        resolved && !already_ready
    }

    async fn handle(&self, instance: &mut TimestampAuthority) -> Outcome {
        let Some(namespace) = instance.meta().namespace.clone() else {
            return Outcome::terminal(anyhow::anyhow!("resource has no namespace"));
        };
        let name = instance.meta().name.clone().unwrap_or_default();
        let generation = instance.meta().generation;

        let chain_ref = instance
            .status
            .as_ref()
            .and_then(|s| s.signer.as_ref())
            .and_then(|signer| signer.certificate_chain.certificate_chain_ref.clone());
        let Some(chain_ref) = chain_ref else {
            // A resolved signer always records its chain reference; treat a
            // missing one as stale status and regenerate.
            if let Some(status) = instance.status.as_mut() {
                status.signer = None;
            }
            return Outcome::from_status_write(self.tsas.update_status(instance).await);
        };

        match self.secrets.get(&namespace, &chain_ref.name).await {
            Ok(Some(_)) => {
                let status = instance.status.get_or_insert_with(Default::default);
                status.url = Some(format!("http://{name}.{namespace}.svc.cluster.local"));
                status.observed_generation = generation;
                set_condition(
                    instance.conditions_mut(),
                    Condition::in_phase(
                        constants::CONDITION_READY,
                        STATUS_TRUE,
                        Phase::Ready,
                        Some("signer ready"),
                        generation,
                    ),
                );
                Outcome::from_status_write(self.tsas.update_status(instance).await)
            }
            Ok(None) => {
                warn!(%namespace, %name, secret = %chain_ref.name, "bundle secret vanished, regenerating signer");
                if let Some(status) = instance.status.as_mut() {
                    status.signer = None;
                    status.url = None;
                }
                set_condition(
                    instance.conditions_mut(),
                    Condition::in_phase(
                        constants::CONDITION_CERT_CHAIN,
                        STATUS_FALSE,
                        Phase::Pending,
                        Some("bundle secret missing"),
                        generation,
                    ),
                );
                set_condition(
                    instance.conditions_mut(),
                    Condition::in_phase(
                        constants::CONDITION_READY,
                        STATUS_FALSE,
                        Phase::Pending,
                        Some("regenerating signer"),
                        generation,
                    ),
                );
                Outcome::from_status_write(self.tsas.update_status(instance).await)
            }
            Err(err) => Outcome::transient(err),
        }
    }
}
