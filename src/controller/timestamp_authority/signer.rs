//! # Generate Signer
//!
//! The provisioning action around [`ChainProvisioner`]: guarded by
//! structural derivation, it resolves the signer configuration into a fresh
//! bundle secret and records the resolved references in status.
//!
//! Rotation is delete-marked-then-create: every secret still carrying this
//! resource's marker label is removed before the replacement is created, and
//! the bundle in use by a running deployment is never mutated in place.

use crate::constants;
use crate::crd::conditions::{
    set_condition, Condition, ConditionedResource, Phase, STATUS_FALSE, STATUS_TRUE,
};
use crate::crd::TimestampAuthority;
use crate::engine::action::Action;
use crate::engine::outcome::{Outcome, CONFLICT_REQUEUE};
use crate::engine::store::{ObjectStore, StoreError};
use crate::observability::metrics;
use crate::pki::{ChainProvisioner, FipsMode};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct GenerateSigner {
    tsas: Arc<dyn ObjectStore<TimestampAuthority>>,
    secrets: Arc<dyn ObjectStore<Secret>>,
    fips: FipsMode,
}

impl GenerateSigner {
    #[must_use]
    pub fn new(
        tsas: Arc<dyn ObjectStore<TimestampAuthority>>,
        secrets: Arc<dyn ObjectStore<Secret>>,
        fips: FipsMode,
    ) -> Self {
        Self { tsas, secrets, fips }
    }
}

#[async_trait]
impl Action<TimestampAuthority> for GenerateSigner {
    fn name(&self) -> &'static str {
        "generate-signer"
    }

    /// Only runs when the spec no longer derives from what was last
    /// resolved; this is what makes repeated reconciliations free of key
    /// regeneration.
    fn can_handle(&self, instance: &TimestampAuthority) -> bool {
        ChainProvisioner::needs_resolution(
            &instance.spec.signer,
            instance.status.as_ref().and_then(|s| s.signer.as_ref()),
        )
    }

    async fn handle(&self, instance: &mut TimestampAuthority) -> Outcome {
        let Some(name) = instance.meta().name.clone() else {
            return Outcome::terminal(anyhow::anyhow!("resource has no name"));
        };
        let Some(namespace) = instance.meta().namespace.clone() else {
            return Outcome::terminal(anyhow::anyhow!("resource has no namespace"));
        };
        let Some(uid) = instance.meta().uid.clone() else {
            return Outcome::terminal(anyhow::anyhow!(
                "resource has no UID, cannot own the bundle secret"
            ));
        };
        let owner_ref = OwnerReference {
            api_version: TimestampAuthority::api_version(&()).into_owned(),
            kind: TimestampAuthority::kind(&()).into_owned(),
            name: name.clone(),
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        };

        let generation = instance.meta().generation;
        let provisioner =
            ChainProvisioner::new(self.secrets.as_ref(), self.fips, &namespace, &name);

        let provisioned = match provisioner.materialize(&instance.spec.signer, owner_ref).await {
            Ok(provisioned) => provisioned,
            Err(err) => {
                // No partial bundle was written. Record the failure on the
                // chain condition but keep Ready at Pending: the usual cause
                // is a secret an external actor has not created yet, so the
                // resource must keep retrying rather than give up.
                warn!(%namespace, %name, error = %err, "signer resolution failed, will retry");
                metrics::increment_signer_failures();
                set_condition(
                    instance.conditions_mut(),
                    Condition::failed(constants::CONDITION_CERT_CHAIN, &err.to_string(), generation),
                );
                set_condition(
                    instance.conditions_mut(),
                    Condition::in_phase(
                        constants::CONDITION_READY,
                        STATUS_FALSE,
                        Phase::Pending,
                        Some("resolving signing keys"),
                        generation,
                    ),
                );
                return match self.tsas.update_status(instance).await {
                    Ok(()) | Err(StoreError::Conflict) => Outcome::Requeue(Duration::from_secs(
                        constants::SIGNER_RETRY_REQUEUE_SECS,
                    )),
                    Err(other) => Outcome::transient(other),
                };
            }
        };

        // Rotation: drop previously generated bundles first, then create the
        // replacement under its new name. Externally supplied secrets never
        // carry the marker and are never touched.
        if let Err(err) = self
            .secrets
            .delete_all_matching(&namespace, &provisioner.marker_selector())
            .await
        {
            return Outcome::transient(err);
        }
        match self.secrets.create(&provisioned.secret).await {
            Ok(_) => {}
            Err(StoreError::Conflict) => return Outcome::Requeue(CONFLICT_REQUEUE),
            Err(other) => return Outcome::transient(other),
        }

        let secret_name = provisioned
            .secret
            .metadata
            .name
            .clone()
            .unwrap_or_default();
        info!(%namespace, %name, secret = %secret_name, "🔐 signer certificate chain materialized");
        metrics::increment_signer_rotations();

        instance
            .status
            .get_or_insert_with(Default::default)
            .signer = Some(provisioned.resolved);
        set_condition(
            instance.conditions_mut(),
            Condition::in_phase(
                constants::CONDITION_CERT_CHAIN,
                STATUS_TRUE,
                Phase::Ready,
                Some("certificate chain created"),
                generation,
            ),
        );
        set_condition(
            instance.conditions_mut(),
            Condition::in_phase(
                constants::CONDITION_READY,
                STATUS_FALSE,
                Phase::Creating,
                Some("signer materialized, waiting for rollout"),
                generation,
            ),
        );
        Outcome::from_status_write(self.tsas.update_status(instance).await)
    }
}
