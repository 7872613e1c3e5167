//! # Conditions
//!
//! Readiness conditions and the phase ordering used to aggregate them.
//!
//! Every resource carries a `Ready` condition; composite resources carry one
//! additional condition per dependency. A condition's `reason` holds the
//! dependency's current phase, and the composite phase is the minimum phase
//! among all defined dependencies, with `Failure` overriding everything.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status values (Kubernetes convention)
pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";
pub const STATUS_UNKNOWN: &str = "Unknown";

/// Reason marking a terminal dependency failure. Not a phase: a failed
/// dependency overrides the phase ordering entirely.
pub const FAILURE_REASON: &str = "Failure";

/// Condition represents one readiness fact attached to a resource's status
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g. `Ready`, `CertificateChainAvailable`)
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Reason for the condition; carries the phase name for dependency conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Last transition time (RFC3339); only updated when `status` flips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// Generation of the spec this condition was computed against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Condition in a given phase
    #[must_use]
    pub fn in_phase(
        r#type: &str,
        status: &str,
        phase: Phase,
        message: Option<&str>,
        observed_generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: r#type.to_owned(),
            status: status.to_owned(),
            reason: Some(phase.as_str().to_owned()),
            message: message.map(str::to_owned),
            last_transition_time: None,
            observed_generation,
        }
    }

    /// Terminal failure condition
    #[must_use]
    pub fn failed(r#type: &str, message: &str, observed_generation: Option<i64>) -> Self {
        Self {
            r#type: r#type.to_owned(),
            status: STATUS_FALSE.to_owned(),
            reason: Some(FAILURE_REASON.to_owned()),
            message: Some(message.to_owned()),
            last_transition_time: None,
            observed_generation,
        }
    }

    /// Condition for an optional dependency that is not configured.
    /// Sorted after `Ready` so it never holds a composite back.
    #[must_use]
    pub fn not_defined(r#type: &str, observed_generation: Option<i64>) -> Self {
        Self::in_phase(
            r#type,
            STATUS_TRUE,
            Phase::NotDefined,
            Some("component is not configured"),
            observed_generation,
        )
    }

    /// Whether this condition reports a terminal failure
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.reason.as_deref() == Some(FAILURE_REASON)
    }

    /// Phase carried by this condition's reason
    #[must_use]
    pub fn phase(&self) -> Phase {
        Phase::from_reason(self.reason.as_deref())
    }
}

/// Ordered readiness stage of a resource or dependency.
///
/// The derived ordering is the aggregation order: `Pending < Initialize <
/// Creating < Ready`, with `NotDefined` sorted last so absent optional
/// dependencies never pull a composite down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Pending,
    Initialize,
    Creating,
    Ready,
    NotDefined,
}

impl Phase {
    /// The phase name as written into condition reasons
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Initialize => "Initialize",
            Phase::Creating => "Creating",
            Phase::Ready => "Ready",
            Phase::NotDefined => "NotDefined",
        }
    }

    /// Parse a phase back out of a condition reason. Unknown or missing
    /// reasons map to `Pending`, the most conservative stage.
    #[must_use]
    pub fn from_reason(reason: Option<&str>) -> Self {
        match reason {
            Some("Initialize") => Phase::Initialize,
            Some("Creating") => Phase::Creating,
            Some("Ready") => Phase::Ready,
            Some("NotDefined") => Phase::NotDefined,
            _ => Phase::Pending,
        }
    }
}

/// Result of aggregating dependency conditions into a composite state
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// A dependency failed terminally; the composite is failed regardless of
    /// the other dependencies' phases
    Failed(String),
    /// Minimum phase among all defined dependencies
    InPhase(Phase),
}

/// Aggregate dependency conditions with worst-state-wins ordering.
///
/// `NotDefined` dependencies are skipped; a set consisting only of
/// `NotDefined` conditions (or an empty set) aggregates to `Ready` since
/// there is nothing left to wait for.
pub fn aggregate<'a, I>(dependencies: I) -> Aggregate
where
    I: IntoIterator<Item = &'a Condition>,
{
    let mut minimum: Option<Phase> = None;
    for condition in dependencies {
        if condition.is_failure() {
            let message = condition
                .message
                .clone()
                .unwrap_or_else(|| format!("{} reported a failure", condition.r#type));
            return Aggregate::Failed(message);
        }
        let phase = condition.phase();
        if phase == Phase::NotDefined {
            continue;
        }
        minimum = Some(minimum.map_or(phase, |current| current.min(phase)));
    }
    Aggregate::InPhase(minimum.unwrap_or(Phase::Ready))
}

/// Insert or update a condition, keeping at most one condition per type.
///
/// `lastTransitionTime` is preserved when the status does not flip, so
/// repeated reconciliations of an unchanged resource do not churn the
/// status sub-document. Returns whether anything changed, letting callers
/// skip status writes that would only trigger spurious watch events.
pub fn set_condition(conditions: &mut Vec<Condition>, mut next: Condition) -> bool {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == next.r#type) {
        if existing.status == next.status
            && existing.reason == next.reason
            && existing.message == next.message
            && existing.observed_generation == next.observed_generation
        {
            return false;
        }
        if existing.status == next.status {
            next.last_transition_time = existing.last_transition_time.clone();
        }
        if next.last_transition_time.is_none() {
            next.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
        }
        *existing = next;
        return true;
    }
    if next.last_transition_time.is_none() {
        next.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
    }
    conditions.push(next);
    true
}

/// Look up a condition by type
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

/// A resource whose status carries conditions.
///
/// Implemented by every custom resource of this operator so the pipeline and
/// the aggregation helpers can work over any of them.
pub trait ConditionedResource: kube::Resource<DynamicType = ()> + Clone + Send + Sync {
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}
