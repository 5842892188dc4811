//! Admission controller combining the global and per-identity limiters.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::trace;

use super::key::PartitionKey;
use super::partition::PartitionTable;
use super::verdict::{AdmissionVerdict, LimiterClass};
use super::window::{LimiterConfig, WindowState};
use crate::error::Result;

/// How the two limiters are combined for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Consult the global limiter first and stop if it rejects.
    #[default]
    ShortCircuit,
    /// Always consult both limiters and keep the stricter verdict.
    Independent,
}

/// Decides whether requests are admitted, queued or rejected.
///
/// Owns one partition table per limiter class. The controller is an ordinary
/// value: construct one per service (or per test) and share it through `Arc`.
pub struct AdmissionController {
    global: PartitionTable,
    identity: PartitionTable,
    mode: EvaluationMode,
}

impl AdmissionController {
    /// Build a controller from the two limiter configs.
    ///
    /// Fails if either config has a zero permit limit or a zero window.
    pub fn configure(global: LimiterConfig, per_identity: LimiterConfig) -> Result<Self> {
        global.validate(LimiterClass::Global.as_str())?;
        per_identity.validate(LimiterClass::Identity.as_str())?;

        Ok(Self {
            global: PartitionTable::new(global),
            identity: PartitionTable::new(per_identity),
            mode: EvaluationMode::default(),
        })
    }

    /// Set how the two limiters are combined.
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Pick the per-identity partition key for a request.
    pub fn resolve_partition_key(
        identity_claim: Option<&str>,
        fallback_host: &str,
    ) -> PartitionKey {
        PartitionKey::resolve(identity_claim, fallback_host)
    }

    /// Run the fixed-window algorithm against one partition.
    pub fn try_admit(
        &self,
        key: &PartitionKey,
        class: LimiterClass,
        now: Instant,
    ) -> AdmissionVerdict {
        let decision = self.table(class).get_or_create(key, now).try_acquire(now);

        trace!(
            partition = %key,
            source = %class,
            decision = decision.as_str(),
            "Partition acquisition"
        );

        AdmissionVerdict {
            partition: key.clone(),
            source: class,
            decision,
        }
    }

    /// Evaluate a request against the global limiter and its identity's limiter.
    ///
    /// A request is admitted only when both limiters admit it.
    pub fn evaluate(&self, identity: &PartitionKey, now: Instant) -> AdmissionVerdict {
        let global = self.evaluate_global(now);

        match self.mode {
            EvaluationMode::ShortCircuit => {
                if global.is_rejected() {
                    return global;
                }
                let identity = self.try_admit(identity, LimiterClass::Identity, now);
                if global.is_admitted() {
                    identity
                } else {
                    stricter(global, identity)
                }
            }
            EvaluationMode::Independent => {
                let identity = self.try_admit(identity, LimiterClass::Identity, now);
                stricter(global, identity)
            }
        }
    }

    /// Evaluate a request against the global limiter only.
    pub fn evaluate_global(&self, now: Instant) -> AdmissionVerdict {
        self.try_admit(&PartitionKey::global(), LimiterClass::Global, now)
    }

    /// Copy of a partition's window state, if the partition exists.
    pub fn snapshot(&self, class: LimiterClass, key: &str) -> Option<WindowState> {
        self.table(class).get(key).map(|p| p.snapshot())
    }

    /// Number of live partitions in a limiter class.
    pub fn partition_count(&self, class: LimiterClass) -> usize {
        self.table(class).len()
    }

    pub fn global_config(&self) -> &LimiterConfig {
        self.global.config()
    }

    pub fn identity_config(&self) -> &LimiterConfig {
        self.identity.config()
    }

    /// Evict idle per-identity partitions. The global partition is never evicted.
    pub fn evict_idle(&self, now: Instant, idle_after: Duration) -> usize {
        self.identity.evict_idle(now, idle_after)
    }

    fn table(&self, class: LimiterClass) -> &PartitionTable {
        match class {
            LimiterClass::Global => &self.global,
            LimiterClass::Identity => &self.identity,
        }
    }
}

/// Rejected beats Queued beats Admitted. Ties go to the global verdict.
fn stricter(global: AdmissionVerdict, identity: AdmissionVerdict) -> AdmissionVerdict {
    if identity.decision.severity() > global.decision.severity() {
        identity
    } else {
        global
    }
}
