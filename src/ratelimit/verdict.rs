//! Admission verdicts and the limiter classes that produce them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::key::PartitionKey;

/// The two limiter classes every request is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterClass {
    /// The single process-wide limiter
    Global,
    /// One limiter per resolved identity
    Identity,
}

impl LimiterClass {
    /// Get the label used in logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterClass::Global => "global",
            LimiterClass::Identity => "identity",
        }
    }
}

impl fmt::Display for LimiterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one fixed-window acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A permit was consumed
    Admitted,
    /// No permit was left, but a queue slot was taken
    Queued {
        /// Time until the current window rolls over
        retry_after: Duration,
    },
    /// Neither a permit nor a queue slot was available
    Rejected {
        /// Time until the current window rolls over
        retry_after: Duration,
    },
}

impl Decision {
    /// Get the label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Admitted => "admitted",
            Decision::Queued { .. } => "queued",
            Decision::Rejected { .. } => "rejected",
        }
    }

    /// Rank used when two limiters disagree: higher is stricter.
    pub(crate) fn severity(&self) -> u8 {
        match self {
            Decision::Admitted => 0,
            Decision::Queued { .. } => 1,
            Decision::Rejected { .. } => 2,
        }
    }
}

/// The admission decision for one request, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionVerdict {
    /// Partition the decision was taken against
    pub partition: PartitionKey,
    /// Limiter class that produced the decision
    pub source: LimiterClass,
    /// The decision itself
    pub decision: Decision,
}

impl AdmissionVerdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self.decision, Decision::Admitted)
    }

    pub fn is_queued(&self) -> bool {
        matches!(self.decision, Decision::Queued { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.decision, Decision::Rejected { .. })
    }

    /// Time until the deciding window rolls over, if the request was not admitted.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.decision {
            Decision::Admitted => None,
            Decision::Queued { retry_after } | Decision::Rejected { retry_after } => {
                Some(retry_after)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        let admitted = Decision::Admitted;
        let queued = Decision::Queued {
            retry_after: Duration::from_secs(1),
        };
        let rejected = Decision::Rejected {
            retry_after: Duration::from_secs(1),
        };

        assert!(admitted.severity() < queued.severity());
        assert!(queued.severity() < rejected.severity());
    }

    #[test]
    fn test_retry_after_only_when_not_admitted() {
        let verdict = AdmissionVerdict {
            partition: PartitionKey::global(),
            source: LimiterClass::Global,
            decision: Decision::Admitted,
        };
        assert_eq!(verdict.retry_after(), None);

        let verdict = AdmissionVerdict {
            decision: Decision::Rejected {
                retry_after: Duration::from_secs(7),
            },
            ..verdict
        };
        assert!(verdict.is_rejected());
        assert_eq!(verdict.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_class_labels() {
        assert_eq!(LimiterClass::Global.to_string(), "global");
        assert_eq!(LimiterClass::Identity.to_string(), "identity");
    }
}
