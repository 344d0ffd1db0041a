use serde::{Deserialize, Serialize};

/// Queue message, tagged union by `type`. The job id derived from the
/// payload's natural key is what queue-level deduplication runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobPayload {
    #[serde(rename = "EXECUTE_SIGNAL")]
    ExecuteSignal {
        signal_id: String,
        deployment_id: String,
        timestamp: i64,
    },
    #[serde(rename = "CLASSIFY_MESSAGE")]
    ClassifyMessage { message_id: String, timestamp: i64 },
}

impl JobPayload {
    /// Deterministic job identifier for queue-level dedup.
    pub fn job_id(&self) -> String {
        match self {
            Self::ExecuteSignal {
                signal_id,
                deployment_id,
                ..
            } => format!("execute-{}-{}", signal_id, deployment_id),
            Self::ClassifyMessage { message_id, .. } => format!("classify-{}", message_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_deterministic() {
        let a = JobPayload::ExecuteSignal {
            signal_id: "s1".into(),
            deployment_id: "d1".into(),
            timestamp: 1,
        };
        let b = JobPayload::ExecuteSignal {
            signal_id: "s1".into(),
            deployment_id: "d1".into(),
            timestamp: 999,
        };
        assert_eq!(a.job_id(), "execute-s1-d1");
        assert_eq!(a.job_id(), b.job_id());

        let c = JobPayload::ClassifyMessage {
            message_id: "m1".into(),
            timestamp: 1,
        };
        assert_eq!(c.job_id(), "classify-m1");
    }

    #[test]
    fn payload_round_trips_with_type_tag() {
        let payload = JobPayload::ExecuteSignal {
            signal_id: "s1".into(),
            deployment_id: "d1".into(),
            timestamp: 42,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"EXECUTE_SIGNAL\""));
        let back: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
