//! Request DTOs for the service API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;
use crate::scheduler::Priority;

/// Request body for `PUT /cache`
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (default TTL if absent, `0` for no expiry)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Request body for `POST /tasks`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTaskRequest {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Request body for `POST /workers`
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterWorkerRequest {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl RegisterWorkerRequest {
    pub fn validate(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("Worker id cannot be empty".to_string());
        }
        if self.capabilities.iter().any(|cap| cap.trim().is_empty()) {
            return Some("Capabilities cannot be empty strings".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": {"nested": [1, 2]}}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, json!({"nested": [1, 2]}));
        assert!(req.ttl.is_none());
    }

    #[test]
    fn test_set_request_with_ttl() {
        let json = r#"{"key": "test", "value": "hello", "ttl": 60}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl, Some(60));
    }

    #[test]
    fn test_validate_keys() {
        let mut req = SetRequest {
            key: String::new(),
            value: json!("test"),
            ttl: None,
        };
        assert!(req.validate().is_some());

        req.key = "k".repeat(MAX_KEY_LENGTH + 1);
        assert!(req.validate().is_some());

        req.key = "valid_key".to_string();
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_submit_request_defaults() {
        let req: SubmitTaskRequest = serde_json::from_str(r#"{"kind": "echo"}"#).unwrap();
        assert_eq!(req.kind, "echo");
        assert_eq!(req.payload, Value::Null);
        assert!(req.priority.is_none());
        assert!(req.max_attempts.is_none() && req.timeout_seconds.is_none());

        let req: SubmitTaskRequest =
            serde_json::from_str(r#"{"kind": "echo", "priority": "critical", "max_attempts": 5}"#)
                .unwrap();
        assert_eq!(req.priority, Some(Priority::Critical));
        assert_eq!(req.max_attempts, Some(5));
    }

    #[test]
    fn test_submit_request_rejects_unknown_priority() {
        let parsed = serde_json::from_str::<SubmitTaskRequest>(r#"{"kind": "a", "priority": "urgent"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_register_worker_validation() {
        let req: RegisterWorkerRequest =
            serde_json::from_str(r#"{"id": "w1", "capabilities": ["echo"]}"#).unwrap();
        assert!(req.validate().is_none());

        let req = RegisterWorkerRequest {
            id: " ".to_string(),
            capabilities: vec![],
        };
        assert!(req.validate().is_some());

        let req = RegisterWorkerRequest {
            id: "w2".to_string(),
            capabilities: vec!["".to_string()],
        };
        assert!(req.validate().is_some());
    }
}
