//! Response DTOs for the service API
//!
//! Defines the structure of outgoing HTTP response bodies. Tasks and workers are
//! serialized directly from their scheduler types.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{CacheStats, EvictionPolicy};

/// Response body for `GET /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for `PUT /cache`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for `DELETE /cache/:key` and `DELETE /cache`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted", key),
            key: Some(key),
        }
    }

    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".to_string(),
            key: None,
        }
    }
}

/// Response body for `GET /cache/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Served reads over all reads
    pub hit_rate: f64,
    pub eviction_policy: EvictionPolicy,
}

impl StatsResponse {
    pub fn new(stats: CacheStats, eviction_policy: EvictionPolicy) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
            eviction_policy,
        }
    }
}

/// Response body for `POST /tasks`
#[derive(Debug, Clone, Serialize)]
pub struct SubmitTaskResponse {
    pub task_id: Uuid,
}

/// Generic acknowledgement for state-changing calls with nothing else to return
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_response_keeps_json_value() {
        let resp = GetResponse::new("k", json!({"a": [1, true]}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({"key": "k", "value": {"a": [1, true]}}));
    }

    #[test]
    fn test_delete_responses() {
        let json = serde_json::to_value(DeleteResponse::new("gone")).unwrap();
        assert_eq!(json["key"], "gone");

        let json = serde_json::to_value(DeleteResponse::cleared()).unwrap();
        assert!(json.get("key").is_none());
        assert_eq!(json["message"], "Cache cleared");
    }

    #[test]
    fn test_stats_response_flattens_counters() {
        let stats = CacheStats {
            hits: 6,
            durable_hits: 2,
            misses: 2,
            ..CacheStats::default()
        };
        let json = serde_json::to_value(StatsResponse::new(stats, EvictionPolicy::Lfu)).unwrap();

        assert_eq!(json["hits"], 6);
        assert_eq!(json["durable_hits"], 2);
        assert_eq!(json["eviction_policy"], "lfu");
        assert!((json["hit_rate"].as_f64().unwrap() - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
