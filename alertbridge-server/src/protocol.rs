//! Wire types of the Alertmanager webhook.
//!
//! All fields default when missing or `null`, so partial payloads decode as long as the body is a
//! JSON object. Only [`Alert::status`], [`Alert::labels`] and [`Alert::annotations`] are used by the
//! pipeline.

use std::collections::BTreeMap;

use alertbridge_system::Interface;
use serde::{Deserialize, Deserializer, Serialize};

/// Alert status that marks an active alert.
pub const STATUS_FIRING: &str = "firing";

/// Deserializes `null` into the default value of the field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The body of a webhook notification.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HookRequest {
    /// Version of the webhook format.
    #[serde(deserialize_with = "null_default")]
    pub version: String,
    /// Key identifying the group of alerts.
    #[serde(deserialize_with = "null_default")]
    pub group_key: String,
    /// Status of the whole group.
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    /// Name of the receiver that sent the notification.
    #[serde(deserialize_with = "null_default")]
    pub receiver: String,
    /// Labels the alerts were grouped by.
    #[serde(deserialize_with = "null_default")]
    pub group_labels: BTreeMap<String, String>,
    /// Labels shared by all alerts.
    #[serde(deserialize_with = "null_default")]
    pub common_labels: BTreeMap<String, String>,
    /// Annotations shared by all alerts.
    #[serde(deserialize_with = "null_default")]
    pub common_annotations: BTreeMap<String, String>,
    /// Link back to the sending Alertmanager.
    #[serde(rename = "externalURL", deserialize_with = "null_default")]
    pub external_url: String,
    /// The alerts in this notification.
    #[serde(deserialize_with = "null_default")]
    pub alerts: Vec<Alert>,
}

/// A single firing or resolved alert.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Alert {
    /// Either `firing` or `resolved`.
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    /// Identifying labels, usually including `alertname`.
    #[serde(deserialize_with = "null_default")]
    pub labels: BTreeMap<String, String>,
    /// Informational annotations.
    #[serde(deserialize_with = "null_default")]
    pub annotations: BTreeMap<String, String>,
    /// Start of the alert in RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<String>,
    /// End of the alert in RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    /// Link to the expression that generated the alert.
    #[serde(rename = "generatorURL", deserialize_with = "null_default")]
    pub generator_url: String,
}

impl Alert {
    /// Returns `true` if the alert is currently active.
    pub fn is_firing(&self) -> bool {
        self.status == STATUS_FIRING
    }

    /// Returns the `alertname` label, if present.
    pub fn name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}

impl Interface for Alert {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_request() {
        let json = r#"{
            "version": "4",
            "groupKey": "{}:{alertname=\"HighCPU\"}",
            "status": "firing",
            "receiver": "zabbix",
            "groupLabels": {"alertname": "HighCPU"},
            "commonLabels": {"alertname": "HighCPU", "severity": "page"},
            "commonAnnotations": {"zabbix_host": "web-1"},
            "externalURL": "http://alertmanager:9093",
            "alerts": [
                {
                    "status": "firing",
                    "labels": {"alertname": "HighCPU"},
                    "annotations": {"zabbix_host": "web-1"},
                    "startsAt": "2024-01-01T00:00:00Z",
                    "endsAt": "0001-01-01T00:00:00Z",
                    "generatorURL": "http://prometheus:9090/graph"
                }
            ]
        }"#;

        let request: HookRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.receiver, "zabbix");
        assert_eq!(request.external_url, "http://alertmanager:9093");
        assert_eq!(request.alerts.len(), 1);

        let alert = &request.alerts[0];
        assert!(alert.is_firing());
        assert_eq!(alert.name(), Some("HighCPU"));
        assert_eq!(alert.starts_at.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(alert.generator_url, "http://prometheus:9090/graph");
    }

    #[test]
    fn test_decode_partial_request() {
        let json = r#"{"alerts":[{"status":"resolved","labels":{"alertname":"DiskFull"}}]}"#;

        let request: HookRequest = serde_json::from_str(json).unwrap();
        let alert = &request.alerts[0];
        assert!(!alert.is_firing());
        assert!(alert.annotations.is_empty());
        assert_eq!(alert.starts_at, None);
    }

    #[test]
    fn test_decode_null_fields() {
        let json = r#"{
            "receiver": null,
            "commonLabels": null,
            "alerts": [
                {
                    "status": "firing",
                    "labels": {"alertname": "DiskFull"},
                    "annotations": null,
                    "startsAt": null,
                    "generatorURL": null
                }
            ]
        }"#;

        let request: HookRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.receiver, "");
        assert!(request.common_labels.is_empty());

        let alert = &request.alerts[0];
        assert!(alert.is_firing());
        assert!(alert.annotations.is_empty());
        assert_eq!(alert.starts_at, None);
        assert_eq!(alert.generator_url, "");

        let request: HookRequest = serde_json::from_str(r#"{"alerts": null}"#).unwrap();
        assert!(request.alerts.is_empty());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(serde_json::from_str::<HookRequest>(r#"{"alerts": "none"}"#).is_err());
        assert!(serde_json::from_str::<HookRequest>("[]").is_err());
    }
}
