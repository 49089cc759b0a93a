// SPDX-License-Identifier: MIT

//! Analytics collaborator
//!
//! Events are recorded through an `AnalyticsSink`. The analytics log resolver
//! is the only caller inside the engine and never lets a sink failure abort a
//! workflow.

mod batching;

pub use batching::BatchingAnalyticsSink;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sdk::error::AnalyticsError;
use crate::sdk::value::DynamicValue;

/// Event categories understood by the analytics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "UI_EVENT")]
    Ui,
    #[serde(rename = "APP_CRASHED_EVENT")]
    Crash,
    #[default]
    #[serde(rename = "MESSAGE_EVENT")]
    Message,
    #[serde(rename = "NETWORK_CALL_EVENT")]
    NetworkCall,
    #[serde(rename = "NETWORK_CONNECTIVITY_EVENT")]
    NetworkConnectivity,
    #[serde(rename = "SDK_FUNCTION_EVENT")]
    SdkFunction,
    #[serde(rename = "TIMER_EVENT")]
    Timer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub local_id: Uuid,
    pub event_type: EventType,
    pub name: String,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    #[serde(default)]
    pub properties: DynamicValue,
}

impl AnalyticsEvent {
    pub fn new(event_type: EventType, name: impl Into<String>, properties: DynamicValue) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            event_type,
            name: name.into(),
            created_at: Utc::now().timestamp_millis(),
            properties,
        }
    }
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError>;

    /// Push out anything buffered
    async fn flush(&self) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

/// Writes events to the log and nowhere else
#[derive(Debug, Default)]
pub struct LogAnalyticsSink;

#[async_trait]
impl AnalyticsSink for LogAnalyticsSink {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        log::info!(
            "analytics {:?} '{}' {}",
            event.event_type,
            event.name,
            event.properties
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_value(EventType::NetworkCall).unwrap(),
            json!("NETWORK_CALL_EVENT")
        );
        let parsed: EventType = serde_json::from_value(json!("UI_EVENT")).unwrap();
        assert_eq!(parsed, EventType::Ui);
        assert_eq!(EventType::default(), EventType::Message);
    }

    #[test]
    fn test_new_event_is_stamped() {
        let a = AnalyticsEvent::new(EventType::Timer, "start", DynamicValue::Null);
        let b = AnalyticsEvent::new(EventType::Timer, "start", DynamicValue::Null);
        assert_ne!(a.local_id, b.local_id);
        assert!(a.created_at > 0);
    }

    #[tokio::test]
    async fn test_log_sink_accepts_events() {
        let sink = LogAnalyticsSink;
        let event = AnalyticsEvent::new(
            EventType::Ui,
            "view",
            DynamicValue::from(json!({"screen": "cart"})),
        );
        assert!(sink.record(event).await.is_ok());
        assert!(sink.flush().await.is_ok());
    }
}
