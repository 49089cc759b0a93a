// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::bdc::analytics::{AnalyticsEvent, AnalyticsSink, EventType};
use crate::sdk::error::ResolverError;
use crate::sdk::resolver::{DispatchMode, ErrorPolicy, StepResolver};
use crate::sdk::value::DynamicValue;

static ANALYTICS_LOG_SCHEMA: Lazy<DynamicValue> = Lazy::new(|| {
    DynamicValue::from(json!({
        "type": "object",
        "properties": {
            "event": {
                "type": "string",
                "description": "Event name"
            },
            "event_type": {
                "type": "string",
                "description": "UI_EVENT, MESSAGE_EVENT, NETWORK_CALL_EVENT, SDK_FUNCTION_EVENT, TIMER_EVENT, ..."
            },
            "properties": {
                "type": "object",
                "description": "Free-form event properties"
            }
        },
        "required": ["event"]
    }))
});

#[derive(Debug, Deserialize)]
struct AnalyticsLogArgs {
    event: String,
    #[serde(default)]
    event_type: EventType,
    #[serde(default)]
    properties: DynamicValue,
}

/// Records the event described by the payload.
///
/// Fire-and-forget: dispatched in the background, failures are logged and
/// never fail the workflow, and it produces no output.
pub struct AnalyticsLogResolver {
    sink: Arc<dyn AnalyticsSink>,
}

impl AnalyticsLogResolver {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl StepResolver for AnalyticsLogResolver {
    fn schema(&self) -> &DynamicValue {
        &ANALYTICS_LOG_SCHEMA
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::SwallowAndLog
    }

    fn dispatch_mode(&self) -> DispatchMode {
        DispatchMode::Detached
    }

    async fn resolve(&self, payload: DynamicValue) -> Result<Option<DynamicValue>, ResolverError> {
        let args: AnalyticsLogArgs = payload.decode()?;
        let event = AnalyticsEvent::new(args.event_type, args.event, args.properties);
        self.sink.record(event).await?;
        Ok(None)
    }
}
