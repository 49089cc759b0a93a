// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::json;
use std::sync::Arc;

use crate::bdc::transport::{HttpRequest, Transport};
use crate::sdk::error::ResolverError;
use crate::sdk::resolver::{ErrorPolicy, StepResolver};
use crate::sdk::value::DynamicValue;

static HTTP_REQUEST_SCHEMA: Lazy<DynamicValue> = Lazy::new(|| {
    DynamicValue::from(json!({
        "type": "object",
        "properties": {
            "method": {
                "type": "string",
                "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"],
                "description": "HTTP method (default GET)"
            },
            "path": {
                "type": "string",
                "description": "Path relative to the configured base URL"
            },
            "query": {
                "type": "object",
                "description": "Query string parameters"
            },
            "headers": {
                "type": "object",
                "description": "Extra request headers"
            },
            "body": {
                "description": "JSON request body"
            }
        },
        "required": ["path"]
    }))
});

/// Issues the request described by the payload and returns the response body.
///
/// Failures propagate: later steps may depend on the response.
pub struct HttpInteractionResolver {
    transport: Arc<dyn Transport>,
}

impl HttpInteractionResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StepResolver for HttpInteractionResolver {
    fn schema(&self) -> &DynamicValue {
        &HTTP_REQUEST_SCHEMA
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    async fn resolve(&self, payload: DynamicValue) -> Result<Option<DynamicValue>, ResolverError> {
        let request: HttpRequest = payload.decode()?;
        log::debug!("httpRequest step: {} {}", request.method, request.path);

        let response = self.transport.send(request).await?;
        Ok(Some(response.body))
    }
}
