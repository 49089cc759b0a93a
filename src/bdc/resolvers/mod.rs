// SPDX-License-Identifier: MIT

//! Built-in step resolvers

pub mod analytics;
pub mod http;

pub use analytics::AnalyticsLogResolver;
pub use http::HttpInteractionResolver;

use std::sync::Arc;

use crate::bdc::analytics::AnalyticsSink;
use crate::bdc::transport::Transport;
use crate::bdc::workflow::registry::StepResolverRegistry;

pub const ANALYTICS_LOG: &str = "analyticsLog";
pub const HTTP_REQUEST: &str = "httpRequest";

/// Step types handled out of the box
pub const BUILTIN_STEP_TYPES: [&str; 2] = [ANALYTICS_LOG, HTTP_REQUEST];

/// Wire the built-in resolvers into `registry`
pub async fn register_builtins(
    registry: &StepResolverRegistry,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn AnalyticsSink>,
) {
    register_available(registry, Some(transport), sink).await;
}

/// Wire the built-ins whose collaborators exist; `httpRequest` is left
/// unregistered when there is no transport.
pub async fn register_available(
    registry: &StepResolverRegistry,
    transport: Option<Arc<dyn Transport>>,
    sink: Arc<dyn AnalyticsSink>,
) {
    registry
        .register(ANALYTICS_LOG, Arc::new(AnalyticsLogResolver::new(sink)))
        .await;
    log::info!("Registered resolver: {}", ANALYTICS_LOG);

    match transport {
        Some(transport) => {
            registry
                .register(HTTP_REQUEST, Arc::new(HttpInteractionResolver::new(transport)))
                .await;
            log::info!("Registered resolver: {}", HTTP_REQUEST);
        }
        None => log::warn!("No transport configured, '{}' steps are unresolved", HTTP_REQUEST),
    }
}
