// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{AnalyticsEvent, AnalyticsSink};
use crate::bdc::transport::{HttpRequest, Transport};
use crate::sdk::error::AnalyticsError;
use crate::sdk::value::DynamicValue;

#[derive(Serialize)]
struct Batch<'a> {
    data: &'a [AnalyticsEvent],
}

/// Buffers events and uploads them in batches through the transport.
///
/// A batch is sent once `batch_size` events are buffered, and on `flush`.
/// Events from a failed upload go back to the front of the buffer so the
/// next flush retries them.
pub struct BatchingAnalyticsSink {
    transport: Arc<dyn Transport>,
    endpoint: String,
    batch_size: usize,
    buffer: Mutex<Vec<AnalyticsEvent>>,
}

impl BatchingAnalyticsSink {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            batch_size: batch_size.max(1),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }

    async fn upload(&self, batch: &[AnalyticsEvent]) -> Result<(), AnalyticsError> {
        let body = DynamicValue::from_serializable(&Batch { data: batch })?;
        self.transport
            .send(HttpRequest::post(self.endpoint.clone(), body))
            .await?;
        log::debug!("Uploaded {} analytics event(s)", batch.len());
        Ok(())
    }

    /// Upload buffered events in chunks while `should_send` holds for the buffer length
    async fn drain<F>(&self, should_send: F) -> Result<(), AnalyticsError>
    where
        F: Fn(usize) -> bool,
    {
        let mut buffer = self.buffer.lock().await;
        while !buffer.is_empty() && should_send(buffer.len()) {
            let take = buffer.len().min(self.batch_size);
            let batch: Vec<AnalyticsEvent> = buffer.drain(..take).collect();
            if let Err(e) = self.upload(&batch).await {
                let newer = std::mem::replace(&mut *buffer, batch);
                buffer.extend(newer);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for BatchingAnalyticsSink {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.buffer.lock().await.push(event);
        let batch_size = self.batch_size;
        self.drain(|len| len >= batch_size).await
    }

    async fn flush(&self) -> Result<(), AnalyticsError> {
        self.drain(|_| true).await
    }
}
