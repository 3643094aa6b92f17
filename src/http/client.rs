//! Guarded HTTP client.

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use std::time::{Duration, SystemTime};

use super::retry_after::parse_retry_after;
use crate::config::AdmissionMode;
use crate::guard::{Guard, GuardError, GuardResult};
use crate::inflight::Permit;
use crate::queue::RequestQueue;

/// A `reqwest` client whose every request goes through a [`Guard`].
///
/// In queue mode, refused requests wait in a [`RequestQueue`] instead of
/// failing with [`GuardError::Blocked`].
#[derive(Clone)]
pub struct GuardedClient {
    client: Client,
    guard: Guard,
    queue: Option<RequestQueue>,
}

impl GuardedClient {
    pub fn new(client: Client, guard: Guard) -> Self {
        let queue = match guard.config().admission.mode {
            AdmissionMode::Queue => Some(RequestQueue::new(guard.clone())),
            AdmissionMode::Reject => None,
        };
        Self {
            client,
            guard,
            queue,
        }
    }

    /// Build the underlying client from the guard's `[client]` settings.
    pub fn from_guard(guard: Guard) -> GuardResult<Self> {
        let timeout = Duration::from_secs(guard.config().client.request_timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client, guard))
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn queue(&self) -> Option<&RequestQueue> {
        self.queue.as_ref()
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send `request` under the guard.
    ///
    /// Non-429 error statuses are returned as ordinary responses.
    pub async fn send(&self, request: RequestBuilder) -> GuardResult<Response> {
        if let Some(queue) = &self.queue {
            // keep FIFO order and replay spacing behind whatever is queued or replaying
            if !queue.is_empty() || queue.is_draining() {
                return self.enqueue(queue, request).await;
            }
        }

        match self.guard.admit() {
            Ok(permit) => execute(self.guard.clone(), permit, request).await,
            Err(err @ GuardError::Blocked { .. }) => match &self.queue {
                Some(queue) => self.enqueue(queue, request).await,
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    async fn enqueue(&self, queue: &RequestQueue, request: RequestBuilder) -> GuardResult<Response> {
        let guard = self.guard.clone();
        queue
            .enqueue(move |permit| execute(guard, permit, request))
            .await?
    }
}

async fn execute(guard: Guard, permit: Permit, request: RequestBuilder) -> GuardResult<Response> {
    let response = permit.run(request.send()).await??;

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_retry_after(value, SystemTime::now()));

    tracing::debug!(
        request_id = %permit.id(),
        status = response.status().as_u16(),
        "Response received"
    );

    guard.on_response(permit, response.status(), retry_after)?;
    Ok(response)
}

impl std::fmt::Debug for GuardedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedClient")
            .field("guard", &self.guard)
            .field("queued", &self.queue.as_ref().map(RequestQueue::len))
            .finish()
    }
}
