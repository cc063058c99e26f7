//! Range streaming engine.
//!
//! A request moves through fixed stages, each of which either hands its result
//! to the next or ends the request with an [`Error`] (and so a status code):
//!
//! 1. [`authorize`](StreamEngine::authorize): credential check, client identity, rate limit
//! 2. [`resolve`](StreamEngine::resolve): locate the resource under the root
//! 3. [`determine_span`](StreamEngine::determine_span): whole file or parsed range
//! 4. [`throttle_delay`](StreamEngine::throttle_delay) + [`wait`](StreamEngine::wait)
//! 5. [`respond`](StreamEngine::respond): headers, then the byte span as a stream
//!
//! The client's session only moves forward once the final byte of the span has
//! been handed to the connection. A body dropped early (client gone) or cut
//! short by a read error leaves the session untouched.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use seekgate_common::{ClientId, Error, Result};

use super::bitrate::{ConfiguredBitrates, FallbackEstimator, DEFAULT_FALLBACK_BYTES_PER_SECOND};
use super::range::{parse_range_header, ByteSpan};
use super::resource::{self, ResourceHandle};
use super::sessions::{InMemorySessionStore, SessionStore};
use super::throttle::ThrottlePolicy;
use crate::auth::{AuthPolicy, Credential};
use crate::config::Config;
use crate::rate_limit::{self, SharedLimiter};

/// Read size for streamed bodies.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Everything the engine needs to know about an inbound request.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Resource name from the URL path.
    pub resource: String,
    pub credential: Option<Credential>,
    /// Network origin (client IP), used for identity when no credential is sent.
    pub origin: String,
    /// Raw `Range` header value, if any.
    pub range: Option<String>,
}

/// What will be sent for a resolved resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Whole-file request for a zero-length resource.
    Empty,
    /// No Range header: the whole file with status 200.
    Whole(ByteSpan),
    /// Explicit Range header: the span with status 206.
    Partial(ByteSpan),
}

impl Plan {
    pub fn span(&self) -> Option<ByteSpan> {
        match self {
            Self::Empty => None,
            Self::Whole(span) | Self::Partial(span) => Some(*span),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Empty | Self::Whole(_) => StatusCode::OK,
            Self::Partial(_) => StatusCode::PARTIAL_CONTENT,
        }
    }

    pub fn content_length(&self) -> u64 {
        self.span().map_or(0, |span| span.len())
    }
}

/// Serves byte ranges of resources under a root directory, throttling forward
/// seeks per client.
pub struct StreamEngine {
    root: PathBuf,
    policy: ThrottlePolicy,
    sessions: Arc<dyn SessionStore>,
    bitrates: FallbackEstimator,
    auth: AuthPolicy,
    limiter: Option<SharedLimiter>,
    shutdown: CancellationToken,
}

/// Builder for [`StreamEngine`].
///
/// Defaults: default throttle constants, a non-expiring in-memory session
/// store, the fallback bitrate for every resource, an open auth policy and no
/// rate limit.
pub struct StreamEngineBuilder {
    root: PathBuf,
    policy: ThrottlePolicy,
    sessions: Option<Arc<dyn SessionStore>>,
    bitrates: Option<FallbackEstimator>,
    auth: AuthPolicy,
    limiter: Option<SharedLimiter>,
    shutdown: Option<CancellationToken>,
}

impl StreamEngineBuilder {
    pub fn policy(mut self, policy: ThrottlePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn bitrates(mut self, bitrates: FallbackEstimator) -> Self {
        self.bitrates = Some(bitrates);
        self
    }

    pub fn auth(mut self, auth: AuthPolicy) -> Self {
        self.auth = auth;
        self
    }

    pub fn limiter(mut self, limiter: Option<SharedLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Token that aborts pending throttle waits when cancelled.
    pub fn shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn build(self) -> StreamEngine {
        StreamEngine {
            root: self.root,
            policy: self.policy,
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new())),
            bitrates: self
                .bitrates
                .unwrap_or_else(|| FallbackEstimator::fixed(DEFAULT_FALLBACK_BYTES_PER_SECOND)),
            auth: self.auth,
            limiter: self.limiter,
            shutdown: self.shutdown.unwrap_or_default(),
        }
    }
}

impl StreamEngine {
    pub fn builder(root: impl Into<PathBuf>) -> StreamEngineBuilder {
        StreamEngineBuilder {
            root: root.into(),
            policy: ThrottlePolicy::default(),
            sessions: None,
            bitrates: None,
            auth: AuthPolicy::open(),
            limiter: None,
            shutdown: None,
        }
    }

    /// Build an engine from configuration.
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Self {
        let sessions: Arc<dyn SessionStore> = match config.sessions.ttl_secs {
            Some(ttl) => Arc::new(InMemorySessionStore::with_ttl(Duration::from_secs(ttl))),
            None => Arc::new(InMemorySessionStore::new()),
        };
        let bitrates = FallbackEstimator::new(
            Arc::new(ConfiguredBitrates::new(config.throttle.bitrates.clone())),
            config.throttle.fallback_bytes_per_second,
        );

        Self::builder(&config.server.video_root)
            .policy(ThrottlePolicy::new(
                config.throttle.delay_ms_per_second_jump,
                config.throttle.max_delay_ms,
            ))
            .sessions(sessions)
            .bitrates(bitrates)
            .auth(AuthPolicy::from_config(&config.auth))
            .limiter(rate_limit::create_limiter(config.rate_limit.requests_per_minute))
            .shutdown(shutdown)
            .build()
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    /// The per-client rate limiter, when a quota is configured.
    pub fn limiter(&self) -> Option<&SharedLimiter> {
        self.limiter.as_ref()
    }

    /// Derive the session key: the credential when one is presented, the
    /// network origin otherwise.
    pub fn identify(credential: Option<&Credential>, origin: &str) -> ClientId {
        match credential {
            Some(credential) => ClientId::from_credential(credential.token()),
            None => ClientId::from_origin(origin),
        }
    }

    /// Stage 1: authorization, identity and rate limiting.
    pub fn authorize(&self, request: &StreamRequest) -> Result<ClientId> {
        if !self
            .auth
            .permits(request.credential.as_ref(), &request.resource)
        {
            tracing::debug!(
                resource = %request.resource,
                credential_present = request.credential.is_some(),
                "Request not authorized"
            );
            return Err(Error::Unauthorized);
        }

        let client = Self::identify(request.credential.as_ref(), &request.origin);

        if let Some(limiter) = &self.limiter {
            if !rate_limit::allow(limiter, &client) {
                tracing::debug!(client = %client, "Rate limit exceeded");
                return Err(Error::RateLimited);
            }
        }

        Ok(client)
    }

    /// Stage 2: locate the resource.
    pub async fn resolve(&self, name: &str) -> Result<ResourceHandle> {
        resource::resolve(&self.root, name).await
    }

    /// Stage 3: decide which bytes to send.
    pub fn determine_span(&self, resource: &ResourceHandle, range: Option<&str>) -> Result<Plan> {
        let parsed = match range {
            Some(value) => parse_range_header(value, resource.size)?,
            None => None,
        };

        Ok(match parsed {
            Some(span) => Plan::Partial(span),
            None => ByteSpan::whole(resource.size).map_or(Plan::Empty, Plan::Whole),
        })
    }

    /// Stage 4a: how long this client must wait before `plan` is served.
    pub fn throttle_delay(&self, client: &ClientId, resource: &ResourceHandle, plan: &Plan) -> Duration {
        let Some(span) = plan.span() else {
            return Duration::ZERO;
        };

        let last_offset = self.sessions.last_offset(client);
        let bitrate = self.bitrates.estimate(resource);
        // The byte after the last one delivered is where sequential playback
        // continues; only bytes beyond it count as skipped.
        let resume_at = last_offset.saturating_add(1);

        self.policy
            .compute_delay(resume_at as f64, span.start as f64, bitrate)
    }

    /// Stage 4b: suspend for `delay` without blocking other requests.
    ///
    /// Dropping the returned future (client disconnect) cancels the wait; a
    /// server shutdown ends it with an error.
    pub async fn wait(&self, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.shutdown.cancelled() => {
                Err(Error::internal("server shutting down during throttle wait"))
            }
        }
    }

    /// Stage 5: build the response and the streaming body.
    pub async fn respond(
        &self,
        client: ClientId,
        resource: ResourceHandle,
        plan: Plan,
    ) -> Result<Response> {
        let mut builder = Response::builder()
            .status(plan.status())
            .header(header::CONTENT_TYPE, resource.content_type)
            .header(header::CONTENT_LENGTH, plan.content_length().to_string())
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_DISPOSITION, "inline")
            .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
            .header(header::CACHE_CONTROL, "no-store");

        if let Plan::Partial(span) = plan {
            builder = builder.header(header::CONTENT_RANGE, span.content_range(resource.size));
        }

        let body = match plan.span() {
            Some(span) => {
                let mut file = tokio::fs::File::open(&resource.path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::not_found(&resource.name)
                    } else {
                        Error::internal(format!("Failed to open {}: {e}", resource.path.display()))
                    }
                })?;
                file.seek(SeekFrom::Start(span.start))
                    .await
                    .map_err(|e| Error::internal(format!("Seek failed: {e}")))?;

                completion_body(file, span, client, Arc::clone(&self.sessions))
            }
            None => Body::empty(),
        };

        builder
            .body(body)
            .map_err(|e| Error::internal(format!("Failed to build response: {e}")))
    }

    /// Run every stage for `request`.
    pub async fn serve(&self, request: StreamRequest) -> Result<Response> {
        let client = self.authorize(&request)?;
        let resource = self.resolve(&request.resource).await?;
        let plan = self.determine_span(&resource, request.range.as_deref())?;

        let delay = self.throttle_delay(&client, &resource, &plan);
        if !delay.is_zero() {
            tracing::debug!(
                client = %client,
                resource = %resource.name,
                start = plan.span().map(|s| s.start),
                delay_ms = delay.as_millis() as u64,
                "Throttling forward seek"
            );
        }
        self.wait(delay).await?;

        tracing::debug!(
            client = %client,
            resource = %resource.name,
            status = plan.status().as_u16(),
            length = plan.content_length(),
            "Streaming resource"
        );
        self.respond(client, resource, plan).await
    }
}

/// Logs transfers that never reached their last byte.
struct TransferGuard {
    client: ClientId,
    span: ByteSpan,
    sent: u64,
    completed: bool,
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(
                client = %self.client,
                start = self.span.start,
                end = self.span.end,
                sent = self.sent,
                "Transfer did not complete; session unchanged"
            );
        }
    }
}

/// Stream exactly `span.len()` bytes from `file` (already positioned at
/// `span.start`), recording the completion as the last chunk is handed over.
fn completion_body(
    file: tokio::fs::File,
    span: ByteSpan,
    client: ClientId,
    sessions: Arc<dyn SessionStore>,
) -> Body {
    let expected = span.len();

    let stream = async_stream::stream! {
        let mut guard = TransferGuard { client, span, sent: 0, completed: false };
        let mut reader = ReaderStream::with_capacity(file.take(expected), CHUNK_SIZE);

        while let Some(chunk) = reader.next().await {
            match chunk {
                Ok(bytes) => {
                    guard.sent += bytes.len() as u64;
                    // The connection stops polling once Content-Length bytes
                    // are out, so the final chunk commits the session.
                    if guard.sent == expected {
                        guard.completed = true;
                        sessions.record_completion(&guard.client, span.end);
                    }
                    yield Ok::<Bytes, Error>(bytes);
                }
                Err(e) => {
                    let err = Error::stream(format!("read failed after {} bytes: {e}", guard.sent));
                    tracing::warn!(client = %guard.client, "{err}");
                    yield Err(err);
                    return;
                }
            }
        }

        if !guard.completed {
            let err = Error::stream(format!(
                "resource ended after {} of {expected} bytes",
                guard.sent
            ));
            tracing::warn!(client = %guard.client, "{err}");
            yield Err(err);
        }
    };

    Body::from_stream(stream)
}
