//! HTTPS client helpers for remote agent discovery and task delivery
//! (spec.md §4.5 "HTTP client helpers"), generalized from the teacher's
//! `agent_adapters::http_client::build_https_client`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use discovery_core::AgentInfo;
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Request, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::error::{ProtocolError, ProtocolResult};

type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

fn build_https_client() -> HyperClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(anchor.subject, anchor.spki, anchor.name_constraints)
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));
    Client::builder().build::<_, Body>(connector)
}

/// A message delivered to a remote agent via [`DiscoveryClient::send`]
/// or [`DiscoveryClient::send_async`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Caller-chosen identifier, echoed back by `GetResult`.
    pub message_id: String,
    /// Opaque message payload.
    pub payload: Value,
}

/// One entry in the task registry: where a deferred task was sent and
/// when, used to bound `GetResult` lookups and support cleanup.
#[derive(Clone, Debug)]
struct TaskEntry {
    agent_url: String,
    message_id: String,
    created_at: DateTime<Utc>,
}

/// `task_id -> (agent_url, message_id, created_at)` map for deferred
/// task delivery (spec.md §4.5).
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    /// Creates an empty task registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, task_id: String, agent_url: String, message_id: String, now: DateTime<Utc>) {
        self.tasks.write().expect("task registry poisoned").insert(
            task_id,
            TaskEntry { agent_url, message_id, created_at: now },
        );
    }

    fn lookup(&self, task_id: &str) -> Option<(String, String)> {
        self.tasks
            .read()
            .expect("task registry poisoned")
            .get(task_id)
            .map(|entry| (entry.agent_url.clone(), entry.message_id.clone()))
    }

    /// Removes every entry older than `max_age`, relative to `now`.
    /// Required by spec.md §5: "no implicit unbounded growth is
    /// acceptable".
    pub fn cleanup(&self, now: DateTime<Utc>, max_age: Duration) {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
        self.tasks
            .write()
            .expect("task registry poisoned")
            .retain(|_, entry| now.signed_duration_since(entry.created_at) <= max_age);
    }

    /// Returns the number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().expect("task registry poisoned").len()
    }

    /// Returns `true` if no tasks are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default freshness window for `discover(url)` results (spec.md §4.5:
/// "cache 5 min").
pub const DISCOVER_CACHE_TTL: Duration = Duration::from_secs(300);

struct DiscoverCacheEntry {
    agent: AgentInfo,
    fetched_at: DateTime<Utc>,
}

/// HTTP client used for `Discover(url)`, `Send`, `SendAsync`, and
/// `GetResult` against remote agents.
pub struct DiscoveryClient {
    client: HyperClient,
    timeout: Duration,
    tasks: TaskRegistry,
    discover_cache: RwLock<HashMap<String, DiscoverCacheEntry>>,
    discover_cache_ttl: Duration,
}

impl DiscoveryClient {
    /// Creates a client with the given request timeout and the default
    /// `discover(url)` cache TTL ([`DISCOVER_CACHE_TTL`]).
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_discover_cache_ttl(timeout, DISCOVER_CACHE_TTL)
    }

    /// Creates a client with an explicit `discover(url)` cache TTL,
    /// mainly for tests that need to observe expiry quickly.
    #[must_use]
    pub fn with_discover_cache_ttl(timeout: Duration, discover_cache_ttl: Duration) -> Self {
        Self {
            client: build_https_client(),
            timeout,
            tasks: TaskRegistry::new(),
            discover_cache: RwLock::new(HashMap::new()),
            discover_cache_ttl,
        }
    }

    /// Returns the task registry backing `send_async`/`get_result`.
    #[must_use]
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    async fn get_json(&self, uri: Uri) -> ProtocolResult<(hyper::StatusCode, Vec<u8>)> {
        let request = Request::get(uri)
            .body(Body::empty())
            .map_err(|err| ProtocolError::invalid(format!("failed to build request: {err}")))?;
        let response = timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| ProtocolError::transport("request timed out"))?
            .map_err(|err| ProtocolError::transport(format!("request failed: {err}")))?;
        let status = response.status();
        let bytes = to_bytes(response.into_body())
            .await
            .map_err(|err| ProtocolError::transport(format!("failed to read response body: {err}")))?;
        Ok((status, bytes.to_vec()))
    }

    async fn post_json(&self, uri: Uri, body: &impl Serialize) -> ProtocolResult<(hyper::StatusCode, Vec<u8>)> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| ProtocolError::invalid(format!("failed to encode request body: {err}")))?;
        let request = Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .map_err(|err| ProtocolError::invalid(format!("failed to build request: {err}")))?;
        let response = timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| ProtocolError::transport("request timed out"))?
            .map_err(|err| ProtocolError::transport(format!("request failed: {err}")))?;
        let status = response.status();
        let bytes = to_bytes(response.into_body())
            .await
            .map_err(|err| ProtocolError::transport(format!("failed to read response body: {err}")))?;
        Ok((status, bytes.to_vec()))
    }

    /// Issues a GET against `url` and succeeds iff the response status
    /// is successful, discarding the body. Used by the remote health
    /// probe (spec.md §4.2 "RemoteHealthProbe").
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Remote`] on a non-success status,
    /// [`ProtocolError::Transport`] on network failure.
    pub async fn discover_health(&self, url: &str) -> ProtocolResult<()> {
        let uri: Uri = url.parse().map_err(|err| ProtocolError::invalid(format!("invalid health url: {err}")))?;
        let (status, _bytes) = self.get_json(uri).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(ProtocolError::Remote(format!("health probe returned {status}")))
        }
    }

    /// Fetches `<url>/.well-known/agent.json`, deep-validates it decodes
    /// into a well-formed [`AgentInfo`], and caches the result for
    /// [`Self::discover_cache_ttl`] (spec.md §4.5: "cache 5 min").
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Remote`] on a non-success status,
    /// malformed body, or an agent descriptor with an empty name,
    /// [`ProtocolError::Transport`] on network failure.
    pub async fn discover(&self, url: &str) -> ProtocolResult<AgentInfo> {
        let now = Utc::now();
        if let Some(entry) = self.discover_cache.read().expect("discover cache poisoned").get(url) {
            let age = now.signed_duration_since(entry.fetched_at);
            if age <= chrono::Duration::from_std(self.discover_cache_ttl).unwrap_or_default() {
                return Ok(entry.agent.clone());
            }
        }

        let uri: Uri = format!("{}/.well-known/agent.json", url.trim_end_matches('/'))
            .parse()
            .map_err(|err| ProtocolError::invalid(format!("invalid discover url: {err}")))?;
        let (status, bytes) = self.get_json(uri).await?;
        if !status.is_success() {
            return Err(ProtocolError::Remote(format!("discover returned {status}")));
        }
        let agent: AgentInfo = serde_json::from_slice(&bytes)
            .map_err(|err| ProtocolError::Remote(format!("malformed agent descriptor: {err}")))?;
        if agent.card().name().trim().is_empty() {
            return Err(ProtocolError::Remote("agent descriptor has an empty name".into()));
        }

        self.discover_cache.write().expect("discover cache poisoned").insert(
            url.to_owned(),
            DiscoverCacheEntry { agent: agent.clone(), fetched_at: now },
        );
        Ok(agent)
    }

    /// Sends `message` to `agent_url` and awaits the synchronous result.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Remote`] on a non-success status.
    pub async fn send(&self, agent_url: &str, message: &AgentMessage) -> ProtocolResult<Value> {
        let uri: Uri = format!("{}/messages", agent_url.trim_end_matches('/'))
            .parse()
            .map_err(|err| ProtocolError::invalid(format!("invalid agent url: {err}")))?;
        let (status, bytes) = self.post_json(uri, message).await?;
        if !status.is_success() {
            return Err(ProtocolError::Remote(format!("send returned {status}")));
        }
        serde_json::from_slice(&bytes).map_err(|err| ProtocolError::Remote(format!("malformed response: {err}")))
    }

    /// Sends `message` to `agent_url` for deferred processing,
    /// returning a `task_id` that `get_result` can later poll.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Remote`] on a non-success status.
    pub async fn send_async(&self, agent_url: &str, message: &AgentMessage) -> ProtocolResult<String> {
        let uri: Uri = format!("{}/messages/async", agent_url.trim_end_matches('/'))
            .parse()
            .map_err(|err| ProtocolError::invalid(format!("invalid agent url: {err}")))?;
        let (status, bytes) = self.post_json(uri, message).await?;
        if !status.is_success() {
            return Err(ProtocolError::Remote(format!("send_async returned {status}")));
        }
        #[derive(Deserialize)]
        struct AsyncAck {
            task_id: String,
        }
        let ack: AsyncAck =
            serde_json::from_slice(&bytes).map_err(|err| ProtocolError::Remote(format!("malformed ack: {err}")))?;
        self.tasks.record(ack.task_id.clone(), agent_url.to_owned(), message.message_id.clone(), Utc::now());
        Ok(ack.task_id)
    }

    /// Polls the remote agent for the result of a task previously
    /// submitted via `send_async`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotFound`] if `task_id` is unknown to
    /// this client, [`ProtocolError::Remote`] on a non-success status.
    pub async fn get_result(&self, task_id: &str) -> ProtocolResult<Value> {
        let (agent_url, message_id) = self
            .tasks
            .lookup(task_id)
            .ok_or_else(|| ProtocolError::NotFound(format!("unknown task: {task_id}")))?;
        let uri: Uri = format!("{}/messages/{}/result", agent_url.trim_end_matches('/'), message_id)
            .parse()
            .map_err(|err| ProtocolError::invalid(format!("invalid agent url: {err}")))?;
        let (status, bytes) = self.get_json(uri).await?;
        if !status.is_success() {
            return Err(ProtocolError::Remote(format!("get_result returned {status}")));
        }
        serde_json::from_slice(&bytes).map_err(|err| ProtocolError::Remote(format!("malformed result: {err}")))
    }
}
