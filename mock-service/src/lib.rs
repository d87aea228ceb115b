//! Mock Planning Analytics (TM1) REST server.
//!
//! Serves just enough of `/api/v1` for a load test: session setup, model cube listing, MDX
//! execution into cellsets, cell counts, cellset deletion and logout. Query latency, concurrency
//! caps, TPS caps and periodic failures are configurable so tests can provoke partial failures.
use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroU64};
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info, warn};

pub const API_PREFIX: &str = "/api/v1";
const SESSION_COOKIE: &str = "TM1SessionId";

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub user: String,
    pub password: String,
    pub version: String,
    pub cubes: Vec<String>,
    /// Cells reported for every cellset.
    pub cells: u64,
    /// Mean MDX execution time.
    pub delay: Duration,
    /// Standard deviation around `delay`.
    pub jitter: Duration,
    /// Reject executions beyond this many in flight.
    pub max_concurrent: Option<usize>,
    pub max_tps: Option<NonZeroU32>,
    /// Fail every Nth execution, counting from 1.
    pub fail_every: Option<NonZeroU64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            user: "admin".to_string(),
            password: "apple".to_string(),
            version: "11.8.01300.1".to_string(),
            cubes: vec!["ReadTest".to_string()],
            cells: 16,
            delay: Duration::from_millis(10),
            jitter: Duration::ZERO,
            max_concurrent: None,
            max_tps: None,
            fail_every: None,
        }
    }
}

/// Counters observed by the server, for assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockStats {
    pub executed: u64,
    pub rejected: u64,
    pub live_cellsets: usize,
    pub logouts: u64,
}

struct MockState {
    config: MockConfig,
    limiter: Option<DefaultDirectRateLimiter>,
    in_flight: AtomicUsize,
    executions: AtomicU64,
    rejected: AtomicU64,
    logouts: AtomicU64,
    next_id: AtomicU64,
    sessions: Mutex<HashSet<String>>,
    cellsets: Mutex<HashMap<String, u64>>,
}

impl MockState {
    fn new(config: MockConfig) -> Self {
        Self {
            limiter: config.max_tps.map(rate_limiter),
            config,
            in_flight: AtomicUsize::new(0),
            executions: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            logouts: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashSet::new()),
            cellsets: Mutex::new(HashMap::new()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let has_session = {
            let sessions = self.sessions.lock().unwrap();
            session_ids(headers).iter().any(|id| sessions.contains(id))
        };

        has_session || self.valid_basic_auth(headers)
    }

    fn valid_basic_auth(&self, headers: &HeaderMap) -> bool {
        let expected = format!("{}:{}", self.config.user, self.config.password);
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Basic "))
            .and_then(|encoded| STANDARD.decode(encoded).ok())
            .map(|decoded| decoded == expected.as_bytes())
            .unwrap_or(false)
    }

    fn stats(&self) -> MockStats {
        MockStats {
            executed: self.executions.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            live_cellsets: self.cellsets.lock().unwrap().len(),
            logouts: self.logouts.load(Ordering::Relaxed),
        }
    }

    fn execution_time(&self) -> Duration {
        let mean = self.config.delay.as_secs_f64();
        let std = self.config.jitter.as_secs_f64();
        match Normal::new(mean, std) {
            Ok(normal) => Duration::from_secs_f64(normal.sample(&mut rand::thread_rng()).max(0.)),
            Err(_) => self.config.delay,
        }
    }
}

/// Decrements the in-flight count on drop.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A mock server running on a background task. Dropping it stops the server.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Bind an ephemeral port on localhost and start serving.
    pub async fn spawn(config: MockConfig) -> std::io::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(MockState::new(config));
        let app = router(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                warn!("Mock server stopped: {error}");
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn api_root(&self) -> String {
        format!("http://{}{API_PREFIX}", self.addr)
    }

    pub fn stats(&self) -> MockStats {
        self.state.stats()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve on `addr` until the process exits.
pub async fn run(addr: SocketAddr, config: MockConfig) -> std::io::Result<()> {
    let state = Arc::new(MockState::new(config));
    tokio::spawn(throughput_task(state.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mock TM1 server listening on {addr}");
    axum::serve(listener, router(state)).await
}

fn router(state: Arc<MockState>) -> Router {
    let api = Router::new()
        .route("/Configuration/ProductVersion/$value", get(product_version))
        .route("/ModelCubes()", get(model_cubes))
        .route("/ExecuteMDX", post(execute_mdx))
        .route("/ActiveSession/tm1.Close", post(logout));

    Router::new()
        .nest(API_PREFIX, api)
        .fallback(cellsets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn product_version(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.valid_basic_auth(&headers) {
        return unauthorized();
    }

    let session = state.next_id("session");
    state.sessions.lock().unwrap().insert(session.clone());
    debug!("Opened {session}");

    (
        [(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}={session}; Path=/api; HttpOnly"),
        )],
        state.config.version.clone(),
    )
        .into_response()
}

async fn model_cubes(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let value: Vec<_> = state
        .config
        .cubes
        .iter()
        .map(|name| json!({ "Name": name }))
        .collect();
    Json(json!({ "value": value })).into_response()
}

#[derive(Deserialize)]
struct MdxBody {
    #[serde(rename = "MDX")]
    mdx: String,
}

async fn execute_mdx(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<MdxBody>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    let _guard = InFlight(&state.in_flight);
    let execution = state.executions.fetch_add(1, Ordering::SeqCst) + 1;
    counter!("mock-service.executed").increment(1);

    if let Some(max) = state.config.max_concurrent {
        if in_flight > max {
            return reject(&state, "Too many concurrent queries");
        }
    }

    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            return reject(&state, "Rate limit exceeded");
        }
    }

    tokio::time::sleep(state.execution_time()).await;

    if let Some(every) = state.config.fail_every {
        if execution % every.get() == 0 {
            return reject(&state, "Injected failure");
        }
    }

    if body.mdx.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty MDX").into_response();
    }

    let id = state.next_id("cellset");
    state
        .cellsets
        .lock()
        .unwrap()
        .insert(id.clone(), state.config.cells);

    (StatusCode::CREATED, Json(json!({ "ID": id }))).into_response()
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    {
        let mut sessions = state.sessions.lock().unwrap();
        for id in session_ids(&headers) {
            sessions.remove(&id);
        }
    }
    state.logouts.fetch_add(1, Ordering::Relaxed);
    StatusCode::NO_CONTENT.into_response()
}

/// `Cellsets('<id>')` and `Cellsets('<id>')/Cells/$count` do not fit the router's path syntax,
/// so they are matched by hand.
async fn cellsets(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let Some((id, rest)) = parse_cellset_path(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !state.authorized(&headers) {
        return unauthorized();
    }

    let mut cellsets = state.cellsets.lock().unwrap();
    if method == Method::GET && rest == "/Cells/$count" {
        match cellsets.get(&id) {
            Some(count) => count.to_string().into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    } else if method == Method::DELETE && rest.is_empty() {
        match cellsets.remove(&id) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

fn parse_cellset_path(path: &str) -> Option<(String, &str)> {
    let path = path.strip_prefix(API_PREFIX)?.strip_prefix("/Cellsets(")?;
    // Quotes may arrive percent-encoded.
    let (quoted, rest) = path.split_once(')')?;
    let id = quoted.replace("%27", "'");
    let id = id.strip_prefix('\'')?.strip_suffix('\'')?;
    Some((id.to_string(), rest))
}

fn session_ids(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|c| c.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .map(str::to_string)
        .collect()
}

fn reject(state: &MockState, reason: &'static str) -> Response {
    state.rejected.fetch_add(1, Ordering::Relaxed);
    counter!("mock-service.rejected").increment(1);
    debug!("Rejecting query: {reason}");
    (StatusCode::SERVICE_UNAVAILABLE, reason).into_response()
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response()
}

/** Utils **/

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

/** Throughput Printer **/

async fn throughput_task(state: Arc<MockState>) {
    let mut last = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let executed = state.executions.load(Ordering::Relaxed);
        info!("{} queries/s", executed - last);
        last = executed;
    }
}
