//! HTTP surface: the protocol endpoint, status and registry management, and
//! the peer protocol for agents hosted by the gateway.
//!
//! Callers identify themselves with the `X-Agent-Name` header; requests
//! without it see the unfiltered catalog. `initialize` opens a session whose
//! identifier comes back in `Mcp-Session-Id`.

use super::sessions::{SESSION_HEADER, SessionManager};
use crate::agent_bridge::domain::AgentCard;
use crate::agent_bridge::services::{AgentHost, HostedAgentSummary};
use crate::catalog::domain::ProviderName;
use crate::error::GatewayError;
use crate::gateway::domain::GatewayStatus;
use crate::gateway::services::Gateway;
use crate::registry::domain::{ItemKind, RegistryItem};
use crate::workflow::domain::SkillRun;
use crate::settings::GatewaySettings;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mockable::Clock;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Header carrying the caller identity.
pub const AGENT_HEADER: &str = "x-agent-name";

/// Largest peer protocol request accepted by hosted agents.
pub const MAX_AGENT_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
struct Housekeeping {
    task_cleanup_interval: Duration,
    task_retention: Duration,
    session_cleanup_interval: Duration,
    session_idle_timeout: Duration,
}

/// Everything the HTTP surface serves.
pub struct HttpFront<C> {
    gateway: Gateway<C>,
    agents: AgentHost<C>,
    sessions: SessionManager<C>,
    housekeeping: Housekeeping,
}

impl<C> Clone for HttpFront<C> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            agents: self.agents.clone(),
            sessions: self.sessions.clone(),
            housekeeping: self.housekeeping,
        }
    }
}

impl<C> HttpFront<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Bundles the gateway with its hosted agents and session table.
    ///
    /// Cleanup intervals and ages come from `settings`.
    #[must_use]
    pub const fn new(
        gateway: Gateway<C>,
        agents: AgentHost<C>,
        sessions: SessionManager<C>,
        settings: &GatewaySettings,
    ) -> Self {
        Self {
            gateway,
            agents,
            sessions,
            housekeeping: Housekeeping {
                task_cleanup_interval: settings.task_cleanup_interval,
                task_retention: settings.task_retention,
                session_cleanup_interval: settings.session_cleanup_interval,
                session_idle_timeout: settings.session_idle_timeout,
            },
        }
    }

    /// Returns the gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Gateway<C> {
        &self.gateway
    }

    /// Returns the hosted agents.
    #[must_use]
    pub const fn agents(&self) -> &AgentHost<C> {
        &self.agents
    }

    /// Returns the session table.
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager<C> {
        &self.sessions
    }
}

/// A gateway failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::Configuration(_) => StatusCode::BAD_REQUEST,
            GatewayError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::LifecycleConflict { .. } => StatusCode::CONFLICT,
            GatewayError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Invocation { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.detail() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct RenderBody {
    #[serde(default)]
    arguments: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteBody {
    #[serde(default)]
    inputs: Map<String, Value>,
}

fn caller(headers: &HeaderMap) -> ApiResult<Option<ProviderName>> {
    let Some(raw) = headers.get(AGENT_HEADER) else {
        return Ok(None);
    };
    let name = raw
        .to_str()
        .map_err(|err| GatewayError::Configuration(format!("invalid {AGENT_HEADER} header: {err}")))?;
    ProviderName::new(name)
        .map(Some)
        .map_err(|err| ApiError(GatewayError::Configuration(err.to_string())))
}

fn item_kind(raw: &str) -> ApiResult<ItemKind> {
    ItemKind::try_from(raw).map_err(|err| ApiError(GatewayError::NotFound(err.to_string())))
}

fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError(GatewayError::Configuration(format!("invalid request body: {err}"))))
}

/// Builds the router for `front`.
#[must_use]
pub fn router<C>(front: HttpFront<C>) -> Router
where
    C: Clock + Send + Sync + 'static,
{
    let agents = Router::new()
        .route("/a2a/:agent", get(agent_card::<C>).post(agent_message::<C>))
        .layer(DefaultBodyLimit::max(MAX_AGENT_REQUEST_BYTES));
    Router::new()
        .route("/mcp", post(protocol::<C>).delete(close_session::<C>))
        .route("/api/status", get(status::<C>))
        .route("/api/registry/:kind", get(list_items::<C>).post(load_item::<C>))
        .route("/api/registry/:kind/:name", get(get_item::<C>))
        .route("/api/registry/:kind/:name/:action", post(item_action::<C>))
        .route("/.well-known/agent.json", get(agent_cards::<C>))
        .route("/a2a", get(agent_summaries::<C>))
        .merge(agents)
        .with_state(front)
}

/// Serves `front` on `listener` until `shutdown` resolves.
///
/// Hosted task and session cleanup run for as long as the server does.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve<C, F>(listener: TcpListener, front: HttpFront<C>, shutdown: F) -> std::io::Result<()>
where
    C: Clock + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let schedule = front.housekeeping;
    let task_cleanup = front
        .agents
        .spawn_task_cleanup(schedule.task_cleanup_interval, schedule.task_retention);
    let session_cleanup = front
        .sessions
        .spawn_session_cleanup(schedule.session_cleanup_interval, schedule.session_idle_timeout);
    info!(address = ?listener.local_addr().ok(), "gateway listening");
    let served = axum::serve(listener, router(front))
        .with_graceful_shutdown(shutdown)
        .await;
    task_cleanup.abort();
    session_cleanup.abort();
    served
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn is_initialize(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body).is_ok_and(|message| {
        message.get("method").and_then(Value::as_str) == Some("initialize")
    })
}

fn unknown_session(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("session not found: {id}") })),
    )
        .into_response()
}

async fn protocol<C>(State(front): State<HttpFront<C>>, headers: HeaderMap, body: Bytes) -> Response
where
    C: Clock + Send + Sync + 'static,
{
    let identity = match caller(&headers) {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };
    let opening = is_initialize(&body);
    let stale = session_id(&headers).filter(|id| !opening && !front.sessions.touch(id));
    if let Some(id) = stale {
        return unknown_session(id);
    }
    let Some(response) = front.gateway.handle_message(identity.clone(), &body).await else {
        return StatusCode::ACCEPTED.into_response();
    };
    let succeeded = response.error.is_none();
    let mut reply = Json(response).into_response();
    if opening && succeeded {
        let session = front
            .sessions
            .create(identity.as_ref().map(ProviderName::as_str));
        if let Ok(value) = HeaderValue::from_str(&session.id) {
            reply.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    reply
}

async fn close_session<C>(State(front): State<HttpFront<C>>, headers: HeaderMap) -> Response
where
    C: Clock + Send + Sync + 'static,
{
    let Some(id) = session_id(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("{SESSION_HEADER} header is required") })),
        )
            .into_response();
    };
    if front.sessions.delete(id) {
        debug!(session = id, "client ended its session");
        StatusCode::NO_CONTENT.into_response()
    } else {
        unknown_session(id)
    }
}

async fn agent_cards<C>(State(front): State<HttpFront<C>>) -> Json<Value>
where
    C: Clock + Send + Sync + 'static,
{
    Json(json!({ "agents": front.agents.cards().await }))
}

async fn agent_summaries<C>(State(front): State<HttpFront<C>>) -> Json<Vec<HostedAgentSummary>>
where
    C: Clock + Send + Sync + 'static,
{
    Json(front.agents.summaries().await)
}

async fn agent_card<C>(
    State(front): State<HttpFront<C>>,
    Path(agent): Path<String>,
) -> ApiResult<Json<AgentCard>>
where
    C: Clock + Send + Sync + 'static,
{
    front
        .agents
        .card(&agent)
        .await
        .map(Json)
        .ok_or_else(|| ApiError(GatewayError::NotFound(format!("agent not found: {agent}"))))
}

async fn agent_message<C>(
    State(front): State<HttpFront<C>>,
    Path(agent): Path<String>,
    body: Bytes,
) -> Response
where
    C: Clock + Send + Sync + 'static,
{
    match front.agents.handle_message(&agent, &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn status<C>(State(front): State<HttpFront<C>>) -> Json<GatewayStatus>
where
    C: Clock + Send + Sync + 'static,
{
    Json(front.gateway.status().await)
}

async fn list_items<C>(
    State(front): State<HttpFront<C>>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<RegistryItem>>>
where
    C: Clock + Send + Sync + 'static,
{
    let items = front.gateway.registry().list(item_kind(&kind)?).await;
    Ok(Json(items))
}

async fn load_item<C>(
    State(front): State<HttpFront<C>>,
    Path(kind): Path<String>,
    Json(document): Json<Value>,
) -> ApiResult<(StatusCode, Json<RegistryItem>)>
where
    C: Clock + Send + Sync + 'static,
{
    let item = RegistryItem::from_document(item_kind(&kind)?, document)
        .map_err(|err| GatewayError::Configuration(format!("invalid {kind} definition: {err}")))?;
    let loaded = front
        .gateway
        .registry()
        .load(item)
        .await
        .map_err(GatewayError::from)?;
    Ok((StatusCode::CREATED, Json(loaded)))
}

async fn get_item<C>(
    State(front): State<HttpFront<C>>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<Json<RegistryItem>>
where
    C: Clock + Send + Sync + 'static,
{
    let item = front
        .gateway
        .registry()
        .get(item_kind(&kind)?, &name)
        .await
        .map_err(GatewayError::from)?;
    Ok(Json(item))
}

async fn item_action<C>(
    State(front): State<HttpFront<C>>,
    Path((kind, name, action)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response>
where
    C: Clock + Send + Sync + 'static,
{
    let target = item_kind(&kind)?;
    let registry = front.gateway.registry();
    match (target, action.as_str()) {
        (_, "activate") => {
            let item = registry.activate(target, &name).await.map_err(GatewayError::from)?;
            Ok(Json(item).into_response())
        }
        (_, "disable") => {
            let item = registry.disable(target, &name).await.map_err(GatewayError::from)?;
            Ok(Json(item).into_response())
        }
        (ItemKind::Prompt, "render") => {
            let request: RenderBody = json_body(&body)?;
            let text = registry
                .preview_prompt(&name, &request.arguments)
                .await
                .map_err(GatewayError::from)?;
            Ok(Json(json!({ "name": name, "text": text })).into_response())
        }
        (ItemKind::Skill, "execute") => {
            let request: ExecuteBody = json_body(&body)?;
            let run: SkillRun = front
                .gateway
                .execute_skill(caller(&headers)?, &name, &request.inputs)
                .await?;
            Ok(Json(run).into_response())
        }
        (_, other) => Err(ApiError(GatewayError::NotFound(format!(
            "no action '{other}' for {target} items"
        )))),
    }
}
