//! HTTP binding of [`NodeService`].
//!
//! | Method & path            | Operation                  |
//! |--------------------------|----------------------------|
//! | `POST /register`         | create an account          |
//! | `POST /login`            | check a password           |
//! | `GET /check_user/{name}` | peer existence check       |
//! | `GET /balance/{name}`    | read a balance             |
//! | `POST /deposit`          | credit an account          |
//! | `POST /create_event`     | create a betting event     |
//! | `GET /list_events`       | local and peer events      |
//! | `GET /local_events`      | local events (peer use)    |
//! | `POST /place_bet`        | stake on an outcome        |
//! | `POST /resolve_event`    | settle an event, this node |
//! | `GET /health`            | liveness                   |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use betmesh_gossip::PeerProbe;
use betmesh_types::{Decimal, Event, EventId, Odds, Username};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::service::{Health, NodeService};
use crate::{ServerError, ServerResult};

/// Builds the router for one node.
pub fn router<P: PeerProbe + 'static>(service: Arc<NodeService<P>>) -> Router {
    Router::new()
        .route("/register", post(register::<P>))
        .route("/login", post(login::<P>))
        .route("/check_user/{username}", get(check_user::<P>))
        .route("/balance/{username}", get(balance::<P>))
        .route("/deposit", post(deposit::<P>))
        .route("/create_event", post(create_event::<P>))
        .route("/list_events", get(list_events::<P>))
        .route("/local_events", get(local_events::<P>))
        .route("/place_bet", post(place_bet::<P>))
        .route("/resolve_event", post(resolve_event::<P>))
        .route("/health", get(health::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// JSON body extractor whose rejection is a `{"error"}` body like every
/// other failure.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

// ============================================================================
// Bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: Username,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub username: Username,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub event_id: EventId,
    pub odds: Odds,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub username: Username,
    pub event_id: EventId,
    pub bet_option: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub event_id: EventId,
    #[serde(alias = "result")]
    pub winning_outcome: String,
}

#[derive(Debug, Serialize)]
pub struct MessageReply {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ExistsReply {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct BalanceReply {
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BetReply {
    pub bet_id: String,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ResolveReply {
    pub event_id: EventId,
    pub winning_outcome: String,
    pub paid_bets: u64,
    pub total_paid: Decimal,
}

type Service<P> = State<Arc<NodeService<P>>>;

// ============================================================================
// Handlers
// ============================================================================

async fn register<P: PeerProbe>(
    State(svc): Service<P>,
    ApiJson(req): ApiJson<Credentials>,
) -> ServerResult<Json<MessageReply>> {
    let account = svc.register(req.username, req.password).await?;
    Ok(Json(MessageReply {
        message: format!("account {} registered", account.username),
    }))
}

async fn login<P: PeerProbe>(
    State(svc): Service<P>,
    ApiJson(req): ApiJson<Credentials>,
) -> ServerResult<Json<MessageReply>> {
    let account = svc.login(req.username, req.password).await?;
    Ok(Json(MessageReply {
        message: format!("welcome, {}", account.username),
    }))
}

/// Always 200. A name that is not even valid cannot exist here.
async fn check_user<P: PeerProbe>(
    State(svc): Service<P>,
    Path(username): Path<String>,
) -> Json<ExistsReply> {
    let exists = Username::new(username).is_ok_and(|u| svc.check_user(&u));
    Json(ExistsReply { exists })
}

async fn balance<P: PeerProbe>(
    State(svc): Service<P>,
    Path(username): Path<String>,
) -> ServerResult<Json<BalanceReply>> {
    let username = Username::new(username)?;
    let balance = svc.balance(&username)?;
    Ok(Json(BalanceReply { balance }))
}

async fn deposit<P: PeerProbe>(
    State(svc): Service<P>,
    ApiJson(req): ApiJson<DepositRequest>,
) -> ServerResult<Json<BalanceReply>> {
    let balance = svc.deposit(&req.username, req.amount)?;
    Ok(Json(BalanceReply { balance }))
}

async fn create_event<P: PeerProbe>(
    State(svc): Service<P>,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> ServerResult<Json<MessageReply>> {
    let event = svc.create_event(req.event_id, req.odds)?;
    Ok(Json(MessageReply {
        message: format!("event {} created", event.event_id),
    }))
}

async fn list_events<P: PeerProbe>(State(svc): Service<P>) -> Json<Vec<Event>> {
    Json(svc.list_events().await)
}

async fn local_events<P: PeerProbe>(State(svc): Service<P>) -> Json<Vec<Event>> {
    Json(svc.local_events())
}

async fn place_bet<P: PeerProbe>(
    State(svc): Service<P>,
    ApiJson(req): ApiJson<PlaceBetRequest>,
) -> ServerResult<Json<BetReply>> {
    let placed = svc.place_bet(&req.username, &req.event_id, &req.bet_option, req.amount)?;
    Ok(Json(BetReply {
        bet_id: placed.bet.id.to_string(),
        balance: placed.balance,
    }))
}

async fn resolve_event<P: PeerProbe>(
    State(svc): Service<P>,
    ApiJson(req): ApiJson<ResolveRequest>,
) -> ServerResult<Json<ResolveReply>> {
    let resolution = svc.resolve_event(&req.event_id, &req.winning_outcome)?;
    Ok(Json(ResolveReply {
        event_id: resolution.event_id,
        winning_outcome: resolution.winning_outcome,
        paid_bets: resolution.paid_bets,
        total_paid: resolution.total_paid,
    }))
}

async fn health<P: PeerProbe>(State(svc): Service<P>) -> Json<Health> {
    Json(svc.health())
}
