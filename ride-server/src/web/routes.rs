//! HTTP route handlers.

use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};

use crate::dispatch::{BookingRequest, DispatchError, Estimate, EstimateRequest};
use crate::domain::{Actor, AdminId, Captain, CaptainId, RideId, Rider, RiderId};
use crate::pricing::FareAdjustments;

use super::dto::*;
use super::state::AppState;
use super::templates::*;
use super::ws::session;

/// Header carrying the authenticated actor, as `rider:<id>`, `captain:<id>`
/// or `admin:<id>`. Set by the gateway in front of this service.
pub const ACTOR_HEADER: &str = "x-actor";

/// How many rides the board shows.
const BOARD_LIMIT: usize = 50;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(board_page))
        .route("/health", get(health))
        .route("/ws", get(session))
        .route("/rides", post(book_ride))
        .route("/rides/estimate", post(estimate))
        .route("/rides/active", get(active_ride))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/tracking", get(get_tracking))
        .route("/rides/:id/accept", post(accept_ride))
        .route("/rides/:id/arriving", post(arriving))
        .route("/rides/:id/arrived", post(arrived))
        .route("/rides/:id/start", post(start_ride))
        .route("/rides/:id/complete", post(complete_ride))
        .route("/rides/:id/cancel", post(cancel_ride))
        .route("/rides/:id/rate", post(rate_ride))
        .route("/rides/:id/tip", post(tip_ride))
        .route("/captains", post(register_captain))
        .route("/captains/online", post(go_online))
        .route("/captains/offline", post(go_offline))
        .route("/captains/location", post(update_location))
        .route("/riders", post(register_rider))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Operations board of recent rides. Shows addresses, so admins only.
async fn board_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    admin(&headers)?;
    let rides = state.dispatcher.recent_rides(BOARD_LIMIT).await?;
    let template = BoardTemplate {
        rides: rides.iter().map(BoardRow::from_ride).collect(),
    };
    let html = template.render().map_err(|e| AppError::Internal {
        message: format!("Template error: {e}"),
    })?;
    Ok(Html(html).into_response())
}

// ========== Actors ==========

/// Resolve the acting party from the request headers.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or_else(|| AppError::Unauthenticated {
            message: format!("missing {ACTOR_HEADER} header"),
        })?
        .to_str()
        .map_err(|_| AppError::Unauthenticated {
            message: format!("unreadable {ACTOR_HEADER} header"),
        })?;
    parse_actor(raw)
}

pub(crate) fn parse_actor(raw: &str) -> Result<Actor, AppError> {
    raw.parse().map_err(|e| AppError::Unauthenticated {
        message: format!("{e}"),
    })
}

fn rider(headers: &HeaderMap) -> Result<RiderId, AppError> {
    match actor_from_headers(headers)? {
        Actor::Rider(id) => Ok(id),
        other => Err(AppError::Forbidden {
            message: format!("{other} is not a rider"),
        }),
    }
}

fn captain(headers: &HeaderMap) -> Result<CaptainId, AppError> {
    match actor_from_headers(headers)? {
        Actor::Captain(id) => Ok(id),
        other => Err(AppError::Forbidden {
            message: format!("{other} is not a captain"),
        }),
    }
}

fn admin(headers: &HeaderMap) -> Result<AdminId, AppError> {
    match actor_from_headers(headers)? {
        Actor::Admin(id) => Ok(id),
        other => Err(AppError::Forbidden {
            message: format!("{other} is not an admin"),
        }),
    }
}

// ========== Riders ==========

/// Price a trip without booking it.
async fn estimate(
    State(state): State<AppState>,
    Json(req): Json<EstimateRequest>,
) -> Result<Json<Estimate>, AppError> {
    Ok(Json(state.dispatcher.estimate(req).await?))
}

async fn book_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<RideView>), AppError> {
    let rider = rider(&headers)?;
    let ride = state.dispatcher.book(rider, req).await?;
    let view = RideView::for_viewer(&ride, &Actor::Rider(rider));
    Ok((StatusCode::CREATED, Json(view)))
}

async fn active_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ActiveRideResponse>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let ride = state.dispatcher.active_ride(&actor).await?;
    Ok(Json(ActiveRideResponse {
        ride: ride.map(|r| RideView::for_viewer(&r, &actor)),
    }))
}

async fn get_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
) -> Result<Json<RideView>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let ride = state.dispatcher.ride(&actor, id).await?;
    Ok(Json(RideView::for_viewer(&ride, &actor)))
}

async fn get_tracking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
) -> Result<Json<TrackingResponse>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let samples = state.dispatcher.tracking(&actor, id).await?;
    Ok(Json(TrackingResponse {
        ride_id: id,
        samples,
    }))
}

/// Cancel as whichever party the caller is.
async fn cancel_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
    body: Option<Json<CancelRideRequest>>,
) -> Result<Json<RideView>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let reason = body.map(|Json(b)| b.reason).unwrap_or_default();
    let ride = state.dispatcher.cancel(actor, id, &reason).await?;
    Ok(Json(RideView::for_viewer(&ride, &actor)))
}

async fn rate_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
    Json(req): Json<RateRideRequest>,
) -> Result<Json<RideView>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let ride = state
        .dispatcher
        .rate(actor, id, req.rating, &req.comment)
        .await?;
    Ok(Json(RideView::for_viewer(&ride, &actor)))
}

async fn tip_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
    Json(req): Json<TipRequest>,
) -> Result<Json<RideView>, AppError> {
    let rider = rider(&headers)?;
    let ride = state.dispatcher.tip(rider, id, req.amount).await?;
    Ok(Json(RideView::for_viewer(&ride, &Actor::Rider(rider))))
}

// ========== Captains ==========

async fn accept_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
) -> Result<Json<RideView>, AppError> {
    let captain = captain(&headers)?;
    let ride = state.dispatcher.accept(captain, id).await?;
    Ok(Json(RideView::for_viewer(&ride, &Actor::Captain(captain))))
}

async fn arriving(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
) -> Result<Json<RideView>, AppError> {
    let captain = captain(&headers)?;
    let ride = state.dispatcher.set_arriving(captain, id).await?;
    Ok(Json(RideView::for_viewer(&ride, &Actor::Captain(captain))))
}

async fn arrived(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
) -> Result<Json<RideView>, AppError> {
    let captain = captain(&headers)?;
    let ride = state.dispatcher.arrived(captain, id).await?;
    Ok(Json(RideView::for_viewer(&ride, &Actor::Captain(captain))))
}

async fn start_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
    Json(req): Json<StartRideRequest>,
) -> Result<Json<RideView>, AppError> {
    let captain = captain(&headers)?;
    let ride = state.dispatcher.start(captain, id, &req.code).await?;
    Ok(Json(RideView::for_viewer(&ride, &Actor::Captain(captain))))
}

async fn complete_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RideId>,
    body: Option<Json<FareAdjustments>>,
) -> Result<Json<RideView>, AppError> {
    let captain = captain(&headers)?;
    let adjustments = body.map(|Json(a)| a).unwrap_or_default();
    let ride = state.dispatcher.complete(captain, id, adjustments).await?;
    Ok(Json(RideView::for_viewer(&ride, &Actor::Captain(captain))))
}

async fn go_online(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LocationRequest>,
) -> Result<Json<CaptainStatusResponse>, AppError> {
    let captain = captain(&headers)?;
    let updated = state.dispatcher.go_online(captain, req.location).await?;
    Ok(Json(CaptainStatusResponse::from(&updated)))
}

async fn go_offline(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CaptainStatusResponse>, AppError> {
    let captain = captain(&headers)?;
    let updated = state.dispatcher.go_offline(captain).await?;
    Ok(Json(CaptainStatusResponse::from(&updated)))
}

async fn update_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LocationRequest>,
) -> Result<Json<CaptainStatusResponse>, AppError> {
    let captain = captain(&headers)?;
    let updated = state
        .dispatcher
        .update_location(captain, req.location)
        .await?;
    Ok(Json(CaptainStatusResponse::from(&updated)))
}

// ========== Administration ==========

async fn register_captain(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterCaptainRequest>,
) -> Result<StatusCode, AppError> {
    admin(&headers)?;
    let captain = Captain::new(
        req.id,
        req.name,
        req.vehicle_class,
        req.approval,
        state.dispatcher.now(),
    );
    state.dispatcher.register_captain(captain).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register_rider(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRiderRequest>,
) -> Result<StatusCode, AppError> {
    admin(&headers)?;
    state
        .dispatcher
        .register_rider(Rider::new(req.id, req.name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== Errors ==========

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Unauthenticated { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    Conflict { message: String },
    Unprocessable { message: String },
    Unavailable { message: String },
    BadGateway { message: String },
    Internal { message: String },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::BadRequest { message }
            | AppError::Unauthenticated { message }
            | AppError::Forbidden { message }
            | AppError::NotFound { message }
            | AppError::Conflict { message }
            | AppError::Unprocessable { message }
            | AppError::Unavailable { message }
            | AppError::BadGateway { message }
            | AppError::Internal { message } => message,
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        let message = e.to_string();
        match e {
            DispatchError::NotFound(_) => AppError::NotFound { message },
            DispatchError::Conflict(_) => AppError::Conflict { message },
            DispatchError::InvalidState(_) => AppError::Unprocessable { message },
            DispatchError::Unauthorized(_) => AppError::Forbidden { message },
            DispatchError::ValidationFailed(_) => AppError::BadRequest { message },
            DispatchError::Unavailable(_) => AppError::Unavailable { message },
            DispatchError::UpstreamFailure(_) => AppError::BadGateway { message },
            DispatchError::Internal(_) => AppError::Internal { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message().to_string();

        if status.is_server_error() {
            tracing::error!(%status, %message, "Request failed");
        } else {
            tracing::debug!(%status, %message, "Request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
