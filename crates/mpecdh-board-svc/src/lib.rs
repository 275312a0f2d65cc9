//! HTTP routes of the ceremony board
//!
//! Every route maps onto one [`Board`] call; errors carry an [`ErrorBody`]
//! so clients can rebuild the ceremony error.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mpecdh_board::wire::{
    BlockingResponse, CreateRequest, ErrorBody, ErrorCode, QueueResponse, SubmitRequest,
    SubmitResponse,
};
use mpecdh_board::{Board, BoardError};
use mpecdh_core::{CeremonyInfo, InstanceId, ParticipantId, Prep, ThresholdApproval};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state
struct AppState {
    board: Board,
}

/// Board error rendered as an HTTP response
struct ApiError(BoardError);

impl From<BoardError> for ApiError {
    fn from(e: BoardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body: ErrorBody = self.0.body();
        let status = match body.code {
            ErrorCode::Format | ErrorCode::InvalidConfig => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::FORBIDDEN,
            ErrorCode::NotFound | ErrorCode::UnknownParticipant => StatusCode::NOT_FOUND,
            ErrorCode::OutOfOrder | ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Router serving `board`
pub fn app(board: Board) -> Router {
    let state = Arc::new(AppState { board });

    Router::new()
        .route("/health", get(health))
        .route("/v1/ceremonies", post(create_ceremony))
        .route("/v1/ceremonies/:id", get(ceremony_info))
        .route("/v1/ceremonies/:id/prep/:participant", get(prep))
        .route("/v1/ceremonies/:id/blocking", get(blocking))
        .route("/v1/ceremonies/:id/queue/:index", get(queue))
        .route("/v1/ceremonies/:id/submit", post(submit))
        .route("/v1/ceremonies/:id/reset", post(reset))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mpecdh-board-svc",
        "version": env!("CARGO_PKG_VERSION"),
        "ceremonies": state.board.len(),
    }))
}

async fn create_ceremony(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRequest>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let info = state.board.create(req)?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn ceremony_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<InstanceId>,
) -> ApiResult<CeremonyInfo> {
    Ok(Json(state.board.info(&id)?))
}

async fn prep(
    State(state): State<Arc<AppState>>,
    Path((id, participant)): Path<(InstanceId, ParticipantId)>,
) -> ApiResult<Prep> {
    Ok(Json(state.board.prep(&id, &participant)?))
}

async fn blocking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<InstanceId>,
) -> ApiResult<BlockingResponse> {
    Ok(Json(BlockingResponse {
        blocking: state.board.blocking(&id)?,
    }))
}

async fn queue(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(InstanceId, usize)>,
) -> ApiResult<QueueResponse> {
    Ok(Json(QueueResponse {
        index,
        elements: state.board.queue(&id, index)?,
    }))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<InstanceId>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<SubmitResponse> {
    Ok(Json(state.board.submit(&id, req)?))
}

async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<InstanceId>,
    Json(approval): Json<ThresholdApproval>,
) -> ApiResult<CeremonyInfo> {
    let info = state.board.reset(&id, &approval)?;
    info!(instance = %id, epoch = info.epoch, "Ceremony reset over HTTP");
    Ok(Json(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use mpecdh_core::{Ed25519Identity, Element, IdentitySigner, Status, Suite};
    use tower::ServiceExt;

    fn signers() -> Vec<Ed25519Identity> {
        (1u8..=3).map(|i| Ed25519Identity::from_seed(&[i; 32])).collect()
    }

    fn test_app() -> Router {
        app(Board::default())
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => request.body(Body::from(json.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn request(signers: &[Ed25519Identity]) -> CreateRequest {
        let mut req = CreateRequest::new(
            "c0ffee",
            signers.iter().map(|s| s.participant_id()).collect(),
            Suite::X25519,
            None,
        );
        for signer in signers {
            req.approve(signer).unwrap();
        }
        req
    }

    async fn create(app: &Router, signers: &[Ed25519Identity]) -> CeremonyInfo {
        let body = serde_json::to_value(request(signers)).unwrap();
        let (status, json) = call(app, "POST", "/v1/ceremonies", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = call(&test_app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let app = test_app();
        let signers = signers();
        let info = create(&app, &signers).await;

        let (status, json) = call(&app, "GET", &format!("/v1/ceremonies/{}", info.instance), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["epoch"], 0);

        let body = serde_json::to_value(request(&signers)).unwrap();
        let (status, json) = call(&app, "POST", "/v1/ceremonies", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "conflict");
    }

    #[tokio::test]
    async fn test_unsigned_create_is_forbidden() {
        let app = test_app();
        let signers = signers();
        let req = serde_json::json!({
            "master": "c0ffee",
            "roster": signers.iter().map(|s| s.participant_id()).collect::<Vec<_>>(),
            "suite": "x25519",
        });
        let (status, json) = call(&app, "POST", "/v1/ceremonies", Some(req)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], "unauthorized");

        let (_, json) = call(&app, "GET", "/health", None).await;
        assert_eq!(json["ceremonies"], 0);
    }

    #[tokio::test]
    async fn test_signed_submit_and_prep() {
        let app = test_app();
        let signers = signers();
        let info = create(&app, &signers).await;
        let me = &signers[0];

        let req = SubmitRequest::sign(me, &info.instance, 0, 0, Element::from([9u8; 32])).unwrap();
        let uri = format!("/v1/ceremonies/{}/submit", info.instance);
        let (status, json) = call(&app, "POST", &uri, Some(serde_json::to_value(&req).unwrap())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["round"], 0);

        let (status, json) = call(
            &app,
            "GET",
            &format!("/v1/ceremonies/{}/prep/{}", info.instance, me.participant_id()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let prep: Prep = serde_json::from_value(json).unwrap();
        assert_eq!(prep.status, Status::Waiting);
        assert_eq!(prep.round, 1);

        // replaying the same signed body is rejected
        let (status, json) = call(&app, "POST", &uri, Some(serde_json::to_value(&req).unwrap())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "out_of_order");

        // and so is relabelling it for the next round
        let mut body = serde_json::to_value(&req).unwrap();
        body["round"] = 1.into();
        let (status, json) = call(&app, "POST", &uri, Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_unknown_instance_and_participant() {
        let app = test_app();
        let signers = signers();
        let info = create(&app, &signers).await;
        let outsider = Ed25519Identity::from_seed(&[77; 32]);

        let (status, _) = call(
            &app,
            "GET",
            &format!("/v1/ceremonies/{}/prep/{}", info.instance, outsider.participant_id()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let missing = InstanceId::derive(b"missing", &[], 0);
        let (status, json) = call(&app, "GET", &format!("/v1/ceremonies/{}/blocking", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn test_reset_needs_approvals() {
        let app = test_app();
        let signers = signers();
        let info = create(&app, &signers).await;
        let uri = format!("/v1/ceremonies/{}/reset", info.instance);
        let message = mpecdh_core::auth::reset_message(&info.instance, 0);

        let mut approval = ThresholdApproval::new();
        approval.approve(&signers[0], &message).unwrap();
        let (status, _) = call(&app, "POST", &uri, Some(serde_json::to_value(&approval).unwrap())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        approval.approve(&signers[1], &message).unwrap();
        let (status, json) = call(&app, "POST", &uri, Some(serde_json::to_value(&approval).unwrap())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["epoch"], 1);
    }
}
