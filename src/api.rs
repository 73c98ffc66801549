use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::Value as JsonValue;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    authz::RequestAuthorizer,
    clients::health::HealthChecker,
    models::{
        audit::AuditEvent,
        health::HealthStatus,
        policy::AuthorizeRequest,
        request::{EmailRequest, PushRequest, SmsRequest, VerifyOtpRequest},
        response::{CodedError, ErrorResponse},
    },
    pipeline::{
        audit::AuditRecorder,
        dispatch::Dispatcher,
        otp::{OtpService, VerifyOutcome},
    },
};

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub otp: OtpService,
    pub authorizer: RequestAuthorizer,
    pub audit: AuditRecorder,
    pub health_checker: HealthChecker,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users/emails", post(notify_email))
        .route("/users/sms", post(notify_sms))
        .route("/users/push", post(notify_push))
        .route("/otp/verify", post(verify_otp))
        .route("/auth/authorize", post(authorize))
        .route("/health", get(health_check))
        .fallback(route_not_allowed)
        .method_not_allowed_fallback(route_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(
    state: Arc<AppState>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Correlation id for this invocation: the caller's `x-request-id` when
/// present, otherwise freshly generated.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn notify_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    let request_id = request_id(&headers);

    let request: EmailRequest = match serde_json::from_value(body.clone()) {
        Ok(request) => request,
        Err(e) => return invalid_body(&state, "/users/emails", body, e, &request_id).await,
    };

    match state.dispatcher.dispatch_email(request, body, &request_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn notify_sms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    let request_id = request_id(&headers);

    let request: SmsRequest = match serde_json::from_value(body.clone()) {
        Ok(request) => request,
        Err(e) => return invalid_body(&state, "/users/sms", body, e, &request_id).await,
    };

    match state.dispatcher.dispatch_sms(request, body, &request_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn notify_push(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    let request_id = request_id(&headers);

    let request: PushRequest = match serde_json::from_value(body.clone()) {
        Ok(request) => request,
        Err(e) => return invalid_body(&state, "/users/push", body, e, &request_id).await,
    };

    match state.dispatcher.dispatch_push(request, body, &request_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<VerifyOtpRequest>,
) -> Response {
    let request_id = request_id(&headers);

    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok());
    let username = headers
        .get("x-user-name")
        .and_then(|value| value.to_str().ok());

    let (Some(user_id), Some(_username)) = (user_id, username) else {
        return (StatusCode::BAD_REQUEST, Json(CodedError::missing_headers())).into_response();
    };

    let (Some(otp), Some(transaction_type)) = (body.otp.clone(), body.transaction_type.clone())
    else {
        return (StatusCode::BAD_REQUEST, Json(CodedError::missing_fields())).into_response();
    };

    let request_body = serde_json::json!({
        "otp": otp,
        "transaction_type": transaction_type,
    });

    match state.otp.verify(user_id, &otp, &transaction_type).await {
        Ok(VerifyOutcome::Verified) => {
            audit_otp(
                &state,
                &request_id,
                request_body,
                serde_json::json!({ "statusCode": 204 }),
            )
            .await;

            StatusCode::NO_CONTENT.into_response()
        }
        Ok(VerifyOutcome::NotFound) => {
            let error = CodedError::otp_not_found();

            audit_otp(
                &state,
                &request_id,
                request_body,
                serde_json::json!({ "statusCode": 404, "error": &error }),
            )
            .await;

            (StatusCode::NOT_FOUND, Json(error)).into_response()
        }
        Err(e) => {
            error!(error = %e, "OTP verification failed");
            let error = CodedError::internal_error();

            audit_otp(
                &state,
                &request_id,
                request_body,
                serde_json::json!({ "statusCode": 500, "error": &error }),
            )
            .await;

            (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
        }
    }
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AuthorizeRequest>,
) -> Response {
    let request_id = request_id(&headers);

    let response = state.authorizer.authorize(request, &request_id).await;

    (StatusCode::OK, Json(response)).into_response()
}

async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health)).into_response()
}

/// Unknown path or wrong method: 400, and still exactly one audit event.
async fn route_not_allowed(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request_id = request_id(&headers);
    let error = ErrorResponse::new("Route not allowed");

    state
        .audit
        .record(
            AuditEvent::new(
                Uuid::new_v4().to_string(),
                "prepare-notification",
                uri.path(),
                request_id.as_str(),
            )
            .with_output(serde_json::json!({ "error": &error.error })),
        )
        .await;

    (StatusCode::BAD_REQUEST, Json(error)).into_response()
}

async fn invalid_body(
    state: &Arc<AppState>,
    path: &str,
    body: JsonValue,
    error: serde_json::Error,
    request_id: &str,
) -> Response {
    state
        .audit
        .record(
            AuditEvent::new(
                Uuid::new_v4().to_string(),
                "prepare-notification",
                path,
                request_id,
            )
            .with_request_body(body)
            .with_output(serde_json::json!({ "error": error.to_string() })),
        )
        .await;

    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("Invalid request body")),
    )
        .into_response()
}

fn internal_error(e: anyhow::Error) -> Response {
    error!(error = %e, "Dispatch failed");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response()
}

async fn audit_otp(
    state: &Arc<AppState>,
    request_id: &str,
    request_body: JsonValue,
    output: JsonValue,
) {
    // keyed by the request correlation id, not a fresh transaction id
    state
        .audit
        .record(
            AuditEvent::new(request_id, "otp-verification", "/otp/verify", request_id)
                .with_request_body(request_body)
                .with_output(output),
        )
        .await;
}
