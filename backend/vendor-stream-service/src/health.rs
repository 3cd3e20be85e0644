use crate::stream::SessionState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tokio::sync::watch;

const SERVICE_NAME: &str = "vendor-stream-service";

/// Liveness: answers as long as the process serves HTTP
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "healthy", "service": SERVICE_NAME}))
}

/// Readiness: only while the stream session is connected
async fn ready(state: web::Data<watch::Receiver<SessionState>>) -> HttpResponse {
    let current = *state.borrow();
    let body = json!({"service": SERVICE_NAME, "stream": format!("{:?}", current)});

    if current == SessionState::Streaming {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Register the health routes. `/health/ready` needs a
/// `web::Data<watch::Receiver<SessionState>>` in app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/health/ready", web::get().to(ready));
}
