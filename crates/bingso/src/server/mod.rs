//! HTTP server setup and routing.

pub mod auth;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use self::state::AppState;

/// Extra bytes allowed past the photo limit so an oversized upload still
/// reaches the handler and gets a readable rejection.
const PHOTO_BODY_SLACK: usize = 1;

/// Build the CORS layer from configured origins, skipping invalid ones.
#[must_use]
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Create the Axum application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let photo_limit = state.config.photo.max_bytes + PHOTO_BODY_SLACK;
    let cors = create_cors_layer(&state.config.server.cors_origins);

    Router::new()
        // Public
        .route("/health", get(handlers::health_check))
        .route("/login", get(auth::login_page))
        .route("/api/auth", post(auth::login).delete(auth::logout))
        .route("/status-board", get(handlers::status_board))
        .route("/status-board/rotation", post(handlers::control_board))
        .route("/obituary/:id", get(handlers::get_obituary))
        .route("/obituary/:id/condolences", post(handlers::post_condolence))
        // Dashboard
        .route("/api/rooms", get(handlers::list_rooms))
        .route(
            "/api/rooms/:room",
            get(handlers::get_room).put(handlers::save_room),
        )
        .route("/api/rooms/:room/checkout", post(handlers::checkout_room))
        .route("/api/rooms/:room/transfer", post(handlers::transfer_room))
        .route(
            "/api/rooms/:room/condolences",
            get(handlers::room_condolences),
        )
        .route("/api/funerals", get(handlers::list_active))
        .route(
            "/api/funerals/:id",
            axum::routing::delete(handlers::delete_active),
        )
        .route("/api/announcements", get(handlers::list_completed))
        .route(
            "/api/announcements/:id",
            axum::routing::delete(handlers::delete_completed),
        )
        .route(
            "/api/enshrined",
            get(handlers::list_enshrined).post(handlers::create_enshrined),
        )
        .route(
            "/api/enshrined/:id",
            axum::routing::patch(handlers::update_enshrined).delete(handlers::delete_enshrined),
        )
        .route("/api/enshrined/:id/move", post(handlers::move_enshrined))
        .route("/api/schedule", post(handlers::compute_schedule))
        .route(
            "/api/photo",
            post(handlers::photo_preview).layer(DefaultBodyLimit::max(photo_limit)),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the server on the specified address
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Server listening on {}", addr);
    info!("- Dashboard API: http://{}/api/rooms", addr);
    info!("- Status board:  http://{}/status-board", addr);
    info!("- Health:        http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::board::BoardHub;
    use crate::config::{hash_password, Config, HomeAccount};
    use crate::model::{FuneralRecord, NewCondolence};
    use crate::rooms::RoomNumber;
    use crate::storage::{FuneralBackend, SharedStorage, Storage};

    const PASSWORD: &str = "correct horse";

    fn test_state() -> AppState {
        let mut config = Config::default();
        config.auth.homes.push(HomeAccount {
            id: "home-1".to_string(),
            name: "영동병원장례식장".to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
        });
        config.auth.session_secret = Some("test-session-secret-with-enough-length".to_string());
        config.photo.max_bytes = 16;
        let storage = SharedStorage::new(Storage::open_in_memory().unwrap());
        AppState::new(storage, config, BoardHub::new())
    }

    fn room(n: u8) -> RoomNumber {
        RoomNumber::new(n).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, cookie: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    /// Sign in and return the cookie header for later requests.
    async fn login(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth",
                "",
                &json!({ "funeral_home_id": "home-1", "password": PASSWORD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = create_app(test_state());
        let response = app
            .oneshot(get_request("/health", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dashboard_redirects_without_session() {
        let app = create_app(test_state());
        let response = app
            .oneshot(get_request("/api/rooms", ""))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_unknown_paths_go_through_the_gateway() {
        let app = create_app(test_state());
        for uri in ["/api/nowhere", "/dashboard"] {
            let response = app.clone().oneshot(get_request(uri, "")).await.unwrap();
            assert!(response.status().is_redirection(), "{uri}");
            assert_eq!(response.headers()[header::LOCATION], "/login");
        }

        let response = app
            .clone()
            .oneshot(get_request("/status-board/nowhere", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let cookie = login(&app).await;
        let response = app
            .oneshot(get_request("/api/nowhere", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_forged_cookies_are_rejected() {
        let app = create_app(test_state());
        let response = app
            .oneshot(get_request(
                "/api/rooms",
                "funeral_authenticated=true; funeral_home_id=home-1",
            ))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let app = create_app(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth",
                "",
                &json!({ "funeral_home_id": "home-1", "password": "nope" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_save_and_checkout_room() {
        let app = create_app(test_state());
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/rooms/room-2",
                &cookie,
                &json!({
                    "room_number": 2,
                    "deceased_name": "홍길동",
                    "family_members": [{ "relation": "상주", "name": "홍철수", "phone": "01012345678" }]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let saved = body_json(response).await;
        assert_eq!(saved["created"], true);
        assert_eq!(saved["record"]["family_members"][0]["phone"], "010-1234-5678");

        let rooms = body_json(
            app.clone()
                .oneshot(get_request("/api/rooms", &cookie))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(rooms[1]["status"], "occupied");

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/rooms/2/checkout", &cookie, &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let completed = body_json(
            app.clone()
                .oneshot(get_request("/api/announcements?search=%ED%99%8D%EA%B8%B8%EB%8F%99", &cookie))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(completed.as_array().unwrap().len(), 1);

        let response = app
            .oneshot(json_request("POST", "/api/rooms/2/checkout", &cookie, &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transfer_into_occupied_room_conflicts() {
        let state = test_state();
        state
            .storage
            .insert_funeral(&FuneralRecord::new("home-1", room(1), "홍길동"))
            .unwrap();
        state
            .storage
            .insert_funeral(&FuneralRecord::new("home-1", room(3), "김영희"))
            .unwrap();
        let app = create_app(state);
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/rooms/1/transfer",
                &cookie,
                &json!({ "to": 3 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/rooms/1/transfer",
                &cookie,
                &json!({ "to": 4 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["to"], 4);
    }

    #[tokio::test]
    async fn test_enshrined_lifecycle() {
        let app = create_app(test_state());
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/enshrined",
                &cookie,
                &json!({ "contact_name": "홍철수", "contact_phone": "01012345678" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["deceased_name"], "미상");
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/api/enshrined/{id}"),
                &cookie,
                &json!({ "status": "ready" }),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "ready");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/enshrined/{id}/move"),
                &cookie,
                &json!({ "room": 6 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/enshrined/{id}/move"),
                &cookie,
                &json!({ "room": 2 }),
            ))
            .await
            .unwrap();
        let draft = body_json(response).await;
        assert_eq!(draft["record"]["family_members"][0]["relation"], "연락처");

        let response = app
            .oneshot(json_request(
                "DELETE",
                &format!("/api/enshrined/{id}"),
                &cookie,
                &json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_photo_preview_limits() {
        let app = create_app(test_state());
        let cookie = login(&app).await;

        let upload = |content_type: &'static str, body: Vec<u8>| {
            Request::builder()
                .method("POST")
                .uri("/api/photo")
                .header(header::CONTENT_TYPE, content_type)
                .header(header::COOKIE, cookie.clone())
                .body(Body::from(body))
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(upload("image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["data_url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        let response = app
            .clone()
            .oneshot(upload("text/plain", vec![1]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(upload("image/png", vec![0; 17]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_schedule_endpoint() {
        let app = create_app(test_state());
        let cookie = login(&app).await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/schedule",
                &cookie,
                &json!({ "death_time": "2025-01-15T10:30", "days": 3 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let schedule = body_json(response).await;
        assert_eq!(schedule["funeral_time"], "2025-01-18T07:00");
        assert_eq!(schedule["casket_time"], "2025-01-17T14:00");
    }

    #[tokio::test]
    async fn test_public_obituary_and_condolence() {
        let state = test_state();
        let id = state
            .storage
            .insert_funeral(&FuneralRecord::new("home-1", room(2), "홍길동"))
            .unwrap()
            .id
            .unwrap();
        let app = create_app(state);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/obituary/{id}/condolences"),
                "",
                &json!({ "sender_name": "이순신", "message": "명복을 빕니다" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/obituary/{id}"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["deceased_name"], "홍길동");
        assert_eq!(view["condolences"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(get_request("/obituary/missing", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_board_views() {
        let state = test_state();
        state
            .storage
            .insert_funeral(&FuneralRecord::new("home-1", room(1), "홍길동"))
            .unwrap();
        state
            .storage
            .insert_funeral(&FuneralRecord::new("home-1", room(3), "김영희"))
            .unwrap();
        state
            .storage
            .insert_condolence(&NewCondolence {
                funeral_home_id: "home-1".to_string(),
                room_number: room(3),
                sender_name: "이순신".to_string(),
                sender_relation: String::new(),
                message: "명복을 빕니다".to_string(),
                created_at: None,
            })
            .unwrap();
        let app = create_app(state);

        let view = body_json(
            app.clone()
                .oneshot(get_request("/status-board", ""))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(view["total"], 2);
        assert_eq!(view["auto_rotate"], true);

        let pinned = body_json(
            app.clone()
                .oneshot(get_request(
                    "/status-board?room=room-3&funeral_home_id=home-1",
                    "",
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(pinned["pinned"], true);
        assert_eq!(pinned["current"]["deceased_name"], "김영희");
        assert_eq!(pinned["current"]["latest_message"]["sender_name"], "이순신");

        let controlled = body_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/status-board/rotation",
                    "",
                    &json!({ "action": "select", "index": 1 }),
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(controlled["index"], 1);
        assert_eq!(controlled["auto_rotate"], false);

        let response = app
            .oneshot(get_request("/status-board?funeral_home_id=other", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_clears_cookies() {
        let app = create_app(test_state());
        let cookie = login(&app).await;
        let response = app
            .oneshot(json_request("DELETE", "/api/auth", &cookie, &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cleared: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(cleared.len(), 2);
    }
}
