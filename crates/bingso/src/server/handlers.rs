//! HTTP request handlers.
//!
//! Dashboard handlers act on the home of the signed-in [`Session`]; public
//! handlers take the home from the query or the record itself. Storage
//! calls run on the blocking pool.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::board::{load_slides, BoardView, RotationCommand};
use crate::error::{Error, Result};
use crate::model::{
    Announcement, CondolenceMessage, EnshrinedRecord, EnshrinedUpdate, FuneralRecord, NewEnshrined,
};
use crate::obituary::{self, CondolenceForm, ObituaryView};
use crate::photo;
use crate::rooms::{self, RoomNumber, RoomStatus};
use crate::schedule::{Schedule, ScheduleRequest};
use crate::search::CompletedQuery;
use crate::storage::FuneralBackend;
use crate::workflow::{self, CheckoutReport, EnshrinedDraft, SaveOutcome, TransferReport};

use super::auth::Session;
use super::state::AppState;

impl Error {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownRoom(_) | Self::PhotoRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } | Self::RoomVacant { .. } => StatusCode::NOT_FOUND,
            Self::RoomOccupied { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, %status, "Request rejected");
        }
        (
            status,
            Json(json!({
                "status": "error",
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// Run a storage call on the blocking pool.
pub(super) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("storage task failed: {e}")))?
}

fn room_param(label: &str) -> Result<RoomNumber> {
    RoomNumber::parse_label(label)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "bingso is running")
}

/// Fallback for unknown paths, reached only past the session gateway.
pub async fn not_found(uri: Uri) -> Error {
    Error::not_found("route", uri.path())
}

// === Rooms ===

/// `GET /api/rooms`: occupancy of every room.
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<RoomStatus>>> {
    let storage = state.storage.clone();
    let active = blocking(move || storage.active_funerals(&session.home_id)).await?;
    Ok(Json(rooms::overview(&active)))
}

/// `GET /api/rooms/:room`: the room form, blank when the room is free.
pub async fn get_room(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(room): Path<String>,
) -> Result<Json<FuneralRecord>> {
    let room = room_param(&room)?;
    let storage = state.storage.clone();
    let record = blocking(move || workflow::room_form(&storage, &session.home_id, room)).await?;
    Ok(Json(record))
}

/// Query of a room save.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SaveRoomQuery {
    /// Enshrined record the form was prefilled from.
    pub enshrined_id: Option<String>,
}

/// `PUT /api/rooms/:room`: save the room form.
pub async fn save_room(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(room): Path<String>,
    Query(query): Query<SaveRoomQuery>,
    Json(form): Json<FuneralRecord>,
) -> Result<Json<SaveOutcome>> {
    let room = room_param(&room)?;
    let storage = state.storage.clone();
    let outcome = blocking(move || {
        workflow::save_room(
            &storage,
            &session.home_id,
            room,
            form,
            query.enshrined_id.as_deref(),
        )
    })
    .await?;
    Ok(Json(outcome))
}

/// `POST /api/rooms/:room/checkout`: archive the funeral and free the room.
pub async fn checkout_room(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(room): Path<String>,
) -> Result<Json<CheckoutReport>> {
    let room = room_param(&room)?;
    let storage = state.storage.clone();
    let report = blocking(move || workflow::checkout(&storage, &session.home_id, room)).await?;
    Ok(Json(report))
}

/// Body of a room transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    /// Target room.
    pub to: RoomNumber,
}

/// `POST /api/rooms/:room/transfer`: move the funeral to another room.
pub async fn transfer_room(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(room): Path<String>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<TransferReport>> {
    let from = room_param(&room)?;
    let storage = state.storage.clone();
    let report =
        blocking(move || workflow::transfer_room(&storage, &session.home_id, from, body.to))
            .await?;
    Ok(Json(report))
}

/// `GET /api/rooms/:room/condolences`: messages of a room, newest first.
pub async fn room_condolences(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(room): Path<String>,
) -> Result<Json<Vec<CondolenceMessage>>> {
    let room = room_param(&room)?;
    let storage = state.storage.clone();
    let messages = blocking(move || storage.condolences(&session.home_id, room)).await?;
    Ok(Json(messages))
}

// === Records ===

/// `GET /api/funerals`: active funerals.
pub async fn list_active(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<FuneralRecord>>> {
    let storage = state.storage.clone();
    let records = blocking(move || storage.active_funerals(&session.home_id)).await?;
    Ok(Json(records))
}

/// `DELETE /api/funerals/:id`: drop an active funeral without archiving.
pub async fn delete_active(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let storage = state.storage.clone();
    let deleted = id.clone();
    blocking(move || workflow::delete_active(&storage, &session.home_id, &id)).await?;
    Ok(Json(json!({ "status": "success", "deleted": deleted })))
}

/// `GET /api/announcements`: completed funerals, filtered and sorted.
pub async fn list_completed(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<CompletedQuery>,
) -> Result<Json<Vec<Announcement>>> {
    let storage = state.storage.clone();
    let announcements = blocking(move || storage.announcements(&session.home_id)).await?;
    Ok(Json(query.apply(announcements)))
}

/// `DELETE /api/announcements/:id`: delete a completed funeral.
pub async fn delete_completed(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let storage = state.storage.clone();
    let deleted = id.clone();
    blocking(move || workflow::delete_announcement(&storage, &session.home_id, &id)).await?;
    Ok(Json(json!({ "status": "success", "deleted": deleted })))
}

// === Enshrined queue ===

/// `GET /api/enshrined`: the queue, oldest first.
pub async fn list_enshrined(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<EnshrinedRecord>>> {
    let storage = state.storage.clone();
    let records = blocking(move || storage.enshrined(&session.home_id)).await?;
    Ok(Json(records))
}

/// `POST /api/enshrined`: register a body.
pub async fn create_enshrined(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(intake): Json<NewEnshrined>,
) -> Result<(StatusCode, Json<EnshrinedRecord>)> {
    let storage = state.storage.clone();
    let record =
        blocking(move || workflow::register_enshrined(&storage, &session.home_id, intake)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PATCH /api/enshrined/:id`: change status, contact or notes.
pub async fn update_enshrined(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(update): Json<EnshrinedUpdate>,
) -> Result<Json<EnshrinedRecord>> {
    let storage = state.storage.clone();
    let record =
        blocking(move || workflow::update_enshrined(&storage, &session.home_id, &id, update))
            .await?;
    Ok(Json(record))
}

/// `DELETE /api/enshrined/:id`: remove a body from the queue.
pub async fn delete_enshrined(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let storage = state.storage.clone();
    let deleted = id.clone();
    blocking(move || workflow::remove_enshrined(&storage, &session.home_id, &id)).await?;
    Ok(Json(json!({ "status": "success", "deleted": deleted })))
}

/// Body of a move out of the queue.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    /// Target room.
    pub room: RoomNumber,
}

/// `POST /api/enshrined/:id/move`: prefill a room form from the queue.
pub async fn move_enshrined(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(body): Json<MoveRequest>,
) -> Result<Json<EnshrinedDraft>> {
    let storage = state.storage.clone();
    let draft = blocking(move || {
        workflow::prepare_from_enshrined(&storage, &session.home_id, &id, body.room)
    })
    .await?;
    Ok(Json(draft))
}

// === Tools ===

/// `POST /api/schedule`: derive procession and casketing times.
pub async fn compute_schedule(Json(request): Json<ScheduleRequest>) -> Result<Json<Schedule>> {
    Ok(Json(request.compute()?))
}

/// `POST /api/photo`: turn an uploaded image into a preview data URL.
pub async fn photo_preview(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let data_url = photo::to_data_url(content_type, &body, state.config.photo.max_bytes)?;
    Ok(Json(json!({ "status": "success", "data_url": data_url })))
}

// === Status board ===

/// Query of the status board.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BoardQuery {
    /// Room to pin, e.g. `room-3`.
    pub room: Option<String>,
    /// Home to show; optional when exactly one home is configured.
    pub funeral_home_id: Option<String>,
}

fn board_home(state: &AppState, requested: Option<&str>) -> Result<String> {
    Ok(state.config.auth.resolve_home(requested)?.id.clone())
}

/// `GET /status-board`: the current slide, or the pinned room.
pub async fn status_board(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BoardView>> {
    let home = board_home(&state, query.funeral_home_id.as_deref())?;
    let facility = state.config.board.facility_name.clone();
    let storage = state.storage.clone();

    if let Some(room) = query.room.as_deref() {
        let room = room_param(room)?;
        let slides = blocking(move || load_slides(&storage, &home, Some(room))).await?;
        return Ok(Json(BoardView::pinned(&facility, slides)));
    }

    let hub = state.board.clone();
    let view = blocking(move || {
        let view = hub.view(&home, &facility)?;
        if view.refreshed_at.is_some() {
            return Ok(view);
        }
        hub.refresh(&storage, &home)?;
        hub.view(&home, &facility)
    })
    .await?;
    Ok(Json(view))
}

/// `POST /status-board/rotation`: next, previous, select or toggle.
pub async fn control_board(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
    Json(command): Json<RotationCommand>,
) -> Result<Json<BoardView>> {
    let home = board_home(&state, query.funeral_home_id.as_deref())?;
    state.board.with_board(&home, |board| board.control(command))?;
    Ok(Json(
        state.board.view(&home, &state.config.board.facility_name)?,
    ))
}

// === Obituary ===

/// `GET /obituary/:id`: the public obituary of an active funeral.
pub async fn get_obituary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ObituaryView>> {
    let storage = state.storage.clone();
    let config = state.config.clone();
    let view = blocking(move || obituary::load_obituary(&storage, &id, &config.obituary)).await?;
    Ok(Json(view))
}

/// `POST /obituary/:id/condolences`: leave a condolence message.
pub async fn post_condolence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<CondolenceForm>,
) -> Result<(StatusCode, Json<CondolenceMessage>)> {
    let storage = state.storage.clone();
    let message = blocking(move || obituary::submit_condolence(&storage, &id, form)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::RoomOccupied {
                room: RoomNumber::new(1).unwrap()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::not_found("funeral", "f-1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::unauthorized("no").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::CheckoutRolledBack {
                reason: "x".to_string()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
