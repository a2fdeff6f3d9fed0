use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use murmur_db::models::{BanRow, ReportRow};
use murmur_types::api::{CreateBanRequest, CreateReportRequest, UpdateReportRequest};
use murmur_types::events::RoomEvent;
use murmur_types::models::{Ban, Report, ReportStatus};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::session::Session;
use crate::state::{AppState, run_db};
use crate::validate::{self, MAX_EXPIRY_HOURS, REASON_MAX};

// -- Bans --

/// GET /rooms/{code}/bans
pub async fn list_bans(
    State(state): State<AppState>,
    Path(code): Path<String>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let rows = run_db(&state, move |db| db.list_active_bans(&room.id, Utc::now())).await?;
    let bans: Vec<Ban> = rows.iter().map(BanRow::to_ban).collect();
    Ok(Json(bans))
}

/// POST /rooms/{code}/bans
pub async fn create_ban(
    State(state): State<AppState>,
    Path(code): Path<String>,
    session: Session,
    Json(req): Json<CreateBanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let display_name = validate::display_name(&req.display_name)?;
    if display_name.eq_ignore_ascii_case(session.name()) {
        return Err(ApiError::validation("you cannot ban yourself"));
    }
    let reason = validate::optional_text("reason", req.reason.as_deref(), REASON_MAX)?;
    if let Some(h) = req.duration_hours {
        if h == 0 || h > MAX_EXPIRY_HOURS {
            return Err(ApiError::validation(format!(
                "duration_hours must be between 1 and {MAX_EXPIRY_HOURS}"
            )));
        }
    }

    let now = Utc::now();
    let row = BanRow {
        id: Uuid::new_v4().to_string(),
        room_id: room.id.clone(),
        display_name,
        reason,
        expires_at: req.duration_hours.map(|h| now + Duration::hours(i64::from(h))),
        created_at: now,
    };

    let ban = run_db(&state, move |db| db.upsert_ban(&row)).await?.to_ban();

    info!("Owner banned '{}' from room {} (until {:?})", ban.display_name, room.code, ban.expires_at);
    state.dispatcher.publish(
        session.0.sub,
        RoomEvent::UserBanned {
            display_name: ban.display_name.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(ban)))
}

/// DELETE /rooms/{code}/bans/{display_name}
pub async fn delete_ban(
    State(state): State<AppState>,
    Path((code, display_name)): Path<(String, String)>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let room_id = room.id.clone();
    let name = display_name.trim().to_string();
    if !run_db(&state, move |db| db.delete_ban(&room_id, &name)).await? {
        return Err(ApiError::NotFound("ban"));
    }

    info!("Owner lifted ban on '{}' in room {}", display_name.trim(), room.code);
    Ok(StatusCode::NO_CONTENT)
}

// -- Reports --

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
}

/// POST /rooms/{code}/reports: any member may flag content.
pub async fn create_report(
    State(state): State<AppState>,
    Path(code): Path<String>,
    session: Session,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;
    session.ensure_not_banned(&state, &room.id).await?;
    let reason = validate::text("reason", &req.reason, REASON_MAX)?;

    let row = ReportRow {
        id: Uuid::new_v4().to_string(),
        room_id: room.id.clone(),
        content_type: req.content_type.as_str().to_string(),
        content_id: req.content_id.to_string(),
        reason,
        status: ReportStatus::Pending.as_str().to_string(),
        reporter_name: session.name().to_string(),
        created_at: Utc::now(),
    };

    let content_type = req.content_type;
    let report = run_db(&state, move |db| {
        if !db.content_exists(&row.room_id, content_type, &row.content_id)? {
            return Ok(None);
        }
        db.insert_report(&row)?;
        Ok(Some(row.to_report()))
    })
    .await?
    .ok_or(ApiError::NotFound(content_type.as_str()))?;

    info!(
        "{} reported {} {} in room {}",
        session.name(),
        report.content_type.as_str(),
        report.content_id,
        room.code
    );
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /rooms/{code}/reports?status=pending
pub async fn list_reports(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ReportQuery>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let rows = run_db(&state, move |db| db.list_reports(&room.id, query.status)).await?;
    let reports: Vec<Report> = rows.iter().map(ReportRow::to_report).collect();
    Ok(Json(reports))
}

/// PATCH /rooms/{code}/reports/{report_id}
pub async fn update_report(
    State(state): State<AppState>,
    Path((code, report_id)): Path<(String, Uuid)>,
    session: Session,
    Json(req): Json<UpdateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let rid = report_id.to_string();
    let report = run_db(&state, move |db| db.update_report_status(&room.id, &rid, req.status))
        .await?
        .ok_or(ApiError::NotFound("report"))?
        .to_report();

    Ok(Json(report))
}
