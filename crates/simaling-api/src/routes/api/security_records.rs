//! Security guard check-in routes

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get},
};
use chrono::Utc;
use simaling_auth::{AdminOnly, Authorized, ResidentsOnly, SecurityOnly};
use simaling_db::utils::day_bounds;
use simaling_db::{NewSecurityRecord, SecurityRecord, SecurityRecordQuery};
use tracing::info;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::state::AppState;

use super::types::{
    CreateSecurityRecordRequest, DataResponse, DayQuery, MessageDataResponse, MessageResponse,
    Page, PageQuery, Paginated, SecurityRecordListQuery, date_range, non_empty, parse_date,
};
use super::users::validate_phone;

/// Maximum allowed block label length
const MAX_BLOCK_LENGTH: usize = 32;

/// Validate coordinates and render them with six decimals
fn format_coordinates(latitude: f64, longitude: f64) -> Result<(String, String), ApiError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ApiError::bad_request("Invalid latitude"));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ApiError::bad_request("Invalid longitude"));
    }
    Ok((format!("{:.6}", latitude), format!("{:.6}", longitude)))
}

/// GET /api/security-records
async fn list_records(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SecurityRecordListQuery>,
) -> Result<Json<Paginated<SecurityRecord>>, ApiError> {
    let page = Page::parse(query.page.as_deref(), query.limit.as_deref())?;
    let (start, end) = date_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    let (records, total) = state
        .db
        .list_security_records(SecurityRecordQuery {
            start,
            end,
            offset: page.offset(),
            limit: Some(page.limit),
            ..Default::default()
        })
        .await?;

    Ok(Json(Paginated::new(records, total, page)))
}

/// POST /api/security-records
async fn create_record(
    auth: Authorized<SecurityOnly>,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateSecurityRecordRequest>,
) -> Result<Json<MessageDataResponse<SecurityRecord>>, ApiError> {
    let block = request.block.trim();
    if block.is_empty() || block.len() > MAX_BLOCK_LENGTH {
        return Err(ApiError::bad_request("Invalid block"));
    }
    let (latitude, longitude) = format_coordinates(request.latitude, request.longitude)?;
    let phone_no = match non_empty(request.phone_no.as_deref()) {
        Some(phone_no) => {
            validate_phone(&phone_no)?;
            phone_no
        }
        None => auth.user.phone_no.clone(),
    };

    let record = state
        .db
        .insert_security_record(NewSecurityRecord {
            security_id: auth.user.id,
            block: block.to_string(),
            phone_no,
            longitude,
            latitude,
        })
        .await?;

    info!("Guard {} checked in at block {}", auth.user.id, record.block);
    Ok(Json(MessageDataResponse::new(
        "Security record created successfully",
        record,
    )))
}

/// GET /api/security-records/mine
async fn list_my_records(
    auth: Authorized<SecurityOnly>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Paginated<SecurityRecord>>, ApiError> {
    let page = Page::parse(query.page.as_deref(), query.limit.as_deref())?;

    let (records, total) = state
        .db
        .list_security_records(SecurityRecordQuery {
            security_id: Some(auth.user.id),
            offset: page.offset(),
            limit: Some(page.limit),
            ..Default::default()
        })
        .await?;

    Ok(Json(Paginated::new(records, total, page)))
}

/// GET /api/security-records/today
///
/// Today's check-ins recorded against the resident's phone number.
async fn list_today_for_resident(
    auth: Authorized<ResidentsOnly>,
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<SecurityRecord>>>, ApiError> {
    let (start, end) = day_bounds(Utc::now().date_naive());

    let (records, _) = state
        .db
        .list_security_records(SecurityRecordQuery {
            phone_no: Some(auth.user.phone_no.clone()),
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })
        .await?;

    Ok(Json(DataResponse { data: records }))
}

/// GET /api/security-records/day?date=YYYY-MM-DD
async fn list_by_day(
    _resident: Authorized<ResidentsOnly>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<DayQuery>,
) -> Result<Json<DataResponse<Vec<SecurityRecord>>>, ApiError> {
    let raw = query
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("date is required"))?;
    let (start, end) = day_bounds(parse_date(raw)?);

    let (records, _) = state
        .db
        .list_security_records(SecurityRecordQuery {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })
        .await?;

    Ok(Json(DataResponse { data: records }))
}

/// DELETE /api/security-records/{id}
async fn delete_record(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.db.delete_security_record(id).await? {
        return Err(ApiError::not_found("Security record not found"));
    }

    info!("Deleted security record {}", id);
    Ok(Json(MessageResponse::new("Security record deleted")))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/security-records",
            get(list_records).post(create_record),
        )
        .route("/api/security-records/mine", get(list_my_records))
        .route("/api/security-records/today", get(list_today_for_resident))
        .route("/api/security-records/day", get(list_by_day))
        .route("/api/security-records/{id}", delete(delete_record))
}
