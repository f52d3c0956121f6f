//! Funds ledger routes

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    routing::{get, put},
};
use bytes::Bytes;
use simaling_auth::{AdminOnly, Authorized, Members};
use simaling_db::{Funds, FundsQuery, FundsStatus, NewFunds, Role, UpdateFunds};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::state::AppState;
use crate::uploads::UploadStore;

use super::types::{
    DataResponse, FundsListQuery, MessageDataResponse, Page, PageQuery, Paginated,
    UpdateFundsRequest, date_range,
};

/// Rewrite the stored image path to a public URL
fn present(uploads: &UploadStore, mut funds: Funds) -> Funds {
    funds.image = funds.image.map(|path| uploads.public_url(&path));
    funds
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn validate_amount(amount: f64) -> Result<f64, ApiError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(ApiError::bad_request("Invalid amount"))
    }
}

fn validate_description(description: &str) -> Result<String, ApiError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ApiError::bad_request("Description cannot be empty"));
    }
    Ok(description.to_string())
}

/// Fields of the multipart create form
#[derive(Default)]
struct FundsForm {
    amount: Option<String>,
    is_income: Option<String>,
    description: Option<String>,
    image: Option<(String, Bytes)>,
}

impl FundsForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FundsForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await?;
                    if !file_name.is_empty() && !data.is_empty() {
                        form.image = Some((file_name, data));
                    }
                }
                "amount" => form.amount = Some(field.text().await?),
                "is_income" => form.is_income = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                other => debug!("Ignoring multipart field {}", other),
            }
        }

        Ok(form)
    }
}

// ==================== Funds Routes ====================

/// GET /api/funds
async fn list_funds(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<FundsListQuery>,
) -> Result<Json<Paginated<Funds>>, ApiError> {
    let page = Page::parse(query.page.as_deref(), query.limit.as_deref())?;
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<FundsStatus>())
        .transpose()
        .map_err(|_| ApiError::bad_request("Invalid status"))?;
    let is_income = query
        .is_income
        .as_deref()
        .map(|raw| parse_bool(raw).ok_or_else(|| ApiError::bad_request("Invalid is_income value")))
        .transpose()?;
    let (start, end) = date_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    let (funds, total) = state
        .db
        .list_funds(FundsQuery {
            user_id: None,
            status,
            is_income,
            start,
            end,
            offset: page.offset(),
            limit: page.limit,
        })
        .await?;

    let funds = funds
        .into_iter()
        .map(|f| present(&state.uploads, f))
        .collect();
    Ok(Json(Paginated::new(funds, total, page)))
}

/// POST /api/funds (multipart)
async fn create_funds(
    auth: Authorized<Members>,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageDataResponse<Funds>>, ApiError> {
    let form = FundsForm::read(multipart?).await?;

    let amount = form
        .amount
        .as_deref()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid amount"))
        .and_then(validate_amount)?;
    let is_income = form
        .is_income
        .as_deref()
        .and_then(parse_bool)
        .ok_or_else(|| ApiError::bad_request("Invalid is_income value"))?;
    let description = validate_description(form.description.as_deref().unwrap_or_default())?;

    let image = match &form.image {
        Some((file_name, data)) => Some(state.uploads.save(file_name, data).await?),
        None => None,
    };

    let result = state
        .db
        .insert_funds(NewFunds {
            user_id: auth.user.id,
            amount,
            image: image.clone(),
            description,
            is_income,
        })
        .await;

    let funds = match result {
        Ok(funds) => funds,
        Err(e) => {
            if let Some(path) = &image {
                state.uploads.remove(path).await;
            }
            return Err(e.into());
        }
    };

    info!("User {} submitted funds entry {}", auth.user.id, funds.id);
    Ok(Json(MessageDataResponse::new(
        "Funds created",
        present(&state.uploads, funds),
    )))
}

/// GET /api/funds/mine
async fn list_my_funds(
    auth: Authorized<Members>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Paginated<Funds>>, ApiError> {
    let page = Page::parse(query.page.as_deref(), query.limit.as_deref())?;

    let (funds, total) = state
        .db
        .list_funds(FundsQuery {
            user_id: Some(auth.user.id),
            offset: page.offset(),
            limit: page.limit,
            ..Default::default()
        })
        .await?;

    let funds = funds
        .into_iter()
        .map(|f| present(&state.uploads, f))
        .collect();
    Ok(Json(Paginated::new(funds, total, page)))
}

/// GET /api/funds/{id}
///
/// Residents only see their own entries; others' look absent.
async fn get_funds(
    auth: Authorized<Members>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<DataResponse<Funds>>, ApiError> {
    let funds = state
        .db
        .get_funds(id)
        .await?
        .filter(|f| auth.role == Role::Admin || f.user_id == auth.user.id)
        .ok_or_else(|| ApiError::not_found("Funds not found"))?;

    Ok(Json(DataResponse {
        data: present(&state.uploads, funds),
    }))
}

/// PUT /api/funds/{id}
async fn update_funds(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(request): JsonBody<UpdateFundsRequest>,
) -> Result<Json<MessageDataResponse<Funds>>, ApiError> {
    let update = UpdateFunds {
        amount: validate_amount(request.amount)?,
        description: validate_description(&request.description)?,
        is_income: request.is_income,
    };

    let funds = state
        .db
        .update_funds(id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Funds not found"))?;

    info!("Updated funds entry {}", id);
    Ok(Json(MessageDataResponse::new(
        "Funds updated",
        present(&state.uploads, funds),
    )))
}

/// DELETE /api/funds/{id}
async fn delete_funds(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageDataResponse<Funds>>, ApiError> {
    let funds = state
        .db
        .delete_funds(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Funds not found"))?;

    if let Some(path) = &funds.image {
        state.uploads.remove(path).await;
    }

    info!("Deleted funds entry {}", id);
    Ok(Json(MessageDataResponse::new(
        "Funds deleted",
        present(&state.uploads, funds),
    )))
}

async fn set_status(
    state: &AppState,
    id: i64,
    status: FundsStatus,
) -> Result<Funds, ApiError> {
    let funds = state
        .db
        .set_funds_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Funds not found"))?;

    info!("Funds entry {} marked {}", id, status.as_str());
    Ok(present(&state.uploads, funds))
}

/// PUT /api/funds/{id}/accept
async fn accept_funds(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageDataResponse<Funds>>, ApiError> {
    let funds = set_status(&state, id, FundsStatus::Accepted).await?;
    Ok(Json(MessageDataResponse::new("Funds accepted", funds)))
}

/// PUT /api/funds/{id}/reject
async fn reject_funds(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageDataResponse<Funds>>, ApiError> {
    let funds = set_status(&state, id, FundsStatus::Rejected).await?;
    Ok(Json(MessageDataResponse::new("Funds rejected", funds)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/funds", get(list_funds).post(create_funds))
        .route("/api/funds/mine", get(list_my_funds))
        .route(
            "/api/funds/{id}",
            get(get_funds).put(update_funds).delete(delete_funds),
        )
        .route("/api/funds/{id}/accept", put(accept_funds))
        .route("/api/funds/{id}/reject", put(reject_funds))
}
