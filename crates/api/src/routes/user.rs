use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use sbal_common::is_wallet_address;
use sbal_database::{is_duplicate_key_error, DbError, MongoDbObject};
use sbal_referral::{User, ROOT_SPONSOR_ID};

use crate::{
    response::{ApiResponse, AppError},
    GlobalState,
};

/// Lost `userId` races are retried this many times before giving up.
const REGISTER_RETRIES: u32 = 3;

pub fn user_routes() -> Router<GlobalState> {
    Router::new()
        .route("/register", post(register))
        .route("/check", post(check_user))
        .route("/check-sponsor", post(check_sponsor))
        .route("/check-wallet/{wallet_address}", get(check_wallet))
        .route("/profile/{wallet_address}", get(profile))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub sponsor_id: Option<i64>,
    pub sponsor_address: Option<String>,
    pub wallet_address: String,
}

async fn register(
    State(state): State<GlobalState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse, AppError> {
    // 1. uniqueness of username and wallet
    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Username already taken. Please choose a different username."),
        ));
    }
    if User::find_by_wallet(&state.db, &payload.wallet_address)
        .await?
        .is_some()
    {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Wallet address already registered"),
        ));
    }

    // 2. resolve the sponsor, by wallet address when one is given, else by
    // numeric id; id 0 is the root and always valid
    let (sponsor_id, sponsor_wallet) = match payload.sponsor_address.as_deref() {
        Some(sponsor_address) if is_wallet_address(sponsor_address) => {
            let sponsor = User::find_by_wallet(&state.db, sponsor_address)
                .await?
                .ok_or_else(|| {
                    AppError::new(
                        StatusCode::BAD_REQUEST,
                        anyhow!("Invalid sponsor address. Sponsor does not exist."),
                    )
                })?;
            (sponsor.user_id, sponsor.wallet_address)
        }
        _ => {
            let sponsor_id = payload.sponsor_id.unwrap_or(ROOT_SPONSOR_ID);
            if sponsor_id == ROOT_SPONSOR_ID {
                (ROOT_SPONSOR_ID, String::new())
            } else {
                let sponsor = User::find_by_user_id(&state.db, sponsor_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::new(
                            StatusCode::BAD_REQUEST,
                            anyhow!("Invalid sponsor ID. Sponsor does not exist."),
                        )
                    })?;
                (sponsor.user_id, sponsor.wallet_address)
            }
        }
    };

    // 3. sequential id: two concurrent registrations can read the same max,
    // the unique index rejects the loser and we re-read
    let mut attempts = 0;
    let user = loop {
        let user_id = User::next_user_id(&state.db).await?;
        let user = User::new(
            user_id,
            payload.username.clone(),
            sponsor_id,
            sponsor_wallet.clone(),
            payload.wallet_address.clone(),
        );
        match user.clone().insert(&state.db).await {
            Ok(()) => break user,
            Err(DbError::Mongo(err))
                if is_duplicate_key_error(&err) && attempts < REGISTER_RETRIES =>
            {
                attempts += 1;
                tracing::debug!("userId collision on register, retry {}", attempts);
            }
            Err(err) => return Err(err.into()),
        }
    };

    Ok(ApiResponse::new(StatusCode::CREATED)
        .message("User registered successfully")
        .data(json!({
            "userId": user.user_id,
            "username": user.username,
            "sponsorId": user.sponsor_id,
            "sponsorWallet": user.sponsor_wallet,
            "walletAddress": user.wallet_address,
        })))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserRequest {
    pub wallet_address: String,
}

async fn check_user(
    State(state): State<GlobalState>,
    Json(payload): Json<CheckUserRequest>,
) -> Result<ApiResponse, AppError> {
    if payload.wallet_address.is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Wallet address is required"),
        ));
    }

    let user = User::find_by_wallet(&state.db, &payload.wallet_address).await?;
    match user {
        Some(user) => Ok(ApiResponse::new(StatusCode::OK)
            .field("exists", json!(true))
            .data(json!({
                "userId": user.user_id,
                "username": user.username,
                "sponsorId": user.sponsor_id,
                "sponsorWallet": user.sponsor_wallet,
                "walletAddress": user.wallet_address,
            }))),
        None => Ok(ApiResponse::new(StatusCode::OK).field("exists", json!(false))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSponsorRequest {
    pub sponsor_id: Option<i64>,
}

async fn check_sponsor(
    State(state): State<GlobalState>,
    Json(payload): Json<CheckSponsorRequest>,
) -> Result<ApiResponse, AppError> {
    let sponsor_id = payload.sponsor_id.ok_or_else(|| {
        AppError::new(StatusCode::BAD_REQUEST, anyhow!("Sponsor ID is required"))
    })?;

    if sponsor_id == ROOT_SPONSOR_ID {
        return Ok(ApiResponse::new(StatusCode::OK)
            .field("exists", json!(true))
            .message("Valid sponsor ID (root user)"));
    }

    let sponsor = User::find_by_user_id(&state.db, sponsor_id).await?;
    match sponsor {
        Some(_) => Ok(ApiResponse::new(StatusCode::OK)
            .field("exists", json!(true))
            .message("Valid sponsor ID")),
        None => Ok(ApiResponse::new(StatusCode::OK)
            .field("exists", json!(false))
            .message("Sponsor ID does not exist")),
    }
}

async fn check_wallet(
    State(state): State<GlobalState>,
    Path(wallet_address): Path<String>,
) -> Result<ApiResponse, AppError> {
    if !is_wallet_address(&wallet_address) {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Valid wallet address is required"),
        ));
    }

    let user = User::find_by_wallet(&state.db, &wallet_address).await?;
    match user {
        Some(user) => Ok(ApiResponse::new(StatusCode::OK)
            .field("exists", json!(true))
            .field("userId", json!(user.user_id))
            .message("Wallet address is registered")),
        None => Ok(ApiResponse::new(StatusCode::OK)
            .field("exists", json!(false))
            .message("Wallet address is not registered")),
    }
}

async fn profile(
    State(state): State<GlobalState>,
    Path(wallet_address): Path<String>,
) -> Result<ApiResponse, AppError> {
    if wallet_address.is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Wallet address is required"),
        ));
    }

    let user = User::find_by_wallet(&state.db, &wallet_address)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, anyhow!("User not found")))?;

    Ok(ApiResponse::new(StatusCode::OK).data(json!({
        "userId": user.user_id,
        "username": user.username,
        "sponsorId": user.sponsor_id,
        "sponsorWallet": user.sponsor_wallet,
        "walletAddress": user.wallet_address,
    })))
}
