use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use sbal_database::MongoDbObject;
use sbal_referral::User;

use crate::{
    response::{ApiResponse, AppError},
    GlobalState,
};

pub fn package_routes() -> Router<GlobalState> {
    Router::new()
        .route("/package/purchase", post(add_purchased_package))
        .route("/packages/{wallet_address}", get(get_purchased_packages))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub wallet_address: Option<String>,
    pub package_id: Option<i64>,
    pub package_name: Option<String>,
    pub price: Option<String>,
    pub transaction_hash: Option<String>,
}

async fn add_purchased_package(
    State(state): State<GlobalState>,
    Json(payload): Json<PurchaseRequest>,
) -> Result<ApiResponse, AppError> {
    let (wallet_address, package_id, package_name, price, transaction_hash) = match (
        payload.wallet_address,
        payload.package_id,
        payload.package_name,
        payload.price,
        payload.transaction_hash,
    ) {
        (Some(w), Some(id), Some(name), Some(price), Some(hash))
            if !w.is_empty() && !name.is_empty() && !price.is_empty() && !hash.is_empty() =>
        {
            (w, id, name, price, hash)
        }
        _ => {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                anyhow!("Missing required fields"),
            ))
        }
    };

    let mut user = User::find_by_wallet(&state.db, &wallet_address)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, anyhow!("User not found")))?;

    user.add_purchased_package(package_id, package_name, price, transaction_hash)
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, anyhow!(err)))?;
    user.update(&state.db).await?;

    Ok(ApiResponse::new(StatusCode::OK)
        .message("Package added successfully")
        .data(json!({ "purchasedPackages": user.purchased_packages })))
}

async fn get_purchased_packages(
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

    Ok(ApiResponse::new(StatusCode::OK)
        .message("Purchased packages retrieved successfully")
        .data(json!({
            "userId": user.user_id,
            "username": user.username,
            "purchasedPackages": user.purchased_packages,
        })))
}
