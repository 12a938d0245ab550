use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use sbal_common::is_wallet_address;
use sbal_referral::{
    build_referral_chain, build_team_tree, ReferrerCache, StorePackageLookup,
    StoreSponsorResolver, User, DEFAULT_MAX_DEPTH, DEFAULT_MAX_HOPS,
};

use crate::{
    response::{ApiResponse, AppError},
    GlobalState,
};

pub fn team_routes() -> Router<GlobalState> {
    Router::new()
        .route("/team/{wallet_address}", get(team))
        .route("/chain/{wallet_address}", get(chain))
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub depth: Option<u32>,
}

/// Multi-level downline of one wallet, as one snapshot read plus a pure
/// in-memory build.
async fn team(
    State(state): State<GlobalState>,
    Path(wallet_address): Path<String>,
    Query(query): Query<TeamQuery>,
) -> Result<ApiResponse, AppError> {
    if !is_wallet_address(&wallet_address) {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Valid wallet address is required"),
        ));
    }

    let user = User::find_by_wallet(&state.db, &wallet_address)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, anyhow!("User not found")))?;

    let max_depth = query.depth.unwrap_or(DEFAULT_MAX_DEPTH).max(1);
    let all_users = User::list_all(&state.db).await?;
    let team = build_team_tree(&all_users, user.user_id, max_depth);

    Ok(ApiResponse::new(StatusCode::OK)
        .message("Referral tree retrieved successfully")
        .data(json!({
            "user": {
                "userId": user.user_id,
                "username": user.username,
                "walletAddress": user.wallet_address,
            },
            "totalTeamSize": team.total_team_size,
            "levelStats": team.level_stats,
            "referralTree": team.tree,
        })))
}

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub hops: Option<u32>,
}

/// Upward sponsor chain of one wallet, replayed hop by hop from the cached
/// sponsor pointers. The resolution cache lives for this request only.
async fn chain(
    State(state): State<GlobalState>,
    Path(wallet_address): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<ApiResponse, AppError> {
    if !is_wallet_address(&wallet_address) {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Valid wallet address is required"),
        ));
    }

    if User::find_by_wallet(&state.db, &wallet_address).await?.is_none() {
        return Err(AppError::new(StatusCode::NOT_FOUND, anyhow!("User not found")));
    }

    let resolver = StoreSponsorResolver::new(state.db.clone());
    let packages = StorePackageLookup::new(state.db.clone());
    let mut cache = ReferrerCache::new();

    let max_hops = query.hops.unwrap_or(DEFAULT_MAX_HOPS).max(1);
    let chain = build_referral_chain(
        &wallet_address,
        &resolver,
        Some(&packages),
        &mut cache,
        max_hops,
    )
    .await;

    Ok(ApiResponse::new(StatusCode::OK)
        .message("Referral chain retrieved successfully")
        .data(json!({ "chain": chain })))
}
