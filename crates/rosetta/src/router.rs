//! The HTTP router binding the services to the Rosetta endpoints.

use crate::services::Services;
use crate::types::{
    AccountBalanceRequest, AccountBalanceResponse, AccountCoinsRequest, BlockRequest,
    BlockResponse, BlockTransactionRequest, BlockTransactionResponse, ConstructionCombineRequest,
    ConstructionCombineResponse, ConstructionDeriveRequest, ConstructionDeriveResponse,
    ConstructionHashRequest, ConstructionMetadataRequest, ConstructionMetadataResponse,
    ConstructionParseRequest, ConstructionParseResponse, ConstructionPayloadsRequest,
    ConstructionPayloadsResponse, ConstructionPreprocessRequest, ConstructionPreprocessResponse,
    ConstructionSubmitRequest, MempoolResponse, MempoolTransactionRequest,
    MempoolTransactionResponse, MetadataRequest, NetworkListResponse, NetworkOptionsResponse,
    NetworkRequest, NetworkStatusResponse, TransactionIdentifierResponse,
};
use crate::ApiResult;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;

/// Builds the Rosetta API router over the shared service state.
pub fn router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/network/list", post(network_list))
        .route("/network/options", post(network_options))
        .route("/network/status", post(network_status))
        .route("/block", post(block))
        .route("/block/transaction", post(block_transaction))
        .route("/mempool", post(mempool))
        .route("/mempool/transaction", post(mempool_transaction))
        .route("/account/balance", post(account_balance))
        .route("/account/coins", post(account_coins))
        .route("/construction/derive", post(construction_derive))
        .route("/construction/preprocess", post(construction_preprocess))
        .route("/construction/metadata", post(construction_metadata))
        .route("/construction/payloads", post(construction_payloads))
        .route("/construction/parse", post(construction_parse))
        .route("/construction/combine", post(construction_combine))
        .route("/construction/hash", post(construction_hash))
        .route("/construction/submit", post(construction_submit))
        .with_state(services)
}

async fn network_list(
    State(svc): State<Arc<Services>>,
    Json(_request): Json<MetadataRequest>,
) -> Json<NetworkListResponse> {
    Json(svc.network_list())
}

async fn network_options(
    State(svc): State<Arc<Services>>,
    Json(_request): Json<NetworkRequest>,
) -> Json<NetworkOptionsResponse> {
    Json(svc.network_options())
}

async fn network_status(
    State(svc): State<Arc<Services>>,
    Json(request): Json<NetworkRequest>,
) -> ApiResult<Json<NetworkStatusResponse>> {
    svc.network_status(&request).map(Json)
}

async fn block(
    State(svc): State<Arc<Services>>,
    Json(request): Json<BlockRequest>,
) -> ApiResult<Json<BlockResponse>> {
    svc.block(&request).map(Json)
}

async fn block_transaction(
    State(svc): State<Arc<Services>>,
    Json(request): Json<BlockTransactionRequest>,
) -> ApiResult<Json<BlockTransactionResponse>> {
    svc.block_transaction(&request).map(Json)
}

async fn mempool(
    State(svc): State<Arc<Services>>,
    Json(_request): Json<NetworkRequest>,
) -> ApiResult<Json<MempoolResponse>> {
    svc.mempool().await.map(Json)
}

async fn mempool_transaction(
    State(svc): State<Arc<Services>>,
    Json(request): Json<MempoolTransactionRequest>,
) -> ApiResult<Json<MempoolTransactionResponse>> {
    svc.mempool_transaction(&request).await.map(Json)
}

async fn account_balance(
    State(svc): State<Arc<Services>>,
    Json(request): Json<AccountBalanceRequest>,
) -> ApiResult<Json<AccountBalanceResponse>> {
    svc.account_balance(&request).map(Json)
}

async fn account_coins(
    State(svc): State<Arc<Services>>,
    Json(request): Json<AccountCoinsRequest>,
) -> ApiResult<Json<()>> {
    svc.account_coins(&request).map(Json)
}

async fn construction_derive(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionDeriveRequest>,
) -> ApiResult<Json<ConstructionDeriveResponse>> {
    svc.construction_derive(&request).map(Json)
}

async fn construction_preprocess(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionPreprocessRequest>,
) -> ApiResult<Json<ConstructionPreprocessResponse>> {
    svc.construction_preprocess(&request).map(Json)
}

async fn construction_metadata(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionMetadataRequest>,
) -> ApiResult<Json<ConstructionMetadataResponse>> {
    svc.construction_metadata(&request).await.map(Json)
}

async fn construction_payloads(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionPayloadsRequest>,
) -> ApiResult<Json<ConstructionPayloadsResponse>> {
    svc.construction_payloads(&request).map(Json)
}

async fn construction_parse(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionParseRequest>,
) -> ApiResult<Json<ConstructionParseResponse>> {
    svc.construction_parse(&request).map(Json)
}

async fn construction_combine(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionCombineRequest>,
) -> ApiResult<Json<ConstructionCombineResponse>> {
    svc.construction_combine(&request).map(Json)
}

async fn construction_hash(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionHashRequest>,
) -> ApiResult<Json<TransactionIdentifierResponse>> {
    svc.construction_hash(&request).map(Json)
}

async fn construction_submit(
    State(svc): State<Arc<Services>>,
    Json(request): Json<ConstructionSubmitRequest>,
) -> ApiResult<Json<TransactionIdentifierResponse>> {
    svc.construction_submit(&request).await.map(Json)
}
