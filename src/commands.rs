use tauri::{AppHandle, command, Runtime};

use crate::models::*;
use crate::{IapExt, Result};

#[command]
pub(crate) async fn initialize<R: Runtime>(app: AppHandle<R>) -> Result<bool> {
    app.iap().initialize()
}

#[command]
pub(crate) async fn can_make_payments<R: Runtime>(app: AppHandle<R>) -> Result<bool> {
    app.iap().can_make_payments()
}

#[command]
pub(crate) async fn country_code<R: Runtime>(app: AppHandle<R>) -> Result<Option<String>> {
    app.iap().country_code()
}

#[command]
pub(crate) async fn query_products<R: Runtime>(
    app: AppHandle<R>,
    payload: QueryProductsRequest,
) -> Result<()> {
    app.iap().query_products(payload.identifiers)
}

#[command]
pub(crate) async fn restore_purchases<R: Runtime>(
    app: AppHandle<R>,
    payload: Option<RestorePurchasesRequest>,
) -> Result<()> {
    let payload = payload.unwrap_or_default();
    app.iap().restore_purchases(payload.application_user_name)
}

#[command]
pub(crate) async fn request_purchase<R: Runtime>(
    app: AppHandle<R>,
    payload: PurchaseRequest,
) -> Result<()> {
    app.iap().request_purchase(
        payload.product_id,
        payload.quantity,
        payload.application_user_name,
    )
}

#[command]
pub(crate) async fn finish_transaction<R: Runtime>(
    app: AppHandle<R>,
    payload: FinishTransactionRequest,
) -> Result<()> {
    app.iap().finish_transaction(payload.transaction_id)
}
