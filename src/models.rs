use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryProductsRequest {
    pub identifiers: ProductIdentifiers,
}

/// Product identifiers as sent by the webview: either a list or a single
/// comma-separated string.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProductIdentifiers {
    List(Vec<String>),
    Joined(String),
}

impl ProductIdentifiers {
    /// Trimmed, de-duplicated, non-empty identifiers.
    pub fn into_set(self) -> BTreeSet<String> {
        let raw: Vec<String> = match self {
            ProductIdentifiers::List(ids) => ids,
            ProductIdentifiers::Joined(joined) => {
                joined.split(',').map(str::to_string).collect()
            }
        };
        raw.into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePurchasesRequest {
    #[serde(default)]
    pub application_user_name: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub application_user_name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishTransactionRequest {
    pub transaction_id: String,
}

/// Unit of a subscription or discount period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum PaymentMode {
    /// Pay at the beginning of each billing period.
    PayAsYouGo,
    /// Pay the whole discounted amount up front.
    UpFront,
    FreeTrial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DiscountType {
    Introductory,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub discount_type: Option<DiscountType>,
    pub price: f64,
    pub price_micros: i64,
    pub period: u32,
    pub period_unit: Option<PeriodUnit>,
    pub payment_mode: Option<PaymentMode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub price_micros: i64,
    pub currency: Option<String>,
    pub country_code: Option<String>,
    pub currency_symbol: Option<String>,
    pub intro_price: Option<f64>,
    pub intro_price_micros: Option<i64>,
    pub intro_price_period: Option<u32>,
    pub intro_price_period_unit: Option<PeriodUnit>,
    pub intro_price_payment_mode: Option<PaymentMode>,
    pub discounts: Vec<Discount>,
    pub group: Option<String>,
    pub billing_period: Option<u32>,
    pub billing_period_unit: Option<PeriodUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending = 0,
    Purchased = 1,
    Failed = 2,
    Restored = 3,
    Deferred = 4,
}

impl Serialize for TransactionStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        match value {
            0 => Ok(TransactionStatus::Pending),
            1 => Ok(TransactionStatus::Purchased),
            2 => Ok(TransactionStatus::Failed),
            3 => Ok(TransactionStatus::Restored),
            4 => Ok(TransactionStatus::Deferred),
            _ => Err(serde::de::Error::custom(format!(
                "Invalid transaction status: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub product_id: String,
    pub transaction_id: Option<String>,
    /// Seconds since the Unix epoch.
    pub transaction_date: Option<f64>,
    pub status: TransactionStatus,
    pub error: Option<String>,
    pub application_user_name: Option<String>,
    pub original_identifier: Option<String>,
    /// Base64 encoded App Store receipt.
    pub receipt_data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ExceptionType {
    QueryProducts,
    RestorePurchases,
    Purchase,
    TransactionUpdated,
    JsonParse,
}

/// Payload could not be encoded or decoded.
pub const CODE_ENCODING_FAILED: i32 = -1;
/// `productsRequest:didFailWithError:` on the products delegate.
pub const CODE_QUERY_DELEGATE_FAILED: i32 = 1;
/// `request:didFailWithError:` on the underlying store request.
pub const CODE_QUERY_REQUEST_FAILED: i32 = 2;
pub const CODE_RESTORE_FAILED: i32 = 3;
pub const CODE_PRODUCT_NOT_FOUND: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExceptionPayload {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Exception {
    #[serde(rename = "type")]
    pub exception_type: ExceptionType,
    pub payload: ExceptionPayload,
}

impl Exception {
    pub fn new(exception_type: ExceptionType, code: i32, message: impl Into<String>) -> Self {
        Self {
            exception_type,
            payload: ExceptionPayload {
                code,
                message: message.into(),
            },
        }
    }
}
