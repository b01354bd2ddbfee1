//! Records as reported by the platform payment queue, and their conversion
//! into the payloads delivered to the webview.

use crate::models::*;

const MICROS_PER_UNIT: i64 = 1_000_000;

/// Error domain of StoreKit's own failures.
pub const STORE_KIT_ERROR_DOMAIN: &str = "SKErrorDomain";

/// A decimal price held in micro units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Price {
    micros: i64,
}

impl Price {
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Parses a plain decimal string such as `"4.99"`.
    ///
    /// Digits past the sixth fractional place are rounded half-up.
    pub fn parse(decimal: &str) -> Option<Self> {
        let text = decimal.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }

        let mut micros: i64 = 0;
        for c in whole.chars() {
            let digit = i64::from(c.to_digit(10)?);
            micros = micros.checked_mul(10)?.checked_add(digit)?;
        }
        micros = micros.checked_mul(MICROS_PER_UNIT)?;

        let mut scale = MICROS_PER_UNIT / 10;
        let mut round_up = false;
        for (index, c) in fraction.chars().enumerate() {
            let digit = i64::from(c.to_digit(10)?);
            if index < 6 {
                micros = micros.checked_add(digit * scale)?;
                scale /= 10;
            } else if index == 6 {
                round_up = digit >= 5;
            }
        }
        if round_up {
            micros = micros.checked_add(1)?;
        }

        Some(Self {
            micros: if negative { -micros } else { micros },
        })
    }

    pub fn micros(&self) -> i64 {
        self.micros
    }

    pub fn as_f64(&self) -> f64 {
        self.micros as f64 / MICROS_PER_UNIT as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionPeriod {
    pub number_of_units: u32,
    pub unit: Option<PeriodUnit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeDiscount {
    pub identifier: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub price: Price,
    pub number_of_periods: u32,
    pub period: SubscriptionPeriod,
    pub payment_mode: Option<PaymentMode>,
}

impl NativeDiscount {
    /// Total length of the discount, in `period.unit`s.
    fn total_periods(&self) -> u32 {
        self.number_of_periods
            .saturating_mul(self.period.number_of_units)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeProduct {
    pub identifier: String,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub currency_code: Option<String>,
    pub country_code: Option<String>,
    pub currency_symbol: Option<String>,
    pub introductory_price: Option<NativeDiscount>,
    pub discounts: Vec<NativeDiscount>,
    pub subscription_group: Option<String>,
    pub subscription_period: Option<SubscriptionPeriod>,
}

/// Answer to a product-information request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductsResponse {
    pub products: Vec<NativeProduct>,
    pub invalid_identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub domain: String,
    pub code: i64,
    pub message: String,
}

impl NativeError {
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }

    /// Human readable description, using fixed texts for well-known StoreKit
    /// codes and the platform message otherwise.
    pub fn describe(&self) -> String {
        if self.domain != STORE_KIT_ERROR_DOMAIN {
            return self.message.clone();
        }
        match self.code {
            0 => "Unknown error".to_string(),
            1 => "Client is not allowed to issue the request".to_string(),
            2 => "User cancelled the request".to_string(),
            3 => "Purchase identifier was invalid".to_string(),
            4 => "This device is not allowed to make the payment".to_string(),
            _ => self.message.clone(),
        }
    }
}

/// A payment-queue transaction together with the platform handle needed to
/// finish it later.
#[derive(Debug, Clone)]
pub struct NativeTransaction<T> {
    pub handle: T,
    pub product_id: String,
    pub transaction_id: Option<String>,
    pub transaction_date: Option<f64>,
    pub status: TransactionStatus,
    pub error: Option<NativeError>,
    pub application_user_name: Option<String>,
    pub original_identifier: Option<String>,
}

impl<T> NativeTransaction<T> {
    pub fn to_payload(&self, receipt_data: Option<&str>) -> Transaction {
        Transaction {
            product_id: self.product_id.clone(),
            transaction_id: self.transaction_id.clone(),
            transaction_date: self.transaction_date,
            status: self.status,
            error: self.error.as_ref().map(NativeError::describe),
            application_user_name: self.application_user_name.clone(),
            original_identifier: self.original_identifier.clone(),
            receipt_data: receipt_data.map(str::to_string),
        }
    }
}

impl From<&NativeDiscount> for Discount {
    fn from(discount: &NativeDiscount) -> Self {
        Discount {
            id: discount.identifier.clone(),
            discount_type: discount.discount_type,
            price: discount.price.as_f64(),
            price_micros: discount.price.micros(),
            period: discount.total_periods(),
            period_unit: discount.period.unit,
            payment_mode: discount.payment_mode,
        }
    }
}

impl From<&NativeProduct> for Product {
    fn from(product: &NativeProduct) -> Self {
        let intro = product.introductory_price.as_ref();
        Product {
            id: product.identifier.clone(),
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price.as_f64(),
            price_micros: product.price.micros(),
            currency: product.currency_code.clone(),
            country_code: product.country_code.clone(),
            currency_symbol: product.currency_symbol.clone(),
            intro_price: intro.map(|d| d.price.as_f64()),
            intro_price_micros: intro.map(|d| d.price.micros()),
            intro_price_period: intro.map(NativeDiscount::total_periods),
            intro_price_period_unit: intro.and_then(|d| d.period.unit),
            intro_price_payment_mode: intro.and_then(|d| d.payment_mode),
            discounts: product.discounts.iter().map(Discount::from).collect(),
            group: product.subscription_group.clone(),
            billing_period: product.subscription_period.map(|p| p.number_of_units),
            billing_period_unit: product.subscription_period.and_then(|p| p.unit),
        }
    }
}
