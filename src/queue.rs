//! The seam between the store context and the platform payment queue.

use std::collections::BTreeSet;
use std::sync::Weak;

use crate::native::{NativeError, NativeTransaction, ProductsResponse};

/// Identifies one product-information request issued by a [`crate::Store`].
pub type RequestId = u64;

/// Which native callback reported a failed product query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFailure {
    /// The products delegate reported the failure.
    Delegate,
    /// The underlying store request reported the failure.
    Request,
}

/// A payment to submit to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub product_id: String,
    pub quantity: u32,
    pub application_user_name: Option<String>,
}

/// Receives the asynchronous callbacks of a [`PaymentQueue`].
///
/// Callbacks may arrive on any thread.
pub trait QueueDelegate<T>: Send + Sync {
    fn products_received(&self, request: RequestId, response: ProductsResponse);

    fn products_request_failed(&self, request: RequestId, failure: RequestFailure, error: NativeError);

    fn transactions_updated(&self, transactions: Vec<NativeTransaction<T>>);

    /// Transactions the platform dropped from its queue after they were finished.
    fn transactions_removed(&self, transaction_ids: Vec<String>);

    fn restore_failed(&self, error: NativeError);

    fn restore_finished(&self);
}

/// The platform payment queue and store-request subsystem.
///
/// Every call is fire-and-forget; outcomes arrive later through the attached
/// [`QueueDelegate`].
pub trait PaymentQueue: Send + Sync + 'static {
    /// Platform object needed to finish a transaction.
    type Transaction: Send + Sync + 'static;
    /// Platform object representing an in-flight product request.
    type ProductsRequest: Send + 'static;

    fn can_make_payments(&self) -> bool;

    fn storefront_country_code(&self) -> Option<String>;

    /// Starts delivering queue callbacks to `delegate`.
    fn attach(&self, delegate: Weak<dyn QueueDelegate<Self::Transaction>>);

    fn request_products(
        &self,
        request: RequestId,
        identifiers: &BTreeSet<String>,
    ) -> crate::Result<Self::ProductsRequest>;

    fn cancel_products_request(&self, request: Self::ProductsRequest);

    /// Disposes of a request whose outcome has been delivered. Called from
    /// inside that request's own delegate callback, so the platform object
    /// must stay alive until the callback has returned.
    fn release_products_request(&self, request: Self::ProductsRequest);

    fn add_payment(&self, payment: &PaymentRequest);

    fn restore_completed_transactions(&self, application_user_name: Option<&str>);

    fn finish_transaction(&self, transaction: &Self::Transaction);

    /// Raw bytes of the on-device App Store receipt, if there is one.
    fn app_store_receipt(&self) -> Option<Vec<u8>>;
}
