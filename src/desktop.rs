use std::collections::BTreeSet;
use std::sync::Weak;

use crate::queue::{PaymentQueue, PaymentRequest, QueueDelegate, RequestId};

const UNSUPPORTED: &str = "In-app purchases are not supported on this platform";

/// Payment queue for platforms without StoreKit. Payments are never
/// allowed, so the store refuses to initialize.
#[derive(Debug, Default)]
pub struct UnsupportedQueue;

impl UnsupportedQueue {
    pub fn new() -> Self {
        Self
    }
}

impl PaymentQueue for UnsupportedQueue {
    type Transaction = ();
    type ProductsRequest = ();

    fn can_make_payments(&self) -> bool {
        false
    }

    fn storefront_country_code(&self) -> Option<String> {
        None
    }

    fn attach(&self, _delegate: Weak<dyn QueueDelegate<()>>) {}

    fn request_products(
        &self,
        _request: RequestId,
        _identifiers: &BTreeSet<String>,
    ) -> crate::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Unsupported, UNSUPPORTED).into())
    }

    fn cancel_products_request(&self, _request: ()) {}

    fn release_products_request(&self, _request: ()) {}

    fn add_payment(&self, payment: &PaymentRequest) {
        log::debug!("{}: dropping payment for {}", UNSUPPORTED, payment.product_id);
    }

    fn restore_completed_transactions(&self, _application_user_name: Option<&str>) {
        log::debug!("{}: nothing to restore", UNSUPPORTED);
    }

    fn finish_transaction(&self, _transaction: &()) {}

    fn app_store_receipt(&self) -> Option<Vec<u8>> {
        None
    }
}
