//! The store context: product catalog, pending product request, transaction
//! cache, and the purchase/restore orchestration around a [`PaymentQueue`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use base64::Engine;
use parking_lot::Mutex;

use crate::cache::{Completion, PendingRequest, ProductCatalog, TransactionCache};
use crate::config::IapConfig;
use crate::events::{dispatch, Event, EventSink};
use crate::models::*;
use crate::native::{NativeError, NativeTransaction, ProductsResponse};
use crate::queue::{PaymentQueue, PaymentRequest, QueueDelegate, RequestFailure, RequestId};
use crate::{Error, Result};

/// Explicitly owned purchase context shared by command handlers and queue
/// callbacks.
pub struct Store<Q: PaymentQueue> {
    inner: Arc<Inner<Q>>,
}

impl<Q: PaymentQueue> Clone for Store<Q> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<Q: PaymentQueue> {
    queue: Q,
    sink: Box<dyn EventSink>,
    config: IapConfig,
    initialized: AtomicBool,
    attached: Mutex<bool>,
    catalog: Mutex<ProductCatalog>,
    pending: Mutex<PendingRequest<Q::ProductsRequest>>,
    transactions: Mutex<TransactionCache<Q::Transaction>>,
}

impl<Q: PaymentQueue> Store<Q> {
    pub fn new(queue: Q, sink: impl EventSink + 'static, config: IapConfig) -> Self {
        let transactions = TransactionCache::new(config.transaction_cache_capacity);
        Self {
            inner: Arc::new(Inner {
                queue,
                sink: Box::new(sink),
                config,
                initialized: AtomicBool::new(false),
                attached: Mutex::new(false),
                catalog: Mutex::new(ProductCatalog::default()),
                pending: Mutex::new(PendingRequest::default()),
                transactions: Mutex::new(transactions),
            }),
        }
    }

    pub fn config(&self) -> &IapConfig {
        &self.inner.config
    }

    pub fn can_make_payments(&self) -> bool {
        self.inner.queue.can_make_payments()
    }

    /// Country code of the current App Store storefront.
    pub fn country_code(&self) -> Option<String> {
        self.inner.queue.storefront_country_code()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Starts observing the payment queue. Returns `false` when payments are
    /// disabled on this device.
    pub fn initialize(&self) -> bool {
        if !self.inner.queue.can_make_payments() {
            log::warn!("payments are disabled on this device");
            return false;
        }
        let mut attached = self.inner.attached.lock();
        if !*attached {
            let delegate: Weak<dyn QueueDelegate<Q::Transaction>> = Arc::<Inner<Q>>::downgrade(&self.inner);
            self.inner.queue.attach(delegate);
            *attached = true;
            log::info!("payment queue observer attached");
        }
        // commands are accepted only once the observer is in place
        self.inner.initialized.store(true, Ordering::SeqCst);
        true
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Issues a product-information request, cancelling the one in flight.
    pub fn query_products(&self, identifiers: BTreeSet<String>) -> Result<()> {
        self.ensure_initialized()?;
        if identifiers.is_empty() {
            return Err(Error::NoProductIdentifiers);
        }

        let (request, replaced) = self.inner.pending.lock().begin();
        if let Some(replaced) = replaced {
            log::debug!("cancelling product request replaced by #{}", request);
            self.inner.queue.cancel_products_request(replaced);
        }

        log::debug!("product request #{} for {:?}", request, identifiers);
        match self.inner.queue.request_products(request, &identifiers) {
            Ok(handle) => {
                let stale = self.inner.pending.lock().started(request, handle);
                if let Some(stale) = stale {
                    self.inner.queue.cancel_products_request(stale);
                }
                Ok(())
            }
            Err(error) => {
                self.inner.pending.lock().complete(request);
                Err(error)
            }
        }
    }

    /// Submits a payment for a product seen in an earlier query.
    ///
    /// An unknown product is reported as a `Purchase` exception event and
    /// never reaches the payment queue.
    pub fn purchase(
        &self,
        product_id: &str,
        quantity: u32,
        application_user_name: Option<String>,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if quantity == 0 {
            return Err(Error::InvalidQuantity(quantity));
        }

        if !self.inner.catalog.lock().contains(product_id) {
            log::warn!("purchase of unknown product {}", product_id);
            self.inner.emit(Event::Exception(Exception::new(
                ExceptionType::Purchase,
                CODE_PRODUCT_NOT_FOUND,
                "Product does not exist.",
            )));
            return Ok(());
        }

        let payment = PaymentRequest {
            product_id: product_id.to_string(),
            quantity,
            application_user_name: application_user_name.filter(|name| !name.trim().is_empty()),
        };
        log::debug!("adding payment {:?}", payment);
        self.inner.queue.add_payment(&payment);
        Ok(())
    }

    /// Restores completed transactions, restricted to `application_user_name`
    /// unless it is empty.
    pub fn restore(&self, application_user_name: Option<&str>) -> Result<()> {
        self.ensure_initialized()?;
        let application_user_name = application_user_name.filter(|name| !name.trim().is_empty());
        log::debug!("restoring completed transactions for {:?}", application_user_name);
        self.inner
            .queue
            .restore_completed_transactions(application_user_name);
        Ok(())
    }

    /// Acknowledges a transaction previously relayed by a transactions update.
    /// Unknown identifiers are ignored.
    pub fn finish_transaction(&self, transaction_id: &str) -> Result<()> {
        self.ensure_initialized()?;
        let handle = self.inner.transactions.lock().remove(transaction_id);
        match handle {
            Some(handle) => {
                log::debug!("finishing transaction {}", transaction_id);
                self.inner.queue.finish_transaction(&handle);
            }
            None => log::warn!(
                "cannot finish unknown transaction {}; restore purchases first or check the id",
                transaction_id
            ),
        }
        Ok(())
    }
}

impl<Q: PaymentQueue> Inner<Q> {
    fn emit(&self, event: Event) {
        dispatch(self.sink.as_ref(), &event);
    }

    fn release(&self, handle: Option<Q::ProductsRequest>) {
        if let Some(handle) = handle {
            self.queue.release_products_request(handle);
        }
    }

    fn receipt_data(&self) -> Option<String> {
        self.queue
            .app_store_receipt()
            .map(|receipt| base64::engine::general_purpose::STANDARD.encode(receipt))
    }
}

impl<Q: PaymentQueue> QueueDelegate<Q::Transaction> for Inner<Q> {
    fn products_received(&self, request: RequestId, response: ProductsResponse) {
        let Completion::Current(handle) = self.pending.lock().complete(request) else {
            log::debug!("dropping response of replaced product request #{}", request);
            return;
        };
        for identifier in &response.invalid_identifiers {
            log::warn!("invalid product identifier: {}", identifier);
        }

        let products: Vec<Product> = response.products.iter().map(Product::from).collect();
        {
            let mut catalog = self.catalog.lock();
            for product in response.products {
                catalog.upsert(product);
            }
            log::debug!(
                "product request #{} returned {} products, {} cached",
                request,
                products.len(),
                catalog.len()
            );
        }
        self.emit(Event::ProductsUpdated(products));
        self.release(handle);
    }

    fn products_request_failed(&self, request: RequestId, failure: RequestFailure, error: NativeError) {
        let Completion::Current(handle) = self.pending.lock().complete(request) else {
            log::debug!("dropping failure of replaced product request #{}", request);
            return;
        };
        log::warn!("product request #{} failed: {}", request, error.message);
        let code = match failure {
            RequestFailure::Delegate => CODE_QUERY_DELEGATE_FAILED,
            RequestFailure::Request => CODE_QUERY_REQUEST_FAILED,
        };
        self.emit(Event::Exception(Exception::new(
            ExceptionType::QueryProducts,
            code,
            error.message,
        )));
        self.release(handle);
    }

    fn transactions_updated(&self, transactions: Vec<NativeTransaction<Q::Transaction>>) {
        let receipt = self.receipt_data();
        let payloads: Vec<Transaction> = transactions
            .iter()
            .map(|transaction| transaction.to_payload(receipt.as_deref()))
            .collect();

        let mut auto_finished = Vec::new();
        {
            let mut cache = self.transactions.lock();
            for transaction in transactions {
                let Some(transaction_id) = transaction.transaction_id else {
                    continue;
                };
                let settled = matches!(
                    transaction.status,
                    TransactionStatus::Purchased | TransactionStatus::Restored
                );
                if self.config.auto_finish_transactions && settled {
                    auto_finished.push((transaction_id, transaction.handle));
                    continue;
                }
                if let Some(evicted) = cache.upsert(transaction_id, transaction.handle) {
                    log::warn!(
                        "transaction cache full, evicted unfinished transaction {}",
                        evicted
                    );
                }
            }
            log::debug!("{} unfinished transactions cached", cache.len());
        }

        self.emit(Event::TransactionsUpdated(payloads));

        for (transaction_id, handle) in auto_finished {
            log::debug!("auto-finishing transaction {}", transaction_id);
            self.queue.finish_transaction(&handle);
        }
    }

    fn transactions_removed(&self, transaction_ids: Vec<String>) {
        let mut cache = self.transactions.lock();
        for transaction_id in transaction_ids {
            if cache.remove(&transaction_id).is_some() {
                log::debug!("transaction {} removed from the payment queue", transaction_id);
            }
        }
    }

    fn restore_failed(&self, error: NativeError) {
        log::warn!("restoring purchases failed: {}", error.message);
        self.emit(Event::Exception(Exception::new(
            ExceptionType::RestorePurchases,
            CODE_RESTORE_FAILED,
            error.message,
        )));
    }

    fn restore_finished(&self) {
        log::debug!("restoring purchases finished");
        self.emit(Event::RestoreCompleted);
    }
}
