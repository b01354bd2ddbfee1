//! In-memory payment queue and recording event sink for tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::events::{Event, EventKind, EventSink};
use crate::models::*;
use crate::native::*;
use crate::queue::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    RequestProducts(RequestId, Vec<String>),
    CancelProducts(RequestId),
    ReleaseProducts(RequestId),
    AddPayment(PaymentRequest),
    Restore(Option<String>),
    Finish(String),
}

/// Stands in for a platform transaction; carries only its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockTransaction(pub Option<String>);

#[derive(Default)]
struct MockState {
    payments_disabled: bool,
    country: Option<String>,
    receipt: Mutex<Option<Vec<u8>>>,
    fail_next_request: AtomicBool,
    attached: AtomicUsize,
    on_attach: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    calls: Mutex<Vec<Call>>,
    delegate: Mutex<Option<Weak<dyn QueueDelegate<MockTransaction>>>>,
}

#[derive(Clone, Default)]
pub(crate) struct MockQueue {
    state: Arc<MockState>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            state: Arc::new(MockState {
                payments_disabled: true,
                ..MockState::default()
            }),
        }
    }

    pub fn with_country(self, country: &str) -> Self {
        Self {
            state: Arc::new(MockState {
                country: Some(country.to_string()),
                ..MockState::default()
            }),
        }
    }

    pub fn set_receipt(&self, receipt: Vec<u8>) {
        *self.state.receipt.lock() = Some(receipt);
    }

    pub fn fail_next_request(&self) {
        self.state.fail_next_request.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().clone()
    }

    /// Runs `hook` from inside `attach`, after the delegate is stored.
    pub fn on_attach(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.state.on_attach.lock() = Some(Box::new(hook));
    }

    pub fn attach_count(&self) -> usize {
        self.state.attached.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RequestId> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::RequestProducts(request, _) => Some(request),
            _ => None,
        })
    }

    pub fn finished(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Finish(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn delegate(&self) -> Arc<dyn QueueDelegate<MockTransaction>> {
        self.state
            .delegate
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("queue has no live delegate")
    }

    fn record(&self, call: Call) {
        self.state.calls.lock().push(call);
    }
}

impl PaymentQueue for MockQueue {
    type Transaction = MockTransaction;
    type ProductsRequest = RequestId;

    fn can_make_payments(&self) -> bool {
        !self.state.payments_disabled
    }

    fn storefront_country_code(&self) -> Option<String> {
        self.state.country.clone()
    }

    fn attach(&self, delegate: Weak<dyn QueueDelegate<MockTransaction>>) {
        self.state.attached.fetch_add(1, Ordering::SeqCst);
        *self.state.delegate.lock() = Some(delegate);
        if let Some(hook) = self.state.on_attach.lock().as_ref() {
            hook();
        }
    }

    fn request_products(
        &self,
        request: RequestId,
        identifiers: &BTreeSet<String>,
    ) -> crate::Result<RequestId> {
        if self.state.fail_next_request.swap(false, Ordering::SeqCst) {
            return Err(std::io::Error::other("store unavailable").into());
        }
        self.record(Call::RequestProducts(
            request,
            identifiers.iter().cloned().collect(),
        ));
        Ok(request)
    }

    fn cancel_products_request(&self, request: RequestId) {
        self.record(Call::CancelProducts(request));
    }

    fn release_products_request(&self, request: RequestId) {
        self.record(Call::ReleaseProducts(request));
    }

    fn add_payment(&self, payment: &PaymentRequest) {
        self.record(Call::AddPayment(payment.clone()));
    }

    fn restore_completed_transactions(&self, application_user_name: Option<&str>) {
        self.record(Call::Restore(application_user_name.map(str::to_string)));
    }

    fn finish_transaction(&self, transaction: &MockTransaction) {
        self.record(Call::Finish(transaction.0.clone().unwrap_or_default()));
    }

    fn app_store_receipt(&self) -> Option<Vec<u8>> {
        self.state.receipt.lock().clone()
    }
}

/// Records every delivered event; optionally refuses one kind of event.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
    attempts: Arc<AtomicUsize>,
    refuse: Option<EventKind>,
}

impl RecordingSink {
    pub fn failing(kind: EventKind) -> Self {
        Self {
            refuse: Some(kind),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Number of deliveries tried, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn exceptions(&self) -> Vec<Exception> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Exception(exception) => Some(exception),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) -> crate::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse == Some(event.kind()) {
            return Err(std::io::Error::other("sink refused event").into());
        }
        self.events.lock().push(event);
        Ok(())
    }
}

impl EventSink for RecordingSink {
    fn on_products_updated(&self, products: &[Product]) -> crate::Result<()> {
        self.record(Event::ProductsUpdated(products.to_vec()))
    }

    fn on_transactions_updated(&self, transactions: &[Transaction]) -> crate::Result<()> {
        self.record(Event::TransactionsUpdated(transactions.to_vec()))
    }

    fn on_restore_completed(&self) -> crate::Result<()> {
        self.record(Event::RestoreCompleted)
    }

    fn on_exception(&self, exception: &Exception) -> crate::Result<()> {
        self.record(Event::Exception(exception.clone()))
    }
}

pub(crate) fn product(identifier: &str, price: &str) -> NativeProduct {
    NativeProduct {
        identifier: identifier.to_string(),
        title: identifier.to_string(),
        description: String::new(),
        price: Price::parse(price).expect("valid price"),
        currency_code: Some("USD".to_string()),
        country_code: Some("US".to_string()),
        currency_symbol: Some("$".to_string()),
        introductory_price: None,
        discounts: vec![],
        subscription_group: None,
        subscription_period: None,
    }
}

pub(crate) fn transaction(
    transaction_id: Option<&str>,
    product_id: &str,
    status: TransactionStatus,
) -> NativeTransaction<MockTransaction> {
    let transaction_id = transaction_id.map(str::to_string);
    NativeTransaction {
        handle: MockTransaction(transaction_id.clone()),
        product_id: product_id.to_string(),
        transaction_id,
        transaction_date: Some(1_700_000_000.0),
        status,
        error: None,
        application_user_name: None,
        original_identifier: None,
    }
}
