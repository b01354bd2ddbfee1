use crate::models::{Exception, ExceptionType, Product, Transaction};

/// Kinds of events delivered to the webview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ProductsUpdated,
    TransactionsUpdated,
    RestoreCompleted,
    Exception,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ProductsUpdated => "plugin_iap:products-updated",
            EventKind::TransactionsUpdated => "plugin_iap:transactions-updated",
            EventKind::RestoreCompleted => "plugin_iap:restore-completed",
            EventKind::Exception => "plugin_iap:exception",
        }
    }

    /// Exception type reported when an event of this kind cannot be delivered.
    pub fn exception_type(&self) -> ExceptionType {
        match self {
            EventKind::ProductsUpdated => ExceptionType::QueryProducts,
            EventKind::TransactionsUpdated => ExceptionType::TransactionUpdated,
            EventKind::RestoreCompleted => ExceptionType::RestorePurchases,
            EventKind::Exception => ExceptionType::JsonParse,
        }
    }
}

/// One event with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ProductsUpdated(Vec<Product>),
    TransactionsUpdated(Vec<Transaction>),
    RestoreCompleted,
    Exception(Exception),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ProductsUpdated(_) => EventKind::ProductsUpdated,
            Event::TransactionsUpdated(_) => EventKind::TransactionsUpdated,
            Event::RestoreCompleted => EventKind::RestoreCompleted,
            Event::Exception(_) => EventKind::Exception,
        }
    }
}

/// Where the store delivers its asynchronous results.
pub trait EventSink: Send + Sync {
    fn on_products_updated(&self, products: &[Product]) -> crate::Result<()>;

    fn on_transactions_updated(&self, transactions: &[Transaction]) -> crate::Result<()>;

    fn on_restore_completed(&self) -> crate::Result<()>;

    fn on_exception(&self, exception: &Exception) -> crate::Result<()>;
}

/// Delivers `event`. A delivery failure is reported as an exception of the
/// matching type; a failing exception delivery is only logged.
pub(crate) fn dispatch(sink: &dyn EventSink, event: &Event) {
    let delivered = match event {
        Event::ProductsUpdated(products) => sink.on_products_updated(products),
        Event::TransactionsUpdated(transactions) => sink.on_transactions_updated(transactions),
        Event::RestoreCompleted => sink.on_restore_completed(),
        Event::Exception(exception) => sink.on_exception(exception),
    };
    let Err(error) = delivered else {
        return;
    };

    let kind = event.kind();
    if kind == EventKind::Exception {
        log::error!("failed to deliver exception {:?}: {}", event, error);
        return;
    }

    log::warn!("failed to deliver {}: {}", kind.name(), error);
    let exception = Exception::new(
        kind.exception_type(),
        crate::models::CODE_ENCODING_FAILED,
        format!("Failed to deliver {}: {}", kind.name(), error),
    );
    if let Err(error) = sink.on_exception(&exception) {
        log::error!("failed to deliver exception {:?}: {}", exception, error);
    }
}
