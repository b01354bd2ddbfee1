//! StoreKit payment queue for macOS and iOS.

use std::collections::BTreeSet;
use std::sync::Weak;

use objc2::rc::Retained;
use objc2::runtime::{NSObject, NSObjectProtocol, ProtocolObject};
use objc2::{define_class, msg_send, AllocAnyThread, DefinedClass};
use objc2_foundation::{NSArray, NSBundle, NSDecimalNumber, NSError, NSSet, NSString};
use objc2_store_kit::{
  SKMutablePayment, SKPaymentQueue, SKPaymentTransaction, SKPaymentTransactionObserver,
  SKPaymentTransactionState, SKProduct, SKProductDiscount, SKProductDiscountPaymentMode,
  SKProductDiscountType, SKProductPeriodUnit, SKProductSubscriptionPeriod, SKProductsRequest,
  SKProductsRequestDelegate, SKProductsResponse, SKRequest, SKRequestDelegate,
};
use parking_lot::Mutex;

use crate::models::{DiscountType, PaymentMode, PeriodUnit, TransactionStatus};
use crate::native::*;
use crate::queue::{PaymentQueue, PaymentRequest, QueueDelegate, RequestFailure, RequestId};

type Delegate = Weak<dyn QueueDelegate<TransactionRef>>;

/// A StoreKit object handed between threads.
pub struct Shared<T>(Retained<T>);

// SAFETY: the payment queue, its transactions and store requests may be
// messaged from any thread.
unsafe impl<T> Send for Shared<T> {}
unsafe impl<T> Sync for Shared<T> {}

pub type TransactionRef = Shared<SKPaymentTransaction>;

/// An in-flight `SKProductsRequest`. StoreKit only holds its delegate weakly.
pub struct ProductsRequestRef {
  request: Retained<SKProductsRequest>,
  delegate: Retained<ProductsRequestDelegate>,
}

// SAFETY: see `Shared`.
unsafe impl Send for ProductsRequestRef {}

pub struct ObserverIvars {
  delegate: Delegate,
}

define_class!(
  // SAFETY: NSObject has no subclassing requirements and the class does not implement Drop.
  #[unsafe(super(NSObject))]
  #[name = "TauriIapTransactionObserver"]
  #[ivars = ObserverIvars]
  pub struct TransactionObserver;

  unsafe impl NSObjectProtocol for TransactionObserver {}

  unsafe impl SKPaymentTransactionObserver for TransactionObserver {
    #[unsafe(method(paymentQueue:updatedTransactions:))]
    fn updated_transactions(
      &self,
      _queue: &SKPaymentQueue,
      transactions: &NSArray<SKPaymentTransaction>,
    ) {
      log::debug!("paymentQueue updatedTransactions: {}", transactions.count());
      let Some(delegate) = self.ivars().delegate.upgrade() else {
        return;
      };
      delegate.transactions_updated(transactions.iter().map(native_transaction).collect());
    }

    #[unsafe(method(paymentQueue:removedTransactions:))]
    fn removed_transactions(
      &self,
      _queue: &SKPaymentQueue,
      transactions: &NSArray<SKPaymentTransaction>,
    ) {
      let Some(delegate) = self.ivars().delegate.upgrade() else {
        return;
      };
      let ids = transactions
        .iter()
        .filter_map(|transaction| unsafe { transaction.transactionIdentifier() })
        .map(|id| id.to_string())
        .collect();
      delegate.transactions_removed(ids);
    }

    #[unsafe(method(paymentQueue:restoreCompletedTransactionsFailedWithError:))]
    fn restore_failed(&self, _queue: &SKPaymentQueue, error: &NSError) {
      if let Some(delegate) = self.ivars().delegate.upgrade() {
        delegate.restore_failed(native_error(error));
      }
    }

    #[unsafe(method(paymentQueueRestoreCompletedTransactionsFinished:))]
    fn restore_finished(&self, _queue: &SKPaymentQueue) {
      if let Some(delegate) = self.ivars().delegate.upgrade() {
        delegate.restore_finished();
      }
    }
  }
);

impl TransactionObserver {
  fn new(delegate: Delegate) -> Retained<Self> {
    let this = Self::alloc().set_ivars(ObserverIvars { delegate });
    unsafe { msg_send![super(this), init] }
  }
}

pub struct RequestIvars {
  request: RequestId,
  delegate: Delegate,
}

define_class!(
  // SAFETY: NSObject has no subclassing requirements and the class does not implement Drop.
  #[unsafe(super(NSObject))]
  #[name = "TauriIapProductsRequestDelegate"]
  #[ivars = RequestIvars]
  pub struct ProductsRequestDelegate;

  impl ProductsRequestDelegate {
    #[unsafe(method(productsRequest:didFailWithError:))]
    fn products_request_failed(&self, _request: &SKProductsRequest, error: &NSError) {
      self.failed(RequestFailure::Delegate, error);
    }
  }

  unsafe impl NSObjectProtocol for ProductsRequestDelegate {}

  unsafe impl SKRequestDelegate for ProductsRequestDelegate {
    #[unsafe(method(request:didFailWithError:))]
    fn request_failed(&self, _request: &SKRequest, error: &NSError) {
      self.failed(RequestFailure::Request, error);
    }
  }

  unsafe impl SKProductsRequestDelegate for ProductsRequestDelegate {
    #[unsafe(method(productsRequest:didReceiveResponse:))]
    fn did_receive_response(&self, _request: &SKProductsRequest, response: &SKProductsResponse) {
      let ivars = self.ivars();
      let Some(delegate) = ivars.delegate.upgrade() else {
        return;
      };
      let response = unsafe {
        ProductsResponse {
          products: response.products().iter().map(|p| native_product(&p)).collect(),
          invalid_identifiers: response
            .invalidProductIdentifiers()
            .iter()
            .map(|id| id.to_string())
            .collect(),
        }
      };
      delegate.products_received(ivars.request, response);
    }
  }
);

impl ProductsRequestDelegate {
  fn new(request: RequestId, delegate: Delegate) -> Retained<Self> {
    let this = Self::alloc().set_ivars(RequestIvars { request, delegate });
    unsafe { msg_send![super(this), init] }
  }

  fn failed(&self, failure: RequestFailure, error: &NSError) {
    let ivars = self.ivars();
    log::debug!("product request #{} failed ({:?})", ivars.request, failure);
    if let Some(delegate) = ivars.delegate.upgrade() {
      delegate.products_request_failed(ivars.request, failure, native_error(error));
    }
  }
}

fn native_error(error: &NSError) -> NativeError {
  NativeError::new(
    error.domain().to_string(),
    error.code() as i64,
    error.localizedDescription().to_string(),
  )
}

fn count(value: usize) -> u32 {
  u32::try_from(value).unwrap_or(u32::MAX)
}

fn decimal_price(price: &NSDecimalNumber) -> Price {
  let text = price.stringValue().to_string();
  Price::parse(&text).unwrap_or_else(|| {
    log::warn!("unparsable price {}, falling back to floating point", text);
    Price::from_micros((price.doubleValue() * 1_000_000.0).round() as i64)
  })
}

fn period_unit(unit: SKProductPeriodUnit) -> Option<PeriodUnit> {
  match unit {
    SKProductPeriodUnit::Day => Some(PeriodUnit::Day),
    SKProductPeriodUnit::Week => Some(PeriodUnit::Week),
    SKProductPeriodUnit::Month => Some(PeriodUnit::Month),
    SKProductPeriodUnit::Year => Some(PeriodUnit::Year),
    _ => None,
  }
}

fn subscription_period(period: &SKProductSubscriptionPeriod) -> SubscriptionPeriod {
  unsafe {
    SubscriptionPeriod {
      number_of_units: count(period.numberOfUnits()),
      unit: period_unit(period.unit()),
    }
  }
}

fn native_discount(discount: &SKProductDiscount) -> NativeDiscount {
  unsafe {
    NativeDiscount {
      identifier: discount.identifier().map(|id| id.to_string()),
      discount_type: match discount.r#type() {
        SKProductDiscountType::Introductory => Some(DiscountType::Introductory),
        SKProductDiscountType::Subscription => Some(DiscountType::Subscription),
        _ => None,
      },
      price: decimal_price(&discount.price()),
      number_of_periods: count(discount.numberOfPeriods()),
      period: subscription_period(&discount.subscriptionPeriod()),
      payment_mode: match discount.paymentMode() {
        SKProductDiscountPaymentMode::PayAsYouGo => Some(PaymentMode::PayAsYouGo),
        SKProductDiscountPaymentMode::PayUpFront => Some(PaymentMode::UpFront),
        SKProductDiscountPaymentMode::FreeTrial => Some(PaymentMode::FreeTrial),
        _ => None,
      },
    }
  }
}

fn native_product(product: &SKProduct) -> NativeProduct {
  unsafe {
    let locale = product.priceLocale();
    NativeProduct {
      identifier: product.productIdentifier().to_string(),
      title: product.localizedTitle().to_string(),
      description: product.localizedDescription().to_string(),
      price: decimal_price(&product.price()),
      currency_code: locale.currencyCode().map(|code| code.to_string()),
      country_code: locale.countryCode().map(|code| code.to_string()),
      currency_symbol: Some(locale.currencySymbol().to_string()),
      introductory_price: product.introductoryPrice().map(|d| native_discount(&d)),
      discounts: product.discounts().iter().map(|d| native_discount(&d)).collect(),
      subscription_group: product.subscriptionGroupIdentifier().map(|g| g.to_string()),
      subscription_period: product.subscriptionPeriod().map(|p| subscription_period(&p)),
    }
  }
}

fn native_transaction(transaction: Retained<SKPaymentTransaction>) -> NativeTransaction<TransactionRef> {
  unsafe {
    let payment = transaction.payment();
    let status = match transaction.transactionState() {
      SKPaymentTransactionState::Purchased => TransactionStatus::Purchased,
      SKPaymentTransactionState::Failed => TransactionStatus::Failed,
      SKPaymentTransactionState::Restored => TransactionStatus::Restored,
      SKPaymentTransactionState::Deferred => TransactionStatus::Deferred,
      _ => TransactionStatus::Pending,
    };
    NativeTransaction {
      product_id: payment.productIdentifier().to_string(),
      transaction_id: transaction.transactionIdentifier().map(|id| id.to_string()),
      transaction_date: transaction.transactionDate().map(|date| date.timeIntervalSince1970()),
      status,
      error: transaction.error().map(|error| native_error(&error)),
      application_user_name: payment.applicationUsername().map(|name| name.to_string()),
      original_identifier: transaction
        .original()
        .and_then(|original| original.transactionIdentifier())
        .map(|id| id.to_string()),
      handle: Shared(transaction),
    }
  }
}

fn default_queue() -> Retained<SKPaymentQueue> {
  unsafe { SKPaymentQueue::defaultQueue() }
}

/// `SKPaymentQueue.defaultQueue` with this plugin's transaction observer.
#[derive(Default)]
pub struct StoreKitQueue {
  delegate: Mutex<Option<Delegate>>,
  observer: Mutex<Option<Shared<TransactionObserver>>>,
}

impl StoreKitQueue {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Drop for StoreKitQueue {
  fn drop(&mut self) {
    if let Some(observer) = self.observer.lock().take() {
      unsafe { default_queue().removeTransactionObserver(ProtocolObject::from_ref(&*observer.0)) };
    }
  }
}

impl PaymentQueue for StoreKitQueue {
  type Transaction = TransactionRef;
  type ProductsRequest = ProductsRequestRef;

  fn can_make_payments(&self) -> bool {
    unsafe { SKPaymentQueue::canMakePayments() }
  }

  fn storefront_country_code(&self) -> Option<String> {
    unsafe { default_queue().storefront() }.map(|storefront| unsafe { storefront.countryCode() }.to_string())
  }

  fn attach(&self, delegate: Delegate) {
    let observer = TransactionObserver::new(delegate.clone());
    unsafe { default_queue().addTransactionObserver(ProtocolObject::from_ref(&*observer)) };
    *self.delegate.lock() = Some(delegate);
    let previous = self.observer.lock().replace(Shared(observer));
    if let Some(previous) = previous {
      unsafe { default_queue().removeTransactionObserver(ProtocolObject::from_ref(&*previous.0)) };
    }
  }

  fn request_products(
    &self,
    request: RequestId,
    identifiers: &BTreeSet<String>,
  ) -> crate::Result<ProductsRequestRef> {
    let delegate = self
      .delegate
      .lock()
      .clone()
      .ok_or_else(|| std::io::Error::other("payment queue observer is not attached"))?;

    let identifiers: Vec<Retained<NSString>> =
      identifiers.iter().map(|id| NSString::from_str(id)).collect();
    let identifiers = NSSet::from_retained_slice(&identifiers);
    let products_delegate = ProductsRequestDelegate::new(request, delegate);
    let products_request = unsafe {
      SKProductsRequest::initWithProductIdentifiers(SKProductsRequest::alloc(), &identifiers)
    };
    unsafe {
      products_request.setDelegate(Some(ProtocolObject::from_ref(&*products_delegate)));
      products_request.start();
    }
    Ok(ProductsRequestRef {
      request: products_request,
      delegate: products_delegate,
    })
  }

  fn cancel_products_request(&self, request: ProductsRequestRef) {
    unsafe { request.request.cancel() };
  }

  fn release_products_request(&self, request: ProductsRequestRef) {
    // Still inside the delegate's callback; the enclosing autorelease pool
    // releases both objects after it returns.
    let ProductsRequestRef { request, delegate } = request;
    let _ = Retained::autorelease_ptr(request);
    let _ = Retained::autorelease_ptr(delegate);
  }

  fn add_payment(&self, payment: &PaymentRequest) {
    unsafe {
      let sk_payment = SKMutablePayment::new();
      sk_payment.setProductIdentifier(&NSString::from_str(&payment.product_id));
      sk_payment.setQuantity(payment.quantity as isize);
      if let Some(name) = &payment.application_user_name {
        sk_payment.setApplicationUsername(Some(&NSString::from_str(name)));
      }
      default_queue().addPayment(&sk_payment);
    }
  }

  fn restore_completed_transactions(&self, application_user_name: Option<&str>) {
    let queue = default_queue();
    unsafe {
      match application_user_name {
        Some(name) => {
          queue.restoreCompletedTransactionsWithApplicationUsername(Some(&NSString::from_str(name)))
        }
        None => queue.restoreCompletedTransactions(),
      }
    }
  }

  fn finish_transaction(&self, transaction: &TransactionRef) {
    unsafe { default_queue().finishTransaction(&transaction.0) };
  }

  fn app_store_receipt(&self) -> Option<Vec<u8>> {
    let path = unsafe { NSBundle::mainBundle().appStoreReceiptURL()?.path()? }.to_string();
    match std::fs::read(&path) {
      Ok(receipt) => Some(receipt),
      Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
      Err(error) => {
        log::debug!("couldn't read receipt data: {}", error);
        None
      }
    }
  }
}
