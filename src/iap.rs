use std::marker::PhantomData;

use tauri::{AppHandle, Emitter, Runtime};

use crate::config::IapConfig;
use crate::events::{EventKind, EventSink};
use crate::models::*;
use crate::store::Store;

/// The payment queue of the target platform.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub type NativeQueue = crate::apple::StoreKitQueue;
/// The payment queue of the target platform.
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub type NativeQueue = crate::desktop::UnsupportedQueue;

pub fn init<R: Runtime>(app: &AppHandle<R>, config: IapConfig) -> crate::Result<Iap<R>> {
  log::debug!("iap plugin configured with {:?}", config);
  let sink = TauriEmitter { app: app.clone() };
  Ok(Iap {
    store: Store::new(NativeQueue::new(), sink, config),
    _runtime: PhantomData,
  })
}

/// Emits store events on the app handle under their `plugin_iap:` names.
struct TauriEmitter<R: Runtime> {
  app: AppHandle<R>,
}

impl<R: Runtime> EventSink for TauriEmitter<R> {
  fn on_products_updated(&self, products: &[Product]) -> crate::Result<()> {
    self
      .app
      .emit(EventKind::ProductsUpdated.name(), products)
      .map_err(Into::into)
  }

  fn on_transactions_updated(&self, transactions: &[Transaction]) -> crate::Result<()> {
    self
      .app
      .emit(EventKind::TransactionsUpdated.name(), transactions)
      .map_err(Into::into)
  }

  fn on_restore_completed(&self) -> crate::Result<()> {
    self
      .app
      .emit(EventKind::RestoreCompleted.name(), ())
      .map_err(Into::into)
  }

  fn on_exception(&self, exception: &Exception) -> crate::Result<()> {
    self
      .app
      .emit(EventKind::Exception.name(), exception)
      .map_err(Into::into)
  }
}

/// Access to the iap APIs.
pub struct Iap<R: Runtime> {
  store: Store<NativeQueue>,
  _runtime: PhantomData<fn() -> R>,
}

impl<R: Runtime> Iap<R> {
  /// Starts observing the payment queue. Returns `false` when the device
  /// cannot make payments.
  pub fn initialize(&self) -> crate::Result<bool> {
    Ok(self.store.initialize())
  }

  pub fn can_make_payments(&self) -> crate::Result<bool> {
    Ok(self.store.can_make_payments())
  }

  pub fn country_code(&self) -> crate::Result<Option<String>> {
    Ok(self.store.country_code())
  }

  pub fn query_products(&self, identifiers: ProductIdentifiers) -> crate::Result<()> {
    self.store.query_products(identifiers.into_set())
  }

  pub fn restore_purchases(&self, application_user_name: Option<String>) -> crate::Result<()> {
    self.store.restore(application_user_name.as_deref())
  }

  pub fn request_purchase(
    &self,
    product_id: String,
    quantity: u32,
    application_user_name: Option<String>,
  ) -> crate::Result<()> {
    self
      .store
      .purchase(&product_id, quantity, application_user_name)
  }

  pub fn finish_transaction(&self, transaction_id: String) -> crate::Result<()> {
    self.store.finish_transaction(&transaction_id)
  }
}
