use tauri::{
  plugin::{Builder, TauriPlugin},
  Manager, Runtime,
};

pub use models::*;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod apple;
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
mod desktop;
#[cfg(test)]
mod mock;

pub mod bridge;
mod cache;
mod commands;
mod config;
mod error;
mod events;
mod iap;
mod models;
pub mod native;
pub mod queue;
mod store;

pub use config::IapConfig;
pub use error::{Error, Result};
pub use events::{Event, EventKind, EventSink};
pub use iap::{Iap, NativeQueue};
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use apple::{ProductsRequestRef, Shared, StoreKitQueue, TransactionRef};
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub use desktop::UnsupportedQueue;
pub use store::Store;

/// Extensions to [`tauri::App`], [`tauri::AppHandle`] and [`tauri::Window`] to access the iap APIs.
pub trait IapExt<R: Runtime> {
  fn iap(&self) -> &Iap<R>;
}

impl<R: Runtime, T: Manager<R>> crate::IapExt<R> for T {
  fn iap(&self) -> &Iap<R> {
    self.state::<Iap<R>>().inner()
  }
}

/// Initializes the plugin. Settings are read from `plugins.iap` in the app
/// configuration.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<IapConfig>> {
  Builder::<R, Option<IapConfig>>::new("iap")
    .invoke_handler(tauri::generate_handler![
      commands::initialize,
      commands::can_make_payments,
      commands::country_code,
      commands::query_products,
      commands::restore_purchases,
      commands::request_purchase,
      commands::finish_transaction,
    ])
    .setup(|app, api| {
      let config = api.config().clone().unwrap_or_default();
      let iap = iap::init(app, config)?;
      app.manage(iap);
      Ok(())
    })
    .build()
}
