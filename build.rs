const COMMANDS: &[&str] = &[
  "initialize",
  "can_make_payments",
  "country_code",
  "query_products",
  "restore_purchases",
  "request_purchase",
  "finish_transaction",
];

fn main() {
  tauri_plugin::Builder::new(COMMANDS).build();
}
