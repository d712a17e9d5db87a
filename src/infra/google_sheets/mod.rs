// Google Sheets access (service account auth + values API)

mod service_account;
mod sheets_client;

pub use service_account::{ServiceAccountAuth, SHEETS_READONLY_SCOPE};
pub use sheets_client::GoogleSheetsClient;
