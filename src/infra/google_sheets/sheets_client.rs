// Read-only access to the Google Sheets values API. Used to seed the player
// table from the legacy roster spreadsheet.

use super::service_account::ServiceAccountAuth;
use anyhow::anyhow;
use reqwest::Client;
use serde::Deserialize;

const BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

pub struct GoogleSheetsClient {
    client: Client,
    auth: ServiceAccountAuth,
    base_url: String,
}

impl GoogleSheetsClient {
    pub fn new(auth: ServiceAccountAuth) -> Self {
        Self::with_base_url(auth, BASE_URL)
    }

    pub fn with_base_url(auth: ServiceAccountAuth, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: base_url.into(),
        }
    }

    /// Fetches a range such as `Players!A1:D` as rows of display strings.
    pub async fn read_range(&self, sheet_id: &str, range: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let token = self.auth.access_token().await?;
        let url = values_url(&self.base_url, sheet_id, range);
        tracing::debug!(sheet_id, range, "fetching sheet values");

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Google Sheets API error ({status}): {text}. Is the sheet shared with {}?",
                self.auth.client_email()
            ));
        }

        let body: ValueRange = response.json().await?;
        let rows = stringify_rows(body.values);
        tracing::info!(sheet_id, rows = rows.len(), "fetched sheet values");
        Ok(rows)
    }
}

fn values_url(base_url: &str, sheet_id: &str, range: &str) -> String {
    format!(
        "{}/v4/spreadsheets/{}/values/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(sheet_id),
        urlencoding::encode(range)
    )
}

fn stringify_rows(values: Vec<Vec<serde_json::Value>>) -> Vec<Vec<String>> {
    values
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn range_is_encoded_into_the_path() {
        assert_eq!(
            values_url("https://sheets.googleapis.com/", "abc123", "Players!A1:D"),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Players%21A1%3AD"
        );
    }

    #[test]
    fn cells_become_strings() {
        let body: ValueRange = serde_json::from_value(json!({
            "range": "Players!A1:D3",
            "values": [
                ["USER ID", "RIOT NAME", "RIOT TAG"],
                [123456789012345678u64, "Sova", "EUW", null]
            ]
        }))
        .unwrap();

        let rows = stringify_rows(body.values);
        assert_eq!(rows[0], vec!["USER ID", "RIOT NAME", "RIOT TAG"]);
        assert_eq!(rows[1], vec!["123456789012345678", "Sova", "EUW", ""]);
    }

    #[test]
    fn empty_range_has_no_rows() {
        let body: ValueRange = serde_json::from_value(json!({ "range": "A1:D" })).unwrap();
        assert!(stringify_rows(body.values).is_empty());
    }
}
