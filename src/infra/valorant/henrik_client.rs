use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::core::valorant::{AccountData, HenrikApi, HenrikEnvelope, MatchData, MmrData, ValorantError};

/// Henrik Valorant API client, rate limited to the basic key quota.
pub struct HenrikClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

fn api_err(e: impl std::fmt::Display) -> ValorantError {
    ValorantError::Api(e.to_string())
}

fn seg(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl HenrikClient {
    pub const BASE_URL: &'static str = "https://api.henrikdev.xyz";

    pub fn new(api_key: Option<String>) -> Result<Self, ValorantError> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ValorantError> {
        let mut headers = HeaderMap::new();
        headers.insert("User-Agent", HeaderValue::from_static("StudioBot/1.0"));
        if let Some(key) = api_key {
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&key).map_err(api_err)?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(api_err)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            limiter: RateLimiter::direct(Quota::per_minute(nonzero!(30_u32))),
        })
    }

    /// GET `path` and unwrap the `data` envelope. 404 means "no such thing".
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ValorantError> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::trace!("[HENRIK] GET {}", path);
        let res = self.client.get(&url).send().await.map_err(api_err)?;

        match res.status() {
            StatusCode::OK => {
                let envelope: HenrikEnvelope<T> = res.json().await.map_err(api_err)?;
                Ok(Some(envelope.data))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                tracing::warn!("[HENRIK] {} returned {}", path, status);
                Err(ValorantError::Api(format!("status {status} for {path}")))
            }
        }
    }
}

#[async_trait]
impl HenrikApi for HenrikClient {
    async fn account_by_riot_id(
        &self,
        name: &str,
        tag: &str,
    ) -> Result<Option<AccountData>, ValorantError> {
        self.get(&format!("/valorant/v2/account/{}/{}", seg(name), seg(tag)))
            .await
    }

    async fn account_by_puuid(&self, puuid: &str) -> Result<Option<AccountData>, ValorantError> {
        self.get(&format!("/valorant/v2/by-puuid/account/{}", seg(puuid)))
            .await
    }

    async fn competitive_mmr(
        &self,
        region: &str,
        name: &str,
        tag: &str,
    ) -> Result<Option<MmrData>, ValorantError> {
        self.get(&format!(
            "/valorant/v1/mmr/{}/{}/{}",
            seg(region),
            seg(name),
            seg(tag)
        ))
        .await
    }

    async fn recent_matches(
        &self,
        region: &str,
        puuid: &str,
        custom_only: bool,
    ) -> Result<Vec<MatchData>, ValorantError> {
        let mut path = format!("/valorant/v3/by-puuid/matches/{}/{}", seg(region), seg(puuid));
        if custom_only {
            path.push_str("?filter=custom");
        }
        Ok(self.get(&path).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> HenrikClient {
        HenrikClient::with_base_url(Some("HDEV-test".into()), server.base_url()).unwrap()
    }

    #[tokio::test]
    async fn account_lookup_sends_the_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/valorant/v2/account/Sova/NA1")
                    .header("Authorization", "HDEV-test");
                then.status(200).json_body(json!({
                    "status": 200,
                    "data": { "puuid": "abc", "name": "Sova", "tag": "NA1" }
                }));
            })
            .await;

        let account = client(&server)
            .account_by_riot_id("Sova", "NA1")
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(account.puuid, "abc");
        assert_eq!(account.name, "Sova");
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(seg("Sova Main"), "Sova%20Main");
        assert_eq!(seg("a/b#c"), "a%2Fb%23c");
    }

    #[tokio::test]
    async fn not_found_is_none_and_server_errors_are_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/valorant/v2/account/ghost/000");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/valorant/v1/mmr/");
                then.status(500);
            })
            .await;

        let client = client(&server);
        assert!(client.account_by_riot_id("ghost", "000").await.unwrap().is_none());
        assert!(matches!(
            client.competitive_mmr("na", "a", "b").await,
            Err(ValorantError::Api(_))
        ));
    }

    #[tokio::test]
    async fn custom_matches_use_the_filter() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/valorant/v3/by-puuid/matches/na/p-1")
                    .query_param("filter", "custom");
                then.status(200).json_body(json!({
                    "status": 200,
                    "data": [ { "metadata": { "matchid": "m1", "rounds_played": 13 } } ]
                }));
            })
            .await;

        let matches = client(&server).recent_matches("na", "p-1", true).await.unwrap();

        mock.assert_async().await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata.matchid, "m1");
    }
}
