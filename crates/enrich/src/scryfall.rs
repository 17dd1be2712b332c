//! Web fallback for card names, via Scryfall's arena-id lookup.

use std::time::Duration;

const BASE_URL: &str = "https://api.scryfall.com";
// External lookups are strictly best-effort; a slow upstream must not wedge
// a request handler for longer than this.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, serde::Deserialize)]
struct CardResponse {
    name: String,
    set: Option<String>,
}

pub struct Scryfall {
    client: reqwest::Client,
    base_url: String,
}

impl Scryfall {
    pub fn new() -> Scryfall {
        Scryfall::with_base_url(BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Scryfall {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .user_agent(concat!("mtga-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Scryfall { client, base_url }
    }

    /// Display name and set code for an arena card id. None covers both
    /// "unknown card" and any transport failure.
    pub async fn card_name(&self, grp_id: i64) -> Option<(String, Option<String>)> {
        let url = format!("{}/cards/arena/{}", self.base_url, grp_id);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(grp_id, error = %err, "card lookup failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(grp_id, status = %response.status(), "card not found upstream");
            return None;
        }
        match response.json::<CardResponse>().await {
            Ok(card) => Some((card.name, card.set)),
            Err(err) => {
                tracing::debug!(grp_id, error = %err, "undecodable card response");
                None
            }
        }
    }
}

impl Default for Scryfall {
    fn default() -> Self {
        Scryfall::new()
    }
}
