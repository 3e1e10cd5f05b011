//! Recent posts from the portal's X/Twitter account
//!
//! The feed is decorative: every failure is logged and reported as `None`.

use crate::config::TwitterConfig;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;

const TWEET_QUERY: &str = "tweet.fields=created_at,attachments\
    &expansions=attachments.media_keys&media.fields=preview_image_url,url";

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

pub struct TwitterService {
    client: reqwest::Client,
    config: TwitterConfig,
}

impl TwitterService {
    pub fn new(config: TwitterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("newsdesk")
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Raw API response for the account's recent tweets, or `None`
    pub async fn recent_tweets(&self) -> Option<serde_json::Value> {
        let Some(token) = self
            .config
            .bearer_token
            .as_deref()
            .filter(|t| !t.is_empty())
        else {
            tracing::warn!("Twitter bearer token not configured");
            return None;
        };
        match self.fetch(token).await {
            Ok(tweets) => Some(tweets),
            Err(e) => {
                tracing::warn!("Failed to fetch tweets: {:#}", e);
                None
            }
        }
    }

    async fn fetch(&self, token: &str) -> Result<serde_json::Value> {
        let base = self.config.api_base.trim_end_matches('/');
        let lookup: UserLookup = self
            .client
            .get(format!("{}/users/by/username/{}", base, self.config.username))
            .bearer_auth(token)
            .send()
            .await
            .context("User lookup request failed")?
            .error_for_status()
            .context("User lookup rejected")?
            .json()
            .await
            .context("Invalid user lookup response")?;
        let user_id = lookup
            .data
            .map(|d| d.id)
            .ok_or_else(|| anyhow!("Unknown account {}", self.config.username))?;

        self.client
            .get(format!("{}/users/{}/tweets?{}", base, user_id, TWEET_QUERY))
            .bearer_auth(token)
            .send()
            .await
            .context("Tweets request failed")?
            .error_for_status()
            .context("Tweets request rejected")?
            .json()
            .await
            .context("Invalid tweets response")
    }
}
