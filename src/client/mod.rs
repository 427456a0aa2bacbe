// This file is part of the terraform-provider-scaleway project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Minimal Scaleway REST client: authentication, retries and pagination.

use std::time::Duration;

use rand::{thread_rng, Rng};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

mod error;

pub use error::{InvalidField, NotFoundExt, ScalewayError};

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";

const AUTH_HEADER: &str = "X-Auth-Token";
const TOTAL_COUNT_HEADER: &str = "x-total-count";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before retry number `attempt` (0-based), with up to 20% jitter
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter = thread_rng().gen_range(0.0..=0.2);
        exp.mul_f64(1.0 + jitter).min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    pub secret_key: String,
    pub api_url: String,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

/// How a list endpoint paginates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// `per_page` query parameter, total in the `X-Total-Count` header (instance API)
    PerPage,
    /// `page_size` query parameter, total in the `total_count` body field
    PageSize,
}

#[derive(Clone)]
pub struct ScalewayClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ScalewayClient {
    pub fn new(config: ClientConfig) -> Result<Self, ScalewayError> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&config.secret_key).map_err(|_| ScalewayError::Auth {
            status: 0,
            message: "invalid secret key format".to_string(),
        })?;
        headers.insert(AUTH_HEADER, token);
        if let Ok(user_agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, user_agent);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            retry: config.retry,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ScalewayError> {
        self.get_query(path, &[]).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ScalewayError> {
        let (_, body) = self
            .send(Method::GET, path, query, None::<&()>)
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ScalewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (_, body) = self.send(Method::POST, path, &[], Some(body)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ScalewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (_, body) = self.send(Method::PATCH, path, &[], Some(body)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ScalewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (_, body) = self.send(Method::PUT, path, &[], Some(body)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ScalewayError> {
        self.delete_query(path, &[]).await
    }

    pub async fn delete_query(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(), ScalewayError> {
        self.send(Method::DELETE, path, query, None::<&()>).await?;
        Ok(())
    }

    /// Fetch every page of a list endpoint, collecting the items stored under `items_key`
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        items_key: &str,
        paging: Paging,
    ) -> Result<Vec<T>, ScalewayError> {
        let page_param = match paging {
            Paging::PerPage => "per_page",
            Paging::PageSize => "page_size",
        };
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut page_query = query.to_vec();
            page_query.push(("page", page.to_string()));
            page_query.push((page_param, PAGE_SIZE.to_string()));

            let (headers, body) = self
                .send(Method::GET, path, &page_query, None::<&()>)
                .await?;
            let mut body: serde_json::Value = serde_json::from_str(&body)?;

            let total_count = match paging {
                Paging::PerPage => headers
                    .get(TOTAL_COUNT_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok()),
                Paging::PageSize => body.get("total_count").and_then(|v| v.as_u64()),
            };
            let page_items: Vec<T> = match body.get_mut(items_key) {
                Some(value) => serde_json::from_value(value.take())?,
                None => Vec::new(),
            };

            let count = page_items.len();
            items.extend(page_items);

            match total_count {
                _ if count == 0 => break,
                Some(total) if items.len() as u64 >= total => break,
                None if count < PAGE_SIZE as usize => break,
                _ => page += 1,
            }
        }

        Ok(items)
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<(HeaderMap, String), ScalewayError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let result = self.send_once(method.clone(), &url, query, body).await;
            match result {
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(%method, %url, %err, ?delay, attempt, "retrying Scaleway API request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once<B>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<(HeaderMap, String), ScalewayError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, url, "Scaleway API request");
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        tracing::debug!(%method, url, status = status.as_u16(), "Scaleway API response");

        if status.is_success() {
            // Deletions and some actions answer with an empty body
            if text.is_empty() || status == StatusCode::NO_CONTENT {
                return Ok((headers, "null".to_owned()));
            }
            Ok((headers, text))
        } else {
            Err(ScalewayError::from_response(status.as_u16(), &text))
        }
    }
}

impl std::fmt::Debug for ScalewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalewayClient")
            .field("base_url", &self.base_url)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}
