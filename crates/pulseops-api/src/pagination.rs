//! Pagination walker
//!
//! The service paginates two different ways: Pulse collections use a
//! continuation token (`page_size`/`page_token`, `next_page_token` in the
//! body), while classic REST collections use numbered pages
//! (`pageSize`/`pageNumber` with a `pagination.totalAvailable` hint, and a
//! single-object quirk when a page holds exactly one item). Both schemes sit
//! behind one walker so callers just get the full collection.
//!
//! A walk is finite and not restartable; walking again re-issues requests.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;
use crate::session::Session;

/// A walk aborted partway; carries how many items were already retrieved so
/// callers can decide whether partial results are usable.
#[derive(Debug, Error)]
#[error("collection fetch aborted after {retrieved} items: {source}")]
pub struct FetchError {
    /// Items successfully retrieved before the failing page
    pub retrieved: usize,
    #[source]
    pub source: ApiError,
}

/// How a collection endpoint paginates
#[derive(Debug, Clone, Copy)]
pub enum PageScheme {
    /// Continuation-token pagination; items live in an array under `items_key`
    Token { items_key: &'static str },
    /// Numbered pagination; items live under `group_key.item_key`
    Numbered {
        group_key: &'static str,
        item_key: &'static str,
    },
}

/// All items of one walked collection, with the first page's count hint
#[derive(Debug, Default)]
pub struct Walk {
    pub items: Vec<Value>,
    /// Total-count hint from the first page; approximate on some endpoints
    pub total_hint: Option<u64>,
}

/// Cursor-driven fetch-all for any collection endpoint
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    /// Requested page size; the service may return fewer
    pub page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Paginator { page_size: 100 }
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Paginator { page_size }
    }

    /// Fetch every page of a collection, following cursors until the
    /// service reports no more pages.
    pub async fn fetch_all(
        &self,
        session: &Session,
        url: &str,
        scheme: PageScheme,
        extra_query: &[(&str, String)],
    ) -> Result<Walk, FetchError> {
        match scheme {
            PageScheme::Token { items_key } => {
                self.walk_token(session, url, items_key, extra_query).await
            }
            PageScheme::Numbered {
                group_key,
                item_key,
            } => {
                self.walk_numbered(session, url, group_key, item_key, extra_query)
                    .await
            }
        }
    }

    /// Fetch every page and deserialize each item.
    ///
    /// An item that does not match `T` aborts the walk like a failed page
    /// would, with the count of items already converted.
    pub async fn fetch_all_as<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: &str,
        scheme: PageScheme,
        extra_query: &[(&str, String)],
    ) -> Result<Vec<T>, FetchError> {
        let walk = self.fetch_all(session, url, scheme, extra_query).await?;
        let mut out = Vec::with_capacity(walk.items.len());
        for item in walk.items {
            match serde_json::from_value(item) {
                Ok(typed) => out.push(typed),
                Err(e) => {
                    return Err(FetchError {
                        retrieved: out.len(),
                        source: ApiError::Serialization(e),
                    })
                }
            }
        }
        Ok(out)
    }

    async fn walk_token(
        &self,
        session: &Session,
        url: &str,
        items_key: &str,
        extra_query: &[(&str, String)],
    ) -> Result<Walk, FetchError> {
        let mut walk = Walk::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> =
                vec![("page_size", self.page_size.to_string())];
            query.extend(extra_query.iter().cloned());
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }

            let body: Value = session.get(url, &query).await.map_err(|source| FetchError {
                retrieved: walk.items.len(),
                source,
            })?;

            if walk.total_hint.is_none() {
                walk.total_hint = lenient_u64(&body["total_available"]);
            }

            let items = body
                .get(items_key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let got = items.len();
            walk.items.extend(items);
            debug!("walked page of {got} items from {url}");

            page_token = body
                .get("next_page_token")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);

            if page_token.is_none() || got == 0 {
                return Ok(walk);
            }
        }
    }

    async fn walk_numbered(
        &self,
        session: &Session,
        url: &str,
        group_key: &str,
        item_key: &str,
        extra_query: &[(&str, String)],
    ) -> Result<Walk, FetchError> {
        let mut walk = Walk::default();
        let mut page_number = 1u64;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("pageSize", self.page_size.to_string()),
                ("pageNumber", page_number.to_string()),
            ];
            query.extend(extra_query.iter().cloned());

            let body: Value = session.get(url, &query).await.map_err(|source| FetchError {
                retrieved: walk.items.len(),
                source,
            })?;

            // A one-item page comes back as a bare object, not an array
            let items = match body.get(group_key).and_then(|g| g.get(item_key)) {
                Some(Value::Array(items)) => items.clone(),
                Some(item @ Value::Object(_)) => vec![item.clone()],
                _ => Vec::new(),
            };
            let got = items.len();
            walk.items.extend(items);
            debug!("walked page {page_number} of {got} items from {url}");

            let total = lenient_u64(&body["pagination"]["totalAvailable"]);
            if walk.total_hint.is_none() {
                walk.total_hint = total;
            }

            match total {
                Some(total) if page_number * self.page_size as u64 >= total => return Ok(walk),
                Some(_) if got == 0 => return Ok(walk),
                Some(_) => page_number += 1,
                // No pagination block means a single-page endpoint
                None => return Ok(walk),
            }
        }
    }
}

/// The service serializes counts as strings on some endpoints
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
