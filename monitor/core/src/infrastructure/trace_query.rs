// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! HTTP client for the trace store's window query endpoint.
//!
//! Pages through `GET /v1/traces` with a server-issued cursor and surfaces
//! the pages as a single lazy stream, so the executor's memory footprint is
//! one page regardless of window size.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::trace::{AgentScope, Trace, TraceSource, TraceSourceError, TraceStream};

const PAGE_SIZE: u32 = 200;

#[derive(Clone)]
pub struct HttpTraceSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TracePage {
    traces: Vec<Trace>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl HttpTraceSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TraceSourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TraceSourceError::Query(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_page(
        &self,
        scope: &AgentScope,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<TracePage, TraceSourceError> {
        let url = format!("{}/v1/traces", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[
                ("org", scope.org_id.0.to_string()),
                ("project", scope.project_id.0.to_string()),
                ("agent", scope.agent_id.0.to_string()),
                ("environment", scope.environment_id.0.to_string()),
                ("from", window_start.to_rfc3339()),
                ("to", window_end.to_rfc3339()),
                ("limit", PAGE_SIZE.to_string()),
            ]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TraceSourceError::Query(format!("Trace store request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TraceSourceError::Query(format!(
                "Trace store returned {}",
                status
            )));
        }

        let page: TracePage = response
            .json()
            .await
            .map_err(|e| TraceSourceError::Malformed(e.to_string()))?;
        debug!(
            traces = page.traces.len(),
            has_more = page.next_cursor.is_some(),
            "Fetched trace page"
        );
        Ok(page)
    }
}

#[async_trait]
impl TraceSource for HttpTraceSource {
    async fn fetch(
        &self,
        scope: &AgentScope,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<TraceStream, TraceSourceError> {
        // The first page is fetched eagerly so an unreachable trace store
        // fails the fetch call itself rather than the first stream poll.
        let first = self
            .fetch_page(scope, window_start, window_end, None)
            .await?;

        let source = self.clone();
        let scope = *scope;
        let rest = stream::try_unfold(first.next_cursor, move |cursor| {
            let source = source.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok(None);
                };
                let page = source
                    .fetch_page(&scope, window_start, window_end, Some(&cursor))
                    .await?;
                Ok(Some((
                    stream::iter(page.traces.into_iter().map(Ok)),
                    page.next_cursor,
                )))
            }
        })
        .try_flatten();

        let head = stream::iter(first.traces.into_iter().map(Ok));
        Ok(Box::pin(head.chain(rest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitor::{AgentId, EnvironmentId, OrgId, ProjectId};
    use futures::TryStreamExt;
    use uuid::Uuid;

    fn scope() -> AgentScope {
        AgentScope {
            org_id: OrgId(Uuid::new_v4()),
            project_id: ProjectId(Uuid::new_v4()),
            agent_id: AgentId(Uuid::new_v4()),
            environment_id: EnvironmentId(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn follows_cursor_across_pages() {
        let mut server = mockito::Server::new_async().await;

        // Mocks match newest-first: the cursored request hits the second
        // mock, the initial request falls through to the first.
        let first = server
            .mock("GET", "/v1/traces")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                    "traces": [
                        {"id": "t-1", "timestamp": "2026-01-01T00:00:00Z", "spans": []},
                        {"id": "t-2", "timestamp": "2026-01-01T00:01:00Z", "spans": []}
                    ],
                    "next_cursor": "page-2"
                }"#,
            )
            .expect(1)
            .create_async()
            .await;

        let second = server
            .mock("GET", "/v1/traces")
            .match_query(mockito::Matcher::UrlEncoded(
                "cursor".into(),
                "page-2".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{
                    "traces": [
                        {"id": "t-3", "timestamp": "2026-01-01T00:02:00Z", "spans": []}
                    ],
                    "next_cursor": null
                }"#,
            )
            .expect(1)
            .create_async()
            .await;

        let source = HttpTraceSource::new(server.url()).unwrap();
        let stream = source
            .fetch(&scope(), Utc::now(), Utc::now())
            .await
            .unwrap();
        let traces: Vec<Trace> = stream.try_collect().await.unwrap();

        assert_eq!(traces.len(), 3);
        assert_eq!(traces[0].id.0, "t-1");
        assert_eq!(traces[2].id.0, "t-3");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_fails_the_fetch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/traces")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let source = HttpTraceSource::new(server.url()).unwrap();
        let result = source.fetch(&scope(), Utc::now(), Utc::now()).await;
        assert!(matches!(result, Err(TraceSourceError::Query(_))));
    }

    #[tokio::test]
    async fn malformed_body_is_reported_as_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/traces")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let source = HttpTraceSource::new(server.url()).unwrap();
        let result = source.fetch(&scope(), Utc::now(), Utc::now()).await;
        assert!(matches!(result, Err(TraceSourceError::Malformed(_))));
    }
}
