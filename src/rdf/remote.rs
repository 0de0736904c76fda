//! Network access for URL sources and SPARQL endpoints.
//!
//! Fetches are never retried: a single failure surfaces immediately.

use crate::error::{NetworkError, ResolutionError};
use crate::rdf::graph::RdfGraph;
use anyhow::{Context, Result};
use async_trait::async_trait;
use oxigraph::io::RdfFormat;
use std::time::Duration;

/// Retrieves the raw bytes behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, NetworkError>;
}

/// Read-only access to a live SPARQL endpoint.
#[async_trait]
pub trait SparqlClient: Send + Sync {
    /// Runs a `CONSTRUCT` query and returns the resulting graph.
    async fn construct(&self, endpoint: &str, query: &str) -> Result<RdfGraph, ResolutionError>;
}

/// reqwest-backed implementation of both network seams.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpClient {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, max_bytes })
    }

    async fn read_limited(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, NetworkError> {
        if !response.status().is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(NetworkError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|error| NetworkError::Request {
            url: url.to_string(),
            message: error.to_string(),
        })? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(NetworkError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        tracing::debug!(url, "fetching remote source");
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/turtle, application/n-triples;q=0.9, application/rdf+xml;q=0.8, */*;q=0.5",
            )
            .send()
            .await
            .map_err(|error| NetworkError::Request {
                url: url.to_string(),
                message: error.to_string(),
            })?;
        self.read_limited(url, response).await
    }
}

#[async_trait]
impl SparqlClient for HttpClient {
    async fn construct(&self, endpoint: &str, query: &str) -> Result<RdfGraph, ResolutionError> {
        tracing::debug!(endpoint, "querying SPARQL endpoint");
        let response = self
            .client
            .get(endpoint)
            .query(&[("query", query)])
            .header(
                reqwest::header::ACCEPT,
                "application/n-triples, text/turtle;q=0.9",
            )
            .send()
            .await
            .map_err(|error| NetworkError::Request {
                url: endpoint.to_string(),
                message: error.to_string(),
            })?;
        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .and_then(|media_type| RdfFormat::from_media_type(media_type.trim()))
            .unwrap_or(RdfFormat::NTriples);
        let body = self.read_limited(endpoint, response).await?;
        RdfGraph::parse(&body, format, None).map_err(|error| ResolutionError::Endpoint {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        })
    }
}
