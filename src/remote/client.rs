use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};

use super::api_types::{decode_records, ApiBase, ApiBaseDetails, ApiOrganization, ApiPageCards};
use super::types::{Base, BaseDetails, Organization, PageCards};
use super::RemoteSource;

/// REST client for the directory backend
#[derive(Clone)]
pub struct RemoteClient {
  http: reqwest::Client,
  base_url: Url,
}

impl RemoteClient {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let key = Config::get_api_key()?;
    Ok(Self::with_key(
      &config.api.url,
      &key,
      Duration::from_secs(config.api.timeout_secs),
    )?)
  }

  pub fn with_key(url: &str, key: &str, timeout: Duration) -> Result<Self> {
    let base_url = parse_base_url(url)?;

    let mut headers = HeaderMap::new();
    let apikey = HeaderValue::from_str(key)
      .map_err(|e| Error::RemoteUnavailable(format!("invalid API key: {}", e)))?;
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key))
      .map_err(|e| Error::RemoteUnavailable(format!("invalid API key: {}", e)))?;
    bearer.set_sensitive(true);
    headers.insert("apikey", apikey);
    headers.insert(AUTHORIZATION, bearer);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(timeout)
      .build()?;

    Ok(Self { http, base_url })
  }

  /// Build the URL of a table endpoint, optionally filtered by base.
  fn endpoint(&self, resource: &str, base_id: Option<&str>) -> Result<Url> {
    let mut url = self
      .base_url
      .join(resource)
      .map_err(|e| Error::RemoteUnavailable(format!("invalid endpoint {}: {}", resource, e)))?;
    if let Some(id) = base_id {
      url
        .query_pairs_mut()
        .append_pair("base_id", &format!("eq.{}", id))
        .append_pair("select", "*");
    }
    Ok(url)
  }

  async fn get_records<T: DeserializeOwned>(
    &self,
    resource: &str,
    base_id: Option<&str>,
  ) -> Result<Vec<T>> {
    let url = self.endpoint(resource, base_id)?;
    debug!("GET {}", url);

    let response = self.http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(Error::RemoteUnavailable(format!(
        "GET {} returned {}",
        resource, status
      )));
    }

    let body = response.bytes().await?;
    let records = decode_records(resource, &body)?;
    debug!("GET {} returned {} records", resource, records.len());
    Ok(records)
  }
}

fn parse_base_url(url: &str) -> Result<Url> {
  // Url::join replaces the last segment unless the path ends in a slash
  let normalized = if url.ends_with('/') {
    url.to_string()
  } else {
    format!("{}/", url)
  };
  Url::parse(&normalized)
    .map_err(|e| Error::RemoteUnavailable(format!("invalid API url {}: {}", url, e)))
}

#[async_trait]
impl RemoteSource for RemoteClient {
  async fn fetch_bases(&self) -> Result<Vec<Base>> {
    let bases: Vec<ApiBase> = self.get_records("base", None).await?;
    Ok(bases.into_iter().map(Base::from).collect())
  }

  async fn fetch_organizations(&self, base_id: &str) -> Result<Vec<Organization>> {
    let orgs: Vec<ApiOrganization> = self.get_records("organization", Some(base_id)).await?;
    Ok(orgs.into_iter().map(Organization::from).collect())
  }

  async fn fetch_base_details(&self, base_id: &str) -> Result<Vec<BaseDetails>> {
    let details: Vec<ApiBaseDetails> = self.get_records("baseDetails", Some(base_id)).await?;
    Ok(
      details
        .into_iter()
        .map(|d| d.into_domain(base_id))
        .collect(),
    )
  }

  async fn fetch_page_cards(&self, base_id: &str) -> Result<Vec<PageCards>> {
    let cards: Vec<ApiPageCards> = self.get_records("appFields", Some(base_id)).await?;
    Ok(cards.into_iter().map(|c| c.into_domain(base_id)).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::sync::oneshot;

  /// Answer a single request with a canned response. Returns the API url and
  /// a receiver for the raw request text.
  async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut buf = vec![0u8; 8192];
      let n = socket.read(&mut buf).await.unwrap();
      let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());

      let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      let _ = socket.shutdown().await;
    });

    (format!("http://{}/rest/v1/", addr), rx)
  }

  fn client(url: &str) -> RemoteClient {
    RemoteClient::with_key(url, "test-key", Duration::from_secs(1)).unwrap()
  }

  #[test]
  fn test_endpoint_without_trailing_slash() {
    let c = client("https://example.test/rest/v1");
    let url = c.endpoint("base", None).unwrap();
    assert_eq!(url.as_str(), "https://example.test/rest/v1/base");
  }

  #[test]
  fn test_endpoint_filters_by_base() {
    let c = client("https://example.test/rest/v1/");
    let url = c.endpoint("organization", Some("B 1")).unwrap();
    assert_eq!(
      url.as_str(),
      "https://example.test/rest/v1/organization?base_id=eq.B+1&select=*"
    );
  }

  #[test]
  fn test_invalid_url_rejected() {
    let err = RemoteClient::with_key("not a url", "k", Duration::from_secs(1)).err();
    assert!(matches!(err, Some(Error::RemoteUnavailable(_))));
  }

  #[tokio::test]
  async fn test_unreachable_host_is_remote_unavailable() {
    // Port 9 (discard) on localhost is closed in test environments
    let c = client("http://127.0.0.1:9/rest/v1/");
    let err = c.fetch_organizations("B1").await.unwrap_err();
    assert!(matches!(err, Error::RemoteUnavailable(_)));
  }

  #[tokio::test]
  async fn test_server_error_is_remote_unavailable() {
    let (url, _) = serve_once("500 Internal Server Error", r#"{"message":"boom"}"#).await;
    let err = client(&url).fetch_organizations("B1").await.unwrap_err();
    match err {
      Error::RemoteUnavailable(msg) => assert!(msg.contains("500"), "{}", msg),
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_non_array_body_is_remote_unavailable() {
    let (url, _) = serve_once("200 OK", r#"{"message":"JWT expired"}"#).await;
    let err = client(&url).fetch_organizations("B1").await.unwrap_err();
    assert!(matches!(err, Error::RemoteUnavailable(_)));
  }

  #[tokio::test]
  async fn test_fetch_sends_key_and_filter() {
    let body = r#"[{"id": "O1", "name": "Alpha", "base_id": "B1", "use_tables": null}]"#;
    let (url, request) = serve_once("200 OK", body).await;

    let orgs = client(&url).fetch_organizations("B1").await.unwrap();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].name, "Alpha");

    let request = request.await.unwrap().to_lowercase();
    assert!(request.starts_with("get /rest/v1/organization?base_id=eq.b1&select=*"));
    assert!(request.contains("apikey: test-key"));
    assert!(request.contains("authorization: bearer test-key"));
  }
}
