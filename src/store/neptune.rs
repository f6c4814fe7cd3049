use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_derive::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::store::GraphStore;
use crate::traversal::Traversal;

/// Untyped GraphSON, so results deserialize into plain JSON.
const GRAPHSON_V1: &str = "application/vnd.gremlin-v1.0+json";

/// Neptune's Gremlin HTTPS endpoint.
///
/// The HTTP client, and with it the pooled TLS connection, is built on the
/// first submit and then reused for the lifetime of the execution environment.
#[derive(Debug)]
pub struct NeptuneGraph {
    url: String,
    timeout: Duration,
    client: OnceCell<Client>,
}

#[derive(Deserialize)]
struct GremlinResponse {
    result: GremlinResult,
}

#[derive(Deserialize)]
struct GremlinResult {
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct GremlinFailure {
    #[serde(rename = "detailedMessage")]
    detailed_message: Option<String>,
    message: Option<String>,
}

impl NeptuneGraph {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: OnceCell::new(),
        }
    }

    /// Store backed by the cluster's writer endpoint.
    pub fn writer(config: &GraphConfig) -> Self {
        Self::new(config.writer_url(), config.timeout())
    }

    /// Store backed by the reader endpoint, or the writer if none is set.
    pub fn reader(config: &GraphConfig) -> Self {
        Self::new(config.reader_url(), config.timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn client(&self) -> Result<&Client> {
        let timeout = self.timeout;
        let client = self
            .client
            .get_or_try_init(|| async move {
                debug!("opening graph store connection");
                Client::builder().timeout(timeout).build()
            })
            .await?;
        Ok(client)
    }
}

#[async_trait]
impl GraphStore for NeptuneGraph {
    #[instrument(skip(self, traversal), fields(url = %self.url))]
    async fn submit(&self, traversal: &Traversal) -> Result<Vec<Value>> {
        let script = traversal.to_string();
        debug!(%script, "submitting traversal");

        let response = self
            .client()
            .await?
            .post(&self.url)
            .header(header::ACCEPT, GRAPHSON_V1)
            .json(&json!({ "gremlin": script }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = match serde_json::from_str::<GremlinFailure>(&body) {
                Ok(GremlinFailure {
                    detailed_message: Some(message),
                    ..
                })
                | Ok(GremlinFailure {
                    message: Some(message),
                    ..
                }) => message,
                _ => body,
            };
            return Err(Error::Gremlin {
                status: status.as_u16(),
                message,
            });
        }

        let response: GremlinResponse = serde_json::from_str(&body)?;
        Ok(match response.result.data {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            other => vec![other],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::g;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, NeptuneGraph) {
        let server = MockServer::start().await;
        let graph = NeptuneGraph::new(format!("{}/gremlin", server.uri()), Duration::from_secs(5));
        (server, graph)
    }

    #[tokio::test]
    async fn posts_script_and_reads_result_data() {
        let (server, graph) = setup().await;

        Mock::given(method("POST"))
            .and(path("/gremlin"))
            .and(header_eq("accept", GRAPHSON_V1))
            .and(body_json(json!({ "gremlin": "g.V().hasLabel('state').elementMap('id','name')" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requestId": "8f0c",
                "status": { "message": "", "code": 200, "attributes": {} },
                "result": {
                    "data": [{ "id": "s1", "label": "state", "name": "Texas" }],
                    "meta": {}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let t = g().v().has_label("state").element_map(&["id", "name"]);
        let rows = graph.submit(&t).await.unwrap();

        assert_eq!(rows, vec![json!({ "id": "s1", "label": "state", "name": "Texas" })]);
    }

    #[tokio::test]
    async fn null_data_is_an_empty_result() {
        let (server, graph) = setup().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "data": null, "meta": {} }
            })))
            .mount(&server)
            .await;

        let first = graph.first(&g().v().has("id", "nope")).await.unwrap();
        assert_eq!(first, None);
    }

    #[tokio::test]
    async fn server_errors_carry_the_detailed_message() {
        let (server, graph) = setup().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "requestId": "1",
                "code": "InternalFailureException",
                "detailedMessage": "The provided traverser does not map to a value"
            })))
            .mount(&server)
            .await;

        let err = graph.submit(&g().v()).await.unwrap_err();
        match err {
            Error::Gremlin { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "The provided traverser does not map to a value");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_is_built_once_and_reused() {
        let (server, graph) = setup().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "data": [] }
            })))
            .expect(2)
            .mount(&server)
            .await;

        graph.submit(&g().v()).await.unwrap();
        let first = graph.client().await.unwrap() as *const Client;
        graph.submit(&g().v()).await.unwrap();
        let second = graph.client().await.unwrap() as *const Client;

        assert_eq!(first, second);
    }
}
