use std::future::Future;
use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::FetchError;

pub const API_ENDPOINT: &str = "https://api.linear.app/graphql";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends one GraphQL request and hands back its `data` object.
///
/// Implemented over HTTP by [`LinearClient`]; tests script it in memory.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        query: &str,
        variables: Value,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

pub struct LinearClient {
    http: Client,
    endpoint: Url,
    api_key: String,
}

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Deserialize, Debug)]
struct GraphQLError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQLErrorExtensions>,
}

#[derive(Deserialize, Debug)]
struct GraphQLErrorExtensions {
    code: Option<String>,
}

impl LinearClient {
    pub fn new(api_key: String, endpoint: Url, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

impl Transport for LinearClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, FetchError> {
        let request = GraphQLRequest { query, variables };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            return Err(classify_status(status, retry_after, body));
        }

        let gql_response: GraphQLResponse = response.json().await?;
        into_data(gql_response)
    }
}

fn into_data(response: GraphQLResponse) -> Result<Value, FetchError> {
    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let throttled = errors.iter().any(|e| {
            e.extensions
                .as_ref()
                .and_then(|x| x.code.as_deref())
                .is_some_and(|code| code.eq_ignore_ascii_case("RATELIMITED"))
        });
        if throttled {
            return Err(FetchError::Throttled { retry_after: None });
        }
        return Err(FetchError::GraphQl {
            messages: errors.into_iter().map(|e| e.message).collect(),
        });
    }

    response.data.ok_or(FetchError::EmptyResponse)
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::Throttled { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized {
            status: status.as_u16(),
        },
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
            FetchError::Transient(format!("status {}: {}", s.as_u16(), body))
        }
        s => FetchError::Api {
            status: s.as_u16(),
            message: body,
        },
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
