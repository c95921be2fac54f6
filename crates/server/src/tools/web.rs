//! Web search through the Tavily API.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use protocol::ToolError;

use super::transport_error;
use crate::config::Credentials;
use crate::error::Error;
use crate::handler::{HandlerFuture, ToolHandler};

const TAVILY_API_BASE: &str = "https://api.tavily.com";
const DEFAULT_LIMIT: u64 = 3;
const MAX_LIMIT: u64 = 10;
const SNIPPET_MAX_CHARS: usize = 500;

/// Searches the web via Tavily. Requires an API credential.
#[derive(Debug)]
pub struct WebSearch {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl WebSearch {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: TAVILY_API_BASE.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Build from credentials; absence of the key is a startup error for
    /// this handler only.
    pub fn from_config(http: reqwest::Client, credentials: &Credentials) -> Result<Self, Error> {
        let api_key = credentials
            .tavily_api_key
            .clone()
            .ok_or_else(|| Error::Startup("tavily_api_key not configured".into()))?;
        Ok(Self::new(http, api_key))
    }

    /// Point the handler at a different API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
    include_images: bool,
    max_results: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
    #[serde(default)]
    follow_up_questions: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Truncate on a char boundary.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

impl ToolHandler for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet. Returns a quick answer when available plus ranked results with title, URL, and snippet."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "default": DEFAULT_LIMIT,
                    "minimum": 1,
                    "maximum": MAX_LIMIT
                },
                "include_raw_content": {
                    "type": "boolean",
                    "description": "Include the full page content of each result",
                    "default": false
                }
            },
            "required": ["query"]
        })
    }

    fn validate(&self, arguments: Value) -> Result<Value, ToolError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing 'query' argument".into()))?
            .trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("'query' must not be empty".into()));
        }

        let limit = match arguments.get("limit") {
            None | Some(Value::Null) => DEFAULT_LIMIT,
            Some(v) => v
                .as_u64()
                .filter(|n| (1..=MAX_LIMIT).contains(n))
                .ok_or_else(|| {
                    ToolError::InvalidInput(format!(
                        "'limit' must be an integer between 1 and {MAX_LIMIT}"
                    ))
                })?,
        };

        let include_raw_content = match arguments.get("include_raw_content") {
            None | Some(Value::Null) => false,
            Some(v) => v.as_bool().ok_or_else(|| {
                ToolError::InvalidInput("'include_raw_content' must be a boolean".into())
            })?,
        };

        Ok(json!({
            "query": query,
            "limit": limit,
            "include_raw_content": include_raw_content,
        }))
    }

    fn execute(&self, arguments: Value) -> HandlerFuture<'_> {
        Box::pin(async move {
            let query = arguments["query"].as_str().unwrap_or_default().to_string();
            let limit = arguments["limit"].as_u64().unwrap_or(DEFAULT_LIMIT);
            let include_raw_content = arguments["include_raw_content"].as_bool().unwrap_or(false);

            let body = SearchRequest {
                api_key: &self.api_key,
                query: &query,
                search_depth: "basic",
                include_answer: true,
                include_raw_content,
                include_images: false,
                max_results: limit,
            };

            let response = self
                .http
                .post(format!("{}/search", self.endpoint))
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error(&e))?;

            // The orchestrator's retry policy differs per class: auth means
            // fix configuration, rate limit means back off, transport means
            // fail fast.
            let status = response.status();
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(ToolError::Auth(format!(
                        "search provider rejected the credential (HTTP {status})"
                    )));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    return Err(ToolError::RateLimited(
                        "search provider is throttling requests".into(),
                    ));
                }
                s if !s.is_success() => {
                    return Err(ToolError::Transport(format!(
                        "search provider returned HTTP {status}"
                    )));
                }
                _ => {}
            }

            let data: SearchResponse =
                response.json().await.map_err(|e| transport_error(&e))?;

            let results: Vec<Value> = data
                .results
                .iter()
                .take(limit as usize)
                .map(|hit| {
                    json!({
                        "title": hit.title,
                        "url": hit.url,
                        "snippet": truncate(&hit.content, SNIPPET_MAX_CHARS),
                    })
                })
                .collect();

            Ok(json!({
                "query": query,
                "answer": data.answer,
                "results": results,
                "follow_up_questions": data.follow_up_questions,
            }))
        })
    }
}
