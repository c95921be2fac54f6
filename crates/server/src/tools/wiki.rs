//! Encyclopedic lookup against the MediaWiki search API.

use serde::Deserialize;
use serde_json::{Value, json};

use protocol::ToolError;

use super::transport_error;
use crate::handler::{HandlerFuture, ToolHandler};

const WIKI_API_BASE: &str = "https://en.wikipedia.org/w/api.php";
const DEFAULT_LIMIT: u64 = 3;
const MAX_LIMIT: u64 = 10;

/// Searches Wikipedia and returns article summaries with canonical URLs.
#[derive(Debug)]
pub struct WikiSearch {
    http: reqwest::Client,
    endpoint: String,
}

impl WikiSearch {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: WIKI_API_BASE.to_string(),
        }
    }

    /// Point the handler at a different API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

/// Drop the match-highlighting markup MediaWiki injects into snippets.
fn strip_markup(snippet: &str) -> String {
    snippet
        .replace("<span class=\"searchmatch\">", "")
        .replace("</span>", "")
}

fn article_url(title: &str) -> String {
    format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_"))
}

impl ToolHandler for WikiSearch {
    fn name(&self) -> &str {
        "wiki_search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for articles matching a query. Returns titles, summaries, and article URLs."
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
                    "description": "Maximum number of articles to return",
                    "default": DEFAULT_LIMIT,
                    "minimum": 1,
                    "maximum": MAX_LIMIT
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

        Ok(json!({ "query": query, "limit": limit }))
    }

    fn execute(&self, arguments: Value) -> HandlerFuture<'_> {
        Box::pin(async move {
            let query = arguments["query"].as_str().unwrap_or_default().to_string();
            let limit = arguments["limit"].as_u64().unwrap_or(DEFAULT_LIMIT);

            let response = self
                .http
                .get(&self.endpoint)
                .query(&[
                    ("action", "query"),
                    ("list", "search"),
                    ("srsearch", &query),
                    ("format", "json"),
                    ("srlimit", &limit.to_string()),
                ])
                .send()
                .await
                .map_err(|e| transport_error(&e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ToolError::Transport(format!(
                    "wikipedia returned HTTP {status}"
                )));
            }

            let data: SearchResponse =
                response.json().await.map_err(|e| transport_error(&e))?;

            let hits = data.query.map(|q| q.search).unwrap_or_default();

            // No matching article is a normal outcome, not an error: the
            // orchestrator must not see it as retryable.
            if hits.is_empty() {
                return Ok(json!({
                    "query": query,
                    "results": [],
                    "message": format!("No Wikipedia articles found for \"{query}\"."),
                }));
            }

            let results: Vec<Value> = hits
                .iter()
                .map(|hit| {
                    json!({
                        "title": hit.title,
                        "summary": strip_markup(&hit.snippet),
                        "url": article_url(&hit.title),
                    })
                })
                .collect();

            Ok(json!({ "query": query, "results": results }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> WikiSearch {
        WikiSearch::new(reqwest::Client::new())
    }

    #[test]
    fn validate_requires_query() {
        let err = handler().validate(json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn validate_rejects_empty_query() {
        let err = handler().validate(json!({"query": "   "})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn validate_applies_default_limit() {
        let normalized = handler().validate(json!({"query": "rust"})).unwrap();
        assert_eq!(normalized["limit"], DEFAULT_LIMIT);
    }

    #[test]
    fn validate_rejects_out_of_range_limit() {
        let err = handler()
            .validate(json!({"query": "rust", "limit": 0}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let err = handler()
            .validate(json!({"query": "rust", "limit": 99}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn snippet_markup_is_stripped() {
        let snippet = "<span class=\"searchmatch\">Rust</span> is a language";
        assert_eq!(strip_markup(snippet), "Rust is a language");
    }

    #[test]
    fn article_url_uses_underscores() {
        assert_eq!(
            article_url("Rust (programming language)"),
            "https://en.wikipedia.org/wiki/Rust_(programming_language)"
        );
    }
}
