//! Live endpoint tests. **Ignored by default**: they hit the real
//! Wikipedia and Yahoo Finance APIs.
//!
//! ```bash
//! SPYGLASS_LIVE_TESTS=1 cargo test -p server --test live -- --ignored
//! ```

use chrono::{Duration, Utc};
use serde_json::json;
use server::ToolHandler;
use server::tools::{StockQuote, WikiSearch};

fn should_run() -> bool {
    std::env::var("SPYGLASS_LIVE_TESTS").is_ok()
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("spyglass-tests/0.1")
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn live_wiki_search_finds_python() {
    if !should_run() {
        return;
    }

    let handler = WikiSearch::new(http());
    let normalized = handler
        .validate(json!({"query": "Python (programming language)"}))
        .unwrap();
    let payload = handler.execute(normalized).await.unwrap();

    assert!(!payload["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn live_wiki_search_gibberish_is_still_a_success() {
    if !should_run() {
        return;
    }

    let handler = WikiSearch::new(http());
    let normalized = handler
        .validate(json!({"query": "qzxnonexistentarticle12345"}))
        .unwrap();
    let payload = handler.execute(normalized).await.unwrap();

    assert!(payload["results"].as_array().unwrap().is_empty());
    assert!(payload["message"].is_string());
}

#[tokio::test]
#[ignore]
async fn live_stock_quote_aapl_is_fresh() {
    if !should_run() {
        return;
    }

    let handler = StockQuote::new(http());
    let normalized = handler.validate(json!({"symbol": "AAPL"})).unwrap();
    let payload = handler.execute(normalized).await.unwrap();

    assert!(payload["price"].as_f64().unwrap() > 0.0);

    // Quotes can lag over weekends and holidays, but never by more than a
    // few days for a liquid symbol.
    let as_of: chrono::DateTime<Utc> = payload["as_of"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(Utc::now() - as_of < Duration::days(7));
}
