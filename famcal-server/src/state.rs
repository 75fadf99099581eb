use anyhow::Result;

const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub upstream_base: String,
}

impl AppState {
    pub fn new() -> Result<Self> {
        Ok(AppState {
            client: reqwest::Client::new(),
            upstream_base: NOTION_API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_upstream(upstream_base: &str) -> Self {
        AppState {
            client: reqwest::Client::new(),
            upstream_base: upstream_base.to_string(),
        }
    }
}
