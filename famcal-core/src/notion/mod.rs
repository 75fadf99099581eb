//! Notion API integration: typed payloads and a rate-limited client.

mod client;
mod types;

pub use client::{NotionClient, NotionClientConfig, QueryParams};
pub use types::{
    Database, IntegrationInfo, Page, PropertyValue, QueryDatabaseResponse, RichTextFragment,
    SelectOption,
};

use thiserror::Error;

/// Classified Notion API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotionErrorKind {
    /// The request never reached Notion, most likely blocked at the
    /// transport/protocol layer.
    CorsBlocked,
    Offline,
    Network,
    Timeout,
    RateLimited,
    RestrictedResource,
    Unauthorized,
    ObjectNotFound,
    Unknown,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct NotionApiError {
    pub kind: NotionErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl NotionApiError {
    pub fn new(kind: NotionErrorKind, message: impl Into<String>) -> Self {
        NotionApiError {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(kind: NotionErrorKind, status: u16, message: impl Into<String>) -> Self {
        NotionApiError {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }
}
