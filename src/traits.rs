//! Collaborator traits the pipeline is built against.
//!
//! The pipeline never talks to the network directly. It asks a
//! [`PageFetcher`] for page text and hands finished messages to a
//! [`Notifier`]. Storage goes through [`RecordStore`](crate::store::RecordStore).
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────────┐   ┌─────────────┐
//! │ PageFetcher │──▶│ extract → classify →     │──▶│ RecordStore │
//! │ (HTTP)      │   │ dedupe  (pipeline)       │   │ JSON/SQLite │
//! └─────────────┘   └────────────┬─────────────┘   └─────────────┘
//!                                ▼
//!                         ┌─────────────┐
//!                         │  Notifier   │
//!                         │ Telegram/log│
//!                         └─────────────┘
//! ```
//!
//! Implementations must be `Send + Sync` so one instance can be shared
//! between the scheduler and the HTTP trigger.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::CategoryLines;
use crate::notify::render_grouped;

/// Retrieves raw page text.
///
/// Any error is treated the same way by the pipeline: the page is skipped.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Delivers formatted messages to the operator.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use bridge_harvester::traits::Notifier;
///
/// struct Stdout;
///
/// #[async_trait]
/// impl Notifier for Stdout {
///     async fn send_message(&self, text: &str) -> Result<()> {
///         println!("{}", text);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends free-form (HTML-formatted) text. Implementations split it
    /// if their channel has a size limit.
    async fn send_message(&self, text: &str) -> Result<()>;

    /// Sends one titled message with a section per non-empty category.
    ///
    /// Does nothing when every category is empty.
    async fn send_grouped(&self, title: &str, groups: &CategoryLines) -> Result<()> {
        match render_grouped(title, groups) {
            Some(message) => self.send_message(&message).await,
            None => Ok(()),
        }
    }
}
