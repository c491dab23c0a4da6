use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// An attachment reference inside a mail message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    pub attachment_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailMessage {
    pub id: String,
    pub from: Option<String>,
    pub subject: Option<String>,
    /// Attachments from every MIME part, nested parts included.
    pub attachments: Vec<AttachmentRef>,
}

#[async_trait]
pub trait MailboxPort: Send + Sync {
    /// Ids of messages matching a provider search query.
    async fn search(&self, query: &str) -> Result<Vec<String>>;
    async fn get_message(&self, id: &str) -> Result<MailMessage>;
    /// Decoded attachment bytes.
    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;
    async fn mark_read(&self, message_id: &str) -> Result<()>;
}

#[async_trait]
pub trait DrivePort: Send + Sync {
    /// Folder id for a `/My Drive/a/b` style path, `None` if not found.
    async fn resolve_folder(&self, path: &str) -> Result<Option<String>>;
    /// Uploads a local file into `folder_id` and returns the new file id.
    async fn upload(&self, path: &Path, folder_id: &str) -> Result<String>;
}
