use super::google_api::check_status;
use crate::app::ports::{AttachmentRef, MailMessage, MailboxPort};
use crate::constants::{GMAIL_API_BASE, UNREAD_LABEL};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Gmail sends base64url, sometimes with padding and sometimes without.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn decode_attachment_data(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(data.trim())
        .map_err(|e| ReportError::MissingField(format!("valid base64 attachment data ({})", e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageId>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartBody {
    attachment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: PartBody,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
    #[serde(default)]
    payload: MessagePart,
}

#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    data: String,
}

fn collect_attachments(part: &MessagePart, out: &mut Vec<AttachmentRef>) {
    if let (false, Some(id)) = (part.filename.is_empty(), &part.body.attachment_id) {
        out.push(AttachmentRef {
            filename: part.filename.clone(),
            attachment_id: id.clone(),
        });
    }
    for child in &part.parts {
        collect_attachments(child, out);
    }
}

fn header(part: &MessagePart, name: &str) -> Option<String> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Gmail REST client for the signed-in user.
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(GMAIL_API_BASE, access_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/gmail/v1/users/me/{}", self.base_url, path)
    }
}

#[async_trait]
impl MailboxPort for GmailClient {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .http
                .get(self.url("messages"))
                .bearer_auth(&self.access_token)
                .query(&[("q", query)]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let page: ListResponse = check_status(req.send().await?).await?.json().await?;
            ids.extend(page.messages.into_iter().map(|m| m.id));
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        debug!("Gmail search '{}' matched {} messages", query, ids.len());
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<MailMessage> {
        let resp = self
            .http
            .get(self.url(&format!("messages/{}", id)))
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await?;
        let message: MessageResponse = check_status(resp).await?.json().await?;

        let mut attachments = Vec::new();
        collect_attachments(&message.payload, &mut attachments);
        Ok(MailMessage {
            id: message.id,
            from: header(&message.payload, "From"),
            subject: header(&message.payload, "Subject"),
            attachments,
        })
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(self.url(&format!(
                "messages/{}/attachments/{}",
                message_id, attachment_id
            )))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let attachment: AttachmentResponse = check_status(resp).await?.json().await?;
        decode_attachment_data(&attachment.data)
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("messages/{}/modify", message_id)))
            .bearer_auth(&self.access_token)
            .json(&json!({ "removeLabelIds": [UNREAD_LABEL] }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}
