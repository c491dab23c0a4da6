use crate::app::ports::{AttachmentRef, DrivePort, MailMessage, MailboxPort};
use crate::archive;
use crate::constants::{REPORT_ATTACHMENT_MARKER, REPORT_SENDER, REPORT_SUBJECT};
use crate::data_lake;
use crate::error::{ReportError, Result};
use crate::report::classify::{classify, log_classification};
use crate::report::ReportSheet;
use crate::types::{InboxRunSummary, Provenance, ReportKind};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// Everything the inbox run needs besides its ports.
#[derive(Debug, Clone)]
pub struct InboxSettings {
    pub reports_dir: PathBuf,
    pub data_lake_dir: PathBuf,
    pub hours_threshold: f64,
    pub drive_folder_path: String,
    pub mark_read: bool,
    pub sender: String,
    pub subject: String,
}

impl InboxSettings {
    pub fn new(reports_dir: PathBuf, data_lake_dir: PathBuf, drive_folder_path: String) -> Self {
        Self {
            reports_dir,
            data_lake_dir,
            hours_threshold: crate::constants::DEFAULT_HOURS_THRESHOLD,
            drive_folder_path,
            mark_read: true,
            sender: REPORT_SENDER.to_string(),
            subject: REPORT_SUBJECT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentOutcome {
    Processed,
    Unclassified,
}

/// Unread report emails since `since`, from the portal's sender.
pub fn report_search_query(sender: &str, subject: &str, since: NaiveDate) -> String {
    format!(
        "from:{} subject:\"{}\" is:unread after:{}",
        sender,
        subject.replace('"', ""),
        since.format("%Y/%m/%d")
    )
}

pub fn is_report_attachment(filename: &str) -> bool {
    filename.ends_with(".xlsx") && filename.contains(REPORT_ATTACHMENT_MARKER)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Downloads, classifies, archives, uploads and snapshots emailed reports.
pub struct InboxUseCase {
    mailbox: Arc<dyn MailboxPort>,
    drive: Arc<dyn DrivePort>,
    settings: InboxSettings,
}

impl InboxUseCase {
    pub fn new(mailbox: Arc<dyn MailboxPort>, drive: Arc<dyn DrivePort>, settings: InboxSettings) -> Self {
        Self {
            mailbox,
            drive,
            settings,
        }
    }

    pub async fn run(&self, now: DateTime<Local>) -> Result<InboxRunSummary> {
        let mut summary = InboxRunSummary::default();
        let since = now.date_naive() - Duration::days(1);
        let query = report_search_query(&self.settings.sender, &self.settings.subject, since);

        let message_ids = match self.mailbox.search(&query).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("An error occurred while searching for emails: {}", e);
                summary.errors.push(format!("search: {}", e));
                return Ok(summary);
            }
        };
        summary.emails_found = message_ids.len();
        if message_ids.is_empty() {
            info!("No new report emails found.");
            return Ok(summary);
        }

        let folder_path = self.settings.drive_folder_path.as_str();
        let folder_id = self.drive.resolve_folder(folder_path).await?.ok_or_else(|| {
            ReportError::MissingField(format!("Google Drive folder '{}'", folder_path))
        })?;

        fs::create_dir_all(&self.settings.reports_dir)?;

        for message_id in &message_ids {
            let span = info_span!("email", id = %message_id);
            if let Err(e) = self
                .process_message(message_id, &folder_id, now, &mut summary)
                .instrument(span)
                .await
            {
                error!("Failed to process email {}: {}", message_id, e);
                summary.errors.push(format!("{}: {}", message_id, e));
            }
        }

        Ok(summary)
    }

    async fn process_message(
        &self,
        message_id: &str,
        folder_id: &str,
        now: DateTime<Local>,
        summary: &mut InboxRunSummary,
    ) -> Result<()> {
        let message = self.mailbox.get_message(message_id).await?;
        let mut processed_any = false;

        for attachment in message
            .attachments
            .iter()
            .filter(|a| is_report_attachment(&a.filename))
        {
            let span = info_span!("attachment", file = %attachment.filename);
            match self
                .process_attachment(&message, attachment, folder_id, now, summary)
                .instrument(span)
                .await
            {
                Ok(AttachmentOutcome::Processed) => processed_any = true,
                Ok(AttachmentOutcome::Unclassified) => {}
                Err(e) => {
                    error!("Failed to process attachment {}: {}", attachment.filename, e);
                    summary
                        .errors
                        .push(format!("{}/{}: {}", message_id, attachment.filename, e));
                }
            }
        }

        if processed_any && self.settings.mark_read {
            self.mailbox.mark_read(message_id).await?;
            summary.marked_read += 1;
        }
        Ok(())
    }

    async fn process_attachment(
        &self,
        message: &MailMessage,
        attachment: &AttachmentRef,
        folder_id: &str,
        now: DateTime<Local>,
        summary: &mut InboxRunSummary,
    ) -> Result<AttachmentOutcome> {
        let bytes = self
            .mailbox
            .get_attachment(&message.id, &attachment.attachment_id)
            .await?;
        let original_name = archive::sanitize_attachment_name(&attachment.filename);
        let local_path = self.settings.reports_dir.join(&original_name);
        fs::write(&local_path, &bytes)?;
        info!("Downloaded attachment: {}", original_name);

        let sheet = match ReportSheet::open(&local_path) {
            Ok(sheet) => sheet,
            Err(e) => {
                error!("An error occurred while reading the excel file: {}", e);
                summary.unknown += 1;
                return Ok(AttachmentOutcome::Unclassified);
            }
        };
        let classification = classify(&sheet, self.settings.hours_threshold);
        log_classification(&original_name, &classification, self.settings.hours_threshold);
        let kind = classification.kind;
        if kind == ReportKind::Unknown {
            summary.unknown += 1;
            return Ok(AttachmentOutcome::Unclassified);
        }

        let archived = archive::archive_report(
            &local_path,
            &self.settings.reports_dir,
            kind,
            &original_name,
            now,
        )?;
        summary.attachments_processed += 1;

        let gdrive_file_id = match self.drive.upload(&archived.path, folder_id).await {
            Ok(id) => {
                info!("File uploaded successfully. File ID: {}", id);
                summary.uploaded += 1;
                Some(id)
            }
            Err(e) => {
                error!("An error occurred while uploading the file to Google Drive: {}", e);
                summary.errors.push(format!("upload {}: {}", archived.file_name, e));
                None
            }
        };

        let processed_at: DateTime<Utc> = now.with_timezone(&Utc);
        let provenance = Provenance {
            report_id: uuid::Uuid::new_v4().to_string(),
            report_type: kind.as_str().to_string(),
            report_date: archived.report_date.format("%Y-%m-%d").to_string(),
            processed_timestamp: processed_at.to_rfc3339(),
            source_filename: archived.file_name.clone(),
            email_id: message.id.clone(),
            email_sender: message.from.clone().unwrap_or_default(),
            email_subject: message.subject.clone().unwrap_or_default(),
            gdrive_file_id,
            gdrive_folder_path: self.settings.drive_folder_path.clone(),
        };
        let content_hash = sha256_hex(&bytes);
        match data_lake::write_snapshot(
            &self.settings.data_lake_dir,
            &sheet,
            &provenance,
            processed_at,
            Some(&content_hash),
        ) {
            Ok(_) => summary.snapshots_written += 1,
            Err(e) => {
                warn!("Could not write data lake snapshot for {}: {}", archived.file_name, e);
                summary.errors.push(format!("snapshot {}: {}", archived.file_name, e));
            }
        }

        Ok(AttachmentOutcome::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_query_targets_unread_portal_mail_since_date() {
        let since = NaiveDate::from_ymd_opt(2025, 10, 11).unwrap();
        assert_eq!(
            report_search_query(REPORT_SENDER, REPORT_SUBJECT, since),
            "from:no-reply@onvolunteers.com subject:\"Requested OnVolunteers Report\" is:unread after:2025/10/11"
        );
    }

    #[test]
    fn only_portal_workbooks_are_report_attachments() {
        assert!(is_report_attachment(
            "OnVolunteers_Volunteer_Hours_Report2025-09-27__125741.xlsx"
        ));
        assert!(!is_report_attachment("OnVolunteers_Volunteer_Hours_Report.csv"));
        assert!(!is_report_attachment("invoice.xlsx"));
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
