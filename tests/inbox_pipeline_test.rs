//! Inbox pipeline against in-memory mailbox and drive ports.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use ov_reports::app::inbox_use_case::{InboxSettings, InboxUseCase};
use ov_reports::app::ports::{AttachmentRef, DrivePort, MailMessage, MailboxPort};
use ov_reports::data_lake;
use ov_reports::error::{ReportError, Result};
use ov_reports::types::ReportKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const VOLUNTEER_FILE: &str = "OnVolunteers_Volunteer_Hours_Report2025-10-11__080102.xlsx";
const PARKING_FILE: &str = "OnVolunteers_Volunteer_Hours_Report2025-10-11__080230.xlsx";
const UNKNOWN_FILE: &str = "OnVolunteers_Volunteer_Hours_Report2025-10-11__090000.xlsx";

#[derive(Default)]
struct FakeMailbox {
    messages: HashMap<String, MailMessage>,
    attachments: HashMap<String, Vec<u8>>,
    fail_search: bool,
    queries: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
    marked_read: Mutex<Vec<String>>,
}

impl FakeMailbox {
    fn with_message(mut self, id: &str, files: &[(&str, Vec<u8>)]) -> Self {
        let mut attachments = Vec::new();
        for (i, (name, bytes)) in files.iter().enumerate() {
            let attachment_id = format!("{}-att-{}", id, i);
            self.attachments.insert(attachment_id.clone(), bytes.clone());
            attachments.push(AttachmentRef {
                filename: name.to_string(),
                attachment_id,
            });
        }
        self.messages.insert(
            id.to_string(),
            MailMessage {
                id: id.to_string(),
                from: Some("OnVolunteers <no-reply@onvolunteers.com>".to_string()),
                subject: Some("Requested OnVolunteers Report".to_string()),
                attachments,
            },
        );
        self
    }
}

#[async_trait]
impl MailboxPort for FakeMailbox {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail_search {
            return Err(ReportError::Google {
                status: 500,
                body: "backend error".to_string(),
            });
        }
        let mut ids: Vec<String> = self.messages.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<MailMessage> {
        self.fetched.lock().unwrap().push(id.to_string());
        self.messages
            .get(id)
            .cloned()
            .ok_or_else(|| ReportError::MissingField(format!("message {}", id)))
    }

    async fn get_attachment(&self, _message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        self.attachments
            .get(attachment_id)
            .cloned()
            .ok_or_else(|| ReportError::MissingField(format!("attachment {}", attachment_id)))
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        self.marked_read.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

struct FakeDrive {
    folder_id: Option<String>,
    fail_upload: bool,
    uploads: Mutex<Vec<PathBuf>>,
}

impl FakeDrive {
    fn new(folder_id: Option<&str>) -> Self {
        Self {
            folder_id: folder_id.map(str::to_string),
            fail_upload: false,
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DrivePort for FakeDrive {
    async fn resolve_folder(&self, _path: &str) -> Result<Option<String>> {
        Ok(self.folder_id.clone())
    }

    async fn upload(&self, path: &Path, _folder_id: &str) -> Result<String> {
        if self.fail_upload {
            return Err(ReportError::Google {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(path.to_path_buf());
        Ok(format!("drive-file-{}", uploads.len()))
    }
}

fn run_time() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 10, 12, 9, 30, 0).unwrap()
}

fn settings(dir: &TempDir) -> InboxSettings {
    let reports_dir = dir.path().join("reports");
    InboxSettings::new(
        reports_dir.clone(),
        reports_dir.join("data_lake"),
        "/My Drive/PTA/Reports".to_string(),
    )
}

fn standard_mailbox() -> FakeMailbox {
    FakeMailbox::default()
        .with_message(
            "m1",
            &[
                (VOLUNTEER_FILE, common::report_bytes(&common::VOLUNTEER_ROWS)),
                ("notes.pdf", b"%PDF".to_vec()),
            ],
        )
        .with_message(
            "m2",
            &[(PARKING_FILE, common::report_bytes(&common::PARKING_ROWS))],
        )
        .with_message("m3", &[(UNKNOWN_FILE, common::unrelated_bytes())])
}

#[tokio::test]
async fn reports_are_archived_uploaded_and_snapshotted() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    let mailbox = Arc::new(standard_mailbox());
    let drive = Arc::new(FakeDrive::new(Some("folder-1")));

    let use_case = InboxUseCase::new(mailbox.clone(), drive.clone(), settings.clone());
    let summary = use_case.run(run_time()).await.unwrap();

    assert_eq!(summary.emails_found, 3);
    assert_eq!(summary.attachments_processed, 2);
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.unknown, 1);
    assert_eq!(summary.snapshots_written, 2);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);

    assert!(mailbox.queries.lock().unwrap()[0].ends_with("is:unread after:2025/10/11"));

    let reports = &settings.reports_dir;
    assert!(reports
        .join("volunteer-hours/volunteer-hours-2025-10-11.xlsx")
        .exists());
    assert!(reports
        .join("parking-hours/parking-hours-2025-10-11.xlsx")
        .exists());
    // Unclassified downloads stay where they landed
    assert!(reports.join(UNKNOWN_FILE).exists());
    assert!(!reports.join(VOLUNTEER_FILE).exists());

    // Only emails with a processed report are marked read
    let marked = mailbox.marked_read.lock().unwrap().clone();
    assert_eq!(marked, vec!["m1".to_string(), "m2".to_string()]);
    assert_eq!(summary.marked_read, 2);
    assert_eq!(drive.uploads.lock().unwrap().len(), 2);

    let latest = data_lake::latest_snapshot(&settings.data_lake_dir, ReportKind::Volunteer)
        .unwrap()
        .expect("volunteer snapshot");
    let snapshot = data_lake::read_snapshot(&latest).unwrap();
    assert_eq!(snapshot.rows.len(), 3);
    let provenance = snapshot.provenance();
    assert_eq!(provenance.report_type, "volunteer");
    assert_eq!(provenance.report_date, "2025-10-11");
    assert_eq!(provenance.email_id, "m1");
    assert_eq!(provenance.source_filename, "volunteer-hours-2025-10-11.xlsx");
    assert_eq!(provenance.gdrive_folder_path, "/My Drive/PTA/Reports");
    assert!(provenance.gdrive_file_id.is_some());
    assert_eq!(snapshot.content_sha256().map(str::len), Some(64));
}

#[tokio::test]
async fn second_run_of_same_report_gets_timestamped_archive_name() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    let drive = Arc::new(FakeDrive::new(Some("folder-1")));

    for _ in 0..2 {
        let mailbox = Arc::new(FakeMailbox::default().with_message(
            "m1",
            &[(VOLUNTEER_FILE, common::report_bytes(&common::VOLUNTEER_ROWS))],
        ));
        let use_case = InboxUseCase::new(mailbox, drive.clone(), settings.clone());
        use_case.run(run_time()).await.unwrap();
    }

    let archive = settings.reports_dir.join("volunteer-hours");
    assert!(archive.join("volunteer-hours-2025-10-11.xlsx").exists());
    assert!(archive.join("volunteer-hours-2025-10-11_0930.xlsx").exists());

    let snapshots = std::fs::read_dir(&settings.data_lake_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".parquet"))
        .count();
    assert_eq!(snapshots, 2);
}

#[tokio::test]
async fn keep_unread_leaves_messages_unread() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(&dir);
    settings.mark_read = false;
    let mailbox = Arc::new(standard_mailbox());
    let drive = Arc::new(FakeDrive::new(Some("folder-1")));

    let summary = InboxUseCase::new(mailbox.clone(), drive, settings)
        .run(run_time())
        .await
        .unwrap();

    assert_eq!(summary.attachments_processed, 2);
    assert_eq!(summary.marked_read, 0);
    assert!(mailbox.marked_read.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_drive_folder_stops_before_any_email() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(standard_mailbox());
    let drive = Arc::new(FakeDrive::new(None));

    let result = InboxUseCase::new(mailbox.clone(), drive, settings(&dir))
        .run(run_time())
        .await;

    assert!(result.is_err());
    assert!(mailbox.fetched.lock().unwrap().is_empty());
    assert!(mailbox.marked_read.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_upload_still_archives_and_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    let mailbox = Arc::new(FakeMailbox::default().with_message(
        "m1",
        &[(VOLUNTEER_FILE, common::report_bytes(&common::VOLUNTEER_ROWS))],
    ));
    let mut drive = FakeDrive::new(Some("folder-1"));
    drive.fail_upload = true;

    let summary = InboxUseCase::new(mailbox, Arc::new(drive), settings.clone())
        .run(run_time())
        .await
        .unwrap();

    assert_eq!(summary.attachments_processed, 1);
    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.snapshots_written, 1);
    assert_eq!(summary.errors.len(), 1);

    let latest = data_lake::latest_snapshot(&settings.data_lake_dir, ReportKind::Volunteer)
        .unwrap()
        .unwrap();
    let provenance = data_lake::read_snapshot(&latest).unwrap().provenance();
    assert_eq!(provenance.gdrive_file_id, None);
}

#[tokio::test]
async fn empty_or_failed_search_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let drive = Arc::new(FakeDrive::new(Some("folder-1")));

    let empty = Arc::new(FakeMailbox::default());
    let summary = InboxUseCase::new(empty, drive.clone(), settings(&dir))
        .run(run_time())
        .await
        .unwrap();
    assert_eq!(summary.emails_found, 0);
    assert!(summary.errors.is_empty());

    let failing = Arc::new(FakeMailbox {
        fail_search: true,
        ..FakeMailbox::default()
    });
    let summary = InboxUseCase::new(failing, drive.clone(), settings(&dir))
        .run(run_time())
        .await
        .unwrap();
    assert_eq!(summary.emails_found, 0);
    assert_eq!(summary.errors.len(), 1);
    assert!(drive.uploads.lock().unwrap().is_empty());
}
