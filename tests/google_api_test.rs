//! Gmail, Drive and OAuth adapters against a mock Google API.

use ov_reports::app::ports::{DrivePort, MailboxPort};
use ov_reports::error::ReportError;
use ov_reports::infra::drive::DriveClient;
use ov_reports::infra::gmail::GmailClient;
use ov_reports::infra::google_auth::{AuthorizedUser, GoogleAuth};
use serde_json::json;
use wiremock::matchers::{
    body_json, body_string_contains, header, header_exists, method, path, query_param,
    query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERY: &str = "from:no-reply@onvolunteers.com subject:\"Requested OnVolunteers Report\" is:unread after:2025/10/11";

fn folder_q(name: &str, parent: Option<&str>) -> String {
    let mut q = format!(
        "mimeType='application/vnd.google-apps.folder' and name='{}' and trashed=false",
        name
    );
    if let Some(parent) = parent {
        q.push_str(&format!(" and '{}' in parents", parent));
    }
    q
}

#[tokio::test]
async fn gmail_search_follows_next_page_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("q", QUERY))
        .and(query_param_is_missing("pageToken"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m1", "threadId": "t1" }],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m2", "threadId": "t2" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gmail = GmailClient::with_base_url(server.uri(), "test-token");
    let ids = gmail.search(QUERY).await.unwrap();
    assert_eq!(ids, vec!["m1".to_string(), "m2".to_string()]);
}

#[tokio::test]
async fn gmail_search_with_no_results_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })))
        .mount(&server)
        .await;

    let gmail = GmailClient::with_base_url(server.uri(), "test-token");
    assert!(gmail.search(QUERY).await.unwrap().is_empty());
}

#[tokio::test]
async fn gmail_http_errors_surface_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scopes"))
        .mount(&server)
        .await;

    let gmail = GmailClient::with_base_url(server.uri(), "test-token");
    match gmail.search(QUERY).await {
        Err(ReportError::Google { status, body }) => {
            assert_eq!(status, 403);
            assert!(body.contains("insufficient scopes"));
        }
        other => panic!("expected a Google API error, got {:?}", other),
    }
}

#[tokio::test]
async fn gmail_message_collects_nested_attachments_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/m1"))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m1",
            "payload": {
                "mimeType": "multipart/mixed",
                "filename": "",
                "headers": [
                    { "name": "From", "value": "OnVolunteers <no-reply@onvolunteers.com>" },
                    { "name": "Subject", "value": "Requested OnVolunteers Report" }
                ],
                "body": { "size": 0 },
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "filename": "",
                        "body": { "size": 0 },
                        "parts": [
                            { "mimeType": "text/plain", "filename": "", "body": { "size": 12, "data": "aGVsbG8" } }
                        ]
                    },
                    {
                        "mimeType": "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                        "filename": "OnVolunteers_Volunteer_Hours_Report2025-10-11__080102.xlsx",
                        "body": { "attachmentId": "att-1", "size": 4096 }
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let gmail = GmailClient::with_base_url(server.uri(), "test-token");
    let message = gmail.get_message("m1").await.unwrap();

    assert_eq!(message.id, "m1");
    assert_eq!(message.subject.as_deref(), Some("Requested OnVolunteers Report"));
    assert!(message.from.unwrap().contains("no-reply@onvolunteers.com"));
    assert_eq!(message.attachments.len(), 1);
    assert_eq!(message.attachments[0].attachment_id, "att-1");
    assert_eq!(
        message.attachments[0].filename,
        "OnVolunteers_Volunteer_Hours_Report2025-10-11__080102.xlsx"
    );
}

#[tokio::test]
async fn gmail_attachment_is_base64url_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/m1/attachments/att-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "size": 3, "data": "aGk_" })),
        )
        .mount(&server)
        .await;

    let gmail = GmailClient::with_base_url(server.uri(), "test-token");
    let bytes = gmail.get_attachment("m1", "att-1").await.unwrap();
    assert_eq!(bytes, b"hi?");
}

#[tokio::test]
async fn gmail_mark_read_removes_unread_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gmail/v1/users/me/messages/m1/modify"))
        .and(body_json(json!({ "removeLabelIds": ["UNREAD"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m1" })))
        .expect(1)
        .mount(&server)
        .await;

    let gmail = GmailClient::with_base_url(server.uri(), "test-token");
    gmail.mark_read("m1").await.unwrap();
}

#[tokio::test]
async fn drive_resolves_folder_by_walking_from_root() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_q("PTA", Some("root"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "pta-id", "name": "PTA" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_q("Reports", Some("pta-id"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "reports-id", "name": "Reports" }]
        })))
        .mount(&server)
        .await;

    let drive = DriveClient::with_base_url(server.uri(), "test-token");
    let id = drive.resolve_folder("/My Drive/PTA/Reports").await.unwrap();
    assert_eq!(id.as_deref(), Some("reports-id"));
}

#[tokio::test]
async fn drive_falls_back_to_name_search_for_shared_folders() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_q("Shared PTA", Some("root"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", folder_q("Reports", None)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "shared-reports", "name": "Reports" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let drive = DriveClient::with_base_url(server.uri(), "test-token");
    let id = drive.resolve_folder("/My Drive/Shared PTA/Reports").await.unwrap();
    assert_eq!(id.as_deref(), Some("shared-reports"));
}

#[tokio::test]
async fn drive_missing_folder_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .mount(&server)
        .await;

    let drive = DriveClient::with_base_url(server.uri(), "test-token");
    assert_eq!(drive.resolve_folder("/My Drive/Nowhere").await.unwrap(), None);
}

#[tokio::test]
async fn drive_upload_sends_multipart_and_returns_file_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header_exists("content-type"))
        .and(body_string_contains("\"parents\":[\"reports-id\"]"))
        .and(body_string_contains("volunteer-hours-2025-10-11.xlsx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("volunteer-hours-2025-10-11.xlsx");
    std::fs::write(&file, b"workbook bytes").unwrap();

    let drive = DriveClient::with_base_url(server.uri(), "test-token");
    let id = drive.upload(&file, "reports-id").await.unwrap();
    assert_eq!(id, "file-123");
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token.json");
    let stale = AuthorizedUser {
        token: Some("stale-token".to_string()),
        refresh_token: Some("refresh-me".to_string()),
        token_uri: format!("{}/token", server.uri()),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scopes: vec![
            "https://www.googleapis.com/auth/gmail.modify".to_string(),
            "https://www.googleapis.com/auth/drive".to_string(),
        ],
        expiry: Some("2020-01-01T00:00:00Z".to_string()),
    };
    std::fs::write(&token_file, serde_json::to_string(&stale).unwrap()).unwrap();

    let auth = GoogleAuth::new(dir.path().join("credentials.json"), &token_file);
    assert_eq!(auth.access_token().await.unwrap(), "fresh-token");

    let saved: AuthorizedUser =
        serde_json::from_str(&std::fs::read_to_string(&token_file).unwrap()).unwrap();
    assert_eq!(saved.token.as_deref(), Some("fresh-token"));
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-me"));
    assert!(saved.is_valid(chrono::Utc::now()));
}

#[tokio::test]
async fn valid_token_is_used_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token.json");
    let expiry = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    std::fs::write(
        &token_file,
        json!({
            "token": "still-good",
            "refresh_token": "r",
            "client_id": "c",
            "client_secret": "s",
            "scopes": [
                "https://www.googleapis.com/auth/gmail.modify",
                "https://www.googleapis.com/auth/drive"
            ],
            "expiry": expiry
        })
        .to_string(),
    )
    .unwrap();

    let auth = GoogleAuth::new(dir.path().join("credentials.json"), &token_file);
    assert_eq!(auth.access_token().await.unwrap(), "still-good");
}
