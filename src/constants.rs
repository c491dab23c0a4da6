/// Portal, mailbox and storage constants shared across the pipeline.

// OnVolunteers portal
pub const DEFAULT_LOGIN_URL: &str = "http://sfx.onvolunteers.com";
pub const PORTAL_HOME_URL: &str = "https://portal.onvolunteers.com/Default.aspx";
pub const PORTAL_REPORTS_URL: &str = "https://portal.onvolunteers.com/Report.aspx";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

pub const ADMIN_SWITCH_SELECTOR: &str = "#btSwitch";
pub const ADMIN_LOGIN_HEADER: &str = "Administrator Login";
pub const USERNAME_INPUT_SELECTOR: &str = r#"input[placeholder="username or email"]"#;
pub const PASSWORD_INPUT_SELECTOR: &str = r#"input[placeholder="password"]"#;
pub const LOGIN_LINK_TEXT: &str = "Login";
pub const SWITCH_TO_ADMIN_SELECTOR: &str = r#"a[href="Switch.aspx?p=0"]"#;
pub const SWITCH_TO_PARENT_SELECTOR: &str = r#"a[href="Switch.aspx?p=1"]"#;
pub const REPORT_SELECT_ID: &str = "ddlReport";
pub const ACTIVITY_SELECT_ID: &str = "ddlActivity";
pub const REPORT_PLACEHOLDER: &str = "Select Report";
pub const VOLUNTEER_HOURS_REPORT: &str = "User Volunteer Hours";
pub const GENERATE_REPORT_LINK_TEXT: &str = "Generate Report";
pub const CLOSE_MODAL_XPATH: &str = "//button[@data-dismiss='modal' and normalize-space()='Close']";

/// Activity id of "Parking Patrol 2025-2026".
pub const PARKING_PATROL_ACTIVITY: u32 = 30212;
/// Activity id of "All Activities".
pub const ALL_ACTIVITIES: u32 = 0;

// Gmail
pub const REPORT_SENDER: &str = "no-reply@onvolunteers.com";
pub const REPORT_SUBJECT: &str = "Requested OnVolunteers Report";
pub const REPORT_ATTACHMENT_MARKER: &str = "OnVolunteers_Volunteer_Hours_Report";
pub const UNREAD_LABEL: &str = "UNREAD";

// Google endpoints
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com";
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/drive",
];
pub const DRIVE_FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DEFAULT_TARGET_FOLDER: &str =
    "/My Drive/PTA 2025-2026 SHARED FOLDER/SubCommittees/OnVolunteers/Reports";

// Local layout
pub const DEFAULT_REPORTS_DIR: &str = "reports";
pub const DATA_LAKE_SUBDIR: &str = "data_lake";
pub const DEFAULT_DB_FILE: &str = "onvolunteers.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "ov_reports.toml";
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Mean "Total Hours" at or above this marks a volunteer report.
pub const DEFAULT_HOURS_THRESHOLD: f64 = 4.0;
