//! OAuth for the Gmail and Drive APIs.
//!
//! Tokens live in an authorized-user JSON file. A valid token is reused, an
//! expired one is refreshed, and when neither works the installed-app flow
//! runs against a one-route loopback server.

use crate::constants::{GOOGLE_AUTH_URI, GOOGLE_SCOPES, GOOGLE_TOKEN_URI};
use crate::error::{ReportError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use axum::{extract::Query, response::Html, routing::get, Extension, Router};
use hyper::Server;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

/// Authorized-user token file contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizedUser {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// RFC 3339, or a naive ISO timestamp taken as UTC.
    pub expiry: Option<String>,
}

impl AuthorizedUser {
    pub fn expiry_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry_time()) {
            (Some(_), Some(expiry)) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            _ => false,
        }
    }

    pub fn has_scopes(&self, required: &[&str]) -> bool {
        self.scopes.is_empty() || required.iter().all(|s| self.scopes.iter().any(|have| have == s))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecretSection {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Client secrets file downloaded from the Google console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub installed: Option<ClientSecretSection>,
    pub web: Option<ClientSecretSection>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<ClientSecretSection> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ReportError::Auth(format!(
                "Failed to read client secrets '{}': {}",
                path.display(),
                e
            ))
        })?;
        let secrets: ClientSecrets = serde_json::from_str(&raw)?;
        secrets
            .installed
            .or(secrets.web)
            .ok_or_else(|| ReportError::Auth("client secrets have no 'installed' or 'web' section".into()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

pub struct GoogleAuth {
    http: reqwest::Client,
    credentials_file: PathBuf,
    token_file: PathBuf,
    scopes: Vec<String>,
}

impl GoogleAuth {
    pub fn new(credentials_file: impl Into<PathBuf>, token_file: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials_file: credentials_file.into(),
            token_file: token_file.into(),
            scopes: GOOGLE_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn load_token_file(&self) -> Option<AuthorizedUser> {
        let raw = fs::read_to_string(&self.token_file).ok()?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.token_file.display(), e);
                None
            }
        }
    }

    fn save_token_file(&self, user: &AuthorizedUser) -> Result<()> {
        if let Some(parent) = self.token_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.token_file, serde_json::to_string_pretty(user)?)?;
        Ok(())
    }

    /// A bearer token for the configured scopes.
    pub async fn access_token(&self) -> Result<String> {
        let required: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        if let Some(user) = self.load_token_file().filter(|u| u.has_scopes(&required)) {
            if user.is_valid(Utc::now()) {
                if let Some(token) = user.token.clone() {
                    return Ok(token);
                }
            }
            if user.refresh_token.is_some() {
                match self.refresh(&user).await {
                    Ok(refreshed) => {
                        self.save_token_file(&refreshed)?;
                        info!("Refreshed Google access token");
                        return refreshed
                            .token
                            .ok_or_else(|| ReportError::Auth("refresh returned no token".into()));
                    }
                    Err(e) => warn!("Token refresh failed, starting a new consent flow: {}", e),
                }
            }
        }

        let user = self.run_installed_flow().await?;
        self.save_token_file(&user)?;
        user.token
            .ok_or_else(|| ReportError::Auth("authorization returned no token".into()))
    }

    async fn refresh(&self, user: &AuthorizedUser) -> Result<AuthorizedUser> {
        let refresh_token = user
            .refresh_token
            .as_deref()
            .ok_or_else(|| ReportError::Auth("no refresh token".into()))?;
        let resp = self
            .http
            .post(&user.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", user.client_id.as_str()),
                ("client_secret", user.client_secret.as_str()),
            ])
            .send()
            .await?;
        let token = parse_token_response(resp).await?;
        Ok(merge_token(user.clone(), token, Utc::now()))
    }

    async fn run_installed_flow(&self) -> Result<AuthorizedUser> {
        let secrets = ClientSecrets::load(&self.credentials_file)?;
        let state = uuid::Uuid::new_v4().to_string();
        let server = RedirectServer::start(&state)?;
        let redirect_uri = server.redirect_uri();

        let consent_url = consent_url(&secrets, &redirect_uri, &self.scopes, &state)?;
        println!("Please visit this URL to authorize this application:\n{}", consent_url);

        let code = server.code().await?;
        let resp = self
            .http
            .post(&secrets.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await?;
        let token = parse_token_response(resp).await?;

        let user = AuthorizedUser {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: self.scopes.clone(),
            expiry: None,
        };
        Ok(merge_token(user, token, Utc::now()))
    }
}

async fn parse_token_response(resp: reqwest::Response) -> Result<TokenResponse> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ReportError::Auth(format!("token endpoint returned {}: {}", status, body)));
    }
    Ok(serde_json::from_str(&body)?)
}

fn merge_token(mut user: AuthorizedUser, token: TokenResponse, now: DateTime<Utc>) -> AuthorizedUser {
    user.token = Some(token.access_token);
    if let Some(refresh) = token.refresh_token {
        user.refresh_token = Some(refresh);
    }
    if let Some(scope) = token.scope {
        user.scopes = scope.split_whitespace().map(str::to_string).collect();
    }
    user.expiry = token
        .expires_in
        .map(|secs| (now + Duration::seconds(secs)).to_rfc3339());
    user
}

pub fn consent_url(
    secrets: &ClientSecretSection,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scopes.join(" ").as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| ReportError::Auth(format!("bad auth uri '{}': {}", secrets.auth_uri, e)))
}

/// Query string of the authorization redirect.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// The authorization code, once `state` matches the one we sent.
pub fn code_from_redirect(params: &RedirectParams, expected_state: &str) -> Result<String> {
    if let Some(error) = &params.error {
        return Err(ReportError::Auth(format!("authorization denied: {}", error)));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(ReportError::Auth("state mismatch in authorization redirect".into()));
    }
    params
        .code
        .clone()
        .ok_or_else(|| ReportError::Auth("authorization redirect carried no code".into()))
}

type RedirectResult = std::result::Result<String, String>;

struct RedirectSlot {
    state: String,
    sender: Mutex<Option<oneshot::Sender<RedirectResult>>>,
}

async fn redirect_handler(
    Extension(slot): Extension<Arc<RedirectSlot>>,
    Query(params): Query<RedirectParams>,
) -> Html<&'static str> {
    // Stray requests (favicon, prefetch) carry neither field
    if params.code.is_none() && params.error.is_none() {
        return Html("Waiting for the authorization redirect.");
    }
    let result = code_from_redirect(&params, &slot.state).map_err(|e| e.to_string());
    let body = if result.is_ok() {
        "The authentication flow has completed. You may close this window."
    } else {
        "Authorization failed. Check the terminal for details."
    };
    if let Ok(mut sender) = slot.sender.lock() {
        if let Some(tx) = sender.take() {
            let _ = tx.send(result);
        }
    }
    Html(body)
}

/// Loopback server that takes the first authorization redirect and then
/// shuts down.
pub struct RedirectServer {
    port: u16,
    result_rx: oneshot::Receiver<RedirectResult>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::result::Result<(), hyper::Error>>,
}

impl RedirectServer {
    /// Binds an ephemeral port on 127.0.0.1. Must be called inside the runtime.
    pub fn start(expected_state: &str) -> Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let slot = Arc::new(RedirectSlot {
            state: expected_state.to_string(),
            sender: Mutex::new(Some(result_tx)),
        });
        let app = Router::new()
            .route("/", get(redirect_handler))
            .layer(Extension(slot));

        let server = Server::from_tcp(listener)
            .map_err(|e| ReportError::Auth(format!("could not start redirect server: {}", e)))?
            .serve(app.into_make_service())
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
        debug!("Redirect server listening on 127.0.0.1:{}", port);

        Ok(Self {
            port,
            result_rx,
            shutdown_tx,
            handle: tokio::spawn(server),
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Waits for the redirect, then stops the server.
    pub async fn code(self) -> Result<String> {
        let result = self.result_rx.await.map_err(|_| {
            ReportError::Auth("redirect server stopped before the redirect arrived".into())
        });
        let _ = self.shutdown_tx.send(());
        match self.handle.await {
            Ok(Err(e)) => warn!("Redirect server error: {}", e),
            Err(e) => warn!("Redirect server task failed: {}", e),
            Ok(Ok(())) => debug!("Redirect server stopped"),
        }
        result?.map_err(ReportError::Auth)
    }
}
