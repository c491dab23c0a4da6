pub mod drive;
pub mod gmail;
pub mod google_api;
pub mod google_auth;

use crate::config::GoogleConfig;
use crate::error::Result;
use drive::DriveClient;
use gmail::GmailClient;
use google_auth::GoogleAuth;

/// Authenticates once and builds both Google clients.
pub async fn google_clients(config: &GoogleConfig) -> Result<(GmailClient, DriveClient)> {
    let auth = GoogleAuth::new(&config.credentials_file, &config.token_file);
    let token = auth.access_token().await?;
    Ok((GmailClient::new(token.clone()), DriveClient::new(token)))
}
