//! Report requests on the OnVolunteers admin portal, driven over WebDriver.
//!
//! The portal emails each generated report; nothing is downloaded here.

pub mod menu;

use crate::config::{PortalConfig, Secret};
use crate::constants::*;
use crate::error::{ReportError, Result};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// An `<option>` of one of the portal's report dropdowns.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalOption {
    pub label: String,
    pub value: String,
}

/// Chrome capabilities for the WebDriver session.
pub fn chrome_capabilities(headless: bool) -> Map<String, Value> {
    let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage", "--window-size=1366,900"];
    if headless {
        args.push("--headless=new");
    }
    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    caps
}

/// Quotes `text` as an XPath string literal, even when it holds both quote kinds.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{}'", text);
    }
    if !text.contains('"') {
        return format!("\"{}\"", text);
    }
    let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Parses a page address the session waits to land on.
pub fn portal_url(address: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(address)
        .map_err(|e| ReportError::Portal(format!("bad portal url '{}': {}", address, e)))
}

/// Drops the placeholder and blank labels from a dropdown listing.
pub fn selectable_options(options: Vec<PortalOption>) -> Vec<PortalOption> {
    options
        .into_iter()
        .filter(|o| !o.label.is_empty() && o.label != REPORT_PLACEHOLDER)
        .collect()
}

pub struct ReportRequester {
    client: Client,
    login_url: String,
    timeout: Duration,
}

impl ReportRequester {
    /// Opens a WebDriver session against `config.webdriver_url`.
    pub async fn connect(config: &PortalConfig) -> Result<Self> {
        info!(
            "Connecting to WebDriver at {} (headless: {})",
            config.webdriver_url, config.headless
        );
        let client = ClientBuilder::native()
            .capabilities(chrome_capabilities(config.headless))
            .connect(&config.webdriver_url)
            .await?;
        Ok(Self {
            client,
            login_url: config.login_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub async fn login(&self, username: &str, password: &Secret) -> Result<()> {
        self.client.goto(&self.login_url).await?;
        debug!("Navigated to {}", self.login_url);

        self.wait_for(Locator::Css(ADMIN_SWITCH_SELECTOR)).await?.click().await?;
        let header_xpath = format!("//*[normalize-space()={}]", xpath_literal(ADMIN_LOGIN_HEADER));
        self.wait_for(Locator::XPath(&header_xpath)).await?;
        debug!("Admin login page confirmed");

        self.wait_for(Locator::Css(USERNAME_INPUT_SELECTOR))
            .await?
            .send_keys(username)
            .await?;
        self.client
            .find(Locator::Css(PASSWORD_INPUT_SELECTOR))
            .await?
            .send_keys(password.expose())
            .await?;
        self.client.find(Locator::LinkText(LOGIN_LINK_TEXT)).await?.click().await?;

        self.wait_for_url(PORTAL_HOME_URL).await?;
        info!("Successfully logged in to SFX OnVolunteers.");

        if let Some(link) = self.first_visible(SWITCH_TO_ADMIN_SELECTOR).await? {
            info!("Switching to Admin Portal...");
            link.click().await?;
            self.wait_for_url(PORTAL_HOME_URL).await?;
        }

        if self.first_visible(SWITCH_TO_PARENT_SELECTOR).await?.is_none() {
            return Err(ReportError::Portal(
                "Could not verify that we are in the admin portal (not in admin portal)".to_string(),
            ));
        }
        info!("Successfully in the Admin Portal.");
        Ok(())
    }

    /// Goes straight to the Built-in Reports page.
    pub async fn open_builtin_reports(&self) -> Result<()> {
        self.client.goto(PORTAL_REPORTS_URL).await?;
        self.wait_for_url(PORTAL_REPORTS_URL).await?;
        self.wait_for(Locator::Id(REPORT_SELECT_ID)).await?;
        info!("Successfully navigated to the Built-in Reports page.");
        Ok(())
    }

    pub async fn list_reports(&self) -> Result<Vec<PortalOption>> {
        Ok(selectable_options(self.select_options(REPORT_SELECT_ID).await?))
    }

    /// Activities offered once "User Volunteer Hours" is selected; call
    /// `select_report` first.
    pub async fn list_activities(&self) -> Result<Vec<PortalOption>> {
        Ok(selectable_options(self.select_options(ACTIVITY_SELECT_ID).await?))
    }

    pub async fn request_volunteer_hours(&self, activity_id: u32) -> Result<()> {
        info!("Generating '{}' report for activity ID: {}", VOLUNTEER_HOURS_REPORT, activity_id);
        self.select_report(VOLUNTEER_HOURS_REPORT).await?;
        self.request_selected_activity(activity_id).await
    }

    /// Selects an activity on the already selected volunteer hours report
    /// and generates it.
    pub async fn request_selected_activity(&self, activity_id: u32) -> Result<()> {
        self.select_activity(&activity_id.to_string()).await?;
        info!("Selected activity with ID: {}", activity_id);
        self.generate_and_close().await
    }

    pub async fn request_report(&self, name: &str) -> Result<()> {
        info!("Generating '{}' report", name);
        self.select_report(name).await?;
        self.generate_and_close().await
    }

    /// Ends the WebDriver session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        debug!("WebDriver session closed");
        Ok(())
    }

    /// Reads label/value pairs straight from the underlying `<select>`.
    async fn select_options(&self, select_id: &str) -> Result<Vec<PortalOption>> {
        let selector = format!("select#{} option", select_id);
        let mut options = Vec::new();
        for element in self.client.find_all(Locator::Css(&selector)).await? {
            let label = element.prop("textContent").await?.unwrap_or_default();
            let value = element.attr("value").await?.unwrap_or_default();
            options.push(PortalOption {
                label: label.trim().to_string(),
                value,
            });
        }
        Ok(options)
    }

    /// Picks a report through the bootstrap-select widget wrapping `#ddlReport`.
    pub async fn select_report(&self, name: &str) -> Result<()> {
        let toggle = format!("button[data-id=\"{}\"]", REPORT_SELECT_ID);
        self.wait_for(Locator::Css(&toggle)).await?.click().await?;
        let option_xpath = format!(
            "//div[contains(@class,'dropdown-menu') and contains(@class,'open')]//a[normalize-space()={}]",
            xpath_literal(name)
        );
        self.wait_for(Locator::XPath(&option_xpath)).await?.click().await?;
        debug!("Selected report '{}'", name);
        Ok(())
    }

    /// Sets `#ddlActivity` by value and notifies the page, as a user pick would.
    async fn select_activity(&self, value: &str) -> Result<()> {
        self.wait_for(Locator::Id(ACTIVITY_SELECT_ID)).await?;
        let script = r#"
            const select = document.getElementById(arguments[0]);
            const found = Array.from(select.options).some(o => o.value === arguments[1]);
            if (!found) { return false; }
            select.value = arguments[1];
            if (window.jQuery && jQuery.fn.selectpicker) { jQuery(select).selectpicker('refresh'); }
            select.dispatchEvent(new Event('change', { bubbles: true }));
            return true;
        "#;
        let selected = self
            .client
            .execute(script, vec![json!(ACTIVITY_SELECT_ID), json!(value)])
            .await?;
        if selected != Value::Bool(true) {
            return Err(ReportError::Portal(format!("Activity '{}' is not offered", value)));
        }
        Ok(())
    }

    async fn generate_and_close(&self) -> Result<()> {
        self.client
            .find(Locator::LinkText(GENERATE_REPORT_LINK_TEXT))
            .await?
            .click()
            .await?;
        info!("Report generated. Closing the report...");
        self.wait_for(Locator::XPath(CLOSE_MODAL_XPATH)).await?.click().await?;
        info!("Report closed.");
        Ok(())
    }

    async fn wait_for(&self, locator: Locator<'_>) -> Result<fantoccini::elements::Element> {
        Ok(self
            .client
            .wait()
            .at_most(self.timeout)
            .every(POLL_INTERVAL)
            .for_element(locator)
            .await?)
    }

    async fn wait_for_url(&self, expected: &str) -> Result<()> {
        let url = portal_url(expected)?;
        self.client
            .wait()
            .at_most(self.timeout)
            .every(POLL_INTERVAL)
            .for_url(url)
            .await
            .map_err(|e| ReportError::Portal(format!("Timed out waiting for {}: {}", expected, e)))
    }

    async fn first_visible(&self, css: &str) -> Result<Option<fantoccini::elements::Element>> {
        for element in self.client.find_all(Locator::Css(css)).await? {
            if element.is_displayed().await? {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }
}

/// Login, open Built-in Reports, then one "User Volunteer Hours" request per
/// activity. The session is closed whatever happens.
pub async fn run_scripted(config: &PortalConfig, username: &str, password: &Secret) -> Result<usize> {
    let requester = ReportRequester::connect(config).await?;
    let outcome = async {
        requester.login(username, password).await?;
        requester.open_builtin_reports().await?;
        let mut requested = 0;
        for activity in &config.scripted_activities {
            requester.request_volunteer_hours(*activity).await?;
            requested += 1;
        }
        Ok::<usize, ReportError>(requested)
    }
    .await;

    if let Err(e) = requester.close().await {
        warn!("Failed to close the browser session: {}", e);
    }
    outcome
}
