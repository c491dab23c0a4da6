use super::{PortalOption, ReportRequester};
use crate::config::{PortalConfig, Secret};
use crate::constants::VOLUNTEER_HOURS_REPORT;
use crate::error::{ReportError, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Pick(usize),
    Exit,
    Invalid,
}

/// Interprets a 1-based menu answer. When the menu shows an exit entry,
/// `len + 1` and "exit" leave it.
pub fn parse_choice(input: &str, len: usize, with_exit: bool) -> MenuChoice {
    let input = input.trim();
    if with_exit && input.eq_ignore_ascii_case("exit") {
        return MenuChoice::Exit;
    }
    match input.parse::<usize>() {
        Ok(n) if with_exit && n == len + 1 => MenuChoice::Exit,
        Ok(n) if (1..=len).contains(&n) => MenuChoice::Pick(n - 1),
        _ => MenuChoice::Invalid,
    }
}

pub fn render_menu(title: &str, options: &[PortalOption], with_exit: bool) -> String {
    let mut out = format!("\n{}:\n", title);
    for (i, option) in options.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, option.label));
    }
    if with_exit {
        out.push_str(&format!("{}. exit\n", options.len() + 1));
    }
    out
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, question: &str) -> Result<Option<String>> {
    println!("{}", question);
    Ok(lines.next_line().await?)
}

/// Menu loop: pick a report (and an activity for volunteer hours) until exit.
pub async fn run_interactive(config: &PortalConfig, username: &str, password: &Secret) -> Result<()> {
    let requester = ReportRequester::connect(config).await?;
    let outcome = async {
        requester.login(username, password).await?;
        requester.open_builtin_reports().await?;
        menu_loop(&requester).await
    }
    .await;

    if let Err(e) = requester.close().await {
        warn!("Failed to close the browser session: {}", e);
    }
    outcome
}

async fn menu_loop(requester: &ReportRequester) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let reports = requester.list_reports().await?;
        print!("{}", render_menu("Available reports", &reports, true));
        let Some(answer) = prompt(&mut lines, "Enter the number of the report you want to generate:").await? else {
            return Ok(());
        };

        let report = match parse_choice(&answer, reports.len(), true) {
            MenuChoice::Exit => {
                println!("Exiting...");
                return Ok(());
            }
            MenuChoice::Invalid => {
                println!("\nInvalid choice. Please try again.");
                continue;
            }
            MenuChoice::Pick(i) => &reports[i],
        };
        println!("\nYou selected: {}", report.label);

        let result = if report.label == VOLUNTEER_HOURS_REPORT {
            // Activities only appear once the report is picked in the page
            if let Err(e) = requester.select_report(&report.label).await {
                error!("Could not select '{}': {}", report.label, e);
                continue;
            }
            match choose_activity(requester, &mut lines).await? {
                Some(activity) => request_activity(requester, &activity).await,
                None => continue,
            }
        } else {
            requester.request_report(&report.label).await
        };
        if let Err(e) = result {
            error!("Report request failed: {}", e);
        }
    }
}

async fn choose_activity(
    requester: &ReportRequester,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<Option<PortalOption>> {
    let activities = requester.list_activities().await?;
    if activities.is_empty() {
        println!("\nNo activities offered for this report.");
        warn!("No activities offered for '{}'", VOLUNTEER_HOURS_REPORT);
        return Ok(None);
    }
    loop {
        print!("{}", render_menu("Available activities", &activities, false));
        let Some(answer) = prompt(lines, "Enter the number of the activity:").await? else {
            return Ok(None);
        };
        match parse_choice(&answer, activities.len(), false) {
            MenuChoice::Pick(i) => {
                println!("\nYou selected activity: {}", activities[i].label);
                return Ok(Some(activities[i].clone()));
            }
            MenuChoice::Exit | MenuChoice::Invalid => {
                println!("\nInvalid choice. Please try again.")
            }
        }
    }
}

pub fn activity_id(activity: &PortalOption) -> Result<u32> {
    activity.value.trim().parse::<u32>().map_err(|_| {
        ReportError::Portal(format!("Activity '{}' has no numeric id", activity.label))
    })
}

async fn request_activity(requester: &ReportRequester, activity: &PortalOption) -> Result<()> {
    requester.request_selected_activity(activity_id(activity)?).await
}
