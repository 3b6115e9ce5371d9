//! Session check command.

use console::style;

use crate::config::Settings;
use crate::scrapers::{validate_session, HttpClient};

pub async fn cmd_check_session(settings: &Settings, session: Option<&str>) -> anyhow::Result<()> {
    let Some(session) = session.or(settings.session_id.as_deref()) else {
        anyhow::bail!("Session ID is required (--session or VEHINFO_SESSION_ID)");
    };

    let config = settings.fetch_config(Some(1), Some(0.0), None, None, session)?;
    let client = HttpClient::new(settings)?;

    println!(
        "{} Checking session {}...",
        style("→").cyan(),
        config.masked_session()
    );

    match validate_session(&client, &config).await {
        Ok(()) => {
            println!("{} Session ID appears valid", style("✓").green());
            Ok(())
        }
        Err(e) => {
            println!(
                "{} Session ID may be invalid or expired: {}",
                style("✗").red(),
                e
            );
            anyhow::bail!("session check failed")
        }
    }
}
