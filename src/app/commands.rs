use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;

use crate::adapters::fitbit_api::FitbitClient;
use crate::adapters::json_file::write_pretty_atomic;
use crate::adapters::oauth::OAuthClient;
use crate::adapters::token_store::TokenStore;
use crate::app::AppError;
use crate::app::cli::Command;
use crate::app::config::AppConfig;
use crate::domain::dates::{ApiDate, DateRange, DetailLevel};
use crate::domain::token::DEFAULT_SCOPES;

pub struct CommandContext {
    config: AppConfig,
    http: Client,
    store: TokenStore,
}

impl CommandContext {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(AppError::http)?;
        let store = TokenStore::new(config.token_file.clone());

        Ok(Self {
            config,
            http,
            store,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn oauth(&self) -> Result<OAuthClient, AppError> {
        Ok(OAuthClient::new(
            self.http.clone(),
            self.config.oauth_settings()?,
        ))
    }

    pub fn api(&self) -> Result<FitbitClient, AppError> {
        Ok(FitbitClient::new(
            self.http.clone(),
            self.config.api_base_url.clone(),
            self.store.clone(),
            self.oauth()?,
        ))
    }
}

pub fn execute(command: Command, context: &CommandContext) -> Result<(), AppError> {
    match command {
        Command::Login {
            scopes,
            timeout_secs,
        } => login(context, scopes, timeout_secs),
        Command::Refresh => {
            let token = context.oauth()?.refresh_stored(&context.store)?;
            eprintln!("Access token refreshed; valid until {}.", token.expires_at);
            Ok(())
        }
        Command::Logout => {
            if context.store.clear()? {
                eprintln!("Removed {}.", context.store.path().display());
            } else {
                eprintln!("No token file at {}.", context.store.path().display());
            }
            Ok(())
        }
        Command::Profile { output } => {
            let profile = context.api()?.get_profile()?;
            write_output(output.as_deref(), &profile)
        }
        Command::Devices { output } => {
            let devices = context.api()?.get_devices()?;
            write_output(output.as_deref(), &devices)
        }
        Command::DownloadHeartrate {
            start_date,
            end_date,
            output,
        } => {
            let range = parse_range(&start_date, &end_date)?;
            let days = context.api()?.get_heart_rate_range(range)?;
            tracing::info!(days = days.len(), "heart rate summaries downloaded");
            write_output(Some(output.as_path()), &days)
        }
        Command::DownloadIntraday {
            date,
            detail_level,
            output,
        } => {
            let date = ApiDate::parse(&date)?;
            let detail: DetailLevel = detail_level.parse()?;
            let payload = context.api()?.get_heart_rate_intraday(date, detail)?;
            write_output(Some(output.as_path()), &payload)
        }
        Command::DownloadSleep { date, output } => {
            let date = ApiDate::parse(&date)?;
            let payload = context.api()?.get_sleep(date)?;
            write_output(Some(output.as_path()), &payload)
        }
        Command::DownloadSleepRange {
            start_date,
            end_date,
            output,
        } => {
            let range = parse_range(&start_date, &end_date)?;
            let payload = context.api()?.get_sleep_range(range)?;
            write_output(Some(output.as_path()), &payload)
        }
        Command::DownloadActivity { date, output } => {
            let date = ApiDate::parse(&date)?;
            let payload = context.api()?.get_activity_summary(date)?;
            write_output(Some(output.as_path()), &payload)
        }
    }
}

fn login(
    context: &CommandContext,
    scopes: Vec<String>,
    timeout_secs: Option<u64>,
) -> Result<(), AppError> {
    let scopes = if scopes.is_empty() {
        DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect()
    } else {
        scopes
    };
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| context.config.login_timeout());

    let token = context
        .oauth()?
        .login(&context.store, &scopes, timeout, |url| {
            eprintln!("Open this URL in a browser to authorize access:\n\n  {url}\n");
            eprintln!(
                "Waiting up to {}s for the redirect to {} ...",
                timeout.as_secs(),
                context.config.redirect_url
            );
        })?;

    eprintln!(
        "Login successful; tokens saved to {} (valid until {}).",
        context.store.path().display(),
        token.expires_at
    );
    Ok(())
}

fn parse_range(start: &str, end: &str) -> Result<DateRange, AppError> {
    Ok(DateRange::new(ApiDate::parse(start)?, ApiDate::parse(end)?)?)
}

fn write_output<T: Serialize + ?Sized>(output: Option<&Path>, value: &T) -> Result<(), AppError> {
    match output {
        Some(path) => {
            write_pretty_atomic(path, value)?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|error| AppError::Parse(error.to_string()))?;
            println!("{json}");
        }
    }
    Ok(())
}
