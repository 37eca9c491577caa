use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::config::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "fitbit",
    version,
    about = "Authenticate against the Fitbit Web API and download health data as JSON"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// OAuth client id of the registered Fitbit application
    #[arg(long, env = "FITBIT_CLIENT_ID", global = true)]
    pub client_id: Option<String>,
    /// OAuth client secret
    #[arg(long, env = "FITBIT_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,
    /// Redirect URL registered for the application [default: http://localhost:8080/redirect]
    #[arg(long, env = "FITBIT_REDIRECT_URL", global = true)]
    pub redirect_url: Option<String>,
    /// Token file [default: .fitbit_tokens.json]
    #[arg(long, env = "FITBIT_TOKEN_FILE", global = true)]
    pub token_file: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_url: self.redirect_url.clone(),
            token_file: self.token_file.clone(),
            db_path: None,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the browser authorization flow and store the tokens
    Login {
        /// Requested scope; repeat for several [default: activity heartrate profile sleep]
        #[arg(long = "scope", value_name = "SCOPE")]
        scopes: Vec<String>,
        /// Seconds to wait for the redirect [default: FITBIT_LOGIN_TIMEOUT_SECS or 120]
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Exchange the stored refresh token for a new token pair
    Refresh,
    /// Delete the stored token file
    Logout,
    /// User profile; printed to stdout unless --output is given
    Profile {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Paired devices; printed to stdout unless --output is given
    Devices {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Daily heart rate summaries for a date range
    DownloadHeartrate {
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
        #[arg(long, default_value = "heart_rate_data.json")]
        output: PathBuf,
    },
    /// Intraday heart rate for one day
    DownloadIntraday {
        #[arg(long, default_value = "today")]
        date: String,
        /// One of 1sec, 1min, 5min, 15min
        #[arg(long, default_value = "1min")]
        detail_level: String,
        #[arg(long, default_value = "heart_rate_intraday.json")]
        output: PathBuf,
    },
    /// Sleep logs for one day
    DownloadSleep {
        #[arg(long, default_value = "today")]
        date: String,
        #[arg(long, default_value = "sleep_data.json")]
        output: PathBuf,
    },
    /// Sleep logs for a date range of at most 100 days
    DownloadSleepRange {
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
        #[arg(long, default_value = "sleep_range.json")]
        output: PathBuf,
    },
    /// Daily activity summary for one day
    DownloadActivity {
        #[arg(long, default_value = "today")]
        date: String,
        #[arg(long, default_value = "activity_summary.json")]
        output: PathBuf,
    },
}
