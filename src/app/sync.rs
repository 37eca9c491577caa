use clap::{Parser, Subcommand};

use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::fitbit_api::{FitbitClient, HealthDataSource};
use crate::app::AppError;
use crate::app::cli::GlobalArgs;
use crate::app::commands::CommandContext;
use crate::app::services::{SyncOutcome, SyncService};
use crate::domain::dates::ApiDate;
use crate::domain::models::SyncStatus;

#[derive(Debug, Parser)]
#[command(
    name = "fitbit_sync",
    version,
    about = "Fetch Fitbit data and upsert it into the local SQLite database"
)]
pub struct SyncCli {
    #[command(flatten)]
    pub global: GlobalArgs,
    /// SQLite database file [default: fitbit.db]
    #[arg(long, env = "FITBIT_DB_PATH", global = true)]
    pub db_path: Option<String>,
    #[command(subcommand)]
    pub command: SyncCommand,
}

#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Daily summary and 1-minute intraday heart rate for one day
    HeartRate {
        #[arg(long, default_value = "today")]
        date: String,
    },
    /// Heart rate for every day of a month; failed days are skipped
    HeartRateMonth {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },
    /// Sleep sessions and minute-level stages for one day
    Sleep {
        #[arg(long, default_value = "today")]
        date: String,
    },
    /// Daily activity summary for one day
    Activity {
        #[arg(long, default_value = "today")]
        date: String,
    },
    /// Paired devices and battery state
    Devices,
    /// Recent sync_log entries, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

pub fn execute<S: HealthDataSource>(
    command: SyncCommand,
    service: &mut SyncService<S>,
) -> Result<(), AppError> {
    let outcome = match command {
        SyncCommand::HeartRate { date } => service.sync_heart_rate(ApiDate::parse(&date)?)?,
        SyncCommand::HeartRateMonth { year, month } => {
            service.sync_heart_rate_month(year, month)?
        }
        SyncCommand::Sleep { date } => service.sync_sleep(ApiDate::parse(&date)?)?,
        SyncCommand::Activity { date } => service.sync_activity(ApiDate::parse(&date)?)?,
        SyncCommand::Devices => service.sync_devices()?,
        SyncCommand::History { limit } => {
            for entry in service.recent_syncs(limit)? {
                println!(
                    "{:>5}  {:<17} {:<10} {:<8} {:>6}  {}  {}",
                    entry.id,
                    entry.sync_type,
                    entry.sync_date.as_deref().unwrap_or("-"),
                    entry.status.as_str(),
                    entry.records_synced,
                    entry.started_at,
                    entry.error_message.as_deref().unwrap_or("")
                );
            }
            return Ok(());
        }
    };

    report(&outcome);
    Ok(())
}

fn report(outcome: &SyncOutcome) {
    match outcome.status {
        SyncStatus::Partial => eprintln!(
            "{} sync partially completed: {} records, failed days: {}",
            outcome.kind.as_str(),
            outcome.records_synced,
            outcome.failed_days.join(", ")
        ),
        _ => eprintln!(
            "{} sync completed: {} records",
            outcome.kind.as_str(),
            outcome.records_synced
        ),
    }
}

pub fn open_service(
    context: &CommandContext,
) -> Result<SyncService<FitbitClient>, AppError> {
    let db_path = &context.config().db_path;
    let mut connection = open_connection(db_path)?;
    run_migrations(&mut connection)?;
    tracing::debug!(db_path = %db_path, "database ready");

    Ok(SyncService::new(context.api()?, connection))
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use serde_json::{Value, json};

    use crate::adapters::fitbit_api::{ApiClientError, HealthDataSource};
    use crate::app::AppError;
    use crate::app::services::SyncService;
    use crate::domain::dates::{ApiDate, DetailLevel};
    use crate::domain::models::SyncStatus;
    use crate::test_support::open_test_connection;

    use super::{SyncCli, execute};

    struct DevicesOnly;

    impl HealthDataSource for DevicesOnly {
        fn heart_rate_intraday(&self, _: ApiDate, _: DetailLevel) -> Result<Value, ApiClientError> {
            Ok(json!({}))
        }

        fn sleep(&self, _: ApiDate) -> Result<Value, ApiClientError> {
            Ok(json!({"sleep": []}))
        }

        fn activity_summary(&self, _: ApiDate) -> Result<Value, ApiClientError> {
            Ok(json!({}))
        }

        fn devices(&self) -> Result<Value, ApiClientError> {
            Ok(json!([{"id": "dev-1", "type": "TRACKER"}]))
        }
    }

    fn parse(args: &[&str]) -> SyncCli {
        SyncCli::try_parse_from(std::iter::once("fitbit_sync").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn sync_cli_definition_is_consistent() {
        SyncCli::command().debug_assert();
    }

    #[test]
    fn rejects_out_of_range_month() {
        let result =
            SyncCli::try_parse_from(["fitbit_sync", "heart-rate-month", "--year", "2025", "--month", "13"]);
        assert!(result.is_err());
    }

    #[test]
    fn devices_command_runs_through_service() {
        let mut service = SyncService::new(DevicesOnly, open_test_connection("sync-cli-devices"));

        execute(parse(&["devices"]).command, &mut service).expect("devices sync should succeed");
        execute(parse(&["history", "--limit", "5"]).command, &mut service)
            .expect("history should print");

        let logs = service.recent_syncs(5).expect("sync log should be readable");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncStatus::Success);
    }

    #[test]
    fn invalid_date_is_rejected_before_sync() {
        let mut service = SyncService::new(DevicesOnly, open_test_connection("sync-cli-date"));

        let result = execute(parse(&["sleep", "--date", "10/01/2025"]).command, &mut service);

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(service.recent_syncs(5).expect("readable").is_empty());
    }
}
