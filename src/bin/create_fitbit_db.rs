use std::path::PathBuf;

use clap::Parser;
use fitbit_fetch::adapters::db::{open_connection, run_migrations, schema_version};

/// Create or migrate an empty Fitbit SQLite database.
#[derive(Debug, Parser)]
#[command(name = "create_fitbit_db")]
struct Args {
    /// Target sqlite file
    #[arg(long, env = "FITBIT_DB_PATH", default_value = "fitbit.db")]
    path: PathBuf,
    /// Delete an existing file before creating
    #[arg(long)]
    force: bool,
}

fn main() {
    if let Err(error) = run(Args::parse()) {
        eprintln!("failed to create fitbit db: {error}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    if let Some(parent) = args.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create parent directory: {error}"))?;
    }

    if args.force && args.path.exists() {
        std::fs::remove_file(&args.path)
            .map_err(|error| format!("failed to remove existing db file: {error}"))?;
    }

    let path = args.path.to_string_lossy();
    let mut connection = open_connection(&path).map_err(|error| error.to_string())?;
    run_migrations(&mut connection).map_err(|error| error.to_string())?;
    let version = schema_version(&connection).map_err(|error| error.to_string())?;

    println!("created/updated fitbit db at: {path}");
    println!("schema version: {version}");
    Ok(())
}
