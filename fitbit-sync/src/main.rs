fn main() {
    if let Err(err) = fitbit_fetch::app::run_sync() {
        eprintln!("fitbit_sync: {err}");
        std::process::exit(1);
    }
}
