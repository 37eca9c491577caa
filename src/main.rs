fn main() {
    if let Err(err) = fitbit_fetch::app::run() {
        eprintln!("fitbit: {err}");
        std::process::exit(1);
    }
}
