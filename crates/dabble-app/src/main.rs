//! Main application entry point.

use clap::Parser;
use dabble_app::{App, AppConfig, Args};

fn main() {
    env_logger::init();
    log::info!("Starting Dabble");

    let config = match AppConfig::from_args(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid arguments: {}", e);
            eprintln!("dabble: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = App::with_config(config).run() {
        log::error!("Dabble exited with an error: {}", e);
        std::process::exit(1);
    }
}
