use std::{env, process::ExitCode};

use log::error;
use participation_core::{default_log_level, init_logging};
use participation_server::{config::Config, start_server};

#[tokio::main]
async fn main() -> ExitCode {
    let level = env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level().to_string());
    let log_dir = env::var("LOG_DIR").ok().filter(|dir| !dir.trim().is_empty());
    if let Err(err) = init_logging(&level, log_dir.as_deref()) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("event=config_load module=config status=error error={err}");
            return ExitCode::FAILURE;
        }
    };

    match start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=server status=error error={err}");
            ExitCode::FAILURE
        }
    }
}
