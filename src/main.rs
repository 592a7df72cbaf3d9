#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use anyhow::Result;
use infrastructure::backends::TurnServiceManager;
use yansi::Paint;

use crate::application::cli;
use crate::application::play;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::services::Session;

fn handle_error(err: Error) {
    eprintln!(
            "{}",
            Paint::red(format!(
                "Oh no! Foresight has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {}",
                env!("CARGO_PKG_VERSION"),
                env!("VERGEN_GIT_DESCRIBE"),
                err
            ))
        );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!(
            "\nRunning the following can help explain further what the issue is:\n\nRUST_BACKTRACE=1 {args}"
        );
        eprintln!(
            "\nA debug log can be written with RUST_LOG=foresight, see `foresight debug log-path` for where it lands."
        );
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn run() -> Result<()> {
    let service = TurnServiceManager::get()?;
    let session = Session::new(
        service,
        &Config::get(ConfigKey::OpeningPrompt),
        Config::get(ConfigKey::Prefetch) == "true",
    );

    return play::start(session).await;
}

#[tokio::main]
async fn main() {
    better_panic::install();

    let log_path = cli::log_path();
    let debug_log_dir = log_path
        .parent()
        .map(|dir| return dir.to_path_buf())
        .unwrap_or_default();

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("foresight")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    match cli::parse().await {
        Ok(true) => {}
        Ok(false) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    }

    if let Err(err) = run().await {
        handle_error(err);
    }

    process::exit(0);
}
