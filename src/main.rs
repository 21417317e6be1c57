use clap::Parser;
use std::process::ExitCode;

use mailsling::cli::Cli;
use mailsling::config::get_configuration;
use mailsling::startup::Application;
use mailsling::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = get_subscriber(String::from("mailsling"), String::from("info"), std::io::stdout);
    if let Err(err) = init_subscriber(subscriber) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    let config = match get_configuration() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let application = match Application::build(config).await {
        Ok(application) => application,
        Err(err) => {
            tracing::error!("Failed to start: {:?}", err);
            return ExitCode::FAILURE;
        }
    };

    match application.run(cli.poll, cli.process).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
