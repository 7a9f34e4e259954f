//! digit-ingest - collects labelled digit drawings over HTTP
//!
//! Serves the drawing pad client: POST stores `{label, id, img}` submissions
//! under the data directory, GET lists the submitters recorded so far.

use std::process::ExitCode;

use log::{error, info, warn};

use digit_ingest::modules::config::{parse_args, Command, USAGE};
use digit_ingest::modules::server_logger;
use digit_ingest::{Server, ServerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut config = ServerConfig::default();
    let env_warnings = config.apply_env();

    let config = match parse_args(config, lexopt::Parser::from_env()) {
        Ok(Command::Serve(config)) => config,
        Ok(Command::Help) => {
            print!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            println!("digit-ingest {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Try 'digit-ingest --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = server_logger::init(config.log_level, config.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    for warning in env_warnings {
        warn!("{}", warning);
    }

    info!("Storing submissions under {}", config.data_dir.display());

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match server.local_addr() {
        Ok(addr) => info!("Serving at {}...", addr),
        Err(_) => info!("Serving at {}...", config.listen_address()),
    }

    server.run().await;
    ExitCode::SUCCESS
}
