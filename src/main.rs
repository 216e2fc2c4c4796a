use clap::Parser;
use comparesync::adapter::inbound::cli::command::Cli;
use comparesync::adapter::inbound::cli::{output, run};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tokio::select! {
        result = run::execute(cli) => {
            if let Err(e) = result {
                output::error(&e.to_string());
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Interrupted");
            std::process::exit(130);
        }
    }
}
