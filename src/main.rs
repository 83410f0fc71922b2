use clap::Parser;

use shutter_bridge::cli::{self, Args, Command};
use shutter_bridge::config::Config;

/// Install the logger; `--verbose` lowers the default filter to debug.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match args.command {
        Command::Capabilities => cli::show_capabilities(&config),
        Command::Capture(capture) => {
            if let Err(e) = cli::run_captures(&config, &capture).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Config { action } => {
            cli::handle_config_action(action, &config, args.config.as_deref())
        }
    }
}
