use clap::Parser;
use codegraph_index::cli::Cli;
use codegraph_index::config::Settings;
use codegraph_index::logging;

fn main() {
    let cli = Cli::parse();

    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        Settings::default()
    });

    logging::init_with_config(&settings.logging);

    if let Err(e) = codegraph_index::cli::run(cli, settings) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
