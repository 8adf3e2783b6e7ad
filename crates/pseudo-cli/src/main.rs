mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use commands::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        cli::Commands::Run {
            inputs,
            spans,
            out_dir,
            mapping,
            shared,
            continue_from,
            recursive,
            numbering,
            stats,
        } => {
            let options = commands::run::RunOptions {
                inputs,
                spans,
                out_dir,
                mapping,
                shared,
                continue_from,
                recursive,
                numbering,
                stats,
            };
            commands::run::handle(load_config(config_path)?, options).await
        }
        cli::Commands::Restore {
            input,
            mapping,
            output,
            lenient,
        } => commands::restore::handle(&load_config(config_path)?, input, mapping, output, lenient),
        cli::Commands::Preview {
            input,
            spans,
            mapping,
            kinds,
            json,
        } => commands::preview::handle(load_config(config_path)?, input, spans, mapping, kinds, json),
        cli::Commands::Instantiate {
            templates,
            bindings,
            terms,
            count,
            section,
            json,
            output,
        } => commands::instantiate::handle(templates, bindings, terms, count, section, json, output),
        cli::Commands::Init { path, force } => commands::init::handle(path, force),
    }
}
