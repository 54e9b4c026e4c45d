use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    pagevault::logging::init().context("init logging")?;

    let cli = pagevault::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        pagevault::cli::Command::Serve(args) => {
            let mut config =
                pagevault::config::VaultConfig::load(&args.config).context("load config")?;
            if let Some(addr) = args.addr {
                config.listen_addr = addr;
            }
            pagevault::server::serve(config).await.context("serve")?;
        }
        pagevault::cli::Command::Capture(args) => {
            let config =
                pagevault::config::VaultConfig::load(&args.config).context("load config")?;
            let capturer = pagevault::capture::Capturer::new(config).context("build capturer")?;
            let outcome = capturer.run(&args.url).await;
            match &outcome.directory_name {
                Some(name) => println!("{name}"),
                None => tracing::warn!("nothing staged for this capture"),
            }
            tracing::info!(
                assets_attempted = outcome.assets_attempted,
                assets_failed = outcome.assets_failed,
                text_sent = outcome.text_sent,
                "capture finished"
            );
        }
        pagevault::cli::Command::Organize(args) => {
            let config =
                pagevault::config::VaultConfig::load(&args.config).context("load config")?;
            let moved = pagevault::vault::place(&config, &args.directory_name, &args.url)
                .context("place capture")?;
            for pdf in moved {
                println!("{pdf}");
            }
        }
    }

    Ok(())
}
