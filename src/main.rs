//! Главный исполняемый файл queryeval

use clap::Parser;
use queryeval::cli::Cli;
use queryeval::Error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        print_error(&err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // RUST_LOG имеет приоритет над файлом, но не над --log-level
    let filter = match (&cli.log_level, std::env::var("RUST_LOG")) {
        (Some(level), _) => EnvFilter::try_new(level)?,
        (None, Ok(env)) => EnvFilter::try_new(env)?,
        (None, Err(_)) => EnvFilter::try_new(&config.logging.level)?,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    // Сообщения крейта пишутся через `log`
    tracing_log::LogTracer::init()?;

    cli.execute(config).await?;
    Ok(())
}

fn print_error(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(error) => eprintln!("{}: {}", error.kind(), error),
        None => eprintln!("{err}"),
    }
}
