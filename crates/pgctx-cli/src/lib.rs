mod cli;
mod config;
mod fetch;
mod fields;
mod output;
mod sql;
mod validate;
mod workspace;

use tracing_subscriber::EnvFilter;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    match cli::parse_args(&args)? {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Validate(args) => validate::run(args).await,
        cli::Command::Sql(args) => sql::run(args).await,
        cli::Command::Fetch(args) => fetch::run(args).await,
        cli::Command::Fields(args) => fields::run(args).await,
    }
}

/// Logs go to stderr so command output stays pipeable. `PGCTX_LOG` wins over `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("PGCTX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
