use crate::cli::FetchArgs;
use crate::workspace::{Workspace, parse_id};
use tokio_util::sync::CancellationToken;

pub async fn run(args: FetchArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(&args.common, true).await?;
    let fetcher = workspace.fetcher();
    let client = workspace.client()?;
    let id = parse_id(&args.id);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling query");
            on_interrupt.cancel();
        }
    });
    let fetched = fetcher.fetch(client, &args.context, &id, &cancel).await;
    watcher.abort();

    let Some(value) = fetched? else {
        anyhow::bail!("'{}' has no root entity with Id '{id}'", args.context);
    };

    let json = if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    println!("{json}");
    Ok(())
}
