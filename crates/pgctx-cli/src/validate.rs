use crate::cli::ValidateArgs;
use crate::output;
use crate::workspace::Workspace;
use comfy_table::{Cell, Color};
use pgctx::FetchPath;

pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(&args.common, false).await?;
    let fetcher = workspace.fetcher();

    let names = match (args.context, workspace.profile_names()) {
        (Some(context), _) => vec![context],
        (None, Some(names)) => names,
        (None, None) => {
            anyhow::bail!("profiles are stored in a table; pass the context to validate")
        }
    };
    if names.is_empty() {
        anyhow::bail!("no profiles to validate");
    }

    let mut table = output::table(["Context", "Root entity", "Path", "Result"]);
    let mut failed = 0usize;
    for name in &names {
        let profile = fetcher.profile(name).await?;
        let path = match FetchPath::for_profile(&profile) {
            FetchPath::CustomJoins => "custom joins",
            FetchPath::Graph => "graph",
        };
        let result = fetcher.validate(&profile);
        let cell = if result.is_valid() {
            Cell::new("ok").fg(Color::Green)
        } else {
            failed += 1;
            Cell::new(result.errors.join("\n")).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&profile.context_name),
            Cell::new(&profile.root_entity),
            Cell::new(path),
            cell,
        ]);
    }
    println!("{table}");

    if failed > 0 {
        anyhow::bail!("{failed} of {} profile(s) failed validation", names.len());
    }
    output::print_success(&format!("{} profile(s) valid", names.len()));
    Ok(())
}
