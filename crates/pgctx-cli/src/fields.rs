use crate::cli::FieldsArgs;
use crate::output;
use crate::workspace::Workspace;
use comfy_table::Table;
use pgctx::{FieldKind, FieldNode};

pub async fn run(args: FieldsArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(&args.common, false).await?;
    let fetcher = workspace.fetcher();
    let profile = fetcher.profile(&args.context).await?;
    let tree = fetcher.field_tree(&profile)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    output::print_info(&format!("{} ({})", tree.context, tree.root_entity));
    let mut table = output::table(["Path", "Label", "Kind", "Type", "Nullable", "Target"]);
    add_rows(&mut table, &tree.fields, 0);
    println!("{table}");
    Ok(())
}

fn add_rows(table: &mut Table, nodes: &[FieldNode], depth: usize) {
    for node in nodes {
        let kind = match node.kind {
            FieldKind::Scalar => "scalar",
            FieldKind::Navigation => "navigation",
            FieldKind::Collection => "collection",
        };
        table.add_row(vec![
            format!("{}{}", "  ".repeat(depth), node.path),
            node.label.clone(),
            kind.to_string(),
            node.type_name.clone(),
            if node.is_nullable { "yes" } else { "no" }.to_string(),
            node.target_entity.clone().unwrap_or_default(),
        ]);
        add_rows(table, &node.fields, depth + 1);
    }
}
