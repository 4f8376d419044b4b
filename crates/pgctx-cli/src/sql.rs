use crate::cli::SqlArgs;
use crate::output;
use crate::workspace::{Workspace, parse_id};
use pgctx::{EntityId, FetchPath};

pub async fn run(args: SqlArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(&args.common, false).await?;
    let fetcher = workspace.fetcher();
    let profile = fetcher.profile(&args.context).await?;

    if FetchPath::for_profile(&profile) == FetchPath::Graph {
        output::print_warning(&format!(
            "'{}' has no custom joins; fetch loads it as a graph, not with this statement",
            profile.context_name
        ));
    }

    let id = args.id.as_deref().map(parse_id).unwrap_or(EntityId::Int(0));
    let query = fetcher.build_query(&profile, &id)?;
    check_single_select(query.sql())?;

    println!("{}", query.sql());
    println!();

    let mut params = output::table(["Placeholder", "Name", "Value"]);
    for (i, param) in query.params().iter().enumerate() {
        let value = match &args.id {
            Some(_) => param.value.to_string(),
            None => "(pass --id)".to_string(),
        };
        params.add_row(vec![format!("${}", i + 1), param.name.to_string(), value]);
    }
    println!("{params}");

    output::print_success("statement parses as a single SELECT");
    Ok(())
}

/// Reject anything that is not exactly one SELECT statement.
pub fn check_single_select(sql: &str) -> anyhow::Result<()> {
    let parsed =
        pg_query::parse(sql).map_err(|e| anyhow::anyhow!("generated SQL does not parse: {e}"))?;

    let stmts = &parsed.protobuf.stmts;
    if stmts.len() != 1 {
        anyhow::bail!("expected one statement, found {}", stmts.len());
    }
    let node = stmts
        .first()
        .and_then(|s| s.stmt.as_ref())
        .and_then(|s| s.node.as_ref());
    match node {
        Some(pg_query::NodeEnum::SelectStmt(_)) => Ok(()),
        _ => anyhow::bail!("generated SQL is not a SELECT"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgctx::{ContextProfile, CustomJoin, QueryBuilder, SchemaCatalog};

    #[test]
    fn accepts_one_select() {
        check_single_select("SELECT 1").unwrap();
    }

    #[test]
    fn rejects_multiple_or_non_select_statements() {
        let err = check_single_select("SELECT 1; SELECT 2").unwrap_err();
        assert!(err.to_string().contains("expected one statement"));
        let err = check_single_select("DELETE FROM orders").unwrap_err();
        assert!(err.to_string().contains("not a SELECT"));
        assert!(check_single_select("SELEC nothing").is_err());
    }

    #[test]
    fn built_custom_join_query_is_a_select() {
        let catalog = SchemaCatalog::from_json(
            r#"{
                "entities": [
                    {"name": "Order", "table": "orders",
                     "columns": [{"name": "Id", "type": "big_int"}, {"name": "Ref"},
                                 {"name": "CustomerId", "type": "big_int"}]},
                    {"name": "Customer", "table": "customers",
                     "columns": [{"name": "Id", "type": "big_int"}, {"name": "Name"}]}
                ]
            }"#,
        )
        .unwrap();
        let profile = ContextProfile::new("order", "Order")
            .allow_all(["Ref", "cust.Name"])
            .join(CustomJoin::new("cust", "Customer").on("CustomerId", "=", "Id"));

        let query = QueryBuilder::new(&catalog)
            .build(&profile, &EntityId::Int(7))
            .unwrap();
        check_single_select(query.sql()).unwrap();
        assert_eq!(query.params().len(), 1);
    }
}
