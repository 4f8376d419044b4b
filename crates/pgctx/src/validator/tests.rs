use super::*;
use crate::test_fixtures::{invoice_catalog, invoice_profile};

fn customer_join() -> CustomJoin {
    CustomJoin::new("cust", "Customer").on("CustomerId", "=", "Id")
}

fn chain(depth: usize) -> CustomJoin {
    let mut join = CustomJoin::new(format!("j{depth}"), "Customer").on("Id", "=", "Id");
    for level in (1..depth).rev() {
        join = CustomJoin::new(format!("j{level}"), "Customer")
            .on("Id", "=", "Id")
            .nest(join);
    }
    join
}

#[test]
fn valid_join_has_no_errors() {
    let result = JoinValidator::new().validate(&customer_join(), &SchemaContext::new());
    assert!(result.is_valid(), "{:?}", result.errors);
}

#[test]
fn alias_with_space_is_rejected() {
    let join = CustomJoin::new("bad alias", "Customer").on("CustomerId", "=", "Id");
    let result = JoinValidator::new().validate(&join, &SchemaContext::new());
    assert_eq!(
        result.errors,
        vec!["Invalid alias 'bad alias'. Use only letters, numbers, and underscores."]
    );
}

#[test]
fn join_type_is_case_insensitive() {
    let join = customer_join().join_type("inner");
    assert!(JoinValidator::new().validate(&join, &SchemaContext::new()).is_valid());

    let join = customer_join().join_type("FULL");
    let result = JoinValidator::new().validate(&join, &SchemaContext::new());
    assert_eq!(
        result.errors,
        vec!["Invalid join type 'FULL'. Use LEFT, INNER, or RIGHT."]
    );
}

#[test]
fn all_problems_are_reported_together() {
    let join = CustomJoin::new("1x", "Customer")
        .on("CustomerId", "OR", "Id")
        .join_type("CROSS")
        .nest(CustomJoin::new("a-b", "Address").on("cust.AddressId", "=", "Id"));
    let result = JoinValidator::new().validate(&join, &SchemaContext::new());
    assert_eq!(result.errors.len(), 4);
    assert!(result.errors[0].starts_with("Invalid alias '1x'"));
    assert!(result.errors[1].starts_with("Invalid join type 'CROSS'"));
    assert_eq!(result.errors[2], "Invalid operator 'OR'");
    assert!(result.errors[3].starts_with("Invalid alias 'a-b'"));
}

#[test]
fn depth_four_is_reported_once() {
    let join = chain(4);
    assert_eq!(join.depth(), 4);
    let result = JoinValidator::new().validate(&join, &SchemaContext::new());
    assert_eq!(result.errors, vec!["Join depth 4 exceeds maximum of 3"]);
}

#[test]
fn depth_three_is_allowed() {
    let result = JoinValidator::new().validate(&chain(3), &SchemaContext::new());
    assert!(result.is_valid());
}

#[test]
fn nested_content_is_checked_past_the_depth_error() {
    let join = CustomJoin::new("a", "Customer").nest(
        CustomJoin::new("b", "Customer").nest(
            CustomJoin::new("c", "Customer").nest(CustomJoin::new("d d", "Customer")),
        ),
    );
    let result = JoinValidator::new().validate(&join, &SchemaContext::new());
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0], "Join depth 4 exceeds maximum of 3");
    assert!(result.errors[1].starts_with("Invalid alias 'd d'"));
}

#[test]
fn eleven_joins_exceed_the_total() {
    let joins: Vec<CustomJoin> = (0..11)
        .map(|i| CustomJoin::new(format!("j{i}"), "Customer").on("Id", "=", "Id"))
        .collect();
    let result = JoinValidator::new().validate_all(&joins, &SchemaContext::new());
    assert_eq!(result.errors, vec!["Total joins (11) exceeds maximum of 10"]);

    let result = JoinValidator::new().validate_all(&joins[..10], &SchemaContext::new());
    assert!(result.is_valid());
}

#[test]
fn total_counts_nested_joins() {
    let joins = vec![chain(3), chain(3).nest(CustomJoin::new("extra", "Customer"))];
    let validator = JoinValidator::with_limits(JoinLimits {
        max_depth: 3,
        max_joins: 6,
    });
    // aliases repeat across the two chains
    let result = validator.validate_all(&joins, &SchemaContext::new());
    assert!(result.errors.contains(&"Total joins (7) exceeds maximum of 6".to_string()));
    assert!(result.errors.contains(&"Duplicate join alias 'j1'".to_string()));
}

#[test]
fn aliases_must_not_shadow_root_or_includes() {
    let ctx = SchemaContext::for_profile(&invoice_profile());
    assert_eq!(ctx.reserved_aliases(), ["root", "Items"]);

    let joins = vec![
        CustomJoin::new("root", "Customer"),
        CustomJoin::new("Items", "Product"),
    ];
    let result = JoinValidator::new().validate_all(&joins, &ctx);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].contains("'root'"));
    assert!(result.errors[1].contains("'Items'"));
}

#[test]
fn validation_is_deterministic() {
    let joins = vec![
        chain(5),
        CustomJoin::new("bad alias", "X").on("a", "~", "b"),
    ];
    let validator = JoinValidator::new();
    let ctx = SchemaContext::new();
    assert_eq!(
        validator.validate_all(&joins, &ctx),
        validator.validate_all(&joins, &ctx)
    );
}

#[test]
fn into_result_gates_on_errors() {
    assert!(ValidationResult::default().into_result().is_ok());
    let err = ValidationResult::new(vec!["x".into()]).into_result().unwrap_err();
    assert!(matches!(err, CtxError::InvalidJoins(ref e) if e == &["x"]));
}

#[test]
fn profile_with_resolvable_fields_is_valid() {
    let profile = invoice_profile()
        .include("Items.Product")
        .allow("Items[].Product.Name")
        .join(
            customer_join().nest(
                CustomJoin::new("addr", "Address").on("cust.AddressId", "=", "Id"),
            ),
        )
        .allow("cust.Name")
        .allow("addr.City");
    let result = validate_profile(&profile, &invoice_catalog(), &JoinValidator::new());
    assert!(result.is_valid(), "{:?}", result.errors);
}

#[test]
fn profile_reports_unresolvable_parts() {
    let profile = ContextProfile::new("invoice", "SampleInvoice")
        .include("Payments")
        .allow("Nope")
        .allow("Items[].Description")
        .join(CustomJoin::new("w", "Warehouse"));
    let result = validate_profile(&profile, &invoice_catalog(), &JoinValidator::new());
    assert_eq!(result.errors.len(), 4, "{:?}", result.errors);
    assert!(result.errors[0].starts_with("Include path 'Payments'"));
    assert_eq!(result.errors[1], "Join 'w' targets unknown entity 'Warehouse'");
    assert_eq!(result.errors[2], "Allowed field 'Nope' cannot be resolved");
    assert_eq!(
        result.errors[3],
        "Allowed field 'Items[].Description' cannot be resolved"
    );
}

#[test]
fn profile_with_unknown_root_stops_early() {
    let profile = ContextProfile::new("x", "Missing").allow("Id");
    let result = validate_profile(&profile, &invoice_catalog(), &JoinValidator::new());
    assert_eq!(result.errors, vec!["Root entity 'Missing' is not registered"]);
}
