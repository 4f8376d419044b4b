use super::*;
use crate::test_fixtures::{invoice_catalog, invoice_profile};
use uuid::Uuid;

fn id() -> EntityId {
    EntityId::Uuid(Uuid::nil())
}

#[test]
fn invoice_with_items() {
    let catalog = invoice_catalog();
    let query = QueryBuilder::new(&catalog)
        .build(&invoice_profile(), &id())
        .unwrap();

    assert_eq!(
        query.sql(),
        r#"SELECT
    "root"."Id" AS "root_Id",
    "root"."Number" AS "Number",
    "Items"."Id" AS "Items_Id",
    "Items"."Description" AS "Items_Description",
    "Items"."Quantity" AS "Items_Quantity"
FROM "SampleInvoices" AS "root"
LEFT JOIN "SampleInvoiceItems" AS "Items" ON "root"."Id" = "Items"."SampleInvoiceId"
WHERE "root"."Id" = $1"#
    );
    assert_eq!(query.params().len(), 1);
    assert_eq!(query.params()[0].name, "Id");
    assert_eq!(query.params()[0].value, id());
    assert_eq!(query.params_ref().len(), 1);
}

#[test]
fn forward_reference_joins_on_source_foreign_key() {
    let catalog = invoice_catalog();
    let profile = ContextProfile::new("invoice", "SampleInvoice")
        .include("Customer")
        .allow("Customer.Name");
    let sql = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap()
        .sql()
        .to_string();
    assert!(sql.contains(r#""Customer"."Name" AS "Customer_Name""#));
    assert!(sql.contains(
        r#"LEFT JOIN "Customers" AS "Customer" ON "root"."CustomerId" = "Customer"."Id""#
    ));
    assert!(!sql.contains("Customer_Id"));
}

#[test]
fn two_hop_include_chains_from_prefix_alias() {
    let catalog = invoice_catalog();
    let profile = invoice_profile()
        .include("Items.Product")
        .allow("Items[].Product.Name");
    let sql = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap()
        .sql()
        .to_string();

    // `Items` is joined once even though two includes start with it
    assert_eq!(sql.matches(r#"AS "Items" ON"#).count(), 1);
    assert!(sql.contains(
        r#"LEFT JOIN "Products" AS "Items_Product" ON "Items"."ProductId" = "Items_Product"."Id""#
    ));
    assert!(sql.contains(r#""Items_Product"."Name" AS "Items_Product_Name""#));
    assert_eq!(sql.matches(r#"AS "Items_Id""#).count(), 1);
}

#[test]
fn custom_joins_resolve_left_alias() {
    let catalog = invoice_catalog();
    let profile = ContextProfile::new("invoice", "SampleInvoice")
        .allow("cust.Name")
        .allow("addr.City")
        .join(
            CustomJoin::new("cust", "Customer")
                .on("CustomerId", "=", "Id")
                .join_type("inner")
                .nest(CustomJoin::new("addr", "Address").on("cust.AddressId", "=", "Id")),
        );
    let query = QueryBuilder::new(&catalog).build(&profile, &id()).unwrap();
    assert_eq!(
        query.sql(),
        r#"SELECT
    "root"."Id" AS "root_Id",
    "cust"."Name" AS "cust_Name",
    "addr"."City" AS "addr_City"
FROM "SampleInvoices" AS "root"
INNER JOIN "Customers" AS "cust" ON "root"."CustomerId" = "cust"."Id"
LEFT JOIN "Addresses" AS "addr" ON "cust"."AddressId" = "addr"."Id"
WHERE "root"."Id" = $1"#
    );
}

#[test]
fn collection_through_custom_join() {
    let catalog = invoice_catalog();
    let profile = ContextProfile::new("invoice", "SampleInvoice")
        .allow("pay[].Amount")
        .join(CustomJoin::new("pay", "Payment").on("Id", "=", "InvoiceId"));
    let sql = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap()
        .sql()
        .to_string();
    assert!(sql.contains(r#""pay"."Id" AS "pay_Id""#));
    assert!(sql.contains(r#""pay"."Amount" AS "pay_Amount""#));
}

#[test]
fn unsafe_alias_is_a_security_error() {
    let catalog = invoice_catalog();
    let profile = invoice_profile()
        .join(CustomJoin::new("bad alias", "Customer").on("CustomerId", "=", "Id"));
    let err = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap_err();
    assert!(err.is_security(), "{err}");
}

#[test]
fn unsafe_identifiers_are_rejected_everywhere() {
    let catalog = invoice_catalog();
    let cases = [
        invoice_profile().allow("Number; DROP TABLE x"),
        invoice_profile().allow("Items[].Desc\"ription"),
        invoice_profile().join(CustomJoin::new("c", "Customer").on("Customer Id", "=", "Id")),
        invoice_profile().join(CustomJoin::new("c", "Customer").on("CustomerId", "=", "Id--")),
        invoice_profile().join(CustomJoin::new("c", "Customer").on("CustomerId", "OR 1=1", "Id")),
        invoice_profile().join(
            CustomJoin::new("c", "Customer")
                .on("CustomerId", "=", "Id")
                .join_type("CROSS"),
        ),
    ];
    for profile in cases {
        let err = QueryBuilder::new(&catalog)
            .build(&profile, &id())
            .unwrap_err();
        assert!(err.is_security(), "{err}");
    }
}

#[test]
fn unsafe_table_name_in_catalog_is_rejected() {
    let catalog = SchemaCatalog::new().with_entity(
        crate::catalog::EntityDef::new("Odd", "public.odd")
            .column("Id", crate::catalog::ColumnType::Int),
    );
    let profile = ContextProfile::new("odd", "Odd");
    let err = QueryBuilder::new(&catalog)
        .build(&profile, &EntityId::Int(1))
        .unwrap_err();
    assert!(err.is_security());
}

#[test]
fn unknown_left_alias_is_rejected() {
    let catalog = invoice_catalog();
    let profile = invoice_profile()
        .join(CustomJoin::new("addr", "Address").on("cust.AddressId", "=", "Id"));
    let err = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap_err();
    assert!(matches!(err, CtxError::Validation(ref m) if m.contains("'cust'")));
}

#[test]
fn unresolved_field_prefix_is_rejected() {
    let catalog = invoice_catalog();
    let profile = invoice_profile().allow("Customer.Name");
    let err = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap_err();
    assert!(matches!(err, CtxError::Validation(_)));
}

#[test]
fn duplicate_alias_is_rejected() {
    let catalog = invoice_catalog();
    let profile = invoice_profile().join(CustomJoin::new("Items", "Product").on("Id", "=", "Id"));
    let err = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap_err();
    assert!(matches!(err, CtxError::Validation(ref m) if m.contains("'Items'")));
}

#[test]
fn unknown_include_is_navigation_not_found() {
    let catalog = invoice_catalog();
    let profile = invoice_profile().include("Payments");
    let err = QueryBuilder::new(&catalog)
        .build(&profile, &id())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn unknown_root_is_entity_not_found() {
    let catalog = invoice_catalog();
    let err = QueryBuilder::new(&catalog)
        .build(&ContextProfile::new("x", "Nope"), &id())
        .unwrap_err();
    assert!(matches!(err, CtxError::EntityNotFound(_)));
}

#[test]
fn truncation_respects_char_boundaries() {
    assert_eq!(truncate_sql_bytes("SELECT", 10), "SELECT");
    assert_eq!(truncate_sql_bytes("SELECT", 3), "SEL");
    assert_eq!(truncate_sql_bytes("é", 1), "");
}
