//! Shared invoice schema used across unit tests.

use crate::catalog::{ColumnType, EntityDef, SchemaCatalog};
use crate::profile::ContextProfile;

pub(crate) fn invoice_catalog() -> SchemaCatalog {
    SchemaCatalog::new()
        .with_entity(
            EntityDef::new("SampleInvoice", "SampleInvoices")
                .column("Id", ColumnType::Uuid)
                .column("Number", ColumnType::Text)
                .column("Date", ColumnType::Timestamp)
                .column("CustomerName", ColumnType::Text)
                .nullable_column("CustomerId", ColumnType::Uuid)
                .has_many("Items", "SampleInvoiceItem", "SampleInvoiceId")
                .belongs_to("Customer", "Customer", "CustomerId"),
        )
        .with_entity(
            EntityDef::new("SampleInvoiceItem", "SampleInvoiceItems")
                .column("Id", ColumnType::Uuid)
                .column("SampleInvoiceId", ColumnType::Uuid)
                .column("Description", ColumnType::Text)
                .column("Quantity", ColumnType::Int)
                .column("UnitPrice", ColumnType::Decimal)
                .nullable_column("ProductId", ColumnType::Uuid)
                .belongs_to("Product", "Product", "ProductId")
                .belongs_to("SampleInvoice", "SampleInvoice", "SampleInvoiceId"),
        )
        .with_entity(
            EntityDef::new("Product", "Products")
                .column("Id", ColumnType::Uuid)
                .column("Name", ColumnType::Text)
                .column("Sku", ColumnType::Text),
        )
        .with_entity(
            EntityDef::new("Customer", "Customers")
                .column("Id", ColumnType::Uuid)
                .column("Name", ColumnType::Text)
                .nullable_column("AddressId", ColumnType::Uuid),
        )
        .with_entity(
            EntityDef::new("Address", "Addresses")
                .column("Id", ColumnType::Uuid)
                .column("City", ColumnType::Text)
                .column("Country", ColumnType::Text),
        )
        .with_entity(
            EntityDef::new("Payment", "Payments")
                .column("Id", ColumnType::Uuid)
                .column("InvoiceId", ColumnType::Uuid)
                .column("Amount", ColumnType::Decimal),
        )
}

/// Invoice number plus item description and quantity.
pub(crate) fn invoice_profile() -> ContextProfile {
    ContextProfile::new("invoice", "SampleInvoice")
        .include("Items")
        .allow_all(["Number", "Items[].Description", "Items[].Quantity"])
}
