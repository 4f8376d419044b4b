#![allow(dead_code)]

use pgctx::{ColumnType, EntityDef, SchemaCatalog};
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

/// Connect to `DATABASE_URL`, or `None` when it is not set.
pub async fn connect(test: &str) -> Option<Client> {
    let _ = dotenvy::dotenv();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set; skipping {test}");
        return None;
    };

    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .expect("connect to DATABASE_URL");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Some(client)
}

pub struct Seeded {
    pub invoice_id: Uuid,
    pub empty_invoice_id: Uuid,
}

/// Session-local invoice schema with one two-item invoice and one empty one.
pub async fn seed(client: &Client) -> Seeded {
    client
        .batch_execute(
            r#"
            CREATE TEMP TABLE "Regions" (
                "Id" bigint PRIMARY KEY,
                "Name" text NOT NULL
            );
            CREATE TEMP TABLE "Customers" (
                "Id" bigint PRIMARY KEY,
                "Name" text NOT NULL,
                "RegionId" bigint
            );
            CREATE TEMP TABLE "SampleInvoices" (
                "Id" uuid PRIMARY KEY,
                "Number" text NOT NULL,
                "CustomerId" bigint
            );
            CREATE TEMP TABLE "SampleInvoiceItems" (
                "Id" bigint PRIMARY KEY,
                "SampleInvoiceId" uuid NOT NULL,
                "Description" text NOT NULL,
                "Quantity" integer NOT NULL
            );
            INSERT INTO "Regions" VALUES (1, 'North');
            INSERT INTO "Customers" VALUES (7, 'Acme', 1);
            "#,
        )
        .await
        .expect("create schema");

    let invoice_id = Uuid::new_v4();
    let empty_invoice_id = Uuid::new_v4();
    client
        .execute(
            r#"INSERT INTO "SampleInvoices" VALUES ($1, 'INV-001', 7), ($2, 'INV-002', NULL)"#,
            &[&invoice_id, &empty_invoice_id],
        )
        .await
        .expect("insert invoices");
    client
        .execute(
            r#"INSERT INTO "SampleInvoiceItems" VALUES (10, $1, 'Widget', 2), (11, $1, 'Gadget', 5)"#,
            &[&invoice_id],
        )
        .await
        .expect("insert items");

    Seeded {
        invoice_id,
        empty_invoice_id,
    }
}

pub fn catalog() -> SchemaCatalog {
    SchemaCatalog::new()
        .with_entity(
            EntityDef::new("SampleInvoice", "SampleInvoices")
                .column("Id", ColumnType::Uuid)
                .column("Number", ColumnType::Text)
                .nullable_column("CustomerId", ColumnType::Int)
                .has_many("Items", "SampleInvoiceItem", "SampleInvoiceId")
                .belongs_to("Customer", "Customer", "CustomerId"),
        )
        .with_entity(
            EntityDef::new("SampleInvoiceItem", "SampleInvoiceItems")
                .column("Id", ColumnType::Int)
                .column("SampleInvoiceId", ColumnType::Uuid)
                .column("Description", ColumnType::Text)
                .column("Quantity", ColumnType::Int),
        )
        .with_entity(
            EntityDef::new("Customer", "Customers")
                .column("Id", ColumnType::Int)
                .column("Name", ColumnType::Text)
                .nullable_column("RegionId", ColumnType::Int)
                .belongs_to("Region", "Region", "RegionId"),
        )
        .with_entity(
            EntityDef::new("Region", "Regions")
                .column("Id", ColumnType::Int)
                .column("Name", ColumnType::Text),
        )
}
