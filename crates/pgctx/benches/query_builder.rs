use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgctx::{
    ColumnType, ContextProfile, CustomJoin, EntityDef, EntityId, FlatRow, QueryBuilder,
    SchemaCatalog, shape_rows,
};

fn catalog() -> SchemaCatalog {
    SchemaCatalog::new()
        .with_entity(
            EntityDef::new("Invoice", "Invoices")
                .column("Id", ColumnType::Int)
                .column("Number", ColumnType::Text)
                .column("CustomerId", ColumnType::Int)
                .has_many("Items", "Item", "InvoiceId"),
        )
        .with_entity(
            EntityDef::new("Item", "Items")
                .column("Id", ColumnType::Int)
                .column("InvoiceId", ColumnType::Int)
                .column("Description", ColumnType::Text)
                .column("Quantity", ColumnType::Int),
        )
        .with_entity(
            EntityDef::new("Customer", "Customers")
                .column("Id", ColumnType::Int)
                .column("Name", ColumnType::Text)
                .column("RegionId", ColumnType::Int),
        )
        .with_entity(
            EntityDef::new("Region", "Regions")
                .column("Id", ColumnType::Int)
                .column("Name", ColumnType::Text),
        )
}

/// `n` customer joins, each with a nested region join.
fn profile_with_joins(n: usize) -> ContextProfile {
    let mut profile = ContextProfile::new("bench", "Invoice")
        .include("Items")
        .allow_all(["Number", "Items[].Description", "Items[].Quantity"]);
    for i in 0..n {
        let alias = format!("c{i}");
        profile = profile
            .join(
                CustomJoin::new(alias.clone(), "Customer")
                    .on("CustomerId", "=", "Id")
                    .nest(CustomJoin::new(format!("r{i}"), "Region").on(
                        format!("{alias}.RegionId"),
                        "=",
                        "Id",
                    )),
            )
            .allow(format!("{alias}.Name"))
            .allow(format!("r{i}.Name"));
    }
    profile
}

fn bench_build(c: &mut Criterion) {
    let catalog = catalog();
    let builder = QueryBuilder::new(&catalog);
    let id = EntityId::Int(1);
    let mut group = c.benchmark_group("query_builder/build");

    for n in [0, 1, 3, 5] {
        let profile = profile_with_joins(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &profile, |b, profile| {
            b.iter(|| black_box(builder.build(profile, &id)));
        });
    }

    group.finish();
}

fn item_rows(n: usize) -> Vec<FlatRow> {
    (0..n)
        .map(|i| {
            FlatRow::new()
                .with("root_Id", 1i64)
                .with("Number", "INV-001")
                .with("Items_Id", (i / 2) as i64)
                .with("Items_Description", format!("item {}", i / 2))
                .with("Items_Quantity", i as i64)
        })
        .collect()
}

fn bench_shape(c: &mut Criterion) {
    let profile = profile_with_joins(0);
    let mut group = c.benchmark_group("query_builder/shape_rows");

    for n in [1, 10, 100, 1000] {
        let rows = item_rows(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &rows, |b, rows| {
            b.iter(|| black_box(shape_rows(rows, &profile)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_shape);
criterion_main!(benches);
