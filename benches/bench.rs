use std::time::Duration;

use binder::{record, Column, Config, Conn, QueryCol, Table};
use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use tokio::runtime::Runtime;

static BOOK: Lazy<Table> = Lazy::new(|| {
    Table::new(
        "book",
        [
            Column::auto_id("id"),
            Column::string("title").not_null(),
            Column::int("author_id"),
        ],
    )
});

async fn setup() -> Conn {
    let conn = binder::connect(&Config::new("sqlite::memory:"))
        .await
        .expect("benchmark setup: failed to connect");
    conn.create_table(&BOOK)
        .await
        .expect("benchmark setup: failed to create table");

    for i in 0..1_000 {
        let mut book = record!(BOOK, title = format!("book {i}"), author_id = i % 10)
            .expect("benchmark setup: bad record");
        conn.insert(&BOOK, &mut book)
            .await
            .expect("benchmark setup: failed to insert");
    }
    conn.commit()
        .await
        .expect("benchmark setup: failed to commit");

    conn
}

fn bench_main(criterion: &mut Criterion) {
    let runtime = Runtime::new().expect("failed to create runtime");
    let conn = runtime.block_on(setup());

    criterion.bench_function("get-by-id", |bench| {
        bench.to_async(&runtime).iter(|| async {
            conn.get(&BOOK, 500).await.expect("failed to query");
        })
    });

    criterion.bench_function("select-by-author", |bench| {
        bench.to_async(&runtime).iter(|| async {
            conn.select(&BOOK, QueryCol::new("author_id").eq(3), &[])
                .await
                .expect("failed to query");
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .measurement_time(Duration::from_secs(5));
    targets = bench_main
}
criterion_main!(benches);
