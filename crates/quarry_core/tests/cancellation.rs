mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{fixture, world};
use quarry_core::ast::builder::*;
use quarry_core::ast::{Pivot, PivotValues};
use quarry_core::config::CompileOptions;
use quarry_core::datasource::DataSourceRegistry;
use quarry_core::datasource::memory::{MemoryMethod, MemoryRow};
use quarry_core::engine::{compile, run};
use quarry_core::execution::context::CancellationToken;
use quarry_core::types::datatype::DataType;
use quarry_error::ErrorKind;

#[test]
fn canceled_before_run() {
    let fx = fixture();
    let plan = compile(
        &select([wildcard()]).from(method("world", "Countries", [], "c")).into_query(),
        &fx.registry,
        &CompileOptions::default(),
    )
    .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let err = run(&plan, &token).unwrap_err();
    assert_eq!(ErrorKind::Canceled, err.kind());

    let countries = fx.world.memory_method("Countries").unwrap();
    assert_eq!(0, countries.num_scans());
}

/// Registry whose `Tripwire` method echoes its argument and cancels `token`
/// when called with 3.
fn tripwire_registry(token: &CancellationToken, calls: &Arc<AtomicUsize>) -> DataSourceRegistry {
    let tripwire = {
        let token = token.clone();
        let calls = calls.clone();
        MemoryMethod::new_generated("Tripwire", "Number", [("n", DataType::Int64)], move |args| {
            calls.fetch_add(1, Ordering::SeqCst);
            if args[0].try_as_i64()? == 3 {
                token.cancel();
            }
            Ok(vec![MemoryRow::new(vec![args[0].clone()])])
        })
    };

    let mut registry = DataSourceRegistry::new();
    registry.register(Arc::new(world().with_method(tripwire))).unwrap();
    registry
}

fn tripwire_numbers() -> quarry_core::ast::Query {
    select([item(col("t.N"))])
        .from(method("world", "Range", [int(1000)], "r").cross_apply(apply_method(
            "world",
            "Tripwire",
            [col("r.N")],
            "t",
        )))
        .into_query()
}

#[test]
fn canceled_while_running() {
    logutil::init_test();

    let token = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = tripwire_registry(&token, &calls);

    let query = tripwire_numbers();
    let plan = compile(&query, &registry, &CompileOptions::default()).unwrap();

    let err = run(&plan, &token).unwrap_err();
    assert_eq!(ErrorKind::Canceled, err.kind());
    assert!(calls.load(Ordering::SeqCst) < 10);

    // A fresh token runs the same plan to completion.
    let table = run(&plan, &CancellationToken::new()).unwrap();
    assert_eq!(1000, table.num_rows());
}

#[test]
fn canceled_while_discovering_pivot_values() {
    logutil::init_test();

    let token = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = tripwire_registry(&token, &calls);

    let query = select([wildcard()])
        .from(method("world", "Sales", [], "s").pivot(Pivot::new(
            [("Count", col("s.Region"))],
            "s.Amount",
            PivotValues::Subquery(Box::new(tripwire_numbers())),
        )))
        .into_query();
    let plan = compile(&query, &registry, &CompileOptions::default()).unwrap();
    assert_eq!(0, calls.load(Ordering::SeqCst));

    let err = run(&plan, &token).unwrap_err();
    assert_eq!(ErrorKind::Canceled, err.kind());
    assert!(calls.load(Ordering::SeqCst) < 10);
}
