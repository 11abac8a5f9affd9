mod common;

use common::{fixture, rows, strings};
use quarry_core::ast::builder::*;
use quarry_core::config::CompileOptions;
use quarry_core::engine::compile;
use quarry_core::explain::ExplainConfig;
use quarry_core::types::datatype::DataType;
use quarry_error::ErrorKind;

#[test]
fn null_group_comes_last() {
    let fx = fixture();
    let table = fx.query(
        select([
            item(col("s.Quarter")),
            item_as(func("Sum", [col("s.Amount")]), "Total"),
            item_as(count_star(), "N"),
        ])
        .from(method("world", "Sales", [], "s"))
        .group_by([col("s.Quarter")])
        .into_query(),
    );
    assert_eq!(
        vec![
            vec!["Q1", "22", "3"],
            vec!["Q2", "20", "1"],
            vec!["Q3", "1", "1"],
            vec!["null", "100", "1"],
        ],
        rows(&table)
    );
    assert_eq!(DataType::Int64, table.columns()[1].datatype);
    assert_eq!(DataType::Int64, table.columns()[2].datatype);
    assert!(!table.columns()[2].nullable);
}

#[test]
fn having_and_order_by_aggregate() {
    let fx = fixture();
    let table = fx.query(
        select([item(col("s.Region")), item_as(func("Sum", [col("s.Amount")]), "Total")])
            .from(method("world", "Sales", [], "s"))
            .group_by([col("s.Region")])
            .having(func("Sum", [col("s.Amount")]).gt(int(15)))
            .into_query()
            .order_by(func("Sum", [col("s.Amount")]), false),
    );
    assert_eq!(vec![vec!["West", "105"], vec!["East", "37"]], rows(&table));
}

#[test]
fn repeated_aggregate_accumulates_once() {
    let fx = fixture();
    let query = select([
        item(col("s.Region")),
        item_as(func("Sum", [col("s.Amount")]), "Total"),
        item_as(func("Sum", [col("s.Amount")]).multiply(int(2)), "Double"),
    ])
    .from(method("world", "Sales", [], "s"))
    .group_by([col("s.Region")])
    .having(func("Sum", [col("s.Amount")]).gt(int(0)))
    .into_query()
    .order_by(func("sum", [col("s.Amount")]), true);

    let plan = compile(&query, &fx.registry, &CompileOptions::default()).unwrap();
    let explain = plan.explain(ExplainConfig::default());
    assert_eq!(1, explain.matches("Sum(").count(), "{explain}");

    let table = fx.query(query);
    assert_eq!(vec!["North", "East", "West"], strings(&table, "Region"));
    assert_eq!(vec!["2", "74", "210"], strings(&table, "Double"));
}

#[test]
fn global_aggregate_over_empty_input() {
    let fx = fixture();
    let table = fx.query(
        select([
            item_as(count_star(), "N"),
            item_as(func("Sum", [col("s.Amount")]), "Total"),
            item_as(func("Max", [col("s.Region")]), "Last"),
        ])
        .from(method("world", "Sales", [], "s"))
        .filter(col("s.Amount").gt(int(1000)))
        .into_query(),
    );
    assert_eq!(vec![vec!["0", "null", "null"]], rows(&table));
}

#[test]
fn avg_min_max() {
    let fx = fixture();
    let table = fx.query(
        select([
            item_as(func("Avg", [col("s.Amount")]), "Avg"),
            item_as(func("Min", [col("s.Amount")]), "Min"),
            item_as(func("Max", [col("s.Quarter")]), "Max"),
            item_as(func("Count", [col("s.Quarter")]), "Quarters"),
        ])
        .from(method("world", "Sales", [], "s"))
        .filter(col("s.Region").equals(string("West")))
        .into_query(),
    );
    assert_eq!(vec![vec!["52.5", "5", "Q1", "1"]], rows(&table));
    assert_eq!(DataType::Float64, table.columns()[0].datatype);
}

#[test]
fn group_by_expression() {
    let fx = fixture();
    let table = fx.query(
        select([
            item_as(func("Length", [col("s.Region")]), "Len"),
            item_as(count_star(), "N"),
        ])
        .from(method("world", "Sales", [], "s"))
        .group_by([func("Length", [col("s.Region")])])
        .into_query(),
    );
    // East and West both have four characters.
    assert_eq!(vec![vec!["4", "5"], vec!["5", "1"]], rows(&table));
}

#[test]
fn ungrouped_column_is_rejected() {
    let fx = fixture();
    let err = fx.compile_err(
        select([item(col("s.Region")), item(count_star())])
            .from(method("world", "Sales", [], "s"))
            .group_by([col("s.Quarter")])
            .into_query(),
    );
    assert_eq!(ErrorKind::InvalidGroupReference, err.kind());
    assert!(err.message().contains("Region"), "{err}");
}

#[test]
fn nested_aggregate_is_rejected() {
    let fx = fixture();
    let err = fx.compile_err(
        select([item(func("Sum", [func("Count", [col("s.Amount")])]))])
            .from(method("world", "Sales", [], "s"))
            .into_query(),
    );
    assert_eq!(ErrorKind::NestedAggregate, err.kind());
}

#[test]
fn aggregate_in_where_is_rejected() {
    let fx = fixture();
    let err = fx.compile_err(
        select([item(col("s.Region"))])
            .from(method("world", "Sales", [], "s"))
            .filter(func("Sum", [col("s.Amount")]).gt(int(1)))
            .into_query(),
    );
    assert_eq!(ErrorKind::InvalidArgument, err.kind());
}

#[test]
fn distinct_keeps_first_rows() {
    let fx = fixture();
    let table = fx.query(
        select([item(col("s.Region"))])
            .from(method("world", "Sales", [], "s"))
            .distinct()
            .into_query(),
    );
    assert_eq!(vec!["East", "West", "North"], strings(&table, "Region"));
}
