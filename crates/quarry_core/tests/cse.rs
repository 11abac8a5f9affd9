mod common;

use common::{fixture, rows};
use quarry_core::ast::Query;
use quarry_core::ast::builder::*;
use quarry_core::config::CompileOptions;
use quarry_core::engine::compile;
use quarry_core::explain::ExplainConfig;

fn no_cse() -> CompileOptions {
    CompileOptions {
        enable_cse: false,
        ..Default::default()
    }
}

fn name_lengths() -> Query {
    let len = || func("Length", [col("c.Name")]);
    select([
        item(col("c.Name")),
        item_as(len().multiply(int(2)), "Double"),
        item_as(len().plus(int(1)), "Next"),
    ])
    .from(method("world", "Countries", [], "c"))
    .filter(len().gt(int(4)))
    .into_query()
    .order_by(len(), true)
}

#[test]
fn shared_expressions_give_the_same_rows() {
    let fx = fixture();
    let shared = fx.query(name_lengths());
    let unshared = fx.query_with(name_lengths(), &no_cse());
    assert_eq!(rows(&unshared), rows(&shared));
    assert_eq!(
        vec![
            vec!["Japan", "10", "6"],
            vec!["Canada", "12", "7"],
            vec!["France", "12", "7"],
            vec!["Germany", "14", "8"],
            vec!["Atlantis", "16", "9"],
        ],
        rows(&shared)
    );
}

#[test]
fn explain_shows_shared_slots() {
    let fx = fixture();
    let explain = |options: &CompileOptions| {
        compile(&name_lengths(), &fx.registry, options)
            .unwrap()
            .explain(ExplainConfig::default())
    };
    assert!(explain(&CompileOptions::default()).contains("$shared0"));
    assert!(!explain(&no_cse()).contains("$shared"));
}

#[test]
fn random_numbers_are_never_shared() {
    let fx = fixture();
    let random = || func("RandomNumber", [int(0), int(1_000_000)]);
    let query = select([item_as(random(), "A"), item_as(random(), "B")])
        .from(method("world", "Range", [int(50)], "r"))
        .into_query();

    let plan = compile(&query, &fx.registry, &CompileOptions::default()).unwrap();
    assert!(!plan.explain(ExplainConfig::default()).contains("$shared"));

    let table = fx.query(query);
    assert_eq!(50, table.num_rows());
    assert!(rows(&table).iter().any(|row| row[0] != row[1]));
}

#[test]
fn shared_slot_in_untaken_branch_is_not_evaluated() {
    let fx = fixture();
    let per_million = || int(1000).divide(col("c.Population"));
    let is_empty = || col("c.Population").equals(int(0));
    let table = fx.query(
        select([
            item(col("c.Name")),
            item_as(case_when([(is_empty(), int(0))], Some(per_million())), "A"),
            item_as(case_when([(is_empty(), int(-1))], Some(per_million().plus(int(1)))), "B"),
        ])
        .from(method("world", "Countries", [], "c"))
        .filter(col("c.Continent").is_null().or(col("c.Name").equals(string("USA"))))
        .into_query(),
    );
    assert_eq!(
        vec![vec!["USA", "3", "4"], vec!["Atlantis", "0", "-1"]],
        rows(&table)
    );
}
