mod common;

use common::{Fixture, fixture, rows, strings};
use quarry_core::ast::builder::*;
use quarry_core::ast::{Expr, Query};
use quarry_core::config::CompileOptions;

fn no_pushdown() -> CompileOptions {
    CompileOptions {
        enable_predicate_pushdown: false,
        ..Default::default()
    }
}

/// Hint filters received by each scan of a method.
fn hints(fx: &Fixture, method: &str) -> Vec<Option<Expr>> {
    fx.world
        .memory_method(method)
        .unwrap()
        .received_hints()
        .into_iter()
        .map(|h| h.filter)
        .collect()
}

/// Run with and without pushdown on fresh fixtures, checking both agree.
fn query_both_ways(query: Query) -> (Fixture, Vec<Vec<String>>) {
    let unpushed = fixture();
    let expected = rows(&unpushed.query_with(query.clone(), &no_pushdown()));

    let fx = fixture();
    let got = rows(&fx.query(query));
    assert_eq!(expected, got);
    (fx, got)
}

#[test]
fn single_source_filter_is_offered_to_the_scan() {
    let filter = col("c.Population")
        .gt(int(60))
        .and(col("c.Continent").equals(string("Europe")));
    let (fx, got) = query_both_ways(
        select([item(col("c.Name"))])
            .from(method("world", "Countries", [], "c"))
            .filter(filter.clone())
            .into_query(),
    );
    assert_eq!(vec![vec!["France"], vec!["Germany"]], got);

    let received = fx.world.memory_method("Countries").unwrap().received_hints();
    assert_eq!(1, received.len());
    assert_eq!("c", received[0].alias);
    assert_eq!(Some(filter), received[0].filter);
}

#[test]
fn pattern_matching_is_replaced_with_true() {
    let (fx, got) = query_both_ways(
        select([item(col("c.Name"))])
            .from(method("world", "Countries", [], "c"))
            .filter(col("c.Name").like(string("%an%")).and(col("c.Population").gt(int(40))))
            .into_query(),
    );
    assert_eq!(vec![vec!["France"], vec!["Germany"], vec!["Japan"]], got);
    assert_eq!(
        vec![Some(boolean(true).and(col("c.Population").gt(int(40))))],
        hints(&fx, "Countries")
    );
}

#[test]
fn contains_over_columns_is_replaced_with_true() {
    let literal = col("c.Name").contains([string("an")]);
    let computed = col("c.Name").contains([col("c.Code")]);
    let (fx, _) = query_both_ways(
        select([item(col("c.Name"))])
            .from(method("world", "Countries", [], "c"))
            .filter(literal.clone().and(computed))
            .into_query(),
    );
    assert_eq!(vec![Some(literal.and(boolean(true)))], hints(&fx, "Countries"));
}

#[test]
fn join_conjuncts_go_to_their_own_source() {
    let (fx, got) = query_both_ways(
        select([item_as(col("c.Name"), "Country"), item_as(col("ci.Name"), "City")])
            .from(method("world", "Countries", [], "c").inner_join(
                source_method("world", "Cities", [], "ci"),
                col("c.Code").equals(col("ci.CountryCode")),
            ))
            .filter(
                col("ci.Population")
                    .gt(int(2))
                    .and(col("c.Name").not_equals(col("ci.Name")))
                    .and(col("c.Population").lt(int(100))),
            )
            .into_query(),
    );
    assert_eq!(vec![vec!["Canada", "Toronto"]], got);

    // Conjuncts over both aliases are never pushed.
    assert_eq!(
        vec![Some(
            boolean(true)
                .and(boolean(true))
                .and(col("c.Population").lt(int(100)))
        )],
        hints(&fx, "Countries")
    );
    assert_eq!(
        vec![Some(
            col("ci.Population")
                .gt(int(2))
                .and(boolean(true))
                .and(boolean(true))
        )],
        hints(&fx, "Cities")
    );
}

#[test]
fn null_supplying_side_is_not_pushed() {
    let (fx, got) = query_both_ways(
        select([item_as(col("c.Name"), "Country"), item_as(col("ci.Name"), "City")])
            .from(method("world", "Countries", [], "c").left_join(
                source_method("world", "Cities", [], "ci"),
                col("c.Code").equals(col("ci.CountryCode")),
            ))
            .filter(col("ci.Population").gt(int(3)).or(col("ci.Name").is_null()))
            .into_query(),
    );
    assert_eq!(
        vec!["USA", "USA", "Germany", "Japan", "Atlantis"],
        got.iter().map(|r| r[0].as_str()).collect::<Vec<_>>()
    );
    assert_eq!(vec![Some(boolean(true))], hints(&fx, "Cities"));
}

#[test]
fn apply_method_receives_hints_each_scan() {
    let fx = fixture();
    let table = fx.query(
        select([item(col("ci.Name"))])
            .from(method("world", "Countries", [], "c").cross_apply(apply_method(
                "world",
                "CitiesOf",
                [col("c.Code")],
                "ci",
            )))
            .filter(col("ci.Population").gt(int(3)))
            .into_query(),
    );
    assert_eq!(vec!["New York", "Los Angeles"], strings(&table, "Name"));

    let received = hints(&fx, "CitiesOf");
    assert_eq!(6, received.len());
    assert!(
        received
            .iter()
            .all(|h| h.as_ref() == Some(&col("ci.Population").gt(int(3))))
    );
}

#[test]
fn disabled_pushdown_sends_no_hints() {
    let fx = fixture();
    let table = fx.query_with(
        select([item(col("c.Name"))])
            .from(method("world", "Countries", [], "c"))
            .filter(col("c.Population").gt(int(100)))
            .into_query(),
        &no_pushdown(),
    );
    assert_eq!(vec!["USA", "Japan"], strings(&table, "Name"));
    assert_eq!(vec![None], hints(&fx, "Countries"));
}
