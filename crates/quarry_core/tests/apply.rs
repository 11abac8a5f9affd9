mod common;

use common::{fixture, rows, strings};
use quarry_core::ast::builder::*;
use quarry_core::types::datatype::DataType;

#[test]
fn cross_apply_method_drops_empty() {
    let fx = fixture();
    let table = fx.query(
        select([item_as(col("c.Name"), "Country"), item_as(col("ci.Name"), "City")])
            .from(method("world", "Countries", [], "c").cross_apply(apply_method(
                "world",
                "CitiesOf",
                [col("c.Code")],
                "ci",
            )))
            .into_query(),
    );
    assert_eq!(
        vec![
            vec!["USA", "New York"],
            vec!["USA", "Los Angeles"],
            vec!["Canada", "Toronto"],
            vec!["France", "Paris"],
            vec!["France", "Lyon"],
        ],
        rows(&table)
    );
    assert!(!table.columns()[1].nullable);
}

#[test]
fn outer_apply_method_pads_once() {
    let fx = fixture();
    let table = fx.query(
        select([item_as(col("c.Name"), "Country"), item_as(col("ci.Name"), "City")])
            .from(method("world", "Countries", [], "c").outer_apply(apply_method(
                "world",
                "CitiesOf",
                [col("c.Code")],
                "ci",
            )))
            .filter(col("c.Continent").equals(string("Europe")))
            .into_query(),
    );
    assert_eq!(
        vec![vec!["France", "Paris"], vec!["France", "Lyon"], vec!["Germany", "null"]],
        rows(&table)
    );
    assert!(table.columns()[1].nullable);
}

#[test]
fn apply_method_scanned_per_outer_row() {
    let fx = fixture();
    fx.query(
        select([item(col("ci.Name"))])
            .from(method("world", "Countries", [], "c").cross_apply(apply_method(
                "world",
                "CitiesOf",
                [col("c.Code")],
                "ci",
            )))
            .into_query(),
    );
    let method = fx.world.memory_method("CitiesOf").unwrap();
    assert_eq!(6, method.num_scans());
}

#[test]
fn member_apply_reads_declared_members() {
    let fx = fixture();
    let table = fx.query(
        select([item_as(col("c.Name"), "Country"), item_as(col("m.Name"), "City")])
            .from(method("world", "Countries", [], "c").cross_apply(apply_member("c", "Cities", "m")))
            .filter(col("m.Population").gt(int(2)))
            .into_query(),
    );
    assert_eq!(
        vec![
            vec!["USA", "New York"],
            vec!["USA", "Los Angeles"],
            vec!["Canada", "Toronto"],
        ],
        rows(&table)
    );
}

#[test]
fn self_referencing_members_chain() {
    let fx = fixture();
    let table = fx.query(
        select([
            item_as(col("e.Name"), "Boss"),
            item_as(col("r.Name"), "Report"),
            item_as(col("rr.Name"), "Indirect"),
        ])
        .from(
            method("world", "Employees", [], "e")
                .outer_apply(apply_member("e", "Reports", "r"))
                .outer_apply(apply_member("r", "Reports", "rr")),
        )
        .into_query(),
    );
    assert_eq!(
        vec![
            vec!["Ada", "Grace", "Linus"],
            vec!["Ada", "Ken", "null"],
            vec!["Barbara", "null", "null"],
        ],
        rows(&table)
    );
    assert!(table.columns()[1].nullable);
    assert!(table.columns()[2].nullable);
}

#[test]
fn cross_apply_member_chain() {
    let fx = fixture();
    let table = fx.query(
        select([item_as(col("rr.Name"), "Indirect")])
            .from(
                method("world", "Employees", [], "e")
                    .cross_apply(apply_member("e", "Reports", "r"))
                    .cross_apply(apply_member("r", "Reports", "rr")),
            )
            .into_query(),
    );
    assert_eq!(vec!["Linus"], strings(&table, "Indirect"));
}

#[test]
fn property_apply_over_records() {
    let fx = fixture();
    let table = fx.query(
        select([item(col("o.Id")), item(col("l.Sku")), item(col("l.Qty"))])
            .from(method("world", "Orders", [], "o").cross_apply(apply_property(col("o.Lines"), "l")))
            .into_query(),
    );
    assert_eq!(
        vec![vec!["1", "A", "2"], vec!["1", "B", "1"], vec!["3", "C", "5"]],
        rows(&table)
    );
    assert_eq!(DataType::Int32, table.columns()[2].datatype);
}

#[test]
fn outer_property_apply_pads_empty_and_null_lists() {
    let fx = fixture();
    let table = fx.query(
        select([item(col("o.Id")), item_as(col("t.value"), "Tag")])
            .from(method("world", "Orders", [], "o").outer_apply(apply_property(col("o.Tags"), "t")))
            .into_query(),
    );
    assert_eq!(
        vec![vec!["1", "red"], vec!["1", "big"], vec!["2", "small"], vec!["3", "null"]],
        rows(&table)
    );
}

#[test]
fn apply_filter_on_inner_alias() {
    let fx = fixture();
    let table = fx.query(
        select([item(col("o.Id")), item(col("l.Sku"))])
            .from(method("world", "Orders", [], "o").cross_apply(apply_property(col("o.Lines"), "l")))
            .filter(col("l.Qty").gt_eq(int(2)).and(col("o.Id").lt(int(3))))
            .into_query(),
    );
    assert_eq!(vec![vec!["1", "A"]], rows(&table));
}
