mod common;

use common::fixture;
use quarry_core::ast::builder::*;
use quarry_error::ErrorKind;

fn countries() -> quarry_core::ast::FromNode {
    method("world", "Countries", [], "c")
}

#[test]
fn unknown_qualified_column_suggests() {
    let fx = fixture();
    let err = fx.compile_err(select([item(col("c.Popluation"))]).from(countries()).into_query());
    assert_eq!(ErrorKind::UnknownColumn, err.kind());
    assert_eq!(Some("c.Popluation"), err.field("column"));
    assert!(err.message().contains("Did you mean 'Population'"), "{err}");
}

#[test]
fn unknown_unqualified_column_suggests() {
    let fx = fixture();
    let err = fx.compile_err(
        select([item(col("c.Name"))])
            .from(countries())
            .filter(col("Contnent").is_null())
            .into_query(),
    );
    assert_eq!(ErrorKind::UnknownColumn, err.kind());
    assert_eq!(Some("Contnent"), err.field("column"));
    assert!(err.message().contains("'Continent'"), "{err}");
}

#[test]
fn unknown_function_suggests() {
    let fx = fixture();
    let err = fx.compile_err(select([item(func("Lenght", [col("c.Name")]))]).from(countries()).into_query());
    assert_eq!(ErrorKind::UnknownFunction, err.kind());
    assert_eq!(Some("Lenght"), err.field("function"));
    assert!(err.message().contains("'Length'"), "{err}");
}

#[test]
fn unknown_schema_and_method_suggest() {
    let fx = fixture();
    let err = fx.compile_err(select([wildcard()]).from(method("wrold", "Countries", [], "c")).into_query());
    assert_eq!(ErrorKind::UnknownSchema, err.kind());
    assert_eq!(Some("wrold"), err.field("schema"));
    assert!(err.message().contains("'world'"), "{err}");

    let err = fx.compile_err(select([wildcard()]).from(method("world", "Countrys", [], "c")).into_query());
    assert_eq!(ErrorKind::UnknownMethod, err.kind());
    assert_eq!(Some("world"), err.field("schema"));
    assert_eq!(Some("Countrys"), err.field("method"));
    assert!(err.message().contains("'Countries'"), "{err}");
}

#[test]
fn ambiguous_column() {
    let fx = fixture();
    let err = fx.compile_err(
        select([item(col("Name"))])
            .from(countries().inner_join(
                source_method("world", "Cities", [], "ci"),
                col("c.Code").equals(col("ci.CountryCode")),
            ))
            .into_query(),
    );
    assert_eq!(ErrorKind::AmbiguousColumn, err.kind());
    assert_eq!(Some("Name"), err.field("column"));
}

#[test]
fn function_and_method_arity() {
    let fx = fixture();
    let err = fx.compile_err(select([item(func("Length", []))]).from(countries()).into_query());
    assert_eq!(ErrorKind::ArityMismatch, err.kind());
    assert_eq!(Some("Length"), err.field("function"));

    let err = fx.compile_err(select([wildcard()]).from(method("world", "CitiesOf", [], "x")).into_query());
    assert_eq!(ErrorKind::ArityMismatch, err.kind());
    assert_eq!(Some("CitiesOf"), err.field("method"));
}

#[test]
fn alias_errors() {
    let fx = fixture();
    let err = fx.compile_err(
        select([wildcard()])
            .from(countries().inner_join(source_method("world", "Cities", [], "C"), boolean(true)))
            .into_query(),
    );
    assert_eq!(ErrorKind::DuplicateAlias, err.kind());

    let err = fx.compile_err(
        select([wildcard()])
            .from(countries().cross_apply(apply_member("x", "Cities", "m")))
            .into_query(),
    );
    assert_eq!(ErrorKind::UnknownAlias, err.kind());
    assert_eq!(Some("x"), err.field("alias"));
}

#[test]
fn unknown_member() {
    let fx = fixture();
    let err = fx.compile_err(
        select([wildcard()])
            .from(countries().cross_apply(apply_member("c", "Towns", "t")))
            .into_query(),
    );
    assert_eq!(ErrorKind::UnknownColumn, err.kind());
    assert_eq!(Some("Towns"), err.field("column"));
}

#[test]
fn property_apply_needs_a_list() {
    let fx = fixture();
    let err = fx.compile_err(
        select([wildcard()])
            .from(countries().cross_apply(apply_property(col("c.Name"), "p")))
            .into_query(),
    );
    assert_eq!(ErrorKind::TypeMismatch, err.kind());
    assert_eq!(Some("p"), err.field("alias"));
}

#[test]
fn compile_errors_are_classified() {
    let fx = fixture();
    let errs = [
        fx.compile_err(select([item(col("c.Nope"))]).from(countries()).into_query()),
        fx.compile_err(select([item(int_text("99999999999999999999"))]).into_query()),
        fx.compile_err(select([item(col("c.Name").plus(int(1)))]).from(countries()).into_query()),
    ];
    for err in errs {
        assert!(err.kind().is_compile_time(), "{err}");
    }
}

#[test]
fn runtime_error_fails_the_whole_run() {
    let fx = fixture();
    let err = fx
        .try_query(
            select([item(int(100).divide(col("c.Population")))])
                .from(countries())
                .into_query(),
            &Default::default(),
        )
        .unwrap_err();
    assert_eq!(ErrorKind::DivisionByZero, err.kind());
    assert!(!err.kind().is_compile_time());
}

#[test]
fn weakly_typed_operand_fails_at_run_time() {
    let fx = fixture();
    let query = select([item(col("m.Obj").plus(int(1)))])
        .from(method("world", "Mixed", [], "m"))
        .into_query();
    let err = fx.try_query(query, &Default::default()).unwrap_err();
    assert_eq!(ErrorKind::InvalidOperand, err.kind());
    assert!(!err.kind().is_compile_time());

    // The same operation over a typed column is caught while compiling.
    let err = fx.compile_err(
        select([item(col("m.Text").plus(int(1)))])
            .from(method("world", "Mixed", [], "m"))
            .into_query(),
    );
    assert_eq!(ErrorKind::TypeMismatch, err.kind());
    assert!(err.kind().is_compile_time());
}

#[test]
fn grouped_select_reports_unknown_columns() {
    let fx = fixture();
    let err = fx.compile_err(
        select([item(col("c.Nmae")), item(func("Count", [int(1)]))])
            .from(countries())
            .group_by([col("c.Name")])
            .into_query(),
    );
    assert_eq!(ErrorKind::UnknownColumn, err.kind());
    assert_eq!(Some("c.Nmae"), err.field("column"));
    assert!(err.message().contains("'Name'"), "{err}");

    let err = fx.compile_err(
        select([item(col("c.Population")), item(count_star())])
            .from(countries())
            .group_by([col("c.Name")])
            .into_query(),
    );
    assert_eq!(ErrorKind::InvalidGroupReference, err.kind());
}
