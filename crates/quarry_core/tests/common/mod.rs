//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use quarry_core::ast::Query;
use quarry_core::config::CompileOptions;
use quarry_core::datasource::memory::{MemoryDataSource, MemoryMethod, MemoryRow};
use quarry_core::datasource::{DataSourceRegistry, RowType};
use quarry_core::engine::{compile, run};
use quarry_core::execution::context::CancellationToken;
use quarry_core::result::table::Table;
use quarry_core::types::datatype::DataType;
use quarry_core::types::scalar::{ScalarValue, StructValue};
use quarry_error::{DbError, Result};

/// Registry with a `world` source, and a handle to the source for inspecting
/// scans.
pub struct Fixture {
    pub registry: DataSourceRegistry,
    pub world: Arc<MemoryDataSource>,
}

const COUNTRIES: &[(&str, Option<&str>, i64, Option<&str>)] = &[
    ("USA", Some("US"), 331, Some("America")),
    ("Canada", Some("CA"), 38, Some("America")),
    ("France", Some("FR"), 67, Some("Europe")),
    ("Germany", Some("DE"), 83, Some("Europe")),
    ("Japan", Some("JP"), 125, Some("Asia")),
    ("Atlantis", None, 0, None),
];

const CITIES: &[(&str, &str, i64)] = &[
    ("New York", "US", 8),
    ("Los Angeles", "US", 4),
    ("Toronto", "CA", 3),
    ("Paris", "FR", 2),
    ("Lyon", "FR", 1),
    ("Sydney", "AU", 5),
];

fn city_row(&(name, code, population): &(&str, &str, i64)) -> MemoryRow {
    MemoryRow::new(vec![name.into(), code.into(), population.into()])
}

fn cities_of(code: &str) -> Vec<MemoryRow> {
    CITIES.iter().filter(|c| c.1 == code).map(city_row).collect()
}

fn country_rows() -> Vec<MemoryRow> {
    COUNTRIES
        .iter()
        .map(|&(name, code, population, continent)| {
            MemoryRow::new(vec![name.into(), code.into(), population.into(), continent.into()])
                .with_member("Cities", code.map(cities_of).unwrap_or_default())
        })
        .collect()
}

fn employee(name: &str, manager: Option<&str>, reports: Vec<MemoryRow>) -> MemoryRow {
    MemoryRow::new(vec![name.into(), manager.into()]).with_member("Reports", reports)
}

fn employee_rows() -> Vec<MemoryRow> {
    vec![
        employee(
            "Ada",
            None,
            vec![
                employee("Grace", Some("Ada"), vec![employee("Linus", Some("Grace"), Vec::new())]),
                employee("Ken", Some("Ada"), Vec::new()),
            ],
        ),
        employee("Barbara", None, Vec::new()),
    ]
}

fn order_line(sku: &str, qty: i32) -> ScalarValue {
    StructValue::new().with_field("Sku", sku).with_field("Qty", qty).into()
}

fn order_rows() -> Vec<MemoryRow> {
    vec![
        MemoryRow::new(vec![
            1.into(),
            ScalarValue::list([order_line("A", 2), order_line("B", 1)]),
            ScalarValue::list(["red", "big"].map(ScalarValue::from)),
        ]),
        MemoryRow::new(vec![2.into(), ScalarValue::list(Vec::new()), ScalarValue::list([ScalarValue::from("small")])]),
        MemoryRow::new(vec![3.into(), ScalarValue::list([order_line("C", 5)]), ScalarValue::Null]),
    ]
}

/// Rows with text and object typed columns holding mixed values.
fn mixed_rows() -> Vec<MemoryRow> {
    vec![
        MemoryRow::new(vec!["1500".into(), ScalarValue::Float64(100.5)]),
        MemoryRow::new(vec!["abc".into(), ScalarValue::Int32(100)]),
        MemoryRow::new(vec![ScalarValue::Null, ScalarValue::Float64(100.0)]),
        MemoryRow::new(vec!["NaN".into(), "100".into()]),
        MemoryRow::new(vec!["0x10".into(), ScalarValue::Null]),
    ]
}

fn sales_rows() -> Vec<MemoryRow> {
    [
        ("East", Some("Q1"), 10),
        ("East", Some("Q2"), 20),
        ("West", Some("Q1"), 5),
        ("East", Some("Q1"), 7),
        ("North", Some("Q3"), 1),
        ("West", None, 100),
    ]
    .into_iter()
    .map(|(region, quarter, amount): (&str, Option<&str>, i32)| {
        MemoryRow::new(vec![region.into(), quarter.into(), amount.into()])
    })
    .collect()
}

fn code_rows(codes: &[(&str, &str)]) -> Vec<MemoryRow> {
    codes
        .iter()
        .map(|&(code, label)| MemoryRow::new(vec![code.into(), label.into()]))
        .collect()
}

pub fn world() -> MemoryDataSource {
    MemoryDataSource::new("world")
        .with_row_type(
            RowType::new("Country")
                .with_column("Name", DataType::Utf8, false)
                .with_column("Code", DataType::Utf8, true)
                .with_column("Population", DataType::Int64, false)
                .with_column("Continent", DataType::Utf8, true)
                .with_table_member("Cities", "City"),
        )
        .with_row_type(
            RowType::new("City")
                .with_column("Name", DataType::Utf8, false)
                .with_column("CountryCode", DataType::Utf8, false)
                .with_column("Population", DataType::Int64, false),
        )
        .with_row_type(
            RowType::new("Employee")
                .with_column("Name", DataType::Utf8, false)
                .with_column("Manager", DataType::Utf8, true)
                .with_table_member("Reports", "Employee"),
        )
        .with_row_type(
            RowType::new("Order")
                .with_column("Id", DataType::Int32, false)
                .with_column(
                    "Lines",
                    DataType::list(DataType::struct_type([("Sku", DataType::Utf8), ("Qty", DataType::Int32)])),
                    false,
                )
                .with_column("Tags", DataType::list(DataType::Utf8), true),
        )
        .with_row_type(
            RowType::new("Mixed")
                .with_column("Text", DataType::Utf8, true)
                .with_column("Obj", DataType::Any, true),
        )
        .with_row_type(
            RowType::new("Sale")
                .with_column("Region", DataType::Utf8, false)
                .with_column("Quarter", DataType::Utf8, true)
                .with_column("Amount", DataType::Int32, false),
        )
        .with_row_type(RowType::new("Number").with_column("N", DataType::Int64, false))
        .with_row_type(
            RowType::new("Code")
                .with_column("Code", DataType::Utf8, false)
                .with_column("Label", DataType::Utf8, false),
        )
        .with_method(MemoryMethod::new_static("Countries", "Country", country_rows()))
        .with_method(MemoryMethod::new_static("Cities", "City", CITIES.iter().map(city_row).collect()))
        .with_method(MemoryMethod::new_generated(
            "CitiesOf",
            "City",
            [("code", DataType::Utf8)],
            |args| match &args[0] {
                ScalarValue::Null => Ok(Vec::new()),
                code => Ok(cities_of(code.try_as_str()?)),
            },
        ))
        .with_method(MemoryMethod::new_static("Employees", "Employee", employee_rows()))
        .with_method(MemoryMethod::new_static("Orders", "Order", order_rows()))
        .with_method(MemoryMethod::new_static("Mixed", "Mixed", mixed_rows()))
        .with_method(MemoryMethod::new_static("Sales", "Sale", sales_rows()))
        .with_method(MemoryMethod::new_static(
            "CodesA",
            "Code",
            code_rows(&[("001", "a1"), ("002", "a2")]),
        ))
        .with_method(MemoryMethod::new_static(
            "CodesB",
            "Code",
            code_rows(&[("001", "b1"), ("002", "b2"), ("005", "b5")]),
        ))
        .with_method(MemoryMethod::new_static(
            "CodesC",
            "Code",
            code_rows(&[("003", "c1"), ("003", "c2"), ("001", "c3")]),
        ))
        .with_method(MemoryMethod::new_generated(
            "Range",
            "Number",
            [("count", DataType::Int64)],
            |args| Ok((0..args[0].try_as_i64()?).map(|n| MemoryRow::new(vec![n.into()])).collect()),
        ))
}

pub fn fixture() -> Fixture {
    logutil::init_test();

    let world = Arc::new(world());
    let mut registry = DataSourceRegistry::new();
    registry.register(world.clone()).unwrap();
    Fixture { registry, world }
}

impl Fixture {
    pub fn try_query(&self, query: impl Into<Query>, options: &CompileOptions) -> Result<Table> {
        let plan = compile(&query.into(), &self.registry, options)?;
        run(&plan, &CancellationToken::new())
    }

    pub fn query(&self, query: impl Into<Query>) -> Table {
        self.try_query(query, &CompileOptions::default()).unwrap()
    }

    pub fn query_with(&self, query: impl Into<Query>, options: &CompileOptions) -> Table {
        self.try_query(query, options).unwrap()
    }

    /// Compile a query expected to be rejected.
    pub fn compile_err(&self, query: impl Into<Query>) -> DbError {
        compile(&query.into(), &self.registry, &CompileOptions::default()).unwrap_err()
    }
}

/// Values of a column rendered as strings.
pub fn strings(table: &Table, column: &str) -> Vec<String> {
    table
        .column_values(column)
        .unwrap()
        .iter()
        .map(|v| v.to_string())
        .collect()
}

/// Every row rendered as a list of strings.
pub fn rows(table: &Table) -> Vec<Vec<String>> {
    table
        .iter()
        .map(|row| row.values().iter().map(|v| v.to_string()).collect())
        .collect()
}
