//! Row types declared with the derive macros.

#![allow(dead_code)]

use rowquery::{
    Filter, FromRecord, JoinKind, JoinQuery, JoinedRow, OrderBy, Pagination, Query, RowType,
    Schema, SqlBuilder, SqlLogConfig, BuilderConfig, Value,
};
use serde_json::json;

#[derive(Debug, RowType, FromRecord)]
#[row(table = "customers")]
struct Customer {
    #[row(id)]
    customer_id: i64,
    #[row(column = "display_name")]
    name: String,
    email: Option<String>,
    #[row(modified_at)]
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, RowType, FromRecord)]
#[row(table = "invoices")]
struct Invoice {
    id: i64,
    #[row(references = "customers")]
    customer_id: i64,
    amount: f64,
    paid: bool,
}

fn builder() -> SqlBuilder {
    SqlBuilder::new(BuilderConfig::default().log(SqlLogConfig::disabled()))
}

#[test]
fn derived_metadata() {
    let meta = Customer::meta();
    assert_eq!(meta.table, "customers");
    assert_eq!(meta.id, "customer_id");
    assert_eq!(meta.modified_at, Some("updated_at"));
    assert!(meta.validate().is_ok());

    let email = meta.column("email").unwrap();
    assert!(email.nullable);
    let name = meta.column("display_name").unwrap();
    assert_eq!(name.field, "name");
    assert!(!name.nullable);

    assert_eq!(Customer::NAME.column(), "display_name");
    assert_eq!(Invoice::CUSTOMER_ID.table(), "invoices");
    assert_eq!(Invoice::meta().reference("customer_id").unwrap().target, "customers");
}

#[test]
fn field_lookup_by_rust_or_column_name() {
    assert_eq!(Customer::field("name").unwrap(), Customer::NAME);
    assert_eq!(Customer::field("display_name").unwrap(), Customer::NAME);
    assert!(Customer::field("password").unwrap_err().is_unknown_field());
}

#[test]
fn derived_rows_are_registered() {
    let schema = Schema::registered().unwrap();
    assert!(schema.has_table("customers"));
    assert!(schema.has_table("invoices"));
    assert!(schema.check_references().is_ok());
    assert_eq!(schema.resolve("customers", "name").unwrap().name, "display_name");
}

#[test]
fn select_with_derived_fields() {
    let query = Query::<Customer>::new()
        .starts_with(Customer::NAME, "Ann")
        .is_not_null(Customer::EMAIL);
    let data = builder()
        .select(
            &query,
            &OrderBy::new().asc(Customer::NAME).asc(Customer::CUSTOMER_ID),
            Pagination::page(1, 25).unwrap(),
        )
        .unwrap();
    assert_eq!(
        data.sql(),
        "SELECT customer_id, display_name, email, updated_at FROM customers \
         WHERE display_name LIKE :display_name_1 ESCAPE '!' AND email IS NOT NULL \
         ORDER BY display_name ASC, customer_id ASC LIMIT :limit_2 OFFSET :offset_3"
    );
}

#[test]
fn optimistic_delete_uses_declared_columns() {
    let data = builder()
        .delete_by_id_optimistic::<Customer>(9, "2024-05-01T10:00:00Z")
        .unwrap();
    assert_eq!(
        data.sql(),
        "DELETE FROM customers WHERE customer_id = :customer_id_1 AND updated_at = :updated_at_2"
    );
}

#[test]
fn dynamic_filters_resolve_through_metadata() {
    let filters: Vec<Filter> = serde_json::from_value(json!([
        { "field": "name", "op": "contains", "value": "ann" },
        { "field": "email", "op": "is_null", "not": true },
    ]))
    .unwrap();
    let query = Query::<Customer>::new().apply_filters(&filters).unwrap();
    let scope = builder().from_and_where(Some(&query)).unwrap();
    assert_eq!(
        scope.to_sql(),
        "FROM customers WHERE display_name LIKE :display_name_1 ESCAPE '!' AND email IS NOT NULL"
    );

    let bad: Vec<Filter> = serde_json::from_value(json!([
        { "field": "password", "op": "eq", "value": "x" },
    ]))
    .unwrap();
    let err = Query::<Customer>::new().apply_filters(&bad).unwrap_err();
    assert!(err.is_unknown_field());
}

#[test]
fn one_to_many_exists_filter() {
    let jq = JoinQuery::root(Query::<Customer>::new())
        .join_referencing(
            JoinKind::Exists,
            Query::<Invoice>::new().is_false(Invoice::PAID),
            Invoice::CUSTOMER_ID,
        )
        .build()
        .unwrap();
    let data = builder().count_for_joined_query(&jq);
    assert_eq!(
        data.sql(),
        "SELECT COUNT(*) FROM customers t0 WHERE EXISTS (SELECT 1 FROM invoices t1 \
         WHERE t0.customer_id = t1.customer_id AND t1.paid IS FALSE)"
    );
}

#[test]
fn joined_row_decodes_derived_records() {
    let jq = JoinQuery::root(Query::<Invoice>::new())
        .join(JoinKind::Inner, Invoice::CUSTOMER_ID, Query::<Customer>::new())
        .build()
        .unwrap();
    let now = chrono::Utc::now();
    let row = JoinedRow::from_values(
        &jq,
        [
            ("t0__id".to_string(), Value::Int(1)),
            ("t0__customer_id".to_string(), Value::Int(7)),
            ("t0__amount".to_string(), Value::Float(12.5)),
            ("t0__paid".to_string(), Value::Bool(true)),
            ("t1__customer_id".to_string(), Value::Int(7)),
            ("t1__display_name".to_string(), Value::from("Ann")),
            ("t1__email".to_string(), Value::Null),
            ("t1__updated_at".to_string(), Value::Timestamp(now)),
        ],
    )
    .unwrap();

    let invoice = row.get_as::<Invoice>().unwrap().unwrap();
    assert_eq!(invoice.customer_id, 7);
    assert!(invoice.paid);
    let customer = row.get_as::<Customer>().unwrap().unwrap();
    assert_eq!(customer.name, "Ann");
    assert_eq!(customer.email, None);
    assert_eq!(customer.updated_at, now);
}
