use super::*;
use crate::config::SqlLogConfig;
use crate::dialect::{DialectKind, MySql, Postgres};
use crate::join::JoinKind;
use crate::order::OrderItem;
use crate::schema::{Column, Field, RowMeta, RowType};
use crate::test_rows::{Order, OrderLine, Person, Shipment};

const PERSON_COLUMNS: &str = "id, first_name, last_name, age, status, nickname, active, modified_at";

fn builder() -> SqlBuilder {
    quiet()
}

fn people(rest: &str) -> String {
    format!("SELECT {PERSON_COLUMNS} FROM people{rest}")
}

#[test]
fn test_find_by_id() {
    let data = builder().find_by_id::<Person>(7).unwrap();
    assert_eq!(data.sql(), people(" WHERE id = :id_1"));
    assert_eq!(data.params().get("id_1"), Some(&Value::Int(7)));
    assert!(!data.predicts_empty_result());
}

#[test]
fn test_delete_by_id() {
    let data = builder().delete_by_id::<Order>(3).unwrap();
    assert_eq!(data.sql(), "DELETE FROM orders WHERE id = :id_1");
}

#[test]
fn test_delete_by_id_optimistic() {
    let data = builder()
        .delete_by_id_optimistic::<Person>(7, "2024-01-01T00:00:00Z")
        .unwrap();
    assert_eq!(
        data.sql(),
        "DELETE FROM people WHERE id = :id_1 AND modified_at = :modified_at_2"
    );
    assert_eq!(data.params().len(), 2);

    let err = builder()
        .delete_by_id_optimistic::<Order>(3, "2024-01-01T00:00:00Z")
        .unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}

#[test]
fn test_from_and_where_without_query() {
    let b = builder();
    let scope = b.from_and_where::<Person>(None).unwrap();
    assert_eq!(scope.to_sql(), "FROM people");
    assert!(scope.where_clause().is_none());
    assert!(scope.params().is_empty());

    let scope = b.from_and_where(Some(&Query::<Person>::new())).unwrap();
    assert_eq!(scope.to_sql(), "FROM people");
}

#[test]
fn test_from_and_where_with_conditions() {
    let query = Query::<Person>::new()
        .eq(Person::STATUS, "active")
        .gte(Person::AGE, 18)
        .unwrap();
    let scope = builder().from_and_where(Some(&query)).unwrap();
    assert_eq!(
        scope.to_sql(),
        "FROM people WHERE status = :status_1 AND age >= :age_2"
    );
    assert_eq!(scope.conditions().len(), 2);
}

#[test]
fn test_append_field_conditions_reports_contribution() {
    let b = builder();
    let mut ctx = b.context();
    let mut where_clause = Vec::new();
    assert!(!b
        .append_field_conditions_to_where_clause(
            &mut ctx,
            None,
            &Query::<Person>::new(),
            &mut where_clause
        )
        .unwrap());
    assert!(where_clause.is_empty());

    let query = Query::<Person>::new().ne(Person::NICKNAME, "Bob");
    assert!(b
        .append_field_conditions_to_where_clause(&mut ctx, Some("p"), &query, &mut where_clause)
        .unwrap());
    assert_eq!(
        where_clause[0].to_named(),
        "(p.nickname IS NULL OR p.nickname <> :nickname_1)"
    );
}

#[test]
fn test_append_from_clause_and_order_by() {
    let b = builder();
    let scope = b.from_and_where::<Person>(None).unwrap();
    let mut out = SqlText::new("SELECT COUNT(DISTINCT status)");
    b.append_from_clause(&mut out, &scope);
    b.append_order_by(&mut out, &OrderBy::new(), None).unwrap();
    assert_eq!(out.to_named(), "SELECT COUNT(DISTINCT status) FROM people");

    b.append_order_by(&mut out, &OrderBy::new().desc(Person::AGE), None)
        .unwrap();
    assert_eq!(
        out.to_named(),
        "SELECT COUNT(DISTINCT status) FROM people ORDER BY age DESC"
    );
}

#[test]
fn test_paged_select_between() {
    let query = Query::<Person>::new().between(Person::AGE, 18, 65).unwrap();
    let order = OrderBy::new().asc(Person::LAST_NAME);
    let data = builder()
        .select(&query, &order, Pagination::page(1, 20).unwrap())
        .unwrap();

    assert_eq!(
        data.sql(),
        people(
            " WHERE age BETWEEN :age_1 AND :age_2 ORDER BY last_name ASC \
             LIMIT :limit_3 OFFSET :offset_4"
        )
    );
    let names: Vec<&str> = data.params().names().collect();
    assert_eq!(names, vec!["age_1", "age_2", "limit_3", "offset_4"]);
    assert_eq!(data.params().get("offset_4"), Some(&Value::Int(0)));

    let count = data.count_query().unwrap();
    assert_eq!(
        count.sql(),
        "SELECT COUNT(*) FROM people WHERE age BETWEEN :age_1 AND :age_2"
    );
    assert_eq!(count.params().len(), 2);
}

#[test]
fn test_unpaged_select_has_no_count_companion() {
    let data = builder()
        .select_all(&Query::<Person>::new(), &OrderBy::new())
        .unwrap();
    assert_eq!(data.sql(), people(""));
    assert!(data.count_query().is_none());
}

#[test]
fn test_select_with_collation_and_nulls() {
    let order = OrderBy::new()
        .add(
            OrderItem::asc(Person::LAST_NAME)
                .collate("und")
                .unwrap()
                .nulls_last(),
        )
        .asc(Person::FIRST_NAME);
    let data = builder()
        .select_all(&Query::<Person>::new(), &order)
        .unwrap();
    assert_eq!(
        data.sql(),
        people(" ORDER BY last_name COLLATE \"und\" ASC NULLS LAST, first_name ASC")
    );
}

#[test]
fn test_select_rejects_foreign_order_column() {
    let err = builder()
        .select_all(&Query::<Person>::new(), &OrderBy::new().asc(Order::TOTAL))
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_select_rejects_negative_window() {
    let err = builder()
        .select(
            &Query::<Person>::new(),
            &OrderBy::new(),
            Pagination::new().limit(-1),
        )
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_page_size_is_clamped() {
    let b = SqlBuilder::new(
        BuilderConfig::default()
            .max_page_size(50)
            .log(SqlLogConfig::disabled()),
    );
    let data = b
        .select(
            &Query::<Person>::new(),
            &OrderBy::new(),
            Pagination::new().limit(500),
        )
        .unwrap();
    assert_eq!(data.params().get("limit_1"), Some(&Value::Int(50)));
    assert_eq!(data.pagination().limit, Some(50));
}

#[test]
fn test_select_star() {
    let b = SqlBuilder::new(
        BuilderConfig::default()
            .select_star(true)
            .log(SqlLogConfig::disabled()),
    );
    let data = b
        .select_all(&Query::<Person>::new().is_true(Person::ACTIVE), &OrderBy::new())
        .unwrap();
    assert_eq!(data.sql(), "SELECT * FROM people WHERE active IS TRUE");
}

#[test]
fn test_empty_in_short_circuits() {
    let query = Query::<Person>::new()
        .in_list(Person::STATUS, Vec::<&str>::new())
        .unwrap();
    assert!(query.predicts_empty_result());

    let data = builder()
        .select(&query, &OrderBy::new(), Pagination::page(1, 10).unwrap())
        .unwrap();
    assert!(data.predicts_empty_result());
    assert_eq!(
        data.sql(),
        people(" WHERE 1=0 LIMIT :limit_1 OFFSET :offset_2")
    );
    assert!(data.count_query().unwrap().predicts_empty_result());

    let page = data.short_circuit::<String>().unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.limit, Some(10));
}

#[test]
fn test_contradictory_range_predicts_empty() {
    let query = Query::<Person>::new()
        .gt(Person::AGE, 65)
        .unwrap()
        .lt(Person::AGE, 18)
        .unwrap();
    let data = builder()
        .select_all(&query, &OrderBy::new())
        .unwrap();
    assert!(data.predicts_empty_result());
    assert_eq!(data.sql(), people(" WHERE age > :age_1 AND age < :age_2"));
    assert!(data.short_circuit::<()>().is_some());
}

#[test]
fn test_non_empty_select_does_not_short_circuit() {
    let data = builder()
        .select_all(&Query::<Person>::new().eq(Person::AGE, 40), &OrderBy::new())
        .unwrap();
    assert!(data.short_circuit::<()>().is_none());
}

#[test]
fn test_compilation_is_deterministic() {
    let query = Query::<Person>::new()
        .eq(Person::STATUS, "active")
        .not_in(Person::AGE, [1, 2, 3])
        .unwrap()
        .contains(Person::FIRST_NAME, "an");
    let order = OrderBy::new().desc(Person::AGE).asc(Person::ID);
    let b = builder();
    let first = b.select(&query, &order, Pagination::page(2, 5).unwrap()).unwrap();
    let second = b.select(&query, &order, Pagination::page(2, 5).unwrap()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.sql(), second.sql());
}

#[test]
fn test_count_for_simple_select() {
    let query = Query::<Person>::new().is_null(Person::NICKNAME);
    let data = builder().count_for_simple_select(Some(&query)).unwrap();
    assert_eq!(
        data.sql(),
        "SELECT COUNT(*) FROM people WHERE nickname IS NULL"
    );
    let all = builder().count_for_simple_select::<Person>(None).unwrap();
    assert_eq!(all.sql(), "SELECT COUNT(*) FROM people");
}

#[test]
fn test_count_after_paged_select_matches_companion() {
    let b = builder();
    let query = Query::<Person>::new().starts_with(Person::LAST_NAME, "Mc");
    let data = b
        .select(&query, &OrderBy::new(), Pagination::page(3, 10).unwrap())
        .unwrap();
    let count = b.query_for_count_after_paged_select(&data).unwrap();
    assert_eq!(Some(&count), data.count_query());
    assert_eq!(
        count.sql(),
        "SELECT COUNT(*) FROM people WHERE last_name LIKE :last_name_1 ESCAPE '!'"
    );

    let single = b.find_by_id::<Person>(1).unwrap();
    assert!(b.query_for_count_after_paged_select(&single).is_err());
}

#[test]
fn test_delete_guards_empty_query() {
    let data = builder().delete(&Query::<Person>::new()).unwrap();
    assert_eq!(data.sql(), "DELETE FROM people WHERE 1=0");
    assert!(data.predicts_empty_result());

    let b = SqlBuilder::new(
        BuilderConfig::default()
            .allow_delete_all(true)
            .log(SqlLogConfig::disabled()),
    );
    assert_eq!(
        b.delete(&Query::<Person>::new()).unwrap().sql(),
        "DELETE FROM people"
    );
}

#[test]
fn test_delete_with_conditions() {
    let query = Query::<Person>::new().is_false(Person::ACTIVE);
    let data = builder().delete(&query).unwrap();
    assert_eq!(data.sql(), "DELETE FROM people WHERE active IS FALSE");
}

struct Injected;

const INJECTED_COLUMNS: &[Column] = &[Column::new("id")];

static INJECTED: RowMeta = RowMeta::new("users; DROP TABLE users; --", INJECTED_COLUMNS);

impl RowType for Injected {
    fn meta() -> &'static RowMeta {
        &INJECTED
    }
}

#[test]
fn test_invalid_metadata_never_reaches_sql() {
    let b = builder();
    assert!(matches!(
        b.delete_by_id::<Injected>(1),
        Err(QueryError::InvalidIdentifier(_))
    ));
    assert!(b.find_by_id::<Injected>(1).is_err());
    assert!(b.delete(&Query::<Injected>::new()).is_err());
    assert!(b.count_for_simple_select::<Injected>(None).is_err());
    assert!(b
        .select(&Query::<Injected>::new(), &OrderBy::new(), Pagination::new())
        .is_err());
    assert!(JoinQuery::root(Query::<Injected>::new()).build().is_err());
}

#[test]
fn test_undeclared_columns_are_rejected() {
    let b = builder();
    let q = Query::<Person>::new().eq(Field::declared("status = status OR 1"), 1);
    assert!(b.from_and_where(Some(&q)).unwrap_err().is_unknown_field());
    assert!(JoinQuery::root(q).build().unwrap_err().is_unknown_field());

    let order = OrderBy::new().asc(Field::<Person>::declared("age; --"));
    assert!(b
        .select(&Query::<Person>::new(), &order, Pagination::new())
        .unwrap_err()
        .is_unknown_field());
}

// ==================== Joins ====================

const ORDER_COLUMNS: &str = "t0.id AS t0__id, t0.status AS t0__status, \
    t0.customer_name AS t0__customer_name, t0.total AS t0__total, \
    t0.shipment_id AS t0__shipment_id";
const SHIPMENT_COLUMNS: &str = "t1.id AS t1__id, t1.status AS t1__status, \
    t1.carrier AS t1__carrier, t1.tracking_code AS t1__tracking_code";

fn open_orders_with_line() -> JoinQuery {
    JoinQuery::root(Query::<Order>::new().eq(Order::STATUS, "open"))
        .join(
            JoinKind::Left,
            Order::SHIPMENT_ID,
            Query::<Shipment>::new().eq(Shipment::STATUS, "shipped"),
        )
        .join_referencing(
            JoinKind::Exists,
            Query::<OrderLine>::new().eq(OrderLine::SKU, "SKU-1"),
            OrderLine::ORDER_ID,
        )
        .build()
        .unwrap()
}

#[test]
fn test_joined_select() {
    let jq = open_orders_with_line();
    let data = builder()
        .joined_select(
            &jq,
            &OrderBy::new().desc(Shipment::CARRIER),
            Pagination::page(2, 10).unwrap(),
        )
        .unwrap();

    let scope = "FROM orders t0 \
        LEFT JOIN shipments t1 ON t0.shipment_id = t1.id AND t1.status = :status_1 \
        WHERE t0.status = :status_2 \
        AND EXISTS (SELECT 1 FROM order_lines t2 WHERE t0.id = t2.order_id AND t2.sku = :sku_3)";
    assert_eq!(
        data.sql(),
        format!(
            "SELECT {ORDER_COLUMNS}, {SHIPMENT_COLUMNS} {scope} \
             ORDER BY t1.carrier DESC LIMIT :limit_4 OFFSET :offset_5"
        )
    );
    assert_eq!(data.params().get("status_1"), Some(&Value::from("shipped")));
    assert_eq!(data.params().get("status_2"), Some(&Value::from("open")));
    assert_eq!(data.params().get("offset_5"), Some(&Value::Int(10)));

    let count = data.count_query().unwrap();
    assert_eq!(count.sql(), format!("SELECT COUNT(*) {scope}"));
    assert_eq!(count.params().len(), 3);
}

#[test]
fn test_same_column_on_joined_tables_gets_distinct_params() {
    let jq = JoinQuery::root(Query::<Order>::new().eq(Order::STATUS, "open"))
        .join(
            JoinKind::Inner,
            Order::SHIPMENT_ID,
            Query::<Shipment>::new().eq(Shipment::STATUS, "shipped"),
        )
        .build()
        .unwrap();
    let scope = builder().from_and_where_joined(&jq);
    assert_eq!(
        scope.to_sql(),
        "FROM orders t0 INNER JOIN shipments t1 ON t0.shipment_id = t1.id \
         WHERE t0.status = :status_1 AND t1.status = :status_2"
    );
    let names: Vec<&str> = scope.params().names().collect();
    assert_eq!(names, vec!["status_1", "status_2"]);
}

#[test]
fn test_join_chain_through_inner_and_left() {
    let jq = JoinQuery::root(Query::<OrderLine>::new().gt(OrderLine::QUANTITY, 1).unwrap())
        .join(JoinKind::Inner, OrderLine::ORDER_ID, Query::<Order>::new())
        .join(JoinKind::Left, Order::SHIPMENT_ID, Query::<Shipment>::new())
        .build()
        .unwrap();
    let data = builder().count_for_joined_query(&jq);
    assert_eq!(
        data.sql(),
        "SELECT COUNT(*) FROM order_lines t0 \
         INNER JOIN orders t1 ON t0.order_id = t1.id \
         LEFT JOIN shipments t2 ON t1.shipment_id = t2.id \
         WHERE t0.quantity > :quantity_1"
    );
}

#[test]
fn test_inner_join_below_left_join_is_nested() {
    let jq = JoinQuery::root(Query::<OrderLine>::new())
        .join(
            JoinKind::Left,
            OrderLine::ORDER_ID,
            Query::<Order>::new().eq(Order::STATUS, "open"),
        )
        .join(
            JoinKind::Inner,
            Order::SHIPMENT_ID,
            Query::<Shipment>::new().eq(Shipment::CARRIER, "DHL"),
        )
        .build()
        .unwrap();
    let data = builder().count_for_joined_query(&jq);
    assert_eq!(
        data.sql(),
        "SELECT COUNT(*) FROM order_lines t0 \
         LEFT JOIN (orders t1 INNER JOIN shipments t2 ON t1.shipment_id = t2.id) \
         ON t0.order_id = t1.id AND t1.status = :status_1 AND t2.carrier = :carrier_2"
    );
}

#[test]
fn test_not_exists_anti_join() {
    let jq = JoinQuery::root(Query::<Order>::new())
        .join_referencing(
            JoinKind::NotExists,
            Query::<OrderLine>::new(),
            OrderLine::ORDER_ID,
        )
        .build()
        .unwrap();
    assert_eq!(
        builder().count_for_joined_query(&jq).sql(),
        "SELECT COUNT(*) FROM orders t0 \
         WHERE NOT EXISTS (SELECT 1 FROM order_lines t1 WHERE t0.id = t1.order_id)"
    );
}

#[test]
fn test_not_exists_over_empty_subquery_is_dropped() {
    let jq = JoinQuery::root(Query::<Order>::new())
        .join_referencing(
            JoinKind::NotExists,
            Query::<OrderLine>::new()
                .in_list(OrderLine::SKU, Vec::<&str>::new())
                .unwrap(),
            OrderLine::ORDER_ID,
        )
        .build()
        .unwrap();
    let data = builder().count_for_joined_query(&jq);
    assert_eq!(data.sql(), "SELECT COUNT(*) FROM orders t0");
    assert!(!data.predicts_empty_result());
}

#[test]
fn test_exists_over_empty_subquery_predicts_empty() {
    let jq = JoinQuery::root(Query::<Order>::new())
        .join_referencing(
            JoinKind::Exists,
            Query::<OrderLine>::new()
                .in_list(OrderLine::SKU, Vec::<&str>::new())
                .unwrap(),
            OrderLine::ORDER_ID,
        )
        .build()
        .unwrap();
    let data = builder()
        .joined_select(&jq, &OrderBy::new(), Pagination::page(1, 10).unwrap())
        .unwrap();
    assert!(data.predicts_empty_result());
    assert!(data.short_circuit::<()>().is_some());
}

#[test]
fn test_joined_order_by_requires_selected_table() {
    let jq = open_orders_with_line();
    let err = builder()
        .joined_select(&jq, &OrderBy::new().asc(OrderLine::SKU), Pagination::new())
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_joined_delete() {
    let jq = JoinQuery::root(Query::<Order>::new())
        .join_referencing(
            JoinKind::Exists,
            Query::<OrderLine>::new().eq(OrderLine::SKU, "SKU-1"),
            OrderLine::ORDER_ID,
        )
        .build()
        .unwrap();
    assert_eq!(
        builder().joined_delete(&jq).sql(),
        "DELETE FROM orders WHERE id IN (SELECT t0.id FROM orders t0 \
         WHERE EXISTS (SELECT 1 FROM order_lines t1 WHERE t0.id = t1.order_id AND t1.sku = :sku_1))"
    );

    let lone = JoinQuery::root(Query::<Order>::new()).build().unwrap();
    assert_eq!(
        builder().joined_delete(&lone).sql(),
        "DELETE FROM orders WHERE 1=0"
    );
}

#[test]
fn test_joined_delete_guards_vacuous_and_outer_only_graphs() {
    let vacuous = JoinQuery::root(
        Query::<Order>::new()
            .not_in(Order::STATUS, Vec::<&str>::new())
            .unwrap(),
    )
    .build()
    .unwrap();
    let simple = Query::<Order>::new()
        .not_in(Order::STATUS, Vec::<&str>::new())
        .unwrap();
    assert_eq!(
        builder().delete(&simple).unwrap().sql(),
        "DELETE FROM orders WHERE 1=0"
    );
    assert_eq!(builder().joined_delete(&vacuous).sql(), "DELETE FROM orders WHERE 1=0");

    // A LEFT join never removes root rows.
    let outer_only = JoinQuery::root(Query::<Order>::new())
        .join(
            JoinKind::Left,
            Order::SHIPMENT_ID,
            Query::<Shipment>::new().eq(Shipment::CARRIER, "DHL"),
        )
        .build()
        .unwrap();
    assert_eq!(builder().joined_delete(&outer_only).sql(), "DELETE FROM orders WHERE 1=0");

    let inner = JoinQuery::root(Query::<Order>::new())
        .join(JoinKind::Inner, Order::SHIPMENT_ID, Query::<Shipment>::new())
        .build()
        .unwrap();
    assert_eq!(
        builder().joined_delete(&inner).sql(),
        "DELETE FROM orders WHERE id IN (SELECT t0.id FROM orders t0 \
         INNER JOIN shipments t1 ON t0.shipment_id = t1.id)"
    );
}

// ==================== Dialects ====================

#[test]
fn test_render_postgres_positional() {
    let query = Query::<Person>::new().between(Person::AGE, 18, 65).unwrap();
    let b = builder();
    let data = b
        .select(&query, &OrderBy::new(), Pagination::page(2, 10).unwrap())
        .unwrap();
    let stmt = data.render(b.dialect()).unwrap();
    assert_eq!(
        stmt.sql(),
        people(" WHERE age BETWEEN $1 AND $2 LIMIT $3 OFFSET $4")
    );
    assert_eq!(
        stmt.values(),
        &[Value::Int(18), Value::Int(65), Value::Int(10), Value::Int(10)]
    );
    assert_eq!(stmt.params_ref().len(), 4);
}

#[test]
fn test_render_mysql() {
    let b = SqlBuilder::new(
        BuilderConfig::default()
            .dialect(DialectKind::MySql)
            .log(SqlLogConfig::disabled()),
    );
    let order = OrderBy::new().add(OrderItem::desc(Person::AGE).nulls_first());
    let data = b
        .select(
            &Query::<Person>::new().eq(Person::STATUS, "active"),
            &order,
            Pagination::new().offset(5),
        )
        .unwrap();
    assert_eq!(
        data.sql(),
        people(
            " WHERE status = :status_1 ORDER BY age DESC \
             LIMIT 18446744073709551615 OFFSET :offset_2"
        )
    );
    let stmt = data.render(&MySql).unwrap();
    assert!(stmt.sql().ends_with("WHERE status = ? ORDER BY age DESC LIMIT 18446744073709551615 OFFSET ?"));
}

#[test]
fn test_render_with_postgres_dialect_object() {
    let data = builder().delete_by_id::<Person>(1).unwrap();
    let stmt = data.render(&Postgres).unwrap();
    assert_eq!(stmt.sql(), "DELETE FROM people WHERE id = $1");
}
