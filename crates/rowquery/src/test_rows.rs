//! Hand-written row types shared by unit tests.

use crate::schema::{Column, Field, Reference, RowMeta, RowType};

pub struct Person;

const PERSON_COLUMNS: &[Column] = &[
    Column::new("id"),
    Column::mapped("firstName", "first_name"),
    Column::mapped("lastName", "last_name").nullable(),
    Column::new("age").nullable(),
    Column::new("status"),
    Column::new("nickname").nullable(),
    Column::new("active"),
    Column::new("modified_at"),
];

static PERSON: RowMeta = RowMeta::new("people", PERSON_COLUMNS)
    .with_modified_at("modified_at");

impl RowType for Person {
    fn meta() -> &'static RowMeta {
        &PERSON
    }
}

impl Person {
    pub const ID: Field<Person> = Field::declared("id");
    pub const FIRST_NAME: Field<Person> = Field::declared("first_name");
    pub const LAST_NAME: Field<Person> = Field::declared("last_name");
    pub const AGE: Field<Person> = Field::declared("age");
    pub const STATUS: Field<Person> = Field::declared("status");
    pub const NICKNAME: Field<Person> = Field::declared("nickname");
    pub const ACTIVE: Field<Person> = Field::declared("active");
}

pub struct Order;

const ORDER_REFERENCES: &[Reference] = &[Reference::new("shipment_id", "shipments")];

const ORDER_COLUMNS: &[Column] = &[
    Column::new("id"),
    Column::new("status"),
    Column::mapped("customerName", "customer_name"),
    Column::new("total"),
    Column::new("shipment_id").nullable(),
];

static ORDER: RowMeta = RowMeta::new("orders", ORDER_COLUMNS)
    .with_references(ORDER_REFERENCES);

impl RowType for Order {
    fn meta() -> &'static RowMeta {
        &ORDER
    }
}

impl Order {
    pub const ID: Field<Order> = Field::declared("id");
    pub const STATUS: Field<Order> = Field::declared("status");
    pub const CUSTOMER_NAME: Field<Order> = Field::declared("customer_name");
    pub const TOTAL: Field<Order> = Field::declared("total");
    pub const SHIPMENT_ID: Field<Order> = Field::declared("shipment_id");
}

pub struct Shipment;

const SHIPMENT_COLUMNS: &[Column] = &[
    Column::new("id"),
    Column::new("status"),
    Column::new("carrier"),
    Column::new("tracking_code").nullable(),
];

static SHIPMENT: RowMeta = RowMeta::new("shipments", SHIPMENT_COLUMNS);

impl RowType for Shipment {
    fn meta() -> &'static RowMeta {
        &SHIPMENT
    }
}

impl Shipment {
    pub const ID: Field<Shipment> = Field::declared("id");
    pub const STATUS: Field<Shipment> = Field::declared("status");
    pub const CARRIER: Field<Shipment> = Field::declared("carrier");
}

pub struct OrderLine;

const ORDER_LINE_REFERENCES: &[Reference] = &[Reference::new("order_id", "orders")];

const ORDER_LINE_COLUMNS: &[Column] = &[
    Column::new("id"),
    Column::new("order_id"),
    Column::new("sku"),
    Column::new("quantity"),
];

static ORDER_LINE: RowMeta = RowMeta::new("order_lines", ORDER_LINE_COLUMNS)
    .with_references(ORDER_LINE_REFERENCES);

impl RowType for OrderLine {
    fn meta() -> &'static RowMeta {
        &ORDER_LINE
    }
}

impl OrderLine {
    pub const ORDER_ID: Field<OrderLine> = Field::declared("order_id");
    pub const SKU: Field<OrderLine> = Field::declared("sku");
    pub const QUANTITY: Field<OrderLine> = Field::declared("quantity");
}
