//! Derive macros for rowquery
//!
//! Provides `#[derive(RowType)]` and `#[derive(FromRecord)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod common;
mod from_record;
mod row_type;
mod sql_ident;

/// Derive `RowType` metadata for a struct.
///
/// # Example
///
/// ```ignore
/// use rowquery::RowType;
///
/// #[derive(RowType)]
/// #[row(table = "orders")]
/// struct Order {
///     #[row(id)]
///     id: i64,
///     status: String,
///     #[row(references = "shipments")]
///     shipment_id: Option<i64>,
///     #[row(modified_at)]
///     updated_at: chrono::DateTime<chrono::Utc>,
/// }
/// ```
///
/// # Generated
///
/// - `impl RowType` with static metadata (`Option<T>` fields are nullable)
/// - one `Field<Self>` constant per field, named in SHOUTY_SNAKE_CASE
///   (`Order::SHIPMENT_ID`)
/// - a registration picked up by `Schema::registered()`
///
/// # Attributes
///
/// - `#[row(table = "name")]` - Table name (required)
/// - `#[row(id)]` - Identifier column (defaults to a column named `id`)
/// - `#[row(column = "name")]` - Map field to a different column name
/// - `#[row(modified_at)]` - Modification timestamp used by optimistic deletes
/// - `#[row(references = "table")]` - Column holds the id of a row in `table`
#[proc_macro_derive(RowType, attributes(row))]
pub fn derive_row_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    row_type::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `FromRecord` for a struct.
///
/// Every field is decoded from the column it maps to; `#[row(column = "...")]`
/// is honoured the same way as for `RowType`.
#[proc_macro_derive(FromRecord, attributes(row))]
pub fn derive_from_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
