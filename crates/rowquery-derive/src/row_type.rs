//! RowType derive macro implementation

use heck::ToShoutySnakeCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{DeriveInput, Error, Result};

use crate::attrs::{column_name, field_attr, field_name, named_fields, table_name};
use crate::common::syn_types::option_inner;
use crate::sql_ident::parse_sql_ident;

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "RowType cannot be derived for generic structs",
        ));
    }

    let table = table_name(&input)?;
    let fields = named_fields(&input, "RowType")?;

    let mut columns = Vec::with_capacity(fields.len());
    let mut column_names: Vec<String> = Vec::with_capacity(fields.len());
    let mut field_consts = Vec::with_capacity(fields.len());
    let mut references = Vec::new();
    let mut id_column: Option<String> = None;
    let mut modified_at: Option<String> = None;

    for field in fields {
        let attr = field_attr(field)?;
        let (ident, rust_name) = field_name(field)?;
        let column = column_name(field, &attr)?;

        if column_names.contains(&column) {
            return Err(Error::new_spanned(
                field,
                format!("column '{column}' is mapped by two fields"),
            ));
        }
        column_names.push(column.clone());

        let nullable = option_inner(&field.ty).is_some().then(|| quote!(.nullable()));
        columns.push(quote! {
            rowquery::Column::mapped(#rust_name, #column) #nullable
        });

        if attr.is_id {
            if id_column.is_some() {
                return Err(Error::new_spanned(field, "only one field may be #[row(id)]"));
            }
            id_column = Some(column.clone());
        }
        if attr.modified_at {
            if modified_at.is_some() {
                return Err(Error::new_spanned(
                    field,
                    "only one field may be #[row(modified_at)]",
                ));
            }
            modified_at = Some(column.clone());
        }
        if let Some(lit) = &attr.references {
            let target = parse_sql_ident(lit, "row references")?;
            references.push(quote! {
                rowquery::Reference::new(#column, #target)
            });
        }

        let const_ident = format_ident!("{}", rust_name.to_shouty_snake_case(), span = ident.span());
        let doc = format!("`{table}.{column}`");
        field_consts.push(quote! {
            #[doc = #doc]
            pub const #const_ident: rowquery::Field<#name> = rowquery::Field::declared(#column);
        });
    }

    let id_column = match id_column {
        Some(id) => id,
        None if column_names.iter().any(|c| c == "id") => "id".to_string(),
        None => {
            return Err(Error::new_spanned(
                &input,
                "RowType requires a #[row(id)] field or a column named `id`",
            ));
        }
    };
    let modified_at = modified_at.map(|c| quote!(.with_modified_at(#c)));

    Ok(quote! {
        impl #name {
            #(#field_consts)*
        }

        impl rowquery::RowType for #name {
            fn meta() -> &'static rowquery::RowMeta {
                const COLUMNS: &[rowquery::Column] = &[#(#columns),*];
                const REFERENCES: &[rowquery::Reference] = &[#(#references),*];
                static META: rowquery::RowMeta = rowquery::RowMeta::new(#table, COLUMNS)
                    .with_id(#id_column)
                    #modified_at
                    .with_references(REFERENCES);
                &META
            }
        }

        rowquery::inventory::submit! {
            rowquery::RowRegistration {
                meta_fn: <#name as rowquery::RowType>::meta,
            }
        }
    })
}
