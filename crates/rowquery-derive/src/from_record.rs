//! FromRecord derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::{column_name, field_attr, field_name, named_fields};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = named_fields(&input, "FromRecord")?;

    let field_extracts = fields
        .iter()
        .map(|field| {
            let attr = field_attr(field)?;
            let (ident, _) = field_name(field)?;
            let column = column_name(field, &attr)?;
            Ok(quote! {
                #ident: record.decode(#column)?
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics rowquery::FromRecord for #name #ty_generics #where_clause {
            fn from_record(record: &rowquery::Record) -> rowquery::QueryResult<Self> {
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}
