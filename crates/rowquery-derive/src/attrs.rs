//! Parsing of `#[row(...)]` attributes.

use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Data, DeriveInput, Error, Fields, LitStr, Result, Token};

use crate::sql_ident::{parse_sql_ident, parse_sql_ident_with_span};

/// Field-level `#[row(...)]` options.
#[derive(Default)]
pub(crate) struct FieldAttr {
    pub is_id: bool,
    pub modified_at: bool,
    pub column: Option<LitStr>,
    pub references: Option<LitStr>,
}

impl Parse for FieldAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            match ident.to_string().as_str() {
                "id" => attr.is_id = true,
                "modified_at" => attr.modified_at = true,
                "column" => {
                    let _: Token![=] = input.parse()?;
                    attr.column = Some(input.parse()?);
                }
                "references" => {
                    let _: Token![=] = input.parse()?;
                    attr.references = Some(input.parse()?);
                }
                other => {
                    return Err(Error::new(
                        ident.span(),
                        format!("unknown row attribute `{other}`"),
                    ));
                }
            }

            if input.peek(Token![,]) {
                let _: Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

impl FieldAttr {
    fn merge(&mut self, other: FieldAttr) {
        self.is_id |= other.is_id;
        self.modified_at |= other.modified_at;
        if other.column.is_some() {
            self.column = other.column;
        }
        if other.references.is_some() {
            self.references = other.references;
        }
    }
}

/// Collect every `#[row(...)]` on a field.
pub(crate) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();
    for attr in &field.attrs {
        if attr.path().is_ident("row") {
            out.merge(attr.parse_args::<FieldAttr>()?);
        }
    }
    Ok(out)
}

/// The named fields of a struct, or an error naming the derive.
pub(crate) fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> Result<&'a Punctuated<syn::Field, Token![,]>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(&fields.named),
            _ => Err(Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

/// Rust-side name of a field (raw identifiers unescaped).
pub(crate) fn field_name(field: &syn::Field) -> Result<(syn::Ident, String)> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;
    let name = ident.unraw().to_string();
    Ok((ident, name))
}

/// Column a field maps to: `#[row(column = "...")]` or the field name.
pub(crate) fn column_name(field: &syn::Field, attr: &FieldAttr) -> Result<String> {
    match &attr.column {
        Some(lit) => parse_sql_ident(lit, "row column"),
        None => {
            let (ident, name) = field_name(field)?;
            parse_sql_ident_with_span(&name, ident.span(), "row column")
        }
    }
}

/// Table name from the struct-level `#[row(table = "...")]` attribute.
pub(crate) fn table_name(input: &DeriveInput) -> Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("row") {
            continue;
        }
        let nested = attr.parse_args::<syn::MetaNameValue>()?;
        if !nested.path.is_ident("table") {
            return Err(Error::new_spanned(
                &nested.path,
                "expected #[row(table = \"table_name\")]",
            ));
        }
        if let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(lit),
            ..
        }) = &nested.value
        {
            return parse_sql_ident(lit, "row table");
        }
        return Err(Error::new_spanned(
            &nested.value,
            "table name must be a string literal",
        ));
    }
    Err(Error::new_spanned(
        input,
        "RowType requires #[row(table = \"table_name\")] attribute",
    ))
}
