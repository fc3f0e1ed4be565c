//! # Entity Derive Macro Implementation
//!
//! Expands `#[derive(Entity)]`: everything `#[derive(Record)]` generates plus
//! an `Entity` impl carrying the table name.
//!
//! The table name comes from `#[orm(table = "...")]` on the struct, or the
//! struct name in snake_case (`UserAccount` → `user_account`).

use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::derive_record;

fn table_name(ast: &DeriveInput) -> String {
    let mut table = None;

    for attr in &ast.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: syn::LitStr = meta.value()?.parse()?;
                table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unknown orm attribute; expected table"))
            }
        })
        .expect("Failed to parse orm attributes");
    }

    match table {
        Some(table) if table.trim().is_empty() => panic!("orm table name cannot be empty"),
        Some(table) => table,
        None => ast.ident.to_string().to_snake_case(),
    }
}

/// Expands `#[derive(Entity)]`.
pub fn expand(ast: &DeriveInput) -> TokenStream {
    let struct_name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let table = table_name(ast);
    let record = derive_record::expand(ast);

    quote! {
        #record

        impl #impl_generics ::quill_orm::Entity for #struct_name #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table
            }
        }
    }
}
