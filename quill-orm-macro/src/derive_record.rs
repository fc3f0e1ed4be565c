//! # Record Derive Macro Implementation
//!
//! Expands `#[derive(Record)]`. For every named field it emits a `FieldInfo`
//! literal and, for tagged and flattened fields, the match arms that read and
//! write the field by path.
//!
//! ## Generated Code
//!
//! ```rust,ignore
//! // Input:
//! #[derive(Record, Default)]
//! pub struct Audit {
//!     #[orm(column = "created_at")]
//!     pub created: NaiveDateTime,
//! }
//!
//! // Output (abridged):
//! impl ::quill_orm::Record for Audit {
//!     fn fields() -> Vec<FieldInfo> { vec![FieldInfo { name: "created", column: Some("created_at"), .. }] }
//!     fn field_value(&self, path: &[&str]) -> Option<Value> {
//!         match path {
//!             ["created"] => Some(ToValue::to_value(&self.created)),
//!             _ => None,
//!         }
//!     }
//!     fn set_field_value(&mut self, path: &[&str], value: Value) -> Result<(), Error> { /* ... */ }
//! }
//!
//! impl ::quill_orm::FromRecordRow for Audit { /* scan_record::<Self> */ }
//! ```

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Field, Fields, Visibility};

use crate::types::rust_type_to_sql;

/// Parsed `#[orm(...)]` options of one field.
#[derive(Default)]
struct FieldAttrs {
    /// `Some(None)` for a bare `column` tag.
    column: Option<Option<String>>,
    primary_key: bool,
    sequence: Option<String>,
    trigger: bool,
    flatten: bool,
}

fn parse_field_attrs(field: &Field) -> FieldAttrs {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                if meta.input.peek(syn::Token![=]) {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    attrs.column = Some(Some(value.value()));
                } else {
                    attrs.column = Some(None);
                }
            } else if meta.path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if meta.path.is_ident("sequence") {
                let value: syn::LitStr = meta.value()?.parse()?;
                attrs.sequence = Some(value.value());
            } else if meta.path.is_ident("trigger") {
                attrs.trigger = true;
            } else if meta.path.is_ident("flatten") {
                attrs.flatten = true;
            } else {
                return Err(meta.error("unknown orm attribute; expected column, primary_key, sequence, trigger or flatten"));
            }
            Ok(())
        })
        .expect("Failed to parse orm attributes");
    }

    if attrs.flatten && attrs.column.is_some() {
        panic!("a field cannot be both flatten and column");
    }
    attrs
}

/// Named fields of a struct.
pub(crate) fn named_fields(ast: &DeriveInput) -> Vec<&Field> {
    let Data::Struct(data) = &ast.data else {
        panic!("Record must be a struct");
    };
    match &data.fields {
        Fields::Named(fields) => fields.named.iter().collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => panic!("Record must have named fields"),
    }
}

/// Expands `#[derive(Record)]`.
///
/// # Panics
///
/// At compile time, if the input is not a struct with named fields or an
/// `#[orm(...)]` attribute is malformed.
pub fn expand(ast: &DeriveInput) -> TokenStream {
    let struct_name = &ast.ident;
    let type_name = struct_name.to_string();
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let mut infos = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();

    for field in named_fields(ast) {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = ident.unraw().to_string();
        let ty = &field.ty;
        let attrs = parse_field_attrs(field);
        let exported = matches!(field.vis, Visibility::Public(_));

        // --------------------------------------------------------------------
        // Embedded group
        // --------------------------------------------------------------------
        if attrs.flatten {
            infos.push(quote! {
                ::quill_orm::FieldInfo {
                    name: #name,
                    column: None,
                    sql_type: "",
                    nullable: false,
                    exported: #exported,
                    primary_key: false,
                    sequence: None,
                    trigger: false,
                    kind: ::quill_orm::FieldKind::Embedded(<#ty as ::quill_orm::Record>::fields),
                }
            });
            getters.push(quote! {
                [#name, rest @ ..] => ::quill_orm::Record::field_value(&self.#ident, rest),
            });
            setters.push(quote! {
                [#name, rest @ ..] => ::quill_orm::Record::set_field_value(&mut self.#ident, rest, value),
            });
            continue;
        }

        // --------------------------------------------------------------------
        // Scalar field
        // --------------------------------------------------------------------
        let mapped = rust_type_to_sql(ty);
        let sql_type = mapped.sql_type;
        let nullable = mapped.nullable;
        let kind = mapped.kind;
        let primary_key = attrs.primary_key;
        let trigger = attrs.trigger;

        let column = match &attrs.column {
            Some(Some(column)) => quote! { Some(#column) },
            Some(None) => quote! { Some(#name) },
            None => quote! { None },
        };
        let sequence = match &attrs.sequence {
            Some(expr) => quote! { Some(#expr) },
            None => quote! { None },
        };

        infos.push(quote! {
            ::quill_orm::FieldInfo {
                name: #name,
                column: #column,
                sql_type: #sql_type,
                nullable: #nullable,
                exported: #exported,
                primary_key: #primary_key,
                sequence: #sequence,
                trigger: #trigger,
                kind: ::quill_orm::FieldKind::Scalar(#kind),
            }
        });

        // Untagged fields carry metadata only; their types need not convert.
        if attrs.column.is_some() {
            getters.push(quote! {
                [#name] => Some(::quill_orm::ToValue::to_value(&self.#ident)),
            });
            setters.push(quote! {
                [#name] => {
                    self.#ident = ::quill_orm::FromValue::from_value(value)?;
                    Ok(())
                }
            });
        }
    }

    quote! {
        impl #impl_generics ::quill_orm::Record for #struct_name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::quill_orm::FieldInfo> {
                ::std::vec![#(#infos),*]
            }

            fn field_value(&self, path: &[&str]) -> ::std::option::Option<::quill_orm::Value> {
                match path {
                    #(#getters)*
                    _ => None,
                }
            }

            #[allow(unused_variables)]
            fn set_field_value(
                &mut self,
                path: &[&str],
                value: ::quill_orm::Value,
            ) -> ::std::result::Result<(), ::quill_orm::Error> {
                match path {
                    #(#setters)*
                    _ => Err(::quill_orm::__private::unknown_field(#type_name, path)),
                }
            }
        }

        impl #impl_generics ::quill_orm::FromRecordRow for #struct_name #ty_generics #where_clause {
            fn from_record_row(
                row: &::quill_orm::__private::AnyRow,
                ctx: &::quill_orm::__private::ScanContext<'_>,
            ) -> ::std::result::Result<Self, ::quill_orm::Error> {
                ::quill_orm::__private::scan_record::<Self>(row, ctx)
            }
        }
    }
}
