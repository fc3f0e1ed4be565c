//! # Type Mapping Module
//!
//! Maps Rust field types to an SQL type name and to the `ScalarKind` the
//! runtime uses to pick key strategies and conversions.
//!
//! ## Supported Type Mappings
//!
//! | Rust type                         | SQL type           | Kind        |
//! |-----------------------------------|--------------------|-------------|
//! | `i8`, `i16`, `u8`                 | `SMALLINT`         | `Integer`   |
//! | `i32`, `u16`, `u32`               | `INTEGER`          | `Integer`   |
//! | `i64`, `u64`, `isize`, `usize`    | `BIGINT`           | `Integer`   |
//! | `String`                          | `TEXT`             | `Text`      |
//! | `bool`                            | `BOOLEAN`          | `Bool`      |
//! | `f32`                             | `REAL`             | `Float`     |
//! | `f64`                             | `DOUBLE PRECISION` | `Float`     |
//! | `Uuid`                            | `UUID`             | `Uuid`      |
//! | `DateTime<Utc>`                   | `TIMESTAMPTZ`      | `Timestamp` |
//! | `NaiveDateTime`                   | `TIMESTAMP`        | `DateTime`  |
//! | `NaiveDate`                       | `DATE`             | `Date`      |
//! | `NaiveTime`                       | `TIME`             | `Time`      |
//! | `Vec<u8>`                         | `BLOB`             | `Bytes`     |
//!
//! `Option<T>` maps like `T` and is nullable. Anything else is `TEXT` with
//! kind `Other`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, PathArguments, PathSegment, Type};

/// Mapping result for one field type.
pub struct MappedType {
    pub sql_type: &'static str,
    pub nullable: bool,
    /// Path to the `ScalarKind` variant.
    pub kind: TokenStream,
}

/// Maps a Rust type to its SQL type, nullability and scalar kind.
///
/// # Examples
///
/// ```rust,ignore
/// let mapped = rust_type_to_sql(&parse_quote!(Option<i64>));
/// assert_eq!(mapped.sql_type, "BIGINT");
/// assert!(mapped.nullable);
/// ```
pub fn rust_type_to_sql(ty: &Type) -> MappedType {
    let (inner, nullable) = match option_inner(ty) {
        Some(inner) => (inner, true),
        None => (ty, false),
    };

    let (sql_type, kind) = match last_segment(inner) {
        Some(segment) => map_segment(segment),
        None => ("TEXT", "Other"),
    };

    let kind = syn::Ident::new(kind, proc_macro2::Span::call_site());
    MappedType { sql_type, nullable, kind: quote! { ::quill_orm::ScalarKind::#kind } }
}

fn map_segment(segment: &PathSegment) -> (&'static str, &'static str) {
    match segment.ident.to_string().as_str() {
        // Integers
        "i8" | "i16" | "u8" => ("SMALLINT", "Integer"),
        "i32" | "u16" | "u32" => ("INTEGER", "Integer"),
        "i64" | "u64" | "isize" | "usize" => ("BIGINT", "Integer"),

        "String" => ("TEXT", "Text"),
        "bool" => ("BOOLEAN", "Bool"),

        // Floating point
        "f32" => ("REAL", "Float"),
        "f64" => ("DOUBLE PRECISION", "Float"),

        "Uuid" => ("UUID", "Uuid"),

        // chrono
        "DateTime" => ("TIMESTAMPTZ", "Timestamp"),
        "NaiveDateTime" => ("TIMESTAMP", "DateTime"),
        "NaiveDate" => ("DATE", "Date"),
        "NaiveTime" => ("TIME", "Time"),

        "Vec" if first_generic(segment).and_then(last_segment).is_some_and(|s| s.ident == "u8") => {
            ("BLOB", "Bytes")
        }

        _ => ("TEXT", "Other"),
    }
}

/// The `T` of `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Option" {
        return None;
    }
    first_generic(segment)
}

fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

fn first_generic(segment: &PathSegment) -> Option<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}
