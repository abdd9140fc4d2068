use convert_case::{Case, Casing};
use darling::{ast::Data, FromDeriveInput, FromField};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, Ident, PathArguments, Type};

#[derive(FromField)]
#[darling(attributes(column))]
pub struct ModelField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    auto_id: bool,
    #[darling(default)]
    unique: bool,
    column_name: Option<String>,
    max_length: Option<usize>,
}

#[derive(FromDeriveInput)]
#[darling(attributes(table), supports(struct_named))]
pub struct ModelInput {
    ident: Ident,
    data: Data<(), ModelField>,
    table_name: Option<String>,
}

/// The column kind a field maps to.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    AutoId,
    Int,
    Float,
    Bool,
    Str,
}

impl ModelInput {
    pub const fn ident(&self) -> &Ident {
        &self.ident
    }

    /// Get the table's name, the struct's name in snake case
    /// unless specified otherwise.
    pub fn table_name(&self) -> String {
        if let Some(table_name) = &self.table_name {
            return table_name.clone();
        }

        self.ident.to_string().to_case(Case::Snake)
    }

    pub fn fields(&self) -> impl Iterator<Item = &ModelField> {
        match &self.data {
            Data::Struct(fields) => fields.fields.iter(),
            Data::Enum(_) => unreachable!("darling only accepts named structs"),
        }
    }
}

impl ModelField {
    /// Get the field's identifier.
    pub fn ident(&self) -> &Ident {
        self.ident
            .as_ref()
            .expect("darling only accepts named fields")
    }

    /// Get the column's name.
    pub fn column_name(&self) -> String {
        if let Some(column_name) = &self.column_name {
            return column_name.clone();
        }

        self.ident().to_string()
    }

    /// Get the column declaration, e.g. `::binder::Column::int("i1").not_null()`.
    pub fn column(&self) -> darling::Result<TokenStream> {
        let (inner, nullable) = unwrap_option(&self.ty);

        let kind = match type_name(inner).as_deref() {
            Some("i64" | "i32") if self.auto_id => Kind::AutoId,
            Some("i64" | "i32") => Kind::Int,
            Some("f64" | "f32") => Kind::Float,
            Some("bool") => Kind::Bool,
            Some("String") => Kind::Str,
            _ => {
                let msg = format!(
                    "cannot map field `{}` to a column, supported types are \
                     i64, i32, f64, f32, bool, String and Option of those",
                    self.ident()
                );
                return Err(self.error(msg));
            }
        };

        if self.auto_id && kind != Kind::AutoId {
            return Err(self.error("`auto_id` requires an integer field"));
        }
        if self.max_length.is_some() && kind != Kind::Str {
            return Err(self.error("`max_length` requires a String field"));
        }

        let ctor = match kind {
            Kind::AutoId => quote!(auto_id),
            Kind::Int => quote!(int),
            Kind::Float => quote!(float),
            Kind::Bool => quote!(bool),
            Kind::Str => quote!(string),
        };
        let column_name = self.column_name();

        let mut column = quote!(::binder::Column::#ctor(#column_name));
        if !nullable && kind != Kind::AutoId {
            column = quote!(#column.not_null());
        }
        if self.unique {
            column = quote!(#column.unique());
        }
        if let Some(n) = self.max_length {
            column = quote!(#column.max_length(#n));
        }

        Ok(column)
    }

    fn error(&self, msg: impl std::fmt::Display) -> darling::Error {
        darling::Error::custom(msg).with_span(&self.ty)
    }
}

/// Split `Option<T>` into `(T, true)`, anything else into `(ty, false)`.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Type::Path(path) = ty {
        if let Some(segment) = path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return (inner, true);
                    }
                }
            }
        }
    }

    (ty, false)
}

fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}
