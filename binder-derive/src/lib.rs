mod parse;

use darling::FromDeriveInput;
use proc_macro::{self, TokenStream};
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use parse::ModelInput;

/// Automatically implement `Model` for your struct.
///
/// ## Attributes
///  * `table` - for structs:
///      - `table_name`: String, optional, default: the struct's name in snake case
///  * `column` - for struct fields:
///      - `auto_id`: bool, optional, default: `false`
///      - `column_name`: String, optional, default: the field's name
///      - `unique`: bool, optional, default: `false`
///      - `max_length`: usize, optional, `String` fields only
#[proc_macro_derive(Model, attributes(table, column))]
pub fn derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let opts = match ModelInput::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(err) => return err.write_errors().into(),
    };

    let ident = opts.ident();
    let table_name = opts.table_name();

    let mut errors = darling::Error::accumulator();
    let columns = opts
        .fields()
        .filter_map(|f| errors.handle(f.column()))
        .collect::<Vec<_>>();
    if let Err(err) = errors.finish() {
        return err.write_errors().into();
    }

    let field_idents = opts.fields().map(|f| f.ident()).collect::<Vec<_>>();
    let column_names = opts.fields().map(|f| f.column_name()).collect::<Vec<_>>();

    // Generate the needed impl code
    let output = quote!(
        impl ::binder::Model for #ident {
            fn table() -> &'static ::binder::Table {
                static TABLE: ::binder::__private::Lazy<::binder::Table> =
                    ::binder::__private::Lazy::new(|| {
                        ::binder::Table::new(#table_name, [#(#columns),*])
                    });

                &TABLE
            }

            fn to_record(&self) -> ::binder::Record {
                ::binder::Record::from_values(
                    <Self as ::binder::Model>::table(),
                    ::std::vec![
                        #(::binder::Value::from(::core::clone::Clone::clone(&self.#field_idents))),*
                    ],
                )
            }

            fn from_record(
                record: &::binder::Record
            ) -> ::core::result::Result<Self, ::binder::Error> {
                // Parse each column into the corresponding field
                ::core::result::Result::Ok(#ident {
                    #(#field_idents: record.try_get(#column_names)?),*
                })
            }
        }
    );

    output.into()
}
