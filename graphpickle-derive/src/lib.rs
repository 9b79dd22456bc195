//! # graphpickle Derive Macros
//!
//! This crate provides the procedural macro for `graphpickle`. It implements
//! `Describe` and the field view of `PickleObject` for structs with named
//! fields.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives `graphpickle::Describe` and `graphpickle::PickleObject`.
///
/// Container attributes (`#[pickle(...)]` on the struct):
/// * `name = "..."`: the type name written to `$type` (defaults to the
///   module path followed by the struct name);
/// * `eq`: compare objects with the struct's `PartialEq`;
/// * `no_default`: do not require `Default`; the type then needs a handler
///   or a reduction to be restored.
///
/// Field attributes:
/// * `transient`: never written; restored objects keep the `Default` value;
/// * `rename = "..."`: the key used in the record.
#[proc_macro_derive(PickleObject, attributes(pickle))]
pub fn derive_pickle_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    if !input.generics.params.is_empty() {
        return syn::Error::new(name.span(), "PickleObject does not support generic types")
            .to_compile_error()
            .into();
    }

    let named = match input.data {
        Data::Struct(ds) => match ds.fields {
            Fields::Named(named) => named.named,
            _ => {
                return syn::Error::new(name.span(), "PickleObject only supports structs with named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(name.span(), "PickleObject only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let container = match parse_container_attributes(&input.attrs) {
        Ok(res) => res,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut fields = Vec::new();
    for field in named {
        let Some(ident) = field.ident else { continue };
        let (transient, rename) = match parse_field_attributes(&field.attrs) {
            Ok(res) => res,
            Err(e) => return e.to_compile_error().into(),
        };
        let key = rename.unwrap_or_else(|| ident.to_string());
        fields.push(PickleField { ident, key, transient });
    }

    let impl_describe = generate_describe(&name, &container);
    let impl_object = generate_pickle_object(&name, &container, &fields);

    let expanded = quote! {
        #impl_describe
        #impl_object
    };

    TokenStream::from(expanded)
}

// --- Internal Data Structures ---
struct PickleField {
    ident: syn::Ident,
    key: String,
    transient: bool,
}

#[derive(Default)]
struct Container {
    type_name: Option<String>,
    eq: bool,
    no_default: bool,
}

fn parse_container_attributes(attrs: &[Attribute]) -> syn::Result<Container> {
    let mut container = Container::default();
    for attr in attrs {
        if attr.path().is_ident("pickle") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let s: LitStr = meta.value()?.parse()?;
                    container.type_name = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("eq") {
                    container.eq = true;
                    return Ok(());
                }
                if meta.path.is_ident("no_default") {
                    container.no_default = true;
                    return Ok(());
                }
                Err(meta.error("Unknown pickle container attribute. Supported: name, eq, no_default"))
            })?;
        }
    }
    Ok(container)
}

/// Parses field attributes. Returns (transient, rename).
fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<(bool, Option<String>)> {
    let mut transient = false;
    let mut rename = None;

    for attr in attrs {
        if attr.path().is_ident("pickle") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("transient") {
                    transient = true;
                    return Ok(());
                }
                if meta.path.is_ident("rename") {
                    let s: LitStr = meta.value()?.parse()?;
                    rename = Some(s.value());
                    return Ok(());
                }
                Err(meta.error("Unknown pickle field attribute. Supported: transient, rename"))
            })?;
        }
    }
    Ok((transient, rename))
}

// --- Generator: Describe ---

fn generate_describe(name: &syn::Ident, container: &Container) -> proc_macro2::TokenStream {
    let type_name = match &container.type_name {
        Some(custom) => quote! { #custom },
        None => quote! { concat!(module_path!(), "::", stringify!(#name)) },
    };

    if container.no_default {
        return quote! {
            impl ::graphpickle::Describe for #name {
                const DESCRIPTOR: ::graphpickle::TypeDescriptor = ::graphpickle::TypeDescriptor::new(#type_name);
            }
        };
    }

    quote! {
        impl #name {
            #[doc(hidden)]
            fn __graphpickle_construct() -> ::graphpickle::ObjectRef {
                ::graphpickle::ObjectRef::object(<Self as ::core::default::Default>::default())
            }
        }

        impl ::graphpickle::Describe for #name {
            const DESCRIPTOR: ::graphpickle::TypeDescriptor =
                ::graphpickle::TypeDescriptor::constructible(#type_name, Self::__graphpickle_construct);
        }
    }
}

// --- Generator: PickleObject ---

fn generate_pickle_object(
    name: &syn::Ident,
    container: &Container,
    fields: &[PickleField],
) -> proc_macro2::TokenStream {
    let enumerated = fields.iter().filter(|f| !f.transient).map(|f| {
        let ident = &f.ident;
        let key = &f.key;
        quote! {
            (::std::string::String::from(#key), ::graphpickle::ToValue::to_value(&self.#ident))
        }
    });

    let assignments = fields.iter().filter(|f| !f.transient).map(|f| {
        let ident = &f.ident;
        let key = &f.key;
        quote! {
            #key => {
                self.#ident = ::graphpickle::FromValue::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    let transient = fields.iter().filter(|f| f.transient).map(|f| &f.key);

    let object_eq = if container.eq {
        quote! {
            fn object_eq(&self, other: &dyn ::graphpickle::PickleObject) -> bool {
                ::graphpickle::AsAny::as_any(other)
                    .downcast_ref::<Self>()
                    .is_some_and(|other| self == other)
            }
        }
    } else {
        quote! {}
    };

    quote! {
        impl ::graphpickle::PickleObject for #name {
            fn descriptor(&self) -> ::graphpickle::TypeDescriptor {
                <Self as ::graphpickle::Describe>::DESCRIPTOR
            }

            fn fields(&self) -> ::std::vec::Vec<(::std::string::String, ::graphpickle::Value)> {
                ::std::vec![#(#enumerated),*]
            }

            #[allow(unused_variables)]
            fn set_field(&mut self, name: &str, value: ::graphpickle::Value) -> ::graphpickle::Result<()> {
                match name {
                    #(#assignments)*
                    _ => ::core::result::Result::Err(::graphpickle::PickleError::UnknownField {
                        type_name: <Self as ::graphpickle::Describe>::DESCRIPTOR.name().to_string(),
                        field: name.to_string(),
                    }),
                }
            }

            fn transient_fields(&self) -> &'static [&'static str] {
                &[#(#transient),*]
            }

            #object_eq
        }
    }
}
