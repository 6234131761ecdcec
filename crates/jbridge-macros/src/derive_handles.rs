//! Implementation of the `#[derive(Handles)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, GenericParam, Member, parse_macro_input, parse_quote};

use crate::attrs::FieldAttrs;

pub fn derive_handles_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_handles_inner(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_handles_inner(mut input: DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "#[derive(Handles)] only supports structs",
        ));
    };

    let mut visits = Vec::new();
    let fields: Vec<&syn::Field> = match &data.fields {
        Fields::Named(fields) => fields.named.iter().collect(),
        Fields::Unnamed(fields) => fields.unnamed.iter().collect(),
        Fields::Unit => Vec::new(),
    };
    for (index, field) in fields.into_iter().enumerate() {
        if FieldAttrs::from_attrs(&field.attrs)?.skip {
            continue;
        }
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(index.into()),
        };
        visits.push(quote! {
            ::jbridge_core::tagged::Handles::visit_handles(&mut self.#member, visitor);
        });
    }

    for param in input.generics.params.iter_mut() {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!(::jbridge_core::tagged::Handles));
        }
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let visitor = if visits.is_empty() {
        quote! { _visitor }
    } else {
        quote! { visitor }
    };

    Ok(quote! {
        impl #impl_generics ::jbridge_core::tagged::Handles for #name #ty_generics #where_clause {
            fn visit_handles(
                &mut self,
                #visitor: &mut dyn FnMut(&mut ::jbridge_core::tagged::Tagged),
            ) {
                #(#visits)*
            }
        }
    })
}
