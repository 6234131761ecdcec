//! Implementation of the `#[derive(Mirror)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Member, parse_macro_input};

use crate::attrs::MirrorAttrs;

pub fn derive_mirror_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_mirror_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_mirror_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let attrs = MirrorAttrs::from_attrs(&input.attrs)?;

    let Some(class) = attrs.class else {
        return Err(syn::Error::new_spanned(
            name,
            "#[derive(Mirror)] needs #[jbridge(class = \"a::b::C\")]",
        ));
    };
    let override_name = match &attrs.descriptor {
        Some(descriptor) => quote! { ::core::option::Option::Some(#descriptor) },
        None => quote! { ::core::option::Option::None },
    };

    let (member, constructor) = object_member(input)?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let string_impl = attrs.string.then(|| {
        quote! {
            impl #impl_generics ::jbridge_core::StringClass for #name #ty_generics #where_clause {}
        }
    });

    Ok(quote! {
        impl #impl_generics ::jbridge_core::JavaClass for #name #ty_generics #where_clause {
            const SCOPED_NAME: &'static str = #class;
            const OVERRIDE: ::core::option::Option<&'static str> = #override_name;
        }

        impl #impl_generics ::jbridge_core::Mirror for #name #ty_generics #where_clause {
            fn from_object(object: ::jbridge_core::Object) -> Self {
                #constructor
            }

            fn object(&self) -> &::jbridge_core::Object {
                &self.#member
            }
        }

        impl #impl_generics ::jbridge_core::tagged::Handles for #name #ty_generics #where_clause {
            fn visit_handles(
                &mut self,
                visitor: &mut dyn FnMut(&mut ::jbridge_core::tagged::Tagged),
            ) {
                ::jbridge_core::tagged::Handles::visit_handles(&mut self.#member, visitor);
            }
        }

        #string_impl
    })
}

/// The single `Object` field and the expression that builds `Self` from it.
fn object_member(input: &DeriveInput) -> syn::Result<(Member, TokenStream2)> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "#[derive(Mirror)] only supports structs",
        ));
    };
    let name = &input.ident;

    match &data.fields {
        Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
            Ok((Member::Unnamed(0.into()), quote! { #name(object) }))
        }
        Fields::Named(fields) if fields.named.len() == 1 => {
            let field = fields.named.first().and_then(|f| f.ident.clone());
            match field {
                Some(ident) => Ok((Member::Named(ident.clone()), quote! { #name { #ident: object } })),
                None => Err(syn::Error::new_spanned(name, "expected a named field")),
            }
        }
        _ => Err(syn::Error::new_spanned(
            &data.fields,
            "#[derive(Mirror)] needs exactly one field holding the Object",
        )),
    }
}
