use proc_macro::TokenStream;
use syn::{DeriveInput, Fields};

// one `From<Inner>` impl per newtype variant, unit variants carry no source and are left alone
fn impl_from_trait(ast: DeriveInput) -> TokenStream {
    let ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let variants = match ast.data {
        syn::Data::Enum(ref data) => &data.variants,
        syn::Data::Struct(_) => {
            return syn::Error::new_spanned(ident, "Structs are not supported by From")
                .to_compile_error()
                .into()
        }
        syn::Data::Union(_) => {
            return syn::Error::new_spanned(ident, "Unions are not supported by From")
                .to_compile_error()
                .into()
        }
    };

    let mut tokens = quote::quote!();
    for variant in variants {
        let name = &variant.ident;
        match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let inner = &fields.unnamed[0].ty;
                tokens.extend(quote::quote! {
                    impl #impl_generics From<#inner> for #ident #ty_generics #where_clause {
                        fn from (e: #inner) -> Self {
                            #ident::#name(e)
                        }
                    }
                });
            }
            Fields::Unit => {}
            _ => {
                return syn::Error::new_spanned(
                    variant,
                    "From only supports unit variants and variants with a single unnamed field",
                )
                .to_compile_error()
                .into()
            }
        }
    }
    tokens.into()
}

#[proc_macro_derive(From)]
pub fn from_derive_macro(item: TokenStream) -> TokenStream {
    match syn::parse::<DeriveInput>(item) {
        Ok(ast) => impl_from_trait(ast),
        Err(e) => e.to_compile_error().into(),
    }
}
