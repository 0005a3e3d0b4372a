use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DataEnum, DataStruct, DeriveInput, Fields, Generics, Ident, Index, Path, Type,
    Variant,
};

struct Target {
    ident: Ident,
    generics: Generics,
    path: Path,
}

fn repr_of<'a>(mut attrs: impl Iterator<Item = &'a Attribute>) -> Type {
    attrs
        .find(|&attr| attr.path().is_ident("repr"))
        .expect("Enum payloads need a #[repr(...)] attribute to size the tag.")
        .parse_args()
        .expect("#[repr(...)] must name exactly one integer type.")
}

/// Tag expressions for each variant, following discriminant counting rules.
fn tags<'a>(variants: impl Iterator<Item = &'a Variant>) -> Vec<TokenStream2> {
    let mut tags = Vec::new();
    let mut anchor = quote! { 0 };
    let mut offset = 0usize;

    for variant in variants {
        match &variant.discriminant {
            Some((_, expr)) => {
                anchor = quote! { #expr };
                offset = 0;
                tags.push(anchor.clone());
            }
            None => {
                let offset_lit = Index::from(offset);
                tags.push(quote! { #anchor + #offset_lit });
            }
        }
        offset += 1;
    }

    tags
}

fn tag_const(variant: &Variant) -> Ident {
    format_ident!(
        "{}_TAG",
        inflector::cases::screamingsnakecase::to_screaming_snake_case(&variant.ident.to_string())
    )
}

fn encode_struct(s: &DataStruct, target: &Target) -> TokenStream2 {
    let ident = &target.ident;
    let path = &target.path;
    let (impl_generics, ty_generics, where_clause) = target.generics.split_for_impl();
    let types: Vec<_> = s.fields.iter().map(|field| &field.ty).collect();

    let (write_body, read_body) = match &s.fields {
        Fields::Unit => (quote! { Ok(()) }, quote! { Ok(Self) }),
        Fields::Unnamed(fields) => {
            let indices: Vec<_> = (0..fields.unnamed.len()).map(Index::from).collect();

            (
                quote! {
                    let mut dst = dst.into_iter();
                    #( #path::Payload::write_to(&self.#indices, &mut dst)?; )*
                    Ok(())
                },
                quote! {
                    let mut src = src.into_iter();
                    Ok(Self( #( <#types as #path::Payload>::read_from(&mut src)?, )* ))
                },
            )
        }
        Fields::Named(fields) => {
            let names: Vec<_> = fields
                .named
                .iter()
                .map(|field| field.ident.as_ref().unwrap())
                .collect();

            (
                quote! {
                    let mut dst = dst.into_iter();
                    #( #path::Payload::write_to(&self.#names, &mut dst)?; )*
                    Ok(())
                },
                quote! {
                    let mut src = src.into_iter();
                    Ok(Self { #( #names: <#types as #path::Payload>::read_from(&mut src)?, )* })
                },
            )
        }
    };

    quote! {
        impl #impl_generics #path::Payload for #ident #ty_generics #where_clause {
            fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), #path::error::EndOfInput> {
                #write_body
            }

            fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, #path::error::Error> {
                #read_body
            }
        }
    }
}

fn encode_enum(e: &DataEnum, target: &Target, repr: Type) -> TokenStream2 {
    let ident = &target.ident;
    let path = &target.path;
    let (impl_generics, ty_generics, where_clause) = target.generics.split_for_impl();

    let tags = tags(e.variants.iter());
    let consts: Vec<_> = e.variants.iter().map(tag_const).collect();

    let write_arms: Vec<_> = e
        .variants
        .iter()
        .zip(consts.iter())
        .map(|(variant, tag)| {
            let name = &variant.ident;
            match &variant.fields {
                Fields::Unit => quote! {
                    Self::#name => #path::Payload::write_to(&#tag, &mut dst)
                },
                Fields::Unnamed(fields) => {
                    let bindings: Vec<_> =
                        (0..fields.unnamed.len()).map(|i| format_ident!("f{i}")).collect();

                    quote! {
                        Self::#name(#(#bindings),*) => {
                            #path::Payload::write_to(&#tag, &mut dst)?;
                            #( #path::Payload::write_to(#bindings, &mut dst)?; )*
                            Ok(())
                        }
                    }
                }
                Fields::Named(fields) => {
                    let bindings: Vec<_> = fields
                        .named
                        .iter()
                        .map(|field| field.ident.as_ref().unwrap())
                        .collect();

                    quote! {
                        Self::#name { #(#bindings),* } => {
                            #path::Payload::write_to(&#tag, &mut dst)?;
                            #( #path::Payload::write_to(#bindings, &mut dst)?; )*
                            Ok(())
                        }
                    }
                }
            }
        })
        .collect();

    let read_arms: Vec<_> = e
        .variants
        .iter()
        .zip(consts.iter())
        .map(|(variant, tag)| {
            let name = &variant.ident;
            let value = match &variant.fields {
                Fields::Unit => quote! { Self::#name },
                Fields::Unnamed(fields) => {
                    let types: Vec<_> = fields.unnamed.iter().map(|field| &field.ty).collect();
                    quote! {
                        Self::#name( #( <#types as #path::Payload>::read_from(&mut src)?, )* )
                    }
                }
                Fields::Named(fields) => {
                    let names: Vec<_> = fields
                        .named
                        .iter()
                        .map(|field| field.ident.as_ref().unwrap())
                        .collect();
                    let types: Vec<_> = fields.named.iter().map(|field| &field.ty).collect();
                    quote! {
                        Self::#name { #( #names: <#types as #path::Payload>::read_from(&mut src)?, )* }
                    }
                }
            };

            quote! { #tag => Ok(#value) }
        })
        .collect();

    quote! {
        impl #impl_generics #path::Payload for #ident #ty_generics #where_clause {
            fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), #path::error::EndOfInput> {
                let mut dst = dst.into_iter();

                #( const #consts: #repr = #tags; )*

                match self {
                    #( #write_arms, )*
                }
            }

            fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, #path::error::Error> {
                let mut src = src.into_iter();

                #( const #consts: #repr = #tags; )*

                match <#repr as #path::Payload>::read_from(&mut src)? {
                    #( #read_arms, )*
                    _ => Err(#path::error::Error::Invalid),
                }
            }
        }
    }
}

pub fn derive(item: TokenStream) -> TokenStream {
    let item: DeriveInput = syn::parse2(item.into()).unwrap();

    let target = Target {
        ident: item.ident,
        generics: item.generics,
        path: syn::parse2(quote! { packit }).unwrap(),
    };

    let implementation = match &item.data {
        Data::Struct(s) => encode_struct(s, &target),
        Data::Enum(e) => encode_enum(e, &target, repr_of(item.attrs.iter())),
        Data::Union(_) => panic!("Payloads can only be derived for structs and enums."),
    };

    implementation.into()
}
