use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    DeriveInput, Ident, Type,
    parse::{Parse, ParseStream},
    spanned::Spanned,
};

#[derive(Debug)]
pub struct DeriveEventSet {
    ident: Ident,
    events: Vec<(Ident, Type)>,
}

impl DeriveEventSet {
    pub fn expand(self) -> TokenStream {
        let Self { ident, events } = self;

        let event_types = events.iter().map(|(_, ty)| ty);

        let match_arms = events.iter().map(|(variant_ident, ty)| {
            quote! {
                <#ty as ::tablekit_sdk::event::Event>::EVENT_TYPE => {
                    ::std::option::Option::Some(
                        ::tablekit_sdk::__private::serde_json::from_value::<#ty>(data)
                            .map(#ident::#variant_ident)
                            .map_err(::tablekit_sdk::error::SerializationError::from)
                    )
                }
            }
        });

        let as_event_impls = events.iter().map(|(variant_ident, ty)| {
            quote! {
                #[automatically_derived]
                impl ::tablekit_sdk::event::AsEvent<#ty> for #ident {
                    fn as_event(&self) -> ::std::option::Option<&#ty> {
                        match self {
                            #ident::#variant_ident(ev) => ::std::option::Option::Some(ev),
                            #[allow(unreachable_patterns)]
                            _ => ::std::option::Option::None,
                        }
                    }
                }
            }
        });

        quote! {
            #[automatically_derived]
            impl ::tablekit_sdk::event::EventSet for #ident {
                const EVENT_TYPES: &'static [&'static str] = &[ #( <#event_types as ::tablekit_sdk::event::Event>::EVENT_TYPE, )* ];

                fn from_event(
                    event_type: &str,
                    data: ::tablekit_sdk::__private::serde_json::Value,
                ) -> ::std::option::Option<::std::result::Result<Self, ::tablekit_sdk::error::SerializationError>> {
                    match event_type {
                        #( #match_arms )*
                        _ => ::std::option::Option::None
                    }
                }
            }

            #( #as_event_impls )*
        }
    }
}

impl Parse for DeriveEventSet {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let input: DeriveInput = input.parse()?;

        let events = match input.data {
            syn::Data::Enum(data) => data
                .variants
                .into_iter()
                .map(|variant| {
                    let span = variant.fields.span();
                    match variant.fields {
                        syn::Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => unnamed
                            .unnamed
                            .into_iter()
                            .next()
                            .map(|field| (variant.ident, field.ty))
                            .ok_or_else(|| syn::Error::new(span, "missing event field")),
                        _ => Err(syn::Error::new(
                            span,
                            "EventSet requires one unnamed field per event type",
                        )),
                    }
                })
                .collect::<syn::Result<_>>()?,
            _ => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    "EventSet can only be derived on enums",
                ));
            }
        };

        Ok(DeriveEventSet {
            ident: input.ident,
            events,
        })
    }
}
