use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    DeriveInput, Ident, LitStr,
    parse::{Parse, ParseStream},
};

#[derive(Debug)]
pub struct DeriveEvent {
    ident: Ident,
    event_type: LitStr,
    domain_ids: Vec<(Ident, LitStr)>,
}

impl DeriveEvent {
    pub fn expand(self) -> TokenStream {
        let Self {
            ident,
            event_type,
            domain_ids,
        } = self;

        let domain_id_names = domain_ids.iter().map(|(_, name)| name);
        let domain_ids_inserts = domain_ids.iter().map(|(field, name)| {
            quote! {
                ids.insert(
                    #name,
                    ::tablekit_sdk::domain_id::DomainIdValue::from(::std::clone::Clone::clone(&self.#field)),
                );
            }
        });

        quote! {
            #[automatically_derived]
            impl ::tablekit_sdk::event::Event for #ident {
                const EVENT_TYPE: &'static str = #event_type;
                const DOMAIN_ID_FIELDS: &'static [&'static str] = &[ #( #domain_id_names, )* ];

                fn domain_ids(&self) -> ::tablekit_sdk::domain_id::DomainIdValues {
                    let mut ids = <::tablekit_sdk::domain_id::DomainIdValues as ::std::default::Default>::default();
                    #( #domain_ids_inserts )*
                    ids
                }
            }
        }
    }
}

impl Parse for DeriveEvent {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let input: DeriveInput = input.parse()?;

        let event_type = input
            .attrs
            .iter()
            .find_map(|attr| {
                if attr.path().is_ident("event_type") {
                    Some(attr.parse_args())
                } else {
                    None
                }
            })
            .transpose()?
            .unwrap_or_else(|| LitStr::new(&input.ident.to_string(), input.ident.span()));

        let domain_ids = match input.data {
            syn::Data::Struct(data) => data
                .fields
                .into_iter()
                .filter_map(|field| {
                    let attr = field
                        .attrs
                        .into_iter()
                        .find(|attr| attr.path().is_ident("domain_id"))?;
                    let ident = field.ident?;

                    match attr.meta {
                        syn::Meta::Path(_) => {
                            let name = LitStr::new(&ident.to_string(), ident.span());
                            Some(Ok((ident, name)))
                        }
                        syn::Meta::List(list) => {
                            Some(list.parse_args().map(|name: LitStr| (ident, name)))
                        }
                        syn::Meta::NameValue(meta) => Some(Err(syn::Error::new_spanned(
                            meta,
                            "expected `#[domain_id]` or `#[domain_id(\"name\")]`",
                        ))),
                    }
                })
                .collect::<syn::Result<_>>()?,
            _ => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    "Event can only be derived on structs",
                ));
            }
        };

        Ok(DeriveEvent {
            ident: input.ident,
            event_type,
            domain_ids,
        })
    }
}
