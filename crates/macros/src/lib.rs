mod derive_event;
mod derive_event_set;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use crate::derive_event::DeriveEvent;
use crate::derive_event_set::DeriveEventSet;

/// Derives `tablekit_sdk::event::Event`.
///
/// The event type defaults to the struct name and can be overridden with
/// `#[event_type("...")]`. Fields marked `#[domain_id]` (or
/// `#[domain_id("name")]`) identify the aggregates the event belongs to.
#[proc_macro_derive(Event, attributes(event_type, domain_id))]
pub fn event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveEvent);
    TokenStream::from(input.expand())
}

/// Derives `tablekit_sdk::event::EventSet` on an enum of event structs.
#[proc_macro_derive(EventSet)]
pub fn event_set(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveEventSet);
    TokenStream::from(input.expand())
}
