// These lints are triggered by darling's generated code for
// `#[darling(default)]`.
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_continue)]

use darling::{FromDeriveInput, FromMeta, util::PathList};
use heck::ToUpperCamelCase;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Ident, Path, parse_macro_input};

#[allow(clippy::doc_markdown, reason = "false positive")]
/// Build a PascalCase enum variant name from a type path.
fn path_to_pascal_ident(path: &Path) -> Ident {
    let combined = path
        .segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("_");
    let pascal = combined.to_upper_camel_case();
    let span = path
        .segments
        .last()
        .map_or_else(proc_macro2::Span::call_site, |segment| segment.ident.span());
    Ident::new(&pascal, span)
}

/// Returns the name override or the struct's own name.
fn default_name(ident: &Ident, name: Option<String>) -> String {
    name.unwrap_or_else(|| ident.to_string())
}

/// How a derived aggregate is written into snapshots.
#[derive(Debug, Clone, Copy, FromMeta)]
enum SnapshotCapture {
    #[darling(rename = "fields")]
    Fields,
    #[darling(rename = "hooks")]
    Hooks,
}

/// Configuration for the `#[aggregate(...)]` attribute.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(aggregate), supports(struct_named))]
struct AggregateArgs {
    ident: Ident,
    vis: syn::Visibility,
    events: PathList,
    #[darling(default)]
    name: Option<String>,
    #[darling(default)]
    event_enum: Option<String>,
    #[darling(default)]
    derives: Option<PathList>,
    /// Field holding the `AggregateRoot`.
    #[darling(default)]
    root: Option<Ident>,
    #[darling(default)]
    snapshot: Option<SnapshotCapture>,
}

/// Configuration for the `#[event(...)]` attribute.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(event), supports(struct_any, enum_any))]
struct DomainEventArgs {
    ident: Ident,
    #[darling(default)]
    reason: Option<String>,
}

/// Captures the event type path and its generated enum variant identifier.
struct EventSpec<'a> {
    path: &'a Path,
    variant: Ident,
}

impl<'a> EventSpec<'a> {
    /// Build an event spec from a type path.
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            variant: path_to_pascal_ident(path),
        }
    }
}

/// Parse derive input with darling and render errors as tokens.
fn parse_or_error<T, F>(input: &DeriveInput, f: F) -> TokenStream2
where
    T: FromDeriveInput,
    F: FnOnce(T) -> TokenStream2,
{
    match T::from_derive_input(input) {
        Ok(args) => f(args),
        Err(err) => err.write_errors(),
    }
}

/// Derives the `Aggregate` trait for a struct.
///
/// This macro generates:
/// - An event enum with one variant per payload type
/// - `EventData` for the enum, reporting the wrapped payload's reason
/// - A `Serialize` impl that writes the wrapped payload alone
/// - `From<E>` implementations for each payload type
/// - The `Aggregate` implementation: type name, root accessors, a
///   `transition` dispatching to `Apply<E>`, and payload registration
/// - Optionally `SnapshotAggregate`
///
/// # Attributes
///
/// ## Required
/// - `events(Type1, Type2, ...)` - Payload types, each implementing
///   `DomainEvent`, `Deserialize` and `Clone`
///
/// ## Optional
/// - `name = "Name"` - Aggregate type name (default: struct name)
/// - `event_enum = "Name"` - Override generated event enum name (default:
///   `{Struct}Event`)
/// - `derives(Trait1, Trait2, ...)` - Additional derives for the generated
///   event enum. Always includes `Clone`. Common additions: `Debug`,
///   `PartialEq`, `Eq`
/// - `root = "field"` - Field holding the `AggregateRoot` (default: `root`)
/// - `snapshot = "fields" | "hooks"` - Implement `SnapshotAggregate`,
///   capturing either the serde fields or the `SnapshotHooks` impl
///
/// # Example
///
/// ```ignore
/// #[derive(Default, Aggregate)]
/// #[aggregate(events(Born, AgedOneYear), derives(Debug, PartialEq))]
/// pub struct Person {
///     root: AggregateRoot<PersonEvent>,
///     name: String,
///     age: u32,
/// }
/// ```
#[proc_macro_derive(Aggregate, attributes(aggregate))]
pub fn derive_aggregate(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    derive_aggregate_impl(&input).into()
}

/// Internal entry point that returns tokens for the aggregate derive.
fn derive_aggregate_impl(input: &DeriveInput) -> TokenStream2 {
    parse_or_error::<AggregateArgs, _>(input, |args| generate_aggregate_impl(args, input))
}

/// Generate the aggregate derive implementation tokens.
#[allow(clippy::too_many_lines)]
fn generate_aggregate_impl(args: AggregateArgs, input: &DeriveInput) -> TokenStream2 {
    let event_specs: Vec<EventSpec<'_>> = args.events.iter().map(EventSpec::new).collect();

    if event_specs.is_empty() {
        return darling::Error::custom("events(...) must contain at least one event type")
            .with_span(&input.ident)
            .write_errors();
    }

    let struct_name = &args.ident;
    let struct_vis = &args.vis;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name = default_name(struct_name, args.name);
    let root = args
        .root
        .unwrap_or_else(|| Ident::new("root", proc_macro2::Span::call_site()));

    let event_enum_name = args.event_enum.map_or_else(
        || Ident::new(&format!("{struct_name}Event"), struct_name.span()),
        |name| Ident::new(&name, struct_name.span()),
    );

    let event_types: Vec<&Path> = event_specs.iter().map(|spec| spec.path).collect();
    let variant_names: Vec<&Ident> = event_specs.iter().map(|spec| &spec.variant).collect();

    // Build derives list - always include Clone, add user-specified traits
    let user_derives = args.derives.unwrap_or_default();
    let derives = quote! { #[derive(Clone, #(#user_derives),*)] };

    let snapshot_impl = args.snapshot.map(|capture| {
        let capture = match capture {
            SnapshotCapture::Fields => quote! { ::eventide::snapshot::Fields },
            SnapshotCapture::Hooks => quote! { ::eventide::snapshot::Hooks },
        };
        quote! {
            impl #impl_generics ::eventide::snapshot::SnapshotAggregate for #struct_name #ty_generics #where_clause {
                type Capture = #capture;
            }
        }
    });

    quote! {
        #[doc = concat!("Event type for the [`", stringify!(#struct_name), "`] aggregate.")]
        #derives
        #struct_vis enum #event_enum_name {
            #(
                #[doc = concat!("[`", stringify!(#event_types), "`]")]
                #variant_names(#event_types)
            ),*
        }

        impl ::eventide::event::EventData for #event_enum_name {
            fn reason(&self) -> &'static str {
                match self {
                    #(Self::#variant_names(_) => <#event_types as ::eventide::DomainEvent>::REASON),*
                }
            }
        }

        impl ::serde::Serialize for #event_enum_name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                match self {
                    #(Self::#variant_names(inner) => ::serde::Serialize::serialize(inner, serializer)),*
                }
            }
        }

        #(
            impl From<#event_types> for #event_enum_name {
                fn from(event: #event_types) -> Self {
                    Self::#variant_names(event)
                }
            }
        )*

        impl #impl_generics ::eventide::Aggregate for #struct_name #ty_generics #where_clause {
            const TYPE: &'static str = #name;
            type Event = #event_enum_name;

            fn root(&self) -> &::eventide::aggregate::AggregateRoot<Self::Event> {
                &self.#root
            }

            fn root_mut(&mut self) -> &mut ::eventide::aggregate::AggregateRoot<Self::Event> {
                &mut self.#root
            }

            fn transition(&mut self, event: &::eventide::event::Event<Self::Event>) {
                match &event.data {
                    #(#event_enum_name::#variant_names(e) => ::eventide::Apply::apply(self, e)),*
                }
            }

            fn register<C: ::eventide::codec::Codec>(
                events: &mut ::eventide::registry::Registrar<'_, Self::Event, C>,
            ) {
                events #(.event::<#event_types>())*;
            }
        }

        #snapshot_impl
    }
}

/// Derives the `DomainEvent` trait for a payload type.
///
/// The reason defaults to the type's name; override it with
/// `#[event(reason = "...")]` when the Rust name and the stored name differ.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, DomainEvent)]
/// #[event(reason = "PersonBorn")]
/// pub struct Born {
///     pub name: String,
/// }
/// ```
#[proc_macro_derive(DomainEvent, attributes(event))]
pub fn derive_domain_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    derive_domain_event_impl(&input).into()
}

/// Internal entry point that returns tokens for the domain event derive.
fn derive_domain_event_impl(input: &DeriveInput) -> TokenStream2 {
    parse_or_error::<DomainEventArgs, _>(input, |args| {
        let struct_name = &args.ident;
        let reason = default_name(struct_name, args.reason);
        let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

        quote! {
            impl #impl_generics ::eventide::DomainEvent for #struct_name #ty_generics #where_clause {
                const REASON: &'static str = #reason;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    /// Normalise token output by removing whitespace.
    fn compact(tokens: &TokenStream2) -> String {
        tokens
            .to_string()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    #[test]
    fn variant_names_join_path_segments() {
        let path: Path = parse_quote!(billing::Charged);
        assert_eq!(path_to_pascal_ident(&path), "BillingCharged");
    }

    #[test]
    /// Confirms default type name, root field and event enum name.
    fn generate_aggregate_impl_uses_defaults() {
        let input: DeriveInput = parse_quote! {
            #[aggregate(events(Born, AgedOneYear))]
            pub struct Person {
                root: AggregateRoot<PersonEvent>,
                age: u32,
            }
        };

        let compact = compact(&derive_aggregate_impl(&input));

        assert!(compact.contains("pubenumPersonEvent"));
        assert!(compact.contains("impl::eventide::AggregateforPerson"));
        assert!(compact.contains("constTYPE:&'staticstr=\"Person\""));
        assert!(compact.contains("&self.root"));
        assert!(compact.contains("events.event::<Born>().event::<AgedOneYear>();"));
        assert!(!compact.contains("SnapshotAggregate"));
    }

    #[test]
    /// Confirms every override is honored.
    fn generate_aggregate_impl_respects_overrides() {
        let input: DeriveInput = parse_quote! {
            #[aggregate(
                events(Born),
                name = "people.Person",
                event_enum = "Lifecycle",
                root = "state",
                derives(Debug, PartialEq)
            )]
            pub struct Person {
                state: AggregateRoot<Lifecycle>,
            }
        };

        let compact = compact(&derive_aggregate_impl(&input));

        assert!(compact.contains("enumLifecycle"));
        assert!(compact.contains("constTYPE:&'staticstr=\"people.Person\""));
        assert!(compact.contains("&mutself.state"));
        assert!(compact.contains("#[derive(Clone,Debug,PartialEq)]"));
    }

    #[test]
    fn generate_aggregate_impl_emits_snapshot_capture() {
        let fields: DeriveInput = parse_quote! {
            #[aggregate(events(Born), snapshot = "fields")]
            pub struct Person {
                root: AggregateRoot<PersonEvent>,
            }
        };
        let hooks: DeriveInput = parse_quote! {
            #[aggregate(events(Born), snapshot = "hooks")]
            pub struct Person {
                root: AggregateRoot<PersonEvent>,
            }
        };

        assert!(compact(&derive_aggregate_impl(&fields)).contains("typeCapture=::eventide::snapshot::Fields;"));
        assert!(compact(&derive_aggregate_impl(&hooks)).contains("typeCapture=::eventide::snapshot::Hooks;"));
    }

    #[test]
    fn generate_aggregate_impl_rejects_unknown_snapshot_capture() {
        let input: DeriveInput = parse_quote! {
            #[aggregate(events(Born), snapshot = "bytes")]
            pub struct Person {
                root: AggregateRoot<PersonEvent>,
            }
        };

        let compact = compact(&derive_aggregate_impl(&input));

        assert!(compact.contains("compile_error!"));
    }

    #[test]
    /// Ensures empty event lists yield a compile-time error.
    fn generate_aggregate_impl_emits_error_on_empty_events_list() {
        let input: DeriveInput = parse_quote! {
            #[aggregate(events())]
            pub struct Person {
                root: AggregateRoot<PersonEvent>,
            }
        };

        let compact = compact(&derive_aggregate_impl(&input));

        assert!(compact.contains("events(...)mustcontainatleastoneeventtype"));
    }

    #[test]
    fn generate_domain_event_defaults_reason_to_type_name() {
        let input: DeriveInput = parse_quote! {
            pub struct AgedOneYear {}
        };

        let compact = compact(&derive_domain_event_impl(&input));

        assert!(compact.contains("impl::eventide::DomainEventforAgedOneYear"));
        assert!(compact.contains("constREASON:&'staticstr=\"AgedOneYear\""));
    }

    #[test]
    fn generate_domain_event_respects_reason_override() {
        let input: DeriveInput = parse_quote! {
            #[event(reason = "PersonBorn")]
            pub struct Born {
                name: String,
            }
        };

        let compact = compact(&derive_domain_event_impl(&input));

        assert!(compact.contains("constREASON:&'staticstr=\"PersonBorn\""));
    }
}
