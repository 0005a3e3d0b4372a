use proc_macro::TokenStream;

mod payload;

/// Generates the `packit::Payload` implementation for a struct or a `#[repr(..)]` enum.
///
/// Struct fields are encoded in declaration order with no padding.
///
/// Enums are encoded tag first, followed by the fields of the variant. Tags follow the
/// usual discriminant rules: explicit discriminants anchor the count, implicit ones
/// increment from the last anchor.
///
/// # Note
///
/// Requires `packit` to be in scope with that name.
#[proc_macro_derive(Payload)]
pub fn payload(item: TokenStream) -> TokenStream {
    payload::derive(item)
}
