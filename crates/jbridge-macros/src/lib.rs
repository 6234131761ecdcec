//! jbridge Proc Macros
//!
//! Derives for declaring mirrored classes tersely. The generated code names
//! `::jbridge_core` directly, so the core crate must be a dependency of the
//! crate using them.
//!
//! # Macros
//!
//! - `#[derive(Mirror)]` - Implement `JavaClass`, `Mirror` and `Handles` for an `Object` newtype
//! - `#[derive(Handles)]` - Enumerate the handle slots of an aggregate
//!
//! # Example
//!
//! ```ignore
//! use jbridge_core::Object;
//! use jbridge_macros::{Handles, Mirror};
//!
//! #[derive(Mirror)]
//! #[jbridge(class = "java::io::PrintStream")]
//! pub struct PrintStream(Object);
//!
//! #[derive(Handles)]
//! pub struct Pair {
//!     out: PrintStream,
//!     #[jbridge(skip)]
//!     label: &'static str,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_handles;
mod derive_mirror;

/// Derive a complete mirrored class over a single `Object` field.
///
/// # Attributes
///
/// - `#[jbridge(class = "...")]` - Scoped class name, `::` separated (required)
/// - `#[jbridge(descriptor = "...")]` - Internal name override, for nested classes
/// - `#[jbridge(string)]` - Accept host strings where this class is a parameter
///
/// # Example
///
/// ```ignore
/// #[derive(Mirror, Clone, Copy)]
/// #[jbridge(class = "java::util::Map::Entry", descriptor = "java/util/Map$Entry")]
/// pub struct Entry(Object);
/// ```
#[proc_macro_derive(Mirror, attributes(jbridge))]
pub fn derive_mirror(input: TokenStream) -> TokenStream {
    derive_mirror::derive_mirror_impl(input)
}

/// Derive `Handles` by visiting every field in declaration order.
///
/// Fields marked `#[jbridge(skip)]` are not visited. Type parameters gain a
/// `Handles` bound.
#[proc_macro_derive(Handles, attributes(jbridge))]
pub fn derive_handles(input: TokenStream) -> TokenStream {
    derive_handles::derive_handles_impl(input)
}
