//! Types shared between the filings server and the `filings` CLI.

pub mod api;
pub mod cart;
pub mod companies;
pub mod messages;
pub mod orders;
pub mod selection;

pub use api::*;
pub use cart::{Cart, CartItem};
pub use companies::*;
pub use messages::*;
pub use orders::*;
pub use selection::BulkSelection;

/// Lowercase, ASCII-alphanumeric, dash-separated form of `input`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
