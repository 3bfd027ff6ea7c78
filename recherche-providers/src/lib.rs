//! recherche-providers
//!
//! The two built-in drivers behind the recherche pipeline. Each one owns
//! authentication, request shaping, its API's native pagination, and
//! normalization into the common raw-record shape; neither retries failed
//! calls (retries are an order-level concern).

mod dataforseo;
mod google_places;

pub use crate::dataforseo::DataForSeoProvider;
pub use crate::google_places::GooglePlacesProvider;
