//! BIDS dataset discovery and querying.

mod entities;
mod filter;
mod layout;
mod query;

pub use entities::{BidsName, entity_key};
pub use filter::{BidsFilters, parse_filter_file};
pub use layout::{BidsFile, BidsLayout, normalize_label};
pub use query::{EntityQuery, ScanKind, ScanQuery};
