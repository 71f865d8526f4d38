mod container;
pub mod craigslist;
pub mod ebay;
pub mod facebook;
pub mod generic;
pub mod registry;
pub mod traits;
pub mod types;

pub use craigslist::CraigslistExtractor;
pub use ebay::EbayExtractor;
pub use facebook::FacebookExtractor;
pub use generic::GenericExtractor;
pub use registry::ExtractorRegistry;
pub use traits::{ExtractOptions, ListingExtractor};
pub use types::{SearchOptions, SortKey};
