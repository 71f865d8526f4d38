use super::traits::ListingExtractor;
use super::{CraigslistExtractor, EbayExtractor, FacebookExtractor, GenericExtractor};
use crate::models::Marketplace;
use std::collections::HashMap;

/// Maps each recognized marketplace to its extractor.
/// Marketplaces without an entry are handled by the generic extractor.
pub struct ExtractorRegistry {
    sites: HashMap<Marketplace, Box<dyn ListingExtractor>>,
    generic: Box<dyn ListingExtractor>,
}

impl ExtractorRegistry {
    /// Registry with no site extractors; everything goes generic
    pub fn empty() -> Self {
        Self {
            sites: HashMap::new(),
            generic: Box::new(GenericExtractor),
        }
    }

    pub fn register(&mut self, marketplace: Marketplace, extractor: Box<dyn ListingExtractor>) {
        self.sites.insert(marketplace, extractor);
    }

    pub fn with(mut self, marketplace: Marketplace, extractor: Box<dyn ListingExtractor>) -> Self {
        self.register(marketplace, extractor);
        self
    }

    pub fn site(&self, marketplace: Option<Marketplace>) -> Option<&dyn ListingExtractor> {
        marketplace.and_then(|m| self.sites.get(&m)).map(|e| e.as_ref())
    }

    pub fn generic(&self) -> &dyn ListingExtractor {
        self.generic.as_ref()
    }

    /// The extractor whose readiness predicate applies to a page
    pub fn for_marketplace(&self, marketplace: Option<Marketplace>) -> &dyn ListingExtractor {
        self.site(marketplace).unwrap_or_else(|| self.generic())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::empty()
            .with(Marketplace::Facebook, Box::new(FacebookExtractor))
            .with(Marketplace::Craigslist, Box::new(CraigslistExtractor))
            .with(Marketplace::Ebay, Box::new(EbayExtractor))
    }
}
