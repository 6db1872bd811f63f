pub mod criteriadb;
pub mod db;
pub mod listingdb;
pub mod matchdb;
pub mod query_timeout;

#[cfg(test)]
pub mod memorydb;

use self::{criteriadb::CriteriaExt, listingdb::ListingExt, matchdb::MatchExt};

/// Everything the matching services need from storage.
pub trait MatchingStore: ListingExt + CriteriaExt + MatchExt + Send + Sync {}

impl<T> MatchingStore for T where T: ListingExt + CriteriaExt + MatchExt + Send + Sync {}
