pub mod criteriamodel;
pub mod listingmodel;
pub mod matchmodel;
