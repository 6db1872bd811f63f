use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Listing status that makes an item visible to buyers (and to FindIt).
pub const LIVE_LISTING_STATUS: &str = "published";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "listing_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Normal,
    Unique,
    Auction,
    Offer,
}

/// Anything that can tell what a buyer would pay for it. `None` means the
/// price can't be determined (price on request, auction without bids...).
pub trait Priceable {
    fn resolve_price(&self) -> Option<i64>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedPrice {
    pub price: Option<i64>,
}

impl Priceable for FixedPrice {
    fn resolve_price(&self) -> Option<i64> {
        self.price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UniquePrice {
    pub price: Option<i64>,
}

impl Priceable for UniquePrice {
    fn resolve_price(&self) -> Option<i64> {
        self.price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuctionPrice {
    pub starting_price: Option<i64>,
    pub current_bid: Option<i64>,
}

impl Priceable for AuctionPrice {
    fn resolve_price(&self) -> Option<i64> {
        self.current_bid.or(self.starting_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferPrice {
    pub minimum_offer: Option<i64>,
}

impl Priceable for OfferPrice {
    fn resolve_price(&self) -> Option<i64> {
        self.minimum_offer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ListingPricing {
    Normal(FixedPrice),
    Unique(UniquePrice),
    Auction(AuctionPrice),
    Offer(OfferPrice),
}

impl ListingPricing {
    pub fn as_priceable(&self) -> &dyn Priceable {
        match self {
            ListingPricing::Normal(p) => p,
            ListingPricing::Unique(p) => p,
            ListingPricing::Auction(p) => p,
            ListingPricing::Offer(p) => p,
        }
    }

    pub fn kind(&self) -> ListingKind {
        match self {
            ListingPricing::Normal(_) => ListingKind::Normal,
            ListingPricing::Unique(_) => ListingKind::Unique,
            ListingPricing::Auction(_) => ListingKind::Auction,
            ListingPricing::Offer(_) => ListingKind::Offer,
        }
    }

    pub fn fixed(price: i64) -> Self {
        ListingPricing::Normal(FixedPrice { price: Some(price) })
    }
}

impl Priceable for ListingPricing {
    fn resolve_price(&self) -> Option<i64> {
        self.as_priceable().resolve_price()
    }
}

/// Raw `listings` row as stored by the marketplace.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ListingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub kind: ListingKind,

    pub price: Option<i64>,
    pub starting_price: Option<i64>,
    pub current_bid: Option<i64>,
    pub minimum_offer: Option<i64>,

    pub brand_id: Option<Uuid>,
    pub model_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub year: Option<i32>,

    pub created_at: DateTime<Utc>,
}

/// Read-only projection of a live listing as seen by the matching engine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CandidateItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub pricing: ListingPricing,
    pub brand_id: Option<Uuid>,
    pub model_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl CandidateItem {
    pub fn is_live(&self) -> bool {
        self.status == LIVE_LISTING_STATUS
    }

    pub fn resolve_price(&self) -> Option<i64> {
        self.pricing.resolve_price()
    }
}

impl From<ListingRow> for CandidateItem {
    fn from(row: ListingRow) -> Self {
        let pricing = match row.kind {
            ListingKind::Normal => ListingPricing::Normal(FixedPrice { price: row.price }),
            ListingKind::Unique => ListingPricing::Unique(UniquePrice { price: row.price }),
            ListingKind::Auction => ListingPricing::Auction(AuctionPrice {
                starting_price: row.starting_price,
                current_bid: row.current_bid,
            }),
            ListingKind::Offer => ListingPricing::Offer(OfferPrice {
                minimum_offer: row.minimum_offer,
            }),
        };

        CandidateItem {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            pricing,
            brand_id: row.brand_id,
            model_id: row.model_id,
            category_id: row.category_id,
            city_id: row.city_id,
            country_id: row.country_id,
            year: row.year,
            created_at: row.created_at,
        }
    }
}
