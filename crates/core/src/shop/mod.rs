//! Shop discovery and pricing.
//!
//! The directory is an external collaborator from the order lifecycle's
//! point of view. `ConfiguredShopDirectory` serves shops declared in the
//! configuration so the server can run on its own.

mod configured;

pub use configured::ConfiguredShopDirectory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderError;

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ShopError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ShopError::InvalidLocation(format!("latitude {} out of range", lat)));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ShopError::InvalidLocation(format!("longitude {} out of range", lng)));
        }
        Ok(Self { lat, lng })
    }

    /// Haversine distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// A shop as the directory knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub price_per_page: Decimal,
    pub location: GeoPoint,
    pub available: bool,
}

/// One entry of a ranking, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedShop {
    pub shop_id: String,
    pub name: String,
    pub distance_km: f64,
    pub queue_length: i64,
    pub total_price: Decimal,
}

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Shop not found: {0}")]
    NotFound(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Failed to read order queue: {0}")]
    Queue(#[from] OrderError),

    #[error("Price for {page_count} pages at shop {shop_id} is out of range")]
    PriceOverflow { shop_id: String, page_count: u32 },
}

/// Ranks shops and quotes prices.
#[async_trait]
pub trait ShopDirectory: Send + Sync {
    /// Available shops ordered by distance, then queue length, then price.
    async fn rank(&self, location: GeoPoint, page_count: u32) -> Result<Vec<RankedShop>, ShopError>;

    /// Open or close a shop for new orders.
    async fn set_availability(&self, shop_id: &str, available: bool) -> Result<Shop, ShopError>;

    async fn get(&self, shop_id: &str) -> Result<Option<Shop>, ShopError>;
}
