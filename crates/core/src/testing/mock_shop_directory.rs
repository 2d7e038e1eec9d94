//! Mock shop directory for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::shop::{GeoPoint, RankedShop, Shop, ShopDirectory, ShopError};

/// A recorded rank request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRank {
    pub location: GeoPoint,
    pub page_count: u32,
}

/// Mock implementation of the ShopDirectory trait.
///
/// Returns canned rankings regardless of location and records every
/// request. Shops added with `add_shop` back `get` and `set_availability`.
#[derive(Debug, Clone, Default)]
pub struct MockShopDirectory {
    rankings: Arc<RwLock<Vec<RankedShop>>>,
    shops: Arc<RwLock<Vec<Shop>>>,
    requests: Arc<RwLock<Vec<RecordedRank>>>,
}

impl MockShopDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ranking returned by every `rank` call.
    pub async fn set_rankings(&self, rankings: Vec<RankedShop>) {
        *self.rankings.write().await = rankings;
    }

    pub async fn add_shop(&self, shop: Shop) {
        self.shops.write().await.push(shop);
    }

    pub async fn recorded_requests(&self) -> Vec<RecordedRank> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl ShopDirectory for MockShopDirectory {
    async fn rank(&self, location: GeoPoint, page_count: u32) -> Result<Vec<RankedShop>, ShopError> {
        self.requests.write().await.push(RecordedRank {
            location,
            page_count,
        });
        Ok(self.rankings.read().await.clone())
    }

    async fn set_availability(&self, shop_id: &str, available: bool) -> Result<Shop, ShopError> {
        let mut shops = self.shops.write().await;
        let shop = shops
            .iter_mut()
            .find(|s| s.id == shop_id)
            .ok_or_else(|| ShopError::NotFound(shop_id.to_string()))?;
        shop.available = available;
        Ok(shop.clone())
    }

    async fn get(&self, shop_id: &str) -> Result<Option<Shop>, ShopError> {
        Ok(self
            .shops
            .read()
            .await
            .iter()
            .find(|s| s.id == shop_id)
            .cloned())
    }
}
