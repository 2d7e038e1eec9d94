use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::{DirectoryConfig, ShopConfig};
use crate::order::{OrderFilter, OrderStatus, OrderStore};

use super::{GeoPoint, RankedShop, Shop, ShopDirectory, ShopError};

/// Shop directory backed by the `[[shops]]` configuration.
///
/// Availability changes live in memory and reset on restart.
pub struct ConfiguredShopDirectory {
    shops: RwLock<Vec<Shop>>,
    store: Arc<dyn OrderStore>,
    max_results: usize,
    audit: Option<AuditHandle>,
}

impl ConfiguredShopDirectory {
    pub fn new(shops: &[ShopConfig], config: DirectoryConfig, store: Arc<dyn OrderStore>) -> Self {
        let shops = shops
            .iter()
            .map(|s| Shop {
                id: s.id.clone(),
                name: s.name.clone(),
                price_per_page: s.price_per_page,
                location: GeoPoint {
                    lat: s.lat,
                    lng: s.lng,
                },
                available: s.available,
            })
            .collect();

        Self {
            shops: RwLock::new(shops),
            store,
            max_results: config.max_results,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Active orders queued at one shop.
    fn queue_length(&self, shop_id: &str) -> Result<i64, ShopError> {
        let mut queued = 0;
        for status in OrderStatus::ALL.into_iter().filter(|s| s.is_active()) {
            queued += self
                .store
                .count(&OrderFilter::new().with_shop(shop_id).with_status(status))?;
        }
        Ok(queued)
    }
}

#[async_trait]
impl ShopDirectory for ConfiguredShopDirectory {
    async fn rank(&self, location: GeoPoint, page_count: u32) -> Result<Vec<RankedShop>, ShopError> {
        let shops = self.shops.read().await;

        let mut ranked = Vec::new();
        for s in shops.iter().filter(|s| s.available) {
            let total_price = s
                .price_per_page
                .checked_mul(Decimal::from(page_count))
                .ok_or_else(|| ShopError::PriceOverflow {
                    shop_id: s.id.clone(),
                    page_count,
                })?;
            ranked.push(RankedShop {
                shop_id: s.id.clone(),
                name: s.name.clone(),
                distance_km: location.distance_km(&s.location),
                queue_length: self.queue_length(&s.id)?,
                total_price,
            });
        }

        ranked.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
                .then(a.queue_length.cmp(&b.queue_length))
                .then(a.total_price.cmp(&b.total_price))
        });
        ranked.truncate(self.max_results);

        Ok(ranked)
    }

    async fn set_availability(&self, shop_id: &str, available: bool) -> Result<Shop, ShopError> {
        let shop = {
            let mut shops = self.shops.write().await;
            let shop = shops
                .iter_mut()
                .find(|s| s.id == shop_id)
                .ok_or_else(|| ShopError::NotFound(shop_id.to_string()))?;
            shop.available = available;
            shop.clone()
        };

        info!(shop_id, available, "Shop availability changed");
        if let Some(ref audit) = self.audit {
            audit
                .emit(AuditEvent::ShopAvailabilityChanged {
                    shop_id: shop_id.to_string(),
                    available,
                })
                .await;
        }
        Ok(shop)
    }

    async fn get(&self, shop_id: &str) -> Result<Option<Shop>, ShopError> {
        let shops = self.shops.read().await;
        Ok(shops.iter().find(|s| s.id == shop_id).cloned())
    }
}
