//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the external collaborators (object storage and the
//! shop directory) so the lifecycle and the server can be exercised without
//! real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use printdrop_core::testing::{fixtures, MockObjectStorage};
//!
//! let storage = MockObjectStorage::new();
//! storage.fail_namespace("image").await;
//!
//! let files = fixtures::files(2);
//! ```

mod mock_shop_directory;
mod mock_storage;

pub use mock_shop_directory::{MockShopDirectory, RecordedRank};
pub use mock_storage::{MockObjectStorage, RecordedDestroy};

/// Test fixtures and helper functions.
pub mod fixtures {
    use rust_decimal::Decimal;

    use crate::order::{CreateOrderRequest, FileRef};
    use crate::shop::{GeoPoint, RankedShop, Shop};

    /// A creation request with 10 pages at 50.
    pub fn order_request(owner_id: &str, shop_id: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            owner_id: owner_id.to_string(),
            shop_id: shop_id.to_string(),
            total_pages: 10,
            total_price: Decimal::new(50, 0),
        }
    }

    /// A PDF file reference with a storage handle derived from `name`.
    pub fn file(name: &str, pages: u32) -> FileRef {
        FileRef::new(
            format!("{}.pdf", name),
            format!("https://res.cloudinary.test/printdrop/{}.pdf", name),
            format!("printdrop/{}", name),
            pages,
        )
        .with_content_type("application/pdf")
    }

    /// `count` distinct files of 5 pages each.
    pub fn files(count: usize) -> Vec<FileRef> {
        (0..count).map(|i| file(&format!("file-{}", i), 5)).collect()
    }

    pub fn shop(id: &str) -> Shop {
        Shop {
            id: id.to_string(),
            name: format!("Print Shop {}", id),
            price_per_page: Decimal::new(10, 2),
            location: GeoPoint {
                lat: 45.0,
                lng: 9.0,
            },
            available: true,
        }
    }

    pub fn ranked_shop(id: &str, distance_km: f64) -> RankedShop {
        RankedShop {
            shop_id: id.to_string(),
            name: format!("Print Shop {}", id),
            distance_km,
            queue_length: 0,
            total_price: Decimal::new(100, 2),
        }
    }
}
