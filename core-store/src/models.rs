//! Domain record types and the collection registry.
//!
//! Every record is tenant-scoped and carries sync metadata: sale-like
//! records (sales, sale items) track a `synced` flag that flips once the
//! mutation reaches the remote service; reference records track the
//! `synced_at` timestamp of their last confirmed upload.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// The collections the store knows about.
///
/// `SyncQueue` is reserved for the durable mutation log and is excluded from
/// [`Collection::DOMAIN`]; it still participates in migration so pending
/// mutations survive an engine switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Products,
    Customers,
    Sales,
    SaleItems,
    Students,
    Classes,
    SyncQueue,
}

impl Collection {
    /// Domain collections, in migration/drain registration order
    pub const DOMAIN: [Collection; 6] = [
        Collection::Products,
        Collection::Customers,
        Collection::Sales,
        Collection::SaleItems,
        Collection::Students,
        Collection::Classes,
    ];

    /// Every persisted collection, queue last so migrated records land
    /// before the mutations that reference them
    pub const ALL: [Collection; 7] = [
        Collection::Products,
        Collection::Customers,
        Collection::Sales,
        Collection::SaleItems,
        Collection::Students,
        Collection::Classes,
        Collection::SyncQueue,
    ];

    /// Storage/table name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Customers => "customers",
            Self::Sales => "sales",
            Self::SaleItems => "sale_items",
            Self::Students => "students",
            Self::Classes => "classes",
            Self::SyncQueue => "sync_queue",
        }
    }

    /// Whether records in this collection carry the boolean `synced` flag
    /// (sale-like collections) instead of a `synced_at` timestamp
    pub fn tracks_synced_flag(&self) -> bool {
        matches!(self, Self::Sales | Self::SaleItems)
    }
}

impl std::str::FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Self::Products),
            "customers" => Ok(Self::Customers),
            "sales" => Ok(Self::Sales),
            "sale_items" => Ok(Self::SaleItems),
            "students" => Ok(Self::Students),
            "classes" => Ok(Self::Classes),
            "sync_queue" => Ok(Self::SyncQueue),
            _ => Err(StoreError::UnknownCollection(s.to_string())),
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry sold by a business tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    /// Epoch milliseconds of the last confirmed upload
    pub synced_at: Option<i64>,
}

/// Customer of a business tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub synced_at: Option<i64>,
}

/// A completed point-of-sale transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: Option<String>,
    pub total_cents: i64,
    /// Epoch milliseconds at the till
    pub created_at: i64,
    /// False until the mutation is confirmed by the remote service
    pub synced: bool,
}

/// One line of a sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: String,
    pub tenant_id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub synced: bool,
}

/// Enrolled student of a school tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub class_id: Option<String>,
    pub guardian_phone: Option<String>,
    pub synced_at: Option<i64>,
}

/// Class/section of a school tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub teacher_name: Option<String>,
    pub synced_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(
                collection.as_str().parse::<Collection>().unwrap(),
                collection
            );
        }
        assert!("invoices".parse::<Collection>().is_err());
    }

    #[test]
    fn test_domain_excludes_queue() {
        assert!(!Collection::DOMAIN.contains(&Collection::SyncQueue));
        assert!(Collection::ALL.contains(&Collection::SyncQueue));
    }

    #[test]
    fn test_synced_flag_split() {
        assert!(Collection::Sales.tracks_synced_flag());
        assert!(Collection::SaleItems.tracks_synced_flag());
        assert!(!Collection::Products.tracks_synced_flag());
        assert!(!Collection::Students.tracks_synced_flag());
    }

    #[test]
    fn test_record_serde_shape() {
        let sale = Sale {
            id: "s1".into(),
            tenant_id: "t1".into(),
            customer_id: None,
            total_cents: 1000,
            created_at: 1_700_000_000_000,
            synced: false,
        };

        let value = serde_json::to_value(&sale).unwrap();
        assert_eq!(value["id"], "s1");
        assert_eq!(value["tenant_id"], "t1");
        assert_eq!(value["synced"], false);

        let back: Sale = serde_json::from_value(value).unwrap();
        assert_eq!(back, sale);
    }
}
