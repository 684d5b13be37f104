//! Product catalog.
//!
//! Minimal registry of product identities. Products are created once by an
//! authorized producer and immutable thereafter; batches reference them by id
//! only.

use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};
use crate::types::{Address, ProductId};

/// Immutable product identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Off-ledger metadata pointer (e.g. an IPFS URI).
    pub metadata_uri: String,
    pub creator: Address,
}

/// Arena of products; ids are `index + 1`.
#[derive(Clone, Debug, Default)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next sequential id. Role authorization is the caller's
    /// responsibility; the catalog only enforces shape.
    pub fn create(
        &mut self,
        name: &str,
        metadata_uri: &str,
        creator: Address,
    ) -> TraceResult<ProductId> {
        if name.is_empty() {
            return Err(TraceError::InvalidInput("product name required".into()));
        }
        let id = self.products.len() as ProductId + 1;
        self.products.push(Product {
            id,
            name: name.to_string(),
            metadata_uri: metadata_uri.to_string(),
            creator,
        });
        Ok(id)
    }

    pub fn get(&self, id: ProductId) -> TraceResult<&Product> {
        id.checked_sub(1)
            .and_then(|idx| self.products.get(idx as usize))
            .ok_or(TraceError::InvalidProduct(id))
    }

    pub fn exists(&self, id: ProductId) -> bool {
        id >= 1 && (id as usize) <= self.products.len()
    }

    /// Id the next creation will receive.
    pub fn next_id(&self) -> ProductId {
        self.products.len() as ProductId + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_from_one() {
        let mut catalog = ProductCatalog::new();
        let creator = Address::from_label("producer");
        assert_eq!(catalog.create("Coffee", "ipfs://a", creator).unwrap(), 1);
        assert_eq!(catalog.create("Tea", "ipfs://b", creator).unwrap(), 2);
        assert_eq!(catalog.next_id(), 3);
        assert_eq!(catalog.get(1).unwrap().name, "Coffee");
    }

    #[test]
    fn empty_name_rejected() {
        let mut catalog = ProductCatalog::new();
        let err = catalog
            .create("", "ipfs://x", Address::from_label("p"))
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidInput(_)));
    }

    #[test]
    fn missing_product_is_invalid() {
        let catalog = ProductCatalog::new();
        assert_eq!(catalog.get(1).unwrap_err(), TraceError::InvalidProduct(1));
        assert_eq!(catalog.get(0).unwrap_err(), TraceError::InvalidProduct(0));
        assert!(!catalog.exists(999));
    }
}
