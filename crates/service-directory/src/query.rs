//! Query inputs for the directory.

use serde::Serialize;

use s100_common::{BoundingBox, ProductType, ServiceType};
use storage::DirectoryEntry;

use crate::ranking::{SortBy, SortOrder};

/// What the caller is looking for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFilter {
    pub bbox: BoundingBox,
    /// `None` means any product.
    pub product_types: Option<Vec<ProductType>>,
    /// `None` means any service.
    pub service_types: Option<Vec<ServiceType>>,
    /// Entries below this confidence are ignored. `None` means no floor.
    pub min_confidence: Option<f64>,
}

impl ServiceFilter {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            product_types: None,
            service_types: None,
            min_confidence: None,
        }
    }

    /// Filter for exactly one product/service pair.
    pub fn for_service(bbox: BoundingBox, product_type: ProductType, service_type: ServiceType) -> Self {
        Self::new(bbox)
            .with_products(vec![product_type])
            .with_services(vec![service_type])
    }

    pub fn with_products(mut self, products: Vec<ProductType>) -> Self {
        self.product_types = Some(products);
        self
    }

    pub fn with_services(mut self, services: Vec<ServiceType>) -> Self {
        self.service_types = Some(services);
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    /// Product, service and confidence checks. Spatial matching is separate
    /// because malformed coverage has to be reported.
    pub fn accepts(&self, entry: &DirectoryEntry) -> bool {
        let product_ok = self
            .product_types
            .as_ref()
            .map_or(true, |wanted| wanted.contains(&entry.product_type));
        let service_ok = self
            .service_types
            .as_ref()
            .map_or(true, |wanted| wanted.contains(&entry.service_type));
        let confidence_ok = self.min_confidence.map_or(true, |floor| entry.confidence >= floor);
        product_ok && service_ok && confidence_ok
    }
}

/// How results are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub max_results: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl QueryOptions {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            sort_by: SortBy::Confidence,
            sort_order: SortOrder::Desc,
        }
    }

    /// The options `get_best_service` is defined in terms of.
    pub fn best() -> Self {
        Self::new(1)
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }
}
