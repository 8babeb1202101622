//! S-100 product types and OGC service types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DirectoryError;

/// S-100 product specifications served through the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProductType {
    S101,
    S102,
    S104,
    S111,
    S124,
    S125,
    S131,
}

impl ProductType {
    pub const ALL: [ProductType; 7] = [
        ProductType::S101,
        ProductType::S102,
        ProductType::S104,
        ProductType::S111,
        ProductType::S124,
        ProductType::S125,
        ProductType::S131,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ProductType::S101 => "S101",
            ProductType::S102 => "S102",
            ProductType::S104 => "S104",
            ProductType::S111 => "S111",
            ProductType::S124 => "S124",
            ProductType::S125 => "S125",
            ProductType::S131 => "S131",
        }
    }

    /// Human-readable product name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProductType::S101 => "Electronic Navigational Chart",
            ProductType::S102 => "Bathymetric Surface",
            ProductType::S104 => "Water Level Information",
            ProductType::S111 => "Surface Currents",
            ProductType::S124 => "Navigational Warnings",
            ProductType::S125 => "Radio Services",
            ProductType::S131 => "Marine Protected Areas",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ProductType {
    type Err = DirectoryError;

    /// Accepts `S101`, `s101` and `S-101`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_uppercase();
        ProductType::ALL
            .into_iter()
            .find(|p| p.code() == normalized)
            .ok_or_else(|| DirectoryError::UnknownProduct(s.to_string()))
    }
}

impl TryFrom<String> for ProductType {
    type Error = DirectoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProductType> for String {
    fn from(p: ProductType) -> Self {
        p.code().to_string()
    }
}

/// OGC web service flavours a node can expose for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceType {
    Wms,
    Wfs,
    Wcs,
}

impl ServiceType {
    pub const ALL: [ServiceType; 3] = [ServiceType::Wms, ServiceType::Wfs, ServiceType::Wcs];

    pub fn code(&self) -> &'static str {
        match self {
            ServiceType::Wms => "WMS",
            ServiceType::Wfs => "WFS",
            ServiceType::Wcs => "WCS",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ServiceType {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WMS" => Ok(ServiceType::Wms),
            "WFS" => Ok(ServiceType::Wfs),
            "WCS" => Ok(ServiceType::Wcs),
            _ => Err(DirectoryError::UnknownServiceType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ServiceType {
    type Error = DirectoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ServiceType> for String {
    fn from(s: ServiceType) -> Self {
        s.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_parse_variants() {
        assert_eq!("S101".parse::<ProductType>().unwrap(), ProductType::S101);
        assert_eq!("s102".parse::<ProductType>().unwrap(), ProductType::S102);
        assert_eq!("S-104".parse::<ProductType>().unwrap(), ProductType::S104);
        assert!(matches!(
            "S999".parse::<ProductType>(),
            Err(DirectoryError::UnknownProduct(_))
        ));
    }

    #[test]
    fn test_service_parse() {
        assert_eq!("wms".parse::<ServiceType>().unwrap(), ServiceType::Wms);
        assert_eq!(" WCS ".parse::<ServiceType>().unwrap(), ServiceType::Wcs);
        assert!("WMTS".parse::<ServiceType>().is_err());
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&(ProductType::S111, ServiceType::Wfs)).unwrap();
        assert_eq!(json, r#"["S111","WFS"]"#);
        let back: (ProductType, ServiceType) = serde_json::from_str(&json).unwrap();
        assert_eq!(back, (ProductType::S111, ServiceType::Wfs));
    }
}
