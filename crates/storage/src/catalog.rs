//! Node and capability registry backed by PostgreSQL.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use s100_common::{DirectoryError, DirectoryResult, ProductType, ServiceType};

use crate::registry::{CapabilityRecord, CapabilityRegistry, HealthStatus, MatchedCapability, NodeInfo};

/// Registry reading the `nodes` and `node_capabilities` tables.
pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    /// Create a new registry connection from database URL.
    pub async fn connect(database_url: &str) -> DirectoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| DirectoryError::RegistryError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the registry tables if they do not exist.
    pub async fn migrate(&self) -> DirectoryResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| DirectoryError::RegistryError(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CapabilityRegistry for PgRegistry {
    async fn node(&self, node_id: &str) -> DirectoryResult<Option<NodeInfo>> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT id, name, api_url, coverage, health_status, is_active \
             FROM nodes WHERE id = $1",
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DirectoryError::RegistryError(format!("Query failed: {}", e)))?;

        Ok(row.map(NodeInfo::from))
    }

    async fn list_active_nodes(&self) -> DirectoryResult<Vec<NodeInfo>> {
        let rows = sqlx::query_as::<_, NodeRow>(
            "SELECT id, name, api_url, coverage, health_status, is_active \
             FROM nodes WHERE is_active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DirectoryError::RegistryError(format!("Query failed: {}", e)))?;

        Ok(rows.into_iter().map(NodeInfo::from).collect())
    }

    async fn list_enabled_capabilities(&self, node_id: &str) -> DirectoryResult<Vec<CapabilityRecord>> {
        let rows = sqlx::query_as::<_, CapabilityRow>(
            "SELECT product_type, service_type, endpoint, version, coverage \
             FROM node_capabilities \
             WHERE node_id = $1 AND is_enabled \
             ORDER BY product_type, service_type",
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DirectoryError::RegistryError(format!("Query failed: {}", e)))?;

        Ok(rows.into_iter().map(CapabilityRecord::from).collect())
    }

    async fn list_enabled_capabilities_matching(
        &self,
        product_types: Option<&[ProductType]>,
        service_types: Option<&[ServiceType]>,
    ) -> DirectoryResult<Vec<MatchedCapability>> {
        let products: Option<Vec<String>> =
            product_types.map(|p| p.iter().map(|t| t.code().to_string()).collect());
        let services: Option<Vec<String>> =
            service_types.map(|s| s.iter().map(|t| t.code().to_string()).collect());

        let rows = sqlx::query_as::<_, MatchedRow>(MATCHING_CAPABILITIES_SQL)
            .bind(products)
            .bind(services)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DirectoryError::RegistryError(format!("Query failed: {}", e)))?;

        Ok(rows.into_iter().map(MatchedCapability::from).collect())
    }

    async fn ping(&self) -> DirectoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DirectoryError::RegistryError(format!("Ping failed: {}", e)))?;
        Ok(())
    }
}

/// Product codes are compared without hyphens so `S-101` rows match `S101`.
const MATCHING_CAPABILITIES_SQL: &str = "SELECT n.id, n.name, n.api_url, n.coverage AS node_coverage, \
     n.health_status, n.is_active, \
     c.product_type, c.service_type, c.endpoint, c.version, c.coverage \
     FROM node_capabilities c JOIN nodes n ON n.id = c.node_id \
     WHERE c.is_enabled AND n.is_active \
     AND ($1::text[] IS NULL OR replace(upper(c.product_type), '-', '') = ANY($1)) \
     AND ($2::text[] IS NULL OR upper(c.service_type) = ANY($2)) \
     ORDER BY n.id, c.product_type, c.service_type";

#[derive(FromRow)]
struct NodeRow {
    id: String,
    name: String,
    api_url: Option<String>,
    coverage: Option<String>,
    health_status: Option<String>,
    is_active: bool,
}

impl From<NodeRow> for NodeInfo {
    fn from(row: NodeRow) -> Self {
        NodeInfo {
            id: row.id,
            name: row.name,
            api_url: row.api_url,
            coverage: row.coverage,
            health_status: row
                .health_status
                .as_deref()
                .map(HealthStatus::parse_lossy)
                .unwrap_or_default(),
            is_active: row.is_active,
        }
    }
}

#[derive(FromRow)]
struct CapabilityRow {
    product_type: String,
    service_type: String,
    endpoint: Option<String>,
    version: Option<String>,
    coverage: Option<String>,
}

impl From<CapabilityRow> for CapabilityRecord {
    fn from(row: CapabilityRow) -> Self {
        CapabilityRecord {
            product_type: row.product_type,
            service_type: row.service_type,
            endpoint: row.endpoint,
            version: row.version,
            coverage: row.coverage,
        }
    }
}

#[derive(FromRow)]
struct MatchedRow {
    id: String,
    name: String,
    api_url: Option<String>,
    node_coverage: Option<String>,
    health_status: Option<String>,
    is_active: bool,
    product_type: String,
    service_type: String,
    endpoint: Option<String>,
    version: Option<String>,
    coverage: Option<String>,
}

impl From<MatchedRow> for MatchedCapability {
    fn from(row: MatchedRow) -> Self {
        MatchedCapability {
            node: NodeRow {
                id: row.id,
                name: row.name,
                api_url: row.api_url,
                coverage: row.node_coverage,
                health_status: row.health_status,
                is_active: row.is_active,
            }
            .into(),
            capability: CapabilityRow {
                product_type: row.product_type,
                service_type: row.service_type,
                endpoint: row.endpoint,
                version: row.version,
                coverage: row.coverage,
            }
            .into(),
        }
    }
}

/// Database schema for the registry tables.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id VARCHAR(100) PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    api_url TEXT,
    coverage TEXT,
    health_status VARCHAR(20) DEFAULT 'UNKNOWN',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS node_capabilities (
    node_id VARCHAR(100) NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    product_type VARCHAR(20) NOT NULL,
    service_type VARCHAR(10) NOT NULL,
    endpoint TEXT,
    version VARCHAR(20),
    coverage TEXT,
    is_enabled BOOLEAN NOT NULL DEFAULT TRUE,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (node_id, product_type, service_type)
);

CREATE INDEX IF NOT EXISTS idx_node_capabilities_lookup
    ON node_capabilities(product_type, service_type) WHERE is_enabled;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_sql_ignores_product_hyphens() {
        assert!(MATCHING_CAPABILITIES_SQL
            .contains("replace(upper(c.product_type), '-', '') = ANY($1)"));

        // Every spelling sync accepts must normalise to the bound code.
        for stored in ["S-101", "s-101", "S101", "s101"] {
            let parsed: ProductType = stored.parse().unwrap();
            assert_eq!(parsed, ProductType::S101);
            assert_eq!(stored.to_uppercase().replace('-', ""), ProductType::S101.code());
        }
    }
}
