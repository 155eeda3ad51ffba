//! Service catalog lookups for injection jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use campaign_core::config::catalog::{CatalogConfig, ServiceEntry};
use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;

/// Price and default campaign of a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceInfo {
    pub price_cents: i64,
    #[serde(default)]
    pub campaign_id: String,
}

impl From<&ServiceEntry> for ServiceInfo {
    fn from(entry: &ServiceEntry) -> Self {
        Self {
            price_cents: entry.price_cents,
            campaign_id: entry.campaign_id.clone(),
        }
    }
}

/// Resolves service codes to charge settings.
#[async_trait]
pub trait ServiceCatalog: Send + Sync + std::fmt::Debug + 'static {
    async fn lookup(&self, service_code: &str) -> AppResult<ServiceInfo>;
}

/// Build the catalog described by the configuration.
pub fn from_config(config: &CatalogConfig) -> AppResult<Arc<dyn ServiceCatalog>> {
    match config.url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => Ok(Arc::new(HttpServiceCatalog::new(
            url,
            Duration::from_secs(config.timeout_seconds),
        )?)),
        None => Ok(Arc::new(StaticServiceCatalog::new(config.services.clone()))),
    }
}

/// Catalog served over HTTP at `GET <base>/services/<code>`.
#[derive(Debug, Clone)]
pub struct HttpServiceCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpServiceCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Failed to build catalog client", e)
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ServiceCatalog for HttpServiceCatalog {
    async fn lookup(&self, service_code: &str) -> AppResult<ServiceInfo> {
        let url = format!("{}/services/{service_code}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Service catalog request failed: {e}"),
                e,
            )
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::external(format!(
                "Service not found in catalog: {service_code}"
            )));
        }
        if !status.is_success() {
            return Err(AppError::external(format!(
                "Service catalog returned {status} for {service_code}"
            )));
        }

        response.json::<ServiceInfo>().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Invalid service catalog response for {service_code}: {e}"),
                e,
            )
        })
    }
}

/// Catalog backed by the `[catalog.services]` table.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceCatalog {
    services: HashMap<String, ServiceEntry>,
}

impl StaticServiceCatalog {
    pub fn new(services: HashMap<String, ServiceEntry>) -> Self {
        Self { services }
    }

    pub fn with_service(mut self, code: &str, price_cents: i64, campaign_id: &str) -> Self {
        self.services.insert(
            code.to_string(),
            ServiceEntry {
                price_cents,
                campaign_id: campaign_id.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl ServiceCatalog for StaticServiceCatalog {
    async fn lookup(&self, service_code: &str) -> AppResult<ServiceInfo> {
        self.services
            .get(service_code)
            .map(ServiceInfo::from)
            .ok_or_else(|| AppError::external(format!("Service not found in catalog: {service_code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup() {
        let catalog = StaticServiceCatalog::default().with_service("290", 1500, "17");
        let info = catalog.lookup("290").await.unwrap();
        assert_eq!(
            info,
            ServiceInfo {
                price_cents: 1500,
                campaign_id: "17".to_string()
            }
        );

        let err = catalog.lookup("999").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExternalService);
    }

    #[test]
    fn test_from_config_without_url_is_static() {
        let catalog = from_config(&CatalogConfig::default()).unwrap();
        assert!(format!("{catalog:?}").contains("StaticServiceCatalog"));
    }
}
