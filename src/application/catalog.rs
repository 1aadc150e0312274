use crate::domain::money::MinorAmount;
use crate::domain::order::CountryCode;
use crate::domain::ports::{CatalogRef, Country, PriceEntry, ProviderResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

/// Read-through cache over the vendor's country/service/price catalog.
///
/// Populated lazily per country; `refresh` reloads the country list at
/// process start and `invalidate` backs the manual admin command. Two
/// tasks racing to populate the same country overwrite each other with
/// identical data, which is benign.
pub struct CatalogCache {
    provider: CatalogRef,
    countries: RwLock<Option<Vec<Country>>>,
    prices: RwLock<HashMap<CountryCode, HashMap<String, PriceEntry>>>,
}

impl CatalogCache {
    pub fn new(provider: CatalogRef) -> Self {
        Self {
            provider,
            countries: RwLock::new(None),
            prices: RwLock::new(HashMap::new()),
        }
    }

    pub async fn countries(&self) -> ProviderResult<Vec<Country>> {
        if let Some(cached) = self.countries.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let fetched = self.provider.get_countries().await?;
        *self.countries.write().await = Some(fetched.clone());
        Ok(fetched)
    }

    pub async fn prices(&self, country: CountryCode) -> ProviderResult<HashMap<String, PriceEntry>> {
        if let Some(cached) = self.prices.read().await.get(&country) {
            return Ok(cached.clone());
        }
        let fetched = self.provider.get_prices(country).await?;
        self.prices.write().await.insert(country, fetched.clone());
        Ok(fetched)
    }

    /// Current price for a (service, country) pair. Any provider failure
    /// or missing entry is a quoting failure, reported as `None`.
    pub async fn quote(&self, service: &str, country: CountryCode) -> Option<MinorAmount> {
        match self.prices(country).await {
            Ok(prices) => prices.get(service).map(|entry| entry.cost),
            Err(err) => {
                warn!(%country, service, %err, "catalog lookup failed");
                None
            }
        }
    }

    /// Drops everything and reloads the country list.
    pub async fn refresh(&self) -> ProviderResult<()> {
        self.invalidate().await;
        self.countries().await?;
        Ok(())
    }

    pub async fn invalidate(&self) {
        *self.countries.write().await = None;
        self.prices.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{CatalogProvider, ProviderError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCatalog {
        price_calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogProvider for CountingCatalog {
        async fn get_countries(&self) -> ProviderResult<Vec<Country>> {
            Ok(vec![Country {
                id: CountryCode(7),
                display_name: "Russia".into(),
            }])
        }

        async fn get_prices(
            &self,
            country: CountryCode,
        ) -> ProviderResult<HashMap<String, PriceEntry>> {
            if country != CountryCode(7) {
                return Err(ProviderError::Business("unknown country".into()));
            }
            self.price_calls.fetch_add(1, Ordering::SeqCst);
            Ok(HashMap::from([(
                "tg".to_string(),
                PriceEntry {
                    cost: MinorAmount::new(15_000),
                    available: 12,
                },
            )]))
        }
    }

    #[tokio::test]
    async fn test_quote_is_cached_per_country() {
        let provider = Arc::new(CountingCatalog {
            price_calls: AtomicUsize::new(0),
        });
        let cache = CatalogCache::new(provider.clone());

        assert_eq!(
            cache.quote("tg", CountryCode(7)).await,
            Some(MinorAmount::new(15_000))
        );
        assert_eq!(cache.quote("tg", CountryCode(7)).await, Some(MinorAmount::new(15_000)));
        assert_eq!(provider.price_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_entry_and_provider_error_quote_as_none() {
        let provider = Arc::new(CountingCatalog {
            price_calls: AtomicUsize::new(0),
        });
        let cache = CatalogCache::new(provider);

        assert_eq!(cache.quote("wa", CountryCode(7)).await, None);
        assert_eq!(cache.quote("tg", CountryCode(99)).await, None);
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let provider = Arc::new(CountingCatalog {
            price_calls: AtomicUsize::new(0),
        });
        let cache = CatalogCache::new(provider.clone());

        cache.quote("tg", CountryCode(7)).await;
        cache.invalidate().await;
        cache.quote("tg", CountryCode(7)).await;
        assert_eq!(provider.price_calls.load(Ordering::SeqCst), 2);
    }
}
