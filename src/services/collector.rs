use crate::error::Result;
use crate::models::{pair_key, CollectorConfig, DataSet, FetchOutcome, Timeframe};
use crate::services::exchanges::{client_for, ExchangeAdapter, ExchangeClient};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Fans one fetch per (exchange, symbol) pair out across the runtime
pub struct Collector {
    /// Configured exchange names in order; `None` when no adapter exists
    exchanges: Vec<(String, Option<ExchangeAdapter>)>,
    symbols: Vec<String>,
    timeframe: Timeframe,
}

impl Collector {
    /// Build adapters for every configured exchange
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        let mut exchanges = Vec::with_capacity(config.exchanges.len());
        for name in &config.exchanges {
            let adapter = client_for(name, config)?.map(|c| ExchangeAdapter::new(c, config.limit));
            if adapter.is_none() {
                warn!(exchange = %name, "Exchange not supported, its pairs will be empty");
            }
            exchanges.push((name.clone(), adapter));
        }

        Ok(Self {
            exchanges,
            symbols: config.symbols.clone(),
            timeframe: config.timeframe,
        })
    }

    /// Assemble a collector from explicit clients (used with mock exchanges)
    pub fn with_clients(
        clients: Vec<Arc<dyn ExchangeClient>>,
        symbols: Vec<String>,
        timeframe: Timeframe,
        limit: u32,
    ) -> Self {
        let exchanges = clients
            .into_iter()
            .map(|c| (c.id().to_string(), Some(ExchangeAdapter::new(c, limit))))
            .collect();

        Self {
            exchanges,
            symbols,
            timeframe,
        }
    }

    /// Register an exchange name that has no adapter
    pub fn push_unsupported(&mut self, name: &str) {
        self.exchanges.push((name.to_string(), None));
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Fetch every pair concurrently; results keep (exchange, symbol) enumeration order
    pub async fn collect_outcomes(&self) -> Vec<(String, FetchOutcome)> {
        let start = Instant::now();
        let mut keys = Vec::new();
        let mut tasks = Vec::new();

        for (name, adapter) in &self.exchanges {
            for symbol in &self.symbols {
                keys.push(pair_key(name, symbol));

                let adapter = adapter.clone();
                let symbol = symbol.clone();
                let timeframe = self.timeframe;
                tasks.push(tokio::spawn(async move {
                    match adapter {
                        Some(adapter) => adapter.fetch_outcome(&symbol, timeframe).await,
                        None => FetchOutcome::NotSupported,
                    }
                }));
            }
        }

        let results = futures::future::join_all(tasks).await;

        let outcomes: Vec<(String, FetchOutcome)> = keys
            .into_iter()
            .zip(results)
            .map(|(key, joined)| match joined {
                Ok(outcome) => (key, outcome),
                Err(e) => {
                    error!(key = %key, error = %e, "Fetch task failed");
                    (key, FetchOutcome::Failed(e.to_string()))
                }
            })
            .collect();

        let fetched = outcomes.iter().filter(|(_, o)| o.is_fetched()).count();
        info!(
            pairs = outcomes.len(),
            fetched = fetched,
            duration_ms = start.elapsed().as_millis() as u64,
            "Collection cycle finished"
        );

        outcomes
    }

    /// Fetch every pair; failures become empty series under their key
    pub async fn collect_all(&self) -> DataSet {
        self.collect_outcomes()
            .await
            .into_iter()
            .map(|(key, outcome)| (key, outcome.into_series()))
            .collect()
    }
}
