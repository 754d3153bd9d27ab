//! REST depth snapshot client.
//!
//! The supervisor only needs one REST call: the initial depth snapshot that
//! seeds the local book. The fetch sits behind [`SnapshotSource`] so tests
//! can drive the reconciliation machinery without the network.

use std::future::Future;
use std::time::Duration;

use crate::binance::rate_limiter::{depth_request_weight, SnapshotPacer};
use crate::binance::types::{DepthSnapshot, Product};
use crate::error::SnapshotError;
use reqwest::Client;
use tracing::debug;

/// Spot REST base URL.
const SPOT_REST_URL: &str = "https://api.binance.com";

/// Perpetual-swap REST base URL.
const SWAP_REST_URL: &str = "https://fapi.binance.com";

/// HTTP request timeout for snapshot fetches.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of REST depth snapshots.
///
/// Production code uses [`BinanceRestClient`]; tests substitute a stub.
pub trait SnapshotSource {
    /// Fetch a depth snapshot for `symbol` with up to `limit` levels per side.
    fn fetch(
        &self,
        product: Product,
        symbol: &str,
        limit: u32,
    ) -> impl Future<Output = Result<DepthSnapshot, SnapshotError>> + Send;
}

/// Binance REST API client for depth snapshots.
///
/// Wraps reqwest::Client with per-product base URLs and a weight pacer in
/// front of every fetch.
pub struct BinanceRestClient {
    client: Client,
    spot_base: String,
    swap_base: String,
    spot_pacer: SnapshotPacer,
    swap_pacer: SnapshotPacer,
}

impl BinanceRestClient {
    /// Creates a client with default endpoints and a 10 second timeout.
    pub fn new() -> Self {
        Self::with_bases(SPOT_REST_URL, SWAP_REST_URL)
    }

    /// Creates a client against custom base URLs (for testing).
    pub fn with_bases(spot_base: &str, swap_base: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("binance-localbook/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            spot_base: spot_base.to_string(),
            swap_base: swap_base.to_string(),
            spot_pacer: SnapshotPacer::for_product(Product::Spot),
            swap_pacer: SnapshotPacer::for_product(Product::Swap),
        }
    }

    fn pacer(&self, product: Product) -> &SnapshotPacer {
        match product {
            Product::Spot => &self.spot_pacer,
            Product::Swap => &self.swap_pacer,
        }
    }

    fn depth_url(&self, product: Product, symbol: &str, limit: u32) -> String {
        match product {
            Product::Spot => format!(
                "{}/api/v3/depth?symbol={}&limit={}",
                self.spot_base,
                symbol.to_uppercase(),
                limit
            ),
            Product::Swap => format!(
                "{}/fapi/v1/depth?symbol={}&limit={}",
                self.swap_base,
                symbol.to_uppercase(),
                limit
            ),
        }
    }

    async fn fetch_depth(
        &self,
        product: Product,
        symbol: &str,
        limit: u32,
    ) -> Result<DepthSnapshot, SnapshotError> {
        let weight = depth_request_weight(product, limit);
        self.pacer(product).acquire(weight).await?;

        let url = self.depth_url(product, symbol, limit);
        debug!(%product, symbol, limit, weight, "fetching depth snapshot");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SnapshotError::Status(response.status()));
        }

        let snapshot: DepthSnapshot = response.json().await?;

        debug!(
            %product,
            symbol,
            bid_levels = snapshot.bids.len(),
            ask_levels = snapshot.asks.len(),
            last_update_id = %snapshot.last_update_id,
            "fetched depth snapshot"
        );

        Ok(snapshot)
    }
}

impl SnapshotSource for BinanceRestClient {
    fn fetch(
        &self,
        product: Product,
        symbol: &str,
        limit: u32,
    ) -> impl Future<Output = Result<DepthSnapshot, SnapshotError>> + Send {
        self.fetch_depth(product, symbol, limit)
    }
}

impl Default for BinanceRestClient {
    fn default() -> Self {
        Self::new()
    }
}
