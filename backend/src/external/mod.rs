//! External service integrations
//!
//! The four space-weather source fetchers, their shared HTTP transport, and
//! the chat-completion client.

mod http;
mod k_index;
mod n0nbh;
mod openai;
mod sidc;
mod solar_cycle;

pub use http::{RetryPolicy, SourceHttpClient};
pub use k_index::{parse_k_index, KIndexFetcher};
pub use n0nbh::{parse_n0nbh, N0nbhFetcher};
pub use openai::OpenAiClient;
pub use sidc::{parse_sidc_csv, SidcFetcher};
pub use solar_cycle::{parse_solar_cycle, SolarCycleFetcher, QUIET_SUN_FLUX};

use async_trait::async_trait;

use crate::error::FetchError;

/// One upstream feed: fetch, parse, return typed records
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    type Output: Send + 'static;

    /// Name used in logs and failure reports
    fn source_name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Self::Output, FetchError>;
}
