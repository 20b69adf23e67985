//! HTTP client for the Stellar Horizon API.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{LedgerClient, LedgerError, LedgerTransaction};

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// Client for the Stellar Horizon API with a bounded per-request timeout
/// and a circuit breaker in front of the network.
///
/// The request timeout is an I/O bound (seconds); it is unrelated to the
/// business expiry window (minutes) that decides when an unseen
/// transaction counts as expired.
#[derive(Clone)]
pub struct HorizonClient {
    client: Client,
    base_url: String,
    circuit_breaker: Breaker,
}

impl HorizonClient {
    pub fn new(base_url: String, request_timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, request_timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        request_timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HorizonClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker.
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Timeout
    } else {
        LedgerError::Network(err.to_string())
    }
}

#[derive(Deserialize)]
struct LedgerPage {
    #[serde(rename = "_embedded")]
    embedded: EmbeddedLedgers,
}

#[derive(Deserialize)]
struct EmbeddedLedgers {
    records: Vec<LedgerHeader>,
}

#[derive(Deserialize)]
struct LedgerHeader {
    sequence: i64,
}

#[async_trait]
impl LedgerClient for HorizonClient {
    async fn transaction_by_hash(&self, tx_hash: &str) -> Result<LedgerTransaction, LedgerError> {
        let url = self.endpoint(&format!("transactions/{}", tx_hash));
        let client = self.client.clone();

        // A 404 is a normal polling outcome, not a network failure; it is
        // resolved outside the breaker so repeated polls of a not-yet-seen
        // hash cannot trip it.
        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).send().await.map_err(map_reqwest_error)?;

                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    return Err(LedgerError::Network(format!(
                        "horizon returned status {}",
                        response.status()
                    )));
                }

                let tx = response
                    .json::<LedgerTransaction>()
                    .await
                    .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
                Ok(Some(tx))
            })
            .await;

        match result {
            Ok(Some(tx)) => Ok(tx),
            Ok(None) => Err(LedgerError::NotFound(tx_hash.to_string())),
            Err(FailsafeError::Rejected) => Err(LedgerError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn latest_ledger(&self) -> Result<i64, LedgerError> {
        let url = self.endpoint("ledgers?order=desc&limit=1");
        let client = self.client.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).send().await.map_err(map_reqwest_error)?;

                if !response.status().is_success() {
                    return Err(LedgerError::Network(format!(
                        "horizon returned status {}",
                        response.status()
                    )));
                }

                let page = response
                    .json::<LedgerPage>()
                    .await
                    .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
                page.embedded
                    .records
                    .first()
                    .map(|header| header.sequence)
                    .ok_or_else(|| {
                        LedgerError::InvalidResponse("empty ledger page".to_string())
                    })
            })
            .await;

        match result {
            Ok(sequence) => Ok(sequence),
            Err(FailsafeError::Rejected) => Err(LedgerError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
