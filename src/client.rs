use std::str::FromStr;
use std::time::Duration;

use bitcoin::{
    Address, BlockHash, Network, PrivateKey, Script, Transaction, Txid,
    consensus::encode::{deserialize_hex, serialize_hex},
    secp256k1::Secp256k1,
};
use log::{debug, error, info, warn};
use rand::Rng;
use reqwest::{Client, Method, Response, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::RegtestConfig;
use crate::error::{RegtestError, Result};
use crate::types::{FetchedTransaction, Unspent, Verification};

/// Body of a response returned by [`RegtestClient::raw_request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// The body as text, if the service answered with a plain or JSON string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Json(Value::String(text)) => Some(text),
            Payload::Json(_) => None,
        }
    }
}

/// Client for a regtest faucet/explorer service.
#[derive(Debug, Clone)]
pub struct RegtestClient {
    client: Client,
    config: RegtestConfig,
    throwaway_address: Address,
}

impl RegtestClient {
    pub fn new(config: RegtestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let throwaway_address = random_p2pkh(config.network);
        debug!(
            "Regtest client bound to {} on {}",
            config.api_url, config.network
        );

        Ok(Self {
            client,
            config,
            throwaway_address,
        })
    }

    /// Builds a client from [`RegtestConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(RegtestConfig::from_env()?)
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    /// A random address fixed for the lifetime of this client.
    ///
    /// Nobody holds its key, so coins sent there are gone.
    pub fn throwaway_address(&self) -> &Address {
        &self.throwaway_address
    }

    /// Generates a fresh P2PKH address whose key is discarded.
    pub fn random_address(&self) -> Address {
        random_p2pkh(self.network())
    }

    /// Sends a request and returns the body, parsed as JSON when the response
    /// says it is JSON.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `url` - Absolute URL, or a path appended to the configured base URL
    /// * `body` - Optional request body, sent as is
    pub async fn raw_request(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<Payload> {
        let response = self.send(method, url, &[], body).await?;
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let text = response.text().await?;

        if is_json {
            Ok(Payload::Json(serde_json::from_str(&text)?))
        } else {
            Ok(Payload::Text(text))
        }
    }

    /// Liveness probe; the service root answers with `regtest`.
    pub async fn ping(&self) -> Result<()> {
        let body = self.text(Method::GET, "/", &[], None).await?;
        if body.trim() == "regtest" {
            Ok(())
        } else {
            Err(RegtestError::UnexpectedResponse(format!(
                "expected \"regtest\" from /, got {body:?}"
            )))
        }
    }

    /// Height of the best block.
    pub async fn height(&self) -> Result<u32> {
        self.json(Method::GET, "/b/best/height", &[]).await
    }

    /// Mines `count` blocks and returns their hashes in mined order.
    pub async fn mine(&self, count: u32) -> Result<Vec<BlockHash>> {
        if count == 0 {
            return Err(RegtestError::InvalidArgument(
                "block count must be positive".to_string(),
            ));
        }

        let hashes: Vec<BlockHash> = self
            .json(
                Method::POST,
                "/r/generate",
                &[("count", count.to_string()), ("key", self.key())],
            )
            .await?;

        if hashes.len() != count as usize {
            error!("Asked for {} blocks, service mined {}", count, hashes.len());
            return Err(RegtestError::UnexpectedResponse(format!(
                "expected {} block hashes, got {}",
                count,
                hashes.len()
            )));
        }

        info!("Mined {} block(s)", count);
        Ok(hashes)
    }

    /// Funds `address` with `value` sats and returns the new output once the
    /// explorer lists it.
    pub async fn faucet(&self, address: &Address, value: u64) -> Result<Unspent> {
        let tx_id = self
            .request_funding("/r/faucet", ("address", address.to_string()), value)
            .await?;
        info!("Faucet sent {} sats to {} in {}", value, address, tx_id);

        self.wait_for_unspent(address, &tx_id).await
    }

    /// Funds an arbitrary output script with `value` sats.
    ///
    /// Scripts with an address form are awaited through [`Self::unspents`]; for
    /// the others the funding transaction is fetched and the output paying the
    /// script is returned without a height.
    pub async fn faucet_complex(&self, script: &Script, value: u64) -> Result<Unspent> {
        let tx_id = self
            .request_funding(
                "/r/faucetScript",
                ("script", hex::encode(script.as_bytes())),
                value,
            )
            .await?;
        info!("Faucet sent {} sats to script {} in {}", value, script, tx_id);

        match Address::from_script(script, self.network()) {
            Ok(address) => self.wait_for_unspent(&address, &tx_id).await,
            Err(_) => {
                debug!("Script {} has no address form, fetching {}", script, tx_id);
                self.find_output(&tx_id, script, value).await
            }
        }
    }

    /// Unspent outputs paying `address`, in no particular order.
    pub async fn unspents(&self, address: &Address) -> Result<Vec<Unspent>> {
        self.json(Method::GET, &format!("/a/{address}/unspents"), &[])
            .await
    }

    /// Polls [`Self::unspents`] until an output of `tx_id` shows up.
    ///
    /// Gives up with [`RegtestError::MissingInputs`] after `faucet_attempts`
    /// lookups.
    pub async fn wait_for_unspent(&self, address: &Address, tx_id: &Txid) -> Result<Unspent> {
        let attempts = self.config.faucet_attempts.max(1);

        for attempt in 1..=attempts {
            if attempt == 1 {
                tokio::time::sleep(jitter(10, 30)).await;
            } else {
                warn!("Missing inputs for {}, retry #{}", tx_id, attempt - 1);
                tokio::time::sleep(jitter(self.config.poll_interval_ms, 100)).await;
            }

            let found = self
                .unspents(address)
                .await?
                .into_iter()
                .find(|unspent| unspent.tx_id == *tx_id);
            if let Some(unspent) = found {
                debug!("Found {}:{} after {} lookup(s)", tx_id, unspent.vout, attempt);
                return Ok(unspent);
            }
        }

        error!("{} never reached the unspents of {}", tx_id, address);
        Err(RegtestError::MissingInputs { attempts })
    }

    /// Looks a transaction up by id.
    pub async fn fetch(&self, tx_id: &Txid) -> Result<FetchedTransaction> {
        match self
            .json(Method::GET, &format!("/t/{tx_id}/json"), &[])
            .await
        {
            Err(RegtestError::Status { status: 404, .. }) => {
                Err(RegtestError::NotFound(tx_id.to_string()))
            }
            other => other,
        }
    }

    /// Pushes a signed transaction and returns its id.
    pub async fn broadcast(&self, tx_hex: &str) -> Result<Txid> {
        let tx_hex = tx_hex.trim();
        let tx: Transaction = deserialize_hex(tx_hex)?;
        let tx_id = tx.compute_txid();

        match self
            .text(Method::POST, "/t/push", &[], Some(tx_hex.to_string()))
            .await
        {
            Ok(_) => {
                info!("Broadcast {}", tx_id);
                Ok(tx_id)
            }
            Err(RegtestError::Status { status, body }) if (400..500).contains(&status) => {
                error!("Service rejected {} ({}): {}", tx_id, status, body);
                Err(RegtestError::Rejected(body))
            }
            Err(e) => {
                error!("Broadcast of {} failed: {}", tx_id, e);
                Err(e)
            }
        }
    }

    pub async fn broadcast_transaction(&self, tx: &Transaction) -> Result<Txid> {
        self.broadcast(&serialize_hex(tx)).await
    }

    /// Fetches `expected.tx_id` and checks the output at `expected.vout`.
    ///
    /// Any mismatch is reported as [`RegtestError::Assertion`].
    pub async fn verify(&self, expected: &Verification) -> Result<()> {
        let fetched = self.fetch(&expected.tx_id).await?;
        let tx = fetched.transaction()?;
        let fail = |reason: String| RegtestError::Assertion {
            tx_id: expected.tx_id.to_string(),
            vout: expected.vout,
            reason,
        };

        let actual_id = tx.compute_txid();
        if actual_id != expected.tx_id {
            return Err(fail(format!("service returned transaction {actual_id}")));
        }

        let output = tx.output.get(expected.vout as usize).ok_or_else(|| {
            fail(format!("transaction has {} output(s)", tx.output.len()))
        })?;

        if let Some(address) = &expected.address {
            if !address.matches_script_pubkey(&output.script_pubkey) {
                let actual = Address::from_script(&output.script_pubkey, self.network())
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| output.script_pubkey.to_hex_string());
                return Err(fail(format!("pays {actual}, expected {address}")));
            }
        }

        if let Some(value) = expected.value {
            let actual = output.value.to_sat();
            if actual != value {
                return Err(fail(format!("value {actual}, expected {value}")));
            }
        }

        debug!("Verified {}:{}", expected.tx_id, expected.vout);
        Ok(())
    }

    /// Asks the faucet to pay `target`, retrying failed requests within the
    /// attempt budget.
    async fn request_funding(
        &self,
        path: &str,
        target: (&str, String),
        value: u64,
    ) -> Result<Txid> {
        let attempts = self.config.faucet_attempts.max(1);
        let query = [target, ("value", value.to_string()), ("key", self.key())];

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(jitter(self.config.poll_interval_ms, 100)).await;
            }

            match self.text(Method::POST, path, &query, None).await {
                Ok(body) => return parse_txid(&body),
                Err(RegtestError::Status { status, body }) if is_not_fundable_yet(status, &body) => {
                    warn!("Faucet request {} of {} refused: {}", attempt, attempts, body)
                }
                Err(e) => {
                    error!("Faucet request to {} failed: {}", path, e);
                    return Err(e);
                }
            }
        }

        Err(RegtestError::MissingInputs { attempts })
    }

    async fn find_output(&self, tx_id: &Txid, script: &Script, value: u64) -> Result<Unspent> {
        let tx = self.fetch(tx_id).await?.transaction()?;
        let vout = tx
            .output
            .iter()
            .position(|out| out.script_pubkey.as_script() == script && out.value.to_sat() == value)
            .ok_or_else(|| {
                RegtestError::UnexpectedResponse(format!(
                    "{tx_id} has no output of {value} sats paying {script}"
                ))
            })?;

        Ok(Unspent {
            height: None,
            tx_id: *tx_id,
            vout: vout as u32,
            value,
        })
    }

    fn key(&self) -> String {
        self.config.api_pass.clone()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> Result<Response> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("{} {} failed: {}", method, url, e);
            RegtestError::Transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!("{} {} returned {}: {}", method, url, status, body);
            Err(RegtestError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn text(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> Result<String> {
        Ok(self.send(method, path, query, body).await?.text().await?)
    }

    async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let text = self.text(method, path, query, None).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn random_p2pkh(network: Network) -> Address {
    let secp = Secp256k1::new();
    let public_key = PrivateKey::generate(network).public_key(&secp);
    Address::p2pkh(public_key.pubkey_hash(), network)
}

// The faucet refuses with "Missing Inputs" while its wallet has no spendable
// coins yet; a new request is safe because nothing was sent.
fn is_not_fundable_yet(status: u16, body: &str) -> bool {
    (status == 400 || status >= 500) && body.to_ascii_lowercase().contains("missing inputs")
}

// The faucet answers with a bare txid, sometimes JSON-quoted.
fn parse_txid(body: &str) -> Result<Txid> {
    Ok(Txid::from_str(body.trim().trim_matches('"'))?)
}

fn jitter(base_ms: u64, spread_ms: u64) -> Duration {
    Duration::from_millis(base_ms + rand::thread_rng().gen_range(0..=spread_ms))
}
