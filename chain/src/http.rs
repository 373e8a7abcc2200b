//! HTTP implementation of [`ChainClient`] against a JSON indexing gateway.
//!
//! The gateway exposes decoded chain state over plain GET/POST endpoints;
//! this client only shapes URLs and deserializes responses. Per-request
//! timeouts keep a stalled gateway from wedging a sync cycle.

use crate::error::ChainError;
use crate::{ChainClient, DaoPage, DaoState, NftItem, ProposalPage, RoundSnapshot, TxPage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use tally_types::{
    Address, MetadataArgs, NftHolderMap, ProposalMetadata, StrategyKind, TxRecord,
    ValidatorInfoMap, Weight,
};

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Typed client for the chain indexing gateway.
pub struct HttpChainClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChainClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ChainError::Http(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ChainError::NotFound(url));
        }
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "gateway request rejected");
            return Err(ChainError::Status {
                status: status.as_u16(),
                url,
            });
        }

        resp.json().await.map_err(|e| ChainError::Decode(e.to_string()))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ChainError> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChainError::Status {
                status: status.as_u16(),
                url,
            });
        }

        resp.json().await.map_err(|e| ChainError::Decode(e.to_string()))
    }
}

/// Request body for the gateway's voting-power computation.
#[derive(Serialize)]
struct VotingPowerRequest<'a> {
    metadata: &'a ProposalMetadata,
    transactions: &'a [TxRecord],
    prior: &'a BTreeMap<Address, Weight>,
    kind: StrategyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    nft_holders: Option<&'a NftHolderMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validator_info: Option<&'a ValidatorInfoMap>,
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_registry(&self) -> Result<Address, ChainError> {
        let registry: Option<Address> = self.get_json("registry").await?;
        registry.ok_or(ChainError::RegistryMissing)
    }

    async fn list_daos(&self, cursor: u64, limit: u32) -> Result<DaoPage, ChainError> {
        self.get_json(&format!("daos?cursor={cursor}&limit={limit}"))
            .await
    }

    async fn get_dao_state(&self, address: &Address) -> Result<DaoState, ChainError> {
        self.get_json(&format!("dao/{address}/state")).await
    }

    async fn get_dao_metadata(
        &self,
        metadata_address: &Address,
    ) -> Result<MetadataArgs, ChainError> {
        self.get_json(&format!("metadata/{metadata_address}")).await
    }

    async fn list_proposals(
        &self,
        dao: &Address,
        cursor: u64,
        limit: u32,
    ) -> Result<ProposalPage, ChainError> {
        self.get_json(&format!("dao/{dao}/proposals?cursor={cursor}&limit={limit}"))
            .await
    }

    async fn get_proposal_metadata(
        &self,
        address: &Address,
    ) -> Result<ProposalMetadata, ChainError> {
        self.get_json(&format!("proposal/{address}/metadata")).await
    }

    async fn transactions_since(
        &self,
        address: &Address,
        cursor: Option<u64>,
    ) -> Result<TxPage, ChainError> {
        let path = match cursor {
            Some(after) => format!("proposal/{address}/transactions?after={after}"),
            None => format!("proposal/{address}/transactions"),
        };
        self.get_json(&path).await
    }

    async fn get_voting_power(
        &self,
        metadata: &ProposalMetadata,
        transactions: &[TxRecord],
        prior: &BTreeMap<Address, Weight>,
        kind: StrategyKind,
        nft_holders: Option<&NftHolderMap>,
        validator_info: Option<&ValidatorInfoMap>,
    ) -> Result<BTreeMap<Address, Weight>, ChainError> {
        let body = VotingPowerRequest {
            metadata,
            transactions,
            prior,
            kind,
            nft_holders,
            validator_info,
        };
        self.post_json("votingPower", &body).await
    }

    async fn collection_size(&self, collection: &Address) -> Result<u64, ChainError> {
        self.get_json(&format!("collection/{collection}/size")).await
    }

    async fn nft_item_owner(
        &self,
        collection: &Address,
        index: u64,
    ) -> Result<NftItem, ChainError> {
        self.get_json(&format!("collection/{collection}/item/{index}/owner"))
            .await
    }

    async fn round_snapshot(&self, phash: &str) -> Result<RoundSnapshot, ChainError> {
        self.get_json(&format!("rounds/{phash}")).await
    }

    async fn operating_validators(&self) -> Result<ValidatorInfoMap, ChainError> {
        self.get_json("validators").await
    }
}
