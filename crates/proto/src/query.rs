use chrono::{DateTime, Utc};
use crypto_bigint::U256;
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::clause::{is_valid_model_name, Clause, KeysClause};
use crate::error::ProtoError;
use crate::pagination::Pagination;
use crate::schema::{ModelSchema, NoSchema};
use crate::ContractType;

/// Entity and event message query.
#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct Query {
    /// Worlds to search. Empty means every indexed world.
    pub world_addresses: Vec<Felt>,
    pub clause: Option<Clause>,
    pub pagination: Pagination,
    /// Whether or not to include the hashed keys (entity id) of the entities.
    pub no_hashed_keys: bool,
    /// If the array is not empty, only the given models are retrieved.
    /// All entities that don't have a model in the array are excluded.
    pub models: Vec<String>,
    /// Whether or not we should retrieve historical entities.
    pub historical: bool,
}

impl Query {
    pub fn validate<S: ModelSchema + ?Sized>(&self, schema: &S) -> Result<(), ProtoError> {
        if let Some(model) = self.models.iter().find(|m| !is_valid_model_name(m)) {
            return Err(ProtoError::InvalidModelName(model.clone()));
        }
        if let Some(clause) = &self.clause {
            clause.validate(schema)?;
        }
        self.pagination.validate()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct EventQuery {
    pub keys: Option<KeysClause>,
    pub pagination: Pagination,
}

impl EventQuery {
    pub fn validate(&self) -> Result<(), ProtoError> {
        if let Some(keys) = &self.keys {
            keys.validate(&NoSchema)?;
        }
        self.pagination.validate()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct TokenQuery {
    pub contract_addresses: Vec<Felt>,
    pub token_ids: Vec<U256>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct TokenBalanceQuery {
    pub contract_addresses: Vec<Felt>,
    pub account_addresses: Vec<Felt>,
    pub token_ids: Vec<U256>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct TokenTransferQuery {
    pub contract_addresses: Vec<Felt>,
    /// Matches either side of the transfer.
    pub account_addresses: Vec<Felt>,
    pub token_ids: Vec<U256>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_hashes: Vec<Felt>,
    pub caller_addresses: Vec<Felt>,
    pub contract_addresses: Vec<Felt>,
    pub entrypoints: Vec<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct TransactionQuery {
    pub filter: Option<TransactionFilter>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct ControllerQuery {
    pub contract_addresses: Vec<Felt>,
    pub usernames: Vec<String>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct ActivityQuery {
    pub world_addresses: Vec<Felt>,
    pub namespaces: Vec<String>,
    pub caller_addresses: Vec<Felt>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct AchievementQuery {
    pub world_addresses: Vec<Felt>,
    pub namespaces: Vec<String>,
    /// Filter on the hidden flag. `None` returns both.
    pub hidden: Option<bool>,
    pub pagination: Pagination,
}

/// Contracts are few, so this query is not paginated.
#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct ContractQuery {
    pub contract_addresses: Vec<Felt>,
    pub contract_types: Vec<ContractType>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct TokenContractQuery {
    pub contract_addresses: Vec<Felt>,
    pub contract_types: Vec<ContractType>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct AggregationQuery {
    pub aggregator_ids: Vec<String>,
    pub entity_ids: Vec<String>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Default)]
pub struct PlayerAchievementQuery {
    pub world_addresses: Vec<Felt>,
    pub namespaces: Vec<String>,
    pub player_addresses: Vec<Felt>,
    pub pagination: Pagination,
}
