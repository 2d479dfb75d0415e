pub mod clause;
pub mod error;
pub mod pagination;
pub mod primitive;
pub mod query;
pub mod schema;
pub mod subscription;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crypto_bigint::U256;
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;
use strum_macros::AsRefStr;

pub use clause::{
    Clause, ComparisonOperator, CompositeClause, KeysClause, LogicalOperator, MemberClause,
    MemberValue, PatternMatching,
};
pub use error::ProtoError;
pub use pagination::{Cursor, OrderBy, OrderDirection, Pagination, PaginationDirection};
pub use primitive::Primitive;
pub use query::{
    AchievementQuery, ActivityQuery, AggregationQuery, ContractQuery, ControllerQuery, EventQuery,
    PlayerAchievementQuery, Query, TokenBalanceQuery, TokenContractQuery, TokenQuery,
    TokenTransferQuery, TransactionFilter, TransactionQuery,
};
pub use schema::{Entity, EventMessage, Model, ModelSchema, NoSchema, Ty, World};
pub use subscription::{SubscriptionFilter, SubscriptionKind, Update};

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the result set is exhausted.
    pub next_cursor: Option<Cursor>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Event {
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
    pub transaction_hash: Felt,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Controller {
    pub address: Felt,
    pub username: String,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Token {
    pub contract_address: Felt,
    /// `None` for the contract level entry of a collection.
    pub token_id: Option<U256>,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub metadata: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct TokenBalance {
    pub balance: U256,
    pub account_address: Felt,
    pub contract_address: Felt,
    pub token_id: Option<U256>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct TokenTransfer {
    pub id: String,
    pub contract_address: Felt,
    pub from_address: Felt,
    pub to_address: Felt,
    pub amount: U256,
    pub token_id: Option<U256>,
    pub executed_at: DateTime<Utc>,
}

impl TokenTransfer {
    pub fn involves(&self, account: &Felt) -> bool {
        &self.from_address == account || &self.to_address == account
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct TransactionCall {
    pub contract_address: Felt,
    pub entrypoint: String,
    pub calldata: Vec<Felt>,
    pub caller_address: Felt,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Transaction {
    pub transaction_hash: Felt,
    pub sender_address: Felt,
    pub calldata: Vec<Felt>,
    pub max_fee: Felt,
    pub signature: Vec<Felt>,
    pub nonce: Felt,
    pub block_number: u64,
    pub transaction_type: String,
    pub block_timestamp: DateTime<Utc>,
    pub calls: Vec<TransactionCall>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Activity {
    pub id: String,
    pub world_address: Felt,
    pub namespace: String,
    pub caller_address: Felt,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub action_count: u32,
    /// Entrypoint name to number of calls in the session.
    pub actions: BTreeMap<String, u32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct AchievementTask {
    pub task_id: String,
    pub description: String,
    pub total: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Achievement {
    pub id: String,
    pub world_address: Felt,
    pub namespace: String,
    pub entity_id: String,
    pub hidden: bool,
    pub index: u32,
    pub points: u32,
    pub group: String,
    pub icon: String,
    pub title: String,
    pub description: String,
    pub tasks: Vec<AchievementTask>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct AchievementProgression {
    pub id: String,
    pub achievement_id: String,
    pub task_id: String,
    pub world_address: Felt,
    pub namespace: String,
    pub player_id: Felt,
    pub count: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, AsRefStr, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ContractType {
    World,
    Erc20,
    Erc721,
    Erc1155,
    Udc,
    Other,
}

/// Indexing state of a contract.
#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Contract {
    pub contract_address: Felt,
    pub contract_type: ContractType,
    /// Last indexed block.
    pub head: Option<u64>,
    /// Transactions per second over the last indexed blocks.
    pub tps: Option<u64>,
    pub last_block_timestamp: Option<u64>,
    pub last_pending_block_tx: Option<Felt>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct TokenContract {
    pub contract_address: Felt,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub metadata: String,
    pub token_metadata: String,
    pub total_supply: Option<U256>,
}

/// A ranked value computed by an aggregator, e.g. a leaderboard row.
#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct AggregationEntry {
    pub id: String,
    pub aggregator_id: String,
    pub entity_id: String,
    pub value: U256,
    pub display_value: String,
    pub position: u64,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TaskProgress {
    pub task_id: String,
    pub count: u32,
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PlayerAchievementProgress {
    pub achievement: Achievement,
    pub task_progress: Vec<TaskProgress>,
    pub completed: bool,
    /// 0 to 100.
    pub progress_percentage: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PlayerAchievementStats {
    /// Points of completed achievements only.
    pub total_points: u32,
    pub completed_achievements: u32,
    pub total_achievements: u32,
    /// 0 to 100.
    pub completion_percentage: f64,
    pub last_achievement_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PlayerAchievementEntry {
    pub player_address: Felt,
    pub stats: PlayerAchievementStats,
    pub achievements: Vec<PlayerAchievementProgress>,
}
