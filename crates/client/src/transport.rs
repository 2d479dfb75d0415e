use async_trait::async_trait;
use futures::stream::BoxStream;
use starknet::core::types::Felt;
use torii_proto::schema::Entity;
use torii_proto::{
    Achievement, AchievementQuery, Activity, ActivityQuery, AggregationEntry, AggregationQuery,
    Contract, ContractQuery, Controller, ControllerQuery, Event, EventMessage, EventQuery, Page,
    PlayerAchievementEntry, PlayerAchievementQuery, Query, SubscriptionFilter, Token,
    TokenBalance, TokenBalanceQuery, TokenContract, TokenContractQuery, TokenQuery,
    TokenTransfer, TokenTransferQuery, Transaction, TransactionQuery, Update, World,
};

use crate::error::TransportError;

/// Updates pushed for one remote subscription, in the order the server emitted them.
pub type UpdateStreaming = BoxStream<'static, Result<Update, TransportError>>;

/// A freshly opened remote subscription.
pub struct UpdateStream {
    /// Id the server assigned. Used to update the subscription's filter.
    pub remote_id: u64,
    pub updates: UpdateStreaming,
}

impl std::fmt::Debug for UpdateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateStream").field("remote_id", &self.remote_id).finish()
    }
}

/// The connection to an indexer.
///
/// Implementations own the wire protocol and record codecs. Queries arrive
/// already validated; a rejection from the remote side is reported as
/// [`TransportError::InvalidQuery`].
#[async_trait]
pub trait WorldTransport: Send + Sync {
    /// Metadata of the given worlds, or of every indexed world if empty.
    async fn worlds(&self, world_addresses: Vec<Felt>) -> Result<Vec<World>, TransportError>;

    async fn entities(&self, query: Query) -> Result<Page<Entity>, TransportError>;

    async fn event_messages(&self, query: Query) -> Result<Page<EventMessage>, TransportError>;

    async fn events(&self, query: EventQuery) -> Result<Page<Event>, TransportError>;

    async fn tokens(&self, query: TokenQuery) -> Result<Page<Token>, TransportError>;

    async fn token_contracts(
        &self,
        query: TokenContractQuery,
    ) -> Result<Page<TokenContract>, TransportError>;

    async fn token_balances(
        &self,
        query: TokenBalanceQuery,
    ) -> Result<Page<TokenBalance>, TransportError>;

    async fn token_transfers(
        &self,
        query: TokenTransferQuery,
    ) -> Result<Page<TokenTransfer>, TransportError>;

    async fn transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<Page<Transaction>, TransportError>;

    async fn controllers(
        &self,
        query: ControllerQuery,
    ) -> Result<Page<Controller>, TransportError>;

    async fn activities(&self, query: ActivityQuery) -> Result<Page<Activity>, TransportError>;

    async fn achievements(
        &self,
        query: AchievementQuery,
    ) -> Result<Page<Achievement>, TransportError>;

    /// Per player achievement progress, one entry per player.
    async fn player_achievements(
        &self,
        query: PlayerAchievementQuery,
    ) -> Result<Page<PlayerAchievementEntry>, TransportError>;

    async fn aggregations(
        &self,
        query: AggregationQuery,
    ) -> Result<Page<AggregationEntry>, TransportError>;

    /// Indexed contracts and their indexing state.
    async fn contracts(&self, query: ContractQuery) -> Result<Vec<Contract>, TransportError>;

    /// Opens a live subscription. Dropping the returned stream closes it.
    async fn subscribe(&self, filter: SubscriptionFilter) -> Result<UpdateStream, TransportError>;

    /// Replaces the filter of an open subscription. The kind of the filter
    /// does not change.
    async fn update_subscription(
        &self,
        remote_id: u64,
        filter: SubscriptionFilter,
    ) -> Result<(), TransportError>;
}
