pub mod config;
mod cursor;
pub mod error;
mod matching;
pub mod memory;
pub mod subscription;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;

use crypto_bigint::U256;
use futures::StreamExt;
use starknet::core::types::Felt;
use tokio::sync::RwLock;
use torii_proto::schema::Entity;
use torii_proto::{
    Achievement, AchievementProgression, AchievementQuery, Activity, ActivityQuery,
    AggregationEntry, AggregationQuery, Clause, Contract, ContractQuery, Controller,
    ControllerQuery, Event, EventMessage, EventQuery, KeysClause, Model, Page,
    PlayerAchievementEntry, PlayerAchievementQuery, Query, SubscriptionFilter, SubscriptionKind,
    Token, TokenBalance, TokenBalanceQuery, TokenContract, TokenContractQuery, TokenQuery,
    TokenTransfer, TokenTransferQuery, Transaction, TransactionFilter, TransactionQuery, World,
};
use tracing::{debug, trace};

pub use crate::config::ClientConfig;
pub use crate::error::{DojoError, Error, ErrorType, TransportError};
pub use crate::memory::MemoryTransport;
pub use crate::subscription::{
    Dispatch, SubscriptionCallback, SubscriptionRegistry, UpdateCallback,
};
pub use crate::transport::{UpdateStream, WorldTransport};

pub(crate) const LOG_TARGET: &str = "torii::client";

/// A client of a Torii indexer.
///
/// Queries are validated locally before they reach the transport. Live
/// subscriptions are owned by the client and cancelled when it is dropped.
pub struct Client {
    transport: Arc<dyn WorldTransport>,
    config: ClientConfig,
    /// Models of the indexed worlds, keyed by tag. Loaded on first use.
    models: RwLock<Option<HashMap<String, Model>>>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl Client {
    /// Returns a initialized [Client].
    pub fn new(transport: Arc<dyn WorldTransport>, config: ClientConfig) -> Self {
        debug!(target: LOG_TARGET, url = %config.url, "Created client.");
        Self {
            transport,
            config,
            models: RwLock::new(None),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Metadata of the given worlds, or of every indexed world if empty.
    /// Refreshes the model cache used for clause validation.
    pub async fn worlds(&self, world_addresses: Vec<Felt>) -> Result<Vec<World>, Error> {
        let worlds = self.transport.worlds(world_addresses.clone()).await?;

        // a partial listing would hide models from validation
        if world_addresses.is_empty() {
            *self.models.write().await = Some(Self::collect_models(&worlds));
        }

        Ok(worlds)
    }

    fn collect_models(worlds: &[World]) -> HashMap<String, Model> {
        worlds
            .iter()
            .flat_map(|w| w.models.iter().map(|(tag, model)| (tag.clone(), model.clone())))
            .collect()
    }

    /// The model cache, loading it from the indexer if needed.
    async fn models(&self) -> Result<HashMap<String, Model>, Error> {
        if let Some(models) = self.models.read().await.as_ref() {
            return Ok(models.clone());
        }

        let mut cache = self.models.write().await;
        if let Some(models) = cache.as_ref() {
            return Ok(models.clone());
        }

        let worlds = self.transport.worlds(vec![]).await?;
        let models = Self::collect_models(&worlds);
        trace!(target: LOG_TARGET, models = models.len(), "Loaded model cache.");
        *cache = Some(models.clone());
        Ok(models)
    }

    /// Validates a clause against the model cache. Clauses that do not name
    /// any model need no round trip.
    async fn validate_clause(&self, clause: Option<&Clause>) -> Result<(), Error> {
        let Some(clause) = clause else {
            return Ok(());
        };
        if clause.models().is_empty() {
            clause.validate(&torii_proto::NoSchema)?;
        } else {
            clause.validate(&self.models().await?)?;
        }
        Ok(())
    }

    /// Retrieves entities matching query parameter.
    pub async fn entities(&self, query: Query) -> Result<Page<Entity>, Error> {
        query.validate(&torii_proto::NoSchema)?;
        self.validate_clause(query.clause.as_ref()).await?;
        Ok(self.transport.entities(query).await?)
    }

    /// Retrieves event messages matching query parameter.
    pub async fn event_messages(&self, query: Query) -> Result<Page<EventMessage>, Error> {
        query.validate(&torii_proto::NoSchema)?;
        self.validate_clause(query.clause.as_ref()).await?;
        Ok(self.transport.event_messages(query).await?)
    }

    /// Retrieves raw starknet events.
    pub async fn starknet_events(&self, query: EventQuery) -> Result<Page<Event>, Error> {
        query.validate()?;
        Ok(self.transport.events(query).await?)
    }

    /// Retrieves tokens matching contract addresses.
    pub async fn tokens(&self, query: TokenQuery) -> Result<Page<Token>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.tokens(query).await?)
    }

    pub async fn token_contracts(
        &self,
        query: TokenContractQuery,
    ) -> Result<Page<TokenContract>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.token_contracts(query).await?)
    }

    /// Retrieves token balances for account addresses and contract addresses.
    pub async fn token_balances(
        &self,
        query: TokenBalanceQuery,
    ) -> Result<Page<TokenBalance>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.token_balances(query).await?)
    }

    pub async fn token_transfers(
        &self,
        query: TokenTransferQuery,
    ) -> Result<Page<TokenTransfer>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.token_transfers(query).await?)
    }

    pub async fn transactions(&self, query: TransactionQuery) -> Result<Page<Transaction>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.transactions(query).await?)
    }

    /// Retrieves controllers matching contract addresses.
    pub async fn controllers(&self, query: ControllerQuery) -> Result<Page<Controller>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.controllers(query).await?)
    }

    pub async fn activities(&self, query: ActivityQuery) -> Result<Page<Activity>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.activities(query).await?)
    }

    pub async fn achievements(&self, query: AchievementQuery) -> Result<Page<Achievement>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.achievements(query).await?)
    }

    /// Achievement progress and stats, one entry per player.
    pub async fn player_achievements(
        &self,
        query: PlayerAchievementQuery,
    ) -> Result<Page<PlayerAchievementEntry>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.player_achievements(query).await?)
    }

    pub async fn aggregations(
        &self,
        query: AggregationQuery,
    ) -> Result<Page<AggregationEntry>, Error> {
        query.pagination.validate()?;
        Ok(self.transport.aggregations(query).await?)
    }

    /// Indexed contracts and how far each has been indexed.
    pub async fn contracts(&self, query: ContractQuery) -> Result<Vec<Contract>, Error> {
        Ok(self.transport.contracts(query).await?)
    }

    async fn validate_filter(&self, filter: &SubscriptionFilter) -> Result<(), Error> {
        match filter {
            SubscriptionFilter::Entities { clause, .. }
            | SubscriptionFilter::EventMessages { clause, .. } => {
                self.validate_clause(clause.as_ref()).await
            }
            _ => Ok(filter.validate(&torii_proto::NoSchema)?),
        }
    }

    /// Opens a remote subscription, registers `callback` and spawns the task
    /// delivering the stream to it. Returns the subscription handle.
    ///
    /// The callback kind must match the filter kind.
    pub async fn subscribe(
        &self,
        filter: SubscriptionFilter,
        callback: SubscriptionCallback,
    ) -> Result<u64, Error> {
        if filter.kind() != callback.kind() {
            return Err(Error::SubscriptionKindMismatch {
                expected: filter.kind(),
                found: callback.kind(),
            });
        }
        self.validate_filter(&filter).await?;

        let UpdateStream { remote_id, mut updates } = self.transport.subscribe(filter.clone()).await?;
        let id = self.subscriptions.register(filter, remote_id, callback)?;

        let registry = Arc::clone(&self.subscriptions);
        let task = tokio::spawn(async move {
            while let Some(update) = updates.next().await {
                match update {
                    Ok(update) => {
                        if registry.dispatch(id, update) == Dispatch::Cancelled {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!(target: LOG_TARGET, id, error = %e, "Subscription stream failed.");
                        registry.dispatch_error(id, e.into());
                        return;
                    }
                }
            }

            debug!(target: LOG_TARGET, id, "Subscription stream ended.");
            registry.dispatch_error(id, TransportError::Closed.into());
        });
        self.subscriptions.attach_task(id, task.abort_handle());

        Ok(id)
    }

    /// Replaces the filter of the subscription behind `id`. The handle and
    /// callback are kept, only the kind of filter cannot change.
    pub async fn update_subscription(
        &self,
        id: u64,
        filter: SubscriptionFilter,
    ) -> Result<(), Error> {
        let remote_id = self.subscriptions.remote_id(id, filter.kind())?;
        self.validate_filter(&filter).await?;
        self.transport.update_subscription(remote_id, filter.clone()).await?;
        self.subscriptions.update(id, filter)
    }

    /// Cancels a subscription. Nothing is delivered to its callback afterwards,
    /// apart from an invocation already in progress.
    pub fn cancel_subscription(&self, id: u64) -> Result<(), Error> {
        self.subscriptions
            .cancel(id)
            .map(|_| ())
            .ok_or(Error::SubscriptionNotFound(id))
    }

    /// Subscribes to entity updates. An empty `world_addresses` matches every world.
    pub async fn subscribe_entity_updates(
        &self,
        clause: Option<Clause>,
        world_addresses: Vec<Felt>,
        callback: Arc<dyn UpdateCallback<Entity>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::Entities { clause, world_addresses },
            SubscriptionCallback::Entity(callback),
        )
        .await
    }

    pub async fn update_entity_subscription(
        &self,
        id: u64,
        clause: Option<Clause>,
        world_addresses: Vec<Felt>,
    ) -> Result<(), Error> {
        self.update_subscription(id, SubscriptionFilter::Entities { clause, world_addresses }).await
    }

    pub async fn subscribe_event_message_updates(
        &self,
        clause: Option<Clause>,
        world_addresses: Vec<Felt>,
        callback: Arc<dyn UpdateCallback<EventMessage>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::EventMessages { clause, world_addresses },
            SubscriptionCallback::EventMessage(callback),
        )
        .await
    }

    pub async fn update_event_message_subscription(
        &self,
        id: u64,
        clause: Option<Clause>,
        world_addresses: Vec<Felt>,
    ) -> Result<(), Error> {
        self.update_subscription(id, SubscriptionFilter::EventMessages { clause, world_addresses })
            .await
    }

    /// Subscribes to raw starknet events. An event matches if it matches any of `keys`.
    pub async fn subscribe_event_updates(
        &self,
        keys: Vec<KeysClause>,
        callback: Arc<dyn UpdateCallback<Event>>,
    ) -> Result<u64, Error> {
        self.subscribe(SubscriptionFilter::Events { keys }, SubscriptionCallback::Event(callback))
            .await
    }

    pub async fn update_event_subscription(
        &self,
        id: u64,
        keys: Vec<KeysClause>,
    ) -> Result<(), Error> {
        self.update_subscription(id, SubscriptionFilter::Events { keys }).await
    }

    pub async fn subscribe_token_updates(
        &self,
        contract_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
        callback: Arc<dyn UpdateCallback<Token>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::Tokens { contract_addresses, token_ids },
            SubscriptionCallback::Token(callback),
        )
        .await
    }

    pub async fn update_token_subscription(
        &self,
        id: u64,
        contract_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
    ) -> Result<(), Error> {
        self.update_subscription(id, SubscriptionFilter::Tokens { contract_addresses, token_ids })
            .await
    }

    pub async fn subscribe_token_balance_updates(
        &self,
        contract_addresses: Vec<Felt>,
        account_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
        callback: Arc<dyn UpdateCallback<TokenBalance>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::TokenBalances { contract_addresses, account_addresses, token_ids },
            SubscriptionCallback::TokenBalance(callback),
        )
        .await
    }

    pub async fn update_token_balance_subscription(
        &self,
        id: u64,
        contract_addresses: Vec<Felt>,
        account_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
    ) -> Result<(), Error> {
        self.update_subscription(
            id,
            SubscriptionFilter::TokenBalances { contract_addresses, account_addresses, token_ids },
        )
        .await
    }

    /// Subscribes to token transfers. An account matches either side of a transfer.
    pub async fn subscribe_token_transfer_updates(
        &self,
        contract_addresses: Vec<Felt>,
        account_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
        callback: Arc<dyn UpdateCallback<TokenTransfer>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::TokenTransfers { contract_addresses, account_addresses, token_ids },
            SubscriptionCallback::TokenTransfer(callback),
        )
        .await
    }

    pub async fn update_token_transfer_subscription(
        &self,
        id: u64,
        contract_addresses: Vec<Felt>,
        account_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
    ) -> Result<(), Error> {
        self.update_subscription(
            id,
            SubscriptionFilter::TokenTransfers { contract_addresses, account_addresses, token_ids },
        )
        .await
    }

    pub async fn subscribe_transaction_updates(
        &self,
        filter: Option<TransactionFilter>,
        callback: Arc<dyn UpdateCallback<Transaction>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::Transactions { filter },
            SubscriptionCallback::Transaction(callback),
        )
        .await
    }

    pub async fn update_transaction_subscription(
        &self,
        id: u64,
        filter: Option<TransactionFilter>,
    ) -> Result<(), Error> {
        self.update_subscription(id, SubscriptionFilter::Transactions { filter }).await
    }

    pub async fn subscribe_activity_updates(
        &self,
        world_addresses: Vec<Felt>,
        namespaces: Vec<String>,
        caller_addresses: Vec<Felt>,
        callback: Arc<dyn UpdateCallback<Activity>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::Activities { world_addresses, namespaces, caller_addresses },
            SubscriptionCallback::Activity(callback),
        )
        .await
    }

    pub async fn update_activity_subscription(
        &self,
        id: u64,
        world_addresses: Vec<Felt>,
        namespaces: Vec<String>,
        caller_addresses: Vec<Felt>,
    ) -> Result<(), Error> {
        self.update_subscription(
            id,
            SubscriptionFilter::Activities { world_addresses, namespaces, caller_addresses },
        )
        .await
    }

    pub async fn subscribe_achievement_progression_updates(
        &self,
        world_addresses: Vec<Felt>,
        namespaces: Vec<String>,
        player_addresses: Vec<Felt>,
        achievement_ids: Vec<String>,
        callback: Arc<dyn UpdateCallback<AchievementProgression>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::AchievementProgressions {
                world_addresses,
                namespaces,
                player_addresses,
                achievement_ids,
            },
            SubscriptionCallback::AchievementProgression(callback),
        )
        .await
    }

    pub async fn update_achievement_progression_subscription(
        &self,
        id: u64,
        world_addresses: Vec<Felt>,
        namespaces: Vec<String>,
        player_addresses: Vec<Felt>,
        achievement_ids: Vec<String>,
    ) -> Result<(), Error> {
        self.update_subscription(
            id,
            SubscriptionFilter::AchievementProgressions {
                world_addresses,
                namespaces,
                player_addresses,
                achievement_ids,
            },
        )
        .await
    }

    /// Subscribes to aggregation entries, e.g. leaderboard rows, as they change.
    pub async fn subscribe_aggregation_updates(
        &self,
        aggregator_ids: Vec<String>,
        entity_ids: Vec<String>,
        callback: Arc<dyn UpdateCallback<AggregationEntry>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::Aggregations { aggregator_ids, entity_ids },
            SubscriptionCallback::Aggregation(callback),
        )
        .await
    }

    pub async fn update_aggregation_subscription(
        &self,
        id: u64,
        aggregator_ids: Vec<String>,
        entity_ids: Vec<String>,
    ) -> Result<(), Error> {
        self.update_subscription(id, SubscriptionFilter::Aggregations { aggregator_ids, entity_ids })
            .await
    }

    /// Subscribes to the indexing state of contracts.
    pub async fn subscribe_contract_updates(
        &self,
        contract_addresses: Vec<Felt>,
        callback: Arc<dyn UpdateCallback<Contract>>,
    ) -> Result<u64, Error> {
        self.subscribe(
            SubscriptionFilter::Contracts { contract_addresses },
            SubscriptionCallback::Contract(callback),
        )
        .await
    }

    pub async fn update_contract_subscription(
        &self,
        id: u64,
        contract_addresses: Vec<Felt>,
    ) -> Result<(), Error> {
        self.update_subscription(id, SubscriptionFilter::Contracts { contract_addresses }).await
    }

    /// Kind of the live subscription behind `id`.
    pub fn subscription_kind(&self, id: u64) -> Option<SubscriptionKind> {
        self.subscriptions.filter(id).map(|f| f.kind())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.subscriptions.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use assert_matches::assert_matches;
    use torii_proto::schema::{Member, Struct, Ty};
    use torii_proto::{PatternMatching, Primitive, ProtoError, Update};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use super::*;

    fn entity(n: u64) -> Entity {
        Entity {
            world_address: Felt::ONE,
            hashed_keys: Felt::from(n),
            keys: vec![Felt::from(n)],
            ..Default::default()
        }
    }

    fn setup() -> (Arc<MemoryTransport>, Client) {
        let transport = Arc::new(MemoryTransport::default());
        let client = Client::new(transport.clone(), ClientConfig::default());
        (transport, client)
    }

    fn recorder() -> (Arc<dyn UpdateCallback<Entity>>, UnboundedReceiver<Felt>) {
        let (tx, rx) = unbounded_channel();
        let callback = move |entity: Entity| {
            let _ = tx.send(entity.hashed_keys);
        };
        (Arc::new(callback), rx)
    }

    async fn next(rx: &mut UnboundedReceiver<Felt>) -> Felt {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("callback dropped")
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_update_changes_delivery() {
        let (transport, client) = setup();
        let (callback, mut rx) = recorder();

        let id = client
            .subscribe_entity_updates(Some(Clause::HashedKeys(vec![Felt::ONE])), vec![], callback)
            .await
            .unwrap();

        transport.publish(Update::Entity(entity(1)));
        assert_eq!(next(&mut rx).await, Felt::ONE);

        client
            .update_entity_subscription(id, Some(Clause::HashedKeys(vec![Felt::TWO])), vec![])
            .await
            .unwrap();
        assert!(client.subscriptions().contains(id));

        transport.publish(Update::Entity(entity(1)));
        transport.publish(Update::Entity(entity(2)));
        assert_eq!(next(&mut rx).await, Felt::TWO);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_with_other_kind_is_rejected() {
        let (_transport, client) = setup();
        let (callback, _rx) = recorder();
        let id = client.subscribe_entity_updates(None, vec![], callback).await.unwrap();

        assert_matches!(
            client.update_event_subscription(id, vec![]).await,
            Err(Error::SubscriptionKindMismatch { .. })
        );
        assert_matches!(
            client.update_entity_subscription(id + 1, None, vec![]).await,
            Err(Error::SubscriptionNotFound(_))
        );
    }

    #[tokio::test]
    async fn test_cancel_then_silence() {
        let (transport, client) = setup();
        let (callback, mut rx) = recorder();
        let id = client.subscribe_entity_updates(None, vec![], callback).await.unwrap();

        client.cancel_subscription(id).unwrap();
        transport.publish(Update::Entity(entity(1)));
        settle().await;

        assert!(rx.try_recv().is_err());
        assert_matches!(client.cancel_subscription(id), Err(Error::SubscriptionNotFound(i)) if i == id);
    }

    #[tokio::test]
    async fn test_cancel_releases_transport_subscriber() {
        let (transport, client) = setup();
        let (callback, _rx) = recorder();
        let id = client
            .subscribe_entity_updates(Some(Clause::HashedKeys(vec![Felt::ONE])), vec![], callback)
            .await
            .unwrap();
        assert_eq!(transport.subscriber_count(), 1);

        client.cancel_subscription(id).unwrap();
        settle().await;
        for n in 2..6 {
            transport.publish(Update::Entity(entity(n)));
        }
        assert_eq!(transport.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_cancels_all() {
        let (transport, client) = setup();
        let (first, mut first_rx) = recorder();
        let (second, mut second_rx) = recorder();
        client.subscribe_entity_updates(None, vec![], first).await.unwrap();
        client.subscribe_entity_updates(None, vec![], second).await.unwrap();
        assert_eq!(transport.subscriber_count(), 2);

        drop(client);
        settle().await;
        transport.publish(Update::Entity(entity(1)));
        settle().await;

        assert!(first_rx.try_recv().is_err());
        assert!(second_rx.try_recv().is_err());
        assert_eq!(transport.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_callback_is_isolated() {
        let (transport, client) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let panicking = {
            let calls = calls.clone();
            move |_: Entity| {
                calls.fetch_add(1, Ordering::SeqCst);
                panic!("callback failure");
            }
        };
        let (callback, mut rx) = recorder();

        let panicking_id =
            client.subscribe_entity_updates(None, vec![], Arc::new(panicking)).await.unwrap();
        client.subscribe_entity_updates(None, vec![], callback).await.unwrap();

        transport.publish(Update::Entity(entity(1)));
        transport.publish(Update::Entity(entity(2)));

        assert_eq!(next(&mut rx).await, Felt::ONE);
        assert_eq!(next(&mut rx).await, Felt::TWO);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(client.subscriptions().contains(panicking_id));
    }

    #[tokio::test]
    async fn test_arity_rejected_before_round_trip() {
        let (transport, client) = setup();
        let member = |name: &str, key| Member {
            name: name.to_string(),
            ty: Ty::Primitive(Primitive::U32(0)),
            key,
        };
        let model = Model {
            namespace: "ns".to_string(),
            name: "Position".to_string(),
            selector: Felt::from(3_u8),
            schema: Struct {
                name: "ns-Position".to_string(),
                children: vec![member("player", true), member("game", true), member("x", false)],
            },
        };
        transport.register_world(World {
            world_address: Felt::ONE,
            models: HashMap::from([(model.tag(), model)]),
        });

        let mut keys = KeysClause::new(PatternMatching::FixedLen);
        keys.add_key(Some(Felt::ONE)).add_model("ns-Position").unwrap();
        let query = Query { clause: Some(keys.clone().into()), ..Default::default() };
        assert_matches!(
            client.entities(query).await,
            Err(Error::Proto(ProtoError::KeysArity { found: 1, .. }))
        );

        keys.add_key(None);
        let query = Query { clause: Some(keys.into()), ..Default::default() };
        assert!(client.entities(query).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_reaches_on_error() {
        struct Watcher(tokio::sync::mpsc::UnboundedSender<ErrorType>);

        impl UpdateCallback<Entity> for Watcher {
            fn on_update(&self, _: Entity) {}

            fn on_error(&self, error: DojoError) {
                let _ = self.0.send(error.error_type());
            }
        }

        let transport =
            Arc::new(MemoryTransport::new(&ClientConfig::default().with_subscription_buffer_size(1)));
        let client = Client::new(transport.clone(), ClientConfig::default());
        let (tx, mut rx) = unbounded_channel();
        client.subscribe_entity_updates(None, vec![], Arc::new(Watcher(tx))).await.unwrap();

        // the second publish overflows the buffer before the task drains it
        transport.publish(Update::Entity(entity(1)));
        transport.publish(Update::Entity(entity(2)));

        let error_type = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(error_type, ErrorType::ClientError);
    }

    #[tokio::test]
    async fn test_aggregation_and_contract_subscriptions() {
        use chrono::{DateTime, Utc};
        use torii_proto::ContractType;

        let (transport, client) = setup();
        let entry = |aggregator_id: &str, entity_id: &str| AggregationEntry {
            id: format!("{aggregator_id}:{entity_id}"),
            aggregator_id: aggregator_id.to_string(),
            entity_id: entity_id.to_string(),
            value: U256::ONE,
            display_value: "1".to_string(),
            position: 1,
            model_id: "0x1".to_string(),
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        };

        let (tx, mut rx) = unbounded_channel();
        let callback = move |entry: AggregationEntry| {
            let _ = tx.send(entry.id);
        };
        let id = client
            .subscribe_aggregation_updates(vec!["kills".to_string()], vec![], Arc::new(callback))
            .await
            .unwrap();
        assert_eq!(client.subscription_kind(id), Some(SubscriptionKind::Aggregation));

        transport.publish(Update::Aggregation(entry("deaths", "0x1")));
        transport.publish(Update::Aggregation(entry("kills", "0x1")));
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(received.as_deref(), Some("kills:0x1"));

        client
            .update_aggregation_subscription(id, vec!["deaths".to_string()], vec![])
            .await
            .unwrap();
        transport.publish(Update::Aggregation(entry("kills", "0x2")));
        transport.publish(Update::Aggregation(entry("deaths", "0x2")));
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(received.as_deref(), Some("deaths:0x2"));

        let page = client.aggregations(AggregationQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 4);

        let (tx, mut rx) = unbounded_channel();
        let callback = move |contract: Contract| {
            let _ = tx.send(contract.contract_address);
        };
        let id = client.subscribe_contract_updates(vec![Felt::TWO], Arc::new(callback)).await.unwrap();
        assert_matches!(
            client.update_aggregation_subscription(id, vec![], vec![]).await,
            Err(Error::SubscriptionKindMismatch { .. })
        );

        let contract = |address: Felt| Contract {
            contract_address: address,
            contract_type: ContractType::Erc20,
            head: None,
            tps: None,
            last_block_timestamp: None,
            last_pending_block_tx: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        };
        transport.publish(Update::Contract(contract(Felt::ONE)));
        transport.publish(Update::Contract(contract(Felt::TWO)));
        assert_eq!(next(&mut rx).await, Felt::TWO);

        let contracts = client.contracts(ContractQuery::default()).await.unwrap();
        assert_eq!(contracts.len(), 2);
    }

    #[tokio::test]
    async fn test_progression_subscription_by_achievement() {
        use chrono::{DateTime, Utc};

        let (transport, client) = setup();
        let progression = |achievement_id: &str| AchievementProgression {
            id: achievement_id.to_string(),
            achievement_id: achievement_id.to_string(),
            task_id: "task".to_string(),
            world_address: Felt::ONE,
            namespace: "ns".to_string(),
            player_id: Felt::TWO,
            count: 1,
            completed: false,
            completed_at: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        };

        let (tx, mut rx) = unbounded_channel();
        let callback = move |progression: AchievementProgression| {
            let _ = tx.send(progression.achievement_id);
        };
        let id = client
            .subscribe_achievement_progression_updates(
                vec![],
                vec![],
                vec![],
                vec!["marathon".to_string()],
                Arc::new(callback),
            )
            .await
            .unwrap();

        transport.publish(Update::AchievementProgression(progression("first-blood")));
        transport.publish(Update::AchievementProgression(progression("marathon")));
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(received.as_deref(), Some("marathon"));

        client
            .update_achievement_progression_subscription(id, vec![], vec![], vec![Felt::ONE], vec![])
            .await
            .unwrap();
        transport.publish(Update::AchievementProgression(progression("marathon")));
        settle().await;
        assert!(rx.try_recv().is_err());

        let page = client.player_achievements(PlayerAchievementQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].player_address, Felt::TWO);
    }
}
