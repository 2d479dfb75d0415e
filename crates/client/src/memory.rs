//! An in-process indexer.
//!
//! Holds records in memory, evaluates clauses, paginates with opaque cursors
//! and pushes updates to subscribers. Useful for tests, demos and embedding.
//! Only the latest state of each record is kept, so historical queries see
//! the same data as regular ones.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crypto_bigint::{Encoding, U256};
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::RwLock;
use rand::Rng;
use starknet::core::types::Felt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Sender};
use tokio_stream::wrappers::ReceiverStream;
use torii_proto::schema::{Entity, Struct, Ty};
use torii_proto::{
    Achievement, AchievementProgression, AchievementQuery, Activity, ActivityQuery,
    AggregationEntry, AggregationQuery, Contract, ContractQuery, Controller, ControllerQuery,
    Event, EventMessage, EventQuery, Page, Pagination, PlayerAchievementEntry,
    PlayerAchievementProgress, PlayerAchievementQuery, PlayerAchievementStats, Primitive, Query,
    SubscriptionFilter, TaskProgress, Token, TokenBalance, TokenBalanceQuery, TokenContract,
    TokenContractQuery, TokenQuery, TokenTransfer, TokenTransferQuery, Transaction,
    TransactionQuery, Update, World,
};
use tracing::{debug, error, trace};

use crate::config::ClientConfig;
use crate::cursor::{Position, SortValue};
use crate::error::TransportError;
use crate::matching::{
    match_activity, match_aggregation, match_entity, match_keys, match_model, match_token,
    match_token_balance, match_token_transfer, match_transaction, match_update, within,
};
use crate::transport::{UpdateStream, WorldTransport};

pub(crate) const LOG_TARGET: &str = "torii::client::memory";

/// Page size when the query does not set a limit.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// A record that can be ordered by named fields.
pub(crate) trait Record: Clone {
    /// Whether `field` can be used in an order by clause.
    fn is_sortable(field: &str) -> bool;

    fn sort_value(&self, field: &str) -> SortValue;
}

fn felt(value: &Felt) -> SortValue {
    SortValue::Bytes(value.to_bytes_be().to_vec())
}

fn u256(value: &U256) -> SortValue {
    SortValue::Bytes(value.to_be_bytes().to_vec())
}

fn time(value: &DateTime<Utc>) -> SortValue {
    SortValue::Int(value.timestamp_micros())
}

fn primitive(value: &Primitive) -> SortValue {
    match *value {
        Primitive::I8(v) => SortValue::Int(v as i64),
        Primitive::I16(v) => SortValue::Int(v as i64),
        Primitive::I32(v) => SortValue::Int(v as i64),
        Primitive::I64(v) => SortValue::Int(v),
        Primitive::I128(v) => SortValue::Bytes((v as u128 ^ (1 << 127)).to_be_bytes().to_vec()),
        Primitive::U8(v) => SortValue::UInt(v as u64),
        Primitive::U16(v) => SortValue::UInt(v as u64),
        Primitive::U32(v) => SortValue::UInt(v as u64),
        Primitive::U64(v) => SortValue::UInt(v),
        Primitive::U128(v) => SortValue::Bytes(v.to_be_bytes().to_vec()),
        Primitive::U256(ref v) => u256(v),
        Primitive::Bool(v) => SortValue::Bool(v),
        Primitive::Felt252(ref f)
        | Primitive::ClassHash(ref f)
        | Primitive::ContractAddress(ref f)
        | Primitive::EthAddress(ref f) => felt(f),
    }
}

impl<const EVENT_MESSAGE: bool> Record for Entity<EVENT_MESSAGE> {
    fn is_sortable(field: &str) -> bool {
        matches!(
            field,
            "world_address" | "hashed_keys" | "created_at" | "updated_at" | "executed_at"
        ) || field.split_once('.').is_some_and(|(model, member)| !model.is_empty() && !member.is_empty())
    }

    /// Model members are addressed as `namespace-Model.member.path`.
    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "world_address" => felt(&self.world_address),
            "hashed_keys" => felt(&self.hashed_keys),
            "created_at" => time(&self.created_at),
            "updated_at" => time(&self.updated_at),
            "executed_at" => time(&self.executed_at),
            path => {
                let Some((tag, member)) = path.split_once('.') else {
                    return SortValue::Missing;
                };
                self.models
                    .iter()
                    .find(|m| match_model(tag, &m.name))
                    .and_then(|m| member_value(m, member))
                    .unwrap_or(SortValue::Missing)
            }
        }
    }
}

fn member_value(model: &Struct, path: &str) -> Option<SortValue> {
    let mut parts = path.split('.');
    let mut current = model.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Ty::Struct(s) => s.get(part)?,
            _ => return None,
        };
    }
    match current {
        Ty::Primitive(p) => Some(primitive(p)),
        Ty::ByteArray(s) => Some(SortValue::Text(s.clone())),
        Ty::Enum(e) => e.option().map(|o| SortValue::Text(o.name.clone())),
        _ => None,
    }
}

impl Record for Event {
    fn is_sortable(field: &str) -> bool {
        field == "transaction_hash"
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "transaction_hash" => felt(&self.transaction_hash),
            _ => SortValue::Missing,
        }
    }
}

impl Record for Token {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "contract_address" | "token_id" | "name" | "symbol")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "contract_address" => felt(&self.contract_address),
            "token_id" => self.token_id.as_ref().map_or(SortValue::Missing, u256),
            "name" => SortValue::Text(self.name.clone()),
            "symbol" => SortValue::Text(self.symbol.clone()),
            _ => SortValue::Missing,
        }
    }
}

impl Record for TokenBalance {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "balance" | "account_address" | "contract_address" | "token_id")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "balance" => u256(&self.balance),
            "account_address" => felt(&self.account_address),
            "contract_address" => felt(&self.contract_address),
            "token_id" => self.token_id.as_ref().map_or(SortValue::Missing, u256),
            _ => SortValue::Missing,
        }
    }
}

impl Record for TokenTransfer {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "id" | "contract_address" | "amount" | "executed_at")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "id" => SortValue::Text(self.id.clone()),
            "contract_address" => felt(&self.contract_address),
            "amount" => u256(&self.amount),
            "executed_at" => time(&self.executed_at),
            _ => SortValue::Missing,
        }
    }
}

impl Record for Transaction {
    fn is_sortable(field: &str) -> bool {
        matches!(
            field,
            "transaction_hash" | "sender_address" | "block_number" | "block_timestamp"
        )
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "transaction_hash" => felt(&self.transaction_hash),
            "sender_address" => felt(&self.sender_address),
            "block_number" => SortValue::UInt(self.block_number),
            "block_timestamp" => time(&self.block_timestamp),
            _ => SortValue::Missing,
        }
    }
}

impl Record for Controller {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "address" | "username" | "deployed_at")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "address" => felt(&self.address),
            "username" => SortValue::Text(self.username.clone()),
            "deployed_at" => time(&self.deployed_at),
            _ => SortValue::Missing,
        }
    }
}

impl Record for Activity {
    fn is_sortable(field: &str) -> bool {
        matches!(
            field,
            "id" | "namespace" | "caller_address" | "session_start" | "session_end" | "action_count" | "updated_at"
        )
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "id" => SortValue::Text(self.id.clone()),
            "namespace" => SortValue::Text(self.namespace.clone()),
            "caller_address" => felt(&self.caller_address),
            "session_start" => time(&self.session_start),
            "session_end" => time(&self.session_end),
            "action_count" => SortValue::UInt(self.action_count as u64),
            "updated_at" => time(&self.updated_at),
            _ => SortValue::Missing,
        }
    }
}

impl Record for Achievement {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "id" | "namespace" | "index" | "points" | "created_at")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "id" => SortValue::Text(self.id.clone()),
            "namespace" => SortValue::Text(self.namespace.clone()),
            "index" => SortValue::UInt(self.index as u64),
            "points" => SortValue::UInt(self.points as u64),
            "created_at" => time(&self.created_at),
            _ => SortValue::Missing,
        }
    }
}

impl Record for Contract {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "contract_address" | "created_at")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "contract_address" => felt(&self.contract_address),
            "created_at" => time(&self.created_at),
            _ => SortValue::Missing,
        }
    }
}

impl Record for TokenContract {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "contract_address" | "name" | "symbol")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "contract_address" => felt(&self.contract_address),
            "name" => SortValue::Text(self.name.clone()),
            "symbol" => SortValue::Text(self.symbol.clone()),
            _ => SortValue::Missing,
        }
    }
}

impl Record for AggregationEntry {
    fn is_sortable(field: &str) -> bool {
        matches!(
            field,
            "id" | "aggregator_id" | "entity_id" | "value" | "position" | "updated_at"
        )
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "id" => SortValue::Text(self.id.clone()),
            "aggregator_id" => SortValue::Text(self.aggregator_id.clone()),
            "entity_id" => SortValue::Text(self.entity_id.clone()),
            "value" => u256(&self.value),
            "position" => SortValue::UInt(self.position),
            "updated_at" => time(&self.updated_at),
            _ => SortValue::Missing,
        }
    }
}

impl Record for AchievementProgression {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "id" | "player_id" | "updated_at")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "id" => SortValue::Text(self.id.clone()),
            "player_id" => felt(&self.player_id),
            "updated_at" => time(&self.updated_at),
            _ => SortValue::Missing,
        }
    }
}

impl Record for PlayerAchievementEntry {
    fn is_sortable(field: &str) -> bool {
        matches!(field, "player_address" | "total_points" | "completed_achievements")
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "player_address" => felt(&self.player_address),
            "total_points" => SortValue::UInt(self.stats.total_points as u64),
            "completed_achievements" => SortValue::UInt(self.stats.completed_achievements as u64),
            _ => SortValue::Missing,
        }
    }
}

#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    record: T,
}

#[derive(Debug)]
struct Collection<T> {
    records: Vec<Stored<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<T: Record> Collection<T> {
    /// Replaces the first record `same` matches, keeping its insertion
    /// sequence, or appends a new one.
    fn upsert(&mut self, seq: &mut u64, record: T, same: impl Fn(&T) -> bool) {
        match self.records.iter_mut().find(|s| same(&s.record)) {
            Some(stored) => stored.record = record,
            None => {
                *seq += 1;
                self.records.push(Stored { seq: *seq, record });
            }
        }
    }

    fn push(&mut self, seq: &mut u64, record: T) {
        *seq += 1;
        self.records.push(Stored { seq: *seq, record });
    }

    /// Filters, orders and slices the collection according to `pagination`.
    fn paginate(
        &self,
        pagination: &Pagination,
        filter: impl Fn(&T) -> bool,
    ) -> Result<Page<T>, TransportError> {
        if let Some(order) = pagination.order_by.iter().find(|o| !T::is_sortable(&o.field)) {
            return Err(TransportError::InvalidQuery(format!(
                "Unknown order by field: {}",
                order.field
            )));
        }

        let after = pagination
            .cursor
            .as_ref()
            .map(|cursor| Position::from_cursor(cursor, pagination.order_by.len()))
            .transpose()?;

        let mut matches = self
            .records
            .iter()
            .filter(|stored| filter(&stored.record))
            .map(|stored| {
                let position = Position {
                    values: pagination
                        .order_by
                        .iter()
                        .map(|o| stored.record.sort_value(&o.field))
                        .collect(),
                    seq: stored.seq,
                };
                (position, &stored.record)
            })
            .filter(|(position, _)| {
                after
                    .as_ref()
                    .map_or(true, |after| position.cmp_with(after, pagination).is_gt())
            })
            .collect::<Vec<_>>();

        matches.sort_by(|(a, _), (b, _)| a.cmp_with(b, pagination));

        let limit = match pagination.limit {
            Some(limit) if limit > 0 => limit as usize,
            _ => DEFAULT_PAGE_LIMIT as usize,
        };

        let next_cursor = if matches.len() > limit {
            Some(matches[limit - 1].0.to_cursor()?)
        } else {
            None
        };

        Ok(Page {
            items: matches
                .into_iter()
                .take(limit)
                .map(|(_, record)| record.clone())
                .collect(),
            next_cursor,
        })
    }
}

#[derive(Debug, Default)]
struct State {
    seq: u64,
    worlds: HashMap<Felt, World>,
    entities: Collection<Entity>,
    event_messages: Collection<EventMessage>,
    events: Collection<Event>,
    tokens: Collection<Token>,
    token_balances: Collection<TokenBalance>,
    token_transfers: Collection<TokenTransfer>,
    transactions: Collection<Transaction>,
    controllers: Collection<Controller>,
    activities: Collection<Activity>,
    achievements: Collection<Achievement>,
    progressions: Collection<AchievementProgression>,
    aggregations: Collection<AggregationEntry>,
    contracts: Collection<Contract>,
    token_contracts: Collection<TokenContract>,
}

/// Progress of one player on one achievement.
fn achievement_progress(
    achievement: &Achievement,
    progressions: &[&AchievementProgression],
) -> PlayerAchievementProgress {
    let task_progress = achievement
        .tasks
        .iter()
        .map(|task| {
            let progression = progressions.iter().find(|p| {
                p.achievement_id == achievement.id
                    && p.task_id == task.task_id
                    && p.world_address == achievement.world_address
            });
            TaskProgress {
                task_id: task.task_id.clone(),
                count: progression.map_or(0, |p| p.count),
                completed: progression.is_some_and(|p| p.completed),
            }
        })
        .collect::<Vec<_>>();

    // an achievement without tasks can never be earned
    let completed = !task_progress.is_empty() && task_progress.iter().all(|t| t.completed);
    let progress_percentage = if task_progress.is_empty() {
        0.0
    } else {
        let sum = achievement
            .tasks
            .iter()
            .zip(&task_progress)
            .map(|(task, progress)| match (progress.completed, task.total) {
                (true, _) => 1.0,
                (false, 0) => 0.0,
                (false, total) => f64::from(progress.count.min(total)) / f64::from(total),
            })
            .sum::<f64>();
        sum / task_progress.len() as f64 * 100.0
    };

    PlayerAchievementProgress {
        achievement: achievement.clone(),
        task_progress,
        completed,
        progress_percentage,
    }
}

/// One entry per player with at least one progression, ordered by the
/// player's first progression.
fn player_achievements(state: &State, query: &PlayerAchievementQuery) -> Collection<PlayerAchievementEntry> {
    let achievements = state
        .achievements
        .records
        .iter()
        .map(|stored| &stored.record)
        .filter(|a| within(&query.world_addresses, &a.world_address) && within(&query.namespaces, &a.namespace))
        .collect::<Vec<_>>();

    let mut players = BTreeMap::<Felt, (u64, Vec<&AchievementProgression>)>::new();
    for stored in &state.progressions.records {
        let p = &stored.record;
        if !within(&query.world_addresses, &p.world_address)
            || !within(&query.namespaces, &p.namespace)
            || !within(&query.player_addresses, &p.player_id)
        {
            continue;
        }
        let (seq, progressions) = players.entry(p.player_id).or_insert((stored.seq, Vec::new()));
        *seq = (*seq).min(stored.seq);
        progressions.push(p);
    }

    let records = players
        .into_iter()
        .map(|(player_address, (seq, progressions))| {
            let achievements = achievements
                .iter()
                .map(|a| achievement_progress(a, &progressions))
                .collect::<Vec<_>>();

            let completed = achievements.iter().filter(|a| a.completed).collect::<Vec<_>>();
            let total_achievements = achievements.len() as u32;
            let completed_achievements = completed.len() as u32;
            let completion_percentage = if total_achievements > 0 {
                f64::from(completed_achievements) / f64::from(total_achievements) * 100.0
            } else {
                0.0
            };
            let last_achievement_at = progressions
                .iter()
                .filter(|p| completed.iter().any(|a| a.achievement.id == p.achievement_id))
                .filter_map(|p| p.completed_at)
                .max();

            let stats = PlayerAchievementStats {
                total_points: completed.iter().map(|a| a.achievement.points).sum(),
                completed_achievements,
                total_achievements,
                completion_percentage,
                last_achievement_at,
                created_at: progressions.iter().map(|p| p.created_at).min().unwrap_or_default(),
                updated_at: progressions.iter().map(|p| p.updated_at).max().unwrap_or_default(),
            };

            Stored { seq, record: PlayerAchievementEntry { player_address, stats, achievements } }
        })
        .collect();

    Collection { records }
}

/// Merges the models of `update` into `entity`, keeping models it does not touch.
fn merge_entity<const EVENT_MESSAGE: bool>(
    entity: &mut Entity<EVENT_MESSAGE>,
    update: Entity<EVENT_MESSAGE>,
) {
    for model in update.models {
        match entity.models.iter_mut().find(|m| m.name == model.name) {
            Some(existing) => *existing = model,
            None => entity.models.push(model),
        }
    }
    entity.keys = update.keys;
    entity.updated_at = update.updated_at;
    entity.executed_at = update.executed_at;
}

fn upsert_entity<const EVENT_MESSAGE: bool>(
    collection: &mut Collection<Entity<EVENT_MESSAGE>>,
    seq: &mut u64,
    update: Entity<EVENT_MESSAGE>,
) -> Entity<EVENT_MESSAGE> {
    let existing = collection.records.iter_mut().find(|s| {
        s.record.world_address == update.world_address && s.record.hashed_keys == update.hashed_keys
    });
    match existing {
        Some(stored) => {
            merge_entity(&mut stored.record, update);
            stored.record.clone()
        }
        None => {
            collection.push(seq, update.clone());
            update
        }
    }
}

/// Narrows an entity page to the requested models.
fn project<const EVENT_MESSAGE: bool>(
    mut page: Page<Entity<EVENT_MESSAGE>>,
    query: &Query,
) -> Page<Entity<EVENT_MESSAGE>> {
    for entity in &mut page.items {
        if !query.models.is_empty() {
            entity
                .models
                .retain(|m| query.models.iter().any(|pattern| match_model(pattern, &m.name)));
        }
        if query.no_hashed_keys {
            entity.hashed_keys = Felt::ZERO;
        }
    }
    page
}

fn entity_filter<'a, const EVENT_MESSAGE: bool>(
    query: &'a Query,
) -> impl Fn(&Entity<EVENT_MESSAGE>) -> bool + 'a {
    move |entity| {
        within(&query.world_addresses, &entity.world_address)
            && (query.models.is_empty()
                || entity
                    .models
                    .iter()
                    .any(|m| query.models.iter().any(|pattern| match_model(pattern, &m.name))))
            && query.clause.as_ref().map_or(true, |c| match_entity(entity, c))
    }
}

#[derive(Debug)]
struct Subscriber {
    filter: SubscriptionFilter,
    sender: Sender<Result<Update, TransportError>>,
}

/// In-memory [`WorldTransport`].
#[derive(Debug)]
pub struct MemoryTransport {
    state: RwLock<State>,
    subscribers: DashMap<u64, Subscriber>,
    subscription_buffer_size: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl MemoryTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            state: RwLock::new(State::default()),
            subscribers: DashMap::new(),
            subscription_buffer_size: config.subscription_buffer_size.max(1),
        }
    }

    pub fn register_world(&self, world: World) {
        debug!(target: LOG_TARGET, world = %format!("{:#x}", world.world_address), models = world.models.len(), "Registered world.");
        self.state.write().worlds.insert(world.world_address, world);
    }

    pub fn insert_controller(&self, controller: Controller) {
        let mut state = self.state.write();
        let State { seq, controllers, .. } = &mut *state;
        let address = controller.address;
        controllers.upsert(seq, controller, |c| c.address == address);
    }

    pub fn insert_achievement(&self, achievement: Achievement) {
        let mut state = self.state.write();
        let State { seq, achievements, .. } = &mut *state;
        let id = achievement.id.clone();
        achievements.upsert(seq, achievement, |a| a.id == id);
    }

    pub fn insert_token_contract(&self, token_contract: TokenContract) {
        let mut state = self.state.write();
        let State { seq, token_contracts, .. } = &mut *state;
        let address = token_contract.contract_address;
        token_contracts.upsert(seq, token_contract, |t| t.contract_address == address);
    }

    /// Stores the record carried by `update` and pushes it to every matching
    /// subscriber. Entity updates are merged into the stored entity first, so
    /// subscribers see its full current state.
    pub fn publish(&self, update: Update) {
        let update = self.store(update);
        self.notify(&update);
    }

    fn store(&self, update: Update) -> Update {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let seq = &mut state.seq;

        match update {
            Update::Entity(entity) => Update::Entity(upsert_entity(&mut state.entities, seq, entity)),
            Update::EventMessage(message) => {
                Update::EventMessage(upsert_entity(&mut state.event_messages, seq, message))
            }
            Update::Event(event) => {
                state.events.push(seq, event.clone());
                Update::Event(event)
            }
            Update::Token(token) => {
                let key = (token.contract_address, token.token_id);
                state.tokens.upsert(seq, token.clone(), |t| (t.contract_address, t.token_id) == key);
                Update::Token(token)
            }
            Update::TokenBalance(balance) => {
                let key = (balance.contract_address, balance.account_address, balance.token_id);
                state.token_balances.upsert(seq, balance.clone(), |b| {
                    (b.contract_address, b.account_address, b.token_id) == key
                });
                Update::TokenBalance(balance)
            }
            Update::TokenTransfer(transfer) => {
                let id = transfer.id.clone();
                state.token_transfers.upsert(seq, transfer.clone(), |t| t.id == id);
                Update::TokenTransfer(transfer)
            }
            Update::Transaction(transaction) => {
                let hash = transaction.transaction_hash;
                state
                    .transactions
                    .upsert(seq, transaction.clone(), |t| t.transaction_hash == hash);
                Update::Transaction(transaction)
            }
            Update::Activity(activity) => {
                let id = activity.id.clone();
                state.activities.upsert(seq, activity.clone(), |a| a.id == id);
                Update::Activity(activity)
            }
            Update::AchievementProgression(progression) => {
                let id = progression.id.clone();
                state.progressions.upsert(seq, progression.clone(), |p| p.id == id);
                Update::AchievementProgression(progression)
            }
            Update::Aggregation(entry) => {
                let id = entry.id.clone();
                state.aggregations.upsert(seq, entry.clone(), |a| a.id == id);
                Update::Aggregation(entry)
            }
            Update::Contract(contract) => {
                trace!(
                    target: LOG_TARGET,
                    contract = %format!("{:#x}", contract.contract_address),
                    contract_type = contract.contract_type.as_ref(),
                    head = ?contract.head,
                    "Contract indexing state."
                );
                let address = contract.contract_address;
                state.contracts.upsert(seq, contract.clone(), |c| c.contract_address == address);
                Update::Contract(contract)
            }
        }
    }

    fn notify(&self, update: &Update) {
        let mut closed_stream = Vec::new();

        for sub in self.subscribers.iter() {
            let idx = sub.key();
            let sub = sub.value();

            // cancelled subscriptions drop their stream, whether or not anything matches them
            if sub.sender.is_closed() {
                trace!(target: LOG_TARGET, subscription_id = %idx, "Subscriber channel closed.");
                closed_stream.push(*idx);
                continue;
            }

            if !match_update(&sub.filter, update) {
                continue;
            }

            // Use try_send to avoid blocking on slow subscribers
            match sub.sender.try_send(Ok(update.clone())) {
                Ok(_) => {
                    trace!(target: LOG_TARGET, subscription_id = %idx, kind = update.kind().as_ref(), "Update sent to subscriber.");
                }
                Err(TrySendError::Full(_)) => {
                    error!(target: LOG_TARGET, subscription_id = %idx, "Disconnecting slow subscriber - channel full.");
                    closed_stream.push(*idx);
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(target: LOG_TARGET, subscription_id = %idx, "Subscriber channel closed.");
                    closed_stream.push(*idx);
                }
            }
        }

        for id in closed_stream {
            trace!(target: LOG_TARGET, id = %id, "Removing closed subscriber.");
            self.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[async_trait]
impl WorldTransport for MemoryTransport {
    async fn worlds(&self, world_addresses: Vec<Felt>) -> Result<Vec<World>, TransportError> {
        let state = self.state.read();
        let mut worlds = state
            .worlds
            .values()
            .filter(|w| within(&world_addresses, &w.world_address))
            .cloned()
            .collect::<Vec<_>>();
        worlds.sort_by_key(|w| w.world_address);
        Ok(worlds)
    }

    async fn entities(&self, query: Query) -> Result<Page<Entity>, TransportError> {
        let page = self
            .state
            .read()
            .entities
            .paginate(&query.pagination, entity_filter(&query))?;
        Ok(project(page, &query))
    }

    async fn event_messages(&self, query: Query) -> Result<Page<EventMessage>, TransportError> {
        let page = self
            .state
            .read()
            .event_messages
            .paginate(&query.pagination, entity_filter(&query))?;
        Ok(project(page, &query))
    }

    async fn events(&self, query: EventQuery) -> Result<Page<Event>, TransportError> {
        let clauses = query.keys.iter().cloned().collect::<Vec<_>>();
        self.state
            .read()
            .events
            .paginate(&query.pagination, |e| match_keys(&e.keys, &clauses))
    }

    async fn tokens(&self, query: TokenQuery) -> Result<Page<Token>, TransportError> {
        self.state.read().tokens.paginate(&query.pagination, |t| {
            match_token(t, &query.contract_addresses, &query.token_ids)
        })
    }

    /// A contract type filter only keeps token contracts whose indexing
    /// state is known.
    async fn token_contracts(
        &self,
        query: TokenContractQuery,
    ) -> Result<Page<TokenContract>, TransportError> {
        let state = self.state.read();
        state.token_contracts.paginate(&query.pagination, |t| {
            within(&query.contract_addresses, &t.contract_address)
                && (query.contract_types.is_empty()
                    || state.contracts.records.iter().any(|c| {
                        c.record.contract_address == t.contract_address
                            && query.contract_types.contains(&c.record.contract_type)
                    }))
        })
    }

    async fn token_balances(
        &self,
        query: TokenBalanceQuery,
    ) -> Result<Page<TokenBalance>, TransportError> {
        self.state.read().token_balances.paginate(&query.pagination, |b| {
            match_token_balance(
                b,
                &query.contract_addresses,
                &query.account_addresses,
                &query.token_ids,
            )
        })
    }

    async fn token_transfers(
        &self,
        query: TokenTransferQuery,
    ) -> Result<Page<TokenTransfer>, TransportError> {
        self.state.read().token_transfers.paginate(&query.pagination, |t| {
            match_token_transfer(
                t,
                &query.contract_addresses,
                &query.account_addresses,
                &query.token_ids,
            )
        })
    }

    async fn transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<Page<Transaction>, TransportError> {
        self.state.read().transactions.paginate(&query.pagination, |t| {
            query.filter.as_ref().map_or(true, |f| match_transaction(t, f))
        })
    }

    async fn controllers(
        &self,
        query: ControllerQuery,
    ) -> Result<Page<Controller>, TransportError> {
        self.state.read().controllers.paginate(&query.pagination, |c| {
            within(&query.contract_addresses, &c.address) && within(&query.usernames, &c.username)
        })
    }

    async fn activities(&self, query: ActivityQuery) -> Result<Page<Activity>, TransportError> {
        self.state.read().activities.paginate(&query.pagination, |a| {
            match_activity(a, &query.world_addresses, &query.namespaces, &query.caller_addresses)
                && query.from_time.map_or(true, |from| a.session_end >= from)
                && query.to_time.map_or(true, |to| a.session_start <= to)
        })
    }

    async fn achievements(
        &self,
        query: AchievementQuery,
    ) -> Result<Page<Achievement>, TransportError> {
        self.state.read().achievements.paginate(&query.pagination, |a| {
            within(&query.world_addresses, &a.world_address)
                && within(&query.namespaces, &a.namespace)
                && query.hidden.map_or(true, |hidden| a.hidden == hidden)
        })
    }

    async fn player_achievements(
        &self,
        query: PlayerAchievementQuery,
    ) -> Result<Page<PlayerAchievementEntry>, TransportError> {
        let state = self.state.read();
        player_achievements(&state, &query).paginate(&query.pagination, |_| true)
    }

    async fn aggregations(
        &self,
        query: AggregationQuery,
    ) -> Result<Page<AggregationEntry>, TransportError> {
        self.state.read().aggregations.paginate(&query.pagination, |a| {
            match_aggregation(a, &query.aggregator_ids, &query.entity_ids)
        })
    }

    async fn contracts(&self, query: ContractQuery) -> Result<Vec<Contract>, TransportError> {
        let state = self.state.read();
        let mut contracts = state
            .contracts
            .records
            .iter()
            .map(|stored| &stored.record)
            .filter(|c| {
                within(&query.contract_addresses, &c.contract_address)
                    && within(&query.contract_types, &c.contract_type)
            })
            .cloned()
            .collect::<Vec<_>>();
        contracts.sort_by_key(|c| c.contract_address);
        Ok(contracts)
    }

    async fn subscribe(&self, filter: SubscriptionFilter) -> Result<UpdateStream, TransportError> {
        let remote_id = rand::thread_rng().gen::<u64>();
        let (sender, receiver) = channel(self.subscription_buffer_size);

        debug!(target: LOG_TARGET, subscription_id = %remote_id, kind = filter.kind().as_ref(), "New subscriber.");
        self.subscribers.insert(remote_id, Subscriber { filter, sender });

        Ok(UpdateStream {
            remote_id,
            updates: ReceiverStream::new(receiver).boxed(),
        })
    }

    async fn update_subscription(
        &self,
        remote_id: u64,
        filter: SubscriptionFilter,
    ) -> Result<(), TransportError> {
        let mut subscriber = self.subscribers.get_mut(&remote_id).ok_or_else(|| {
            TransportError::Subscription(format!("Unknown subscription: {remote_id}"))
        })?;

        if subscriber.filter.kind() != filter.kind() {
            return Err(TransportError::InvalidQuery(format!(
                "Cannot change subscription kind from {} to {}",
                subscriber.filter.kind().as_ref(),
                filter.kind().as_ref()
            )));
        }

        subscriber.filter = filter;
        debug!(target: LOG_TARGET, subscription_id = %remote_id, "Updated subscriber.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use torii_proto::{AchievementTask, ContractType, Cursor, OrderDirection, PaginationDirection};

    use super::*;

    fn entity(n: u64) -> Entity {
        let at = Utc.timestamp_opt(1_700_000_000 + n as i64, 0).unwrap();
        Entity {
            world_address: Felt::ONE,
            hashed_keys: Felt::from(n),
            keys: vec![Felt::from(n)],
            models: vec![],
            created_at: at,
            updated_at: at,
            executed_at: at,
        }
    }

    /// Entity `n` created at `second` past the base timestamp.
    fn entity_at(n: u64, second: i64) -> Entity {
        let at = Utc.timestamp_opt(1_700_000_000 + second, 0).unwrap();
        Entity { created_at: at, updated_at: at, executed_at: at, ..entity(n) }
    }

    async fn pages(transport: &MemoryTransport, pagination: Pagination) -> Vec<Vec<Entity>> {
        let mut query = Query { pagination, ..Default::default() };
        let mut pages = Vec::new();
        loop {
            let page = transport.entities(query.clone()).await.unwrap();
            pages.push(page.items);
            match page.next_cursor {
                Some(cursor) => {
                    query.pagination.set_cursor(cursor);
                }
                None => break pages,
            }
        }
    }

    fn by_created_at(limit: u32) -> Pagination {
        let mut pagination = Pagination::default();
        pagination.set_limit(limit);
        pagination.add_order_by("created_at", OrderDirection::Asc).unwrap();
        pagination
    }

    #[tokio::test]
    async fn test_unknown_order_by_field() {
        let transport = MemoryTransport::default();
        let mut query = TokenQuery::default();
        query.pagination.add_order_by("colour", OrderDirection::Asc).unwrap();
        assert_matches!(transport.tokens(query).await, Err(TransportError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_garbage_cursor_is_query_error() {
        let transport = MemoryTransport::default();
        let mut query = Query::default();
        query.pagination.set_cursor(Cursor::new("garbage!"));
        assert_matches!(transport.entities(query).await, Err(TransportError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_default_limit() {
        let transport = MemoryTransport::default();
        for n in 0..(DEFAULT_PAGE_LIMIT as u64 + 1) {
            transport.publish(Update::Entity(entity(n)));
        }

        let page = transport.entities(Query::default()).await.unwrap();
        assert_eq!(page.items.len(), DEFAULT_PAGE_LIMIT as usize);
        assert!(page.next_cursor.is_some());
    }

    #[tokio::test]
    async fn test_entity_updates_are_merged() {
        let transport = MemoryTransport::default();
        let model = |name: &str| Struct { name: name.to_string(), children: vec![] };

        let mut first = entity(1);
        first.models = vec![model("ns-Position")];
        let mut second = entity(1);
        second.models = vec![model("ns-Moves")];

        transport.publish(Update::Entity(first));
        transport.publish(Update::Entity(second));

        let page = transport.entities(Query::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].models.len(), 2);

        let query = Query { models: vec!["ns-Moves".to_string()], no_hashed_keys: true, ..Default::default() };
        let page = transport.entities(query).await.unwrap();
        assert_eq!(page.items[0].models, vec![model("ns-Moves")]);
        assert_eq!(page.items[0].hashed_keys, Felt::ZERO);
    }

    #[tokio::test]
    async fn test_backward_walk_is_reverse_of_forward() {
        let transport = MemoryTransport::default();
        for n in 0..7 {
            transport.publish(Update::Entity(entity(n)));
        }

        async fn walk(transport: &MemoryTransport, pagination: Pagination) -> Vec<Felt> {
            let mut query = Query { pagination, ..Default::default() };
            let mut ids = Vec::new();
            loop {
                let page = transport.entities(query.clone()).await.unwrap();
                ids.extend(page.items.iter().map(|e| e.hashed_keys));
                match page.next_cursor {
                    Some(cursor) => {
                        query.pagination.set_cursor(cursor);
                    }
                    None => break ids,
                }
            }
        }

        let forward = walk(&transport, by_created_at(3)).await;
        let mut backward_pagination = by_created_at(3);
        backward_pagination.set_direction(PaginationDirection::Backward);
        let mut backward = walk(&transport, backward_pagination).await;

        assert_eq!(forward.len(), 7);
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn test_pages_walk_every_record_once() {
        let transport = MemoryTransport::default();
        // three records per second, so equal timestamps straddle both page boundaries
        for n in 0..25 {
            transport.publish(Update::Entity(entity_at(n, n as i64 / 3)));
        }

        let pages = pages(&transport, by_created_at(10)).await;
        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![10, 10, 5]);

        let items = pages.concat();
        let ids = items.iter().map(|e| e.hashed_keys).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 25);
        assert!(items.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_cursor_replay_returns_same_page() {
        let transport = MemoryTransport::default();
        for n in 0..25 {
            transport.publish(Update::Entity(entity_at(n, n as i64 / 3)));
        }

        let first = transport
            .entities(Query { pagination: by_created_at(10), ..Default::default() })
            .await
            .unwrap();
        let mut query = Query { pagination: by_created_at(10), ..Default::default() };
        query.pagination.set_cursor(first.next_cursor.unwrap());

        let once = transport.entities(query.clone()).await.unwrap();
        let twice = transport.entities(query).await.unwrap();
        assert_eq!(once.items, twice.items);
        assert_eq!(once.next_cursor, twice.next_cursor);
        assert!(once.items.iter().all(|e| !first.items.contains(e)));
    }

    #[tokio::test]
    async fn test_equal_order_values_across_pages() {
        let transport = MemoryTransport::default();
        for n in 0..25 {
            transport.publish(Update::Entity(entity_at(n, 0)));
        }

        let mut pagination = Pagination::default();
        pagination.set_limit(10);
        pagination.add_order_by("created_at", OrderDirection::Desc).unwrap();
        let pages = pages(&transport, pagination).await;

        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![10, 10, 5]);
        // ties fall back to insertion order
        let ids = pages.concat().iter().map(|e| e.hashed_keys).collect::<Vec<_>>();
        assert_eq!(ids, (0..25_u64).map(Felt::from).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_subscriber_receives_matching_updates() {
        let transport = MemoryTransport::default();
        let mut stream = transport
            .subscribe(SubscriptionFilter::Entities {
                clause: Some(torii_proto::Clause::HashedKeys(vec![Felt::TWO])),
                world_addresses: vec![],
            })
            .await
            .unwrap();

        transport.publish(Update::Entity(entity(1)));
        transport.publish(Update::Entity(entity(2)));

        let update = tokio::time::timeout(Duration::from_secs(1), stream.updates.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_matches!(update, Update::Entity(e) if e.hashed_keys == Felt::TWO);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped() {
        let transport = MemoryTransport::new(&ClientConfig::default().with_subscription_buffer_size(1));
        let stream = transport
            .subscribe(SubscriptionFilter::Entities { clause: None, world_addresses: vec![] })
            .await
            .unwrap();

        transport.publish(Update::Entity(entity(1)));
        assert_eq!(transport.subscriber_count(), 1);
        transport.publish(Update::Entity(entity(2)));
        assert_eq!(transport.subscriber_count(), 0);

        drop(stream);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned_without_a_match() {
        let transport = MemoryTransport::default();
        let stream = transport
            .subscribe(SubscriptionFilter::Entities {
                clause: Some(torii_proto::Clause::HashedKeys(vec![Felt::ONE])),
                world_addresses: vec![],
            })
            .await
            .unwrap();
        assert_eq!(transport.subscriber_count(), 1);

        drop(stream);
        for n in 2..5 {
            transport.publish(Update::Entity(entity(n)));
        }
        assert_eq!(transport.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_update_subscription_checks_kind() {
        let transport = MemoryTransport::default();
        let stream = transport
            .subscribe(SubscriptionFilter::Events { keys: vec![] })
            .await
            .unwrap();

        assert_matches!(
            transport
                .update_subscription(stream.remote_id, SubscriptionFilter::Transactions { filter: None })
                .await,
            Err(TransportError::InvalidQuery(_))
        );
        assert_matches!(
            transport
                .update_subscription(stream.remote_id.wrapping_add(1), SubscriptionFilter::Events { keys: vec![] })
                .await,
            Err(TransportError::Subscription(_))
        );
    }

    fn achievement(id: &str, points: u32, tasks: &[(&str, u32)]) -> Achievement {
        Achievement {
            id: id.to_string(),
            world_address: Felt::ONE,
            namespace: "ns".to_string(),
            entity_id: id.to_string(),
            hidden: false,
            index: 0,
            points,
            group: "combat".to_string(),
            icon: String::new(),
            title: id.to_string(),
            description: String::new(),
            tasks: tasks
                .iter()
                .map(|(task_id, total)| AchievementTask {
                    task_id: task_id.to_string(),
                    description: String::new(),
                    total: *total,
                })
                .collect(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn progression(player: Felt, achievement_id: &str, task_id: &str, count: u32, total: u32) -> AchievementProgression {
        let at = Utc.timestamp_opt(1_700_000_000 + count as i64, 0).unwrap();
        let completed = count >= total;
        AchievementProgression {
            id: format!("{player:#x}:{achievement_id}:{task_id}"),
            achievement_id: achievement_id.to_string(),
            task_id: task_id.to_string(),
            world_address: Felt::ONE,
            namespace: "ns".to_string(),
            player_id: player,
            count,
            completed,
            completed_at: completed.then_some(at),
            created_at: at,
            updated_at: at,
        }
    }

    fn aggregation(aggregator_id: &str, entity_id: &str, value: u64) -> AggregationEntry {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        AggregationEntry {
            id: format!("{aggregator_id}:{entity_id}"),
            aggregator_id: aggregator_id.to_string(),
            entity_id: entity_id.to_string(),
            value: U256::from_u64(value),
            display_value: value.to_string(),
            position: 0,
            model_id: "0x1".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn contract(address: Felt, contract_type: ContractType) -> Contract {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Contract {
            contract_address: address,
            contract_type,
            head: Some(100),
            tps: None,
            last_block_timestamp: None,
            last_pending_block_tx: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_player_achievement_stats() {
        let transport = MemoryTransport::default();
        transport.insert_achievement(achievement("first-blood", 10, &[("kill", 1)]));
        transport.insert_achievement(achievement("marathon", 30, &[("walk", 10), ("run", 4)]));
        transport.insert_achievement(achievement("empty", 5, &[]));

        let alice = Felt::from(0xa_u8);
        let bob = Felt::from(0xb_u8);
        transport.publish(Update::AchievementProgression(progression(alice, "first-blood", "kill", 1, 1)));
        transport.publish(Update::AchievementProgression(progression(alice, "marathon", "walk", 5, 10)));
        transport.publish(Update::AchievementProgression(progression(bob, "marathon", "walk", 10, 10)));
        transport.publish(Update::AchievementProgression(progression(bob, "marathon", "run", 4, 4)));

        let page = transport.player_achievements(PlayerAchievementQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_cursor.is_none());

        let alice_entry = &page.items[0];
        assert_eq!(alice_entry.player_address, alice);
        assert_eq!(alice_entry.stats.total_points, 10);
        assert_eq!(alice_entry.stats.completed_achievements, 1);
        assert_eq!(alice_entry.stats.total_achievements, 3);
        assert_eq!(
            alice_entry.stats.last_achievement_at,
            Some(Utc.timestamp_opt(1_700_000_001, 0).unwrap())
        );

        let marathon = alice_entry
            .achievements
            .iter()
            .find(|a| a.achievement.id == "marathon")
            .unwrap();
        assert!(!marathon.completed);
        assert_eq!(marathon.progress_percentage, 25.0);
        assert_eq!(marathon.task_progress[1], TaskProgress { task_id: "run".to_string(), count: 0, completed: false });

        let empty = alice_entry.achievements.iter().find(|a| a.achievement.id == "empty").unwrap();
        assert!(!empty.completed);
        assert_eq!(empty.progress_percentage, 0.0);

        let bob_entry = &page.items[1];
        assert_eq!(bob_entry.stats.total_points, 30);
        assert_eq!(bob_entry.stats.completed_achievements, 1);

        let query = PlayerAchievementQuery { player_addresses: vec![bob], ..Default::default() };
        let page = transport.player_achievements(query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].player_address, bob);
    }

    #[tokio::test]
    async fn test_progressions_are_stored_by_id() {
        let transport = MemoryTransport::default();
        transport.insert_achievement(achievement("marathon", 30, &[("walk", 10)]));

        let player = Felt::from(0xa_u8);
        transport.publish(Update::AchievementProgression(progression(player, "marathon", "walk", 3, 10)));
        transport.publish(Update::AchievementProgression(progression(player, "marathon", "walk", 10, 10)));

        let page = transport.player_achievements(PlayerAchievementQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        let progress = &page.items[0].achievements[0];
        assert!(progress.completed);
        assert_eq!(progress.task_progress[0].count, 10);
        assert_eq!(page.items[0].stats.completion_percentage, 100.0);
    }

    #[tokio::test]
    async fn test_aggregations_query_and_subscription() {
        let transport = MemoryTransport::default();
        let mut stream = transport
            .subscribe(SubscriptionFilter::Aggregations {
                aggregator_ids: vec!["kills".to_string()],
                entity_ids: vec![],
            })
            .await
            .unwrap();

        transport.publish(Update::Aggregation(aggregation("deaths", "0x1", 2)));
        transport.publish(Update::Aggregation(aggregation("kills", "0x1", 3)));
        transport.publish(Update::Aggregation(aggregation("kills", "0x1", 5)));
        transport.publish(Update::Aggregation(aggregation("kills", "0x2", 4)));

        let mut values = Vec::new();
        for _ in 0..3 {
            let update = stream.updates.next().await.unwrap().unwrap();
            let entry = assert_matches!(update, Update::Aggregation(entry) => entry);
            assert_eq!(entry.aggregator_id, "kills");
            values.push(entry.display_value);
        }
        assert_eq!(values, ["3", "5", "4"]);

        let mut query = AggregationQuery { aggregator_ids: vec!["kills".to_string()], ..Default::default() };
        query.pagination.add_order_by("value", OrderDirection::Desc).unwrap();
        let page = transport.aggregations(query).await.unwrap();
        let ids = page.items.iter().map(|a| a.entity_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["0x1", "0x2"]);
        assert_eq!(page.items[0].value, U256::from_u64(5));

        let query = AggregationQuery { entity_ids: vec!["0x2".to_string()], ..Default::default() };
        assert_eq!(transport.aggregations(query).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_contracts_and_token_contract_types() {
        let transport = MemoryTransport::default();
        let token = |address: Felt, symbol: &str| TokenContract {
            contract_address: address,
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            decimals: 18,
            metadata: String::new(),
            token_metadata: String::new(),
            total_supply: None,
        };

        let three = Felt::from(3_u8);
        transport.publish(Update::Contract(contract(three, ContractType::Erc721)));
        transport.publish(Update::Contract(contract(Felt::TWO, ContractType::Erc20)));
        transport.publish(Update::Contract(contract(Felt::ONE, ContractType::World)));
        let mut moved = contract(Felt::TWO, ContractType::Erc20);
        moved.head = Some(200);
        transport.publish(Update::Contract(moved));

        transport.insert_token_contract(token(Felt::TWO, "GOLD"));
        transport.insert_token_contract(token(three, "SWORD"));
        transport.insert_token_contract(token(Felt::from(9_u8), "UNKNOWN"));

        let contracts = transport.contracts(ContractQuery::default()).await.unwrap();
        let addresses = contracts.iter().map(|c| c.contract_address).collect::<Vec<_>>();
        assert_eq!(addresses, [Felt::ONE, Felt::TWO, three]);
        assert_eq!(contracts[1].head, Some(200));

        let query = ContractQuery { contract_types: vec![ContractType::World], ..Default::default() };
        let contracts = transport.contracts(query).await.unwrap();
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].contract_address, Felt::ONE);

        let page = transport.token_contracts(TokenContractQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 3);

        let query = TokenContractQuery { contract_types: vec![ContractType::Erc20], ..Default::default() };
        let page = transport.token_contracts(query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].symbol, "GOLD");
    }
}
