//! Client handles.
//!
//! Each handle owns a multi thread runtime; blocking calls drive the async
//! client with `block_on`. Subscription callbacks run on runtime threads.

use std::ffi::{c_char, c_void, CString};
use std::sync::Arc;

use serde::Serialize;
use starknet::core::types::Felt;
use tokio::runtime::Runtime;
use torii_client::{
    Client, ClientConfig, DojoError, ErrorType, MemoryTransport, SubscriptionCallback,
    UpdateCallback,
};
use torii_proto::{
    AchievementQuery, ActivityQuery, AggregationQuery, Clause, ContractQuery, ControllerQuery,
    EventQuery, PlayerAchievementQuery, Query, SubscriptionFilter, SubscriptionKind,
    TokenBalanceQuery, TokenContractQuery, TokenQuery, TokenTransferQuery, TransactionQuery,
    Update, World,
};
use tracing::warn;

use crate::types::{
    json_arg, json_arg_or_default, mut_arg, ref_arg, slice_arg, str_arg, take_arg, FfiResult,
    FieldElement, Result,
};
use crate::write::DojoWrite;
use crate::{ffi_guard, ffi_guard_void, LOG_TARGET};

pub struct ToriiClient {
    // dropped before the runtime so subscriptions are cancelled first
    inner: Client,
    transport: Arc<MemoryTransport>,
    runtime: Runtime,
}

/// Receives one record as a JSON string, valid only during the call.
pub type UpdateCallbackFn = unsafe extern "C" fn(user_data: *mut c_void, update: *const c_char);

/// Receives a stream error, valid only during the call.
pub type ErrorCallbackFn =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *const DojoError)>;

#[derive(Clone, Copy)]
struct UserData(*mut c_void);

// The caller guarantees `user_data` can be used from runtime threads.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

struct CCallback {
    on_update: UpdateCallbackFn,
    on_error: ErrorCallbackFn,
    user_data: UserData,
}

impl CCallback {
    fn report(&self, error: &DojoError) {
        match self.on_error {
            Some(on_error) => unsafe { on_error(self.user_data.0, error) },
            None => warn!(target: LOG_TARGET, error = %error, "Unhandled subscription error."),
        }
    }
}

impl<T: Serialize> UpdateCallback<T> for CCallback {
    fn on_update(&self, update: T) {
        let json = serde_json::to_string(&update)
            .map_err(|e| DojoError::new(ErrorType::ParseError, e.to_string()))
            .and_then(|json| {
                CString::new(json).map_err(|e| DojoError::new(ErrorType::ParseError, e.to_string()))
            });

        match json {
            Ok(json) => unsafe { (self.on_update)(self.user_data.0, json.as_ptr()) },
            Err(e) => self.report(&e),
        }
    }

    fn on_error(&self, error: DojoError) {
        self.report(&error);
    }
}

fn callback_for(kind: SubscriptionKind, callback: Arc<CCallback>) -> SubscriptionCallback {
    match kind {
        SubscriptionKind::Entity => SubscriptionCallback::Entity(callback),
        SubscriptionKind::EventMessage => SubscriptionCallback::EventMessage(callback),
        SubscriptionKind::Event => SubscriptionCallback::Event(callback),
        SubscriptionKind::Token => SubscriptionCallback::Token(callback),
        SubscriptionKind::TokenBalance => SubscriptionCallback::TokenBalance(callback),
        SubscriptionKind::TokenTransfer => SubscriptionCallback::TokenTransfer(callback),
        SubscriptionKind::Transaction => SubscriptionCallback::Transaction(callback),
        SubscriptionKind::Activity => SubscriptionCallback::Activity(callback),
        SubscriptionKind::AchievementProgression => {
            SubscriptionCallback::AchievementProgression(callback)
        }
        SubscriptionKind::Aggregation => SubscriptionCallback::Aggregation(callback),
        SubscriptionKind::Contract => SubscriptionCallback::Contract(callback),
    }
}

/// # Safety
/// `ptr` is null when `len` is 0, or points to `len` NUL terminated strings.
unsafe fn strings_arg(ptr: *const *const c_char, len: usize, name: &str) -> FfiResult<Vec<String>> {
    unsafe { slice_arg(ptr, len, name) }?
        .iter()
        .map(|s| unsafe { str_arg(*s, name) }.map(str::to_string))
        .collect()
}

/// # Safety
/// `ptr` is null when `len` is 0, or points to `len` field elements.
unsafe fn felts_arg(ptr: *const FieldElement, len: usize, name: &str) -> FfiResult<Vec<Felt>> {
    Ok(unsafe { slice_arg(ptr, len, name) }?.iter().map(|a| Felt::from(*a)).collect())
}

/// Creates a client backed by an in-process indexer.
///
/// `config` is a JSON `ClientConfig` or null for the defaults.
///
/// # Safety
/// `config` is null or a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn client_new_memory(config: *const c_char) -> Result<*mut ToriiClient> {
    ffi_guard(|| {
        let config: ClientConfig = unsafe { json_arg_or_default(config, "config") }?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("torii-client")
            .build()
            .map_err(|e| DojoError::new(ErrorType::RuntimeError, e.to_string()))?;

        let transport = Arc::new(MemoryTransport::new(&config));
        let inner = Client::new(transport.clone(), config);
        Ok(Box::into_raw(Box::new(ToriiClient { inner, transport, runtime })))
    })
}

/// Registers the metadata of a world, given as JSON.
///
/// # Safety
/// `client` is a live client and `world` a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn client_register_world(
    client: *mut ToriiClient,
    world: *const c_char,
) -> Result<bool> {
    ffi_guard(|| {
        let client = unsafe { ref_arg(client, "client") }?;
        let world: World = unsafe { json_arg(world, "world") }?;
        client.transport.register_world(world);
        Ok(true)
    })
}

/// Stores a record, given as a JSON `Update`, and pushes it to matching
/// subscriptions.
///
/// # Safety
/// `client` is a live client and `update` a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn client_publish(client: *mut ToriiClient, update: *const c_char) -> Result<bool> {
    ffi_guard(|| {
        let client = unsafe { ref_arg(client, "client") }?;
        let update: Update = unsafe { json_arg(update, "update") }?;
        client.transport.publish(update);
        Ok(true)
    })
}

/// Appends the JSON metadata of the given worlds to `write`, or of every world
/// if `len` is 0.
///
/// # Safety
/// `client` and `write` are live handles, `world_addresses` points to `len`
/// field elements.
#[no_mangle]
pub unsafe extern "C" fn client_worlds(
    client: *mut ToriiClient,
    world_addresses: *const FieldElement,
    len: usize,
    write: *mut DojoWrite,
) -> Result<usize> {
    ffi_guard(|| {
        let client = unsafe { ref_arg(client, "client") }?;
        let addresses = unsafe { felts_arg(world_addresses, len, "world_addresses") }?;
        let worlds = client.runtime.block_on(client.inner.worlds(addresses))?;
        unsafe { mut_arg(write, "write") }?.write_json(&worlds)
    })
}

/// Appends a JSON page of entities to `write`.
///
/// # Safety
/// `client`, `query` and `write` are live handles.
#[no_mangle]
pub unsafe extern "C" fn client_entities(
    client: *mut ToriiClient,
    query: *const Query,
    write: *mut DojoWrite,
) -> Result<usize> {
    ffi_guard(|| {
        let client = unsafe { ref_arg(client, "client") }?;
        let query = unsafe { ref_arg(query, "query") }?.clone();
        let page = client.runtime.block_on(client.inner.entities(query))?;
        unsafe { mut_arg(write, "write") }?.write_json(&page)
    })
}

/// Appends a JSON page of event messages to `write`.
///
/// # Safety
/// `client`, `query` and `write` are live handles.
#[no_mangle]
pub unsafe extern "C" fn client_event_messages(
    client: *mut ToriiClient,
    query: *const Query,
    write: *mut DojoWrite,
) -> Result<usize> {
    ffi_guard(|| {
        let client = unsafe { ref_arg(client, "client") }?;
        let query = unsafe { ref_arg(query, "query") }?.clone();
        let page = client.runtime.block_on(client.inner.event_messages(query))?;
        unsafe { mut_arg(write, "write") }?.write_json(&page)
    })
}

/// Queries taking their query as JSON (null for the default query) and
/// appending the JSON result, usually a page, to `write`.
macro_rules! json_queries {
    ($($name:ident => $method:ident($query:ty);)*) => {
        $(
            /// # Safety
            /// `client` and `write` are live handles, `query` is null or a NUL
            /// terminated string.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                client: *mut ToriiClient,
                query: *const c_char,
                write: *mut DojoWrite,
            ) -> Result<usize> {
                ffi_guard(|| {
                    let client = unsafe { ref_arg(client, "client") }?;
                    let query: $query = unsafe { json_arg_or_default(query, "query") }?;
                    let result = client.runtime.block_on(client.inner.$method(query))?;
                    unsafe { mut_arg(write, "write") }?.write_json(&result)
                })
            }
        )*
    };
}

json_queries! {
    client_starknet_events => starknet_events(EventQuery);
    client_tokens => tokens(TokenQuery);
    client_token_contracts => token_contracts(TokenContractQuery);
    client_token_balances => token_balances(TokenBalanceQuery);
    client_token_transfers => token_transfers(TokenTransferQuery);
    client_transactions => transactions(TransactionQuery);
    client_controllers => controllers(ControllerQuery);
    client_activities => activities(ActivityQuery);
    client_achievements => achievements(AchievementQuery);
    client_player_achievements => player_achievements(PlayerAchievementQuery);
    client_aggregations => aggregations(AggregationQuery);
    client_contracts => contracts(ContractQuery);
}

unsafe fn subscribe(
    client: *mut ToriiClient,
    filter: SubscriptionFilter,
    on_update: UpdateCallbackFn,
    on_error: ErrorCallbackFn,
    user_data: *mut c_void,
) -> FfiResult<u64> {
    let client = unsafe { ref_arg(client, "client") }?;
    let callback = Arc::new(CCallback { on_update, on_error, user_data: UserData(user_data) });
    let callback = callback_for(filter.kind(), callback);
    Ok(client.runtime.block_on(client.inner.subscribe(filter, callback))?)
}

/// Subscribes to entity updates. `clause` is consumed and may be null to
/// match every entity. Returns the subscription id.
///
/// # Safety
/// `client` is a live client, `clause` is null or a clause not consumed yet,
/// `world_addresses` points to `len` field elements. `user_data` must stay
/// valid until the subscription is cancelled.
#[no_mangle]
pub unsafe extern "C" fn client_on_entity_update(
    client: *mut ToriiClient,
    clause: *mut Clause,
    world_addresses: *const FieldElement,
    len: usize,
    on_update: UpdateCallbackFn,
    on_error: ErrorCallbackFn,
    user_data: *mut c_void,
) -> Result<u64> {
    ffi_guard(|| {
        let clause = if clause.is_null() { None } else { Some(unsafe { take_arg(clause, "clause") }?) };
        let world_addresses = unsafe { felts_arg(world_addresses, len, "world_addresses") }?;
        let filter = SubscriptionFilter::Entities { clause, world_addresses };
        unsafe { subscribe(client, filter, on_update, on_error, user_data) }
    })
}

/// Subscribes to aggregation entries. Empty id lists match every entry.
///
/// # Safety
/// `client` is a live client, `aggregator_ids` and `entity_ids` point to
/// their length of NUL terminated strings. `user_data` must stay valid until
/// the subscription is cancelled.
#[no_mangle]
pub unsafe extern "C" fn client_on_aggregation_update(
    client: *mut ToriiClient,
    aggregator_ids: *const *const c_char,
    aggregator_ids_len: usize,
    entity_ids: *const *const c_char,
    entity_ids_len: usize,
    on_update: UpdateCallbackFn,
    on_error: ErrorCallbackFn,
    user_data: *mut c_void,
) -> Result<u64> {
    ffi_guard(|| {
        let aggregator_ids =
            unsafe { strings_arg(aggregator_ids, aggregator_ids_len, "aggregator_ids") }?;
        let entity_ids = unsafe { strings_arg(entity_ids, entity_ids_len, "entity_ids") }?;
        let filter = SubscriptionFilter::Aggregations { aggregator_ids, entity_ids };
        unsafe { subscribe(client, filter, on_update, on_error, user_data) }
    })
}

/// Subscribes to the indexing state of contracts, or of every contract if
/// `len` is 0.
///
/// # Safety
/// `client` is a live client and `contract_addresses` points to `len` field
/// elements. `user_data` must stay valid until the subscription is cancelled.
#[no_mangle]
pub unsafe extern "C" fn client_on_contract_update(
    client: *mut ToriiClient,
    contract_addresses: *const FieldElement,
    len: usize,
    on_update: UpdateCallbackFn,
    on_error: ErrorCallbackFn,
    user_data: *mut c_void,
) -> Result<u64> {
    ffi_guard(|| {
        let contract_addresses = unsafe { felts_arg(contract_addresses, len, "contract_addresses") }?;
        let filter = SubscriptionFilter::Contracts { contract_addresses };
        unsafe { subscribe(client, filter, on_update, on_error, user_data) }
    })
}

/// Subscribes with a JSON `SubscriptionFilter` of any kind. Records are
/// passed to `on_update` as JSON. Returns the subscription id.
///
/// # Safety
/// `client` is a live client and `filter` a NUL terminated string.
/// `user_data` must stay valid until the subscription is cancelled.
#[no_mangle]
pub unsafe extern "C" fn client_subscribe(
    client: *mut ToriiClient,
    filter: *const c_char,
    on_update: UpdateCallbackFn,
    on_error: ErrorCallbackFn,
    user_data: *mut c_void,
) -> Result<u64> {
    ffi_guard(|| {
        let filter: SubscriptionFilter = unsafe { json_arg(filter, "filter") }?;
        unsafe { subscribe(client, filter, on_update, on_error, user_data) }
    })
}

/// Replaces the filter of a subscription with a JSON `SubscriptionFilter` of
/// the same kind.
///
/// # Safety
/// `client` is a live client and `filter` a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn client_update_subscription(
    client: *mut ToriiClient,
    subscription_id: u64,
    filter: *const c_char,
) -> Result<bool> {
    ffi_guard(|| {
        let client = unsafe { ref_arg(client, "client") }?;
        let filter: SubscriptionFilter = unsafe { json_arg(filter, "filter") }?;
        client.runtime.block_on(client.inner.update_subscription(subscription_id, filter))?;
        Ok(true)
    })
}

/// Cancels a subscription. No callback for it starts after this returns.
///
/// # Safety
/// `client` is a live client.
#[no_mangle]
pub unsafe extern "C" fn client_cancel_subscription(
    client: *mut ToriiClient,
    subscription_id: u64,
) -> Result<bool> {
    ffi_guard(|| {
        unsafe { ref_arg(client, "client") }?.inner.cancel_subscription(subscription_id)?;
        Ok(true)
    })
}

/// Cancels every subscription of the client and releases it.
///
/// # Safety
/// `client` is null or a client not destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn client_destroy(client: *mut ToriiClient) {
    ffi_guard_void(|| drop(unsafe { take_arg(client, "client") }));
}
