use crypto_bigint::U256;
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;
use strum_macros::{AsRefStr, EnumIter};

use crate::clause::{Clause, KeysClause};
use crate::error::ProtoError;
use crate::query::TransactionFilter;
use crate::schema::{Entity, EventMessage, ModelSchema, NoSchema};
use crate::{
    AchievementProgression, Activity, AggregationEntry, Contract, Event, Token, TokenBalance,
    TokenTransfer, Transaction,
};

#[derive(Debug, AsRefStr, EnumIter, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Copy)]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionKind {
    Entity,
    EventMessage,
    Event,
    Token,
    TokenBalance,
    TokenTransfer,
    Transaction,
    Activity,
    AchievementProgression,
    Aggregation,
    Contract,
}

/// What a live subscription listens to. Empty lists match everything.
#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub enum SubscriptionFilter {
    Entities {
        clause: Option<Clause>,
        world_addresses: Vec<Felt>,
    },
    EventMessages {
        clause: Option<Clause>,
        world_addresses: Vec<Felt>,
    },
    /// An event matches if any of the clauses matches its keys.
    Events { keys: Vec<KeysClause> },
    Tokens {
        contract_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
    },
    TokenBalances {
        contract_addresses: Vec<Felt>,
        account_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
    },
    TokenTransfers {
        contract_addresses: Vec<Felt>,
        account_addresses: Vec<Felt>,
        token_ids: Vec<U256>,
    },
    Transactions { filter: Option<TransactionFilter> },
    Activities {
        world_addresses: Vec<Felt>,
        namespaces: Vec<String>,
        caller_addresses: Vec<Felt>,
    },
    AchievementProgressions {
        world_addresses: Vec<Felt>,
        namespaces: Vec<String>,
        player_addresses: Vec<Felt>,
        achievement_ids: Vec<String>,
    },
    Aggregations {
        aggregator_ids: Vec<String>,
        entity_ids: Vec<String>,
    },
    Contracts { contract_addresses: Vec<Felt> },
}

impl SubscriptionFilter {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            SubscriptionFilter::Entities { .. } => SubscriptionKind::Entity,
            SubscriptionFilter::EventMessages { .. } => SubscriptionKind::EventMessage,
            SubscriptionFilter::Events { .. } => SubscriptionKind::Event,
            SubscriptionFilter::Tokens { .. } => SubscriptionKind::Token,
            SubscriptionFilter::TokenBalances { .. } => SubscriptionKind::TokenBalance,
            SubscriptionFilter::TokenTransfers { .. } => SubscriptionKind::TokenTransfer,
            SubscriptionFilter::Transactions { .. } => SubscriptionKind::Transaction,
            SubscriptionFilter::Activities { .. } => SubscriptionKind::Activity,
            SubscriptionFilter::AchievementProgressions { .. } => {
                SubscriptionKind::AchievementProgression
            }
            SubscriptionFilter::Aggregations { .. } => SubscriptionKind::Aggregation,
            SubscriptionFilter::Contracts { .. } => SubscriptionKind::Contract,
        }
    }

    pub fn validate<S: ModelSchema + ?Sized>(&self, schema: &S) -> Result<(), ProtoError> {
        match self {
            SubscriptionFilter::Entities { clause: Some(clause), .. }
            | SubscriptionFilter::EventMessages { clause: Some(clause), .. } => {
                clause.validate(schema)
            }
            SubscriptionFilter::Events { keys } => {
                keys.iter().try_for_each(|k| k.validate(&NoSchema))
            }
            _ => Ok(()),
        }
    }
}

/// A record pushed to a subscriber.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub enum Update {
    Entity(Entity),
    EventMessage(EventMessage),
    Event(Event),
    Token(Token),
    TokenBalance(TokenBalance),
    TokenTransfer(TokenTransfer),
    Transaction(Transaction),
    Activity(Activity),
    AchievementProgression(AchievementProgression),
    Aggregation(AggregationEntry),
    Contract(Contract),
}

impl Update {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            Update::Entity(_) => SubscriptionKind::Entity,
            Update::EventMessage(_) => SubscriptionKind::EventMessage,
            Update::Event(_) => SubscriptionKind::Event,
            Update::Token(_) => SubscriptionKind::Token,
            Update::TokenBalance(_) => SubscriptionKind::TokenBalance,
            Update::TokenTransfer(_) => SubscriptionKind::TokenTransfer,
            Update::Transaction(_) => SubscriptionKind::Transaction,
            Update::Activity(_) => SubscriptionKind::Activity,
            Update::AchievementProgression(_) => SubscriptionKind::AchievementProgression,
            Update::Aggregation(_) => SubscriptionKind::Aggregation,
            Update::Contract(_) => SubscriptionKind::Contract,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_kind() {
        let filter = SubscriptionFilter::Events { keys: vec![] };
        assert_eq!(filter.kind(), SubscriptionKind::Event);
        assert_eq!(filter.kind().as_ref(), "event");
        assert_eq!(
            Update::Entity(Entity::default()).kind(),
            SubscriptionKind::Entity
        );
        assert_eq!(
            SubscriptionKind::AchievementProgression.as_ref(),
            "achievement_progression"
        );
    }
}
