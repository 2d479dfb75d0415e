//! Clause and filter evaluation against in-memory records.

use std::cmp::Ordering;
use std::mem::discriminant;

use crypto_bigint::U256;
use starknet::core::types::Felt;
use torii_proto::schema::{Entity, Struct, Ty};
use torii_proto::{
    AchievementProgression, Activity, AggregationEntry, Clause, ComparisonOperator, KeysClause, LogicalOperator,
    MemberClause, MemberValue, PatternMatching, SubscriptionFilter, Token, TokenBalance,
    TokenTransfer, Transaction, TransactionFilter, Update,
};

/// An empty list places no constraint.
pub(crate) fn within<T: PartialEq>(list: &[T], value: &T) -> bool {
    list.is_empty() || list.contains(value)
}

/// Token ids only constrain records that carry one.
pub(crate) fn within_token_ids(list: &[U256], token_id: &Option<U256>) -> bool {
    match token_id {
        Some(id) => within(list, id),
        None => list.is_empty(),
    }
}

/// Matches a model tag (`namespace-name`) against a clause model pattern.
///
/// A pattern without namespace matches the model name in any namespace, and
/// `*` matches any namespace or name.
pub(crate) fn match_model(pattern: &str, tag: &str) -> bool {
    let (namespace, name) = pattern.split_once('-').unwrap_or(("*", pattern));
    let (tag_namespace, tag_name) = tag.split_once('-').unwrap_or(("", tag));

    (namespace == "*" || namespace == tag_namespace) && (name == "*" || name == tag_name)
}

pub(crate) fn match_entity<const EVENT_MESSAGE: bool>(
    entity: &Entity<EVENT_MESSAGE>,
    clause: &Clause,
) -> bool {
    match clause {
        Clause::HashedKeys(hashed_keys) => {
            hashed_keys.is_empty() || hashed_keys.contains(&entity.hashed_keys)
        }
        Clause::Keys(clause) => {
            if !clause.models.is_empty()
                && !entity.models.iter().any(|model| {
                    clause
                        .models
                        .iter()
                        .any(|pattern| match_model(pattern, &model.name))
                })
            {
                return false;
            }

            match_key_pattern(&entity.keys, clause)
        }
        Clause::Member(clause) => entity
            .models
            .iter()
            .filter(|model| match_model(&clause.model, &model.name))
            .any(|model| match_member(model, clause)),
        Clause::Composite(composite) => match composite.operator {
            LogicalOperator::And => composite.clauses.iter().all(|c| match_entity(entity, c)),
            LogicalOperator::Or => composite.clauses.iter().any(|c| match_entity(entity, c)),
        },
    }
}

fn match_key_pattern(keys: &[Felt], clause: &KeysClause) -> bool {
    // ["", "0x0"] would match with keys ["0x...", "0x0", ...]
    if clause.pattern_matching == PatternMatching::FixedLen && keys.len() != clause.keys.len() {
        return false;
    }
    // every pattern position needs a key, wildcards included
    if keys.len() < clause.keys.len() {
        return false;
    }

    clause.keys.iter().zip(keys).all(|(sub_key, key)| match sub_key {
        Some(sub_key) => key == sub_key,
        None => true,
    })
}

/// An empty set of clauses matches every key list.
pub(crate) fn match_keys(keys: &[Felt], clauses: &[KeysClause]) -> bool {
    clauses.is_empty() || clauses.iter().any(|clause| match_key_pattern(keys, clause))
}

/// Walks a dot separated member path. Tuple and array elements are addressed
/// by index, enum payloads by the name of the selected option.
fn resolve<'a>(model: &'a Struct, path: &str) -> Option<&'a Ty> {
    let mut parts = path.split('.');
    let mut current = model.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Ty::Struct(s) => s.get(part)?,
            Ty::Tuple(items) | Ty::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            Ty::Enum(e) => {
                let option = e.option()?;
                if option.name != part {
                    return None;
                }
                &option.ty
            }
            Ty::Primitive(_) | Ty::ByteArray(_) => return None,
        };
    }

    Some(current)
}

fn match_member(model: &Struct, clause: &MemberClause) -> bool {
    match resolve(model, &clause.member) {
        Some(ty) => compare(ty, clause.operator, &clause.value),
        None => false,
    }
}

/// Orders a stored value against a clause value of the same type.
fn order(ty: &Ty, value: &MemberValue) -> Option<Ordering> {
    match (ty, value) {
        (Ty::Primitive(a), MemberValue::Primitive(b)) if discriminant(a) == discriminant(b) => {
            Some(a.cmp(b))
        }
        (Ty::ByteArray(a), MemberValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Ty::Enum(e), MemberValue::String(b)) => e.option().map(|o| o.name.as_str().cmp(b)),
        _ => None,
    }
}

fn equals(ty: &Ty, value: &MemberValue) -> bool {
    order(ty, value) == Some(Ordering::Equal)
}

fn array_length(ty: &Ty, value: &MemberValue) -> Option<(u128, u128)> {
    match (ty, value) {
        (Ty::Array(items), MemberValue::Primitive(p)) => Some((items.len() as u128, p.as_unsigned()?)),
        _ => None,
    }
}

pub(crate) fn compare(ty: &Ty, operator: ComparisonOperator, value: &MemberValue) -> bool {
    match operator {
        ComparisonOperator::Eq => equals(ty, value),
        ComparisonOperator::Neq => matches!(order(ty, value), Some(o) if o != Ordering::Equal),
        ComparisonOperator::Gt => order(ty, value) == Some(Ordering::Greater),
        ComparisonOperator::Gte => {
            matches!(order(ty, value), Some(Ordering::Greater | Ordering::Equal))
        }
        ComparisonOperator::Lt => order(ty, value) == Some(Ordering::Less),
        ComparisonOperator::Lte => matches!(order(ty, value), Some(Ordering::Less | Ordering::Equal)),
        ComparisonOperator::In => match value {
            MemberValue::List(values) => values.iter().any(|v| equals(ty, v)),
            _ => false,
        },
        ComparisonOperator::NotIn => match value {
            MemberValue::List(values) => !values.iter().any(|v| equals(ty, v)),
            _ => false,
        },
        ComparisonOperator::Contains => match (ty, value) {
            (Ty::Array(items), value) => items.iter().any(|item| equals(item, value)),
            (Ty::ByteArray(s), MemberValue::String(needle)) => s.contains(needle.as_str()),
            _ => false,
        },
        ComparisonOperator::ContainsAll => match (ty, value) {
            (Ty::Array(items), MemberValue::List(values)) => values
                .iter()
                .all(|v| items.iter().any(|item| equals(item, v))),
            _ => false,
        },
        ComparisonOperator::ContainsAny => match (ty, value) {
            (Ty::Array(items), MemberValue::List(values)) => values
                .iter()
                .any(|v| items.iter().any(|item| equals(item, v))),
            _ => false,
        },
        ComparisonOperator::ArrayLengthEq => {
            array_length(ty, value).is_some_and(|(len, expected)| len == expected)
        }
        ComparisonOperator::ArrayLengthGt => {
            array_length(ty, value).is_some_and(|(len, expected)| len > expected)
        }
        ComparisonOperator::ArrayLengthLt => {
            array_length(ty, value).is_some_and(|(len, expected)| len < expected)
        }
    }
}

pub(crate) fn match_token(token: &Token, contract_addresses: &[Felt], token_ids: &[U256]) -> bool {
    within(contract_addresses, &token.contract_address)
        && within_token_ids(token_ids, &token.token_id)
}

pub(crate) fn match_token_balance(
    balance: &TokenBalance,
    contract_addresses: &[Felt],
    account_addresses: &[Felt],
    token_ids: &[U256],
) -> bool {
    within(contract_addresses, &balance.contract_address)
        && within(account_addresses, &balance.account_address)
        && within_token_ids(token_ids, &balance.token_id)
}

pub(crate) fn match_token_transfer(
    transfer: &TokenTransfer,
    contract_addresses: &[Felt],
    account_addresses: &[Felt],
    token_ids: &[U256],
) -> bool {
    within(contract_addresses, &transfer.contract_address)
        && (account_addresses.is_empty() || account_addresses.iter().any(|a| transfer.involves(a)))
        && within_token_ids(token_ids, &transfer.token_id)
}

pub(crate) fn match_transaction(transaction: &Transaction, filter: &TransactionFilter) -> bool {
    let calls = &transaction.calls;

    within(&filter.transaction_hashes, &transaction.transaction_hash)
        && (filter.caller_addresses.is_empty()
            || filter.caller_addresses.contains(&transaction.sender_address)
            || calls.iter().any(|c| filter.caller_addresses.contains(&c.caller_address)))
        && (filter.contract_addresses.is_empty()
            || calls.iter().any(|c| filter.contract_addresses.contains(&c.contract_address)))
        && (filter.entrypoints.is_empty()
            || calls.iter().any(|c| filter.entrypoints.contains(&c.entrypoint)))
        && filter.from_block.map_or(true, |from| transaction.block_number >= from)
        && filter.to_block.map_or(true, |to| transaction.block_number <= to)
}

pub(crate) fn match_activity(
    activity: &Activity,
    world_addresses: &[Felt],
    namespaces: &[String],
    caller_addresses: &[Felt],
) -> bool {
    within(world_addresses, &activity.world_address)
        && within(namespaces, &activity.namespace)
        && within(caller_addresses, &activity.caller_address)
}

fn match_achievement_progression(
    progression: &AchievementProgression,
    world_addresses: &[Felt],
    namespaces: &[String],
    player_addresses: &[Felt],
    achievement_ids: &[String],
) -> bool {
    within(world_addresses, &progression.world_address)
        && within(namespaces, &progression.namespace)
        && within(player_addresses, &progression.player_id)
        && within(achievement_ids, &progression.achievement_id)
}

pub(crate) fn match_aggregation(
    entry: &AggregationEntry,
    aggregator_ids: &[String],
    entity_ids: &[String],
) -> bool {
    within(aggregator_ids, &entry.aggregator_id) && within(entity_ids, &entry.entity_id)
}

/// Whether a pushed update is of interest to a subscription with `filter`.
pub(crate) fn match_update(filter: &SubscriptionFilter, update: &Update) -> bool {
    match (filter, update) {
        (SubscriptionFilter::Entities { clause, world_addresses }, Update::Entity(entity)) => {
            within(world_addresses, &entity.world_address)
                && clause.as_ref().map_or(true, |c| match_entity(entity, c))
        }
        (
            SubscriptionFilter::EventMessages { clause, world_addresses },
            Update::EventMessage(message),
        ) => {
            within(world_addresses, &message.world_address)
                && clause.as_ref().map_or(true, |c| match_entity(message, c))
        }
        (SubscriptionFilter::Events { keys }, Update::Event(event)) => match_keys(&event.keys, keys),
        (SubscriptionFilter::Tokens { contract_addresses, token_ids }, Update::Token(token)) => {
            match_token(token, contract_addresses, token_ids)
        }
        (
            SubscriptionFilter::TokenBalances { contract_addresses, account_addresses, token_ids },
            Update::TokenBalance(balance),
        ) => match_token_balance(balance, contract_addresses, account_addresses, token_ids),
        (
            SubscriptionFilter::TokenTransfers { contract_addresses, account_addresses, token_ids },
            Update::TokenTransfer(transfer),
        ) => match_token_transfer(transfer, contract_addresses, account_addresses, token_ids),
        (SubscriptionFilter::Transactions { filter }, Update::Transaction(transaction)) => {
            filter.as_ref().map_or(true, |f| match_transaction(transaction, f))
        }
        (
            SubscriptionFilter::Activities { world_addresses, namespaces, caller_addresses },
            Update::Activity(activity),
        ) => match_activity(activity, world_addresses, namespaces, caller_addresses),
        (
            SubscriptionFilter::AchievementProgressions {
                world_addresses,
                namespaces,
                player_addresses,
                achievement_ids,
            },
            Update::AchievementProgression(progression),
        ) => match_achievement_progression(
            progression,
            world_addresses,
            namespaces,
            player_addresses,
            achievement_ids,
        ),
        (SubscriptionFilter::Aggregations { aggregator_ids, entity_ids }, Update::Aggregation(entry)) => {
            match_aggregation(entry, aggregator_ids, entity_ids)
        }
        (SubscriptionFilter::Contracts { contract_addresses }, Update::Contract(contract)) => {
            within(contract_addresses, &contract.contract_address)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use torii_proto::primitive::Primitive;
    use torii_proto::schema::{Enum, EnumOption, Member};
    use chrono::{DateTime, Utc};
    use crypto_bigint::U256;
    use torii_proto::{CompositeClause, Contract, ContractType};

    use super::*;

    fn member(name: &str, ty: Ty, key: bool) -> Member {
        Member { name: name.to_string(), ty, key }
    }

    fn entity() -> Entity {
        let position = Struct {
            name: "ns-Position".to_string(),
            children: vec![
                member("player", Ty::Primitive(Primitive::ContractAddress(Felt::ONE)), true),
                member(
                    "vec",
                    Ty::Struct(Struct {
                        name: "Vec2".to_string(),
                        children: vec![
                            member("x", Ty::Primitive(Primitive::U32(10)), false),
                            member("y", Ty::Primitive(Primitive::U32(20)), false),
                        ],
                    }),
                    false,
                ),
            ],
        };
        let moves = Struct {
            name: "ns-Moves".to_string(),
            children: vec![
                member("player", Ty::Primitive(Primitive::ContractAddress(Felt::ONE)), true),
                member(
                    "last_direction",
                    Ty::Enum(Enum {
                        name: "Direction".to_string(),
                        option: Some(1),
                        options: vec![
                            EnumOption { name: "Left".to_string(), ty: Ty::Tuple(vec![]) },
                            EnumOption { name: "Right".to_string(), ty: Ty::Tuple(vec![]) },
                        ],
                    }),
                    false,
                ),
                member(
                    "history",
                    Ty::Array(vec![
                        Ty::Primitive(Primitive::U8(1)),
                        Ty::Primitive(Primitive::U8(2)),
                        Ty::Primitive(Primitive::U8(3)),
                    ]),
                    false,
                ),
                member("name", Ty::ByteArray("dojo warrior".to_string()), false),
            ],
        };

        Entity {
            world_address: Felt::ONE,
            hashed_keys: Felt::from(0xabc_u64),
            keys: vec![Felt::ONE],
            models: vec![position, moves],
            ..Default::default()
        }
    }

    fn member_clause(model: &str, path: &str, op: ComparisonOperator, value: MemberValue) -> Clause {
        Clause::Member(MemberClause::new(model, path, op, value).unwrap())
    }

    fn u8_list(values: &[u8]) -> MemberValue {
        MemberValue::List(values.iter().map(|v| MemberValue::Primitive(Primitive::U8(*v))).collect())
    }

    #[test]
    fn test_match_model() {
        assert!(match_model("ns-Position", "ns-Position"));
        assert!(match_model("Position", "ns-Position"));
        assert!(match_model("ns-*", "ns-Position"));
        assert!(match_model("*-Position", "other-Position"));
        assert!(!match_model("other-Position", "ns-Position"));
        assert!(!match_model("ns-Moves", "ns-Position"));
    }

    #[test]
    fn test_keys_clause() {
        let entity = entity();

        let mut clause = KeysClause::new(PatternMatching::FixedLen);
        clause.add_key(Some(Felt::ONE));
        assert!(match_entity(&entity, &Clause::Keys(clause.clone())));

        clause.pattern_matching = PatternMatching::VariableLen;
        assert!(match_entity(&entity, &Clause::Keys(clause.clone())));

        clause.add_model("other-*").unwrap();
        assert!(!match_entity(&entity, &Clause::Keys(clause)));
    }

    #[test]
    fn test_variable_len_needs_every_pattern_key() {
        let mut clause = KeysClause::new(PatternMatching::VariableLen);
        clause.add_key(Some(Felt::ONE)).add_key(Some(Felt::TWO));

        assert!(!match_keys(&[Felt::ONE], &[clause.clone()]));
        assert!(match_keys(&[Felt::ONE, Felt::TWO, Felt::from(3_u8)], &[clause.clone()]));

        // a trailing wildcard still needs a key in that position
        let mut wildcard = KeysClause::new(PatternMatching::VariableLen);
        wildcard.add_key(Some(Felt::ONE)).add_key(None);
        assert!(!match_entity(&entity(), &Clause::Keys(wildcard)));

        let short = Entity { keys: vec![Felt::ONE], ..entity() };
        let long = Entity { keys: vec![Felt::ONE, Felt::TWO, Felt::from(3_u8)], ..entity() };
        let filter = SubscriptionFilter::Entities {
            clause: Some(Clause::Keys(clause)),
            world_addresses: vec![],
        };
        assert!(!match_update(&filter, &Update::Entity(short)));
        assert!(match_update(&filter, &Update::Entity(long)));
    }

    #[test]
    fn test_member_scalar_operators() {
        let entity = entity();
        let x = |op, v| member_clause("ns-Position", "vec.x", op, MemberValue::Primitive(Primitive::U32(v)));

        assert!(match_entity(&entity, &x(ComparisonOperator::Eq, 10)));
        assert!(match_entity(&entity, &x(ComparisonOperator::Neq, 11)));
        assert!(match_entity(&entity, &x(ComparisonOperator::Gt, 9)));
        assert!(match_entity(&entity, &x(ComparisonOperator::Gte, 10)));
        assert!(match_entity(&entity, &x(ComparisonOperator::Lt, 11)));
        assert!(match_entity(&entity, &x(ComparisonOperator::Lte, 10)));
        assert!(!match_entity(&entity, &x(ComparisonOperator::Gt, 10)));

        // different primitive types never compare
        let wrong_type = member_clause(
            "ns-Position",
            "vec.x",
            ComparisonOperator::Eq,
            MemberValue::Primitive(Primitive::U64(10)),
        );
        assert!(!match_entity(&entity, &wrong_type));
    }

    #[test]
    fn test_member_list_and_array_operators() {
        let entity = entity();
        let history = |op, v| member_clause("ns-Moves", "history", op, v);

        assert!(match_entity(
            &entity,
            &history(ComparisonOperator::Contains, MemberValue::Primitive(Primitive::U8(2)))
        ));
        assert!(match_entity(&entity, &history(ComparisonOperator::ContainsAll, u8_list(&[1, 3]))));
        assert!(!match_entity(&entity, &history(ComparisonOperator::ContainsAll, u8_list(&[1, 4]))));
        assert!(match_entity(&entity, &history(ComparisonOperator::ContainsAny, u8_list(&[4, 3]))));
        assert!(match_entity(
            &entity,
            &history(ComparisonOperator::ArrayLengthEq, MemberValue::Primitive(Primitive::U32(3)))
        ));
        assert!(match_entity(
            &entity,
            &history(ComparisonOperator::ArrayLengthGt, MemberValue::Primitive(Primitive::U32(2)))
        ));
        assert!(!match_entity(
            &entity,
            &history(ComparisonOperator::ArrayLengthLt, MemberValue::Primitive(Primitive::U32(3)))
        ));

        let x_in = |op, values: &[u32]| {
            member_clause(
                "ns-Position",
                "vec.x",
                op,
                MemberValue::List(
                    values.iter().map(|v| MemberValue::Primitive(Primitive::U32(*v))).collect(),
                ),
            )
        };
        assert!(match_entity(&entity, &x_in(ComparisonOperator::In, &[1, 10])));
        assert!(match_entity(&entity, &x_in(ComparisonOperator::NotIn, &[1, 2])));
        assert!(!match_entity(&entity, &x_in(ComparisonOperator::NotIn, &[10])));
    }

    #[test]
    fn test_member_strings_and_enums() {
        let entity = entity();
        let string = |v: &str| MemberValue::String(v.to_string());

        assert!(match_entity(
            &entity,
            &member_clause("ns-Moves", "last_direction", ComparisonOperator::Eq, string("Right"))
        ));
        assert!(match_entity(
            &entity,
            &member_clause(
                "ns-Moves",
                "last_direction",
                ComparisonOperator::In,
                MemberValue::List(vec![string("Up"), string("Right")])
            )
        ));
        assert!(match_entity(
            &entity,
            &member_clause("ns-Moves", "name", ComparisonOperator::Contains, string("warrior"))
        ));
        assert!(!match_entity(
            &entity,
            &member_clause("ns-Moves", "missing", ComparisonOperator::Eq, string("x"))
        ));
    }

    #[test]
    fn test_composite() {
        let entity = entity();
        let hit = Clause::HashedKeys(vec![Felt::from(0xabc_u64)]);
        let miss = Clause::HashedKeys(vec![Felt::TWO]);

        let and = CompositeClause::new(LogicalOperator::And, vec![hit.clone(), miss.clone()]).unwrap();
        let or = CompositeClause::new(LogicalOperator::Or, vec![hit, miss]).unwrap();
        assert!(!match_entity(&entity, &Clause::Composite(and)));
        assert!(match_entity(&entity, &Clause::Composite(or)));
    }

    #[test]
    fn test_match_keys() {
        let mut clause = KeysClause::new(PatternMatching::VariableLen);
        clause.add_key(None).add_key(Some(Felt::TWO));

        assert!(match_keys(&[Felt::ONE], &[]));
        assert!(match_keys(&[Felt::ONE, Felt::TWO, Felt::ZERO], &[clause.clone()]));
        assert!(!match_keys(&[Felt::ONE, Felt::ONE], &[clause]));
    }

    #[test]
    fn test_aggregation_and_contract_filters() {
        let entry = AggregationEntry {
            id: "kills:0x1".to_string(),
            aggregator_id: "kills".to_string(),
            entity_id: "0x1".to_string(),
            value: U256::from_u64(3),
            display_value: "3".to_string(),
            position: 1,
            model_id: "0x2".to_string(),
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        };
        let update = Update::Aggregation(entry);
        let filter = |aggregator_ids: &[&str], entity_ids: &[&str]| SubscriptionFilter::Aggregations {
            aggregator_ids: aggregator_ids.iter().map(|id| id.to_string()).collect(),
            entity_ids: entity_ids.iter().map(|id| id.to_string()).collect(),
        };

        assert!(match_update(&filter(&[], &[]), &update));
        assert!(match_update(&filter(&["kills"], &["0x1"]), &update));
        assert!(!match_update(&filter(&["deaths"], &[]), &update));
        assert!(!match_update(&filter(&[], &["0x9"]), &update));

        let contract = Update::Contract(Contract {
            contract_address: Felt::ONE,
            contract_type: ContractType::Erc20,
            head: Some(10),
            tps: None,
            last_block_timestamp: None,
            last_pending_block_tx: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        });
        assert!(match_update(&SubscriptionFilter::Contracts { contract_addresses: vec![] }, &contract));
        assert!(match_update(
            &SubscriptionFilter::Contracts { contract_addresses: vec![Felt::ONE] },
            &contract
        ));
        assert!(!match_update(
            &SubscriptionFilter::Contracts { contract_addresses: vec![Felt::TWO] },
            &contract
        ));
        assert!(!match_update(&filter(&[], &[]), &contract));
    }

    #[test]
    fn test_progression_achievement_ids() {
        let progression = Update::AchievementProgression(AchievementProgression {
            id: "p1".to_string(),
            achievement_id: "first-blood".to_string(),
            task_id: "kill".to_string(),
            world_address: Felt::ONE,
            namespace: "ns".to_string(),
            player_id: Felt::TWO,
            count: 1,
            completed: true,
            completed_at: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        });
        let filter = |achievement_ids: Vec<String>| SubscriptionFilter::AchievementProgressions {
            world_addresses: vec![],
            namespaces: vec![],
            player_addresses: vec![Felt::TWO],
            achievement_ids,
        };

        assert!(match_update(&filter(vec![]), &progression));
        assert!(match_update(&filter(vec!["first-blood".to_string()]), &progression));
        assert!(!match_update(&filter(vec!["marathon".to_string()]), &progression));
    }
}
