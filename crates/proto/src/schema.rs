use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::primitive::Primitive;

/// The type tree of a model member, carrying its current value.
#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub enum Ty {
    Primitive(Primitive),
    ByteArray(String),
    Enum(Enum),
    Struct(Struct),
    Tuple(Vec<Ty>),
    Array(Vec<Ty>),
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Struct {
    pub name: String,
    pub children: Vec<Member>,
}

impl Struct {
    /// Members flagged as keys, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &Member> {
        self.children.iter().filter(|m| m.key)
    }

    pub fn get(&self, name: &str) -> Option<&Ty> {
        self.children.iter().find(|m| m.name == name).map(|m| &m.ty)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Member {
    pub name: String,
    pub ty: Ty,
    pub key: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Enum {
    pub name: String,
    /// Index of the selected option, if any.
    pub option: Option<u8>,
    pub options: Vec<EnumOption>,
}

impl Enum {
    pub fn option(&self) -> Option<&EnumOption> {
        self.option.and_then(|idx| self.options.get(idx as usize))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct EnumOption {
    pub name: String,
    pub ty: Ty,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Entity<const EVENT_MESSAGE: bool = false> {
    pub world_address: Felt,
    pub hashed_keys: Felt,
    pub keys: Vec<Felt>,
    /// Model values, each named by its tag (`namespace-name`).
    pub models: Vec<Struct>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
}

pub type EventMessage = Entity<true>;

impl<const EVENT_MESSAGE: bool> Entity<EVENT_MESSAGE> {
    pub fn model(&self, tag: &str) -> Option<&Struct> {
        self.models.iter().find(|m| m.name == tag)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Model {
    /// Namespace of the model
    pub namespace: String,
    /// The name of the model
    pub name: String,
    /// The selector of the model
    pub selector: Felt,
    /// The layout of the model, with default values.
    pub schema: Struct,
}

impl Model {
    pub fn tag(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }

    /// Number of key members of the model.
    pub fn key_arity(&self) -> usize {
        self.schema.keys().count()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct World {
    pub world_address: Felt,
    /// Models registered in the world, keyed by tag.
    pub models: HashMap<String, Model>,
}

/// Resolves the key arity of models referenced by clauses.
pub trait ModelSchema {
    /// Returns the key arity of the model referenced by `name`, or `None` if it
    /// is unknown. `name` is either a full tag or a bare model name.
    fn key_arity(&self, name: &str) -> Option<usize>;
}

impl ModelSchema for HashMap<String, Model> {
    fn key_arity(&self, name: &str) -> Option<usize> {
        if let Some(model) = self.get(name) {
            return Some(model.key_arity());
        }

        if name.contains('-') {
            return None;
        }

        self.values()
            .find(|model| model.name == name)
            .map(Model::key_arity)
    }
}

impl ModelSchema for World {
    fn key_arity(&self, name: &str) -> Option<usize> {
        self.models.key_arity(name)
    }
}

impl<S: ModelSchema + ?Sized> ModelSchema for &S {
    fn key_arity(&self, name: &str) -> Option<usize> {
        (**self).key_arity(name)
    }
}

/// A schema that knows no models; arity checks are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSchema;

impl ModelSchema for NoSchema {
    fn key_arity(&self, _name: &str) -> Option<usize> {
        None
    }
}
