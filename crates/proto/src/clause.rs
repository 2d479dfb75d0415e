use core::fmt;

use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;
use strum_macros::{AsRefStr, EnumIter};

use crate::error::ProtoError;
use crate::primitive::Primitive;
use crate::schema::ModelSchema;

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub enum Clause {
    HashedKeys(Vec<Felt>),
    Keys(KeysClause),
    Member(MemberClause),
    Composite(CompositeClause),
}

impl Clause {
    /// Checks the whole tree before it is sent anywhere.
    ///
    /// Structural rules (non-empty composites, model names, operator/value
    /// shapes) are always enforced. Fixed length key patterns are checked
    /// against the key arity of every scoped model that `schema` knows about.
    pub fn validate<S: ModelSchema + ?Sized>(&self, schema: &S) -> Result<(), ProtoError> {
        match self {
            Clause::HashedKeys(_) => Ok(()),
            Clause::Keys(clause) => clause.validate(schema),
            Clause::Member(clause) => clause.validate(),
            Clause::Composite(clause) => {
                if clause.clauses.is_empty() {
                    return Err(ProtoError::EmptyComposite);
                }
                clause.clauses.iter().try_for_each(|c| c.validate(schema))
            }
        }
    }

    /// Returns every model name referenced anywhere in the tree.
    pub fn models(&self) -> Vec<&str> {
        let mut models = Vec::new();
        self.collect_models(&mut models);
        models
    }

    fn collect_models<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Clause::HashedKeys(_) => {}
            Clause::Keys(clause) => out.extend(clause.models.iter().map(String::as_str)),
            Clause::Member(clause) => out.push(clause.model.as_str()),
            Clause::Composite(clause) => {
                clause.clauses.iter().for_each(|c| c.collect_models(out))
            }
        }
    }
}

impl From<KeysClause> for Clause {
    fn from(value: KeysClause) -> Self {
        Clause::Keys(value)
    }
}

impl From<MemberClause> for Clause {
    fn from(value: MemberClause) -> Self {
        Clause::Member(value)
    }
}

impl From<CompositeClause> for Clause {
    fn from(value: CompositeClause) -> Self {
        Clause::Composite(value)
    }
}

/// Checks that `name` is `[namespace-]model`, where each part is an identifier
/// or the `*` wildcard.
pub fn is_valid_model_name(name: &str) -> bool {
    fn is_segment(segment: &str) -> bool {
        if segment == "*" {
            return true;
        }
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    match name.split_once('-') {
        Some((namespace, model)) => is_segment(namespace) && is_segment(model),
        None => is_segment(name),
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct KeysClause {
    pub keys: Vec<Option<Felt>>,
    pub pattern_matching: PatternMatching,
    pub models: Vec<String>,
}

impl KeysClause {
    pub fn new(pattern_matching: PatternMatching) -> Self {
        Self {
            keys: Vec::new(),
            pattern_matching,
            models: Vec::new(),
        }
    }

    /// Appends a key component. `None` matches any value at this position.
    pub fn add_key(&mut self, key: Option<Felt>) -> &mut Self {
        self.keys.push(key);
        self
    }

    /// Scopes the clause to the given model.
    pub fn add_model(&mut self, model: impl Into<String>) -> Result<&mut Self, ProtoError> {
        let model = model.into();
        if !is_valid_model_name(&model) {
            return Err(ProtoError::InvalidModelName(model));
        }
        self.models.push(model);
        Ok(self)
    }

    pub fn validate<S: ModelSchema + ?Sized>(&self, schema: &S) -> Result<(), ProtoError> {
        if let Some(model) = self.models.iter().find(|m| !is_valid_model_name(m)) {
            return Err(ProtoError::InvalidModelName(model.clone()));
        }

        if self.pattern_matching == PatternMatching::VariableLen {
            return Ok(());
        }

        let arities = self
            .models
            .iter()
            .filter_map(|model| schema.key_arity(model))
            .collect::<Vec<_>>();

        // nothing known about the scoped models, leave it to the server
        if arities.is_empty() || arities.contains(&self.keys.len()) {
            return Ok(());
        }

        Err(ProtoError::KeysArity {
            models: self.models.clone(),
            found: self.keys.len(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Copy)]
pub enum PatternMatching {
    FixedLen,
    VariableLen,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub enum MemberValue {
    Primitive(Primitive),
    String(String),
    List(Vec<MemberValue>),
}

impl MemberValue {
    fn shape(&self) -> &'static str {
        match self {
            MemberValue::Primitive(_) => "primitive",
            MemberValue::String(_) => "string",
            MemberValue::List(_) => "list",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct MemberClause {
    pub model: String,
    /// Dot separated path to the member, e.g. `vec.x`.
    pub member: String,
    pub operator: ComparisonOperator,
    pub value: MemberValue,
}

impl MemberClause {
    pub fn new(
        model: impl Into<String>,
        member: impl Into<String>,
        operator: ComparisonOperator,
        value: MemberValue,
    ) -> Result<Self, ProtoError> {
        let clause = Self {
            model: model.into(),
            member: member.into(),
            operator,
            value,
        };
        clause.validate()?;
        Ok(clause)
    }

    pub fn validate(&self) -> Result<(), ProtoError> {
        if !is_valid_model_name(&self.model) {
            return Err(ProtoError::InvalidModelName(self.model.clone()));
        }
        if self.member.is_empty() || self.member.split('.').any(str::is_empty) {
            return Err(ProtoError::InvalidMemberPath(self.member.clone()));
        }
        if !self.operator.accepts(&self.value) {
            return Err(ProtoError::OperatorValueMismatch {
                operator: self.operator,
                value: self.value.shape(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct CompositeClause {
    pub operator: LogicalOperator,
    pub clauses: Vec<Clause>,
}

impl CompositeClause {
    /// Builds a composite from already built children. An empty list is rejected.
    pub fn new(operator: LogicalOperator, clauses: Vec<Clause>) -> Result<Self, ProtoError> {
        if clauses.is_empty() {
            return Err(ProtoError::EmptyComposite);
        }
        Ok(Self { operator, clauses })
    }
}

#[derive(
    Debug, AsRefStr, Serialize, Deserialize, EnumIter, PartialEq, Hash, Eq, Clone, Copy,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(
    Debug, AsRefStr, Serialize, Deserialize, EnumIter, PartialEq, Hash, Eq, Clone, Copy,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ComparisonOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    ContainsAll,
    ContainsAny,
    ArrayLengthEq,
    ArrayLengthGt,
    ArrayLengthLt,
}

impl ComparisonOperator {
    /// Operators that take a list of values on the right hand side.
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::In
                | ComparisonOperator::NotIn
                | ComparisonOperator::ContainsAll
                | ComparisonOperator::ContainsAny
        )
    }

    pub fn is_array_length(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::ArrayLengthEq
                | ComparisonOperator::ArrayLengthGt
                | ComparisonOperator::ArrayLengthLt
        )
    }

    /// Whether `value` has a shape this operator can be evaluated with.
    pub fn accepts(&self, value: &MemberValue) -> bool {
        match value {
            MemberValue::List(_) => self.takes_list(),
            MemberValue::Primitive(p) if self.is_array_length() => p.is_unsigned(),
            MemberValue::String(_) if self.is_array_length() => false,
            _ => !self.takes_list(),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOperator::Gt => write!(f, ">"),
            ComparisonOperator::Gte => write!(f, ">="),
            ComparisonOperator::Lt => write!(f, "<"),
            ComparisonOperator::Lte => write!(f, "<="),
            ComparisonOperator::Neq => write!(f, "!="),
            ComparisonOperator::Eq => write!(f, "="),
            ComparisonOperator::In => write!(f, "IN"),
            ComparisonOperator::NotIn => write!(f, "NOT IN"),
            ComparisonOperator::Contains => write!(f, "CONTAINS"),
            ComparisonOperator::ContainsAll => write!(f, "CONTAINS ALL"),
            ComparisonOperator::ContainsAny => write!(f, "CONTAINS ANY"),
            ComparisonOperator::ArrayLengthEq => write!(f, "LENGTH ="),
            ComparisonOperator::ArrayLengthGt => write!(f, "LENGTH >"),
            ComparisonOperator::ArrayLengthLt => write!(f, "LENGTH <"),
        }
    }
}
