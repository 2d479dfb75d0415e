use crate::clause::ComparisonOperator;

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("Composite clause must contain at least one clause")]
    EmptyComposite,
    #[error("Invalid model name: {0}. Expected format is \"namespace-model\" or \"model\"")]
    InvalidModelName(String),
    #[error("Invalid member path: {0:?}")]
    InvalidMemberPath(String),
    #[error("Operator {operator:?} cannot be used with {value} value")]
    OperatorValueMismatch {
        operator: ComparisonOperator,
        value: &'static str,
    },
    #[error(
        "Keys clause has {found} keys but none of the models {models:?} has a matching key arity"
    )]
    KeysArity { models: Vec<String>, found: usize },
    #[error("Invalid order by field: {0:?}")]
    InvalidOrderBy(String),
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}
