use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Position in a paginated result set.
///
/// The content belongs to whoever issued it; the client passes it back as is.
#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Builds a cursor from raw bytes handed over by a foreign caller.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        Ok(Self(std::str::from_utf8(bytes)?.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Copy)]
pub enum PaginationDirection {
    #[default]
    Forward,
    Backward,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Copy)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct OrderBy {
    /// Record field, or `model.member` path for entities.
    pub field: String,
    pub direction: OrderDirection,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Hash, Eq, Clone)]
pub struct Pagination {
    pub cursor: Option<Cursor>,
    /// Server default when unset.
    pub limit: Option<u32>,
    pub direction: PaginationDirection,
    pub order_by: Vec<OrderBy>,
}

impl Pagination {
    pub fn set_cursor(&mut self, cursor: Cursor) -> &mut Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn set_limit(&mut self, limit: u32) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_direction(&mut self, direction: PaginationDirection) -> &mut Self {
        self.direction = direction;
        self
    }

    pub fn add_order_by(
        &mut self,
        field: impl Into<String>,
        direction: OrderDirection,
    ) -> Result<&mut Self, ProtoError> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(ProtoError::InvalidOrderBy(field));
        }
        self.order_by.push(OrderBy { field, direction });
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ProtoError> {
        match self.order_by.iter().find(|o| o.field.trim().is_empty()) {
            Some(order) => Err(ProtoError::InvalidOrderBy(order.field.clone())),
            None => Ok(()),
        }
    }
}
