use std::ffi::{c_char, CStr};

use starknet::core::types::Felt;
use torii_client::{DojoError, ErrorType};

pub(crate) type FfiResult<T> = std::result::Result<T, DojoError>;

/// Outcome of a fallible call. The error is owned by the caller and must be
/// released with `dojo_error_destroy`.
#[derive(Debug)]
#[repr(C)]
pub enum Result<T> {
    Ok(T),
    Err(*mut DojoError),
}

impl<T> Result<T> {
    pub(crate) fn err(error: impl Into<DojoError>) -> Self {
        Result::Err(Box::into_raw(Box::new(error.into())))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Result::Ok(_))
    }
}

impl<T> From<FfiResult<T>> for Result<T> {
    fn from(val: FfiResult<T>) -> Self {
        match val {
            Ok(v) => Result::Ok(v),
            Err(e) => Result::err(e),
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub enum COption<T> {
    Some(T),
    None,
}

impl<T> From<COption<T>> for Option<Felt>
where
    Felt: From<T>,
{
    fn from(val: COption<T>) -> Self {
        match val {
            COption::Some(v) => Some(v.into()),
            COption::None => None,
        }
    }
}

/// Big endian felt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FieldElement {
    pub data: [u8; 32],
}

impl From<FieldElement> for Felt {
    fn from(val: FieldElement) -> Self {
        Felt::from_bytes_be(&val.data)
    }
}

impl From<Felt> for FieldElement {
    fn from(val: Felt) -> Self {
        FieldElement { data: val.to_bytes_be() }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub enum PatternMatching {
    FixedLen,
    VariableLen,
}

impl From<PatternMatching> for torii_proto::PatternMatching {
    fn from(val: PatternMatching) -> Self {
        match val {
            PatternMatching::FixedLen => torii_proto::PatternMatching::FixedLen,
            PatternMatching::VariableLen => torii_proto::PatternMatching::VariableLen,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub enum LogicalOperator {
    And,
    Or,
}

impl From<LogicalOperator> for torii_proto::LogicalOperator {
    fn from(val: LogicalOperator) -> Self {
        match val {
            LogicalOperator::And => torii_proto::LogicalOperator::And,
            LogicalOperator::Or => torii_proto::LogicalOperator::Or,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
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

impl From<ComparisonOperator> for torii_proto::ComparisonOperator {
    fn from(val: ComparisonOperator) -> Self {
        use torii_proto::ComparisonOperator as Op;
        match val {
            ComparisonOperator::Eq => Op::Eq,
            ComparisonOperator::Neq => Op::Neq,
            ComparisonOperator::Gt => Op::Gt,
            ComparisonOperator::Gte => Op::Gte,
            ComparisonOperator::Lt => Op::Lt,
            ComparisonOperator::Lte => Op::Lte,
            ComparisonOperator::In => Op::In,
            ComparisonOperator::NotIn => Op::NotIn,
            ComparisonOperator::Contains => Op::Contains,
            ComparisonOperator::ContainsAll => Op::ContainsAll,
            ComparisonOperator::ContainsAny => Op::ContainsAny,
            ComparisonOperator::ArrayLengthEq => Op::ArrayLengthEq,
            ComparisonOperator::ArrayLengthGt => Op::ArrayLengthGt,
            ComparisonOperator::ArrayLengthLt => Op::ArrayLengthLt,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub enum PaginationDirection {
    Forward,
    Backward,
}

impl From<PaginationDirection> for torii_proto::PaginationDirection {
    fn from(val: PaginationDirection) -> Self {
        match val {
            PaginationDirection::Forward => torii_proto::PaginationDirection::Forward,
            PaginationDirection::Backward => torii_proto::PaginationDirection::Backward,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl From<OrderDirection> for torii_proto::OrderDirection {
    fn from(val: OrderDirection) -> Self {
        match val {
            OrderDirection::Asc => torii_proto::OrderDirection::Asc,
            OrderDirection::Desc => torii_proto::OrderDirection::Desc,
        }
    }
}

fn null(name: &str) -> DojoError {
    DojoError::new(ErrorType::InvalidInput, format!("{name} is null"))
}

/// # Safety
/// `ptr` is null or points to a NUL terminated string.
pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char, name: &str) -> FfiResult<&'a str> {
    if ptr.is_null() {
        return Err(null(name));
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().map_err(|e| {
        DojoError::new(ErrorType::InvalidInput, format!("{name} is not valid UTF-8: {e}"))
    })
}

/// # Safety
/// `ptr` is null or points to a live `T`.
pub(crate) unsafe fn ref_arg<'a, T>(ptr: *const T, name: &str) -> FfiResult<&'a T> {
    unsafe { ptr.as_ref() }.ok_or_else(|| null(name))
}

/// # Safety
/// `ptr` is null or points to a live `T` not aliased for `'a`.
pub(crate) unsafe fn mut_arg<'a, T>(ptr: *mut T, name: &str) -> FfiResult<&'a mut T> {
    unsafe { ptr.as_mut() }.ok_or_else(|| null(name))
}

/// Takes back ownership of a handle. The handle is invalid afterwards.
///
/// # Safety
/// `ptr` is null or was returned by `Box::into_raw` and not released yet.
pub(crate) unsafe fn take_arg<T>(ptr: *mut T, name: &str) -> FfiResult<T> {
    if ptr.is_null() {
        return Err(null(name));
    }
    Ok(*unsafe { Box::from_raw(ptr) })
}

/// # Safety
/// `ptr` is null, or points to `len` consecutive `T`s.
pub(crate) unsafe fn slice_arg<'a, T>(ptr: *const T, len: usize, name: &str) -> FfiResult<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(null(name));
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// # Safety
/// Same as [`str_arg`].
pub(crate) unsafe fn json_arg<T>(ptr: *const c_char, name: &str) -> FfiResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let json = unsafe { str_arg(ptr, name) }?;
    serde_json::from_str(json)
        .map_err(|e| DojoError::new(ErrorType::ParseError, format!("Invalid {name}: {e}")))
}

/// Like [`json_arg`], but null yields the default value.
///
/// # Safety
/// Same as [`str_arg`].
pub(crate) unsafe fn json_arg_or_default<T>(ptr: *const c_char, name: &str) -> FfiResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if ptr.is_null() {
        return Ok(T::default());
    }
    unsafe { json_arg(ptr, name) }
}

pub(crate) fn into_raw<T>(value: T) -> *mut T {
    Box::into_raw(Box::new(value))
}
