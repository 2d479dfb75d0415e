//! Clause builders.
//!
//! Functions that take a handle by `*mut` and document it as consumed take
//! ownership of it, on success and on failure alike.

use std::ffi::c_char;

use starknet::core::types::Felt;
use torii_client::DojoError;
use torii_proto::{Clause, CompositeClause, KeysClause, MemberClause, MemberValue, Primitive};

use crate::types::{
    self, into_raw, mut_arg, ref_arg, slice_arg, str_arg, take_arg, COption, FieldElement,
    FfiResult, Result,
};
use crate::write::DojoWrite;
use crate::{ffi_guard, ffi_guard_void};

#[no_mangle]
pub extern "C" fn keys_clause_new(pattern_matching: types::PatternMatching) -> *mut KeysClause {
    into_raw(KeysClause::new(pattern_matching.into()))
}

/// Appends a key. `None` matches any value at this position.
///
/// # Safety
/// `clause` is a live keys clause.
#[no_mangle]
pub unsafe extern "C" fn keys_clause_add_key(
    clause: *mut KeysClause,
    key: COption<FieldElement>,
) -> Result<bool> {
    ffi_guard(|| {
        unsafe { mut_arg(clause, "clause") }?.add_key(key.into());
        Ok(true)
    })
}

/// Scopes the clause to a model, given as `namespace-Model`, a bare model
/// name or with `*` wildcards.
///
/// # Safety
/// `clause` is a live keys clause and `model` a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn keys_clause_add_model(
    clause: *mut KeysClause,
    model: *const c_char,
) -> Result<bool> {
    ffi_guard(|| {
        let clause = unsafe { mut_arg(clause, "clause") }?;
        clause.add_model(unsafe { str_arg(model, "model") }?)?;
        Ok(true)
    })
}

/// # Safety
/// `clause` is null or a keys clause not consumed or destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn keys_clause_destroy(clause: *mut KeysClause) {
    ffi_guard_void(|| drop(unsafe { take_arg(clause, "clause") }));
}

#[no_mangle]
pub extern "C" fn member_value_felt(value: FieldElement) -> *mut MemberValue {
    into_raw(MemberValue::Primitive(Primitive::Felt252(value.into())))
}

#[no_mangle]
pub extern "C" fn member_value_bool(value: bool) -> *mut MemberValue {
    into_raw(MemberValue::Primitive(Primitive::Bool(value)))
}

#[no_mangle]
pub extern "C" fn member_value_i64(value: i64) -> *mut MemberValue {
    into_raw(MemberValue::Primitive(Primitive::I64(value)))
}

#[no_mangle]
pub extern "C" fn member_value_u64(value: u64) -> *mut MemberValue {
    into_raw(MemberValue::Primitive(Primitive::U64(value)))
}

/// # Safety
/// `value` is a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn member_value_string(value: *const c_char) -> Result<*mut MemberValue> {
    ffi_guard(|| {
        let value = unsafe { str_arg(value, "value") }?;
        Ok(into_raw(MemberValue::String(value.to_string())))
    })
}

/// An empty list, for `In`, `NotIn` and the `Contains*` operators.
#[no_mangle]
pub extern "C" fn member_value_list() -> *mut MemberValue {
    into_raw(MemberValue::List(Vec::new()))
}

/// Appends `value` to `list`. Consumes `value`.
///
/// # Safety
/// `list` is a live member value and `value` a member value not consumed yet.
#[no_mangle]
pub unsafe extern "C" fn member_value_list_push(
    list: *mut MemberValue,
    value: *mut MemberValue,
) -> Result<bool> {
    ffi_guard(|| {
        let value = unsafe { take_arg(value, "value") }?;
        match unsafe { mut_arg(list, "list") }? {
            MemberValue::List(values) => {
                values.push(value);
                Ok(true)
            }
            _ => Err(DojoError::new(torii_client::ErrorType::InvalidInput, "Not a list value")),
        }
    })
}

/// # Safety
/// `value` is null or a member value not consumed or destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn member_value_destroy(value: *mut MemberValue) {
    ffi_guard_void(|| drop(unsafe { take_arg(value, "value") }));
}

/// # Safety
/// `hashed_keys` points to `len` field elements.
#[no_mangle]
pub unsafe extern "C" fn clause_hashed_keys(
    hashed_keys: *const FieldElement,
    len: usize,
) -> Result<*mut Clause> {
    ffi_guard(|| {
        let hashed_keys = unsafe { slice_arg(hashed_keys, len, "hashed_keys") }?;
        Ok(into_raw(Clause::HashedKeys(hashed_keys.iter().map(|k| Felt::from(*k)).collect())))
    })
}

/// Wraps a keys clause. Consumes `keys`.
///
/// # Safety
/// `keys` is a keys clause not consumed yet.
#[no_mangle]
pub unsafe extern "C" fn clause_keys(keys: *mut KeysClause) -> Result<*mut Clause> {
    ffi_guard(|| {
        let keys = unsafe { take_arg(keys, "keys") }?;
        keys.validate(&torii_proto::NoSchema)?;
        Ok(into_raw(Clause::Keys(keys)))
    })
}

/// Compares a model member against `value`. Consumes `value`.
///
/// # Safety
/// `model` and `member` are NUL terminated strings, `value` a member value
/// not consumed yet.
#[no_mangle]
pub unsafe extern "C" fn clause_member(
    model: *const c_char,
    member: *const c_char,
    operator: types::ComparisonOperator,
    value: *mut MemberValue,
) -> Result<*mut Clause> {
    ffi_guard(|| {
        let value = unsafe { take_arg(value, "value") }?;
        let model = unsafe { str_arg(model, "model") }?;
        let member = unsafe { str_arg(member, "member") }?;
        let clause = MemberClause::new(model, member, operator.into(), value)?;
        Ok(into_raw(Clause::Member(clause)))
    })
}

/// Combines `len` clauses. Consumes every child. Fails with `InvalidInput`
/// when there are no children.
///
/// # Safety
/// `clauses` points to `len` clauses not consumed yet.
#[no_mangle]
pub unsafe extern "C" fn clause_composite(
    operator: types::LogicalOperator,
    clauses: *const *mut Clause,
    len: usize,
) -> Result<*mut Clause> {
    ffi_guard(|| {
        // every child is consumed, even when one of them is null
        let taken = unsafe { slice_arg(clauses, len, "clauses") }?
            .iter()
            .map(|clause| unsafe { take_arg(*clause, "clause") })
            .collect::<Vec<_>>();
        let children = taken.into_iter().collect::<FfiResult<Vec<_>>>()?;
        let composite = CompositeClause::new(operator.into(), children)?;
        Ok(into_raw(Clause::Composite(composite)))
    })
}

/// Appends the JSON form of `clause` to `write`.
///
/// # Safety
/// `clause` and `write` are live handles.
#[no_mangle]
pub unsafe extern "C" fn clause_to_json(clause: *const Clause, write: *mut DojoWrite) -> Result<usize> {
    ffi_guard(|| {
        let clause = unsafe { ref_arg(clause, "clause") }?;
        unsafe { mut_arg(write, "write") }?.write_json(clause)
    })
}

/// # Safety
/// `clause` is null or a clause not consumed or destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn clause_destroy(clause: *mut Clause) {
    ffi_guard_void(|| drop(unsafe { take_arg(clause, "clause") }));
}
