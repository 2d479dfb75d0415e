//! Pagination and entity query builders.

use std::ffi::c_char;

use torii_client::{DojoError, ErrorType};
use torii_proto::{Clause, Cursor, Pagination, Query};

use crate::types::{
    self, into_raw, mut_arg, ref_arg, str_arg, take_arg, FieldElement, Result,
};
use crate::write::DojoWrite;
use crate::{ffi_guard, ffi_guard_void};

/// A pagination with no cursor, the server's default limit and no ordering.
#[no_mangle]
pub extern "C" fn pagination_new() -> *mut Pagination {
    into_raw(Pagination::default())
}

/// Continues from a `next_cursor` returned by a previous page.
///
/// # Safety
/// `pagination` is a live pagination and `cursor` a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn pagination_set_cursor(
    pagination: *mut Pagination,
    cursor: *const c_char,
) -> Result<bool> {
    ffi_guard(|| {
        let pagination = unsafe { mut_arg(pagination, "pagination") }?;
        pagination.set_cursor(Cursor::new(unsafe { str_arg(cursor, "cursor") }?));
        Ok(true)
    })
}

/// # Safety
/// `pagination` is a live pagination.
#[no_mangle]
pub unsafe extern "C" fn pagination_set_limit(pagination: *mut Pagination, limit: u32) -> Result<bool> {
    ffi_guard(|| {
        unsafe { mut_arg(pagination, "pagination") }?.set_limit(limit);
        Ok(true)
    })
}

/// # Safety
/// `pagination` is a live pagination.
#[no_mangle]
pub unsafe extern "C" fn pagination_set_direction(
    pagination: *mut Pagination,
    direction: types::PaginationDirection,
) -> Result<bool> {
    ffi_guard(|| {
        unsafe { mut_arg(pagination, "pagination") }?.set_direction(direction.into());
        Ok(true)
    })
}

/// # Safety
/// `pagination` is a live pagination and `field` a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn pagination_add_order_by(
    pagination: *mut Pagination,
    field: *const c_char,
    direction: types::OrderDirection,
) -> Result<bool> {
    ffi_guard(|| {
        let pagination = unsafe { mut_arg(pagination, "pagination") }?;
        pagination.add_order_by(unsafe { str_arg(field, "field") }?, direction.into())?;
        Ok(true)
    })
}

/// # Safety
/// `pagination` is null or a pagination not consumed or destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn pagination_destroy(pagination: *mut Pagination) {
    ffi_guard_void(|| drop(unsafe { take_arg(pagination, "pagination") }));
}

/// An entity query over every world, without clause.
#[no_mangle]
pub extern "C" fn query_new() -> *mut Query {
    into_raw(Query::default())
}

/// Sets the clause. Consumes `clause`, replacing any previous one.
///
/// # Safety
/// `query` is a live query and `clause` a clause not consumed yet.
#[no_mangle]
pub unsafe extern "C" fn query_set_clause(query: *mut Query, clause: *mut Clause) -> Result<bool> {
    ffi_guard(|| {
        let clause = unsafe { take_arg(clause, "clause") }?;
        unsafe { mut_arg(query, "query") }?.clause = Some(clause);
        Ok(true)
    })
}

/// Sets the pagination. Consumes `pagination`.
///
/// # Safety
/// `query` is a live query and `pagination` a pagination not consumed yet.
#[no_mangle]
pub unsafe extern "C" fn query_set_pagination(
    query: *mut Query,
    pagination: *mut Pagination,
) -> Result<bool> {
    ffi_guard(|| {
        let pagination = unsafe { take_arg(pagination, "pagination") }?;
        pagination.validate()?;
        unsafe { mut_arg(query, "query") }?.pagination = pagination;
        Ok(true)
    })
}

/// Restricts the query to a world. Can be called several times.
///
/// # Safety
/// `query` is a live query.
#[no_mangle]
pub unsafe extern "C" fn query_add_world(query: *mut Query, world_address: FieldElement) -> Result<bool> {
    ffi_guard(|| {
        unsafe { mut_arg(query, "query") }?.world_addresses.push(world_address.into());
        Ok(true)
    })
}

/// Only retrieves the given model. Can be called several times.
///
/// # Safety
/// `query` is a live query and `model` a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn query_add_model(query: *mut Query, model: *const c_char) -> Result<bool> {
    ffi_guard(|| {
        let model = unsafe { str_arg(model, "model") }?;
        if !torii_proto::clause::is_valid_model_name(model) {
            return Err(DojoError::new(
                ErrorType::InvalidInput,
                format!("Invalid model name: {model}"),
            ));
        }
        unsafe { mut_arg(query, "query") }?.models.push(model.to_string());
        Ok(true)
    })
}

/// # Safety
/// `query` is a live query.
#[no_mangle]
pub unsafe extern "C" fn query_set_no_hashed_keys(query: *mut Query, no_hashed_keys: bool) -> Result<bool> {
    ffi_guard(|| {
        unsafe { mut_arg(query, "query") }?.no_hashed_keys = no_hashed_keys;
        Ok(true)
    })
}

/// # Safety
/// `query` is a live query.
#[no_mangle]
pub unsafe extern "C" fn query_set_historical(query: *mut Query, historical: bool) -> Result<bool> {
    ffi_guard(|| {
        unsafe { mut_arg(query, "query") }?.historical = historical;
        Ok(true)
    })
}

/// Appends the JSON form of `query` to `write`.
///
/// # Safety
/// `query` and `write` are live handles.
#[no_mangle]
pub unsafe extern "C" fn query_to_json(query: *const Query, write: *mut DojoWrite) -> Result<usize> {
    ffi_guard(|| {
        let query = unsafe { ref_arg(query, "query") }?;
        unsafe { mut_arg(write, "write") }?.write_json(query)
    })
}

/// # Safety
/// `query` is null or a query not destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn query_destroy(query: *mut Query) {
    ffi_guard_void(|| drop(unsafe { take_arg(query, "query") }));
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::*;
    use crate::error::{dojo_error_destroy, dojo_error_type};

    #[test]
    fn test_build_query() {
        unsafe {
            let pagination = pagination_new();
            assert!(pagination_set_limit(pagination, 10).is_ok());
            let field = CString::new("created_at").unwrap();
            assert!(pagination_add_order_by(pagination, field.as_ptr(), types::OrderDirection::Desc).is_ok());

            let query = query_new();
            assert!(query_set_pagination(query, pagination).is_ok());
            let model = CString::new("ns-Position").unwrap();
            assert!(query_add_model(query, model.as_ptr()).is_ok());

            let built = &*query;
            assert_eq!(built.pagination.limit, Some(10));
            assert_eq!(built.pagination.order_by.len(), 1);
            assert_eq!(built.models, vec!["ns-Position".to_string()]);
            query_destroy(query);
        }
    }

    #[test]
    fn test_blank_order_by_field() {
        unsafe {
            let pagination = pagination_new();
            let field = CString::new(" ").unwrap();
            let Result::Err(error) =
                pagination_add_order_by(pagination, field.as_ptr(), types::OrderDirection::Asc)
            else {
                panic!("blank field accepted")
            };
            assert_eq!(dojo_error_type(error), ErrorType::InvalidInput);
            dojo_error_destroy(error);
            pagination_destroy(pagination);
        }
    }

    #[test]
    fn test_null_query() {
        unsafe {
            let Result::Err(error) = query_set_historical(std::ptr::null_mut(), true) else {
                panic!("null query accepted")
            };
            assert_eq!(dojo_error_type(error), ErrorType::InvalidInput);
            dojo_error_destroy(error);
        }
    }
}
