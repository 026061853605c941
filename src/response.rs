//! Output shapes handed back to callers.

use crate::sql::Record;
use serde::Serialize;

/// One page of List results plus the unpaged total.
#[derive(Clone, Debug, Serialize)]
pub struct Page {
    pub data: Vec<Record>,
    pub total: i64,
    pub page: u64,
    /// 0 when the query had no LIMIT.
    pub page_size: u64,
}

impl Page {
    /// Page number and size derived from a rendered `(limit, offset)`.
    pub(crate) fn new(data: Vec<Record>, total: i64, limit: Option<(u64, u64)>) -> Self {
        let (page, page_size) = match limit {
            Some((limit, offset)) if limit > 0 => (offset / limit + 1, limit),
            _ => (1, 0),
        };
        Page {
            data,
            total,
            page,
            page_size,
        }
    }
}

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

pub fn success_one<T: Serialize>(data: T) -> SuccessOne<T> {
    SuccessOne { data, meta: None }
}
