//! 通用类型定义

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// 用户 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// 默认页大小
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// 页大小上限
pub const MAX_PAGE_SIZE: u32 = 100;

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// 解析查询参数
    ///
    /// 缺失、无法解析或小于 1 的值回退到默认值，页大小不超过 `max_page_size`
    pub fn parse(page: Option<&str>, page_size: Option<&str>, max_page_size: u32) -> Self {
        let parse_positive = |raw: Option<&str>| {
            raw.and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v >= 1)
                .map(|v| v.min(u32::MAX as i64) as u32)
        };

        let page = parse_positive(page).unwrap_or(1);
        let page_size = parse_positive(page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(max_page_size.max(1));

        Self { page, page_size }
    }

    pub fn offset(&self) -> u32 {
        (self.page.saturating_sub(1)).saturating_mul(self.page_size)
    }

    /// SQL `LIMIT` 参数
    pub fn limit_i64(&self) -> i64 {
        self.page_size as i64
    }

    /// SQL `OFFSET` 参数
    pub fn offset_i64(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * (self.page_size as i64)
    }
}

/// 分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64) as u32
    }

    /// 转换元素类型，保留分页信息
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
