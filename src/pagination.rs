use serde::{Deserialize, Serialize};
use tera::Context;

use crate::{
    errors::{AppError, AppResult},
    repository::PageRequest,
};

/// `?page=N` on list pages.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// A requested 1-based page of a list with a fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page: i64,
    per_page: i64,
}

impl Paginator {
    /// # Errors
    /// [`AppError::NotFound`] when `page` is not a positive integer.
    pub fn from_query(query: &PageQuery, per_page: i64) -> AppResult<Self> {
        let page = match query.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw.parse::<i64>().map_err(|_| AppError::NotFound)?,
        };
        if page < 1 {
            return Err(AppError::NotFound);
        }
        Ok(Self {
            page,
            per_page: per_page.max(1),
        })
    }

    #[must_use]
    pub fn request(&self) -> PageRequest {
        PageRequest {
            limit: self.per_page,
            offset: (self.page - 1).saturating_mul(self.per_page),
        }
    }

    /// Page metadata once the list size is known.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the page lies past the end of the list.
    /// Page 1 of an empty list is allowed.
    pub fn finish(&self, total: i64) -> AppResult<PageInfo> {
        let num_pages = ((total + self.per_page - 1) / self.per_page).max(1);
        if self.page > num_pages {
            return Err(AppError::NotFound);
        }
        Ok(PageInfo {
            page: self.page,
            num_pages,
            is_paginated: num_pages > 1,
            has_previous: self.page > 1,
            has_next: self.page < num_pages,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub num_pages: i64,
    pub is_paginated: bool,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageInfo {
    pub fn insert_into(&self, ctx: &mut Context) {
        ctx.insert("page", &self.page);
        ctx.insert("num_pages", &self.num_pages);
        ctx.insert("is_paginated", &self.is_paginated);
        ctx.insert("has_previous", &self.has_previous);
        ctx.insert("has_next", &self.has_next);
    }
}
