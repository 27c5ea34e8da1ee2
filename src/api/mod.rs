use axum::Router;
use serde::Serialize;

pub mod admin;
pub mod auth;
pub mod club;
pub mod notification;
pub mod users;

pub fn app() -> Router {
    Router::new()
        .nest("/auth", auth::app())
        .nest("/users", users::app())
        .nest("/clubs", club::app())
        .nest("/admin", admin::app())
        .nest("/notifications", notification::app())
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination { page: 1, limit: 10 }
    }
}

impl Pagination {
    /// Builds a normalized pagination from optional `page`/`limit` query
    /// parameters.
    pub fn from_params(page: Option<i64>, limit: Option<i64>) -> Pagination {
        Pagination {
            page: page.unwrap_or(1),
            limit: limit.unwrap_or(10),
        }
        .normalized()
    }

    pub fn normalized(self) -> Pagination {
        Pagination {
            page: self.page.max(1),
            limit: self.limit.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current: i64,
    pub pages: i64,
    pub total: i64,
    pub limit: i64,
}

impl PageInfo {
    pub fn new(pagination: Pagination, total: i64) -> PageInfo {
        PageInfo {
            current: pagination.page,
            pages: (total + pagination.limit - 1) / pagination.limit,
            total,
            limit: pagination.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_normalizes_out_of_range_input() {
        let p = Pagination { page: 0, limit: 0 }.normalized();
        assert_eq!((p.page, p.limit), (1, 1));
        let p = Pagination {
            page: 3,
            limit: 1000,
        }
        .normalized();
        assert_eq!((p.page, p.limit), (3, 100));
    }

    #[test]
    fn page_info_rounds_page_count_up() {
        let p = Pagination { page: 2, limit: 10 };
        let info = PageInfo::new(p, 21);
        assert_eq!(info.pages, 3);
        assert_eq!(info.current, 2);
        assert_eq!(p.offset(), 10);
    }

    #[test]
    fn page_info_handles_empty_result() {
        let info = PageInfo::new(Pagination::default(), 0);
        assert_eq!(info.pages, 0);
    }
}
