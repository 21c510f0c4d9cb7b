mod request;
mod response;
mod wrapper;

pub use request::*;
pub use response::*;
pub use wrapper::*;

use serde::{Deserialize, Serialize};

use crate::errors::RequestError;

/// Raw query string pairs, in order; repeated keys are kept.
pub type QueryPairs = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn from_pairs(pairs: &[(String, String)], default_limit: u32) -> Result<Self, RequestError> {
        let page = parse_positive(pairs, "page")?.unwrap_or(1);
        let limit = parse_positive(pairs, "limit")?.unwrap_or(default_limit);
        Ok(Pagination { page, limit })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeQueryParams {
    pub tags: Vec<String>,
    pub author: Option<i64>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub pagination: Pagination,
}

impl RecipeQueryParams {
    pub fn from_pairs(pairs: &[(String, String)], default_limit: u32) -> Result<Self, RequestError> {
        let tags = pairs
            .iter()
            .filter(|(key, value)| key == "tags" && !value.is_empty())
            .map(|(_, value)| value.clone())
            .collect();
        let author = match last_value(pairs, "author") {
            Some(value) => Some(
                value
                    .parse::<i64>()
                    .map_err(|_| RequestError::validation("author must be a user id"))?,
            ),
            None => None,
        };
        Ok(RecipeQueryParams {
            tags,
            author,
            is_favorited: parse_flag(pairs, "is_favorited")?,
            is_in_shopping_cart: parse_flag(pairs, "is_in_shopping_cart")?,
            pagination: Pagination::from_pairs(pairs, default_limit)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionQueryParams {
    pub recipes_limit: Option<u32>,
    pub pagination: Pagination,
}

impl SubscriptionQueryParams {
    pub fn from_pairs(pairs: &[(String, String)], default_limit: u32) -> Result<Self, RequestError> {
        let recipes_limit = match last_value(pairs, "recipes_limit") {
            Some(value) => Some(
                value
                    .parse::<u32>()
                    .map_err(|_| RequestError::validation("recipes_limit must be a number"))?,
            ),
            None => None,
        };
        Ok(SubscriptionQueryParams {
            recipes_limit,
            pagination: Pagination::from_pairs(pairs, default_limit)?,
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct IngredientQueryParams {
    #[serde(default)]
    pub name: Option<String>,
}

fn last_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.as_str())
}

fn parse_positive(pairs: &[(String, String)], key: &'static str) -> Result<Option<u32>, RequestError> {
    match last_value(pairs, key) {
        Some(value) => match value.parse::<u32>() {
            Ok(number) if number > 0 => Ok(Some(number)),
            _ => Err(RequestError::validation(format!(
                "{} must be a positive number",
                key
            ))),
        },
        None => Ok(None),
    }
}

fn parse_flag(pairs: &[(String, String)], key: &'static str) -> Result<bool, RequestError> {
    match last_value(pairs, key) {
        Some("1") | Some("true") | Some("True") => Ok(true),
        Some("0") | Some("false") | Some("False") | None => Ok(false),
        Some(_) => Err(RequestError::validation(format!(
            "{} must be 0 or 1",
            key
        ))),
    }
}
