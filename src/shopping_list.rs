//! Shopping list aggregation.
//!
//! Ingredient lines from every recipe in a cart are merged by
//! `(name, measurement unit)` and numbered in the order the key was first seen.

use std::collections::HashMap;

pub const SHOPPING_LIST_HEADER: &str = "Shopping list";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CartIngredientRow {
    pub name: String,
    pub amount: i64,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sums amounts per `(name, unit)`; output order is first-seen order of the key.
pub fn aggregate<I>(rows: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = CartIngredientRow>,
{
    let mut items: Vec<ShoppingItem> = Vec::new();
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    for row in rows {
        let key = (row.name, row.measurement_unit);
        match positions.get(&key) {
            Some(&position) => {
                let item = &mut items[position];
                item.amount = item.amount.saturating_add(row.amount);
            }
            None => {
                positions.insert(key.clone(), items.len());
                items.push(ShoppingItem {
                    name: key.0,
                    measurement_unit: key.1,
                    amount: row.amount,
                });
            }
        }
    }
    items
}

pub fn render_lines(items: &[ShoppingItem]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{}. {} – {} {}",
                i + 1,
                item.name,
                item.amount,
                item.measurement_unit
            )
        })
        .collect()
}

/// Header line followed by one numbered line per item.
pub fn render(items: &[ShoppingItem]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(SHOPPING_LIST_HEADER.to_owned());
    lines.extend(render_lines(items));
    lines.join("\n")
}
