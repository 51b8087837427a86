use std::cmp::Ordering;

use super::catalog::FoodItem;

/// Order candidates closest-first to `target_calories`.
///
/// Equal distances prefer more protein, then the lexicographically smaller
/// name. Nothing is dropped: far-off foods stay at the tail.
pub fn rank_options<'a>(mut items: Vec<&'a FoodItem>, target_calories: u32) -> Vec<&'a FoodItem> {
    let target = f64::from(target_calories);
    items.sort_by(|a, b| compare(a, b, target));
    items
}

fn compare(a: &FoodItem, b: &FoodItem, target: f64) -> Ordering {
    let da = (a.calories - target).abs();
    let db = (b.calories - target).abs();
    da.total_cmp(&db)
        .then_with(|| b.protein_g.total_cmp(&a.protein_g))
        .then_with(|| a.food_name.cmp(&b.food_name))
}
