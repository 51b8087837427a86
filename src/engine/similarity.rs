use serde::Serialize;

use super::catalog::{CatalogSnapshot, FoodItem};
use super::profile::DietType;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarFood {
    pub food_name: String,
    pub similarity: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub diet_type: DietType,
}

fn nutrients(f: &FoodItem) -> [f64; 5] {
    [f.calories, f.protein_g, f.carbs_g, f.fat_g, f.fiber_g]
}

fn cosine(a: &[f64; 5], b: &[f64; 5]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Foods whose nutrient profile points the same way as `food_name`'s.
///
/// Each nutrient is scaled by its catalog-wide maximum so calories do not
/// drown out grams. Returns `None` when the food is not in the catalog.
pub fn similar_foods(
    snapshot: &CatalogSnapshot,
    food_name: &str,
    limit: usize,
) -> Option<Vec<SimilarFood>> {
    let anchor = snapshot.find(food_name)?;

    let mut max = [0.0_f64; 5];
    for item in snapshot.items() {
        for (m, v) in max.iter_mut().zip(nutrients(item)) {
            *m = m.max(v);
        }
    }
    let scaled = |f: &FoodItem| {
        let mut v = nutrients(f);
        for (x, m) in v.iter_mut().zip(max) {
            *x = if m > 0.0 { *x / m } else { 0.0 };
        }
        v
    };

    let anchor_vec = scaled(anchor);
    let mut scored: Vec<SimilarFood> = snapshot
        .items()
        .iter()
        .filter(|f| !f.food_name.eq_ignore_ascii_case(&anchor.food_name))
        .map(|f| SimilarFood {
            food_name: f.food_name.clone(),
            similarity: (cosine(&anchor_vec, &scaled(f)) * 1000.0).round() / 1000.0,
            calories: f.calories,
            protein_g: f.protein_g,
            diet_type: f.diet_type,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.food_name.cmp(&b.food_name))
    });
    scored.truncate(limit);
    Some(scored)
}
