use std::collections::BTreeSet;

use tracing::debug;

use super::catalog::FoodItem;
use super::profile::DietType;

/// Result of narrowing one slot's foods.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome<'a> {
    pub items: Vec<&'a FoodItem>,
    /// Cuisine preferences matched nothing and were dropped for this slot.
    pub cuisine_relaxed: bool,
}

impl FilterOutcome<'_> {
    /// No food survived the diet and allergen constraints.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Hard constraints. Never relaxed.
pub fn is_allowed(item: &FoodItem, diet_type: DietType, allergies: &BTreeSet<String>) -> bool {
    permits(
        item.diet_type,
        item.allergens.iter().map(String::as_str),
        diet_type,
        allergies,
    )
}

/// Diet and allergen check on bare tags, for foods that are not catalog records.
pub fn permits<'a>(
    food_diet: DietType,
    mut food_allergens: impl Iterator<Item = &'a str>,
    diet_type: DietType,
    allergies: &BTreeSet<String>,
) -> bool {
    food_diet.satisfies(diet_type) && !food_allergens.any(|a| allergies.contains(a))
}

fn matches_cuisine(item: &FoodItem, cuisines: Option<&BTreeSet<String>>) -> bool {
    match cuisines {
        Some(wanted) if !wanted.is_empty() => wanted.contains(&item.cuisine_type),
        _ => true,
    }
}

/// Keep foods that fit the diet, avoid every allergen and, when preferences
/// are given, belong to a preferred cuisine. Catalog order is preserved.
///
/// If the cuisine preference empties the list it is dropped and the hard
/// constraints are applied alone. `allergies` and `cuisines` are expected in
/// lowercase, as produced by profile validation.
pub fn filter_candidates<'a, I>(
    items: I,
    diet_type: DietType,
    allergies: &BTreeSet<String>,
    cuisines: Option<&BTreeSet<String>>,
) -> FilterOutcome<'a>
where
    I: IntoIterator<Item = &'a FoodItem>,
{
    let allowed: Vec<&FoodItem> = items
        .into_iter()
        .filter(|item| is_allowed(item, diet_type, allergies))
        .collect();

    let preferred: Vec<&FoodItem> = allowed
        .iter()
        .copied()
        .filter(|item| matches_cuisine(item, cuisines))
        .collect();

    if !preferred.is_empty() || allowed.is_empty() {
        return FilterOutcome {
            items: preferred,
            cuisine_relaxed: false,
        };
    }

    debug!(
        cuisines = ?cuisines,
        candidates = allowed.len(),
        "no food matches cuisine preference; relaxing cuisine"
    );
    FilterOutcome {
        items: allowed,
        cuisine_relaxed: true,
    }
}
