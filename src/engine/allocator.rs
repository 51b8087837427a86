use std::collections::BTreeMap;

use super::nutrition::DailyTargets;
use super::profile::MealSlot;

/// Share of the daily calories given to each slot. Dinner is absent: it
/// receives whatever is left so the integer targets always add up.
const BREAKFAST_SHARE: f64 = 0.25;
const LUNCH_SHARE: f64 = 0.30;
const SNACK_SHARE: f64 = 0.10;

/// Split the daily calories into whole-kcal targets per slot.
///
/// Breakfast 25%, lunch 30%, dinner 35%, snack 10%. Rounding drift lands on
/// dinner, so the four values sum exactly to the rounded daily calories.
pub fn allocate(targets: &DailyTargets) -> BTreeMap<MealSlot, u32> {
    let daily = targets.daily_calories.max(0.0).round() as u32;
    let share = |pct: f64| (f64::from(daily) * pct).round() as u32;

    let breakfast = share(BREAKFAST_SHARE);
    let lunch = share(LUNCH_SHARE);
    let snack = share(SNACK_SHARE);
    let dinner = daily.saturating_sub(breakfast + lunch + snack);

    BTreeMap::from([
        (MealSlot::Breakfast, breakfast),
        (MealSlot::Lunch, lunch),
        (MealSlot::Dinner, dinner),
        (MealSlot::Snack, snack),
    ])
}
