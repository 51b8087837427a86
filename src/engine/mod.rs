//! Meal-plan recommendation engine.
//!
//! Profile -> targets -> per-slot allocation -> filter + rank per slot ->
//! assembled plan with seasonal suggestions. Nothing in here knows about HTTP.

pub mod allocator;
pub mod assembler;
pub mod catalog;
pub mod errors;
pub mod filter;
pub mod nutrition;
pub mod profile;
pub mod seasonal;
pub mod selector;
pub mod similarity;

pub use assembler::{EngineSettings, MealPlan, PlanAssembler};
pub use catalog::{CatalogSource, CatalogStore, FileCatalogSource, PgCatalogSource};
pub use errors::EngineError;
pub use profile::{Profile, ProfileSubmission};
