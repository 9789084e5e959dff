//! Achievements: a static catalog and the rules that unlock entries.
//!
//! Evaluation runs in two modes. Reactive evaluation follows a single user
//! action and fires when a count lands exactly on a threshold. Backfill
//! evaluation looks at the current totals and unlocks everything already
//! earned. Both read through [`AchievementContext`] and rely on unlocks
//! being idempotent.

pub mod catalog;
pub mod evaluator;

pub use catalog::{find, AchievementDefinition, CountTarget, Criteria, EventKind, CATALOG};
pub use evaluator::{backfill, evaluate_event, AchievementContext, Event};
