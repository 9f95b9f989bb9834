//! Goal ("Meta") domain model.

mod codec;

pub use codec::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{add_months, months_between};

/// Title used when a goal is saved with a blank title. Downstream consumers
/// index goals by title with no null-check, so this is never omitted.
pub const DEFAULT_GOAL_TITLE: &str = "Meta sin título";

/// Horizon classification of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Classification {
    #[serde(rename = "LARGO_PLAZO")]
    LongHorizon,
    #[serde(rename = "MEDIO_PLAZO")]
    MediumHorizon,
    #[serde(rename = "CORTO_PLAZO")]
    #[default]
    ShortHorizon,
}

/// Named horizon shortcut; choosing one computes and overwrites the target
/// date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HorizonPreset {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "9M")]
    NineMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "3Y")]
    ThreeYears,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "10Y")]
    TenYears,
}

impl HorizonPreset {
    pub fn months(self) -> u32 {
        match self {
            HorizonPreset::OneMonth => 1,
            HorizonPreset::ThreeMonths => 3,
            HorizonPreset::SixMonths => 6,
            HorizonPreset::NineMonths => 9,
            HorizonPreset::OneYear => 12,
            HorizonPreset::ThreeYears => 36,
            HorizonPreset::FiveYears => 60,
            HorizonPreset::TenYears => 120,
        }
    }
}

/// Derive the classification from a target date: 60+ months out is long
/// horizon, 12+ is medium, anything nearer is short.
pub fn derive_classification(target: NaiveDate, today: NaiveDate) -> Classification {
    let months = months_between(today, target);
    if months >= 60 {
        Classification::LongHorizon
    } else if months >= 12 {
        Classification::MediumHorizon
    } else {
        Classification::ShortHorizon
    }
}

/// Fully-defaulted in-memory goal.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub classification: Classification,
    pub horizon: Option<HorizonPreset>,
    /// Strict `YYYY-MM-DD`; invalid values are dropped at canonicalization.
    pub target_date: Option<String>,
    pub order: Option<f64>,
    pub is_active: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted: bool,
}

impl Goal {
    /// New active short-horizon goal with a fresh id.
    pub fn new(title: impl Into<String>) -> Self {
        Goal {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            classification: Classification::default(),
            horizon: None,
            target_date: None,
            order: None,
            is_active: true,
            created_at: None,
            updated_at: None,
            deleted: false,
        }
    }

    /// Apply a horizon shortcut: compute the target date from `today` and
    /// re-derive the classification from it.
    pub fn apply_horizon(&mut self, preset: HorizonPreset, today: NaiveDate) {
        let target = add_months(today, preset.months());
        self.horizon = Some(preset);
        self.target_date = Some(target.format("%Y-%m-%d").to_string());
        self.classification = derive_classification(target, today);
    }

    /// Pin the classification manually, detaching it from the target date.
    pub fn pin_classification(&mut self, classification: Classification) {
        self.classification = classification;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn classification_thresholds() {
        let today = day(2024, 1, 1);
        assert_eq!(
            derive_classification(day(2029, 1, 1), today),
            Classification::LongHorizon
        );
        assert_eq!(
            derive_classification(day(2028, 12, 31), today),
            Classification::MediumHorizon
        );
        assert_eq!(
            derive_classification(day(2025, 1, 1), today),
            Classification::MediumHorizon
        );
        assert_eq!(
            derive_classification(day(2024, 12, 31), today),
            Classification::ShortHorizon
        );
    }

    #[test]
    fn horizon_preset_overwrites_target_date() {
        let mut goal = Goal::new("Aprender piano");
        goal.target_date = Some("2030-06-01".to_string());
        goal.apply_horizon(HorizonPreset::ThreeMonths, day(2024, 1, 31));
        assert_eq!(goal.target_date.as_deref(), Some("2024-04-30"));
        assert_eq!(goal.classification, Classification::ShortHorizon);
        assert_eq!(goal.horizon, Some(HorizonPreset::ThreeMonths));
    }

    #[test]
    fn ten_year_preset_is_long_horizon() {
        let mut goal = Goal::new("Jubilación");
        goal.apply_horizon(HorizonPreset::TenYears, day(2024, 1, 1));
        assert_eq!(goal.classification, Classification::LongHorizon);
        assert_eq!(goal.target_date.as_deref(), Some("2034-01-01"));
    }
}
