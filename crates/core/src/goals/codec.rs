//! Canonical wire codec for goals.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::Result;
use crate::utils::parse_strict_date;

use super::{Classification, Goal, HorizonPreset, DEFAULT_GOAL_TITLE};

/// Sparse goal wire record. Shared with other client implementations of the
/// remote store; changes must be additive-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGoal {
    pub id: String,
    /// Always present and non-blank on records this codec produces.
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub classification: Option<Classification>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub horizon: Option<HorizonPreset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    /// Asymmetric encoding: only ever `Some(false)`. Absence means active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn non_empty_trimmed(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Project a goal to its wire record, stamping `updatedAt` with the current
/// instant.
pub fn canonicalize_goal(goal: &Goal) -> WireGoal {
    canonicalize_goal_at(goal, Utc::now())
}

/// Same as [`canonicalize_goal`] with an explicit clock.
pub fn canonicalize_goal_at(goal: &Goal, now: DateTime<Utc>) -> WireGoal {
    let now_str = now.to_rfc3339();
    WireGoal {
        id: goal.id.clone(),
        title: non_empty_trimmed(&goal.title).unwrap_or_else(|| DEFAULT_GOAL_TITLE.to_string()),
        description: non_empty_trimmed(&goal.description),
        classification: Some(goal.classification),
        horizon: goal.horizon,
        target_date: goal
            .target_date
            .as_deref()
            .filter(|d| parse_strict_date(d).is_some())
            .map(str::to_string),
        order: goal.order.filter(|o| o.is_finite()),
        is_active: (!goal.is_active).then_some(false),
        created_at: Some(goal.created_at.clone().unwrap_or_else(|| now_str.clone())),
        updated_at: Some(now_str),
    }
}

/// Reconstruct a fully-defaulted goal from a sparse wire record.
pub fn hydrate_goal(wire: &WireGoal) -> Goal {
    Goal {
        id: wire.id.clone(),
        title: non_empty_trimmed(&wire.title).unwrap_or_else(|| DEFAULT_GOAL_TITLE.to_string()),
        description: wire
            .description
            .as_deref()
            .and_then(non_empty_trimmed)
            .unwrap_or_default(),
        classification: wire.classification.unwrap_or_default(),
        horizon: wire.horizon,
        target_date: wire
            .target_date
            .as_deref()
            .filter(|d| parse_strict_date(d).is_some())
            .map(str::to_string),
        order: wire.order.filter(|o| o.is_finite()),
        // Any absence means active, not just an explicit true.
        is_active: wire.is_active != Some(false),
        created_at: wire.created_at.clone(),
        updated_at: wire.updated_at.clone(),
        deleted: false,
    }
}

/// Decode a goal from an opaque JSON payload as pulled from the remote store.
pub fn decode_goal(payload: &serde_json::Value) -> Result<Goal> {
    let wire: WireGoal = serde_json::from_value(payload.clone())?;
    Ok(hydrate_goal(&wire))
}

/// Encode a goal into the JSON payload pushed to the remote store.
pub fn encode_goal(goal: &Goal) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(canonicalize_goal(goal))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn blank_title_falls_back_to_default() {
        let goal = Goal::new("   ");
        let wire = canonicalize_goal_at(&goal, fixed_now());
        assert_eq!(wire.title, DEFAULT_GOAL_TITLE);

        let sparse: WireGoal =
            serde_json::from_value(serde_json::json!({ "id": "g1", "title": "" })).unwrap();
        assert_eq!(hydrate_goal(&sparse).title, DEFAULT_GOAL_TITLE);
    }

    #[test]
    fn is_active_is_asymmetric_on_the_wire() {
        let mut goal = Goal::new("Leer más");
        let value = serde_json::to_value(canonicalize_goal_at(&goal, fixed_now())).unwrap();
        assert!(value.get("isActive").is_none());

        goal.is_active = false;
        let value = serde_json::to_value(canonicalize_goal_at(&goal, fixed_now())).unwrap();
        assert_eq!(value["isActive"], false);
    }

    #[test]
    fn hydrate_treats_any_absence_as_active() {
        let sparse: WireGoal =
            serde_json::from_value(serde_json::json!({ "id": "g1", "title": "x" })).unwrap();
        assert!(hydrate_goal(&sparse).is_active);

        let explicit: WireGoal = serde_json::from_value(
            serde_json::json!({ "id": "g1", "title": "x", "isActive": true }),
        )
        .unwrap();
        assert!(hydrate_goal(&explicit).is_active);

        let inactive: WireGoal = serde_json::from_value(
            serde_json::json!({ "id": "g1", "title": "x", "isActive": false }),
        )
        .unwrap();
        assert!(!hydrate_goal(&inactive).is_active);
    }

    #[test]
    fn invalid_classification_and_date_degrade() {
        let wire: WireGoal = serde_json::from_value(serde_json::json!({
            "id": "g1",
            "title": "x",
            "classification": "ETERNO",
            "horizon": "2W",
            "targetDate": "2024-02-30"
        }))
        .unwrap();
        let goal = hydrate_goal(&wire);
        assert_eq!(goal.classification, Classification::ShortHorizon);
        assert_eq!(goal.horizon, None);
        assert_eq!(goal.target_date, None);
    }

    #[test]
    fn non_finite_order_is_omitted() {
        let mut goal = Goal::new("x");
        goal.order = Some(f64::NAN);
        let wire = canonicalize_goal_at(&goal, fixed_now());
        assert_eq!(wire.order, None);
    }

    #[test]
    fn round_trip_is_idempotent() {
        let mut goal = Goal::new("  Viajar  ");
        goal.description = " por Asia ".to_string();
        goal.target_date = Some("2026-09-01".to_string());
        goal.horizon = Some(HorizonPreset::ThreeYears);
        goal.is_active = false;
        let first = hydrate_goal(&canonicalize_goal_at(&goal, fixed_now()));
        let second = hydrate_goal(&canonicalize_goal_at(&first, fixed_now()));
        assert_eq!(first, second);
        assert_eq!(first.title, "Viajar");
        assert_eq!(first.description, "por Asia");
        assert!(!first.is_active);
    }
}
