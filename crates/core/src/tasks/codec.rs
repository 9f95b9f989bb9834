//! Canonical wire codec for tasks.
//!
//! `canonicalize` projects a rich in-memory [`Task`] to its minimal wire
//! form, degrading invalid field combinations to the nearest valid lesser
//! state; `hydrate` reconstructs a fully-defaulted task from a possibly
//! sparse record. The two are not inverses (canonicalize is lossy by
//! design), but the round trip is idempotent:
//! `hydrate(canonicalize(hydrate(w))) == hydrate(w)`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::Result;
use crate::utils::{parse_strict_date, valid_hhmm};

use super::{
    Financial, Physical, Recurrence, Reminder, Scope, Task, TaskKind, TaskType,
    Weekday, DEFAULT_TASK_POINTS,
};

/// Recurrence kind marker carried in the extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecurrenceTag {
    #[serde(rename = "UNICO")]
    #[default]
    OneOff,
    #[serde(rename = "SEMANAL")]
    Weekly,
    #[serde(rename = "MENSUAL")]
    Monthly,
}

/// Extension block of the task wire record. Every field is omitted unless it
/// carries non-default data; foreign values that fail to parse are treated
/// as absent rather than failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WireTaskExtra {
    #[serde(deserialize_with = "lenient_or_default")]
    pub recurrence: RecurrenceTag,
    #[serde(rename = "amountEUR", skip_serializing_if = "Option::is_none")]
    pub amount_eur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_dates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_id: Option<String>,
}

/// Sparse task wire record. This shape is shared with other client
/// implementations of the remote store; changes must be additive-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub kind: TaskKind,
    #[serde(rename = "type", default, deserialize_with = "lenient_or_default")]
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_rule: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_weekdays",
        skip_serializing_if = "Option::is_none"
    )]
    pub weekly_days: Option<Vec<Weekday>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_time: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub monthly_day: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default)]
    pub extra: WireTaskExtra,
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

fn lenient_or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_weekdays<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<Weekday>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

fn non_empty_trimmed(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn non_empty_id(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(non_empty_trimmed)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn normalized_days(days: &[Weekday]) -> Vec<Weekday> {
    let mut days = days.to_vec();
    days.sort();
    days.dedup();
    days
}

fn normalized_dates(dates: &[String]) -> Vec<String> {
    dates
        .iter()
        .filter_map(|d| non_empty_trimmed(d))
        .collect()
}

fn weekly_rule(days: &[Weekday], time: Option<&str>) -> String {
    let codes = days
        .iter()
        .map(|d| d.code())
        .collect::<Vec<_>>()
        .join(",");
    match time {
        Some(t) => format!("SEMANAL:{codes}@{t}"),
        None => format!("SEMANAL:{codes}"),
    }
}

fn monthly_rule(day: u8, time: Option<&str>) -> String {
    match time {
        Some(t) => format!("MENSUAL:{day}@{t}"),
        None => format!("MENSUAL:{day}"),
    }
}

/// Effective recurrence after degradation: weekly needs a non-empty day-set,
/// monthly a day in 1..=31, one-off a strictly valid calendar date. Times are
/// validated independently and dropped silently when malformed.
fn effective_recurrence(recurrence: &Recurrence) -> Recurrence {
    match recurrence {
        Recurrence::Weekly { days, time } if !days.is_empty() => Recurrence::Weekly {
            days: normalized_days(days),
            time: time
                .as_deref()
                .and_then(valid_hhmm)
                .map(str::to_string),
        },
        Recurrence::Monthly { day, time } if (1..=31).contains(day) => Recurrence::Monthly {
            day: *day,
            time: time
                .as_deref()
                .and_then(valid_hhmm)
                .map(str::to_string),
        },
        Recurrence::OneOff { date, time } => {
            let date = date
                .as_deref()
                .filter(|d| parse_strict_date(d).is_some())
                .map(str::to_string);
            let time = if date.is_some() {
                time.as_deref().and_then(valid_hhmm).map(str::to_string)
            } else {
                None
            };
            Recurrence::OneOff { date, time }
        }
        // Degenerate weekly/monthly fall all the way to unscheduled.
        _ => Recurrence::OneOff {
            date: None,
            time: None,
        },
    }
}

/// Project a task to its wire record, stamping `updatedAt` with the current
/// instant. Canonicalize is a save-time operation and is impure in exactly
/// this one respect.
pub fn canonicalize(task: &Task) -> WireTask {
    canonicalize_at(task, Utc::now())
}

/// Same as [`canonicalize`] with an explicit clock.
pub fn canonicalize_at(task: &Task, now: DateTime<Utc>) -> WireTask {
    let now_str = now.to_rfc3339();
    let created_at = task.created_at.clone().unwrap_or_else(|| now_str.clone());

    let mut wire = WireTask {
        id: task.id.clone(),
        kind: task.kind,
        task_type: task.task_type,
        title: non_empty_trimmed(&task.title),
        points: Some(task.points),
        goal_id: None,
        parent_id: None,
        order: None,
        scope: None,
        date: None,
        time: None,
        repeat_rule: None,
        weekly_days: None,
        weekly_time: None,
        monthly_day: None,
        monthly_time: None,
        completed: None,
        extra: WireTaskExtra::default(),
        created_at: Some(created_at),
        updated_at: Some(now_str),
    };

    // A TITLE row is a bare marker: id/kind/type/title/points/timestamps and
    // a one-off recurrence tag, nothing else.
    if task.kind == TaskKind::Title {
        return wire;
    }

    wire.goal_id = non_empty_id(&task.goal_id);
    wire.parent_id = non_empty_id(&task.parent_id);
    wire.order = task.order.is_finite().then_some(task.order);
    wire.completed = task.completed.then_some(true);
    if let Some(scope) = task.scope {
        if scope != Scope::Work {
            wire.scope = Some(scope);
        }
    }

    match effective_recurrence(&task.recurrence) {
        Recurrence::Weekly { days, time } => {
            wire.extra.recurrence = RecurrenceTag::Weekly;
            wire.repeat_rule = Some(weekly_rule(&days, time.as_deref()));
            wire.weekly_days = Some(days);
            wire.weekly_time = time;
        }
        Recurrence::Monthly { day, time } => {
            wire.extra.recurrence = RecurrenceTag::Monthly;
            wire.repeat_rule = Some(monthly_rule(day, time.as_deref()));
            wire.monthly_day = Some(day);
            wire.monthly_time = time;
        }
        Recurrence::OneOff { date, time } => {
            wire.extra.recurrence = RecurrenceTag::OneOff;
            wire.date = date;
            wire.time = time;
        }
    }

    // Financial rows always carry an amount; an invalid in-memory value is
    // coerced to zero rather than omitted so a stale remote amount cannot
    // resurface on the next pull.
    if task.task_type.is_financial() {
        let amount = task.financial.map(|f| f.amount).unwrap_or(0.0);
        wire.extra.amount_eur = Some(finite_or_zero(amount));
    }

    if task.scope.is_some_and(Scope::tracks_quantity) {
        if let Some(physical) = &task.physical {
            wire.extra.unit = non_empty_trimmed(&physical.unit);
            wire.extra.quantity = (physical.quantity.is_finite()
                && physical.quantity != 0.0)
                .then_some(physical.quantity);
        }
    }

    if let Some(reminder) = task.reminder {
        wire.extra.reminder_min = Some(reminder.offset_min);
    }

    wire.extra.label = non_empty_trimmed(&task.label);
    wire.extra.notes = non_empty_trimmed(&task.notes);
    let dates = normalized_dates(&task.completed_dates);
    if !dates.is_empty() {
        wire.extra.completed_dates = Some(dates);
    }
    wire.extra.account_id = non_empty_id(&task.account_id);
    wire.extra.forecast_id = non_empty_id(&task.forecast_id);

    wire
}

/// Reconstruct a fully-defaulted task from a sparse wire record. Applies the
/// same degradations as canonicalize so that the round trip is idempotent.
pub fn hydrate(wire: &WireTask) -> Task {
    let title = wire
        .title
        .as_deref()
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if wire.kind == TaskKind::Title {
        return Task {
            id: wire.id.clone(),
            points: wire.points.unwrap_or(0),
            title,
            created_at: wire.created_at.clone(),
            updated_at: wire.updated_at.clone(),
            ..Task::new_title("")
        };
    }

    let scope = wire.scope.unwrap_or(Scope::Work);

    let recurrence = match wire.extra.recurrence {
        RecurrenceTag::Weekly => Recurrence::Weekly {
            days: wire.weekly_days.clone().unwrap_or_default(),
            time: wire.weekly_time.clone(),
        },
        RecurrenceTag::Monthly => Recurrence::Monthly {
            day: wire.monthly_day.unwrap_or(0),
            time: wire.monthly_time.clone(),
        },
        RecurrenceTag::OneOff => Recurrence::OneOff {
            date: wire.date.clone(),
            time: wire.time.clone(),
        },
    };

    let financial = wire.task_type.is_financial().then(|| Financial {
        amount: finite_or_zero(wire.extra.amount_eur.unwrap_or(0.0)),
    });
    let physical = scope.tracks_quantity().then(|| Physical {
        unit: wire
            .extra
            .unit
            .as_deref()
            .and_then(non_empty_trimmed)
            .unwrap_or_default(),
        quantity: finite_or_zero(wire.extra.quantity.unwrap_or(0.0)),
    });

    Task {
        id: wire.id.clone(),
        goal_id: non_empty_id(&wire.goal_id),
        parent_id: non_empty_id(&wire.parent_id),
        level: 0,
        order: finite_or_zero(wire.order.unwrap_or(0.0)),
        kind: TaskKind::Normal,
        task_type: wire.task_type,
        scope: Some(scope),
        recurrence: effective_recurrence(&recurrence),
        completed: wire.completed.unwrap_or(false),
        points: wire.points.unwrap_or(DEFAULT_TASK_POINTS),
        title,
        financial,
        physical,
        reminder: wire.extra.reminder_min.map(|offset_min| Reminder { offset_min }),
        label: wire
            .extra
            .label
            .as_deref()
            .and_then(non_empty_trimmed)
            .unwrap_or_default(),
        notes: wire
            .extra
            .notes
            .as_deref()
            .and_then(non_empty_trimmed)
            .unwrap_or_default(),
        completed_dates: wire
            .extra
            .completed_dates
            .as_deref()
            .map(normalized_dates)
            .unwrap_or_default(),
        account_id: non_empty_id(&wire.extra.account_id),
        forecast_id: non_empty_id(&wire.extra.forecast_id),
        created_at: wire.created_at.clone(),
        updated_at: wire.updated_at.clone(),
        deleted: false,
    }
}

/// Decode a task from an opaque JSON payload as pulled from the remote store.
pub fn decode_task(payload: &serde_json::Value) -> Result<Task> {
    let wire: WireTask = serde_json::from_value(payload.clone())?;
    Ok(hydrate(&wire))
}

/// Encode a task into the JSON payload pushed to the remote store.
pub fn encode_task(task: &Task) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(canonicalize(task))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn rich_task() -> Task {
        Task {
            goal_id: Some("g1".to_string()),
            parent_id: Some("p1".to_string()),
            order: 3.5,
            task_type: TaskType::Expense,
            recurrence: Recurrence::OneOff {
                date: Some("2024-03-01".to_string()),
                time: Some("08:30".to_string()),
            },
            financial: Some(Financial { amount: 500.0 }),
            label: "alquiler".to_string(),
            account_id: Some("acc1".to_string()),
            ..Task::new("Pay rent")
        }
    }

    #[test]
    fn round_trip_is_idempotent() {
        let task = rich_task();
        let first = hydrate(&canonicalize_at(&task, fixed_now()));
        let second = hydrate(&canonicalize_at(&first, fixed_now()));
        assert_eq!(first, second);
    }

    #[test]
    fn round_trip_is_idempotent_for_foreign_records() {
        // A record another client wrote: stray fields, unvalidated time.
        let payload = serde_json::json!({
            "id": "t1",
            "type": "ACTIVIDAD",
            "title": "  correr  ",
            "scope": "FISICO",
            "time": "08:00",
            "extra": {
                "recurrence": "UNICO",
                "amountEUR": 12.0,
                "unit": " km ",
                "quantity": 5.0,
                "label": "  "
            }
        });
        let wire: WireTask = serde_json::from_value(payload).unwrap();
        let first = hydrate(&wire);
        let second = hydrate(&canonicalize_at(&first, fixed_now()));
        assert_eq!(first, second);
        // Activity tasks never carry an amount; a dateless time is dropped.
        assert_eq!(first.financial, None);
        assert_eq!(
            first.recurrence,
            Recurrence::OneOff { date: None, time: None }
        );
        assert_eq!(first.title, "correr");
        assert_eq!(
            first.physical,
            Some(Physical { unit: "km".to_string(), quantity: 5.0 })
        );
    }

    #[test]
    fn weekly_without_days_degrades_to_unscheduled() {
        let task = Task {
            recurrence: Recurrence::Weekly {
                days: Vec::new(),
                time: Some("09:00".to_string()),
            },
            ..Task::new("entrenar")
        };
        let wire = canonicalize_at(&task, fixed_now());
        assert_eq!(wire.extra.recurrence, RecurrenceTag::OneOff);
        assert_eq!(wire.weekly_days, None);
        assert_eq!(wire.weekly_time, None);
        assert_eq!(wire.repeat_rule, None);
        assert_eq!(wire.date, None);
    }

    #[test]
    fn monthly_out_of_range_degrades_to_unscheduled() {
        let task = Task {
            recurrence: Recurrence::Monthly {
                day: 32,
                time: None,
            },
            ..Task::new("pagar recibo")
        };
        let wire = canonicalize_at(&task, fixed_now());
        assert_eq!(wire.extra.recurrence, RecurrenceTag::OneOff);
        assert_eq!(wire.monthly_day, None);
        assert_eq!(wire.repeat_rule, None);
    }

    #[test]
    fn weekly_rule_embeds_sorted_days_and_time() {
        let task = Task {
            recurrence: Recurrence::Weekly {
                days: vec![Weekday::Fri, Weekday::Mon, Weekday::Fri],
                time: Some("08:30".to_string()),
            },
            ..Task::new("gimnasio")
        };
        let wire = canonicalize_at(&task, fixed_now());
        assert_eq!(wire.repeat_rule.as_deref(), Some("SEMANAL:LU,VI@08:30"));
        assert_eq!(
            wire.weekly_days,
            Some(vec![Weekday::Mon, Weekday::Fri])
        );
    }

    #[test]
    fn malformed_time_is_dropped_silently() {
        let task = Task {
            recurrence: Recurrence::Weekly {
                days: vec![Weekday::Mon],
                time: Some("25:00".to_string()),
            },
            ..Task::new("gimnasio")
        };
        let wire = canonicalize_at(&task, fixed_now());
        assert_eq!(wire.repeat_rule.as_deref(), Some("SEMANAL:LU"));
        assert_eq!(wire.weekly_time, None);
    }

    #[test]
    fn title_row_emits_only_marker_fields() {
        let task = Task {
            goal_id: Some("g1".to_string()),
            parent_id: Some("p1".to_string()),
            account_id: Some("acc1".to_string()),
            forecast_id: Some("f1".to_string()),
            recurrence: Recurrence::OneOff {
                date: Some("2024-03-01".to_string()),
                time: Some("08:00".to_string()),
            },
            ..Task::new_title("Finanzas")
        };
        let wire = canonicalize_at(&task, fixed_now());
        let value = serde_json::to_value(&wire).unwrap();
        let object = value.as_object().unwrap();
        for key in ["date", "time", "repeatRule", "goalId", "parentId"] {
            assert!(!object.contains_key(key), "unexpected key {key}");
        }
        let extra = object.get("extra").and_then(|e| e.as_object()).unwrap();
        assert_eq!(extra.get("recurrence").unwrap(), "UNICO");
        assert!(!extra.contains_key("accountId"));
        assert!(!extra.contains_key("forecastId"));
        assert_eq!(object.get("points").unwrap(), 0);

        let hydrated = hydrate(&wire);
        assert_eq!(hydrated.scope, None);
        assert_eq!(hydrated.points, 0);
    }

    #[test]
    fn amount_only_for_financial_types_and_coerced_when_invalid() {
        let mut task = rich_task();
        task.financial = Some(Financial { amount: f64::NAN });
        let wire = canonicalize_at(&task, fixed_now());
        assert_eq!(wire.extra.amount_eur, Some(0.0));

        task.task_type = TaskType::Activity;
        let wire = canonicalize_at(&task, fixed_now());
        assert_eq!(wire.extra.amount_eur, None);
    }

    #[test]
    fn expense_payload_matches_wire_contract() {
        let wire = canonicalize_at(&rich_task(), fixed_now());
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["type"], "GASTO");
        assert_eq!(value["extra"]["amountEUR"], 500.0);
        assert_eq!(value["date"], "2024-03-01");
        assert!(value.get("repeatRule").is_none());
        assert_eq!(value["extra"]["label"], "alquiler");
    }

    #[test]
    fn hydrate_defaults_are_total() {
        let wire: WireTask =
            serde_json::from_value(serde_json::json!({ "id": "t9" })).unwrap();
        let task = hydrate(&wire);
        assert_eq!(task.kind, TaskKind::Normal);
        assert_eq!(task.task_type, TaskType::Activity);
        assert_eq!(task.scope, Some(Scope::Work));
        assert_eq!(task.points, DEFAULT_TASK_POINTS);
        assert_eq!(task.order, 0.0);
        assert_eq!(
            task.recurrence,
            Recurrence::OneOff { date: None, time: None }
        );
        assert!(!task.completed);
    }

    #[test]
    fn unknown_enum_values_fall_back_instead_of_failing() {
        let wire: WireTask = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "kind": "WHAT",
            "type": "OTRO",
            "scope": "DESCONOCIDO",
            "extra": { "recurrence": "ANUAL" }
        }))
        .unwrap();
        assert_eq!(wire.kind, TaskKind::Normal);
        assert_eq!(wire.task_type, TaskType::Activity);
        assert_eq!(wire.scope, None);
        assert_eq!(wire.extra.recurrence, RecurrenceTag::OneOff);
    }
}
