//! Task domain model.

mod codec;
pub mod tree;

pub use codec::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row discriminant: a normal task or a `TITLE` marker row used as a section
/// header inside a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskKind {
    #[serde(rename = "NORMAL")]
    #[default]
    Normal,
    #[serde(rename = "TITLE")]
    Title,
}

/// Task type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskType {
    #[serde(rename = "ACTIVIDAD")]
    #[default]
    Activity,
    #[serde(rename = "INGRESO")]
    Income,
    #[serde(rename = "GASTO")]
    Expense,
}

impl TaskType {
    /// Income and expense rows carry an amount; activities never do.
    pub fn is_financial(self) -> bool {
        matches!(self, TaskType::Income | TaskType::Expense)
    }
}

/// Sub-scope for activity tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "TRABAJO")]
    Work,
    #[serde(rename = "FISICO")]
    Physical,
    #[serde(rename = "CRECIMIENTO")]
    Growth,
}

impl Scope {
    /// Physical and growth activities track a unit/quantity pair.
    pub fn tracks_quantity(self) -> bool {
        matches!(self, Scope::Physical | Scope::Growth)
    }
}

/// Weekday codes used by weekly recurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "LU")]
    Mon,
    #[serde(rename = "MA")]
    Tue,
    #[serde(rename = "MI")]
    Wed,
    #[serde(rename = "JU")]
    Thu,
    #[serde(rename = "VI")]
    Fri,
    #[serde(rename = "SA")]
    Sat,
    #[serde(rename = "DO")]
    Sun,
}

impl Weekday {
    pub fn code(self) -> &'static str {
        match self {
            Weekday::Mon => "LU",
            Weekday::Tue => "MA",
            Weekday::Wed => "MI",
            Weekday::Thu => "JU",
            Weekday::Fri => "VI",
            Weekday::Sat => "SA",
            Weekday::Sun => "DO",
        }
    }
}

/// Recurrence descriptor. `OneOff` without a date is an unscheduled task.
#[derive(Debug, Clone, PartialEq)]
pub enum Recurrence {
    OneOff {
        date: Option<String>,
        time: Option<String>,
    },
    Weekly {
        days: Vec<Weekday>,
        time: Option<String>,
    },
    Monthly {
        day: u8,
        time: Option<String>,
    },
}

impl Default for Recurrence {
    fn default() -> Self {
        Recurrence::OneOff {
            date: None,
            time: None,
        }
    }
}

/// Amount attached to income/expense tasks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Financial {
    pub amount: f64,
}

/// Unit/quantity tracking for physical and growth activities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Physical {
    pub unit: String,
    pub quantity: f64,
}

/// Reminder settings; presence means the reminder is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reminder {
    pub offset_min: i32,
}

/// Fully-defaulted in-memory task. Every field is total: consumers never see
/// an unexpectedly absent value, so equality between hydrated tasks is
/// structural.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub goal_id: Option<String>,
    pub parent_id: Option<String>,
    /// Derived from `parent_id` chains; recomputed at hydration, never
    /// trusted from storage.
    pub level: u32,
    pub order: f64,
    pub kind: TaskKind,
    pub task_type: TaskType,
    /// `None` for TITLE rows; defaults to `Work` for normal tasks.
    pub scope: Option<Scope>,
    pub recurrence: Recurrence,
    pub completed: bool,
    pub points: i32,
    pub title: String,
    pub financial: Option<Financial>,
    pub physical: Option<Physical>,
    pub reminder: Option<Reminder>,
    pub label: String,
    pub notes: String,
    pub completed_dates: Vec<String>,
    pub account_id: Option<String>,
    pub forecast_id: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted: bool,
}

/// Default points for a normal task.
pub const DEFAULT_TASK_POINTS: i32 = 2;

impl Task {
    /// New normal activity task with a fresh id and total defaults.
    pub fn new(title: impl Into<String>) -> Self {
        Task {
            id: Uuid::new_v4().to_string(),
            goal_id: None,
            parent_id: None,
            level: 0,
            order: 0.0,
            kind: TaskKind::Normal,
            task_type: TaskType::Activity,
            scope: Some(Scope::Work),
            recurrence: Recurrence::default(),
            completed: false,
            points: DEFAULT_TASK_POINTS,
            title: title.into(),
            financial: None,
            physical: None,
            reminder: None,
            label: String::new(),
            notes: String::new(),
            completed_dates: Vec::new(),
            account_id: None,
            forecast_id: None,
            created_at: None,
            updated_at: None,
            deleted: false,
        }
    }

    /// New TITLE marker row.
    pub fn new_title(title: impl Into<String>) -> Self {
        Task {
            kind: TaskKind::Title,
            scope: None,
            points: 0,
            ..Task::new(title)
        }
    }
}
