//! Ledger domain models: accounts, budget forecast lines and financial
//! movements. Structurally simpler instances of the same entity contract as
//! tasks and goals.

mod codec;

pub use codec::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name used when an account is saved with a blank name.
pub const DEFAULT_ACCOUNT_NAME: &str = "Cuenta";

/// Label used when a forecast line is saved with a blank label.
pub const DEFAULT_FORECAST_LABEL: &str = "Previsión";

/// Currency assumed when a record carries none.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Direction of a forecast line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LineType {
    #[serde(rename = "INGRESO")]
    Income,
    #[serde(rename = "GASTO")]
    #[default]
    Expense,
}

/// Bank account.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub balance: f64,
    pub order: Option<f64>,
    pub archived: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted: bool,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Account {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            balance: 0.0,
            order: None,
            archived: false,
            created_at: None,
            updated_at: None,
            deleted: false,
        }
    }
}

/// Budget forecast line.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastLine {
    pub id: String,
    pub label: String,
    pub line_type: LineType,
    pub amount: f64,
    pub account_id: Option<String>,
    pub order: Option<f64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted: bool,
}

impl ForecastLine {
    pub fn new(label: impl Into<String>) -> Self {
        ForecastLine {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            line_type: LineType::default(),
            amount: 0.0,
            account_id: None,
            order: None,
            created_at: None,
            updated_at: None,
            deleted: false,
        }
    }
}

/// Financial movement, optionally linked to an account and a forecast line.
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub id: String,
    pub amount: f64,
    /// Strict `YYYY-MM-DD`; invalid values are dropped at canonicalization.
    pub date: Option<String>,
    pub account_id: Option<String>,
    pub forecast_id: Option<String>,
    pub notes: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted: bool,
}

impl Movement {
    pub fn new(amount: f64) -> Self {
        Movement {
            id: Uuid::new_v4().to_string(),
            amount,
            date: None,
            account_id: None,
            forecast_id: None,
            notes: String::new(),
            created_at: None,
            updated_at: None,
            deleted: false,
        }
    }
}
