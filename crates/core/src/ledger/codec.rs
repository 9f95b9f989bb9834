//! Canonical wire codecs for the ledger entities.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::Result;
use crate::utils::parse_strict_date;

use super::{
    Account, ForecastLine, LineType, Movement, DEFAULT_ACCOUNT_NAME, DEFAULT_CURRENCY,
    DEFAULT_FORECAST_LABEL,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccount {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireForecastLine {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_or_default")]
    pub line_type: LineType,
    #[serde(rename = "amountEUR", default, skip_serializing_if = "Option::is_none")]
    pub amount_eur: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMovement {
    pub id: String,
    #[serde(rename = "amountEUR", default)]
    pub amount_eur: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
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

fn strict_date(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|d| parse_strict_date(d).is_some())
        .map(str::to_string)
}

fn stamp(created_at: &Option<String>, now: DateTime<Utc>) -> (Option<String>, Option<String>) {
    let now_str = now.to_rfc3339();
    (
        Some(created_at.clone().unwrap_or_else(|| now_str.clone())),
        Some(now_str),
    )
}

pub fn canonicalize_account(account: &Account) -> WireAccount {
    canonicalize_account_at(account, Utc::now())
}

pub fn canonicalize_account_at(account: &Account, now: DateTime<Utc>) -> WireAccount {
    let (created_at, updated_at) = stamp(&account.created_at, now);
    let balance = finite_or_zero(account.balance);
    WireAccount {
        id: account.id.clone(),
        name: non_empty_trimmed(&account.name)
            .unwrap_or_else(|| DEFAULT_ACCOUNT_NAME.to_string()),
        currency: non_empty_trimmed(&account.currency).filter(|c| c != DEFAULT_CURRENCY),
        balance: (balance != 0.0).then_some(balance),
        order: account.order.filter(|o| o.is_finite()),
        archived: account.archived.then_some(true),
        created_at,
        updated_at,
    }
}

pub fn hydrate_account(wire: &WireAccount) -> Account {
    Account {
        id: wire.id.clone(),
        name: non_empty_trimmed(&wire.name).unwrap_or_else(|| DEFAULT_ACCOUNT_NAME.to_string()),
        currency: wire
            .currency
            .as_deref()
            .and_then(non_empty_trimmed)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        balance: finite_or_zero(wire.balance.unwrap_or(0.0)),
        order: wire.order.filter(|o| o.is_finite()),
        archived: wire.archived.unwrap_or(false),
        created_at: wire.created_at.clone(),
        updated_at: wire.updated_at.clone(),
        deleted: false,
    }
}

pub fn canonicalize_forecast_line(line: &ForecastLine) -> WireForecastLine {
    canonicalize_forecast_line_at(line, Utc::now())
}

pub fn canonicalize_forecast_line_at(
    line: &ForecastLine,
    now: DateTime<Utc>,
) -> WireForecastLine {
    let (created_at, updated_at) = stamp(&line.created_at, now);
    let amount = finite_or_zero(line.amount);
    WireForecastLine {
        id: line.id.clone(),
        label: non_empty_trimmed(&line.label)
            .unwrap_or_else(|| DEFAULT_FORECAST_LABEL.to_string()),
        line_type: line.line_type,
        amount_eur: (amount != 0.0).then_some(amount),
        account_id: non_empty_id(&line.account_id),
        order: line.order.filter(|o| o.is_finite()),
        created_at,
        updated_at,
    }
}

pub fn hydrate_forecast_line(wire: &WireForecastLine) -> ForecastLine {
    ForecastLine {
        id: wire.id.clone(),
        label: non_empty_trimmed(&wire.label)
            .unwrap_or_else(|| DEFAULT_FORECAST_LABEL.to_string()),
        line_type: wire.line_type,
        amount: finite_or_zero(wire.amount_eur.unwrap_or(0.0)),
        account_id: non_empty_id(&wire.account_id),
        order: wire.order.filter(|o| o.is_finite()),
        created_at: wire.created_at.clone(),
        updated_at: wire.updated_at.clone(),
        deleted: false,
    }
}

pub fn canonicalize_movement(movement: &Movement) -> WireMovement {
    canonicalize_movement_at(movement, Utc::now())
}

pub fn canonicalize_movement_at(movement: &Movement, now: DateTime<Utc>) -> WireMovement {
    let (created_at, updated_at) = stamp(&movement.created_at, now);
    WireMovement {
        id: movement.id.clone(),
        amount_eur: finite_or_zero(movement.amount),
        date: strict_date(&movement.date),
        account_id: non_empty_id(&movement.account_id),
        forecast_id: non_empty_id(&movement.forecast_id),
        notes: non_empty_trimmed(&movement.notes),
        created_at,
        updated_at,
    }
}

pub fn hydrate_movement(wire: &WireMovement) -> Movement {
    Movement {
        id: wire.id.clone(),
        amount: finite_or_zero(wire.amount_eur),
        date: strict_date(&wire.date),
        account_id: non_empty_id(&wire.account_id),
        forecast_id: non_empty_id(&wire.forecast_id),
        notes: wire
            .notes
            .as_deref()
            .and_then(non_empty_trimmed)
            .unwrap_or_default(),
        created_at: wire.created_at.clone(),
        updated_at: wire.updated_at.clone(),
        deleted: false,
    }
}

pub fn decode_account(payload: &serde_json::Value) -> Result<Account> {
    let wire: WireAccount = serde_json::from_value(payload.clone())?;
    Ok(hydrate_account(&wire))
}

pub fn encode_account(account: &Account) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(canonicalize_account(account))?)
}

pub fn decode_forecast_line(payload: &serde_json::Value) -> Result<ForecastLine> {
    let wire: WireForecastLine = serde_json::from_value(payload.clone())?;
    Ok(hydrate_forecast_line(&wire))
}

pub fn encode_forecast_line(line: &ForecastLine) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(canonicalize_forecast_line(line))?)
}

pub fn decode_movement(payload: &serde_json::Value) -> Result<Movement> {
    let wire: WireMovement = serde_json::from_value(payload.clone())?;
    Ok(hydrate_movement(&wire))
}

pub fn encode_movement(movement: &Movement) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(canonicalize_movement(movement))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn account_defaults_are_dropped_and_restored() {
        let account = Account::new("  ");
        let wire = canonicalize_account_at(&account, fixed_now());
        assert_eq!(wire.name, DEFAULT_ACCOUNT_NAME);
        assert_eq!(wire.currency, None);
        assert_eq!(wire.balance, None);

        let hydrated = hydrate_account(&wire);
        assert_eq!(hydrated.currency, DEFAULT_CURRENCY);
        assert_eq!(hydrated.balance, 0.0);
        assert!(!hydrated.archived);
    }

    #[test]
    fn account_round_trip_is_idempotent() {
        let mut account = Account::new("Banco Azul");
        account.currency = "USD".to_string();
        account.balance = 1200.5;
        account.archived = true;
        let first = hydrate_account(&canonicalize_account_at(&account, fixed_now()));
        let second = hydrate_account(&canonicalize_account_at(&first, fixed_now()));
        assert_eq!(first, second);
    }

    #[test]
    fn forecast_line_wire_contract() {
        let mut line = ForecastLine::new("Luz");
        line.amount = 80.0;
        line.account_id = Some("acc1".to_string());
        let value = serde_json::to_value(canonicalize_forecast_line_at(&line, fixed_now()))
            .unwrap();
        assert_eq!(value["type"], "GASTO");
        assert_eq!(value["amountEUR"], 80.0);
        assert_eq!(value["accountId"], "acc1");
    }

    #[test]
    fn movement_invalid_date_is_dropped() {
        let mut movement = Movement::new(25.0);
        movement.date = Some("2024-02-30".to_string());
        let wire = canonicalize_movement_at(&movement, fixed_now());
        assert_eq!(wire.date, None);
        assert_eq!(wire.amount_eur, 25.0);
    }
}
