use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub strategy: StrategyKind,
    #[serde(default)]
    pub policy: MatchPolicy,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_tolerance")]
    pub tolerance: Decimal,
    pub statement: StatementConfig,
    #[serde(default)]
    pub ledger: Option<LedgerConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_base_currency() -> String {
    "TRY".into()
}

pub fn default_tolerance() -> Decimal {
    Decimal::ONE
}

// ---------------------------------------------------------------------------
// Strategy + policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Debit/credit statement reconciliation: my debit is their credit.
    Cross,
    /// Invoice verification by document key, total and tax.
    Keyed,
}

impl StrategyKind {
    /// Roles the statement mapping must provide for this strategy.
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Self::Cross => &[Role::Date, Role::Debit, Role::Credit],
            Self::Keyed => &[Role::Date, Role::Key, Role::TotalAmount, Role::TaxAmount],
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cross => write!(f, "cross"),
            Self::Keyed => write!(f, "keyed"),
        }
    }
}

/// How the engine picks among several eligible right records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First eligible record in ledger order.
    #[default]
    FirstMatch,
    /// Eligible record with the smallest summed absolute delta; ties go to
    /// the earliest.
    Closest,
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstMatch => write!(f, "first_match"),
            Self::Closest => write!(f, "closest"),
        }
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Date,
    Debit,
    Credit,
    Key,
    TotalAmount,
    TaxAmount,
    Currency,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Key => "key",
            Self::TotalAmount => "total_amount",
            Self::TaxAmount => "tax_amount",
            Self::Currency => "currency",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role → header label. Chosen by the caller, never inferred.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub debit: Option<String>,
    #[serde(default)]
    pub credit: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub total_amount: Option<String>,
    #[serde(default)]
    pub tax_amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl ColumnMapping {
    pub fn column(&self, role: Role) -> Option<&str> {
        let label = match role {
            Role::Date => &self.date,
            Role::Debit => &self.debit,
            Role::Credit => &self.credit,
            Role::Key => &self.key,
            Role::TotalAmount => &self.total_amount,
            Role::TaxAmount => &self.tax_amount,
            Role::Currency => &self.currency,
        };
        label.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Fail with `MissingRole` on the first role the strategy needs but the
    /// mapping lacks.
    pub fn require(&self, strategy: StrategyKind) -> Result<(), ReconError> {
        for role in strategy.required_roles() {
            if self.column(*role).is_none() {
                return Err(ReconError::MissingRole {
                    role: role.to_string(),
                    strategy: strategy.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StatementConfig {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    pub columns: ColumnMapping,
}

fn default_delimiter() -> char {
    ','
}

/// Where the ledger extract comes from and how it is pre-filtered.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub file: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub columns: LedgerColumns,
}

/// Header labels of a ledger extract. Defaults follow the store's field names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerColumns {
    pub date: String,
    pub debit: String,
    pub credit: String,
    pub fx_net_amount: String,
    pub document_key: String,
    pub tax_amount: String,
    pub currency: String,
    pub account: String,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        Self {
            date: "date".into(),
            debit: "debit".into(),
            credit: "credit".into(),
            fx_net_amount: "fx_net_amount".into(),
            document_key: "document_key".into(),
            tax_amount: "tax_amount".into(),
            currency: "currency".into(),
            account: "account".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub csv: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Config for an in-memory run with no file sources.
    pub fn new(name: impl Into<String>, strategy: StrategyKind, columns: ColumnMapping) -> Self {
        Self {
            name: name.into(),
            strategy,
            policy: MatchPolicy::default(),
            base_currency: default_base_currency(),
            tolerance: default_tolerance(),
            statement: StatementConfig {
                file: None,
                delimiter: default_delimiter(),
                columns,
            },
            ledger: None,
            output: OutputConfig::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.tolerance < Decimal::ZERO {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }

        if self.base_currency.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "base_currency must not be empty".into(),
            ));
        }

        for (name, delimiter) in self.delimiters() {
            if !delimiter.is_ascii() {
                return Err(ReconError::ConfigValidation(format!(
                    "{name} delimiter must be a single ASCII character"
                )));
            }
        }

        if let Some(ref ledger) = self.ledger {
            if let (Some(from), Some(to)) = (ledger.from, ledger.to) {
                if from > to {
                    return Err(ReconError::ConfigValidation(format!(
                        "ledger period is inverted: from {from} is after to {to}"
                    )));
                }
            }
        }

        self.statement.columns.require(self.strategy)
    }

    /// Upper-cased, trimmed base currency.
    pub fn base_currency(&self) -> String {
        self.base_currency.trim().to_uppercase()
    }

    fn delimiters(&self) -> Vec<(&'static str, char)> {
        let mut out = vec![("statement", self.statement.delimiter)];
        if let Some(ref ledger) = self.ledger {
            out.push(("ledger", ledger.delimiter));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
