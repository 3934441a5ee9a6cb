use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("unknown transaction type `{other}`")),
        }
    }
}

/// A transaction as returned by the backend. The transport encodes
/// `amount` as a decimal string and `transaction_date` as an ISO-8601
/// timestamp; both are coerced to native types here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(with = "decimal")]
    pub amount: f64,
    pub category: String,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// Payload for `POST /api/transactions/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
    pub transaction_date: DateTime<Utc>,
    pub amount: f64,
    pub category: String,
    pub transaction_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Query parameters accepted by the transaction list endpoint.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub transaction_type: Option<TransactionType>,
    pub category: Option<String>,
}

/// A monthly budget row. `spent_amount` and `remaining_amount` are
/// computed server-side and absent on freshly created records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default)]
    pub id: Option<i64>,
    pub month: String,
    #[serde(with = "decimal")]
    pub limit: f64,
    #[serde(default, deserialize_with = "decimal::deserialize_opt")]
    pub spent_amount: Option<f64>,
    #[serde(default, deserialize_with = "decimal::deserialize_opt")]
    pub remaining_amount: Option<f64>,
}

/// Payload for `POST /api/budgets/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewBudget {
    pub month: String,
    pub limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: String,
    #[serde(with = "decimal")]
    pub income: f64,
    #[serde(with = "decimal")]
    pub expenses: f64,
    #[serde(with = "decimal")]
    pub net_balance: f64,
}

/// Label/value pairs backing one chart on the original dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingAnalysis {
    pub monthly_trend: Series,
    pub category_breakdown: Series,
    pub recent_transactions: Vec<Transaction>,
}

/// Query parameters accepted by the spending analysis endpoint.
#[derive(Debug, Clone, Default)]
pub struct AnalysisFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    #[serde(with = "decimal")]
    pub converted_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

/// Serde adapter for backend decimal fields, which arrive either as JSON
/// numbers or as strings like `"123.40"`.
pub(crate) mod decimal {
    use serde::de::{Deserializer, Error, Unexpected};
    use serde::{Deserialize, Serializer};
    use serde_json::Value;

    fn from_value<E: Error>(value: Value) -> Result<f64, E> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| E::custom("decimal out of f64 range")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::invalid_value(Unexpected::Str(&s), &"a decimal string")),
            other => Err(E::custom(format!(
                "expected decimal string or number, got {other}"
            ))),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_value(Value::deserialize(deserializer)?)
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            other => from_value(other).map(Some),
        }
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_amount_is_coerced_from_decimal_string() {
        let data = include_str!("fixtures/transactions.json");
        let transactions: Vec<Transaction> = serde_json::from_str(data).unwrap();

        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].amount, 123.4);
        assert_eq!(transactions[0].transaction_type, TransactionType::Expense);
        assert_eq!(transactions[1].amount, 2500.0);
        assert_eq!(transactions[1].description, None);
    }

    #[test]
    fn transaction_date_is_normalized_to_utc() {
        let data = include_str!("fixtures/transactions.json");
        let transactions: Vec<Transaction> = serde_json::from_str(data).unwrap();

        assert_eq!(
            transactions[0].transaction_date.to_rfc3339(),
            "2024-03-05T09:30:00.123456+00:00"
        );
    }

    #[test]
    fn budget_list_parses_computed_fields() {
        let data = include_str!("fixtures/budgets.json");
        let budgets: Vec<Budget> = serde_json::from_str(data).unwrap();

        assert_eq!(budgets[0].month, "2024-03");
        assert_eq!(budgets[0].limit, 1500.0);
        assert_eq!(budgets[0].spent_amount, Some(400.25));
        assert_eq!(budgets[0].remaining_amount, Some(1099.75));
    }

    #[test]
    fn created_budget_parses_without_computed_fields() {
        let budget: Budget =
            serde_json::from_str(r#"{"id": 7, "month": "2024-04", "limit": "900.00"}"#).unwrap();
        assert_eq!(budget.limit, 900.0);
        assert_eq!(budget.spent_amount, None);
        assert_eq!(budget.remaining_amount, None);
    }

    #[test]
    fn monthly_summary_coerces_all_totals() {
        let data = include_str!("fixtures/monthly_summary.json");
        let summary: MonthlySummary = serde_json::from_str(data).unwrap();

        assert_eq!(summary.income, 3200.0);
        assert_eq!(summary.expenses, 1250.5);
        assert_eq!(summary.net_balance, 1949.5);
    }

    #[test]
    fn spending_analysis_parses_dashboard_shape() {
        let data = include_str!("fixtures/spending_analysis.json");
        let analysis: SpendingAnalysis = serde_json::from_str(data).unwrap();

        assert_eq!(analysis.monthly_trend.labels.len(), 3);
        assert_eq!(analysis.monthly_trend.values[1], 1800.0);
        assert_eq!(analysis.category_breakdown.labels[0], "groceries");
        assert_eq!(analysis.recent_transactions.len(), 1);
    }

    #[test]
    fn malformed_amount_is_a_payload_error() {
        let result = serde_json::from_str::<Transaction>(
            r#"{
                "id": 1,
                "amount": "not-a-number",
                "category": "misc",
                "transaction_type": "expense",
                "transaction_date": "2024-03-05T09:30:00Z"
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn transaction_type_round_trips_through_from_str() {
        assert_eq!("income".parse(), Ok(TransactionType::Income));
        assert_eq!(" Expense ".parse(), Ok(TransactionType::Expense));
        assert!("transfer".parse::<TransactionType>().is_err());
    }
}
