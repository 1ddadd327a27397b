//! Read-only reference data
//!
//! Synthetic profile tables loaded once from CSV fixtures at startup and
//! exposed to prompt assembly. Nothing in the session mutates these; they
//! seed the demo financial profile the agents reason over.

use crate::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Income")]
    pub income: f64,
    #[serde(rename = "Risk Profile")]
    pub risk_profile: String,
    #[serde(rename = "Savings Balance")]
    pub savings_balance: f64,
    #[serde(rename = "Checking Balance")]
    pub checking_balance: f64,
    #[serde(rename = "Employment Type")]
    pub employment_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Transaction Date and Time")]
    pub date_time: String,
    #[serde(rename = "Transaction Amount")]
    pub amount: f64,
    #[serde(rename = "Merchant Name")]
    pub merchant_name: String,
    #[serde(rename = "Merchant Category")]
    pub merchant_category: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetRecord {
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Monthly Limit")]
    pub monthly_limit: f64,
    #[serde(rename = "Spent So Far")]
    pub spent_so_far: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRecord {
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Merchant Name")]
    pub merchant_name: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "Frequency")]
    pub frequency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationRecord {
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Total Portfolio Value")]
    pub portfolio_value: f64,
    #[serde(rename = "Cash %")]
    pub cash_pct: f64,
    #[serde(rename = "Bonds %")]
    pub bonds_pct: f64,
    #[serde(rename = "Large Cap %")]
    pub large_cap_pct: f64,
    #[serde(rename = "Mid Cap %")]
    pub mid_cap_pct: f64,
    #[serde(rename = "Small Cap %")]
    pub small_cap_pct: f64,
    #[serde(rename = "International %")]
    pub international_pct: f64,
    #[serde(rename = "Real Estate %")]
    pub real_estate_pct: f64,
    #[serde(rename = "Commodities %")]
    pub commodities_pct: f64,
}

/// In-memory view of all fixture tables.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub profiles: Vec<UserProfile>,
    pub transactions: Vec<TransactionRecord>,
    pub budgets: Vec<BudgetRecord>,
    pub subscriptions: Vec<SubscriptionRecord>,
    pub allocations: Vec<AllocationRecord>,
}

impl ReferenceData {
    /// Empty tables, for sessions running without the demo profile.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every table found under `data_path`. Individual missing files
    /// leave their table empty; a present-but-unreadable file is an error.
    pub fn load(data_path: &str) -> Result<Self> {
        let base = Path::new(data_path);

        let data = Self {
            profiles: load_table(&base.join("user_profile_data.csv"))?,
            transactions: load_table(&base.join("transactions_data.csv"))?,
            budgets: load_table(&base.join("budget_data.csv"))?,
            subscriptions: load_table(&base.join("subscription_data.csv"))?,
            allocations: load_table(&base.join("current_asset_allocation.csv"))?,
        };

        info!(
            profiles = data.profiles.len(),
            transactions = data.transactions.len(),
            budgets = data.budgets.len(),
            subscriptions = data.subscriptions.len(),
            allocations = data.allocations.len(),
            "Reference data loaded"
        );

        Ok(data)
    }

    pub fn profile(&self, customer_id: &str) -> Option<&UserProfile> {
        self.profiles
            .iter()
            .find(|p| p.customer_id.eq_ignore_ascii_case(customer_id))
    }

    /// Most recent transactions for a customer, newest first.
    pub fn recent_transactions(&self, customer_id: &str, n: usize) -> Vec<&TransactionRecord> {
        let mut rows: Vec<_> = self
            .transactions
            .iter()
            .filter(|t| t.customer_id.eq_ignore_ascii_case(customer_id))
            .collect();
        rows.sort_by(|a, b| b.date_time.cmp(&a.date_time));
        rows.truncate(n);
        rows
    }

    pub fn allocation(&self, customer_id: &str) -> Option<&AllocationRecord> {
        self.allocations
            .iter()
            .find(|a| a.customer_id.eq_ignore_ascii_case(customer_id))
    }

    /// User context block included in agent prompts: profile facts plus a
    /// one-line summary of recent spending.
    pub fn user_context(&self, customer_id: &str) -> String {
        let Some(profile) = self.profile(customer_id) else {
            return format!("Customer: {} (no profile on record)", customer_id);
        };

        let recent = self.recent_transactions(customer_id, 5);
        let spending = if recent.is_empty() {
            "No recent transactions".to_string()
        } else {
            recent
                .iter()
                .map(|t| format!("{} (${:.2})", t.merchant_name, t.amount))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let subscriptions: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|s| s.customer_id.eq_ignore_ascii_case(customer_id))
            .map(|s| format!("{} (${:.2} {})", s.merchant_name, s.amount, s.frequency))
            .collect();

        let mut out = format!(
            "Customer: {} ({})\nAge: {}\nIncome: ${:.2}\nRisk profile: {}\n\
             Savings balance: ${:.2}\nChecking balance: ${:.2}\nEmployment: {}\n\
             Recent transactions: {}\n",
            profile.name,
            profile.customer_id,
            profile.age,
            profile.income,
            profile.risk_profile,
            profile.savings_balance,
            profile.checking_balance,
            profile.employment_type,
            spending,
        );

        if !subscriptions.is_empty() {
            out.push_str(&format!("Subscriptions: {}\n", subscriptions.join(", ")));
        }

        if let Some(allocation) = self.allocation(customer_id) {
            out.push_str(&format!(
                "Portfolio: ${:.2} (cash {:.1}%, bonds {:.1}%, large cap {:.1}%, \
                 mid cap {:.1}%, small cap {:.1}%, international {:.1}%, \
                 real estate {:.1}%, commodities {:.1}%)\n",
                allocation.portfolio_value,
                allocation.cash_pct,
                allocation.bonds_pct,
                allocation.large_cap_pct,
                allocation.mid_cap_pct,
                allocation.small_cap_pct,
                allocation.international_pct,
                allocation.real_estate_pct,
                allocation.commodities_pct,
            ));
        }

        out
    }

    /// Budget summary lines for the transaction-analysis prompt.
    pub fn budget_summary(&self, customer_id: &str) -> String {
        let rows: Vec<_> = self
            .budgets
            .iter()
            .filter(|b| b.customer_id.eq_ignore_ascii_case(customer_id))
            .map(|b| {
                let utilized = if b.monthly_limit > 0.0 {
                    b.spent_so_far / b.monthly_limit * 100.0
                } else {
                    0.0
                };
                format!(
                    "- {}: ${:.2} of ${:.2} ({:.0}% utilized)",
                    b.category, b.spent_so_far, b.monthly_limit, utilized
                )
            })
            .collect();

        if rows.is_empty() {
            "No budget data on record.".to_string()
        } else {
            rows.join("\n")
        }
    }
}

fn load_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "Fixture file missing, table left empty");
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(dir: &Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn seeded_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("advisor-fixtures-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        write_fixture(
            &dir,
            "user_profile_data.csv",
            "Customer ID,Name,Age,Income,Risk Profile,Preferred Language,Savings Balance,Checking Balance,Marital Status,Employment Type\n\
             CUSTOMER1,Avery Chen,34,85000,Moderate,English,12000,3400,Single,Salaried\n",
        );
        write_fixture(
            &dir,
            "transactions_data.csv",
            "Customer ID,Transaction Date and Time,Transaction Amount,Merchant Name,Merchant Category,Description\n\
             CUSTOMER1,2026-07-02 10:15:00,54.20,Groceries Plus,Groceries,weekly shop\n\
             CUSTOMER1,2026-07-20 19:40:00,12.99,StreamFlix,Entertainment,subscription\n",
        );
        write_fixture(
            &dir,
            "budget_data.csv",
            "Customer ID,Category,Monthly Limit,Spent So Far\nCUSTOMER1,Dining,300,210\n",
        );

        dir
    }

    #[test]
    fn test_load_with_missing_tables() {
        let dir = seeded_dir();
        let data = ReferenceData::load(dir.to_str().unwrap()).unwrap();

        assert_eq!(data.profiles.len(), 1);
        assert_eq!(data.transactions.len(), 2);
        // Files that were never written just leave empty tables.
        assert!(data.subscriptions.is_empty());
        assert!(data.allocations.is_empty());
    }

    #[test]
    fn test_user_context_block() {
        let dir = seeded_dir();
        let data = ReferenceData::load(dir.to_str().unwrap()).unwrap();

        let context = data.user_context("customer1");
        assert!(context.contains("Avery Chen"));
        assert!(context.contains("Risk profile: Moderate"));
        assert!(context.contains("StreamFlix"));
    }

    #[test]
    fn test_recent_transactions_newest_first() {
        let dir = seeded_dir();
        let data = ReferenceData::load(dir.to_str().unwrap()).unwrap();

        let recent = data.recent_transactions("CUSTOMER1", 5);
        assert_eq!(recent[0].merchant_name, "StreamFlix");
    }

    #[test]
    fn test_unknown_customer_context() {
        let data = ReferenceData::empty();
        let context = data.user_context("CUSTOMER9");
        assert!(context.contains("no profile on record"));
    }

    #[test]
    fn test_budget_summary_utilization() {
        let dir = seeded_dir();
        let data = ReferenceData::load(dir.to_str().unwrap()).unwrap();

        let summary = data.budget_summary("CUSTOMER1");
        assert!(summary.contains("Dining"));
        assert!(summary.contains("70% utilized"));
    }
}
