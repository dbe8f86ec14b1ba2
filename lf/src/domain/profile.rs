//! Ideal customer profile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Description of the customers the searches are aimed at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdealCustomerProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub industries: Vec<String>,
    pub titles: Vec<String>,
    pub locations: Vec<String>,
    pub company_sizes: Vec<String>,
    pub keywords: Vec<String>,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for IdealCustomerProfile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: String::new(),
            description: String::new(),
            industries: Vec::new(),
            titles: Vec::new(),
            locations: Vec::new(),
            company_sizes: Vec::new(),
            keywords: Vec::new(),
            notes: String::new(),
            updated_at: None,
        }
    }
}
