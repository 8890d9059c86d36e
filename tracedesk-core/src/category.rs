//! The fixed set of support intents a trace can be filed under.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Billing,
    Refund,
    #[serde(rename = "Account Access")]
    AccountAccess,
    Cancellation,
    #[serde(rename = "General Inquiry")]
    GeneralInquiry,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized category label: {0:?}")]
pub struct UnknownCategory(pub String);

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 5] = [
        Category::Billing,
        Category::Refund,
        Category::AccountAccess,
        Category::Cancellation,
        Category::GeneralInquiry,
    ];

    /// Used whenever a label cannot be recognized.
    pub const FALLBACK: Category = Category::GeneralInquiry;

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Billing => "Billing",
            Category::Refund => "Refund",
            Category::AccountAccess => "Account Access",
            Category::Cancellation => "Cancellation",
            Category::GeneralInquiry => "General Inquiry",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Exact, case-sensitive match against the label strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
