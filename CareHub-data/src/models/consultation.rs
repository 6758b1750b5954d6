use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Open,
    Replied,
    Closed,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Open => "open",
            ConsultationStatus::Replied => "replied",
            ConsultationStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(ConsultationStatus::Open),
            "replied" => Ok(ConsultationStatus::Replied),
            "closed" => Ok(ConsultationStatus::Closed),
            _ => Err(UnknownStatus { kind: "consultation", value: s.to_string() }),
        }
    }
}

impl TryFrom<String> for ConsultationStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Storage model for a consultation (support or medical inquiry)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Consultation {
    pub id: Uuid,
    /// Submitting user, absent for anonymous website submissions
    pub user_id: Option<Uuid>,
    pub name: String,
    pub phone: String,
    pub category: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub status: ConsultationStatus,
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConsultation {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub phone: String,
    pub category: String,
    pub message: String,
}
