use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage model for a doctor listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Doctor {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Professional title (e.g. chief physician)
    pub title: String,
    /// Hospital department
    pub department: String,
    /// Affiliated hospital
    pub hospital: String,
    /// Comma separated specialties
    pub specialties: String,
    /// Free-form biography
    pub bio: String,
    /// Avatar object URL
    pub avatar_url: Option<String>,
    /// Fee for one appointment, in cents
    pub consultation_fee_cents: i64,
    /// Average rating, 0 to 5
    pub rating: f64,
    /// Inactive doctors are hidden from public listings
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for creating a doctor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub title: String,
    pub department: String,
    pub hospital: String,
    pub specialties: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub consultation_fee_cents: i64,
    pub rating: f64,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorChanges {
    pub name: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub hospital: Option<String>,
    pub specialties: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub consultation_fee_cents: Option<i64>,
    pub rating: Option<f64>,
    pub is_active: Option<bool>,
}

impl DoctorChanges {
    /// Apply the changes to an in-memory row
    pub fn apply_to(&self, doctor: &mut Doctor) {
        if let Some(name) = &self.name {
            doctor.name = name.clone();
        }
        if let Some(title) = &self.title {
            doctor.title = title.clone();
        }
        if let Some(department) = &self.department {
            doctor.department = department.clone();
        }
        if let Some(hospital) = &self.hospital {
            doctor.hospital = hospital.clone();
        }
        if let Some(specialties) = &self.specialties {
            doctor.specialties = specialties.clone();
        }
        if let Some(bio) = &self.bio {
            doctor.bio = bio.clone();
        }
        if let Some(avatar_url) = &self.avatar_url {
            doctor.avatar_url = Some(avatar_url.clone());
        }
        if let Some(fee) = self.consultation_fee_cents {
            doctor.consultation_fee_cents = fee;
        }
        if let Some(rating) = self.rating {
            doctor.rating = rating;
        }
        if let Some(is_active) = self.is_active {
            doctor.is_active = is_active;
        }
    }
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct DoctorFilter {
    /// Exact department match
    pub department: Option<String>,
    /// Case-insensitive substring over name, hospital and specialties
    pub keyword: Option<String>,
    /// Hide inactive doctors
    pub active_only: bool,
}

impl DoctorFilter {
    pub fn matches(&self, doctor: &Doctor) -> bool {
        if self.active_only && !doctor.is_active {
            return false;
        }
        if let Some(department) = &self.department {
            if &doctor.department != department {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let keyword = keyword.to_lowercase();
            let haystacks = [&doctor.name, &doctor.hospital, &doctor.specialties];
            if !haystacks.iter().any(|h| h.to_lowercase().contains(&keyword)) {
                return false;
            }
        }
        true
    }
}
