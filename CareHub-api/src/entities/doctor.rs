use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::Doctor;
use care_hub_domain::config::OssConfig;
use care_hub_domain::services::{CreateDoctor, UpdateDoctor};
use care_hub_domain::util::format_price_cents;

/// Public doctor profile
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorResponse {
    pub id: Uuid,
    pub name: String,
    /// Professional title, e.g. 主任医师
    pub title: String,
    pub department: String,
    pub hospital: String,
    pub specialties: Vec<String>,
    pub bio: String,
    /// Absolute avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub consultation_fee_cents: i64,
    /// Formatted fee, e.g. ¥50.00
    pub consultation_fee: String,
    pub rating: f64,
    pub is_active: bool,
}

impl DoctorResponse {
    /// Avatars are stored as object keys and published through the OSS base URL
    pub fn from_doctor(doctor: Doctor, oss: &OssConfig) -> Self {
        Self {
            id: doctor.id,
            avatar_url: doctor.avatar_url.as_deref().map(|key| oss.public_url(key)),
            specialties: split_specialties(&doctor.specialties),
            consultation_fee: format_price_cents(doctor.consultation_fee_cents),
            consultation_fee_cents: doctor.consultation_fee_cents,
            name: doctor.name,
            title: doctor.title,
            department: doctor.department,
            hospital: doctor.hospital,
            bio: doctor.bio,
            rating: doctor.rating,
            is_active: doctor.is_active,
        }
    }
}

fn split_specialties(raw: &str) -> Vec<String> {
    raw.split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Query parameters for the doctor listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DoctorListParams {
    /// Exact department name
    pub department: Option<String>,
    /// Matches name, hospital or specialties
    pub keyword: Option<String>,
    /// Number of results to return (default: 20, max: 100)
    pub limit: Option<usize>,
    /// Number of results to skip (default: 0)
    pub offset: Option<usize>,
}

/// Departments with at least one active doctor
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DepartmentsResponse {
    pub departments: Vec<String>,
}

/// Admin payload for a new doctor
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDoctorRequest {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1, max = 50, message = "department must be 1-50 characters"))]
    pub department: String,
    #[serde(default)]
    pub hospital: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub bio: String,
    /// Object key or absolute URL
    pub avatar_url: Option<String>,
    #[validate(range(min = 0, max = 100000000, message = "fee must be between 0 and 100000000 cents"))]
    pub consultation_fee_cents: i64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0, message = "rating must be between 0 and 5"))]
    pub rating: f64,
}

impl From<CreateDoctorRequest> for CreateDoctor {
    fn from(req: CreateDoctorRequest) -> Self {
        CreateDoctor {
            name: req.name,
            title: req.title,
            department: req.department,
            hospital: req.hospital,
            specialties: req.specialties.join(","),
            bio: req.bio,
            avatar_url: req.avatar_url,
            consultation_fee_cents: req.consultation_fee_cents,
            rating: req.rating,
        }
    }
}

/// Admin partial update; omitted fields are left unchanged
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDoctorRequest {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: Option<String>,
    pub title: Option<String>,
    #[validate(length(min = 1, max = 50, message = "department must be 1-50 characters"))]
    pub department: Option<String>,
    pub hospital: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[validate(range(min = 0, max = 100000000, message = "fee must be between 0 and 100000000 cents"))]
    pub consultation_fee_cents: Option<i64>,
    #[validate(range(min = 0.0, max = 5.0, message = "rating must be between 0 and 5"))]
    pub rating: Option<f64>,
    /// Hide or republish the doctor
    pub is_active: Option<bool>,
}

impl From<UpdateDoctorRequest> for UpdateDoctor {
    fn from(req: UpdateDoctorRequest) -> Self {
        UpdateDoctor {
            name: req.name,
            title: req.title,
            department: req.department,
            hospital: req.hospital,
            specialties: req.specialties.map(|s| s.join(",")),
            bio: req.bio,
            avatar_url: req.avatar_url,
            consultation_fee_cents: req.consultation_fee_cents,
            rating: req.rating,
            is_active: req.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_specialties() {
        assert_eq!(split_specialties("高血压, 糖尿病，冠心病,"), vec!["高血压", "糖尿病", "冠心病"]);
        assert!(split_specialties("").is_empty());
    }

    #[test]
    fn test_fee_upper_bound() {
        let update = UpdateDoctorRequest { consultation_fee_cents: Some(100_000_000), ..Default::default() };
        assert!(update.validate().is_ok());

        let update = UpdateDoctorRequest { consultation_fee_cents: Some(i64::MAX / 50), ..Default::default() };
        assert!(update.validate().is_err());
    }
}
