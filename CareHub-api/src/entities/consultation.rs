use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::Consultation;
use care_hub_domain::services::SubmitConsultation;
use care_hub_domain::util::mask_phone;

/// Inquiry payload; anonymous submissions are allowed
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitConsultationRequest {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: String,

    #[validate(length(min = 11, max = 16, message = "phone must be a mobile number"))]
    pub phone: String,

    /// general, medical, membership, appointment or other
    #[serde(default = "default_category")]
    #[schema(example = "general")]
    pub category: String,

    #[validate(length(min = 1, max = 2000, message = "message must be 1-2000 characters"))]
    pub message: String,
}

fn default_category() -> String {
    "general".to_string()
}

impl From<SubmitConsultationRequest> for SubmitConsultation {
    fn from(req: SubmitConsultationRequest) -> Self {
        SubmitConsultation {
            name: req.name,
            phone: req.phone,
            category: req.category,
            message: req.message,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsultationResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub name: String,
    /// Masked phone number
    pub phone: String,
    pub category: String,
    pub message: String,
    /// open, replied or closed
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Consultation> for ConsultationResponse {
    fn from(consultation: Consultation) -> Self {
        Self {
            id: consultation.id,
            user_id: consultation.user_id,
            name: consultation.name,
            phone: mask_phone(&consultation.phone),
            category: consultation.category,
            message: consultation.message,
            status: consultation.status.to_string(),
            reply: consultation.reply,
            created_at: consultation.created_at,
            updated_at: consultation.updated_at,
        }
    }
}

/// Admin listing filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ConsultationListParams {
    /// open, replied or closed
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Admin reply
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 2000, message = "reply must be 1-2000 characters"))]
    pub reply: String,
}
