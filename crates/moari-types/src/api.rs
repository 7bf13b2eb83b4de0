use serde::{Deserialize, Serialize};

// -- Token claims --

/// Bearer token claims, shared by token issuance and the auth gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

// Required fields are optional here so a missing field becomes a 400 with a
// readable message instead of an extractor rejection.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub uid: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub id_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Clubs --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClubRequest {
    pub name: Option<String>,
    pub one_line_intro: Option<String>,
    pub description: Option<String>,
    pub interview_date: Option<String>,
    pub image_url: Option<String>,
    pub user_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub club_link: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClubResponse {
    pub message: String,
    pub club_id: String,
}

/// Absent fields keep their stored value.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClubRequest {
    pub name: Option<String>,
    pub one_line_intro: Option<String>,
    pub description: Option<String>,
    pub interview_date: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub club_link: Option<String>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_uid: Option<String>,
    pub message: Option<String>,
    pub club_id: Option<String>,
    pub club_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message: String,
    pub message_id: String,
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
