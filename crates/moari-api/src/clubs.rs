use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use moari_db::models::{ClubChanges, NewClub};
use moari_types::Moment;
use moari_types::api::{
    Claims, RegisterClubRequest, RegisterClubResponse, StatusResponse, UpdateClubRequest,
};
use moari_types::models::Club;

use crate::auth::{AppState, run_db};
use crate::error::ApiError;
use crate::policy::{self, Action};

pub const DEFAULT_IMAGE_URL: &str = "https://via.placeholder.com/400x300.png?text=Moari";

const NOT_FOUND: &str = "동아리를 찾을 수 없습니다.";
const SERVER_ERROR: &str = "서버 오류가 발생했습니다.";

pub async fn list_clubs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| {
        db.list_clubs()
            .map_err(|e| ApiError::internal("Error fetching clubs", e))
    })
    .await?;

    Ok(Json(rows.into_iter().map(Club::from).collect::<Vec<_>>()))
}

pub async fn list_user_clubs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| {
        db.list_clubs_by_owner(&user_id)
            .map_err(|e| ApiError::internal("Error fetching user clubs", e))
    })
    .await?;

    Ok(Json(rows.into_iter().map(Club::from).collect::<Vec<_>>()))
}

pub async fn get_club(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| {
        db.get_club(&club_id)
            .map_err(|e| ApiError::internal("Error fetching club", e))
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Club not found".into()))?;

    Ok(Json(Club::from(row)))
}

/// Open route: the owner comes from the body's `userId`.
pub async fn register_club(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterClubRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    let complete = present(&req.name)
        && present(&req.description)
        && present(&req.interview_date)
        && present(&req.user_id);
    if !complete {
        return Err(ApiError::bad_request(
            "Error registering club",
            "name, description, interviewDate and userId are required",
        ));
    }

    let club_id = Uuid::new_v4().to_string();
    let id = club_id.clone();

    run_db(&state, move |db| {
        let tags = req.tags.unwrap_or_default();
        let club = NewClub {
            id: &id,
            name: req.name.as_deref().unwrap_or_default(),
            one_line_intro: req.one_line_intro.as_deref().unwrap_or_default(),
            description: req.description.as_deref().unwrap_or_default(),
            interview_date: req.interview_date.as_deref().unwrap_or_default(),
            image_url: req
                .image_url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(DEFAULT_IMAGE_URL),
            owner_id: req.user_id.as_deref().unwrap_or_default(),
            tags: &tags,
            club_link: req.club_link.as_deref().unwrap_or_default(),
            created_at: Moment::now(),
        };
        db.insert_club(&club)
            .map_err(|e| ApiError::bad_request("Error registering club", e))?;
        info!("Club {} registered by {}", club.id, club.owner_id);
        Ok(())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterClubResponse {
            message: "Club registered successfully!".into(),
            club_id,
        }),
    ))
}

pub async fn update_club(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateClubRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    run_db(&state, move |db| {
        let club = db
            .get_club(&club_id)
            .map_err(|e| ApiError::internal(SERVER_ERROR, e))?
            .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))?;

        if !policy::authorize(&claims.sub, Action::UpdateClub { owner_id: &club.owner_id }).is_allowed() {
            return Err(ApiError::PermissionDenied("이 동아리를 수정할 권한이 없습니다.".into()));
        }

        let changes = ClubChanges {
            name: req.name.as_deref(),
            one_line_intro: req.one_line_intro.as_deref(),
            description: req.description.as_deref(),
            interview_date: req.interview_date.as_deref(),
            image_url: req.image_url.as_deref(),
            tags: req.tags.as_deref(),
            club_link: req.club_link.as_deref(),
        };

        let updated = db
            .update_club(&club_id, &changes, Moment::now())
            .map_err(|e| ApiError::internal(SERVER_ERROR, e))?;
        if !updated {
            // Deleted between the ownership check and the write.
            return Err(ApiError::NotFound(NOT_FOUND.into()));
        }

        info!("Club {} updated by {}", club_id, claims.sub);
        Ok(())
    })
    .await?;

    Ok(Json(StatusResponse {
        message: "동아리 정보가 성공적으로 수정되었습니다.".into(),
    }))
}

pub async fn delete_club(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    run_db(&state, move |db| {
        let club = db
            .get_club(&club_id)
            .map_err(|e| ApiError::internal(SERVER_ERROR, e))?
            .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))?;

        if !policy::authorize(&claims.sub, Action::DeleteClub { owner_id: &club.owner_id }).is_allowed() {
            return Err(ApiError::PermissionDenied("이 동아리를 삭제할 권한이 없습니다.".into()));
        }

        if !db.delete_club(&club_id).map_err(|e| ApiError::internal(SERVER_ERROR, e))? {
            return Err(ApiError::NotFound(NOT_FOUND.into()));
        }

        info!("Club {} deleted by {}", club_id, claims.sub);
        Ok(())
    })
    .await?;

    Ok(Json(StatusResponse {
        message: "동아리가 성공적으로 삭제되었습니다.".into(),
    }))
}
