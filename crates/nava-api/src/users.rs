use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use nava_db::models::{UserPatch, UserRow};
use nava_db::{is_unique_violation, parse_db_time, to_db_time};
use nava_types::api::{AckResponse, UpdateUserRequest, UserResponse};
use nava_types::models::{SocialLinks, User};
use nava_types::phone::phone_key;

use crate::auth::AppState;
use crate::error::{ApiError, parse_path_id, run_blocking};

/// Public profile for a stored user. Unreadable columns are logged and
/// replaced with defaults so one bad row does not hide the rest.
pub(crate) fn profile(row: UserRow) -> User {
    let id = row.id.parse::<Uuid>().unwrap_or_else(|_| {
        warn!("User row has non-UUID id '{}'", row.id);
        Uuid::nil()
    });
    let influencer_platforms = serde_json::from_str(&row.influencer_platforms).unwrap_or_else(|e| {
        warn!("Unreadable influencer platforms on user '{}': {}", row.id, e);
        Vec::new()
    });
    let social_media_links = serde_json::from_str::<SocialLinks>(&row.social_media_links).unwrap_or_else(|e| {
        warn!("Unreadable social links on user '{}': {}", row.id, e);
        SocialLinks::default()
    });
    let role = row.role.parse().unwrap_or_else(|e| {
        warn!("User '{}': {}", row.id, e);
        Default::default()
    });
    let time = |raw: &str| {
        parse_db_time(raw).unwrap_or_else(|| {
            warn!("Unreadable timestamp '{}' on user '{}'", raw, row.id);
            Default::default()
        })
    };

    User {
        id,
        created_at: time(&row.created_at),
        updated_at: time(&row.updated_at),
        name: row.name,
        phone_number: row.phone_number,
        age: row.age,
        photo: row.photo,
        code: row.code,
        profession: row.profession,
        resident: row.resident,
        social_media_influencer: row.social_media_influencer,
        influencer_platforms,
        referral_code: row.referral_code,
        role,
        social_media_links,
    }
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let db = state.db.clone();
    let rows = run_blocking(move || Ok(db.list_users()?)).await?;
    Ok(Json(rows.into_iter().map(profile).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_path_id(&id)?;
    let db = state.db.clone();
    let row = run_blocking(move || {
        db.get_user_by_id(&id.to_string())?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))
    })
    .await?;
    Ok(Json(profile(row)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_path_id(&id)?;
    let Json(req) = payload?;
    let patch = user_patch(req)?;

    let db = state.db.clone();
    let row = run_blocking(move || {
        let key = id.to_string();
        let updated = db.update_user(&key, &patch, &to_db_time(Utc::now())).map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Phone number or code already in use".into())
            } else {
                ApiError::Internal(e)
            }
        })?;
        if !updated {
            return Err(ApiError::NotFound("User not found".into()));
        }
        db.get_user_by_id(&key)?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))
    })
    .await?;
    info!("User {} updated", id);

    Ok(Json(UserResponse {
        message: "User updated successfully".into(),
        user: profile(row),
    }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, ApiError> {
    let id = parse_path_id(&id)?;
    let db = state.db.clone();
    let deleted = run_blocking(move || Ok(db.delete_user(&id.to_string())?)).await?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!("User {} deleted", id);
    Ok(Json(AckResponse::new("User deleted successfully")))
}

/// Blank strings count as absent so a form field left empty keeps the stored
/// value.
fn user_patch(req: UpdateUserRequest) -> Result<UserPatch, ApiError> {
    let filled = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let phone_number = filled(req.phone_number);
    let phone_key = match &phone_number {
        Some(number) => {
            let key = phone_key(number);
            if key.is_empty() {
                return Err(ApiError::Validation("Phone number must contain digits".into()));
            }
            Some(key)
        }
        None => None,
    };

    Ok(UserPatch {
        name: filled(req.name),
        phone_number,
        phone_key,
        age: filled(req.age),
        photo: filled(req.photo),
        code: filled(req.code).map(|c| c.to_lowercase()),
        profession: filled(req.profession),
        resident: req.resident,
        social_media_influencer: req.social_media_influencer,
        influencer_platforms: req
            .influencer_platforms
            .map(|p| serde_json::to_string(&p))
            .transpose()
            .map_err(anyhow::Error::from)?,
        social_media_links: req
            .social_media_links
            .map(|l| serde_json::to_string(&l))
            .transpose()
            .map_err(anyhow::Error::from)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: Uuid::new_v4().to_string(),
            phone_number: "+919876543210".into(),
            phone_key: "9876543210".into(),
            name: Some("Asha".into()),
            age: None,
            photo: None,
            code: "nava543210".into(),
            profession: None,
            resident: Some(true),
            social_media_influencer: None,
            influencer_platforms: r#"["Instagram"]"#.into(),
            password: "$argon2id$hash".into(),
            referral_code: None,
            role: "moderator".into(),
            social_media_links: r#"{"Instagram":"https://instagram.com/asha"}"#.into(),
            created_at: "2024-01-01T00:00:00.000000Z".into(),
            updated_at: "2024-01-01T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn profile_decodes_json_columns() {
        let user = profile(row());
        assert_eq!(user.influencer_platforms, vec!["Instagram".to_string()]);
        assert_eq!(user.social_media_links.get("Instagram"), Some("https://instagram.com/asha"));
        assert_eq!(user.role.as_str(), "moderator");

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["residentOfDharavi"], true);
    }

    #[test]
    fn corrupt_columns_fall_back_to_defaults() {
        let mut bad = row();
        bad.influencer_platforms = "not json".into();
        bad.role = "superuser".into();
        let user = profile(bad);
        assert!(user.influencer_platforms.is_empty());
        assert_eq!(user.role.as_str(), "user");
    }

    #[test]
    fn patch_skips_blank_fields_and_rekeys_phone() {
        let patch = user_patch(UpdateUserRequest {
            name: Some("  ".into()),
            phone_number: Some("whatsapp:+919123456789".into()),
            code: Some("NAVA456789".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.name, None);
        assert_eq!(patch.phone_key.as_deref(), Some("9123456789"));
        assert_eq!(patch.code.as_deref(), Some("nava456789"));
        assert_eq!(patch.influencer_platforms, None);
    }
}
