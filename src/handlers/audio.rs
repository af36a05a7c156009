use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::time::Duration;
use uuid::Uuid;

use super::{ensure_same_org, find_org_member, has_permission, require_permission};
use crate::{
    AppState,
    access::{Permission, Role},
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        AllocateAudioRequest, AudioFile, AudioFileAllocation, AudioFileFilter,
        AudioFileUrlResponse, AudioStatus, AudioUploadUrlRequest, AudioUploadUrlResponse,
        NewAllocation, RegisterAudioFileRequest,
    },
    storage::sanitize_key,
};

fn key_prefix(org_id: Uuid) -> String {
    format!("audio/{org_id}/")
}

/// Lower-cased alphanumeric extension of `filename`, if it has one.
fn audio_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
}

async fn audio_in_org(state: &AppState, org_id: Uuid, file_id: Uuid) -> Result<AudioFile> {
    state
        .repo
        .get_audio_file(file_id)
        .await?
        .filter(|f| f.organization_id == org_id)
        .ok_or_else(|| AppError::not_found("Audio file"))
}

/// request_upload_url
///
/// Issues a short-lived presigned PUT URL so the client uploads the recording straight to
/// object storage. The key is generated here (`audio/{org}/{uuid}.{ext}`) and the content
/// type is pinned into the signature.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/audio-files/upload-url",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = AudioUploadUrlRequest,
    responses(
        (status = 200, description = "Presigned upload URL", body = AudioUploadUrlResponse),
        (status = 400, description = "Not an audio file"),
        (status = 500, description = "Storage unavailable")
    )
)]
pub async fn request_upload_url(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<AudioUploadUrlRequest>,
) -> Result<Json<AudioUploadUrlResponse>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageAudio).await?;

    if !payload.content_type.starts_with("audio/") {
        return Err(AppError::Validation(
            "only audio content types are accepted".into(),
        ));
    }
    let extension = audio_extension(&payload.filename)
        .ok_or_else(|| AppError::Validation("filename needs an extension".into()))?;

    let storage_key = format!("{}{}.{}", key_prefix(org_id), Uuid::new_v4(), extension);
    let ttl = Duration::from_secs(state.config.presign_ttl_secs);
    let upload_url = state
        .storage
        .presigned_upload_url(&storage_key, &payload.content_type, ttl)
        .await?;

    Ok(Json(AudioUploadUrlResponse {
        upload_url,
        storage_key,
    }))
}

/// register_audio_file
///
/// Records metadata for an uploaded recording. The key must be one issued for this
/// organization.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/audio-files",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = RegisterAudioFileRequest,
    responses(
        (status = 201, description = "Recording registered", body = AudioFile),
        (status = 400, description = "Invalid storage key"),
        (status = 409, description = "Already registered")
    )
)]
pub async fn register_audio_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<RegisterAudioFileRequest>,
) -> Result<(StatusCode, Json<AudioFile>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageAudio).await?;

    if sanitize_key(&payload.storage_key) != payload.storage_key
        || !payload.storage_key.starts_with(&key_prefix(org_id))
    {
        return Err(AppError::Validation(
            "storage key was not issued for this organization".into(),
        ));
    }
    if payload.filename.trim().is_empty() || payload.language.trim().is_empty() {
        return Err(AppError::Validation(
            "filename and language are required".into(),
        ));
    }
    if payload.duration_seconds.is_some_and(|d| d < 0) {
        return Err(AppError::Validation("duration must not be negative".into()));
    }

    let file = state
        .repo
        .create_audio_file(org_id, user.id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/audio-files",
    params(("org_id" = Uuid, Path, description = "Organization ID"), AudioFileFilter),
    responses((status = 200, description = "Recordings", body = [AudioFile]))
)]
pub async fn list_audio_files(
    user: AuthUser,
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(filter): Query<AudioFileFilter>,
) -> Result<Json<Vec<AudioFile>>> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageAudio).await?;
    Ok(Json(state.repo.list_audio_files(org_id, filter.status).await?))
}

/// get_audio_url
///
/// A time-limited signed read URL for playback. Available to audio managers and to any
/// quality analyst the recording was allocated to.
#[utoipa::path(
    get,
    path = "/api/organizations/{org_id}/audio-files/{file_id}/url",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("file_id" = Uuid, Path, description = "Audio file ID")
    ),
    responses(
        (status = 200, description = "Signed read URL", body = AudioFileUrlResponse),
        (status = 404, description = "Not found or not allocated to caller")
    )
)]
pub async fn get_audio_url(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, file_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AudioFileUrlResponse>> {
    ensure_same_org(&user, org_id)?;
    let file = audio_in_org(&state, org_id, file_id).await?;

    if !has_permission(&state.repo, &user, Permission::ManageAudio).await? {
        let allocated = state
            .repo
            .list_allocations_for(user.id)
            .await?
            .iter()
            .any(|a| a.audio_file_id == file.id);
        if !allocated {
            return Err(AppError::not_found("Audio file"));
        }
    }

    let ttl_secs = state.config.presign_ttl_secs;
    let url = state
        .storage
        .presigned_read_url(&file.storage_key, Duration::from_secs(ttl_secs))
        .await?;
    Ok(Json(AudioFileUrlResponse {
        url,
        expires_in_seconds: ttl_secs,
    }))
}

/// allocate_audio_file
///
/// Hands a recording to a quality analyst of the same organization for evaluation.
#[utoipa::path(
    post,
    path = "/api/organizations/{org_id}/audio-files/{file_id}/allocations",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("file_id" = Uuid, Path, description = "Audio file ID")
    ),
    request_body = AllocateAudioRequest,
    responses(
        (status = 201, description = "Allocation created", body = AudioFileAllocation),
        (status = 400, description = "Allocatee is not a quality analyst"),
        (status = 409, description = "Recording already allocated, evaluated or archived")
    )
)]
pub async fn allocate_audio_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path((org_id, file_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AllocateAudioRequest>,
) -> Result<(StatusCode, Json<AudioFileAllocation>)> {
    ensure_same_org(&user, org_id)?;
    require_permission(&state.repo, &user, Permission::ManageAudio).await?;
    let file = audio_in_org(&state, org_id, file_id).await?;

    // One open allocation per recording.
    let taken = match file.status {
        AudioStatus::Pending => None,
        AudioStatus::Allocated => Some("allocated"),
        AudioStatus::Evaluated => Some("evaluated"),
        AudioStatus::Archived => Some("archived"),
    };
    if let Some(state) = taken {
        return Err(AppError::Conflict(format!("recording is already {state}")));
    }
    match find_org_member(&state.repo, org_id, payload.quality_analyst_id).await? {
        Some(qa) if qa.role == Role::QualityAnalyst && qa.active => {}
        Some(_) => {
            return Err(AppError::Validation(
                "recordings can only be allocated to active quality analysts".into(),
            ));
        }
        None => {
            return Err(AppError::Validation(
                "quality analyst does not belong to this organization".into(),
            ));
        }
    }

    let allocation = state
        .repo
        .allocate_audio_file(NewAllocation {
            audio_file_id: file.id,
            quality_analyst_id: payload.quality_analyst_id,
            allocated_by: user.id,
            due_date: payload.due_date,
        })
        .await?;
    tracing::info!(
        allocation_id = %allocation.id,
        audio_file_id = %file.id,
        quality_analyst_id = %payload.quality_analyst_id,
        "recording allocated"
    );
    Ok((StatusCode::CREATED, Json(allocation)))
}

/// Allocations assigned to the caller.
#[utoipa::path(
    get,
    path = "/api/me/allocations",
    responses((status = 200, description = "My allocations", body = [AudioFileAllocation]))
)]
pub async fn my_allocations(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AudioFileAllocation>>> {
    Ok(Json(state.repo.list_allocations_for(user.id).await?))
}
