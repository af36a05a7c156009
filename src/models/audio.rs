use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "audio_status", rename_all = "snake_case")]
pub enum AudioStatus {
    #[default]
    Pending,
    Allocated,
    Evaluated,
    Archived,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "allocation_status", rename_all = "snake_case")]
pub enum AllocationStatus {
    #[default]
    Allocated,
    InProgress,
    Evaluated,
}

/// AudioFile
///
/// Metadata for a call recording. The binary lives in object storage under `storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct AudioFile {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub filename: String,
    pub storage_key: String,
    pub language: String,
    pub duration_seconds: Option<i32>,
    pub status: AudioStatus,
    pub uploaded_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// AudioUploadUrlRequest
///
/// Asks for a presigned PUT URL. The content type is pinned into the signature.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AudioUploadUrlRequest {
    #[schema(example = "call_2024_05_01.mp3")]
    pub filename: String,
    #[schema(example = "audio/mpeg")]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AudioUploadUrlResponse {
    pub upload_url: String,
    pub storage_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterAudioFileRequest {
    pub filename: String,
    pub storage_key: String,
    #[schema(example = "en")]
    pub language: String,
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct AudioFileFilter {
    pub status: Option<AudioStatus>,
}

/// A time-limited signed read URL for a recording.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AudioFileUrlResponse {
    pub url: String,
    pub expires_in_seconds: u64,
}

/// AudioFileAllocation
///
/// Assignment of a recording to a quality analyst for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct AudioFileAllocation {
    pub id: Uuid,
    pub audio_file_id: Uuid,
    pub quality_analyst_id: Uuid,
    pub allocated_by: Uuid,
    pub due_date: Option<NaiveDate>,
    pub status: AllocationStatus,
    pub evaluation_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AllocateAudioRequest {
    pub quality_analyst_id: Uuid,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewAllocation {
    pub audio_file_id: Uuid,
    pub quality_analyst_id: Uuid,
    pub allocated_by: Uuid,
    pub due_date: Option<NaiveDate>,
}
