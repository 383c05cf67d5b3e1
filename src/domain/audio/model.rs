use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Generation state machine for one audio attempt.
///
/// PENDING -> GENERATING -> {COMPLETED | FAILED}. A FAILED audio can be reset
/// to PENDING through the retry operation only, never by the pipeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Generating => "GENERATING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "GENERATING" => Ok(Self::Generating),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown generation status: {other}")),
        }
    }
}

/// Whether an audio row is still visible. Rows are never physically removed;
/// DELETED and EXPIRED rows keep counting against the lifetime quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifetimeStatus {
    Active,
    Deleted,
    Expired,
}

impl LifetimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Deleted => "DELETED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for LifetimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifetimeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "DELETED" => Ok(Self::Deleted),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(format!("unknown lifetime status: {other}")),
        }
    }
}

/// Closed set of Polly voices offered to users (English US, standard engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoiceId {
    Ivy,
    Joanna,
    Joey,
    Justin,
    Kendra,
    Kimberly,
    Matthew,
    Salli,
}

impl VoiceId {
    pub const ALL: [VoiceId; 8] = [
        Self::Ivy,
        Self::Joanna,
        Self::Joey,
        Self::Justin,
        Self::Kendra,
        Self::Kimberly,
        Self::Matthew,
        Self::Salli,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ivy => "Ivy",
            Self::Joanna => "Joanna",
            Self::Joey => "Joey",
            Self::Justin => "Justin",
            Self::Kendra => "Kendra",
            Self::Kimberly => "Kimberly",
            Self::Matthew => "Matthew",
            Self::Salli => "Salli",
        }
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoiceId::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown voice: {s}"))
    }
}

/// One attempt to produce a spoken rendition of a page in one voice.
#[derive(Debug, Clone)]
pub struct Audio {
    pub id: Uuid,
    pub page_id: Uuid,
    pub voice: VoiceId,
    pub generated_by: Uuid,
    /// Empty until generation succeeds.
    pub s3_key: String,
    pub status: GenerationStatus,
    pub lifetime_status: LifetimeStatus,
    pub created_at: DateTime<Utc>,
    pub last_played_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Audio {
    /// An audio expires when it has not been played for the retention window,
    /// falling back to its creation time if it was never played.
    pub fn is_expired(&self, now: DateTime<Utc>, retention_months: u32) -> bool {
        let reference = self.last_played_at.unwrap_or(self.created_at);
        reference < now - Duration::days(retention_months as i64 * 30)
    }

    pub fn expiry_date(&self, retention_months: u32) -> DateTime<Utc> {
        let reference = self.last_played_at.unwrap_or(self.created_at);
        reference + Duration::days(retention_months as i64 * 30)
    }
}

/// The text-bearing unit audio is generated for. Owned by the document
/// conversion subsystem; the pipeline only reads it.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: Uuid,
    pub document_id: Uuid,
    pub page_number: i32,
    pub owner_id: Uuid,
    pub markdown_content: String,
}

/// Global quota configuration, stored as a single row and loaded fresh before
/// every reservation. Passed into the guard by value so tests can vary it.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub audio_generation_enabled: bool,
    pub max_audios_per_page: u32,
    pub audio_retention_months: u32,
    pub auto_delete_expired: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            audio_generation_enabled: true,
            max_audios_per_page: 4,
            audio_retention_months: 6,
            auto_delete_expired: false,
        }
    }
}
