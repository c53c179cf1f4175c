//! Read and follow-up operations on stored cocktails.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::store::{RecordStore, StoreError};
use crate::types::{CocktailRecord, RecordPatch};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyrightStatus {
    pub cocktail_id: Uuid,
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl CopyrightStatus {
    fn of(record: &CocktailRecord) -> Self {
        Self {
            cocktail_id: record.id,
            confirmed: record.copyright_confirmed_at.is_some(),
            confirmed_at: record.copyright_confirmed_at,
        }
    }
}

/// Look up a cocktail by its six-digit order code. Malformed codes match nothing.
pub async fn find_by_order_code(
    records: &dyn RecordStore,
    code: &str,
) -> Result<Option<CocktailRecord>, StoreError> {
    let code = code.trim();
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    records.find_by_code(code).await
}

/// Record that the creator confirmed the image raises no copyright concerns.
/// Confirming twice keeps the first timestamp.
pub async fn confirm_copyright(
    records: &dyn RecordStore,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<CopyrightStatus, StoreError> {
    let record = records
        .find_by_id(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("cocktail {}", id)))?;

    if record.copyright_confirmed_at.is_some() {
        tracing::debug!(cocktail_id = %id, "Copyright already confirmed");
        return Ok(CopyrightStatus::of(&record));
    }

    let patch = RecordPatch {
        copyright_confirmed_at: Some(now),
        ..Default::default()
    };
    if !records.update(id, patch).await? {
        return Err(StoreError::NotFound(format!("cocktail {}", id)));
    }

    tracing::info!(cocktail_id = %id, "Copyright confirmed");
    Ok(CopyrightStatus {
        cocktail_id: id,
        confirmed: true,
        confirmed_at: Some(now),
    })
}

pub async fn copyright_status(
    records: &dyn RecordStore,
    id: Uuid,
) -> Result<CopyrightStatus, StoreError> {
    records
        .find_by_id(id)
        .await?
        .map(|record| CopyrightStatus::of(&record))
        .ok_or_else(|| StoreError::NotFound(format!("cocktail {}", id)))
}
