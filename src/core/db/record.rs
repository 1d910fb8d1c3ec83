use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// One stored classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteRecord {
    pub id: Uuid,
    pub user_id: String,
    pub waste_type: String,
    pub confidence: f32,
    pub image_uri: Option<String>,
    pub disposal_advice: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub location: Option<GeoLocation>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewWasteRecord {
    pub user_id: String,
    pub waste_type: String,
    pub confidence: f32,
    pub image_uri: Option<String>,
    pub disposal_advice: String,
    pub location: Option<GeoLocation>,
    pub address: Option<String>,
}

/// Classification history, most recent first.
pub trait HistoryRepository {
    /// Store a record, assigning its id and creation time.
    fn create_record(&self, record: NewWasteRecord) -> impl Future<Output = anyhow::Result<WasteRecord>>;
    fn get_record_by_id(&self, id: Uuid) -> impl Future<Output = anyhow::Result<Option<WasteRecord>>>;
    fn get_all_records(&self) -> impl Future<Output = anyhow::Result<Vec<WasteRecord>>>;
    fn get_records_for_user(&self, user_id: &str) -> impl Future<Output = anyhow::Result<Vec<WasteRecord>>>;
    fn get_records_by_waste_type(&self, waste_type: &str) -> impl Future<Output = anyhow::Result<Vec<WasteRecord>>>;
    fn clear_all_records(&self) -> impl Future<Output = anyhow::Result<()>>;
}
