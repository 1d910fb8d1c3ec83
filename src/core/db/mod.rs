mod record;
mod state;
mod user;

use std::{path::Path, sync::Arc};

use sqlx::{Row, sqlite::SqliteRow};
use state::DbState;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

pub use record::{GeoLocation, HistoryRepository, NewWasteRecord, WasteRecord};
pub use user::{GUEST_USER_NAME, ProfileUpdate, User, UserRepository};

const CURRENT_USER_KEY: &str = "current_user_id";

/// SQLite-backed classification history and user profile.
#[derive(Debug, Clone)]
pub struct HistoryDb {
    state: Arc<DbState>,
}

impl HistoryDb {
    /// Open (or create) the database file and apply migrations.
    pub async fn open<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(DbState::open(db_file).await?),
        })
    }

    /// Flush and close the database. Later queries fail.
    pub async fn close(&self) -> anyhow::Result<()> {
        self.state.close().await
    }
}

fn format_time(t: OffsetDateTime) -> anyhow::Result<String> {
    Ok(t.format(&Rfc3339)?)
}

fn parse_time(s: &str) -> anyhow::Result<OffsetDateTime> {
    Ok(OffsetDateTime::parse(s, &Rfc3339)?)
}

fn record_from_row(row: &SqliteRow) -> anyhow::Result<WasteRecord> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let confidence: f64 = row.try_get("confidence")?;

    Ok(WasteRecord {
        id: Uuid::parse_str(&id)?,
        user_id: row.try_get("user_id")?,
        waste_type: row.try_get("waste_type")?,
        confidence: confidence as f32,
        image_uri: row.try_get("image_uri")?,
        disposal_advice: row.try_get("disposal_advice")?,
        created_at: parse_time(&created_at)?,
        location: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| GeoLocation { latitude, longitude }),
        address: row.try_get("address")?,
    })
}

fn user_from_row(row: &SqliteRow) -> anyhow::Result<User> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let last_login_at: String = row.try_get("last_login_at")?;

    Ok(User {
        id: Uuid::parse_str(&id)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        profile_image_url: row.try_get("profile_image_url")?,
        created_at: parse_time(&created_at)?,
        last_login_at: parse_time(&last_login_at)?,
    })
}

const RECORD_COLUMNS: &str = "id, user_id, waste_type, confidence, image_uri, disposal_advice, \
                              created_at, latitude, longitude, address";

impl HistoryRepository for HistoryDb {
    async fn create_record(&self, record: NewWasteRecord) -> anyhow::Result<WasteRecord> {
        let mut conn = self.state.conn().await?;
        let stored = WasteRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            waste_type: record.waste_type,
            confidence: record.confidence,
            image_uri: record.image_uri,
            disposal_advice: record.disposal_advice,
            created_at: OffsetDateTime::now_utc(),
            location: record.location,
            address: record.address,
        };

        sqlx::query(
            r#"INSERT INTO waste_record
                (id, user_id, waste_type, confidence, image_uri, disposal_advice,
                 created_at, latitude, longitude, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(stored.id.to_string())
        .bind(&stored.user_id)
        .bind(&stored.waste_type)
        .bind(stored.confidence as f64)
        .bind(&stored.image_uri)
        .bind(&stored.disposal_advice)
        .bind(format_time(stored.created_at)?)
        .bind(stored.location.map(|l| l.latitude))
        .bind(stored.location.map(|l| l.longitude))
        .bind(&stored.address)
        .execute(&mut **conn)
        .await?;

        tracing::debug!(id = %stored.id, waste_type = %stored.waste_type, "history record stored");
        Ok(stored)
    }

    async fn get_record_by_id(&self, id: Uuid) -> anyhow::Result<Option<WasteRecord>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM waste_record WHERE id = $1"))
            .bind(id.to_string())
            .fetch_optional(&mut **conn)
            .await?
            .as_ref()
            .map(record_from_row)
            .transpose()
    }

    async fn get_all_records(&self) -> anyhow::Result<Vec<WasteRecord>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM waste_record ORDER BY seq DESC"))
            .fetch_all(&mut **conn)
            .await?
            .iter()
            .map(record_from_row)
            .collect()
    }

    async fn get_records_for_user(&self, user_id: &str) -> anyhow::Result<Vec<WasteRecord>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM waste_record WHERE user_id = $1 ORDER BY seq DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(record_from_row)
        .collect()
    }

    async fn get_records_by_waste_type(&self, waste_type: &str) -> anyhow::Result<Vec<WasteRecord>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM waste_record WHERE waste_type = $1 ORDER BY seq DESC"
        ))
        .bind(waste_type)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(record_from_row)
        .collect()
    }

    async fn clear_all_records(&self) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        sqlx::query("DELETE FROM waste_record")
            .execute(&mut **conn)
            .await?;
        Ok(())
    }
}

impl UserRepository for HistoryDb {
    async fn get_current_user(&self) -> anyhow::Result<User> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin_transaction().await?;

        let current_id: Option<String> =
            sqlx::query("SELECT value FROM app_metadata WHERE key = $1")
                .bind(CURRENT_USER_KEY)
                .fetch_optional(&mut *tx)
                .await?
                .map(|row| row.try_get("value"))
                .transpose()?;

        if let Some(id) = current_id {
            let row = sqlx::query("SELECT * FROM app_user WHERE id = $1")
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = row {
                let user = user_from_row(&row)?;
                tx.commit().await?;
                return Ok(user);
            }
            tracing::warn!(%id, "current user id has no profile, creating a new guest");
        }

        let now = OffsetDateTime::now_utc();
        let guest = User {
            id: Uuid::new_v4(),
            name: GUEST_USER_NAME.to_string(),
            email: String::new(),
            profile_image_url: None,
            created_at: now,
            last_login_at: now,
        };
        sqlx::query(
            r#"INSERT INTO app_user (id, name, email, profile_image_url, created_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(guest.id.to_string())
        .bind(&guest.name)
        .bind(&guest.email)
        .bind(&guest.profile_image_url)
        .bind(format_time(guest.created_at)?)
        .bind(format_time(guest.last_login_at)?)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"INSERT INTO app_metadata (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"#,
        )
        .bind(CURRENT_USER_KEY)
        .bind(guest.id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(id = %guest.id, "created guest profile");
        Ok(guest)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> anyhow::Result<User> {
        let mut user = self.get_current_user().await?;
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(url) = &update.profile_image_url {
            user.profile_image_url = Some(url.clone());
        }

        let mut conn = self.state.conn().await?;
        sqlx::query("UPDATE app_user SET name = $1, email = $2, profile_image_url = $3 WHERE id = $4")
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.profile_image_url)
            .bind(user.id.to_string())
            .execute(&mut **conn)
            .await?;
        Ok(user)
    }

    async fn update_last_login(&self) -> anyhow::Result<User> {
        let mut user = self.get_current_user().await?;
        user.last_login_at = OffsetDateTime::now_utc();

        let mut conn = self.state.conn().await?;
        sqlx::query("UPDATE app_user SET last_login_at = $1 WHERE id = $2")
            .bind(format_time(user.last_login_at)?)
            .bind(user.id.to_string())
            .execute(&mut **conn)
            .await?;
        Ok(user)
    }

    async fn clear_user_data(&self) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin_transaction().await?;
        sqlx::query(
            "DELETE FROM app_user WHERE id = (SELECT value FROM app_metadata WHERE key = $1)",
        )
        .bind(CURRENT_USER_KEY)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM app_metadata WHERE key = $1")
            .bind(CURRENT_USER_KEY)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
