//! libSQL backend — async `Storage` trait implementation.
//!
//! Supports local file and in-memory databases; the in-memory variant
//! backs the test suites.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::intake::Session;
use crate::model::{
    Application, ApplicationStatus, BloodType, CountAnswer, InviteLink, Manager, Member,
    NewApplication,
};
use crate::store::migrations;
use crate::store::traits::Storage;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad uuid {s:?}: {e}")))
}

fn manager_from_row(row: &libsql::Row) -> Result<Manager, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let telegram_id: i64 = row.get(1).map_err(query_err)?;
    let name: String = row.get(2).map_err(query_err)?;
    let is_active: i64 = row.get(3).map_err(query_err)?;
    let created_at: String = row.get(4).map_err(query_err)?;
    Ok(Manager {
        id: parse_uuid(&id)?,
        telegram_id,
        name,
        is_active: is_active != 0,
        created_at: parse_datetime(&created_at),
    })
}

fn invite_link_from_row(row: &libsql::Row) -> Result<InviteLink, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let link: String = row.get(1).map_err(query_err)?;
    let manager_id: String = row.get(2).map_err(query_err)?;
    let member_name: String = row.get(3).map_err(query_err)?;
    let is_used: i64 = row.get(4).map_err(query_err)?;
    let created_at: String = row.get(5).map_err(query_err)?;
    Ok(InviteLink {
        id: parse_uuid(&id)?,
        link,
        manager_id: parse_uuid(&manager_id)?,
        member_name,
        is_used: is_used != 0,
        created_at: parse_datetime(&created_at),
    })
}

fn member_from_row(row: &libsql::Row) -> Result<Member, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let telegram_id: i64 = row.get(1).map_err(query_err)?;
    let first_name: String = row.get(2).map_err(query_err)?;
    let last_name: Option<String> = row.get(3).ok();
    let username: Option<String> = row.get(4).ok();
    let invite_link_id: String = row.get(5).map_err(query_err)?;
    let joined_at: String = row.get(6).map_err(query_err)?;
    Ok(Member {
        id: parse_uuid(&id)?,
        telegram_id,
        first_name,
        last_name,
        username,
        invite_link_id: parse_uuid(&invite_link_id)?,
        joined_at: parse_datetime(&joined_at),
    })
}

fn application_from_row(row: &libsql::Row) -> Result<Application, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let member_id: Option<String> = row.get(1).ok();
    let manager_id: String = row.get(2).map_err(query_err)?;
    let full_name: Option<String> = row.get(3).ok();
    let telegram_phone: Option<String> = row.get(4).ok();
    let phones_json: String = row.get(5).map_err(query_err)?;
    let city: Option<String> = row.get(6).ok();
    let age: Option<i64> = row.get(7).ok();
    let height: Option<i64> = row.get(8).ok();
    let weight: Option<i64> = row.get(9).ok();
    let children: Option<String> = row.get(10).ok();
    let cesarean: Option<String> = row.get(11).ok();
    let blood_type: Option<String> = row.get(12).ok();
    let status: String = row.get(13).map_err(query_err)?;
    let created_at: String = row.get(14).map_err(query_err)?;

    let phones: Vec<String> = serde_json::from_str(&phones_json)
        .map_err(|e| DatabaseError::Serialization(format!("bad phones column: {e}")))?;
    let status = ApplicationStatus::parse(&status)
        .ok_or_else(|| DatabaseError::Serialization(format!("unknown status {status:?}")))?;

    Ok(Application {
        id: parse_uuid(&id)?,
        member_id: member_id.as_deref().map(parse_uuid).transpose()?,
        manager_id: parse_uuid(&manager_id)?,
        full_name,
        telegram_phone,
        phones,
        city,
        age: age.map(|n| n as u16),
        height: height.map(|n| n as u16),
        weight: weight.map(|n| n as u16),
        children: children.as_deref().and_then(CountAnswer::decode),
        cesarean: cesarean.as_deref().and_then(CountAnswer::decode),
        blood_type: blood_type.as_deref().and_then(BloodType::from_key),
        status,
        created_at: parse_datetime(&created_at),
    })
}

const APPLICATION_COLUMNS: &str = "id, member_id, manager_id, full_name, telegram_phone, \
     phones, city, age, height, weight, children, cesarean, blood_type, status, created_at";

// ── Storage implementation ──────────────────────────────────────────

#[async_trait]
impl Storage for LibSqlBackend {
    async fn get_session(&self, applicant_id: i64) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT state FROM sessions WHERE applicant_id = ?1",
                params![applicant_id],
            )
            .await
            .map_err(query_err)?;

        let Some(row) = rows.next().await.map_err(query_err)? else {
            return Ok(None);
        };
        let state: String = row.get(0).map_err(query_err)?;
        let session = serde_json::from_str(&state)
            .map_err(|e| DatabaseError::Serialization(format!("bad session state: {e}")))?;
        Ok(Some(session))
    }

    async fn put_session(
        &self,
        applicant_id: i64,
        session: &Session,
    ) -> Result<(), DatabaseError> {
        let state = serde_json::to_string(session)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO sessions (applicant_id, state, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (applicant_id) DO UPDATE
                 SET state = excluded.state, updated_at = excluded.updated_at",
                params![applicant_id, state, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn clear_session(&self, applicant_id: i64) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM sessions WHERE applicant_id = ?1",
                params![applicant_id],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn insert_application(
        &self,
        new: NewApplication,
    ) -> Result<Application, DatabaseError> {
        let app = Application {
            id: Uuid::new_v4(),
            member_id: new.member_id,
            manager_id: new.manager_id,
            full_name: new.full_name,
            telegram_phone: new.telegram_phone,
            phones: new.phones,
            city: new.city,
            age: new.age,
            height: new.height,
            weight: new.weight,
            children: new.children,
            cesarean: new.cesarean,
            blood_type: new.blood_type,
            status: new.status,
            created_at: Utc::now(),
        };

        let phones = serde_json::to_string(&app.phones)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO applications (id, member_id, manager_id, full_name, \
                 telegram_phone, phones, city, age, height, weight, children, cesarean, \
                 blood_type, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    app.id.to_string(),
                    app.member_id.map(|id| id.to_string()),
                    app.manager_id.to_string(),
                    app.full_name.clone(),
                    app.telegram_phone.clone(),
                    phones,
                    app.city.clone(),
                    app.age.map(i64::from),
                    app.height.map(i64::from),
                    app.weight.map(i64::from),
                    app.children.map(|c| c.encode()),
                    app.cesarean.map(|c| c.encode()),
                    app.blood_type.map(|b| b.key().to_string()),
                    app.status.as_str(),
                    app.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(app)
    }

    async fn application_by_member(
        &self,
        member_id: Uuid,
    ) -> Result<Option<Application>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications WHERE member_id = ?1 \
                     ORDER BY created_at LIMIT 1"
                ),
                params![member_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(application_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_member(
        &self,
        telegram_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        username: Option<&str>,
        invite_link_id: Uuid,
    ) -> Result<Member, DatabaseError> {
        let member = Member {
            id: Uuid::new_v4(),
            telegram_id,
            first_name: first_name.to_string(),
            last_name: last_name.map(String::from),
            username: username.map(String::from),
            invite_link_id,
            joined_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO members (id, telegram_id, first_name, last_name, username, \
                 invite_link_id, joined_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    member.id.to_string(),
                    member.telegram_id,
                    member.first_name.clone(),
                    member.last_name.clone(),
                    member.username.clone(),
                    member.invite_link_id.to_string(),
                    member.joined_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(member)
    }

    async fn member_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Member>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, telegram_id, first_name, last_name, username, invite_link_id, \
                 joined_at FROM members WHERE telegram_id = ?1",
                params![telegram_id],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(member_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn manager_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Manager>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, telegram_id, name, is_active, created_at FROM managers \
                 WHERE telegram_id = ?1",
                params![telegram_id],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(manager_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn manager_by_id(&self, id: Uuid) -> Result<Option<Manager>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, telegram_id, name, is_active, created_at FROM managers \
                 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(manager_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_manager(
        &self,
        telegram_id: i64,
        name: &str,
    ) -> Result<Manager, DatabaseError> {
        let manager = Manager {
            id: Uuid::new_v4(),
            telegram_id,
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO managers (id, telegram_id, name, is_active, created_at) \
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![
                    manager.id.to_string(),
                    manager.telegram_id,
                    manager.name.clone(),
                    manager.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(manager)
    }

    async fn insert_invite_link(
        &self,
        link: &str,
        manager_id: Uuid,
        member_name: &str,
    ) -> Result<InviteLink, DatabaseError> {
        let invite = InviteLink {
            id: Uuid::new_v4(),
            link: link.to_string(),
            manager_id,
            member_name: member_name.to_string(),
            is_used: false,
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO invite_links (id, link, manager_id, member_name, is_used, \
                 created_at) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    invite.id.to_string(),
                    invite.link.clone(),
                    invite.manager_id.to_string(),
                    invite.member_name.clone(),
                    invite.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(invite)
    }

    async fn invite_link_by_id(&self, id: Uuid) -> Result<Option<InviteLink>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, link, manager_id, member_name, is_used, created_at \
                 FROM invite_links WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(invite_link_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn invite_link_by_url(
        &self,
        url: &str,
    ) -> Result<Option<InviteLink>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, link, manager_id, member_name, is_used, created_at \
                 FROM invite_links WHERE link = ?1",
                params![url],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(invite_link_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn mark_invite_link_used(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE invite_links SET is_used = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn delete_unused_invite_links(&self) -> Result<usize, DatabaseError> {
        let deleted = self
            .conn()
            .execute("DELETE FROM invite_links WHERE is_used = 0", ())
            .await
            .map_err(query_err)?;
        Ok(deleted as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{Session, Step};

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    async fn seed_manager_and_link(db: &LibSqlBackend) -> (Manager, InviteLink) {
        let manager = db.insert_manager(100, "Dilnoza").await.unwrap();
        let link = db
            .insert_invite_link("https://t.me/+abc123", manager.id, "Karimova Malika")
            .await
            .unwrap();
        (manager, link)
    }

    #[tokio::test]
    async fn session_roundtrip_and_clear() {
        let db = backend().await;
        let mut session = Session::new(Uuid::new_v4(), Uuid::new_v4());
        session.current_step = Step::Height;
        session.fields.age = Some(25);

        db.put_session(42, &session).await.unwrap();
        let loaded = db.get_session(42).await.unwrap().unwrap();
        assert_eq!(loaded, session);

        // Overwrite is an upsert, not a duplicate row.
        session.current_step = Step::Weight;
        db.put_session(42, &session).await.unwrap();
        let loaded = db.get_session(42).await.unwrap().unwrap();
        assert_eq!(loaded.current_step, Step::Weight);

        db.clear_session(42).await.unwrap();
        assert!(db.get_session(42).await.unwrap().is_none());
        // Clearing again is fine.
        db.clear_session(42).await.unwrap();
    }

    #[tokio::test]
    async fn sessions_are_keyed_per_applicant() {
        let db = backend().await;
        let a = Session::new(Uuid::new_v4(), Uuid::new_v4());
        let mut b = Session::new(Uuid::new_v4(), Uuid::new_v4());
        b.current_step = Step::Age;

        db.put_session(1, &a).await.unwrap();
        db.put_session(2, &b).await.unwrap();

        assert_eq!(db.get_session(1).await.unwrap().unwrap(), a);
        assert_eq!(db.get_session(2).await.unwrap().unwrap(), b);
    }

    #[tokio::test]
    async fn application_insert_and_lookup() {
        let db = backend().await;
        let (manager, link) = seed_manager_and_link(&db).await;
        let member = db
            .insert_member(7, "Malika", None, Some("malika"), link.id)
            .await
            .unwrap();

        let app = db
            .insert_application(NewApplication {
                member_id: Some(member.id),
                manager_id: manager.id,
                full_name: Some("Karimova Malika".to_string()),
                telegram_phone: Some("+998901112233".to_string()),
                phones: vec!["+998901234567".to_string()],
                city: Some("Tashkent city".to_string()),
                age: Some(25),
                height: Some(165),
                weight: Some(55),
                children: Some(CountAnswer::Exact(2)),
                cesarean: Some(CountAnswer::Exact(0)),
                blood_type: Some(BloodType::IiPos),
                status: ApplicationStatus::Completed,
            })
            .await
            .unwrap();

        let loaded = db
            .application_by_member(member.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, app.id);
        assert_eq!(loaded.status, ApplicationStatus::Completed);
        assert_eq!(loaded.phones, vec!["+998901234567"]);
        assert_eq!(loaded.children, Some(CountAnswer::Exact(2)));
        assert_eq!(loaded.blood_type, Some(BloodType::IiPos));
    }

    #[tokio::test]
    async fn rejected_application_keeps_partial_fields() {
        let db = backend().await;
        let (manager, link) = seed_manager_and_link(&db).await;
        let member = db
            .insert_member(8, "Aygul", None, None, link.id)
            .await
            .unwrap();

        db.insert_application(NewApplication {
            member_id: Some(member.id),
            manager_id: manager.id,
            full_name: Some("Karimova Aygul".to_string()),
            telegram_phone: Some("+998901112233".to_string()),
            phones: vec!["+998901234567".to_string()],
            city: Some("Bukhara region".to_string()),
            age: Some(44),
            height: None,
            weight: None,
            children: None,
            cesarean: None,
            blood_type: None,
            status: ApplicationStatus::Rejected,
        })
        .await
        .unwrap();

        let loaded = db
            .application_by_member(member.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, ApplicationStatus::Rejected);
        assert_eq!(loaded.age, Some(44));
        assert!(loaded.height.is_none());
        assert!(loaded.children.is_none());
    }

    #[tokio::test]
    async fn invite_link_lifecycle() {
        let db = backend().await;
        let (manager, link) = seed_manager_and_link(&db).await;

        let by_url = db
            .invite_link_by_url("https://t.me/+abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_url.id, link.id);
        assert_eq!(by_url.manager_id, manager.id);
        assert!(!by_url.is_used);

        db.mark_invite_link_used(link.id).await.unwrap();
        let by_id = db.invite_link_by_id(link.id).await.unwrap().unwrap();
        assert!(by_id.is_used);

        // A second, unused link gets swept; the used one stays.
        db.insert_invite_link("https://t.me/+never", manager.id, "Nobody")
            .await
            .unwrap();
        let deleted = db.delete_unused_invite_links().await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.invite_link_by_id(link.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn member_and_manager_lookup() {
        let db = backend().await;
        let (manager, link) = seed_manager_and_link(&db).await;

        let member = db
            .insert_member(55, "Malika", Some("Karimova"), Some("mk"), link.id)
            .await
            .unwrap();
        let found = db.member_by_telegram_id(55).await.unwrap().unwrap();
        assert_eq!(found.id, member.id);
        assert_eq!(found.last_name.as_deref(), Some("Karimova"));
        assert!(db.member_by_telegram_id(56).await.unwrap().is_none());

        let by_tg = db.manager_by_telegram_id(100).await.unwrap().unwrap();
        assert_eq!(by_tg.id, manager.id);
        assert!(by_tg.is_active);
        let by_id = db.manager_by_id(manager.id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "Dilnoza");
    }

    #[tokio::test]
    async fn local_file_backend_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("intake.db");
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        drop(db);
        assert!(path.exists());
    }
}
