use crate::analytics::SessionStats;
use crate::db_types::{ActionRow, CallRow, StatsRow};
use crate::error::StoreError;
use crate::session::{
    ActionRecord, CallSession, Language, MenuDelta, MenuState, SessionStatus, StatusUpdate,
};

use async_trait::async_trait;
use sqlx::{Executor, Pool, Postgres};
use std::collections::HashMap;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Durable per-call records.  Menu navigation and call status write disjoint field sets, so the
/// two writers need no coordination.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a session at Welcome.  An existing record for `call_id` is replaced wholesale.
    async fn create_or_replace(
        &self,
        call_id: &str,
        caller_number: Option<String>,
        callee_number: Option<String>,
    ) -> Result<CallSession, StoreError>;

    async fn get(&self, call_id: &str) -> Result<CallSession, StoreError>;

    /// Merge navigation fields and append one action record.
    async fn apply_menu_update(
        &self,
        call_id: &str,
        delta: MenuDelta,
        record: ActionRecord,
    ) -> Result<(), StoreError>;

    /// Merge completion fields.
    async fn apply_status_update(
        &self,
        call_id: &str,
        update: StatusUpdate,
    ) -> Result<(), StoreError>;

    /// Most recently started first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<CallSession>, StoreError>;

    async fn stats(&self) -> Result<Vec<SessionStats>, StoreError>;
}

fn parse_state(s: &str) -> Result<MenuState, StoreError> {
    s.parse().map_err(StoreError::Corrupt)
}

fn parse_status(s: &str) -> Result<SessionStatus, StoreError> {
    s.parse().map_err(StoreError::Corrupt)
}

fn action_from_row(row: ActionRow) -> Result<ActionRecord, StoreError> {
    Ok(ActionRecord {
        timestamp: row.recorded_at,
        state: parse_state(&row.state)?,
        input: row.input,
        response: row.response,
    })
}

fn session_from_rows(call: CallRow, actions: Vec<ActionRow>) -> Result<CallSession, StoreError> {
    Ok(CallSession {
        current_state: parse_state(&call.current_state)?,
        status: parse_status(&call.status)?,
        call_id: call.call_id,
        caller_number: call.caller_number,
        callee_number: call.callee_number,
        language: Language::new(call.language),
        selected_city: call.selected_city,
        selected_job_type: call.selected_job_type,
        started_at: call.started_at,
        ended_at: call.ended_at,
        duration_seconds: call.duration_seconds,
        action_log: actions
            .into_iter()
            .map(action_from_row)
            .collect::<Result<_, _>>()?,
    })
}

pub struct PgSessionStore {
    pool: Pool<Postgres>,
}

impl PgSessionStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

async fn call_exists<'e, E>(executor: E, call_id: &str) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let found = sqlx::query_scalar::<_, String>(
        "
        select call_id
        from ivr_calls
        where call_id = $1
        ",
    )
    .bind(call_id)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_or_replace(
        &self,
        call_id: &str,
        caller_number: Option<String>,
        callee_number: Option<String>,
    ) -> Result<CallSession, StoreError> {
        let session = CallSession::new(
            call_id,
            caller_number,
            callee_number,
            OffsetDateTime::now_utc(),
        );
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "
            insert into ivr_calls (
              call_id,
              caller_number,
              callee_number,
              language,
              current_state,
              status,
              started_at
            ) values (
              $1,
              $2,
              $3,
              $4,
              $5,
              $6,
              $7
            )
            on conflict (call_id) do update set
              caller_number = excluded.caller_number,
              callee_number = excluded.callee_number,
              language = excluded.language,
              current_state = excluded.current_state,
              status = excluded.status,
              selected_city = null,
              selected_job_type = null,
              started_at = excluded.started_at,
              ended_at = null,
              duration_seconds = null
            ",
        )
        .bind(&session.call_id)
        .bind(&session.caller_number)
        .bind(&session.callee_number)
        .bind(session.language.code())
        .bind(session.current_state.as_str())
        .bind(session.status.as_str())
        .bind(session.started_at)
        .execute(&mut *tx)
        .await?;
        let replaced = sqlx::query(
            "
            delete from ivr_call_actions
            where call_id = $1
            ",
        )
        .bind(call_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;
        if replaced > 0 {
            warn!(call_sid=%call_id, dropped_actions=replaced, "replaced existing call session");
        }

        Ok(session)
    }

    async fn get(&self, call_id: &str) -> Result<CallSession, StoreError> {
        let call = sqlx::query_as::<_, CallRow>(
            "
            select *
            from ivr_calls
            where call_id = $1
            ",
        )
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(call_id.to_string()))?;
        let actions = sqlx::query_as::<_, ActionRow>(
            "
            select call_id, recorded_at, state, input, response
            from ivr_call_actions
            where call_id = $1
            order by id
            ",
        )
        .bind(call_id)
        .fetch_all(&self.pool)
        .await?;

        session_from_rows(call, actions)
    }

    async fn apply_menu_update(
        &self,
        call_id: &str,
        delta: MenuDelta,
        record: ActionRecord,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        // Navigation fields are frozen once the call has ended; the record is still kept.
        let updated = sqlx::query(
            "
            update ivr_calls set
              language = coalesce($2, language),
              current_state = $3,
              selected_city = coalesce($4, selected_city),
              selected_job_type = coalesce($5, selected_job_type)
            where call_id = $1 and status = 'active'
            ",
        )
        .bind(call_id)
        .bind(delta.language.as_ref().map(Language::code))
        .bind(delta.current_state.as_str())
        .bind(&delta.selected_city)
        .bind(&delta.selected_job_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            if !call_exists(&mut *tx, call_id).await? {
                return Err(StoreError::NotFound(call_id.to_string()));
            }
            debug!(call_sid=%call_id, "late menu notification; logging only");
        }
        sqlx::query(
            "
            insert into ivr_call_actions (
              call_id,
              recorded_at,
              state,
              input,
              response
            ) values (
              $1,
              $2,
              $3,
              $4,
              $5
            )
            ",
        )
        .bind(call_id)
        .bind(record.timestamp)
        .bind(record.state.as_str())
        .bind(&record.input)
        .bind(&record.response)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn apply_status_update(
        &self,
        call_id: &str,
        update: StatusUpdate,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "
            update ivr_calls set
              status = $2,
              duration_seconds = coalesce($3, duration_seconds),
              ended_at = coalesce(ended_at, $4)
            where call_id = $1 and status = 'active'
            ",
        )
        .bind(call_id)
        .bind(update.status.as_str())
        .bind(update.duration_seconds)
        .bind(update.ended_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if updated == 0 {
            if !call_exists(&self.pool, call_id).await? {
                return Err(StoreError::NotFound(call_id.to_string()));
            }
            debug!(
                call_sid=%call_id,
                status=update.status.as_str(),
                "ignored status after call ended"
            );
        }

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<CallSession>, StoreError> {
        let calls = sqlx::query_as::<_, CallRow>(
            "
            select *
            from ivr_calls
            order by started_at desc, call_id desc
            limit $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        let call_ids: Vec<String> = calls.iter().map(|c| c.call_id.clone()).collect();
        let action_rows = sqlx::query_as::<_, ActionRow>(
            "
            select call_id, recorded_at, state, input, response
            from ivr_call_actions
            where call_id = any($1)
            order by id
            ",
        )
        .bind(call_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut actions: HashMap<String, Vec<ActionRow>> = HashMap::new();
        for row in action_rows {
            actions.entry(row.call_id.clone()).or_default().push(row);
        }

        calls
            .into_iter()
            .map(|call| {
                let rows = actions.remove(&call.call_id).unwrap_or_default();
                session_from_rows(call, rows)
            })
            .collect()
    }

    async fn stats(&self) -> Result<Vec<SessionStats>, StoreError> {
        let rows = sqlx::query_as::<_, StatsRow>(
            "
            select language, status, duration_seconds, selected_city
            from ivr_calls
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SessionStats {
                    language: Language::new(row.language),
                    status: parse_status(&row.status)?,
                    duration_seconds: row.duration_seconds,
                    selected_city: row.selected_city,
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use tokio::sync::RwLock;

    /// Process-local store with the same merge rules as the Postgres store.
    #[derive(Default)]
    pub struct MemorySessionStore {
        sessions: RwLock<HashMap<String, CallSession>>,
    }

    #[async_trait]
    impl SessionStore for MemorySessionStore {
        async fn create_or_replace(
            &self,
            call_id: &str,
            caller_number: Option<String>,
            callee_number: Option<String>,
        ) -> Result<CallSession, StoreError> {
            let session = CallSession::new(
                call_id,
                caller_number,
                callee_number,
                OffsetDateTime::now_utc(),
            );
            let mut sessions = self.sessions.write().await;
            sessions.insert(call_id.to_string(), session.clone());
            Ok(session)
        }

        async fn get(&self, call_id: &str) -> Result<CallSession, StoreError> {
            let sessions = self.sessions.read().await;
            sessions
                .get(call_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(call_id.to_string()))
        }

        async fn apply_menu_update(
            &self,
            call_id: &str,
            delta: MenuDelta,
            record: ActionRecord,
        ) -> Result<(), StoreError> {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(call_id)
                .ok_or_else(|| StoreError::NotFound(call_id.to_string()))?;
            session.apply_menu(delta, record);
            Ok(())
        }

        async fn apply_status_update(
            &self,
            call_id: &str,
            update: StatusUpdate,
        ) -> Result<(), StoreError> {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(call_id)
                .ok_or_else(|| StoreError::NotFound(call_id.to_string()))?;
            session.apply_status(update);
            Ok(())
        }

        async fn list_recent(&self, limit: u32) -> Result<Vec<CallSession>, StoreError> {
            let sessions = self.sessions.read().await;
            let mut all: Vec<CallSession> = sessions.values().cloned().collect();
            all.sort_by(|a, b| {
                b.started_at
                    .cmp(&a.started_at)
                    .then_with(|| b.call_id.cmp(&a.call_id))
            });
            all.truncate(limit as usize);
            Ok(all)
        }

        async fn stats(&self) -> Result<Vec<SessionStats>, StoreError> {
            let sessions = self.sessions.read().await;
            Ok(sessions.values().map(SessionStats::from).collect())
        }
    }
}


/// Same rules against Postgres.  Each test gets a fresh database with `migrations/` applied; run
/// with `DATABASE_URL` set and `cargo test -- --ignored`.
#[cfg(test)]
mod pg_tests {
    use super::*;
    use sqlx::PgPool;

    fn nav(state: MenuState, city: Option<&str>) -> MenuDelta {
        MenuDelta {
            language: None,
            current_state: state,
            selected_city: city.map(str::to_string),
            selected_job_type: None,
        }
    }

    fn finished(status: SessionStatus, duration: i32) -> StatusUpdate {
        StatusUpdate {
            status,
            duration_seconds: Some(duration),
            ended_at: Some(OffsetDateTime::now_utc()),
        }
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn menu_updates_merge_and_append(pool: PgPool) {
        let store = PgSessionStore::new(pool);
        store.create_or_replace("CA1", None, None).await.unwrap();
        let steps = [
            (
                MenuState::Welcome,
                "2",
                MenuDelta {
                    language: Some(Language::new("en")),
                    ..nav(MenuState::MainMenu, None)
                },
            ),
            (MenuState::MainMenu, "1", nav(MenuState::CitySelect, None)),
            (MenuState::CitySelect, "2", nav(MenuState::JobTypeSelect, Some("Delhi"))),
            (MenuState::JobTypeSelect, "9", nav(MenuState::CitySelect, None)),
        ];
        let mut previous: Vec<ActionRecord> = Vec::new();
        for (at, digit, delta) in steps {
            let record = ActionRecord::now(at, Some(digit), None);
            store.apply_menu_update("CA1", delta, record).await.unwrap();
            let log = store.get("CA1").await.unwrap().action_log;
            assert_eq!(log.len(), previous.len() + 1);
            assert_eq!(&log[..previous.len()], &previous[..]);
            assert_eq!(log.last().unwrap().input.as_deref(), Some(digit));
            previous = log;
        }

        let session = store.get("CA1").await.unwrap();
        assert_eq!(session.language, Language::new("en"));
        assert_eq!(session.current_state, MenuState::CitySelect);
        // absent selections leave the stored ones alone
        assert_eq!(session.selected_city.as_deref(), Some("Delhi"));
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn status_after_return_to_menu_keeps_navigation(pool: PgPool) {
        let store = PgSessionStore::new(pool);
        store.create_or_replace("CA2", None, None).await.unwrap();
        store
            .apply_menu_update(
                "CA2",
                nav(MenuState::ReturnToMenu, None),
                ActionRecord::now(MenuState::LegalHelp, Some("1"), Some("minimum_wage".into())),
            )
            .await
            .unwrap();
        let before = store.get("CA2").await.unwrap();

        store
            .apply_status_update("CA2", finished(SessionStatus::Completed, 125))
            .await
            .unwrap();
        let after = store.get("CA2").await.unwrap();
        assert_eq!(after.status, SessionStatus::Completed);
        assert_eq!(after.duration_seconds, Some(125));
        assert!(after.ended_at.is_some());
        assert_eq!(after.current_state, MenuState::ReturnToMenu);
        assert_eq!(after.action_log, before.action_log);
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn finished_call_only_grows_its_log(pool: PgPool) {
        let store = PgSessionStore::new(pool);
        store.create_or_replace("CA3", None, None).await.unwrap();
        store
            .apply_status_update("CA3", finished(SessionStatus::Completed, 40))
            .await
            .unwrap();
        let ended = store.get("CA3").await.unwrap().ended_at;

        store
            .apply_menu_update(
                "CA3",
                nav(MenuState::CitySelect, Some("Pune")),
                ActionRecord::now(MenuState::Welcome, Some("1"), None),
            )
            .await
            .unwrap();
        store
            .apply_status_update("CA3", finished(SessionStatus::Failed, 3))
            .await
            .unwrap();
        store
            .apply_status_update(
                "CA3",
                StatusUpdate {
                    status: SessionStatus::Active,
                    duration_seconds: None,
                    ended_at: None,
                },
            )
            .await
            .unwrap();

        let session = store.get("CA3").await.unwrap();
        assert_eq!(session.action_log.len(), 1);
        assert_eq!(session.current_state, MenuState::Welcome);
        assert_eq!(session.selected_city, None);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.duration_seconds, Some(40));
        assert_eq!(session.ended_at, ended);
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn unknown_call_is_not_found(pool: PgPool) {
        let store = PgSessionStore::new(pool);
        let err = store
            .apply_menu_update(
                "CA404",
                nav(MenuState::MainMenu, None),
                ActionRecord::now(MenuState::Welcome, Some("1"), None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "CA404"));
        let err = store
            .apply_status_update("CA404", finished(SessionStatus::Completed, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(matches!(store.get("CA404").await, Err(StoreError::NotFound(_))));
        // nothing was logged for the unknown call
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn create_replaces_existing_record(pool: PgPool) {
        let store = PgSessionStore::new(pool);
        store.create_or_replace("CA5", None, None).await.unwrap();
        store
            .apply_menu_update(
                "CA5",
                nav(MenuState::JobTypeSelect, Some("Mumbai")),
                ActionRecord::now(MenuState::CitySelect, Some("1"), Some("Mumbai".into())),
            )
            .await
            .unwrap();
        store
            .apply_status_update("CA5", finished(SessionStatus::Failed, 9))
            .await
            .unwrap();

        store
            .create_or_replace("CA5", Some("+911".to_string()), None)
            .await
            .unwrap();
        let session = store.get("CA5").await.unwrap();
        assert_eq!(session.current_state, MenuState::Welcome);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.selected_city, None);
        assert_eq!(session.duration_seconds, None);
        assert_eq!(session.ended_at, None);
        assert_eq!(session.caller_number.as_deref(), Some("+911"));
        assert!(session.action_log.is_empty());
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn history_and_stats(pool: PgPool) {
        let store = PgSessionStore::new(pool);
        for id in ["CA-a", "CA-b", "CA-c"] {
            store.create_or_replace(id, None, None).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        store
            .apply_menu_update(
                "CA-a",
                nav(MenuState::JobTypeSelect, Some("Delhi")),
                ActionRecord::now(MenuState::CitySelect, Some("2"), Some("Delhi".into())),
            )
            .await
            .unwrap();
        store
            .apply_status_update("CA-a", finished(SessionStatus::Completed, 60))
            .await
            .unwrap();

        let recent = store.list_recent(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|s| s.call_id.as_str()).collect();
        assert_eq!(ids, vec!["CA-c", "CA-b"]);
        let all = store.list_recent(10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].action_log.len(), 1);

        let mut stats = store.stats().await.unwrap();
        stats.sort_by_key(|s| s.selected_city.is_none());
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].selected_city.as_deref(), Some("Delhi"));
        assert_eq!(stats[0].status, SessionStatus::Completed);
        assert_eq!(stats[0].duration_seconds, Some(60));
    }
}
