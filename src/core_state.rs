//! Shared application state.
//!
//! `CoreState` is the single value handed to both the HTTP layer and the
//! background scheduler. It owns the SQLite connection, the clock, and the
//! email delivery policy. The connection sits behind a std `Mutex`: take it,
//! do synchronous work, drop it. Never hold the guard across an `.await`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db;
use crate::email::{BestEffortDelivery, EmailError, EmailSender, LogOnlySender, WebhookSender};

/// Audit entries retained in memory.
const AUDIT_BUFFER_CAPACITY: usize = 500;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    delivery: BestEffortDelivery,
    audit: AuditLogger,
    config: AppConfig,
}

impl CoreState {
    pub fn new(
        conn: Connection,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn EmailSender>,
        config: AppConfig,
    ) -> Self {
        Self {
            db: Mutex::new(conn),
            clock,
            delivery: BestEffortDelivery::new(sender),
            audit: AuditLogger::new(),
            config,
        }
    }

    /// Open the configured database file and pick an email transport.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let conn = db::open_database(&config.db_path)?;
        let sender: Arc<dyn EmailSender> = match &config.email.endpoint {
            Some(endpoint) => {
                tracing::info!(%endpoint, "Email delivery via webhook");
                Arc::new(WebhookSender::new(endpoint, &config.email)?)
            }
            None => {
                tracing::warn!("TABBYCARE_EMAIL_ENDPOINT not set, emails will only be logged");
                Arc::new(LogOnlySender)
            }
        };
        Ok(Self::new(conn, Arc::new(SystemClock), sender, config))
    }

    /// Lock the shared connection.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn delivery(&self) -> &BestEffortDelivery {
        &self.delivery
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Record one API access.
    pub fn log_access(&self, patient_id: Option<Uuid>, action: &str, outcome: &str) {
        self.audit.log(AuditEntry {
            timestamp: self.now(),
            patient_id,
            action: action.to_string(),
            outcome: outcome.to_string(),
        });
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Email setup error: {0}")]
    Email(#[from] EmailError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// One API access.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: NaiveDateTime,
    /// `None` for unauthenticated routes.
    pub patient_id: Option<Uuid>,
    pub action: String,
    pub outcome: String,
}

/// Bounded in-memory audit buffer. Oldest entries fall off first.
pub struct AuditLogger {
    buffer: Mutex<VecDeque<AuditEntry>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    pub fn log(&self, entry: AuditEntry) {
        tracing::info!(
            patient_id = ?entry.patient_id,
            action = %entry.action,
            outcome = %entry.outcome,
            "API access"
        );
        let mut buf = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buf.len() == AUDIT_BUFFER_CAPACITY {
            buf.pop_front();
        }
        buf.push_back(entry);
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Test support
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use chrono::NaiveDateTime;
    use uuid::Uuid;

    use super::CoreState;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::db::{insert_family_member, insert_medication, insert_patient, open_memory_database};
    use crate::email::testing::RecordingSender;
    use crate::models::enums::{FamilyRelation, MedicationFrequency, MedicationStatus};
    use crate::models::{DoseSlot, FamilyMember, Medication, Patient};
    use crate::reminders::generate_schedule;

    pub struct TestCore {
        pub state: Arc<CoreState>,
        pub clock: Arc<ManualClock>,
        pub sender: Arc<RecordingSender>,
    }

    impl TestCore {
        pub fn at(now: &str) -> Self {
            let now = NaiveDateTime::parse_from_str(now, "%Y-%m-%d %H:%M:%S").unwrap();
            let clock = Arc::new(ManualClock::new(now));
            let sender = Arc::new(RecordingSender::new());
            let state = Arc::new(CoreState::new(
                open_memory_database().unwrap(),
                clock.clone(),
                sender.clone(),
                AppConfig::default(),
            ));
            Self { state, clock, sender }
        }

        pub fn set_now(&self, now: &str) {
            self.clock
                .set(NaiveDateTime::parse_from_str(now, "%Y-%m-%d %H:%M:%S").unwrap());
        }

        pub fn add_patient(&self, name: &str, email: &str) -> Uuid {
            let patient = Patient {
                id: Uuid::new_v4(),
                name: name.into(),
                email: email.into(),
                is_active: true,
                created_at: self.state.now(),
            };
            insert_patient(&self.state.db().unwrap(), &patient).unwrap();
            patient.id
        }

        /// Active family member with both toggles as given.
        pub fn add_family(&self, user_id: Uuid, email: &str, alerts: bool, weekly: bool) -> FamilyMember {
            let member = FamilyMember {
                id: Uuid::new_v4(),
                user_id,
                name: "Budi".into(),
                email: email.into(),
                relation: FamilyRelation::Spouse,
                phone: None,
                is_active: true,
                notify_dose_alerts: alerts,
                notify_weekly_summary: weekly,
                created_at: self.state.now(),
            };
            insert_family_member(&self.state.db().unwrap(), &member).unwrap();
            member
        }

        /// Store an active medication and generate its reminders at the current clock.
        pub fn add_medication(&self, user_id: Uuid, start: &str, end: &str, slots: &[&str]) -> Medication {
            let now = self.state.now();
            let med = Medication {
                id: Uuid::new_v4(),
                user_id,
                name: "Rifampisin".into(),
                dose: "450 mg".into(),
                frequency: MedicationFrequency::TwiceDaily,
                time_slots: slots.iter().map(|s| DoseSlot::parse(s).unwrap()).collect(),
                start_date: chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
                end_date: chrono::NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
                notes: None,
                status: MedicationStatus::Active,
                reminder_enabled: true,
                created_at: now,
                updated_at: now,
            };
            let conn = self.state.db().unwrap();
            insert_medication(&conn, &med).unwrap();
            generate_schedule(&conn, &med, now).unwrap();
            med
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestCore;
    use super::*;

    #[test]
    fn now_follows_injected_clock() {
        let core = TestCore::at("2024-01-01 07:00:00");
        assert_eq!(core.state.now().to_string(), "2024-01-01 07:00:00");
        core.set_now("2024-01-01 08:01:00");
        assert_eq!(core.state.now().to_string(), "2024-01-01 08:01:00");
    }

    #[test]
    fn db_guard_is_usable() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let id = core.add_patient("Siti", "siti@example.com");
        let conn = core.state.db().unwrap();
        assert!(db::get_patient(&conn, &id).unwrap().is_some());
    }

    #[test]
    fn audit_buffer_is_bounded() {
        let logger = AuditLogger::new();
        let ts = NaiveDateTime::default();
        for n in 0..AUDIT_BUFFER_CAPACITY + 3 {
            logger.log(AuditEntry {
                timestamp: ts,
                patient_id: None,
                action: format!("GET /api/{n}"),
                outcome: "status:200".into(),
            });
        }
        assert_eq!(logger.buffer_len(), AUDIT_BUFFER_CAPACITY);
        assert_eq!(logger.entries()[0].action, "GET /api/3");
    }

    #[test]
    fn log_access_stamps_with_clock() {
        let core = TestCore::at("2024-01-01 07:00:00");
        core.state.log_access(None, "GET /api/health", "status:200");
        let entries = core.state.audit().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp.to_string(), "2024-01-01 07:00:00");
    }
}
