//! Patient actions on a single reminder.
//!
//! Every lookup is scoped to the caller: a reminder owned by someone else
//! is reported exactly like one that does not exist.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use super::ReminderError;
use crate::db;
use crate::models::{AdherenceLogEntry, DoseState, Notification};

fn owned(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<Notification, ReminderError> {
    db::get_notification_for_user(conn, user_id, id)?.ok_or(ReminderError::NotFound("Notification"))
}

/// Persist `next` over `current`, failing with a conflict if the row moved.
fn commit_state(conn: &Connection, current: Notification, next: DoseState) -> Result<Notification, ReminderError> {
    if next != current.state && !db::apply_transition(conn, &current, &next)? {
        return Err(ReminderError::Conflict(
            "Notification was updated concurrently, retry".into(),
        ));
    }
    Ok(Notification { state: next, ..current })
}

/// Mark a dose taken and append its `taken` ledger entry, atomically.
///
/// A second confirmation fails with `AlreadyTaken`; a dose already closed
/// as missed cannot be confirmed.
pub fn confirm_taken(
    conn: &Connection,
    user_id: &Uuid,
    id: &Uuid,
    now: NaiveDateTime,
) -> Result<Notification, ReminderError> {
    let tx = conn.unchecked_transaction()?;
    let current = owned(&tx, user_id, id)?;
    let next = current.state.confirm_taken(now)?;
    let updated = commit_state(&tx, current, next)?;

    let entry = AdherenceLogEntry::taken(updated.user_id, updated.medication_id, updated.scheduled_time, now);
    if !db::append_adherence_entry(&tx, &entry)? {
        return Err(ReminderError::Conflict("Dose already has a recorded outcome".into()));
    }
    tx.commit()?;

    tracing::info!(notification_id = %id, "Dose confirmed as taken");
    Ok(updated)
}

pub fn mark_read(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<Notification, ReminderError> {
    let current = owned(conn, user_id, id)?;
    let next = current.state.mark_read()?;
    commit_state(conn, current, next)
}

pub fn dismiss(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<Notification, ReminderError> {
    let current = owned(conn, user_id, id)?;
    let next = current.state.dismiss()?;
    commit_state(conn, current, next)
}

/// Returns how many delivered reminders were marked read.
pub fn mark_all_read(conn: &Connection, user_id: &Uuid) -> Result<usize, ReminderError> {
    Ok(db::mark_all_read(conn, user_id)?)
}

pub fn delete_notification(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<(), ReminderError> {
    if db::delete_notification(conn, user_id, id)? {
        Ok(())
    } else {
        Err(ReminderError::NotFound("Notification"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::testing::TestCore;
    use crate::models::TransitionError;
    use chrono::NaiveDate;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn setup() -> (TestCore, Uuid, Notification) {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        core.add_medication(user, "2024-01-01", "2024-01-01", &["08:00"]);
        let first = {
            let conn = core.state.db().unwrap();
            db::list_notifications_for_day(&conn, &user, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
                .unwrap()
                .remove(0)
        };
        (core, user, first)
    }

    fn ledger(core: &TestCore, user: &Uuid) -> Vec<AdherenceLogEntry> {
        let conn = core.state.db().unwrap();
        db::list_adherence_entries(&conn, user, &ts("2024-01-01 00:00:00"), &ts("2024-01-02 00:00:00")).unwrap()
    }

    #[test]
    fn confirm_sets_flags_and_logs_once() {
        let (core, user, n) = setup();
        let conn = core.state.db().unwrap();
        let updated = confirm_taken(&conn, &user, &n.id, ts("2024-01-01 08:10:00")).unwrap();
        assert!(updated.state.is_taken());
        assert_eq!(updated.state.taken_at(), Some(ts("2024-01-01 08:10:00")));
        drop(conn);

        let entries = ledger(&core, &user);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].taken_at, Some(ts("2024-01-01 08:10:00")));
        assert_eq!(entries[0].scheduled_time, ts("2024-01-01 08:00:00"));
    }

    #[test]
    fn double_confirmation_rejected_without_duplicate_entry() {
        let (core, user, n) = setup();
        let conn = core.state.db().unwrap();
        confirm_taken(&conn, &user, &n.id, ts("2024-01-01 08:10:00")).unwrap();
        let err = confirm_taken(&conn, &user, &n.id, ts("2024-01-01 08:11:00")).unwrap_err();
        assert!(matches!(err, ReminderError::Transition(TransitionError::AlreadyTaken)));
        drop(conn);
        assert_eq!(ledger(&core, &user).len(), 1);
    }

    #[test]
    fn other_patients_cannot_see_or_touch() {
        let (core, _user, n) = setup();
        let stranger = core.add_patient("Andi", "andi@example.com");
        let conn = core.state.db().unwrap();
        for result in [
            confirm_taken(&conn, &stranger, &n.id, ts("2024-01-01 08:10:00")).map(|_| ()),
            mark_read(&conn, &stranger, &n.id).map(|_| ()),
            dismiss(&conn, &stranger, &n.id).map(|_| ()),
            delete_notification(&conn, &stranger, &n.id),
        ] {
            assert!(matches!(result, Err(ReminderError::NotFound(_))));
        }
        let missing = confirm_taken(&conn, &stranger, &Uuid::new_v4(), ts("2024-01-01 08:10:00"));
        assert!(matches!(missing, Err(ReminderError::NotFound(_))));
    }

    #[test]
    fn read_then_taken() {
        let (core, user, n) = setup();
        let conn = core.state.db().unwrap();
        let read = mark_read(&conn, &user, &n.id).unwrap();
        assert!(matches!(read.state, DoseState::Read { .. }));
        // Reading again is a no-op.
        assert_eq!(mark_read(&conn, &user, &n.id).unwrap().state, read.state);
        assert!(confirm_taken(&conn, &user, &n.id, ts("2024-01-01 08:20:00")).unwrap().state.is_taken());
    }

    #[test]
    fn dismissed_reminder_is_not_dispatched() {
        let (core, user, n) = setup();
        let conn = core.state.db().unwrap();
        dismiss(&conn, &user, &n.id).unwrap();
        assert!(db::find_due_notifications(&conn, &ts("2024-01-01 09:00:00")).unwrap().is_empty());
        assert!(db::find_overdue_notifications(&conn, &ts("2024-01-01 11:00:00")).unwrap().is_empty());
    }

    #[test]
    fn taken_dose_cannot_be_dismissed() {
        let (core, user, n) = setup();
        let conn = core.state.db().unwrap();
        confirm_taken(&conn, &user, &n.id, ts("2024-01-01 08:10:00")).unwrap();
        assert!(matches!(dismiss(&conn, &user, &n.id), Err(ReminderError::Transition(_))));
    }

    #[test]
    fn delete_removes_only_the_reminder() {
        let (core, user, n) = setup();
        let conn = core.state.db().unwrap();
        confirm_taken(&conn, &user, &n.id, ts("2024-01-01 08:10:00")).unwrap();
        delete_notification(&conn, &user, &n.id).unwrap();
        assert!(db::get_notification(&conn, &n.id).unwrap().is_none());
        drop(conn);
        // History outlives the reminder.
        assert_eq!(ledger(&core, &user).len(), 1);
    }
}
