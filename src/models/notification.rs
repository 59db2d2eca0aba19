//! Scheduled dose reminders and their lifecycle.
//!
//! Persisted as `status` + `sent_at` + `is_taken` + `taken_at` (+ `missed_at`)
//! columns; in memory the lifecycle is a tagged [`DoseState`] whose
//! transition methods reject illegal moves.

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::enums::{NotificationStatus, NotificationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseState {
    Pending,
    Sent {
        sent_at: NaiveDateTime,
    },
    /// Opened by the patient without a dose confirmation.
    Read {
        sent_at: Option<NaiveDateTime>,
    },
    Taken {
        sent_at: Option<NaiveDateTime>,
        taken_at: NaiveDateTime,
    },
    /// Closed by the missed-dose detector.
    Missed {
        sent_at: Option<NaiveDateTime>,
        missed_at: NaiveDateTime,
    },
    Dismissed {
        sent_at: Option<NaiveDateTime>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Dose already confirmed as taken")]
    AlreadyTaken,
    #[error("Cannot {action} a notification that is {from}")]
    Illegal {
        from: &'static str,
        action: &'static str,
    },
}

impl DoseState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent { .. } => "sent",
            Self::Read { .. } => "read",
            Self::Taken { .. } => "taken",
            Self::Missed { .. } => "missed",
            Self::Dismissed { .. } => "dismissed",
        }
    }

    /// Persisted status column.
    pub fn status(&self) -> NotificationStatus {
        match self {
            Self::Pending => NotificationStatus::Pending,
            Self::Sent { .. } => NotificationStatus::Sent,
            Self::Read { .. } | Self::Taken { .. } | Self::Missed { .. } => NotificationStatus::Read,
            Self::Dismissed { .. } => NotificationStatus::Dismissed,
        }
    }

    pub fn sent_at(&self) -> Option<NaiveDateTime> {
        match *self {
            Self::Pending => None,
            Self::Sent { sent_at } => Some(sent_at),
            Self::Read { sent_at }
            | Self::Taken { sent_at, .. }
            | Self::Missed { sent_at, .. }
            | Self::Dismissed { sent_at } => sent_at,
        }
    }

    pub fn taken_at(&self) -> Option<NaiveDateTime> {
        match *self {
            Self::Taken { taken_at, .. } => Some(taken_at),
            _ => None,
        }
    }

    pub fn missed_at(&self) -> Option<NaiveDateTime> {
        match *self {
            Self::Missed { missed_at, .. } => Some(missed_at),
            _ => None,
        }
    }

    pub fn is_taken(&self) -> bool {
        matches!(self, Self::Taken { .. })
    }

    /// Rebuild from persisted columns, rejecting combinations no transition can produce.
    pub fn from_columns(
        status: NotificationStatus,
        sent_at: Option<NaiveDateTime>,
        is_taken: bool,
        taken_at: Option<NaiveDateTime>,
        missed_at: Option<NaiveDateTime>,
    ) -> Option<Self> {
        match (status, is_taken, taken_at, missed_at) {
            (NotificationStatus::Pending, false, None, None) if sent_at.is_none() => Some(Self::Pending),
            (NotificationStatus::Sent, false, None, None) => sent_at.map(|sent_at| Self::Sent { sent_at }),
            (NotificationStatus::Read, true, Some(taken_at), None) => {
                Some(Self::Taken { sent_at, taken_at })
            }
            (NotificationStatus::Read, false, None, Some(missed_at)) => {
                Some(Self::Missed { sent_at, missed_at })
            }
            (NotificationStatus::Read, false, None, None) => Some(Self::Read { sent_at }),
            (NotificationStatus::Dismissed, false, None, None) => Some(Self::Dismissed { sent_at }),
            _ => None,
        }
    }

    fn illegal(&self, action: &'static str) -> TransitionError {
        TransitionError::Illegal {
            from: self.label(),
            action,
        }
    }

    /// pending → sent, stamped by the dispatch sweep.
    pub fn dispatch(self, at: NaiveDateTime) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(Self::Sent { sent_at: at }),
            other => Err(other.illegal("dispatch")),
        }
    }

    /// pending/sent/read → taken. A second confirmation is rejected.
    pub fn confirm_taken(self, at: NaiveDateTime) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(Self::Taken { sent_at: None, taken_at: at }),
            Self::Sent { sent_at } => Ok(Self::Taken { sent_at: Some(sent_at), taken_at: at }),
            Self::Read { sent_at } => Ok(Self::Taken { sent_at, taken_at: at }),
            Self::Taken { .. } => Err(TransitionError::AlreadyTaken),
            other => Err(other.illegal("confirm")),
        }
    }

    /// pending/sent → read. Already-closed states stay as they are.
    pub fn mark_read(self) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(Self::Read { sent_at: None }),
            Self::Sent { sent_at } => Ok(Self::Read { sent_at: Some(sent_at) }),
            Self::Read { .. } | Self::Taken { .. } | Self::Missed { .. } => Ok(self),
            other => Err(other.illegal("mark as read")),
        }
    }

    /// pending/sent/read → dismissed. Confirmed or missed doses keep their outcome.
    pub fn dismiss(self) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(Self::Dismissed { sent_at: None }),
            Self::Sent { sent_at } => Ok(Self::Dismissed { sent_at: Some(sent_at) }),
            Self::Read { sent_at } | Self::Dismissed { sent_at } => Ok(Self::Dismissed { sent_at }),
            other => Err(other.illegal("dismiss")),
        }
    }

    /// pending/sent → missed, stamped by the missed-dose detector.
    pub fn mark_missed(self, at: NaiveDateTime) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(Self::Missed { sent_at: None, missed_at: at }),
            Self::Sent { sent_at } => Ok(Self::Missed { sent_at: Some(sent_at), missed_at: at }),
            other => Err(other.illegal("mark as missed")),
        }
    }
}

/// One scheduled reminder for one dose of one medication.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub medication_id: Uuid,
    pub title: String,
    pub message: String,
    pub scheduled_time: NaiveDateTime,
    pub kind: NotificationType,
    pub state: DoseState,
    pub created_at: NaiveDateTime,
}

/// Wire shape of a notification, field names kept compatible with existing clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub medication_id: Uuid,
    pub title: String,
    pub message: String,
    pub scheduled_time: NaiveDateTime,
    pub status: NotificationStatus,
    pub sent_at: Option<NaiveDateTime>,
    pub is_taken: bool,
    pub taken_at: Option<NaiveDateTime>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub created_at: NaiveDateTime,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            medication_id: n.medication_id,
            title: n.title.clone(),
            message: n.message.clone(),
            scheduled_time: n.scheduled_time,
            status: n.state.status(),
            sent_at: n.state.sent_at(),
            is_taken: n.state.is_taken(),
            taken_at: n.state.taken_at(),
            kind: n.kind,
            created_at: n.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn dispatch_only_from_pending() {
        let sent = DoseState::Pending.dispatch(at(8, 0)).unwrap();
        assert_eq!(sent, DoseState::Sent { sent_at: at(8, 0) });
        assert!(sent.dispatch(at(8, 1)).is_err());
    }

    #[test]
    fn taken_keeps_sent_stamp() {
        let taken = DoseState::Sent { sent_at: at(8, 0) }
            .confirm_taken(at(8, 10))
            .unwrap();
        assert_eq!(taken.sent_at(), Some(at(8, 0)));
        assert_eq!(taken.taken_at(), Some(at(8, 10)));
        assert_eq!(taken.status(), NotificationStatus::Read);
        assert!(taken.is_taken());
    }

    #[test]
    fn second_confirmation_rejected() {
        let taken = DoseState::Pending.confirm_taken(at(8, 0)).unwrap();
        assert_eq!(taken.confirm_taken(at(8, 5)), Err(TransitionError::AlreadyTaken));
    }

    #[test]
    fn missed_dose_cannot_be_confirmed() {
        let missed = DoseState::Pending.mark_missed(at(10, 1)).unwrap();
        assert!(matches!(
            missed.confirm_taken(at(11, 0)),
            Err(TransitionError::Illegal { from: "missed", .. })
        ));
    }

    #[test]
    fn read_state_can_still_be_confirmed() {
        let read = DoseState::Sent { sent_at: at(8, 0) }.mark_read().unwrap();
        assert!(read.confirm_taken(at(8, 30)).unwrap().is_taken());
    }

    #[test]
    fn taken_cannot_be_dismissed() {
        let taken = DoseState::Pending.confirm_taken(at(8, 0)).unwrap();
        assert!(taken.dismiss().is_err());
    }

    #[test]
    fn mark_read_is_idempotent_on_closed_states() {
        let taken = DoseState::Pending.confirm_taken(at(8, 0)).unwrap();
        assert_eq!(taken.mark_read().unwrap(), taken);
    }

    #[test]
    fn column_round_trip_for_every_state() {
        let states = [
            DoseState::Pending,
            DoseState::Sent { sent_at: at(8, 0) },
            DoseState::Read { sent_at: None },
            DoseState::Taken { sent_at: Some(at(8, 0)), taken_at: at(8, 5) },
            DoseState::Missed { sent_at: None, missed_at: at(10, 1) },
            DoseState::Dismissed { sent_at: Some(at(8, 0)) },
        ];
        for state in states {
            let rebuilt = DoseState::from_columns(
                state.status(),
                state.sent_at(),
                state.is_taken(),
                state.taken_at(),
                state.missed_at(),
            );
            assert_eq!(rebuilt, Some(state));
        }
    }

    #[test]
    fn inconsistent_columns_rejected() {
        // taken flag without a timestamp
        assert!(DoseState::from_columns(NotificationStatus::Read, None, true, None, None).is_none());
        // sent without a sent_at
        assert!(DoseState::from_columns(NotificationStatus::Sent, None, false, None, None).is_none());
    }
}
