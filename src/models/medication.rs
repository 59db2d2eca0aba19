use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{MedicationFrequency, MedicationStatus};

static SLOT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d$").unwrap());

/// One time-of-day entry in a medication's schedule, e.g. "08:00".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoseSlot(NaiveTime);

impl DoseSlot {
    /// Parse a strict zero-padded 24h "HH:MM" slot.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !SLOT_PATTERN.is_match(raw) {
            return None;
        }
        NaiveTime::parse_from_str(raw, "%H:%M").ok().map(Self)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Combine with a calendar day into the exact scheduled instant.
    pub fn on(&self, day: NaiveDate) -> NaiveDateTime {
        day.and_time(self.0)
    }
}

impl std::fmt::Display for DoseSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for DoseSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DoseSlot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DoseSlot::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid dose slot '{raw}', expected HH:MM")))
    }
}

/// A prescribed regimen owned by exactly one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "namaObat")]
    pub name: String,
    #[serde(rename = "dosis")]
    pub dose: String,
    #[serde(rename = "frekuensi")]
    pub frequency: MedicationFrequency,
    #[serde(rename = "waktuMinum")]
    pub time_slots: Vec<DoseSlot>,
    #[serde(rename = "tanggalMulai")]
    pub start_date: NaiveDate,
    #[serde(rename = "tanggalSelesai")]
    pub end_date: NaiveDate,
    #[serde(rename = "catatan")]
    pub notes: Option<String>,
    pub status: MedicationStatus,
    pub reminder_enabled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Medication {
    /// Whether this regimen should currently own scheduled reminders.
    pub fn wants_reminders(&self) -> bool {
        self.reminder_enabled && self.status == MedicationStatus::Active
    }

    /// True when the fields that drive notification generation differ.
    pub fn schedule_differs(&self, other: &Medication) -> bool {
        self.time_slots != other.time_slots
            || self.start_date != other.start_date
            || self.end_date != other.end_date
            || self.wants_reminders() != other.wants_reminders()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zero_padded_slots() {
        let slot = DoseSlot::parse("08:00").unwrap();
        assert_eq!(slot.to_string(), "08:00");
        assert!(DoseSlot::parse(" 23:59 ").is_some());
    }

    #[test]
    fn rejects_malformed_slots() {
        for raw in ["8:00", "24:00", "12:60", "12-00", "", "noon", "08:00:00"] {
            assert!(DoseSlot::parse(raw).is_none(), "{raw} should be rejected");
        }
    }

    #[test]
    fn slot_combines_with_day() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let slot = DoseSlot::parse("20:00").unwrap();
        assert_eq!(slot.on(day).to_string(), "2024-01-02 20:00:00");
    }

    #[test]
    fn slot_json_is_plain_string() {
        let slots: Vec<DoseSlot> = serde_json::from_str(r#"["08:00","20:00"]"#).unwrap();
        assert_eq!(serde_json::to_string(&slots).unwrap(), r#"["08:00","20:00"]"#);
        let bad: Result<Vec<DoseSlot>, _> = serde_json::from_str(r#"["8am"]"#);
        assert!(bad.is_err());
    }
}
