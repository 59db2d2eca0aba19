//! Message rendering. All patient-facing copy is Indonesian.

use chrono::{NaiveDate, NaiveDateTime};

use super::{EmailMessage, TemplateKind};
use crate::models::AdherenceSummary;

/// Dose details shared by the reminder and missed-dose templates.
#[derive(Debug, Clone)]
pub struct DoseDetails {
    pub patient_name: String,
    pub medication_name: String,
    pub dose: String,
    pub scheduled_time: NaiveDateTime,
}

/// Typed payload for each template family.
#[derive(Debug, Clone)]
pub enum TemplateData {
    Reminder(DoseDetails),
    Missed(DoseDetails),
    WeeklySummary {
        patient_name: String,
        start: NaiveDate,
        end: NaiveDate,
        summary: AdherenceSummary,
    },
    Test {
        patient_name: String,
    },
    FamilyWelcome {
        member_name: String,
        patient_name: String,
    },
}

impl TemplateData {
    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::Reminder(_) => TemplateKind::Reminder,
            Self::Missed(_) => TemplateKind::Missed,
            Self::WeeklySummary { .. } => TemplateKind::WeeklySummary,
            Self::Test { .. } => TemplateKind::Test,
            Self::FamilyWelcome { .. } => TemplateKind::FamilyWelcome,
        }
    }

    /// Render into a message for `to`. `app_url` is linked from every body.
    pub fn render(&self, to: Vec<String>, app_url: &str) -> EmailMessage {
        let (subject, body) = match self {
            Self::Reminder(d) => (
                format!("Pengingat: waktunya minum {}", d.medication_name),
                format!(
                    "Halo {},\n\nSudah waktunya minum {} ({}) yang dijadwalkan pukul {}.\n\
                     Setelah diminum, tandai dosis ini di aplikasi agar catatan kepatuhan tetap lengkap.\n\n\
                     {}",
                    d.patient_name,
                    d.medication_name,
                    d.dose,
                    d.scheduled_time.format("%H:%M, %d-%m-%Y"),
                    footer(app_url)
                ),
            ),
            Self::Missed(d) => (
                format!("Peringatan: dosis {} terlewat", d.medication_name),
                format!(
                    "Perhatian,\n\n{} belum mengonfirmasi dosis {} ({}) yang dijadwalkan pukul {}.\n\
                     Pengobatan TBC harus diminum teratur. Segera minum obat atau hubungi petugas kesehatan \
                     bila ada kendala.\n\n{}",
                    d.patient_name,
                    d.medication_name,
                    d.dose,
                    d.scheduled_time.format("%H:%M, %d-%m-%Y"),
                    footer(app_url)
                ),
            ),
            Self::WeeklySummary {
                patient_name,
                start,
                end,
                summary,
            } => (
                format!("Ringkasan mingguan kepatuhan minum obat {patient_name}"),
                format!(
                    "Ringkasan {} s.d. {} untuk {}:\n\n\
                     - Total dosis: {}\n- Diminum: {}\n- Terlewat: {}\n- Tingkat kepatuhan: {}%\n\n{}\n\n{}",
                    start.format("%d-%m-%Y"),
                    end.format("%d-%m-%Y"),
                    patient_name,
                    summary.total,
                    summary.taken,
                    summary.missed,
                    summary.adherence_rate,
                    rating(summary.adherence_rate),
                    footer(app_url)
                ),
            ),
            Self::Test { patient_name } => (
                "Tes email TabbyCare".to_string(),
                format!(
                    "Halo {patient_name},\n\nIni adalah email percobaan. Pengingat obat Anda akan dikirim ke alamat ini.\n\n{}",
                    footer(app_url)
                ),
            ),
            Self::FamilyWelcome {
                member_name,
                patient_name,
            } => (
                format!("Anda ditambahkan sebagai pendamping {patient_name}"),
                format!(
                    "Halo {member_name},\n\n{patient_name} menambahkan Anda sebagai anggota keluarga di TabbyCare. \
                     Anda akan menerima pemberitahuan bila ada dosis yang terlewat serta ringkasan mingguan.\n\n{}",
                    footer(app_url)
                ),
            ),
        };

        EmailMessage {
            to,
            kind: self.kind(),
            subject,
            body,
        }
    }
}

fn rating(rate: u32) -> &'static str {
    match rate {
        90.. => "Luar biasa! Pertahankan kebiasaan baik ini.",
        70..=89 => "Cukup baik, tetapi masih ada dosis yang terlewat.",
        _ => "Perlu ditingkatkan. Minum obat secara teratur sangat penting untuk kesembuhan TBC.",
    }
}

fn footer(app_url: &str) -> String {
    format!("Buka TabbyCare: {app_url}\n\n-- Tim TabbyCare")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dose() -> DoseDetails {
        DoseDetails {
            patient_name: "Siti".into(),
            medication_name: "Rifampisin".into(),
            dose: "450 mg".into(),
            scheduled_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn reminder_and_missed_are_framed_differently() {
        let reminder = TemplateData::Reminder(dose()).render(vec!["a@x.id".into()], "http://app");
        let missed = TemplateData::Missed(dose()).render(vec!["a@x.id".into()], "http://app");
        assert_eq!(reminder.kind, TemplateKind::Reminder);
        assert_eq!(missed.kind, TemplateKind::Missed);
        assert!(reminder.subject.starts_with("Pengingat"));
        assert!(missed.subject.starts_with("Peringatan"));
        assert!(reminder.body.contains("08:00, 01-01-2024"));
        assert!(missed.body.contains("http://app"));
    }

    #[test]
    fn weekly_summary_lists_counts() {
        let data = TemplateData::WeeklySummary {
            patient_name: "Siti".into(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            summary: AdherenceSummary::from_counts(10, 7, 3),
        };
        let message = data.render(vec!["a@x.id".into()], "http://app");
        assert!(message.body.contains("Tingkat kepatuhan: 70%"));
        assert!(message.body.contains("Cukup baik"));
    }

    #[test]
    fn zero_data_summary_still_renders() {
        let data = TemplateData::WeeklySummary {
            patient_name: "Siti".into(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            summary: AdherenceSummary::from_counts(0, 0, 0),
        };
        let message = data.render(vec!["a@x.id".into()], "http://app");
        assert!(message.body.contains("Total dosis: 0"));
        assert!(message.body.contains("Perlu ditingkatkan"));
    }
}
