//! Weekly adherence summary email.
//!
//! Every active patient gets one, including patients with no logged doses
//! (their rate is reported as 0%).

use super::{resolve_recipients, summarize_adherence, AdherenceWindow, ReminderError, SweepReport};
use crate::config::WEEKLY_SUMMARY_DAYS;
use crate::core_state::CoreState;
use crate::db;
use crate::email::TemplateData;
use crate::models::enums::RecipientToggle;
use crate::models::Patient;

pub async fn run_weekly_summary(state: &CoreState) -> Result<SweepReport, ReminderError> {
    let patients = {
        let conn = state.db()?;
        db::list_active_patients(&conn)?
    };

    let mut report = SweepReport {
        considered: patients.len(),
        ..SweepReport::default()
    };

    for patient in &patients {
        if let Err(e) = summarize_one(state, patient, &mut report).await {
            report.errors += 1;
            tracing::warn!(patient_id = %patient.id, error = %e, "Weekly summary failed for patient");
        }
    }

    tracing::info!(
        patients = report.considered,
        sent = report.processed,
        delivery_failures = report.delivery_failures,
        errors = report.errors,
        "Weekly summary finished"
    );
    Ok(report)
}

async fn summarize_one(state: &CoreState, patient: &Patient, report: &mut SweepReport) -> Result<(), ReminderError> {
    let now = state.now();
    let window = AdherenceWindow::trailing(now, WEEKLY_SUMMARY_DAYS);
    let (summary, recipients) = {
        let conn = state.db()?;
        let summary = summarize_adherence(&conn, &patient.id, &window)?;
        let recipients = resolve_recipients(&conn, patient, RecipientToggle::WeeklySummary)?;
        (summary, recipients)
    };

    if recipients.is_empty() {
        report.skipped += 1;
        return Ok(());
    }
    if summary.total == 0 {
        tracing::debug!(patient_id = %patient.id, "Weekly summary with no logged doses");
    }

    let message = TemplateData::WeeklySummary {
        patient_name: patient.name.clone(),
        start: window.start.date(),
        end: window.end.date(),
        summary,
    }
    .render(recipients, &state.config().app_url);

    match state.delivery().deliver(&message, now).await {
        Some(_) => report.processed += 1,
        None => report.delivery_failures += 1,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::TemplateKind;
    use crate::core_state::testing::TestCore;
    use crate::models::AdherenceLogEntry;
    use chrono::{Duration, NaiveDateTime};
    use uuid::Uuid;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[tokio::test]
    async fn every_active_patient_gets_a_summary() {
        let core = TestCore::at("2024-01-08 09:00:00");
        let siti = core.add_patient("Siti", "siti@example.com");
        core.add_patient("Andi", "andi@example.com");
        core.add_family(siti, "weekly@example.com", false, true);
        core.add_family(siti, "alerts@example.com", true, false);
        {
            let conn = core.state.db().unwrap();
            let scheduled = ts("2024-01-05 08:00:00");
            db::append_adherence_entry(
                &conn,
                &AdherenceLogEntry::taken(siti, Uuid::new_v4(), scheduled, scheduled + Duration::minutes(3)),
            )
            .unwrap();
        }

        let report = run_weekly_summary(&core.state).await.unwrap();
        assert_eq!(report.considered, 2);
        assert_eq!(report.processed, 2);

        let sent = core.sender.sent_of(TemplateKind::WeeklySummary);
        let to_siti = sent.iter().find(|m| m.to[0] == "siti@example.com").unwrap();
        assert_eq!(to_siti.to, vec!["siti@example.com".to_string(), "weekly@example.com".to_string()]);
        assert!(to_siti.body.contains("Tingkat kepatuhan: 100%"));

        // Zero-data patients still receive a 0% summary.
        let to_andi = sent.iter().find(|m| m.to[0] == "andi@example.com").unwrap();
        assert!(to_andi.body.contains("Tingkat kepatuhan: 0%"));
    }

    #[tokio::test]
    async fn one_failure_does_not_block_others() {
        let core = TestCore::at("2024-01-08 09:00:00");
        core.add_patient("Siti", "siti@example.com");
        core.add_patient("Andi", "andi@example.com");
        core.sender.fail_all(true);

        let report = run_weekly_summary(&core.state).await.unwrap();
        assert_eq!(report.considered, 2);
        assert_eq!(report.delivery_failures, 2);
        assert_eq!(core.state.delivery().dead_letter_count(), 2);
    }

    #[tokio::test]
    async fn entries_older_than_a_week_are_excluded() {
        let core = TestCore::at("2024-01-15 09:00:00");
        let siti = core.add_patient("Siti", "siti@example.com");
        {
            let conn = core.state.db().unwrap();
            let old = ts("2024-01-01 08:00:00");
            db::append_adherence_entry(&conn, &AdherenceLogEntry::missed(siti, Uuid::new_v4(), old, old)).unwrap();
        }
        run_weekly_summary(&core.state).await.unwrap();
        let sent = core.sender.sent_of(TemplateKind::WeeklySummary);
        assert!(sent[0].body.contains("Total dosis: 0"));
    }
}
