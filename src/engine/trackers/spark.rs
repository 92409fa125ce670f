//! Spark (triple-entry) tracker: users holding all three programs share the
//! spark fund, tiered by their highest global slot.

use crate::db::Repository;
use crate::domain::{catalog, BonusKind, EligibilityReport, Program, TimeMs, UserId};
use crate::error::EngineError;

pub const KIND: BonusKind = BonusKind::Spark;

pub const FUND_PROGRAM: Program = Program::Global;

pub async fn check_eligibility(
    repo: &Repository,
    user: &UserId,
    now: TimeMs,
) -> Result<EligibilityReport, EngineError> {
    let rec = repo.get_tracker_or_empty(user, KIND).await?;

    let stored = match repo.get_user(user).await? {
        Some(u) => u,
        None => return Err(EngineError::UnknownUser(user.clone())),
    };

    if !stored.is_triple_entry() {
        let mut missing = Vec::new();
        for program in [Program::Binary, Program::Matrix, Program::Global] {
            if !stored.has_joined(program) {
                missing.push(program.as_str());
            }
        }
        let reasons = vec![format!("missing programs: {}", missing.join(", "))];
        return super::persist_report(repo, rec, false, reasons, None, now).await;
    }

    let tier = match repo.max_active_slot(user, Program::Global).await? {
        Some(slot) => {
            catalog::slot_def(Program::Global, slot).map(|def| (def.name.to_string(), slot))
        }
        None => None,
    };

    let reasons = match &tier {
        Some((name, slot)) => vec![
            "all three programs joined".to_string(),
            format!("global slot {} ({})", slot, name),
        ],
        None => vec!["all three programs joined".to_string()],
    };

    super::persist_report(repo, rec, true, reasons, tier, now).await
}
