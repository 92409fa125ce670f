//! Newcomer Support tracker: users inside their first 30 days of Binary
//! membership who already referred at least one partner share the support
//! fund in the daily batch.

use crate::db::Repository;
use crate::domain::{catalog, BonusKind, EligibilityReport, Program, TimeMs, UserId};
use crate::error::EngineError;

pub const KIND: BonusKind = BonusKind::NewcomerSupport;

pub const FUND_PROGRAM: Program = Program::Binary;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub async fn check_eligibility(
    repo: &Repository,
    user: &UserId,
    now: TimeMs,
) -> Result<EligibilityReport, EngineError> {
    let rec = repo.get_tracker_or_empty(user, KIND).await?;

    let joined_at = match repo.get_user(user).await? {
        Some(u) => u.binary_joined_at,
        None => return Err(EngineError::UnknownUser(user.clone())),
    };

    let (eligible, reasons) = match joined_at {
        None => (false, vec!["binary not joined".to_string()]),
        Some(at) => {
            let age_days = (now.as_i64() - at.as_i64()) / DAY_MS;
            if age_days >= catalog::NEWCOMER_WINDOW_DAYS {
                (
                    false,
                    vec![format!(
                        "joined {} days ago, outside the {}-day window",
                        age_days,
                        catalog::NEWCOMER_WINDOW_DAYS
                    )],
                )
            } else {
                let directs = repo.count_direct_partners(user, Program::Binary).await?;
                if directs >= 1 {
                    (
                        true,
                        vec![
                            format!("joined {} days ago", age_days),
                            format!("{} direct partners", directs),
                        ],
                    )
                } else {
                    (false, vec!["no direct partners yet".to_string()])
                }
            }
        }
    };

    super::persist_report(repo, rec, eligible, reasons, None, now).await
}
