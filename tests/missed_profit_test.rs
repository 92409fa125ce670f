//! Missed-profit recovery: accumulation sweeps missed commissions into the
//! stipend fund, distribution spreads them over eligible stipend holders,
//! and no fraction of money is ever lost along the way.

use tempfile::TempDir;

use tierflow::config::Config;
use tierflow::db::init_db;
use tierflow::domain::{
    catalog, Amount, BonusKind, Program, Role, TimeMs, TxHash, User, UserId, Wallet,
};
use tierflow::engine::{accumulate_missed, distribute_accumulated};
use tierflow::orchestration::{process_join, run_daily, JoinRequest};
use tierflow::Repository;

const NOW: i64 = 1_705_320_000_000; // 2024-01-15

async fn setup() -> (Repository, Config, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let config = Config {
        port: 0,
        database_path: db_path,
        mother_id: UserId::new("mother".to_string()),
        write_retry_limit: 3,
    };
    (Repository::new(pool), config, temp_dir)
}

async fn add_user(repo: &Repository, id: &str) {
    let user = User {
        id: UserId::new(id.to_string()),
        sponsor_id: None,
        wallet: Wallet::new(format!("0x{}", id)),
        role: Role::Normal,
        binary_joined: false,
        matrix_joined: false,
        global_joined: false,
        binary_joined_at: None,
        matrix_joined_at: None,
        global_joined_at: None,
        created_at: TimeMs::new(NOW),
    };
    repo.insert_user(&user).await.unwrap();
}

async fn climb_binary(repo: &Repository, config: &Config, user: &str, top: i64) -> Amount {
    let mut spent = Amount::zero();
    for slot in 1..=top {
        let amount = catalog::slot_price(Program::Binary, slot).unwrap();
        let req = JoinRequest {
            tx_hash: TxHash::new(format!("tx:{}:{}", user, slot)),
            user_id: UserId::new(user.to_string()),
            sponsor_id: None,
            program: Program::Binary,
            slot_no: slot,
            amount,
        };
        process_join(repo, config, &req, TimeMs::new(NOW)).await.unwrap();
        spent = spent + amount;
    }
    spent
}

#[tokio::test]
async fn test_accumulate_moves_missed_into_stipend_fund() {
    let (repo, config, _temp) = setup().await;
    add_user(&repo, "u").await;
    let spent = climb_binary(&repo, &config, "u", 10).await;

    // Every fan-out missed (no upline), so the missed fund holds all of it.
    let missed_fund = repo
        .get_fund(BonusKind::MissedProfit, Program::Binary)
        .await
        .unwrap();
    assert_eq!(missed_fund.available(), spent);

    let report = accumulate_missed(
        &repo,
        &config,
        TimeMs::new(0),
        TimeMs::new(NOW + 1),
        TimeMs::new(NOW),
    )
    .await
    .unwrap();

    // 10 payments, 17 shares each, one (binary, no_upline) group.
    assert_eq!(report.swept, 170);
    assert_eq!(report.groups, 1);
    assert_eq!(report.total, spent);

    let missed_fund = repo
        .get_fund(BonusKind::MissedProfit, Program::Binary)
        .await
        .unwrap();
    assert!(missed_fund.available().is_zero());
    let stipend_fund = repo
        .get_fund(BonusKind::LeadershipStipend, Program::Binary)
        .await
        .unwrap();
    assert_eq!(stipend_fund.available(), spent);

    // A second sweep of the same window finds nothing.
    let rerun = accumulate_missed(
        &repo,
        &config,
        TimeMs::new(0),
        TimeMs::new(NOW + 1),
        TimeMs::new(NOW),
    )
    .await
    .unwrap();
    assert_eq!(rerun.swept, 0);
    assert!(rerun.total.is_zero());
}

#[tokio::test]
async fn test_distribute_pays_eligible_stipend_holder() {
    let (repo, config, _temp) = setup().await;
    add_user(&repo, "u").await;
    // Slots 1..=10 cost 0.0022 * 1023 = 2.2506, just under the 2.2528 cap.
    let spent = climb_binary(&repo, &config, "u", 10).await;
    assert_eq!(spent, Amount::from_str_canonical("2.2506").unwrap());

    accumulate_missed(
        &repo,
        &config,
        TimeMs::new(0),
        TimeMs::new(NOW + 1),
        TimeMs::new(NOW),
    )
    .await
    .unwrap();

    let report = distribute_accumulated(&repo, &config, "2024-01-15", TimeMs::new(NOW))
        .await
        .unwrap();
    assert_eq!(report.pools, 1);
    assert_eq!(report.recipients, 1);
    assert_eq!(report.total_distributed, spent);
    assert!(report.skipped.is_empty());

    let tracker = repo
        .get_tracker(&UserId::new("u".to_string()), BonusKind::LeadershipStipend)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tracker.total_paid, spent);
    assert!(tracker.pending().is_zero());

    // Conservation: what was paid out plus what remains equals what went in.
    let stipend_fund = repo
        .get_fund(BonusKind::LeadershipStipend, Program::Binary)
        .await
        .unwrap();
    assert!(stipend_fund.available().is_zero());

    let payouts = repo
        .query_fund_payouts(BonusKind::LeadershipStipend, "2024-01-15")
        .await
        .unwrap();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].1, spent);

    // The claimed pool cannot be distributed twice.
    let rerun = distribute_accumulated(&repo, &config, "2024-01-15", TimeMs::new(NOW))
        .await
        .unwrap();
    assert_eq!(rerun.pools, 0);
    assert!(rerun.total_distributed.is_zero());
}

#[tokio::test]
async fn test_distribute_without_eligible_holders_retains_pool() {
    let (repo, config, _temp) = setup().await;
    add_user(&repo, "small").await;
    climb_binary(&repo, &config, "small", 3).await;

    accumulate_missed(
        &repo,
        &config,
        TimeMs::new(0),
        TimeMs::new(NOW + 1),
        TimeMs::new(NOW),
    )
    .await
    .unwrap();

    let report = distribute_accumulated(&repo, &config, "2024-01-15", TimeMs::new(NOW))
        .await
        .unwrap();
    assert_eq!(report.pools, 0);
    assert_eq!(report.recipients, 0);
    assert_eq!(report.skipped.len(), 1);

    // The pool stays claimable for a later run.
    let pending = repo.query_undistributed_accumulations().await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_share_past_daily_cap_stays_in_fund() {
    let (repo, config, _temp) = setup().await;
    add_user(&repo, "u").await;
    let spent = climb_binary(&repo, &config, "u", 10).await;

    // The daily batch accrues the full 2.2528 cap first.
    run_daily(&repo, &config, TimeMs::new(NOW)).await.unwrap();

    accumulate_missed(
        &repo,
        &config,
        TimeMs::new(0),
        TimeMs::new(NOW + 1),
        TimeMs::new(NOW),
    )
    .await
    .unwrap();

    let report = distribute_accumulated(&repo, &config, "2024-01-15", TimeMs::new(NOW))
        .await
        .unwrap();

    // The share is rejected by the cap, not clamped; the money stays in the
    // stipend fund instead of vanishing.
    assert!(report.total_distributed.is_zero());
    assert_eq!(report.skipped.len(), 1);
    let stipend_fund = repo
        .get_fund(BonusKind::LeadershipStipend, Program::Binary)
        .await
        .unwrap();
    assert_eq!(stipend_fund.available(), spent);
}
