use proptest::prelude::*;

use tally_node::{LedgerNode, NodeConfig, SchedulerConfig};
use tally_types::{KeyMode, UserId};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

struct Outcome {
    balances: Vec<(i64, bool)>,
    verification_pending: usize,
}

/// Create `verified + unverified` users, verify the first group only, apply
/// `transfers` (index pairs into the user list) and drain the transaction queue.
async fn run_ledger(
    verified: usize,
    unverified: usize,
    transfers: &[(usize, usize, i64)],
    workers: usize,
    key_mode: KeyMode,
) -> Outcome {
    let node = LedgerNode::new(NodeConfig {
        verification: SchedulerConfig::new(10, workers),
        transaction: SchedulerConfig::new(10, workers),
        key_mode,
        ..NodeConfig::default()
    })
    .unwrap();

    let mut ids: Vec<UserId> = Vec::new();
    for i in 0..verified {
        ids.push(node.create_user(format!("v{i}")).await.unwrap().id);
    }
    while node.queue_depths().await.verification > 0 {
        node.tick_verification().await;
    }
    for i in 0..unverified {
        ids.push(node.create_user(format!("u{i}")).await.unwrap().id);
    }

    for &(s, r, amount) in transfers {
        let sender = ids[s % ids.len()].clone();
        let receiver = ids[r % ids.len()].clone();
        node.submit_transaction(sender, receiver, amount).await.unwrap();
    }
    while node.queue_depths().await.transaction > 0 {
        node.tick_transactions().await;
    }

    let users = node.list_users().await;
    Outcome {
        balances: ids
            .iter()
            .map(|id| (users[id].balance, users[id].verified))
            .collect(),
        verification_pending: node.queue_depths().await.verification,
    }
}

fn transfers() -> impl Strategy<Value = Vec<(usize, usize, i64)>> {
    prop::collection::vec((0usize..16, 0usize..16, 0i64..1500), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Non-negative transfers conserve the total and never overdraw anyone.
    #[test]
    fn balance_conserved(
        verified in 1usize..6,
        unverified in 0usize..3,
        transfers in transfers(),
        workers in 1usize..5,
        request_keys in any::<bool>(),
    ) {
        let mode = if request_keys { KeyMode::Request } else { KeyMode::Pair };
        let out = runtime().block_on(run_ledger(verified, unverified, &transfers, workers, mode));
        let total: i64 = out.balances.iter().map(|(b, _)| b).sum();
        prop_assert_eq!(total, 1000 * (verified + unverified) as i64);
        for (balance, _) in &out.balances {
            prop_assert!(*balance >= 0, "negative balance {}", balance);
        }
    }

    /// Unverified users never take part in a completed transfer.
    #[test]
    fn unverified_balances_untouched(
        verified in 1usize..4,
        unverified in 1usize..4,
        transfers in transfers(),
        workers in 1usize..4,
    ) {
        let out = runtime().block_on(run_ledger(verified, unverified, &transfers, workers, KeyMode::Request));
        for (balance, is_verified) in &out.balances {
            if !is_verified {
                prop_assert_eq!(*balance, 1000);
            }
        }
        prop_assert!(out.verification_pending <= unverified);
    }
}
