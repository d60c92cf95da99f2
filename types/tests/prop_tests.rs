use proptest::prelude::*;

use tally_types::{KeyMode, PendingTransaction, Timestamp, User, UserId};

fn id_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,12}"
}

proptest! {
    /// Pair keys are exactly `sender-receiver`.
    #[test]
    fn pair_key_format(sender in id_strategy(), receiver in id_strategy(), amount in any::<i64>()) {
        let tx = PendingTransaction::new(
            UserId::new(sender.clone()),
            UserId::new(receiver.clone()),
            amount,
            0,
        ).unwrap();
        let key = tx.key(KeyMode::Pair);
        let expected = format!("{}-{}", sender, receiver);
        prop_assert_eq!(key.as_str(), expected.as_str());
    }

    /// Two submissions for the same ordered pair share a pair key but never a request key.
    #[test]
    fn same_pair_shares_only_pair_key(sender in id_strategy(), receiver in id_strategy()) {
        let first = PendingTransaction::new(sender.as_str().into(), receiver.as_str().into(), 5, 0).unwrap();
        let second = PendingTransaction::new(sender.as_str().into(), receiver.as_str().into(), 9, 0).unwrap();
        prop_assert_eq!(first.key(KeyMode::Pair), second.key(KeyMode::Pair));
        prop_assert_ne!(first.key(KeyMode::Request), second.key(KeyMode::Request));
    }

    /// Verification never flips back, however often it is applied.
    #[test]
    fn verification_is_monotonic(times in 1usize..16, balance in any::<i64>()) {
        let mut user = User::new(UserId::new("u"), "n", balance);
        let mut changed = 0;
        for _ in 0..times {
            if user.verify() {
                changed += 1;
            }
            prop_assert!(user.verified);
        }
        prop_assert_eq!(changed, 1);
        prop_assert_eq!(user.balance, balance);
    }

    /// Timestamp ordering follows the underlying millis.
    #[test]
    fn timestamp_ordering(a in any::<u64>(), b in any::<u64>()) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(tb.as_millis(), b);
    }
}
