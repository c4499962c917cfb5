//! End-to-end tests driving the cache through `CachedTable`.
//!
//! Every scenario runs against both cache policies unless it is specific to
//! one of them.

use std::sync::Arc;

use tessera_cache::{
    CacheConfig, CacheError, CachePolicy, CachedTable, InMemoryRowStore, RowState, RowStore,
    RowWriter, StoreError, TesseraError,
};
use tessera_test_utils::{account_extractor, account_key, init_test_tracing, Account};

type AccountTable = CachedTable<Account, InMemoryRowStore<Account>>;

const POLICIES: [CachePolicy; 2] = [CachePolicy::ReadOnly, CachePolicy::ReadWrite];

fn seeded_store() -> InMemoryRowStore<Account> {
    let mut store = InMemoryRowStore::new("accounts", account_extractor());
    store
        .seed([
            Account::new("main", 4, 400),
            Account::new("main", 5, 500),
            Account::new("main", 6, 600),
        ])
        .unwrap();
    store
}

fn table_with(config: CacheConfig) -> AccountTable {
    init_test_tracing();
    CachedTable::new(seeded_store(), account_extractor(), &config).unwrap()
}

fn table(policy: CachePolicy) -> AccountTable {
    table_with(CacheConfig::default().with_policy(policy))
}

fn cache_contains(table: &AccountTable, number: i64) -> bool {
    table.cache().unwrap().contains(&account_key("main", number))
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_insert_visible_in_and_after_transaction() {
    for policy in POLICIES {
        let mut table = table(policy);
        let key = account_key("main", 1);

        let mut txn = table.begin().unwrap();
        let inserted = txn.insert(Account::new("main", 1, 10)).unwrap();
        assert!(txn.cache().unwrap().contains(&key));
        let selected = txn.select(inserted.key_values()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&inserted, &selected), "{policy}");
        txn.commit().unwrap();

        assert!(cache_contains(&table, 1), "{policy}");
        assert_eq!(table.store().get(&key), Some(&Account::new("main", 1, 10)));
    }
}

#[test]
fn test_select_missing_row_not_cached() {
    for policy in POLICIES {
        let mut table = table(policy);

        let mut txn = table.begin().unwrap();
        assert!(txn.select_key(&account_key("main", 2)).unwrap().is_none());
        txn.commit().unwrap();

        assert!(!cache_contains(&table, 2), "{policy}");
        assert_eq!(table.cache().unwrap().misses(), 1);
    }
}

#[test]
fn test_duplicate_insert_then_rollback() {
    for policy in POLICIES {
        let mut table = table(policy);

        let mut txn = table.begin().unwrap();
        txn.insert(Account::new("main", 3, 30)).unwrap();
        let err = txn.insert(Account::new("main", 3, 31)).unwrap_err();
        assert!(
            matches!(err, TesseraError::Cache(ref e) if e.is_duplicate()),
            "{policy}: {err}"
        );
        txn.rollback().unwrap();

        assert!(!cache_contains(&table, 3), "{policy}");
        assert!(table.store().get(&account_key("main", 3)).is_none());
    }
}

#[test]
fn test_update_visible_to_next_transaction() {
    for policy in POLICIES {
        let mut table = table(policy);
        let key = account_key("main", 4);

        let mut txn = table.begin().unwrap();
        let original = txn.select_key(&key).unwrap().unwrap();
        assert_eq!(original.balance, 400);
        txn.update(original.with_balance(450)).unwrap();
        txn.commit().unwrap();

        let selects_before = table.store().counters().selects;
        let mut txn = table.begin().unwrap();
        let current = txn.select_key(&key).unwrap().unwrap();
        assert_eq!(current.balance, 450, "{policy}");
        txn.commit().unwrap();

        assert_eq!(table.store().counters().selects, selects_before, "{policy}");
        assert_eq!(table.store().get(&key).unwrap().balance, 450);
        assert_eq!(table.cache().unwrap().hits(), 1);
    }
}

#[test]
fn test_pending_delete_contained_but_not_selectable() {
    for policy in POLICIES {
        let mut table = table(policy);
        let key = account_key("main", 5);

        let mut txn = table.begin().unwrap();
        txn.delete(Account::new("main", 5, 500)).unwrap();
        assert!(txn.cache().unwrap().contains(&key), "{policy}");
        assert_eq!(
            txn.cache().unwrap().core().uncommitted_state(&key),
            Some(RowState::Delete)
        );
        assert!(txn.select_key(&key).unwrap().is_none(), "{policy}");
        txn.commit().unwrap();

        assert!(!cache_contains(&table, 5), "{policy}");
        assert!(table.store().get(&key).is_none());
    }
}

#[test]
fn test_evict_on_transaction_end_clears_committed() {
    for policy in POLICIES {
        let mut table = table_with(
            CacheConfig::default()
                .with_policy(policy)
                .with_evict_on_transaction_end(true),
        );

        let mut txn = table.begin().unwrap();
        assert!(txn.select_key(&account_key("main", 6)).unwrap().is_some());
        txn.commit().unwrap();

        assert!(!cache_contains(&table, 6), "{policy}");
        assert_eq!(table.cache().unwrap().core().committed_len(), 0);
    }
}

// ============================================================================
// TRANSACTION LIFECYCLE
// ============================================================================

#[test]
fn test_rollback_restores_committed_view() {
    for policy in POLICIES {
        let mut table = table(policy);
        let key = account_key("main", 4);

        let mut txn = table.begin().unwrap();
        txn.select_key(&key).unwrap();
        txn.commit().unwrap();

        let mut txn = table.begin().unwrap();
        txn.update(Account::new("main", 4, 999)).unwrap();
        txn.delete(Account::new("main", 5, 500)).unwrap();
        txn.insert(Account::new("main", 7, 700)).unwrap();
        txn.rollback().unwrap();

        assert!(cache_contains(&table, 4));
        assert!(!cache_contains(&table, 7));
        let mut txn = table.begin().unwrap();
        assert_eq!(txn.select_key(&key).unwrap().unwrap().balance, 400, "{policy}");
        assert_eq!(txn.select_key(&account_key("main", 5)).unwrap().unwrap().balance, 500);
        assert!(txn.select_key(&account_key("main", 7)).unwrap().is_none());
        txn.commit().unwrap();
    }
}

#[test]
fn test_dropped_transaction_rolls_back() {
    for policy in POLICIES {
        let mut table = table(policy);
        {
            let mut txn = table.begin().unwrap();
            txn.insert(Account::new("main", 8, 800)).unwrap();
        }

        assert!(!table.store().in_transaction());
        assert!(!table.cache().unwrap().core().is_active());
        assert!(table.store().get(&account_key("main", 8)).is_none(), "{policy}");
        assert!(!cache_contains(&table, 8));

        // table is usable again
        let txn = table.begin().unwrap();
        txn.commit().unwrap();
    }
}

#[test]
fn test_read_write_defers_store_writes_to_commit() {
    let mut table = table(CachePolicy::ReadWrite);

    let mut txn = table.begin().unwrap();
    txn.insert(Account::new("main", 1, 10)).unwrap();
    txn.update(Account::new("main", 1, 11)).unwrap();
    txn.save(Account::new("main", 4, 401)).unwrap();
    txn.delete(Account::new("main", 6, 600)).unwrap();
    txn.commit().unwrap();

    let counters = table.store().counters();
    assert_eq!(counters.inserts, 1);
    assert_eq!(counters.deletes, 1);
    assert_eq!(table.store().get(&account_key("main", 1)).unwrap().balance, 11);
    assert_eq!(table.store().get(&account_key("main", 4)).unwrap().balance, 401);
    assert!(table.store().get(&account_key("main", 6)).is_none());
}

#[test]
fn test_read_only_writes_reach_store_immediately() {
    let mut table = table(CachePolicy::ReadOnly);

    let mut txn = table.begin().unwrap();
    txn.insert(Account::new("main", 1, 10)).unwrap();
    txn.delete(Account::new("main", 6, 600)).unwrap();
    txn.rollback().unwrap();

    let counters = table.store().counters();
    assert_eq!(counters.inserts, 1);
    assert_eq!(counters.deletes, 1);
    // store rollback undid both
    assert_eq!(table.store().len(), 3);
}

#[test]
fn test_read_write_replace_flushes_delete_then_insert() {
    let mut table = table(CachePolicy::ReadWrite);
    let key = account_key("main", 5);

    let mut txn = table.begin().unwrap();
    txn.delete(Account::new("main", 5, 500)).unwrap();
    txn.insert(Account::new("main", 5, 555)).unwrap();
    assert_eq!(
        txn.cache().unwrap().core().uncommitted_state(&key),
        Some(RowState::Insert)
    );
    txn.commit().unwrap();

    assert_eq!(table.store().get(&key).unwrap().balance, 555);
    assert_eq!(table.store().counters().deletes, 1);
    assert_eq!(table.store().counters().inserts, 1);
}

#[test]
fn test_failed_flush_abandons_transaction() {
    let mut table = table(CachePolicy::ReadWrite);
    let key = account_key("main", 4);

    // cache has never seen key 4, so the duplicate surfaces at flush
    let mut txn = table.begin().unwrap();
    txn.insert(Account::new("main", 4, 1)).unwrap();
    let err = txn.commit().unwrap_err();
    assert!(matches!(
        err,
        TesseraError::Cache(CacheError::Write(StoreError::DuplicateKey { .. }))
    ));

    assert!(!table.store().in_transaction());
    assert!(!table.cache().unwrap().core().is_active());
    assert!(!cache_contains(&table, 4));
    assert_eq!(table.store().get(&key).unwrap().balance, 400);
}

#[test]
fn test_insert_then_delete_never_reaches_store() {
    let mut table = table(CachePolicy::ReadWrite);

    let mut txn = table.begin().unwrap();
    txn.insert(Account::new("main", 9, 900)).unwrap();
    txn.delete(Account::new("main", 9, 900)).unwrap();
    assert!(!txn.cache().unwrap().contains(&account_key("main", 9)));
    txn.commit().unwrap();

    assert_eq!(table.store().counters().writes(), 0);
}

#[test]
fn test_update_of_missing_row_is_not_cached() {
    for policy in POLICIES {
        let mut table = table(policy);
        let key = account_key("main", 42);

        let mut txn = table.begin().unwrap();
        txn.update(Account::new("main", 42, 1)).unwrap();
        txn.commit().unwrap();

        assert!(table.store().get(&key).is_none());
        assert!(!cache_contains(&table, 42), "{policy}");

        let mut txn = table.begin().unwrap();
        assert!(txn.select_key(&key).unwrap().is_none(), "{policy}");
        txn.commit().unwrap();
    }
}

#[test]
fn test_update_of_missing_row_evicts_stale_committed_row() {
    let mut table = table(CachePolicy::ReadOnly);
    let row = Account::new("main", 4, 400);

    let mut txn = table.begin().unwrap();
    txn.select_key(&row.key()).unwrap();
    txn.commit().unwrap();

    // the row disappears behind the cache's back
    table.store_mut().begin().unwrap();
    table.store_mut().delete(&row).unwrap();
    table.store_mut().commit().unwrap();

    let mut txn = table.begin().unwrap();
    txn.update(row.with_balance(401)).unwrap();
    assert!(txn.select_key(&row.key()).unwrap().is_none());
    txn.commit().unwrap();

    assert!(!cache_contains(&table, 4));
    let mut txn = table.begin().unwrap();
    assert!(txn.select_key(&row.key()).unwrap().is_none());
    txn.commit().unwrap();
}

#[test]
fn test_delete_survives_direct_write_and_reinsert() {
    let mut table = table(CachePolicy::ReadWrite);
    let key = account_key("main", 5);

    let mut txn = table.begin().unwrap();
    txn.select_key(&key).unwrap();
    txn.commit().unwrap();

    let mut txn = table.begin().unwrap();
    txn.delete(Account::new("main", 5, 500)).unwrap();
    txn.write().unwrap();
    txn.insert(Account::new("main", 5, 200)).unwrap();
    txn.delete(Account::new("main", 5, 200)).unwrap();
    assert!(txn.select_key(&key).unwrap().is_none());
    txn.commit().unwrap();

    assert!(table.store().get(&key).is_none());
    assert!(!cache_contains(&table, 5));
    assert!(table.cache().unwrap().core().committed_row(&key).is_none());
}

#[test]
fn test_direct_write_mid_transaction_reaches_store_once() {
    let mut table = table(CachePolicy::ReadWrite);

    let mut txn = table.begin().unwrap();
    txn.insert(Account::new("main", 1, 10)).unwrap();
    txn.write().unwrap();
    txn.update(Account::new("main", 1, 11)).unwrap();
    txn.commit().unwrap();

    let counters = table.store().counters();
    assert_eq!(counters.inserts, 1);
    assert_eq!(counters.updates, 1);
    assert_eq!(table.store().get(&account_key("main", 1)).unwrap().balance, 11);
}

// ============================================================================
// EVICTION, STATISTICS, DISABLED CACHE
// ============================================================================

#[test]
fn test_evict_forces_store_read() {
    for policy in POLICIES {
        let mut table = table(policy);
        let row = Account::new("main", 4, 400);

        let mut txn = table.begin().unwrap();
        txn.select_key(&row.key()).unwrap();
        txn.commit().unwrap();
        assert!(cache_contains(&table, 4));

        table.cache_mut().unwrap().evict(&row).unwrap();
        assert!(!cache_contains(&table, 4), "{policy}");

        let selects_before = table.store().counters().selects;
        let mut txn = table.begin().unwrap();
        assert!(txn.select_key(&row.key()).unwrap().is_some());
        txn.commit().unwrap();
        assert_eq!(table.store().counters().selects, selects_before + 1);
    }
}

#[test]
fn test_stats_count_every_select() {
    let mut table = table(CachePolicy::ReadOnly);

    let mut txn = table.begin().unwrap();
    for number in [4, 4, 5, 2, 4] {
        txn.select_key(&account_key("main", number)).unwrap();
    }
    txn.commit().unwrap();

    let cache = table.cache().unwrap();
    // first 4, 5 and the missing 2 go to the store
    assert_eq!(cache.misses(), 3);
    assert_eq!(cache.hits(), 2);
    assert_eq!(cache.hits() + cache.misses(), 5);
    assert_eq!(cache.percent_hits(), 40);

    let report = cache.log();
    assert_eq!(report.committed_len(), 2);
    assert_eq!(report.uncommitted_len(), None);
    assert_eq!(report.policy, CachePolicy::ReadOnly);
}

#[test]
fn test_disabled_cache_goes_straight_to_store() {
    let mut table = table_with(CacheConfig::default().with_enabled(false));
    assert!(table.cache().is_none());

    let mut txn = table.begin().unwrap();
    let key = account_key("main", 4);
    txn.select_key(&key).unwrap();
    txn.select_key(&key).unwrap();
    txn.insert(Account::new("main", 1, 10)).unwrap();
    let err = txn.insert(Account::new("main", 1, 10)).unwrap_err();
    assert!(matches!(err, TesseraError::Store(StoreError::DuplicateKey { .. })));
    txn.commit().unwrap();

    assert_eq!(table.store().counters().selects, 2);
    assert!(table.store().get(&account_key("main", 1)).is_some());
}

#[test]
fn test_select_by_values_checks_arity() {
    let mut table = table(CachePolicy::ReadOnly);

    let mut txn = table.begin().unwrap();
    let err = txn.select(vec!["main".into()]).unwrap_err();
    assert!(matches!(
        err,
        TesseraError::Cache(CacheError::KeyArity {
            expected: 2,
            got: 1,
            ..
        })
    ));
    txn.rollback().unwrap();
}
