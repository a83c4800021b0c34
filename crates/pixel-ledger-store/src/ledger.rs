//! The purchase coordinator.
//!
//! [`Ledger`] is the only writer of cells, wallets and the audit log. A
//! purchase moves through `Validated -> PriceResolved -> BalanceChecked ->
//! Applied -> Committed` inside one atomic unit; any failure before commit
//! leaves no trace. Commit-time conflicts restart the unit from fresh reads,
//! so no price or balance outlives a single attempt.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use pixel_ledger_core::{
    Account, AccountId, Cell, CellIndex, CellView, CreditReceipt, GridConfig, LedgerError,
    PriceEngine, PurchaseId, PurchaseReceipt, PurchaseRecord, PurchaseRequest, Result, TopUp,
    TopUpSource, ValidatedPurchase, WindowEntry,
};

use crate::{LedgerTxn, Store};

/// Default number of attempts for a contended atomic unit.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// Page size of history listings when the caller gives none.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Largest page size of history listings.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Deepest offset a history listing may start at.
pub const MAX_HISTORY_OFFSET: usize = 10_000;

/// A window response: purchased cells only, keyed by index.
pub type Window = BTreeMap<CellIndex, WindowEntry>;

/// How often and how patiently conflicting units are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep after the first conflict.
    pub initial_backoff: Duration,
    /// Upper bound on any single sleep.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Default backoff with a custom attempt budget (at least one).
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Sleep before retrying after `failed_attempts` conflicts: doubling from
    /// `initial_backoff`, capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let factor = 1_u32
            .checked_shl(failed_attempts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Price of a cell as read inside the current attempt.
struct PricedCell {
    index: CellIndex,
    purchase_count: u32,
    price_cents: i64,
}

/// Authoritative coordinator over a [`Store`].
pub struct Ledger<S> {
    store: S,
    grid: GridConfig,
    pricing: PriceEngine,
    retry: RetryPolicy,
}

impl<S: Store> Ledger<S> {
    /// Create a ledger over `store`.
    pub fn new(store: S, grid: GridConfig, pricing: PriceEngine, retry: RetryPolicy) -> Self {
        Self {
            store,
            grid,
            pricing,
            retry,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Grid geometry.
    pub const fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Pricing rule.
    pub const fn pricing(&self) -> &PriceEngine {
        &self.pricing
    }

    // =========================================================================
    // PurchaseTransaction
    // =========================================================================

    /// Buy one cell.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` / `InvalidInput` from validation.
    /// - `PriceCapReached` if the cell cannot be bought again.
    /// - `InsufficientFunds` if the wallet cannot cover the price at commit.
    /// - `RetriesExhausted` if every attempt hit a write conflict.
    /// - `Storage` / `Serialization` for database failures.
    pub fn purchase(&self, request: &PurchaseRequest) -> Result<PurchaseReceipt> {
        let purchase = request.validate(&self.grid)?;
        debug!(
            account_id = %purchase.account_id,
            cell = %purchase.cell,
            color = %purchase.color,
            "purchase validated"
        );

        let record = self.with_retries("purchase", || {
            self.store
                .atomically(|txn| self.attempt_purchase(txn, &purchase))
        })?;

        info!(
            account_id = %record.account_id,
            cell = %record.cell_index,
            price_cents = record.price_charged_cents,
            purchase_count = record.purchase_count_after,
            purchase_id = %record.id,
            "purchase committed"
        );

        Ok(record.receipt())
    }

    /// One attempt of the purchase state machine. Everything is staged in
    /// `txn`; an error drops all of it.
    fn attempt_purchase(
        &self,
        txn: &mut dyn LedgerTxn,
        purchase: &ValidatedPurchase,
    ) -> Result<PurchaseRecord> {
        let priced = resolve_price(txn, &self.pricing, purchase.cell)?;

        let mut account = txn
            .account_for_update(&purchase.account_id)?
            .unwrap_or_else(|| Account::new(purchase.account_id));
        if !account.has_sufficient_funds(priced.price_cents) {
            debug!(
                account_id = %purchase.account_id,
                balance = account.balance_cents,
                required = priced.price_cents,
                "purchase rejected: insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds {
                balance: account.balance_cents,
                required: priced.price_cents,
            });
        }

        let now = Utc::now();
        let balance_after_cents = debit(txn, &mut account, priced.price_cents)?;
        let purchase_count_after = apply_purchase(txn, &priced, purchase, now)?;

        let record = PurchaseRecord {
            id: PurchaseId::generate(),
            account_id: purchase.account_id,
            cell_index: purchase.cell,
            color: purchase.color,
            intensity: purchase.intensity,
            price_charged_cents: priced.price_cents,
            purchase_count_after,
            balance_after_cents,
            timestamp: now,
        };
        txn.append_purchase(&record, account.purchase_count)?;

        Ok(record)
    }

    /// Run `attempt` until it stops failing with a transient conflict.
    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let max_attempts = self.retry.max_attempts.max(1);

        for n in 1..=max_attempts {
            match attempt() {
                Err(err) if err.is_transient() => {
                    if n < max_attempts {
                        let delay = self.retry.backoff(n);
                        debug!(operation, attempt = n, ?delay, "write conflict, retrying");
                        thread::sleep(delay);
                    }
                }
                outcome => return outcome,
            }
        }

        warn!(operation, attempts = max_attempts, "giving up after repeated write conflicts");
        Err(LedgerError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    // =========================================================================
    // WindowQuery
    // =========================================================================

    /// Purchased cells in `[start, end)`, read from one consistent view.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` unless `0 <= start < end <= N` and the span is
    /// within the window cap.
    pub fn window(&self, start: i64, end: i64) -> Result<Window> {
        let range = self.grid.window(start, end)?;
        let cells = self.store.cells_in_range(&range)?;
        debug!(start, end, present = cells.len(), "window served");

        Ok(cells.iter().map(|cell| (cell.index, cell.entry())).collect())
    }

    /// A single cell with the price of its next purchase.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an index outside the grid.
    pub fn cell(&self, index: i64) -> Result<CellView> {
        let index = self.grid.cell(index)?;

        Ok(match self.store.get_cell(index)? {
            Some(cell) => CellView::of(&cell, self.pricing.price(cell.purchase_count)),
            None => CellView::unpurchased(index, self.pricing.price(0)),
        })
    }

    // =========================================================================
    // WalletLedger
    // =========================================================================

    /// Add funds to a wallet, at most once per `reference`.
    ///
    /// A replayed reference returns the stored top-up with
    /// `already_applied = true` and changes nothing.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for a non-positive amount or balance overflow.
    /// - `InvalidInput` for an empty reference.
    /// - `RetriesExhausted` under sustained contention.
    pub fn credit(
        &self,
        account_id: &AccountId,
        amount_cents: i64,
        reference: &str,
        source: TopUpSource,
    ) -> Result<CreditReceipt> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "credit must be positive, got {amount_cents}"
            )));
        }
        if reference.trim().is_empty() {
            return Err(LedgerError::InvalidInput("reference must not be empty".into()));
        }

        let receipt = self.with_retries("credit", || {
            self.store.atomically(|txn| -> Result<CreditReceipt> {
                if let Some(top_up) = txn.top_up_for_update(reference)? {
                    return Ok(CreditReceipt {
                        top_up,
                        already_applied: true,
                    });
                }

                let mut account = txn
                    .account_for_update(account_id)?
                    .unwrap_or_else(|| Account::new(*account_id));
                let balance_after_cents = account.credit(amount_cents)?;
                txn.put_account(&account)?;

                let top_up = TopUp {
                    reference: reference.to_owned(),
                    account_id: *account_id,
                    amount_cents,
                    balance_after_cents,
                    source,
                    created_at: account.updated_at,
                };
                txn.put_top_up(&top_up)?;

                Ok(CreditReceipt {
                    top_up,
                    already_applied: false,
                })
            })
        })?;

        if receipt.already_applied {
            if receipt.top_up.account_id != *account_id {
                warn!(
                    reference,
                    account_id = %account_id,
                    credited_account_id = %receipt.top_up.account_id,
                    "top-up reference replayed for a different account"
                );
            }
            debug!(reference, "top-up already applied");
        } else {
            info!(
                account_id = %account_id,
                amount_cents,
                balance_cents = receipt.top_up.balance_after_cents,
                reference,
                "wallet credited"
            );
        }

        Ok(receipt)
    }

    /// Current balance; 0 for a wallet that was never credited.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn balance(&self, account_id: &AccountId) -> Result<i64> {
        Ok(self
            .store
            .get_account(account_id)?
            .map_or(0, |account| account.balance_cents))
    }

    /// The wallet row, or an empty wallet if it was never credited.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn account(&self, account_id: &AccountId) -> Result<Account> {
        Ok(self
            .store
            .get_account(account_id)?
            .unwrap_or_else(|| Account::new(*account_id)))
    }

    // =========================================================================
    // AuditLog
    // =========================================================================

    /// A cell's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an index outside the grid.
    pub fn purchases_by_cell(
        &self,
        index: i64,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        let index = self.grid.cell(index)?;
        let offset = history_offset(offset)?;
        Ok(self
            .store
            .list_purchases_by_cell(index, history_limit(limit), offset)?)
    }

    /// An account's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn purchases_by_account(
        &self,
        account_id: &AccountId,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        let offset = history_offset(offset)?;
        Ok(self
            .store
            .list_purchases_by_account(account_id, history_limit(limit), offset)?)
    }
}

fn history_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT)
}

fn history_offset(offset: usize) -> Result<usize> {
    if offset > MAX_HISTORY_OFFSET {
        return Err(LedgerError::InvalidInput(format!(
            "offset must be at most {MAX_HISTORY_OFFSET}, got {offset}"
        )));
    }
    Ok(offset)
}

// =============================================================================
// Steps staged inside an atomic unit
// =============================================================================

/// Read the cell for update and price its next purchase.
fn resolve_price(
    txn: &mut dyn LedgerTxn,
    pricing: &PriceEngine,
    index: CellIndex,
) -> Result<PricedCell> {
    let purchase_count = txn
        .cell_for_update(index)?
        .map_or(0, |cell| cell.purchase_count);

    let price_cents = pricing
        .price(purchase_count)
        .ok_or(LedgerError::PriceCapReached {
            index,
            purchase_count,
        })?;

    Ok(PricedCell {
        index,
        purchase_count,
        price_cents,
    })
}

/// Take `amount_cents` from the wallet. Returns the new balance.
fn debit(txn: &mut dyn LedgerTxn, account: &mut Account, amount_cents: i64) -> Result<i64> {
    let balance = account.debit(amount_cents)?;
    txn.put_account(account)?;
    Ok(balance)
}

/// Write the cell after a purchase. Returns the new purchase count.
fn apply_purchase(
    txn: &mut dyn LedgerTxn,
    priced: &PricedCell,
    purchase: &ValidatedPurchase,
    now: DateTime<Utc>,
) -> Result<u32> {
    let purchase_count = priced.purchase_count + 1;
    txn.put_cell(&Cell {
        index: priced.index,
        color: purchase.color,
        intensity: purchase.intensity,
        purchase_count,
        owner: purchase.account_id,
        updated_at: now,
    })?;
    Ok(purchase_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RocksStore, StoreError};
    use pixel_ledger_core::{Color, WindowRange, MAX_PURCHASE_COUNT};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn create_test_ledger() -> (Ledger<RocksStore>, TempDir) {
        create_ledger_with(PriceEngine::default(), RetryPolicy::default())
    }

    fn create_ledger_with(
        pricing: PriceEngine,
        retry: RetryPolicy,
    ) -> (Ledger<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (
            Ledger::new(store, GridConfig::default(), pricing, retry),
            dir,
        )
    }

    fn buy(account_id: AccountId, cell_index: i64, color: &str, intensity: i64) -> PurchaseRequest {
        PurchaseRequest {
            account_id: Some(account_id),
            cell_index,
            color: color.into(),
            intensity: Some(intensity),
        }
    }

    fn funded(ledger: &Ledger<RocksStore>, amount_cents: i64) -> AccountId {
        let account_id = AccountId::generate();
        ledger
            .credit(&account_id, amount_cents, &format!("seed-{account_id}"), TopUpSource::Admin)
            .unwrap();
        account_id
    }

    #[test]
    fn first_and_second_purchase_of_a_cell() {
        let (ledger, _dir) = create_test_ledger();
        let alice = funded(&ledger, 100);

        let first = ledger.purchase(&buy(alice, 42, "#ff0000", 10)).unwrap();
        assert_eq!(first.price_cents_charged, 1);
        assert_eq!(first.purchase_count_after, 1);
        assert_eq!(first.balance_after_cents, 99);
        assert_eq!(ledger.balance(&alice).unwrap(), 99);

        let second = ledger.purchase(&buy(alice, 42, "#ff0000", 10)).unwrap();
        assert_eq!(second.price_cents_charged, 2);
        assert_eq!(second.purchase_count_after, 2);
        assert_eq!(ledger.balance(&alice).unwrap(), 97);

        let window = ledger.window(0, 100).unwrap();
        assert_eq!(
            serde_json::to_value(&window).unwrap(),
            serde_json::json!({"42": ["#ff0000", 10, 2]})
        );
    }

    #[test]
    fn empty_wallet_is_rejected_without_effect() {
        let (ledger, _dir) = create_test_ledger();
        let broke = AccountId::generate();

        let err = ledger.purchase(&buy(broke, 42, "#ff0000", 10)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 0,
                required: 1
            }
        ));

        assert!(ledger.window(0, 100).unwrap().is_empty());
        assert_eq!(ledger.balance(&broke).unwrap(), 0);
        assert!(ledger.store().get_account(&broke).unwrap().is_none());
        assert!(ledger.purchases_by_cell(42, None, 0).unwrap().is_empty());
    }

    #[test]
    fn price_doubles_with_every_purchase() {
        let (ledger, _dir) = create_test_ledger();
        let alice = funded(&ledger, 10_000);

        for i in 1..=10_u32 {
            let receipt = ledger.purchase(&buy(alice, 7, "#00ff00", 0)).unwrap();
            assert_eq!(receipt.price_cents_charged, 1_i64 << (i - 1));
            assert_eq!(receipt.purchase_count_after, i);
        }
        assert_eq!(ledger.balance(&alice).unwrap(), 10_000 - 1023);
    }

    #[test]
    fn partial_funds_stop_at_the_unaffordable_step() {
        let (ledger, _dir) = create_test_ledger();
        let alice = funded(&ledger, 2);

        ledger.purchase(&buy(alice, 5, "#0000ff", 1)).unwrap();
        let err = ledger.purchase(&buy(alice, 5, "#ffffff", 30)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 1,
                required: 2
            }
        ));

        let cell = ledger.cell(5).unwrap();
        assert_eq!(cell.purchase_count, 1);
        assert_eq!(cell.color.to_string(), "#0000ff");
        assert_eq!(cell.next_price_cents, Some(2));
        assert_eq!(ledger.purchases_by_cell(5, None, 0).unwrap().len(), 1);
    }

    #[test]
    fn validation_runs_before_any_read() {
        let (ledger, _dir) = create_test_ledger();

        let mut anonymous = buy(AccountId::generate(), 1, "#ffffff", 0);
        anonymous.account_id = None;
        assert!(matches!(
            ledger.purchase(&anonymous),
            Err(LedgerError::AuthRequired)
        ));

        let alice = funded(&ledger, 10);
        for bad in [
            buy(alice, 1_000_000, "#ffffff", 0),
            buy(alice, -1, "#ffffff", 0),
            buy(alice, 1, "white", 0),
            buy(alice, 1, "#ffffff", 31),
        ] {
            assert!(matches!(
                ledger.purchase(&bad),
                Err(LedgerError::InvalidInput(_))
            ));
        }
        assert_eq!(ledger.balance(&alice).unwrap(), 10);
    }

    #[test]
    fn capped_cell_cannot_be_bought() {
        let (ledger, _dir) = create_test_ledger();
        let whale = funded(&ledger, 1_i64 << MAX_PURCHASE_COUNT);

        for _ in 0..MAX_PURCHASE_COUNT {
            ledger.purchase(&buy(whale, 9, "#123456", 3)).unwrap();
        }

        let err = ledger.purchase(&buy(whale, 9, "#123456", 3)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::PriceCapReached {
                purchase_count: MAX_PURCHASE_COUNT,
                ..
            }
        ));
        assert_eq!(ledger.balance(&whale).unwrap(), 1);
        assert_eq!(ledger.cell(9).unwrap().next_price_cents, None);
    }

    #[test]
    fn concurrent_buyers_of_one_cell_serialize() {
        let (ledger, _dir) =
            create_ledger_with(PriceEngine::default(), RetryPolicy::with_max_attempts(1_000));
        let alice = funded(&ledger, 15);

        let outcomes: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| ledger.purchase(&buy(alice, 42, "#ff0000", 10))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let committed = outcomes.iter().filter(|o| o.is_ok()).count();
        let starved = outcomes
            .iter()
            .filter(|o| matches!(o, Err(LedgerError::InsufficientFunds { .. })))
            .count();
        assert_eq!(committed, 4);
        assert_eq!(starved, 4);

        let mut charged: Vec<i64> = outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok())
            .map(|r| r.price_cents_charged)
            .collect();
        charged.sort_unstable();
        assert_eq!(charged, vec![1, 2, 4, 8]);
        assert_eq!(ledger.balance(&alice).unwrap(), 0);
        assert_eq!(ledger.cell(42).unwrap().purchase_count, 4);
    }

    #[test]
    fn disjoint_purchases_all_commit() {
        let (ledger, _dir) = create_test_ledger();
        let buyers: Vec<_> = (0..8).map(|_| funded(&ledger, 1)).collect();

        thread::scope(|scope| {
            for (i, buyer) in buyers.iter().enumerate() {
                let ledger = &ledger;
                scope.spawn(move || {
                    let cell = i64::try_from(i).unwrap() * 1_000;
                    ledger.purchase(&buy(*buyer, cell, "#abcdef", 2)).unwrap();
                });
            }
        });

        let window = ledger.window(0, 8_000).unwrap();
        assert_eq!(window.len(), 8);
        for buyer in &buyers {
            assert_eq!(ledger.balance(buyer).unwrap(), 0);
            assert_eq!(ledger.purchases_by_account(buyer, None, 0).unwrap().len(), 1);
        }
    }

    #[test]
    fn credit_is_idempotent_per_reference() {
        let (ledger, _dir) = create_test_ledger();
        let alice = AccountId::generate();

        let first = ledger
            .credit(&alice, 500, "cs_test_1", TopUpSource::Stripe)
            .unwrap();
        assert!(!first.already_applied);
        assert_eq!(first.top_up.balance_after_cents, 500);

        let replay = ledger
            .credit(&alice, 500, "cs_test_1", TopUpSource::Stripe)
            .unwrap();
        assert!(replay.already_applied);
        assert_eq!(replay.top_up, first.top_up);
        assert_eq!(ledger.balance(&alice).unwrap(), 500);

        ledger
            .credit(&alice, 250, "cs_test_2", TopUpSource::Stripe)
            .unwrap();
        let account = ledger.account(&alice).unwrap();
        assert_eq!(account.balance_cents, 750);
        assert_eq!(account.lifetime_credited_cents, 750);
    }

    #[test]
    fn credit_rejects_bad_arguments() {
        let (ledger, _dir) = create_test_ledger();
        let alice = AccountId::generate();

        assert!(matches!(
            ledger.credit(&alice, 0, "ref", TopUpSource::Admin),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.credit(&alice, 10, "  ", TopUpSource::Admin),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(ledger.store().get_account(&alice).unwrap().is_none());
    }

    #[test]
    fn window_bounds_and_repeatability() {
        let (ledger, _dir) = create_test_ledger();
        let alice = funded(&ledger, 100);
        ledger.purchase(&buy(alice, 19_999, "#010203", 4)).unwrap();

        assert!(matches!(ledger.window(0, 20_001), Err(LedgerError::InvalidRange(_))));
        assert!(matches!(ledger.window(5, 3), Err(LedgerError::InvalidRange(_))));
        assert!(matches!(ledger.window(-1, 3), Err(LedgerError::InvalidRange(_))));
        assert!(matches!(
            ledger.window(999_999, 1_000_001),
            Err(LedgerError::InvalidRange(_))
        ));

        let first = ledger.window(0, 20_000).unwrap();
        let second = ledger.window(0, 20_000).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert!(ledger.window(0, 19_999).unwrap().is_empty());
    }

    #[test]
    fn unpurchased_cell_reads_as_default() {
        let (ledger, _dir) = create_test_ledger();
        let cell = ledger.cell(123).unwrap();

        assert_eq!(cell.purchase_count, 0);
        assert_eq!(cell.color, Color::DEFAULT);
        assert_eq!(cell.owner, None);
        assert_eq!(cell.next_price_cents, Some(1));
        assert!(matches!(ledger.cell(1_000_000), Err(LedgerError::InvalidInput(_))));
    }

    #[test]
    fn histories_are_newest_first_and_clamped() {
        let (ledger, _dir) = create_test_ledger();
        let alice = funded(&ledger, 1_000);
        let bob = funded(&ledger, 1_000);

        ledger.purchase(&buy(alice, 3, "#000001", 0)).unwrap();
        ledger.purchase(&buy(bob, 3, "#000002", 0)).unwrap();
        ledger.purchase(&buy(alice, 3, "#000003", 0)).unwrap();

        let history = ledger.purchases_by_cell(3, None, 0).unwrap();
        let colors: Vec<String> = history.iter().map(|r| r.color.to_string()).collect();
        assert_eq!(colors, vec!["#000003", "#000002", "#000001"]);
        assert_eq!(history[0].balance_after_cents, 1_000 - 1 - 4);

        assert_eq!(ledger.purchases_by_account(&alice, None, 0).unwrap().len(), 2);
        assert_eq!(ledger.purchases_by_account(&alice, Some(1), 1).unwrap().len(), 1);
        assert_eq!(history_limit(Some(10_000)), MAX_HISTORY_LIMIT);
        assert_eq!(history_limit(None), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn account_history_keeps_order_within_a_millisecond() {
        let (ledger, _dir) = create_test_ledger();
        let alice = funded(&ledger, 1_000);

        for cell in 0..40 {
            ledger.purchase(&buy(alice, cell, "#123456", 1)).unwrap();
        }

        let cells: Vec<u32> = ledger
            .purchases_by_account(&alice, None, 0)
            .unwrap()
            .iter()
            .map(|r| r.cell_index.get())
            .collect();
        assert_eq!(cells, (0..40).rev().collect::<Vec<u32>>());

        let page = ledger.purchases_by_account(&alice, Some(5), 30).unwrap();
        let cells: Vec<u32> = page.iter().map(|r| r.cell_index.get()).collect();
        assert_eq!(cells, vec![9, 8, 7, 6, 5]);
    }

    #[test]
    fn history_offset_is_bounded() {
        let (ledger, _dir) = create_test_ledger();
        let alice = funded(&ledger, 10);
        ledger.purchase(&buy(alice, 1, "#010203", 0)).unwrap();

        assert!(ledger
            .purchases_by_account(&alice, None, MAX_HISTORY_OFFSET)
            .unwrap()
            .is_empty());
        assert!(matches!(
            ledger.purchases_by_account(&alice, None, MAX_HISTORY_OFFSET + 1),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.purchases_by_cell(1, None, usize::MAX),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn concurrent_credits_with_one_reference_apply_once() {
        let (ledger, _dir) =
            create_ledger_with(PriceEngine::default(), RetryPolicy::with_max_attempts(1_000));
        let alice = AccountId::generate();
        let barrier = Barrier::new(8);

        let receipts: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        ledger.credit(&alice, 250, "cs_race", TopUpSource::Stripe)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
        });

        let fresh = receipts.iter().filter(|r| !r.already_applied).count();
        assert_eq!(fresh, 1);
        assert!(receipts.iter().all(|r| r.top_up.balance_after_cents == 250));

        let account = ledger.account(&alice).unwrap();
        assert_eq!(account.balance_cents, 250);
        assert_eq!(account.lifetime_credited_cents, 250);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1));
        assert_eq!(policy.backoff(2), Duration::from_millis(2));
        assert_eq!(policy.backoff(6), Duration::from_millis(32));
        assert_eq!(policy.backoff(7), Duration::from_millis(50));
        assert_eq!(policy.backoff(64), Duration::from_millis(50));
    }

    /// A store whose every atomic unit loses its commit race.
    #[derive(Default)]
    struct AlwaysConflicting {
        attempts: AtomicU32,
    }

    impl Store for AlwaysConflicting {
        fn get_cell(&self, _: CellIndex) -> crate::Result<Option<Cell>> {
            Ok(None)
        }

        fn cells_in_range(&self, _: &WindowRange) -> crate::Result<Vec<Cell>> {
            Ok(Vec::new())
        }

        fn get_account(&self, _: &AccountId) -> crate::Result<Option<Account>> {
            Ok(None)
        }

        fn get_top_up(&self, _: &str) -> crate::Result<Option<TopUp>> {
            Ok(None)
        }

        fn get_purchase(&self, _: &PurchaseId) -> crate::Result<Option<PurchaseRecord>> {
            Ok(None)
        }

        fn list_purchases_by_account(
            &self,
            _: &AccountId,
            _: usize,
            _: usize,
        ) -> crate::Result<Vec<PurchaseRecord>> {
            Ok(Vec::new())
        }

        fn list_purchases_by_cell(
            &self,
            _: CellIndex,
            _: usize,
            _: usize,
        ) -> crate::Result<Vec<PurchaseRecord>> {
            Ok(Vec::new())
        }

        fn atomically<T, E, F>(&self, _unit: F) -> std::result::Result<T, E>
        where
            F: FnOnce(&mut dyn LedgerTxn) -> std::result::Result<T, E>,
            E: From<StoreError>,
        {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict.into())
        }
    }

    #[test]
    fn persistent_conflicts_exhaust_retries() {
        let retry = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        };
        let ledger = Ledger::new(
            AlwaysConflicting::default(),
            GridConfig::default(),
            PriceEngine::default(),
            retry,
        );

        let err = ledger
            .purchase(&buy(AccountId::generate(), 1, "#ffffff", 0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RetriesExhausted { attempts: 3 }));
        assert_eq!(ledger.store().attempts.load(Ordering::SeqCst), 3);
    }
}
