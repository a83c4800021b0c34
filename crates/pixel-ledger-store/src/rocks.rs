//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait
//! on top of an optimistic-transaction database. Rows read through a
//! [`LedgerTxn`] are validated at commit time; a concurrent committed write to
//! any of them makes the commit fail with [`StoreError::Conflict`].

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, MultiThreaded,
    OptimisticTransactionDB, Options, Transaction,
};

use pixel_ledger_core::{
    Account, AccountId, Cell, CellIndex, PurchaseId, PurchaseRecord, TopUp, WindowRange,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{LedgerTxn, Store};

type Db = OptimisticTransactionDB<MultiThreaded>;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Walk an index backwards from the end of `prefix`, newest entry first,
    /// and resolve one page of entries to their purchase records.
    ///
    /// Index values hold the purchase ID. Skipped entries are never resolved.
    fn list_index_newest_first(
        &self,
        index_cf: &str,
        prefix: &[u8],
        suffix_len: usize,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        let cf = self.cf(index_cf)?;

        // Highest possible key under the prefix.
        let mut upper = prefix.to_vec();
        upper.resize(prefix.len() + suffix_len, 0xff);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, Direction::Reverse));

        let mut page = Vec::with_capacity(limit);
        for item in iter
            .take_while(|item| item.as_ref().map_or(true, |(key, _)| key.starts_with(prefix)))
            .skip(offset)
            .take(limit)
        {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let purchase_id = keys::decode_purchase_id(&value)
                .ok_or_else(|| StoreError::Database("malformed purchase index entry".into()))?;
            page.push(purchase_id);
        }

        page.iter()
            .map(|purchase_id| {
                self.get_purchase(purchase_id)?
                    .ok_or_else(|| StoreError::Dangling(purchase_id.to_string()))
            })
            .collect()
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Cell Operations
    // =========================================================================

    fn get_cell(&self, index: CellIndex) -> Result<Option<Cell>> {
        let cf = self.cf(cf::CELLS)?;

        self.db
            .get_cf(&cf, keys::cell_key(index))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn cells_in_range(&self, range: &WindowRange) -> Result<Vec<Cell>> {
        let cf = self.cf(cf::CELLS)?;
        let start = keys::cell_key(range.start());
        let end = keys::cell_key(range.end());

        // A single iterator reads from one implicit snapshot.
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start, Direction::Forward));

        let mut cells = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if key[..] >= end[..] {
                break;
            }
            cells.push(Self::deserialize(&value)?);
        }

        Ok(cells)
    }

    // =========================================================================
    // Wallet Operations
    // =========================================================================

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;

        self.db
            .get_cf(&cf, keys::account_key(account_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_top_up(&self, reference: &str) -> Result<Option<TopUp>> {
        let cf = self.cf(cf::TOP_UPS)?;

        self.db
            .get_cf(&cf, keys::top_up_key(reference))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Audit Log Operations
    // =========================================================================

    fn get_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<PurchaseRecord>> {
        let cf = self.cf(cf::PURCHASES)?;

        self.db
            .get_cf(&cf, keys::purchase_key(purchase_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_purchases_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        self.list_index_newest_first(
            cf::PURCHASES_BY_ACCOUNT,
            &keys::account_purchases_prefix(account_id),
            8,
            limit,
            offset,
        )
    }

    fn list_purchases_by_cell(
        &self,
        index: CellIndex,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        self.list_index_newest_first(
            cf::PURCHASES_BY_CELL,
            &keys::cell_purchases_prefix(index),
            4,
            limit,
            offset,
        )
    }

    // =========================================================================
    // Atomic Units
    // =========================================================================

    fn atomically<T, E, F>(&self, unit: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut txn = RocksTxn {
            store: self,
            txn: self.db.transaction(),
        };

        // Dropping an uncommitted transaction discards its writes.
        let value = unit(&mut txn as &mut dyn LedgerTxn)?;
        txn.txn.commit().map_err(StoreError::from)?;

        Ok(value)
    }
}

/// One open optimistic transaction.
struct RocksTxn<'a> {
    store: &'a RocksStore,
    txn: Transaction<'a, Db>,
}

impl RocksTxn<'_> {
    fn get_for_update<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.store.cf(cf_name)?;

        self.txn
            .get_for_update_cf(&cf, key, true)?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }

    fn put<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        let value = RocksStore::serialize(value)?;

        self.txn.put_cf(&cf, key, value)?;
        Ok(())
    }
}

impl LedgerTxn for RocksTxn<'_> {
    fn cell_for_update(&mut self, index: CellIndex) -> Result<Option<Cell>> {
        self.get_for_update(cf::CELLS, &keys::cell_key(index))
    }

    fn put_cell(&mut self, cell: &Cell) -> Result<()> {
        self.put(cf::CELLS, &keys::cell_key(cell.index), cell)
    }

    fn account_for_update(&mut self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get_for_update(cf::ACCOUNTS, &keys::account_key(account_id))
    }

    fn put_account(&mut self, account: &Account) -> Result<()> {
        self.put(cf::ACCOUNTS, &keys::account_key(&account.account_id), account)
    }

    fn top_up_for_update(&mut self, reference: &str) -> Result<Option<TopUp>> {
        self.get_for_update(cf::TOP_UPS, &keys::top_up_key(reference))
    }

    fn put_top_up(&mut self, top_up: &TopUp) -> Result<()> {
        self.put(cf::TOP_UPS, &keys::top_up_key(&top_up.reference), top_up)
    }

    fn append_purchase(&mut self, record: &PurchaseRecord, account_seq: u64) -> Result<()> {
        self.put(cf::PURCHASES, &keys::purchase_key(&record.id), record)?;

        let by_account = self.store.cf(cf::PURCHASES_BY_ACCOUNT)?;
        self.txn.put_cf(
            &by_account,
            keys::account_purchase_key(&record.account_id, account_seq),
            record.id.to_bytes(),
        )?;

        let by_cell = self.store.cf(cf::PURCHASES_BY_CELL)?;
        self.txn.put_cf(
            &by_cell,
            keys::cell_purchase_key(record.cell_index, record.purchase_count_after),
            record.id.to_bytes(),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pixel_ledger_core::{Color, GridConfig, Intensity};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn cell(index: u32, purchase_count: u32) -> Cell {
        Cell {
            index: CellIndex::new(index),
            color: Color::from_rgb(0xff, 0, 0),
            intensity: Intensity::new(5).unwrap(),
            purchase_count,
            owner: AccountId::generate(),
            updated_at: Utc::now(),
        }
    }

    fn record(account_id: AccountId, index: u32, purchase_count_after: u32) -> PurchaseRecord {
        PurchaseRecord {
            id: PurchaseId::generate(),
            account_id,
            cell_index: CellIndex::new(index),
            color: Color::from_rgb(0, 0xff, 0),
            intensity: Intensity::default(),
            price_charged_cents: 1 << (purchase_count_after - 1),
            purchase_count_after,
            balance_after_cents: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn committed_unit_is_visible() {
        let (store, _dir) = create_test_store();

        store
            .atomically(|txn| -> Result<()> {
                assert!(txn.cell_for_update(CellIndex::new(7))?.is_none());
                txn.put_cell(&cell(7, 1))
            })
            .unwrap();

        let stored = store.get_cell(CellIndex::new(7)).unwrap().unwrap();
        assert_eq!(stored.purchase_count, 1);
    }

    #[test]
    fn failed_unit_writes_nothing() {
        let (store, _dir) = create_test_store();
        let account = Account::new(AccountId::generate());

        let result = store.atomically(|txn| -> Result<()> {
            txn.put_account(&account)?;
            txn.put_cell(&cell(1, 1))?;
            Err(StoreError::Database("abort".into()))
        });

        assert!(result.is_err());
        assert!(store.get_account(&account.account_id).unwrap().is_none());
        assert!(store.get_cell(CellIndex::new(1)).unwrap().is_none());
    }

    #[test]
    fn interleaved_write_is_a_conflict() {
        let (store, _dir) = create_test_store();
        let index = CellIndex::new(3);

        let result = store.atomically(|outer| -> Result<()> {
            assert!(outer.cell_for_update(index)?.is_none());

            // Another unit commits a write to the same row first.
            store.atomically(|inner| -> Result<()> { inner.put_cell(&cell(3, 1)) })?;

            outer.put_cell(&cell(3, 1))
        });

        assert!(matches!(result, Err(StoreError::Conflict)));
        let stored = store.get_cell(index).unwrap().unwrap();
        assert_eq!(stored.purchase_count, 1);
    }

    #[test]
    fn range_scan_returns_only_purchased_cells_in_window() {
        let (store, _dir) = create_test_store();
        for index in [0, 5, 9, 10, 256, 999_999] {
            store
                .atomically(|txn| -> Result<()> { txn.put_cell(&cell(index, 1)) })
                .unwrap();
        }

        let grid = GridConfig::default();
        let cells = store.cells_in_range(&grid.window(5, 257).unwrap()).unwrap();
        let indices: Vec<u32> = cells.iter().map(|c| c.index.get()).collect();
        assert_eq!(indices, vec![5, 9, 10, 256]);

        let empty = store.cells_in_range(&grid.window(11, 200).unwrap()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn top_up_roundtrip() {
        let (store, _dir) = create_test_store();
        let top_up = TopUp {
            reference: "cs_test_123".into(),
            account_id: AccountId::generate(),
            amount_cents: 500,
            balance_after_cents: 500,
            source: pixel_ledger_core::TopUpSource::Stripe,
            created_at: Utc::now(),
        };

        store
            .atomically(|txn| -> Result<()> { txn.put_top_up(&top_up) })
            .unwrap();

        assert_eq!(store.get_top_up("cs_test_123").unwrap(), Some(top_up));
        assert!(store.get_top_up("cs_other").unwrap().is_none());
    }

    #[test]
    fn purchase_indexes_list_newest_first() {
        let (store, _dir) = create_test_store();
        let alice = AccountId::generate();
        let bob = AccountId::generate();

        // (record, account purchase sequence)
        let records = [
            (record(alice, 42, 1), 1),
            (record(bob, 42, 2), 1),
            (record(alice, 42, 3), 2),
            (record(alice, 43, 1), 3),
        ];
        for (r, seq) in &records {
            store
                .atomically(|txn| -> Result<()> { txn.append_purchase(r, *seq) })
                .unwrap();
        }
        let records: Vec<PurchaseRecord> = records.into_iter().map(|(r, _)| r).collect();

        let history = store.list_purchases_by_cell(CellIndex::new(42), 10, 0).unwrap();
        let counts: Vec<u32> = history.iter().map(|r| r.purchase_count_after).collect();
        assert_eq!(counts, vec![3, 2, 1]);

        let page = store.list_purchases_by_cell(CellIndex::new(42), 1, 1).unwrap();
        assert_eq!(page[0].purchase_count_after, 2);

        let mine = store.list_purchases_by_account(&alice, 10, 0).unwrap();
        assert_eq!(mine.len(), 3);
        assert_eq!(mine[0].id, records[3].id);
        assert_eq!(mine[2].id, records[0].id);
        assert!(mine.iter().all(|r| r.account_id == alice));

        assert_eq!(store.list_purchases_by_account(&bob, 10, 0).unwrap().len(), 1);
        assert!(store
            .list_purchases_by_cell(CellIndex::new(44), 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn paging_skips_index_entries() {
        let (store, _dir) = create_test_store();
        let alice = AccountId::generate();

        for seq in 1..=5_u32 {
            let r = record(alice, seq, 1);
            store
                .atomically(|txn| -> Result<()> { txn.append_purchase(&r, u64::from(seq)) })
                .unwrap();
        }

        let page = store.list_purchases_by_account(&alice, 2, 1).unwrap();
        let cells: Vec<u32> = page.iter().map(|r| r.cell_index.get()).collect();
        assert_eq!(cells, vec![4, 3]);

        assert!(store.list_purchases_by_account(&alice, 2, 5).unwrap().is_empty());
        assert!(store.list_purchases_by_account(&alice, 2, usize::MAX).unwrap().is_empty());
    }
}
