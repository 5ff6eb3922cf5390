//! # Billing Repository
//!
//! Database operations for transactions and the settlement ledger.
//!
//! ## The Balance Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Settlement Ledger Contract                           │
//! │                                                                         │
//! │  settlements is APPEND-ONLY: rows are never updated or deleted.        │
//! │                                                                         │
//! │  At all times, for every transaction:                                  │
//! │      SUM(settlements.amount_cents) == transactions.paid_cents          │
//! │      paid_cents ≤ amount_cents                                         │
//! │      balance_cents == amount_cents - paid_cents                        │
//! │      payment_status == derive(paid, amount)   (pure function)          │
//! │                                                                         │
//! │  HOW THE INVARIANT IS KEPT:                                            │
//! │                                                                         │
//! │  create_settlement() runs ONE write transaction:                       │
//! │    1. load transaction row            ──┐                              │
//! │    2. SUM existing settlements          │  the overpayment check       │
//! │    3. balance = amount - sum            │  reads the balance FRESH     │
//! │    4. reject if amount > balance      ──┘  inside the same tx -        │
//! │    5. INSERT settlement row                never from a cached read    │
//! │    6. rewrite paid/balance/status from the new sum                     │
//! │    7. COMMIT                                                           │
//! │                                                                         │
//! │  Two concurrent settlements on one transaction serialize on the        │
//! │  caller-held "txn:{id}" entity lock (plus the writer mutex), so        │
//! │  exactly one of two conflicting attempts can ever win.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use pila_core::validation::validate_transaction_amount;
use pila_core::{Money, PaymentMode, PaymentStatus, QueueError, Settlement, Transaction};

const TXN_COLUMNS: &str = "id, customer_id, amount_cents, paid_cents, balance_cents, \
     payment_status, revision, created_at, updated_at";

const SETTLEMENT_COLUMNS: &str =
    "id, transaction_id, amount_cents, payment_mode, cashier_id, paid_at";

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a successful settlement: the updated transaction plus the
/// full settlement history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementOutcome {
    pub transaction: Transaction,
    pub settlements: Vec<Settlement>,
}

// =============================================================================
// Billing Repository
// =============================================================================

/// Repository for transaction and settlement operations.
#[derive(Clone)]
pub struct BillingRepository {
    db: Database,
}

impl BillingRepository {
    /// Creates a new BillingRepository.
    pub fn new(db: Database) -> Self {
        BillingRepository { db }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Creates a transaction for a registered customer.
    ///
    /// The amount is fixed at creation; all later movement happens through
    /// settlements.
    pub async fn create_transaction(
        &self,
        customer_id: &str,
        amount_cents: i64,
    ) -> DbResult<Transaction> {
        let amount_cents = validate_transaction_amount(amount_cents).map_err(QueueError::from)?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut wtx = self.db.begin_write().await?;

        let customer_exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries WHERE customer_id = ?")
                .bind(customer_id)
                .fetch_one(wtx.conn())
                .await?;
        if customer_exists == 0 {
            return Err(DbError::Domain(QueueError::EntityNotFound {
                entity: "QueueEntry".to_string(),
                id: customer_id.to_string(),
            }));
        }

        let txn = Transaction {
            id: id.clone(),
            customer_id: customer_id.to_string(),
            amount_cents,
            paid_cents: 0,
            balance_cents: amount_cents,
            payment_status: PaymentStatus::Unpaid,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO transactions ( \
                id, customer_id, amount_cents, paid_cents, balance_cents, \
                payment_status, revision, created_at, updated_at \
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&txn.id)
        .bind(&txn.customer_id)
        .bind(txn.amount_cents)
        .bind(txn.paid_cents)
        .bind(txn.balance_cents)
        .bind(txn.payment_status)
        .bind(txn.revision)
        .bind(txn.created_at)
        .bind(txn.updated_at)
        .execute(wtx.conn())
        .await?;

        wtx.commit().await?;

        info!(
            transaction_id = %txn.id,
            customer_id = %customer_id,
            amount = %Money::from_cents(amount_cents),
            "Transaction created"
        );
        Ok(txn)
    }

    /// Gets a transaction by id.
    pub async fn get_transaction(&self, transaction_id: &str) -> DbResult<Option<Transaction>> {
        let sql = format!("SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?");
        let txn = sqlx::query_as::<_, Transaction>(&sql)
            .bind(transaction_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(txn)
    }

    /// Gets a transaction, failing with `TransactionNotFound` if absent.
    pub async fn require(&self, transaction_id: &str) -> DbResult<Transaction> {
        self.get_transaction(transaction_id).await?.ok_or_else(|| {
            DbError::Domain(QueueError::TransactionNotFound(transaction_id.to_string()))
        })
    }

    // =========================================================================
    // Settlements
    // =========================================================================

    /// Records a settlement against a transaction.
    ///
    /// ## Failure Modes
    /// - `InvalidAmount` - amount ≤ 0
    /// - `TransactionNotFound` - no such transaction
    /// - `Overpayment` - amount exceeds the balance computed fresh inside
    ///   this same transaction
    ///
    /// ## Concurrency
    /// Callers hold the `txn:{id}` entity lock around this call; combined
    /// with the single write transaction here, two concurrent attempts
    /// whose amounts individually fit but whose sum exceeds the balance
    /// resolve deterministically: one succeeds, the other fails.
    pub async fn create_settlement(
        &self,
        transaction_id: &str,
        amount_cents: i64,
        payment_mode: Option<PaymentMode>,
        cashier_id: &str,
    ) -> DbResult<SettlementOutcome> {
        if amount_cents <= 0 {
            return Err(DbError::Domain(QueueError::InvalidAmount { amount_cents }));
        }

        let mode = PaymentMode::from_optional(payment_mode);
        if mode == PaymentMode::Unspecified {
            // Recorded as its own bucket rather than silently defaulting to
            // cash; flagged here so data-quality dashboards can follow up
            warn!(transaction_id = %transaction_id, "Settlement recorded without a payment mode");
        }

        let now = Utc::now();
        let settlement_id = Uuid::new_v4().to_string();

        let mut wtx = self.db.begin_write().await?;

        let sql = format!("SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?");
        let txn = sqlx::query_as::<_, Transaction>(&sql)
            .bind(transaction_id)
            .fetch_optional(wtx.conn())
            .await?
            .ok_or_else(|| {
                DbError::Domain(QueueError::TransactionNotFound(transaction_id.to_string()))
            })?;

        // Fresh sum inside the transaction - the overpayment check never
        // trusts the cached paid_cents column
        let paid_so_far: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM settlements WHERE transaction_id = ?",
        )
        .bind(transaction_id)
        .fetch_one(wtx.conn())
        .await?;

        let balance = Money::from_cents(txn.amount_cents) - Money::from_cents(paid_so_far);
        if Money::from_cents(amount_cents) > balance {
            return Err(DbError::Domain(QueueError::Overpayment {
                balance_cents: balance.cents(),
                attempted_cents: amount_cents,
            }));
        }

        sqlx::query(
            "INSERT INTO settlements ( \
                id, transaction_id, amount_cents, payment_mode, cashier_id, paid_at \
             ) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&settlement_id)
        .bind(transaction_id)
        .bind(amount_cents)
        .bind(mode)
        .bind(cashier_id)
        .bind(now)
        .execute(wtx.conn())
        .await?;

        // Rewrite the aggregate columns from the new sum; payment_status is
        // always the pure derivation, never patched independently
        let new_paid = Money::from_cents(paid_so_far) + Money::from_cents(amount_cents);
        let new_balance = Money::from_cents(txn.amount_cents) - new_paid;
        let new_status = PaymentStatus::derive(new_paid, Money::from_cents(txn.amount_cents));

        sqlx::query(
            "UPDATE transactions \
             SET paid_cents = ?, balance_cents = ?, payment_status = ?, \
                 updated_at = ?, revision = revision + 1 \
             WHERE id = ?",
        )
        .bind(new_paid.cents())
        .bind(new_balance.cents())
        .bind(new_status)
        .bind(now)
        .bind(transaction_id)
        .execute(wtx.conn())
        .await?;

        let sql = format!("SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?");
        let updated = sqlx::query_as::<_, Transaction>(&sql)
            .bind(transaction_id)
            .fetch_one(wtx.conn())
            .await?;

        let history = fetch_settlements(wtx.conn(), transaction_id).await?;

        wtx.commit().await?;

        info!(
            transaction_id = %transaction_id,
            settlement_id = %settlement_id,
            amount = %Money::from_cents(amount_cents),
            mode = ?mode,
            cashier_id = %cashier_id,
            paid = %updated.paid(),
            balance = %updated.balance(),
            status = ?updated.payment_status,
            "Settlement recorded"
        );

        Ok(SettlementOutcome {
            transaction: updated,
            settlements: history,
        })
    }

    /// Lists transactions belonging to customers still in the active set.
    /// This is the `transactions` topic snapshot for (re)connecting
    /// observers.
    pub async fn list_active_transactions(&self) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT t.id, t.customer_id, t.amount_cents, t.paid_cents, t.balance_cents, \
                    t.payment_status, t.revision, t.created_at, t.updated_at \
             FROM transactions t \
             JOIN queue_entries q ON q.customer_id = t.customer_id \
             WHERE q.status IN ('waiting', 'serving', 'processing') \
             ORDER BY t.created_at",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Lists a transaction's settlements, newest first, including the
    /// cashier identity (audit trail).
    pub async fn list_settlements(&self, transaction_id: &str) -> DbResult<Vec<Settlement>> {
        // Listing for an unknown transaction is an error, not an empty list
        self.require(transaction_id).await?;

        let sql = format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements \
             WHERE transaction_id = ? ORDER BY paid_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, Settlement>(&sql)
            .bind(transaction_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_settlements(
    conn: &mut SqliteConnection,
    transaction_id: &str,
) -> DbResult<Vec<Settlement>> {
    let sql = format!(
        "SELECT {SETTLEMENT_COLUMNS} FROM settlements \
         WHERE transaction_id = ? ORDER BY paid_at DESC, rowid DESC"
    );
    Ok(sqlx::query_as::<_, Settlement>(&sql)
        .bind(transaction_id)
        .fetch_all(conn)
        .await?)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::repository::queue::RegisterCustomer;
    use chrono::NaiveDate;
    use pila_core::PriorityFlags;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn registered_customer(db: &Database) -> String {
        let entry = db
            .queue()
            .register(
                RegisterCustomer {
                    customer_name: "Ana".to_string(),
                    phone: None,
                    flags: PriorityFlags::default(),
                },
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            )
            .await
            .unwrap();
        entry.customer_id
    }

    fn domain_code(err: &DbError) -> Option<&'static str> {
        err.as_domain().map(|d| d.code())
    }

    #[tokio::test]
    async fn test_create_transaction_starts_unpaid() {
        let db = test_db().await;
        let customer = registered_customer(&db).await;

        let txn = db
            .billing()
            .create_transaction(&customer, 100_000)
            .await
            .unwrap();

        assert_eq!(txn.amount_cents, 100_000);
        assert_eq!(txn.paid_cents, 0);
        assert_eq!(txn.balance_cents, 100_000);
        assert_eq!(txn.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_create_transaction_requires_customer() {
        let db = test_db().await;
        let err = db
            .billing()
            .create_transaction("ghost", 100_000)
            .await
            .unwrap_err();
        assert_eq!(domain_code(&err), Some("ENTITY_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_split_payment_scenario() {
        // amount=1000.00: settle 400 cash → Partial, settle 600 gcash →
        // Paid, settle 1 more → Overpayment
        let db = test_db().await;
        let customer = registered_customer(&db).await;
        let billing = db.billing();
        let txn = billing.create_transaction(&customer, 100_000).await.unwrap();

        let first = billing
            .create_settlement(&txn.id, 40_000, Some(PaymentMode::Cash), "cashier-1")
            .await
            .unwrap();
        assert_eq!(first.transaction.paid_cents, 40_000);
        assert_eq!(first.transaction.balance_cents, 60_000);
        assert_eq!(first.transaction.payment_status, PaymentStatus::Partial);

        let second = billing
            .create_settlement(&txn.id, 60_000, Some(PaymentMode::Gcash), "cashier-2")
            .await
            .unwrap();
        assert_eq!(second.transaction.paid_cents, 100_000);
        assert_eq!(second.transaction.balance_cents, 0);
        assert_eq!(second.transaction.payment_status, PaymentStatus::Paid);

        let err = billing
            .create_settlement(&txn.id, 1, Some(PaymentMode::Cash), "cashier-1")
            .await
            .unwrap_err();
        assert_eq!(domain_code(&err), Some("OVERPAYMENT"));

        // History is newest first and carries the cashier audit trail
        assert_eq!(second.settlements.len(), 2);
        assert_eq!(second.settlements[0].cashier_id, "cashier-2");
        assert_eq!(second.settlements[0].payment_mode, PaymentMode::Gcash);
        assert_eq!(second.settlements[1].cashier_id, "cashier-1");
    }

    #[tokio::test]
    async fn test_settlement_sum_always_equals_paid() {
        let db = test_db().await;
        let customer = registered_customer(&db).await;
        let billing = db.billing();
        let txn = billing.create_transaction(&customer, 50_000).await.unwrap();

        for amount in [10_000, 5_000, 25_000, 10_000] {
            billing
                .create_settlement(&txn.id, amount, Some(PaymentMode::Cash), "cashier-1")
                .await
                .unwrap();

            let current = billing.require(&txn.id).await.unwrap();
            let ledger_sum: i64 = billing
                .list_settlements(&txn.id)
                .await
                .unwrap()
                .iter()
                .map(|s| s.amount_cents)
                .sum();

            assert_eq!(ledger_sum, current.paid_cents);
            assert!(current.paid_cents <= current.amount_cents);
            assert_eq!(
                current.balance_cents,
                current.amount_cents - current.paid_cents
            );
        }

        let final_txn = billing.require(&txn.id).await.unwrap();
        assert_eq!(final_txn.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_exact_balance_settlement_is_paid_not_overpayment() {
        let db = test_db().await;
        let customer = registered_customer(&db).await;
        let billing = db.billing();
        let txn = billing.create_transaction(&customer, 100_000).await.unwrap();

        let outcome = billing
            .create_settlement(&txn.id, 100_000, Some(PaymentMode::Card), "cashier-1")
            .await
            .unwrap();
        assert_eq!(outcome.transaction.payment_status, PaymentStatus::Paid);
        assert_eq!(outcome.transaction.balance_cents, 0);
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() {
        let db = test_db().await;
        let customer = registered_customer(&db).await;
        let billing = db.billing();
        let txn = billing.create_transaction(&customer, 100_000).await.unwrap();

        for bad in [0, -1, -40_000] {
            let err = billing
                .create_settlement(&txn.id, bad, Some(PaymentMode::Cash), "cashier-1")
                .await
                .unwrap_err();
            assert_eq!(domain_code(&err), Some("INVALID_AMOUNT"));
        }
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let db = test_db().await;
        let billing = db.billing();

        let err = billing
            .create_settlement("ghost-txn", 100, Some(PaymentMode::Cash), "cashier-1")
            .await
            .unwrap_err();
        assert_eq!(domain_code(&err), Some("TRANSACTION_NOT_FOUND"));

        let err = billing.list_settlements("ghost-txn").await.unwrap_err();
        assert_eq!(domain_code(&err), Some("TRANSACTION_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_missing_mode_recorded_as_unspecified() {
        let db = test_db().await;
        let customer = registered_customer(&db).await;
        let billing = db.billing();
        let txn = billing.create_transaction(&customer, 100_000).await.unwrap();

        let outcome = billing
            .create_settlement(&txn.id, 10_000, None, "cashier-1")
            .await
            .unwrap();
        assert_eq!(
            outcome.settlements[0].payment_mode,
            PaymentMode::Unspecified
        );
    }

    #[tokio::test]
    async fn test_concurrent_settlements_exactly_one_wins() {
        // Two attempts that individually fit but together exceed the
        // balance: exactly one succeeds, the other fails with Overpayment.
        let db = test_db().await;
        let customer = registered_customer(&db).await;
        let billing = db.billing();
        let txn = billing.create_transaction(&customer, 100_000).await.unwrap();

        let (a, b) = tokio::join!(
            settle_with_lock(&db, &txn.id, 70_000),
            settle_with_lock(&db, &txn.id, 70_000),
        );

        let outcomes = [a, b];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let overpays = outcomes
            .iter()
            .filter(|r| {
                matches!(
                    r.as_ref().err().and_then(|e| e.as_domain()),
                    Some(QueueError::Overpayment { .. })
                )
            })
            .count();

        assert_eq!(wins, 1, "exactly one settlement must win");
        assert_eq!(overpays, 1, "the loser must fail with Overpayment");

        let final_txn = billing.require(&txn.id).await.unwrap();
        assert_eq!(final_txn.paid_cents, 70_000);
        assert_eq!(final_txn.payment_status, PaymentStatus::Partial);
    }

    /// Mirrors the ops-layer write path: the txn entity lock is held
    /// across the settlement.
    async fn settle_with_lock(
        db: &Database,
        transaction_id: &str,
        amount_cents: i64,
    ) -> DbResult<SettlementOutcome> {
        use crate::locks::EntityLocks;
        let _guard = db
            .locks()
            .acquire(&EntityLocks::txn_key(transaction_id))
            .await?;
        db.billing()
            .create_settlement(transaction_id, amount_cents, Some(PaymentMode::Cash), "c1")
            .await
    }
}
