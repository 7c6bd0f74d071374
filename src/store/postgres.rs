//! PostgreSQL store.
//!
//! All state updates are atomic CAS operations: conditional UPDATEs guarded
//! on the current status column, reporting `rows_affected() > 0`. Invariant
//! checks on insert (one live offer per buyer per listing, one open
//! transaction per listing) run as guarded INSERT .. SELECT so concurrent
//! writers cannot both land. Webhook idempotency rides on the event-id
//! primary key with ON CONFLICT DO NOTHING.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{MarketStats, MarketStore};
use crate::account::UserProfile;
use crate::api_auth::ApiKeyRecord;
use crate::core_types::{DisputeId, ListingId, OfferId, PaymentId, TransactionId, UserId};
use crate::dispute::{Dispute, DisputeStatus, Resolution};
use crate::error::CoreError;
use crate::escrow::{
    Payment, PaymentAdjustment, PaymentStatus, Transaction, TransactionStatus,
};
use crate::fraud::RiskLevel;
use crate::listing::{Listing, ListingStatus};
use crate::offer::{Offer, OfferParty, OfferStatus};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply schema migrations from `migrations/`.
    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::store(e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_listing(row: &PgRow) -> Result<Listing, CoreError> {
        let status_id: i16 = row.try_get("status")?;
        let reserved_by: Option<String> = row.try_get("reserved_by")?;
        Ok(Listing {
            id: ListingId::from(row.try_get::<uuid::Uuid, _>("id")?),
            slug: row.try_get("slug")?,
            seller_id: row.try_get::<i64, _>("seller_id")? as UserId,
            category: row.try_get("category")?,
            original_price: row.try_get("original_price")?,
            asking_price: row.try_get("asking_price")?,
            status: ListingStatus::from_id(status_id)
                .ok_or_else(|| CoreError::store(format!("bad listing status id {status_id}")))?,
            reserved_by: reserved_by.map(|s| parse_txn_id(&s)).transpose()?,
            event_date: row.try_get("event_date")?,
            published_at: row.try_get("published_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_offer(row: &PgRow) -> Result<Offer, CoreError> {
        let status_id: i16 = row.try_get("status")?;
        let party_id: i16 = row.try_get("proposed_by")?;
        Ok(Offer {
            id: OfferId::from(row.try_get::<uuid::Uuid, _>("id")?),
            listing_id: ListingId::from(row.try_get::<uuid::Uuid, _>("listing_id")?),
            buyer_id: row.try_get::<i64, _>("buyer_id")? as UserId,
            seller_id: row.try_get::<i64, _>("seller_id")? as UserId,
            amount: row.try_get("amount")?,
            message: row.try_get("message")?,
            proposed_by: OfferParty::from_id(party_id)
                .ok_or_else(|| CoreError::store(format!("bad offer party id {party_id}")))?,
            status: OfferStatus::from_id(status_id)
                .ok_or_else(|| CoreError::store(format!("bad offer status id {status_id}")))?,
            parent_offer_id: row
                .try_get::<Option<uuid::Uuid>, _>("parent_offer_id")?
                .map(OfferId::from),
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn row_to_transaction(row: &PgRow) -> Result<Transaction, CoreError> {
        let status_id: i16 = row.try_get("status")?;
        let level: String = row.try_get("fraud_level")?;
        Ok(Transaction {
            id: parse_txn_id(row.try_get::<String, _>("id")?.as_str())?,
            code: row.try_get("code")?,
            listing_id: ListingId::from(row.try_get::<uuid::Uuid, _>("listing_id")?),
            offer_id: OfferId::from(row.try_get::<uuid::Uuid, _>("offer_id")?),
            buyer_id: row.try_get::<i64, _>("buyer_id")? as UserId,
            seller_id: row.try_get::<i64, _>("seller_id")? as UserId,
            amount: row.try_get("amount")?,
            fee: row.try_get("fee")?,
            status: TransactionStatus::from_id(status_id).ok_or_else(|| {
                CoreError::store(format!("bad transaction status id {status_id}"))
            })?,
            fraud_score: row.try_get("fraud_score")?,
            fraud_level: parse_risk_level(&level)?,
            flagged_for_review: row.try_get("flagged_for_review")?,
            payment_deadline: row.try_get("payment_deadline")?,
            transfer_deadline: row.try_get("transfer_deadline")?,
            refunded_at: row.try_get("refunded_at")?,
            refunded_by: row
                .try_get::<Option<i64>, _>("refunded_by")?
                .map(|v| v as UserId),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_payment(row: &PgRow) -> Result<Payment, CoreError> {
        let status_id: i16 = row.try_get("status")?;
        Ok(Payment {
            id: PaymentId::from(row.try_get::<uuid::Uuid, _>("id")?),
            transaction_id: parse_txn_id(row.try_get::<String, _>("transaction_id")?.as_str())?,
            payer_id: row.try_get::<i64, _>("payer_id")? as UserId,
            payee_id: row.try_get::<i64, _>("payee_id")? as UserId,
            gross_amount: row.try_get("gross_amount")?,
            net_amount: row.try_get("net_amount")?,
            status: PaymentStatus::from_id(status_id)
                .ok_or_else(|| CoreError::store(format!("bad payment status id {status_id}")))?,
            charge_ref: row.try_get("charge_ref")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_dispute(row: &PgRow) -> Result<Dispute, CoreError> {
        let status_id: i16 = row.try_get("status")?;
        let resolution: Option<String> = row.try_get("resolution")?;
        Ok(Dispute {
            id: DisputeId::from(row.try_get::<uuid::Uuid, _>("id")?),
            transaction_id: parse_txn_id(row.try_get::<String, _>("transaction_id")?.as_str())?,
            raised_by: row.try_get::<i64, _>("raised_by")? as UserId,
            reason: row.try_get("reason")?,
            status: DisputeStatus::from_id(status_id)
                .ok_or_else(|| CoreError::store(format!("bad dispute status id {status_id}")))?,
            resolution: resolution.map(|s| parse_resolution(&s)).transpose()?,
            resolved_by: row
                .try_get::<Option<i64>, _>("resolved_by")?
                .map(|v| v as UserId),
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }

    fn row_to_profile(row: &PgRow) -> Result<UserProfile, CoreError> {
        Ok(UserProfile {
            user_id: row.try_get::<i64, _>("user_id")? as UserId,
            created_at: row.try_get("created_at")?,
            email_verified: row.try_get("email_verified")?,
            phone_verified: row.try_get("phone_verified")?,
            kyc_verified: row.try_get("kyc_verified")?,
            completed_transactions: row.try_get::<i32, _>("completed_transactions")? as u32,
            disputes: row.try_get::<i32, _>("disputes")? as u32,
            confirmed_fraud_disputes: row.try_get::<i32, _>("confirmed_fraud_disputes")? as u32,
            new_device: row.try_get("new_device")?,
            geo_mismatch: row.try_get("geo_mismatch")?,
        })
    }

    fn row_to_api_key(row: &PgRow) -> Result<ApiKeyRecord, CoreError> {
        Ok(ApiKeyRecord {
            key: row.try_get("key")?,
            partner_name: row.try_get("partner_name")?,
            scopes: row.try_get("scopes")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn parse_txn_id(s: &str) -> Result<TransactionId, CoreError> {
    s.parse()
        .map_err(|_| CoreError::store(format!("bad transaction id {s}")))
}

fn parse_risk_level(s: &str) -> Result<RiskLevel, CoreError> {
    match s {
        "LOW" => Ok(RiskLevel::Low),
        "MEDIUM" => Ok(RiskLevel::Medium),
        "HIGH" => Ok(RiskLevel::High),
        "CRITICAL" => Ok(RiskLevel::Critical),
        _ => Err(CoreError::store(format!("bad risk level {s}"))),
    }
}

fn parse_resolution(s: &str) -> Result<Resolution, CoreError> {
    match s {
        "REFUND" => Ok(Resolution::Refund),
        "RELEASE" => Ok(Resolution::Release),
        "PARTIAL" => Ok(Resolution::Partial),
        _ => Err(CoreError::store(format!("bad resolution {s}"))),
    }
}

#[async_trait]
impl MarketStore for PgStore {
    async fn insert_listing(&self, listing: &Listing) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO listings_tb
                (id, slug, seller_id, category, original_price, asking_price,
                 status, reserved_by, event_date, published_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(listing.id.inner())
        .bind(&listing.slug)
        .bind(listing.seller_id as i64)
        .bind(&listing.category)
        .bind(listing.original_price)
        .bind(listing.asking_price)
        .bind(listing.status.id())
        .bind(listing.reserved_by.map(|t| t.to_string()))
        .bind(listing.event_date)
        .bind(listing.published_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, CoreError> {
        let row = sqlx::query("SELECT * FROM listings_tb WHERE id = $1")
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_listing(&r)).transpose()
    }

    async fn list_listings(
        &self,
        status: Option<ListingStatus>,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Listing>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM listings_tb
            WHERE ($1::smallint IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
            ORDER BY published_at DESC
            LIMIT $3
            "#,
        )
        .bind(status.map(|s| s.id()))
        .bind(category)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_listing).collect()
    }

    async fn update_listing_status_if(
        &self,
        id: ListingId,
        expected: ListingStatus,
        new: ListingStatus,
        holder: Option<TransactionId>,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE listings_tb
            SET status = $1, reserved_by = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(new.id())
        .bind(holder.map(|t| t.to_string()))
        .bind(id.inner())
        .bind(expected.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_listing_if_held(
        &self,
        id: ListingId,
        holder: TransactionId,
        to: ListingStatus,
    ) -> Result<bool, CoreError> {
        let clear = to == ListingStatus::Active;
        let result = sqlx::query(
            r#"
            UPDATE listings_tb
            SET status = $1,
                reserved_by = CASE WHEN $2 THEN NULL ELSE reserved_by END,
                updated_at = NOW()
            WHERE id = $3 AND status = $4 AND reserved_by = $5
            "#,
        )
        .bind(to.id())
        .bind(clear)
        .bind(id.inner())
        .bind(ListingStatus::Reserved.id())
        .bind(holder.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_offer(&self, offer: &Offer) -> Result<(), CoreError> {
        // Guarded insert: lands only if the buyer has no live offer on this
        // listing, atomically.
        let result = sqlx::query(
            r#"
            INSERT INTO offers_tb
                (id, listing_id, buyer_id, seller_id, amount, message,
                 proposed_by, status, parent_offer_id, created_at, expires_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
            WHERE NOT EXISTS (
                SELECT 1 FROM offers_tb
                WHERE listing_id = $2 AND buyer_id = $3 AND status = $12
            )
            "#,
        )
        .bind(offer.id.inner())
        .bind(offer.listing_id.inner())
        .bind(offer.buyer_id as i64)
        .bind(offer.seller_id as i64)
        .bind(offer.amount)
        .bind(&offer.message)
        .bind(offer.proposed_by.id())
        .bind(offer.status.id())
        .bind(offer.parent_offer_id.map(|o| o.inner()))
        .bind(offer.created_at)
        .bind(offer.expires_at)
        .bind(OfferStatus::Pending.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::conflict(
                "buyer already has a live offer on this listing",
            ));
        }
        Ok(())
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, CoreError> {
        let row = sqlx::query("SELECT * FROM offers_tb WHERE id = $1")
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_offer(&r)).transpose()
    }

    async fn find_live_offer(
        &self,
        listing_id: ListingId,
        buyer_id: UserId,
    ) -> Result<Option<Offer>, CoreError> {
        let row = sqlx::query(
            "SELECT * FROM offers_tb WHERE listing_id = $1 AND buyer_id = $2 AND status = $3",
        )
        .bind(listing_id.inner())
        .bind(buyer_id as i64)
        .bind(OfferStatus::Pending.id())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::row_to_offer(&r)).transpose()
    }

    async fn update_offer_status_if(
        &self,
        id: OfferId,
        expected: OfferStatus,
        new: OfferStatus,
    ) -> Result<bool, CoreError> {
        let result =
            sqlx::query("UPDATE offers_tb SET status = $1 WHERE id = $2 AND status = $3")
                .bind(new.id())
                .bind(id.inner())
                .bind(expected.id())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_expired_pending_offers(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Offer>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM offers_tb WHERE status = $1 AND expires_at <= $2 LIMIT $3",
        )
        .bind(OfferStatus::Pending.id())
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_offer).collect()
    }

    async fn list_offers_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Offer>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM offers_tb
            WHERE buyer_id = $1 OR seller_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_offer).collect()
    }

    async fn count_recent_offers(
        &self,
        buyer_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, CoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM offers_tb WHERE buyer_id = $1 AND created_at >= $2",
        )
        .bind(buyer_id as i64)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    async fn insert_transaction(&self, txn: &Transaction) -> Result<(), CoreError> {
        let terminal: Vec<i16> = [
            TransactionStatus::Completed,
            TransactionStatus::Refunded,
            TransactionStatus::Cancelled,
        ]
        .iter()
        .map(|s| s.id())
        .collect();

        let result = sqlx::query(
            r#"
            INSERT INTO transactions_tb
                (id, code, listing_id, offer_id, buyer_id, seller_id, amount,
                 fee, status, fraud_score, fraud_level, flagged_for_review,
                 payment_deadline, transfer_deadline, refunded_at, refunded_by,
                 created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                   $13, $14, $15, $16, $17, $18
            WHERE NOT EXISTS (
                SELECT 1 FROM transactions_tb
                WHERE listing_id = $3 AND status != ALL($19)
            )
            "#,
        )
        .bind(txn.id.to_string())
        .bind(&txn.code)
        .bind(txn.listing_id.inner())
        .bind(txn.offer_id.inner())
        .bind(txn.buyer_id as i64)
        .bind(txn.seller_id as i64)
        .bind(txn.amount)
        .bind(txn.fee)
        .bind(txn.status.id())
        .bind(txn.fraud_score)
        .bind(txn.fraud_level.as_str())
        .bind(txn.flagged_for_review)
        .bind(txn.payment_deadline)
        .bind(txn.transfer_deadline)
        .bind(txn.refunded_at)
        .bind(txn.refunded_by.map(|v| v as i64))
        .bind(txn.created_at)
        .bind(txn.updated_at)
        .bind(&terminal)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::conflict(
                "listing already has an open transaction",
            ));
        }
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, CoreError> {
        let row = sqlx::query("SELECT * FROM transactions_tb WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_transaction(&r)).transpose()
    }

    async fn find_open_transaction_for_listing(
        &self,
        listing_id: ListingId,
    ) -> Result<Option<Transaction>, CoreError> {
        let terminal: Vec<i16> = [
            TransactionStatus::Completed,
            TransactionStatus::Refunded,
            TransactionStatus::Cancelled,
        ]
        .iter()
        .map(|s| s.id())
        .collect();
        let row = sqlx::query(
            "SELECT * FROM transactions_tb WHERE listing_id = $1 AND status != ALL($2)",
        )
        .bind(listing_id.inner())
        .bind(&terminal)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::row_to_transaction(&r)).transpose()
    }

    async fn update_transaction_status_if(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        new: TransactionStatus,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions_tb
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(new.id())
        .bind(id.to_string())
        .bind(expected.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin_transfer_if(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        deadline: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions_tb
            SET status = $1, transfer_deadline = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(TransactionStatus::Transferring.id())
        .bind(deadline)
        .bind(id.to_string())
        .bind(expected.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn force_terminal_if_open(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        admin_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let terminal: Vec<i16> = [
            TransactionStatus::Completed,
            TransactionStatus::Refunded,
            TransactionStatus::Cancelled,
        ]
        .iter()
        .map(|s| s.id())
        .collect();
        let result = sqlx::query(
            r#"
            UPDATE transactions_tb
            SET status = $1, refunded_at = $2, refunded_by = $3, updated_at = $2
            WHERE id = $4 AND status != ALL($5)
            "#,
        )
        .bind(target.id())
        .bind(at)
        .bind(admin_id as i64)
        .bind(id.to_string())
        .bind(&terminal)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_expired_awaiting_payment(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions_tb WHERE status = $1 AND payment_deadline <= $2 LIMIT $3",
        )
        .bind(TransactionStatus::AwaitingPayment.id())
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn find_overdue_transferring(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions_tb WHERE status = $1 AND transfer_deadline <= $2 LIMIT $3",
        )
        .bind(TransactionStatus::Transferring.id())
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn count_recent_transactions(
        &self,
        buyer_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, CoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions_tb WHERE buyer_id = $1 AND created_at >= $2",
        )
        .bind(buyer_id as i64)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments_tb
                (id, transaction_id, payer_id, payee_id, gross_amount,
                 net_amount, status, charge_ref, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id.inner())
        .bind(payment.transaction_id.to_string())
        .bind(payment.payer_id as i64)
        .bind(payment.payee_id as i64)
        .bind(payment.gross_amount)
        .bind(payment.net_amount)
        .bind(payment.status.id())
        .bind(&payment.charge_ref)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_payment_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Payment>, CoreError> {
        let row = sqlx::query("SELECT * FROM payments_tb WHERE transaction_id = $1")
            .bind(transaction_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_payment(&r)).transpose()
    }

    async fn update_payment_status(
        &self,
        transaction_id: TransactionId,
        status: PaymentStatus,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE payments_tb SET status = $1, updated_at = NOW() WHERE transaction_id = $2",
        )
        .bind(status.id())
        .bind(transaction_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_payment_adjustment(
        &self,
        adjustment: &PaymentAdjustment,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO payment_adjustments_tb
                (payment_id, transaction_id, beneficiary, amount, kind, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(adjustment.payment_id.inner())
        .bind(adjustment.transaction_id.to_string())
        .bind(adjustment.beneficiary as i64)
        .bind(adjustment.amount)
        .bind(adjustment.kind.as_str())
        .bind(adjustment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_dispute(&self, dispute: &Dispute) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO disputes_tb
                (id, transaction_id, raised_by, reason, status, resolution,
                 resolved_by, notes, created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(dispute.id.inner())
        .bind(dispute.transaction_id.to_string())
        .bind(dispute.raised_by as i64)
        .bind(&dispute.reason)
        .bind(dispute.status.id())
        .bind(dispute.resolution.map(|r| r.as_str()))
        .bind(dispute.resolved_by.map(|v| v as i64))
        .bind(&dispute.notes)
        .bind(dispute.created_at)
        .bind(dispute.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_dispute(&self, id: DisputeId) -> Result<Option<Dispute>, CoreError> {
        let row = sqlx::query("SELECT * FROM disputes_tb WHERE id = $1")
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_dispute(&r)).transpose()
    }

    async fn resolve_dispute_if_open(
        &self,
        id: DisputeId,
        resolution: Resolution,
        resolved_by: UserId,
        notes: Option<String>,
    ) -> Result<Option<Dispute>, CoreError> {
        let row = sqlx::query(
            r#"
            UPDATE disputes_tb
            SET status = $1, resolution = $2, resolved_by = $3, notes = $4,
                resolved_at = NOW()
            WHERE id = $5 AND status != $1
            RETURNING *
            "#,
        )
        .bind(DisputeStatus::Resolved.id())
        .bind(resolution.as_str())
        .bind(resolved_by as i64)
        .bind(notes)
        .bind(id.inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::row_to_dispute(&r)).transpose()
    }

    async fn webhook_event_seen(&self, event_id: &str) -> Result<bool, CoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM webhook_events_tb WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn record_webhook_event(&self, event_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events_tb (event_id, received_at)
            VALUES ($1, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, CoreError> {
        let row = sqlx::query("SELECT * FROM user_profiles_tb WHERE user_id = $1")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_profile(&r)).transpose()
    }

    async fn upsert_user_profile(&self, profile: &UserProfile) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles_tb
                (user_id, created_at, email_verified, phone_verified,
                 kyc_verified, completed_transactions, disputes,
                 confirmed_fraud_disputes, new_device, geo_mismatch)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                email_verified = EXCLUDED.email_verified,
                phone_verified = EXCLUDED.phone_verified,
                kyc_verified = EXCLUDED.kyc_verified,
                completed_transactions = EXCLUDED.completed_transactions,
                disputes = EXCLUDED.disputes,
                confirmed_fraud_disputes = EXCLUDED.confirmed_fraud_disputes,
                new_device = EXCLUDED.new_device,
                geo_mismatch = EXCLUDED.geo_mismatch
            "#,
        )
        .bind(profile.user_id as i64)
        .bind(profile.created_at)
        .bind(profile.email_verified)
        .bind(profile.phone_verified)
        .bind(profile.kyc_verified)
        .bind(profile.completed_transactions as i32)
        .bind(profile.disputes as i32)
        .bind(profile.confirmed_fraud_disputes as i32)
        .bind(profile.new_device)
        .bind(profile.geo_mismatch)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, CoreError> {
        let row = sqlx::query("SELECT * FROM api_keys_tb WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_api_key(&r)).transpose()
    }

    async fn insert_api_key(&self, record: &ApiKeyRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys_tb (key, partner_name, scopes, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.key)
        .bind(&record.partner_name)
        .bind(record.scopes)
        .bind(record.status)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn marketplace_stats(&self) -> Result<MarketStats, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM listings_tb) AS listings_total,
                (SELECT COUNT(*) FROM listings_tb WHERE status = $1) AS listings_active,
                (SELECT COUNT(*) FROM offers_tb) AS offers_total,
                (SELECT COUNT(*) FROM transactions_tb) AS transactions_total,
                (SELECT COUNT(*) FROM transactions_tb WHERE status = $2) AS transactions_completed,
                (SELECT COUNT(*) FROM disputes_tb WHERE status != $3) AS disputes_open,
                (SELECT COALESCE(SUM(amount), 0) FROM transactions_tb WHERE status = $2)
                    AS gross_volume
            "#,
        )
        .bind(ListingStatus::Active.id())
        .bind(TransactionStatus::Completed.id())
        .bind(DisputeStatus::Resolved.id())
        .fetch_one(&self.pool)
        .await?;

        Ok(MarketStats {
            listings_total: row.try_get::<i64, _>("listings_total")? as u64,
            listings_active: row.try_get::<i64, _>("listings_active")? as u64,
            offers_total: row.try_get::<i64, _>("offers_total")? as u64,
            transactions_total: row.try_get::<i64, _>("transactions_total")? as u64,
            transactions_completed: row.try_get::<i64, _>("transactions_completed")? as u64,
            disputes_open: row.try_get::<i64, _>("disputes_open")? as u64,
            gross_volume: row.try_get::<Decimal, _>("gross_volume")?,
        })
    }
}
