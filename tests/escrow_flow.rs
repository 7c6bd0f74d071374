//! End-to-end flows over the in-memory store and the mock payment gateway:
//! offer negotiation into escrow, webhook settlement, transfer confirmation,
//! dispute rulings, and admin overrides.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use seatswap::account::UserProfile;
use seatswap::admin::AdminOverrideGateway;
use seatswap::core_types::Role;
use seatswap::dispute::{DisputePolicy, DisputeResolutionWorkflow, DisputeStatus, Resolution};
use seatswap::error::CoreError;
use seatswap::escrow::{
    EscrowConfig, EscrowTransactionMachine, PaymentEvent, PaymentEventKind, PaymentStatus,
    TransactionStatus, WebhookOutcome,
};
use seatswap::listing::{Listing, ListingStatus};
use seatswap::offer::{
    NegotiationConfig, OfferAction, OfferNegotiationMachine, OfferOutcome, OfferStatus,
};
use seatswap::payment::MockGateway;
use seatswap::store::{MarketStore, MemoryStore};

const SELLER: u64 = 100;
const BUYER: u64 = 200;
const OTHER_BUYER: u64 = 300;
const ADMIN: u64 = 900;

struct World {
    store: Arc<MemoryStore>,
    gateway: Arc<MockGateway>,
    offers: OfferNegotiationMachine,
    escrow: EscrowTransactionMachine,
    disputes: DisputeResolutionWorkflow,
    admin: AdminOverrideGateway,
}

impl World {
    fn new() -> Self {
        Self::with_escrow_config(EscrowConfig::default())
    }

    fn with_escrow_config(config: EscrowConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        let store_dyn: Arc<dyn MarketStore> = store.clone();
        let gateway_dyn: Arc<dyn seatswap::payment::PaymentGateway> = gateway.clone();
        Self {
            offers: OfferNegotiationMachine::new(store_dyn.clone(), NegotiationConfig::default()),
            escrow: EscrowTransactionMachine::new(
                store_dyn.clone(),
                gateway_dyn.clone(),
                config,
            ),
            disputes: DisputeResolutionWorkflow::new(
                store_dyn.clone(),
                gateway_dyn.clone(),
                DisputePolicy::default(),
            ),
            admin: AdminOverrideGateway::new(store_dyn, gateway_dyn),
            store,
            gateway,
        }
    }

    async fn seed_listing(&self, asking: u64) -> Listing {
        // Asking == original keeps the price-deviation signal quiet.
        let mut listing = Listing::new(
            SELLER,
            "arena-row-4",
            "concerts",
            Decimal::from(asking),
            Decimal::from(asking),
            Utc::now() + Duration::days(30),
        );
        // Old enough that the listing-age signal does not fire.
        listing.published_at = Utc::now() - Duration::days(2);
        self.store.insert_listing(&listing).await.unwrap();
        listing
    }

    async fn seed_trusted_buyer(&self, user_id: u64) {
        let mut profile = UserProfile::new(user_id);
        profile.created_at = Utc::now() - Duration::days(400);
        profile.email_verified = true;
        profile.phone_verified = true;
        profile.kyc_verified = true;
        profile.completed_transactions = 25;
        self.store.upsert_user_profile(&profile).await.unwrap();
    }

    /// Negotiate a 150 offer to acceptance and open the escrow transaction.
    /// Leaves the transaction AWAITING_PAYMENT and the listing RESERVED.
    async fn open_transaction(&self, listing: &Listing) -> seatswap::escrow::Transaction {
        self.seed_trusted_buyer(BUYER).await;
        let offer = self
            .offers
            .create_offer(listing.id, BUYER, Decimal::from(150), None)
            .await
            .unwrap();
        let outcome = self
            .offers
            .respond(offer.id, SELLER, OfferAction::Accept, None, None)
            .await
            .unwrap();
        let event = match outcome {
            OfferOutcome::Accepted(e) => e,
            other => panic!("expected acceptance, got {other:?}"),
        };
        self.escrow.open_from_offer(&event).await.unwrap()
    }

    /// Drive the transaction to PAYMENT_CONFIRMED via a provider webhook.
    async fn confirm_payment(&self, txn: &seatswap::escrow::Transaction) {
        let outcome = self
            .escrow
            .ingest_payment_event(&PaymentEvent {
                event_id: format!("evt_ok_{}", txn.id),
                transaction_id: txn.id,
                kind: PaymentEventKind::Succeeded,
                gross_amount: Some(txn.amount),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Applied(TransactionStatus::PaymentConfirmed)
        );
    }

    async fn listing_status(&self, listing: &Listing) -> ListingStatus {
        self.store.get_listing(listing.id).await.unwrap().unwrap().status
    }

    async fn txn_status(&self, txn: &seatswap::escrow::Transaction) -> TransactionStatus {
        self.store
            .get_transaction(txn.id)
            .await
            .unwrap()
            .unwrap()
            .status
    }
}

#[tokio::test]
async fn test_happy_path_offer_to_completion() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    let txn = w.open_transaction(&listing).await;
    assert_eq!(txn.status, TransactionStatus::AwaitingPayment);
    assert_eq!(txn.amount, Decimal::from(150));
    assert_eq!(txn.fee, Decimal::from(15));
    assert_eq!(txn.net_amount(), Decimal::from(135));

    let reserved = w.store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(reserved.status, ListingStatus::Reserved);
    assert_eq!(reserved.reserved_by, Some(txn.id));

    w.confirm_payment(&txn).await;
    let payment = w
        .store
        .get_payment_for_transaction(txn.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert!(payment.charge_ref.is_some());

    w.escrow.start_transfer(txn.id, SELLER).await.unwrap();
    let done = w.escrow.confirm_completion(txn.id, BUYER).await.unwrap();
    assert_eq!(done.status, TransactionStatus::Completed);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Sold);
    assert_eq!(w.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_webhook_replay_is_a_noop() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;

    let event = PaymentEvent {
        event_id: "evt_1".to_string(),
        transaction_id: txn.id,
        kind: PaymentEventKind::Succeeded,
        gross_amount: Some(txn.amount),
    };
    assert_eq!(
        w.escrow.ingest_payment_event(&event).await.unwrap(),
        WebhookOutcome::Applied(TransactionStatus::PaymentConfirmed)
    );
    // Provider retries the same event id.
    assert_eq!(
        w.escrow.ingest_payment_event(&event).await.unwrap(),
        WebhookOutcome::Replay
    );
    assert_eq!(w.txn_status(&txn).await, TransactionStatus::PaymentConfirmed);
}

#[tokio::test]
async fn test_new_event_id_after_confirmation_conflicts() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    w.confirm_payment(&txn).await;

    // A distinct event id is not a replay, and the transaction has already
    // left AWAITING_PAYMENT.
    let err = w
        .escrow
        .ingest_payment_event(&PaymentEvent {
            event_id: "evt_out_of_order".to_string(),
            transaction_id: txn.id,
            kind: PaymentEventKind::Failed,
            gross_amount: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(w.txn_status(&txn).await, TransactionStatus::PaymentConfirmed);
}

#[tokio::test]
async fn test_failed_payment_cancels_and_reopens_listing() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;

    let outcome = w
        .escrow
        .ingest_payment_event(&PaymentEvent {
            event_id: "evt_fail".to_string(),
            transaction_id: txn.id,
            kind: PaymentEventKind::Failed,
            gross_amount: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied(TransactionStatus::Cancelled));
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);

    let listing_row = w.store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(listing_row.reserved_by, None);
}

#[tokio::test]
async fn test_charge_failure_rolls_back_reservation() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    w.seed_trusted_buyer(BUYER).await;
    w.gateway.set_fail_charges(true);

    let offer = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(150), None)
        .await
        .unwrap();
    let outcome = w
        .offers
        .respond(offer.id, SELLER, OfferAction::Accept, None, None)
        .await
        .unwrap();
    let event = match outcome {
        OfferOutcome::Accepted(e) => e,
        other => panic!("expected acceptance, got {other:?}"),
    };

    let err = w.escrow.open_from_offer(&event).await.unwrap_err();
    assert!(matches!(err, CoreError::Provider(_)));

    // Reservation rolled back; another buyer can move on the listing.
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);
    let listing_row = w.store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(listing_row.reserved_by, None);
}

#[tokio::test]
async fn test_zero_amount_offer_rejected() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    let err = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::ZERO, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_one_live_offer_chain_per_buyer() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    w.offers
        .create_offer(listing.id, BUYER, Decimal::from(120), None)
        .await
        .unwrap();
    let err = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(130), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    // A different buyer is a different chain.
    w.offers
        .create_offer(listing.id, OTHER_BUYER, Decimal::from(110), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_counter_spawns_pending_for_other_party() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    let offer = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(120), Some("deal?".into()))
        .await
        .unwrap();
    let outcome = w
        .offers
        .respond(
            offer.id,
            SELLER,
            OfferAction::Counter,
            Some(Decimal::from(170)),
            None,
        )
        .await
        .unwrap();
    let counter = match outcome {
        OfferOutcome::Countered(c) => c,
        other => panic!("expected counter, got {other:?}"),
    };
    assert_eq!(counter.parent_offer_id, Some(offer.id));
    assert_eq!(counter.responder(), BUYER);
    assert_eq!(counter.status, OfferStatus::Pending);

    let original = w.store.get_offer(offer.id).await.unwrap().unwrap();
    assert_eq!(original.status, OfferStatus::Countered);

    // The chain still counts as live; the buyer cannot open a second one.
    let err = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(140), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn test_accept_after_listing_reserved_conflicts() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    // Two buyers bid; the first acceptance reserves the listing.
    let first = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(150), None)
        .await
        .unwrap();
    let second = w
        .offers
        .create_offer(listing.id, OTHER_BUYER, Decimal::from(160), None)
        .await
        .unwrap();

    w.seed_trusted_buyer(BUYER).await;
    let outcome = w
        .offers
        .respond(first.id, SELLER, OfferAction::Accept, None, None)
        .await
        .unwrap();
    let event = match outcome {
        OfferOutcome::Accepted(e) => e,
        other => panic!("expected acceptance, got {other:?}"),
    };
    w.escrow.open_from_offer(&event).await.unwrap();

    let err = w
        .offers
        .respond(second.id, SELLER, OfferAction::Accept, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn test_only_counterparty_may_respond() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let offer = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(120), None)
        .await
        .unwrap();

    // The buyer proposed it, so the buyer cannot accept it.
    let err = w
        .offers
        .respond(offer.id, BUYER, OfferAction::Accept, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));
}

#[tokio::test]
async fn test_transfer_requires_seller_and_confirmed_payment() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;

    // Not yet paid.
    let err = w.escrow.start_transfer(txn.id, SELLER).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    w.confirm_payment(&txn).await;

    // Wrong actor.
    let err = w.escrow.start_transfer(txn.id, BUYER).await.unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));

    let moved = w.escrow.start_transfer(txn.id, SELLER).await.unwrap();
    assert_eq!(moved.status, TransactionStatus::Transferring);
    assert!(moved.transfer_deadline.is_some());
}

#[tokio::test]
async fn test_dispute_refund_resolution() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    w.confirm_payment(&txn).await;

    let dispute = w
        .escrow
        .raise_dispute(txn.id, BUYER, "seats do not exist".to_string())
        .await
        .unwrap();
    assert_eq!(dispute.status, DisputeStatus::Open);
    assert_eq!(w.txn_status(&txn).await, TransactionStatus::Disputed);

    let resolved = w
        .disputes
        .resolve(dispute.id, ADMIN, Role::Mediator, Resolution::Refund, None)
        .await
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Resolved);
    assert_eq!(resolved.resolution, Some(Resolution::Refund));
    assert_eq!(resolved.resolved_by, Some(ADMIN));

    assert_eq!(w.txn_status(&txn).await, TransactionStatus::Refunded);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);
    assert_eq!(w.gateway.refund_count(), 1);
    assert_eq!(w.gateway.refund_amounts(), vec![Decimal::from(150)]);

    // A second ruling on the same dispute is a conflict, not a second refund.
    let err = w
        .disputes
        .resolve(dispute.id, ADMIN, Role::Mediator, Resolution::Refund, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(w.gateway.refund_count(), 1);
}

#[tokio::test]
async fn test_dispute_release_resolution_moves_no_money() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    w.confirm_payment(&txn).await;
    w.escrow.start_transfer(txn.id, SELLER).await.unwrap();

    let dispute = w
        .escrow
        .raise_dispute(txn.id, SELLER, "buyer ghosted after transfer".to_string())
        .await
        .unwrap();
    w.disputes
        .resolve(
            dispute.id,
            ADMIN,
            Role::Admin,
            Resolution::Release,
            Some("transfer log shows delivery".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(w.txn_status(&txn).await, TransactionStatus::Completed);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Sold);
    assert_eq!(w.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_dispute_partial_resolution_splits_funds() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    w.confirm_payment(&txn).await;

    let dispute = w
        .escrow
        .raise_dispute(txn.id, BUYER, "row was worse than listed".to_string())
        .await
        .unwrap();
    w.disputes
        .resolve(dispute.id, ADMIN, Role::Admin, Resolution::Partial, None)
        .await
        .unwrap();

    // 150 gross, 50% back to the buyer, seller gets 150 - 75 - 15 fee = 60.
    assert_eq!(w.gateway.refund_amounts(), vec![Decimal::from(75)]);
    assert_eq!(w.txn_status(&txn).await, TransactionStatus::Completed);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Sold);
}

#[tokio::test]
async fn test_dispute_resolution_requires_mediator_privilege() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    w.confirm_payment(&txn).await;
    let dispute = w
        .escrow
        .raise_dispute(txn.id, BUYER, "never delivered".to_string())
        .await
        .unwrap();

    let err = w
        .disputes
        .resolve(dispute.id, BUYER, Role::User, Resolution::Refund, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));
    assert_eq!(w.txn_status(&txn).await, TransactionStatus::Disputed);
    assert_eq!(w.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_dispute_requires_escrowed_funds() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;

    // AWAITING_PAYMENT holds no funds yet.
    let err = w
        .escrow
        .raise_dispute(txn.id, BUYER, "cold feet".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let err = w
        .escrow
        .raise_dispute(txn.id, 999, "not my transaction".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));
}

#[tokio::test]
async fn test_admin_force_refund_is_exactly_once() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    w.confirm_payment(&txn).await;

    let receipt = w
        .admin
        .force_refund(txn.id, ADMIN, Role::Admin)
        .await
        .unwrap();
    assert_eq!(receipt.status, TransactionStatus::Refunded);
    assert_eq!(receipt.admin_id, ADMIN);
    assert_eq!(w.gateway.refund_count(), 1);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);

    let err = w
        .admin
        .force_refund(txn.id, ADMIN, Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(w.gateway.refund_count(), 1);
}

#[tokio::test]
async fn test_admin_force_cancel_before_payment_moves_no_money() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;

    // Payment never succeeded; the override just closes the transaction.
    let receipt = w
        .admin
        .force_cancel(txn.id, ADMIN, Role::SuperAdmin)
        .await
        .unwrap();
    assert_eq!(receipt.status, TransactionStatus::Cancelled);
    assert_eq!(w.gateway.refund_count(), 0);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);
}

#[tokio::test]
async fn test_admin_override_rejected_for_completed_and_non_admin() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;

    let err = w
        .admin
        .force_refund(txn.id, BUYER, Role::User)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));

    w.confirm_payment(&txn).await;
    w.escrow.start_transfer(txn.id, SELLER).await.unwrap();
    w.escrow.confirm_completion(txn.id, BUYER).await.unwrap();

    let err = w
        .admin
        .force_refund(txn.id, ADMIN, Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(w.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_fraud_block_holds_transaction_for_review() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    // Confirmed fraud history is a hard block signal.
    let mut profile = UserProfile::new(BUYER);
    profile.created_at = Utc::now() - Duration::days(400);
    profile.confirmed_fraud_disputes = 1;
    w.store.upsert_user_profile(&profile).await.unwrap();

    let offer = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(150), None)
        .await
        .unwrap();
    let outcome = w
        .offers
        .respond(offer.id, SELLER, OfferAction::Accept, None, None)
        .await
        .unwrap();
    let event = match outcome {
        OfferOutcome::Accepted(e) => e,
        other => panic!("expected acceptance, got {other:?}"),
    };

    let txn = w.escrow.open_from_offer(&event).await.unwrap();
    assert_eq!(txn.status, TransactionStatus::UnderReview);

    // Held transactions never touched the listing or the provider.
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);
    assert!(
        w.store
            .get_payment_for_transaction(txn.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_review_release_resumes_the_flow() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    let mut profile = UserProfile::new(BUYER);
    profile.confirmed_fraud_disputes = 1;
    w.store.upsert_user_profile(&profile).await.unwrap();

    let offer = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(150), None)
        .await
        .unwrap();
    let event = match w
        .offers
        .respond(offer.id, SELLER, OfferAction::Accept, None, None)
        .await
        .unwrap()
    {
        OfferOutcome::Accepted(e) => e,
        other => panic!("expected acceptance, got {other:?}"),
    };
    let held = w.escrow.open_from_offer(&event).await.unwrap();
    assert_eq!(held.status, TransactionStatus::UnderReview);

    let released = w.escrow.release_from_review(held.id, ADMIN).await.unwrap();
    assert_eq!(released.status, TransactionStatus::AwaitingPayment);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Reserved);

    // Releasing twice finds the hold gone.
    let err = w.escrow.release_from_review(held.id, ADMIN).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn test_review_cancel_closes_without_side_effects() {
    let w = World::new();
    let listing = w.seed_listing(200).await;

    let mut profile = UserProfile::new(BUYER);
    profile.confirmed_fraud_disputes = 2;
    w.store.upsert_user_profile(&profile).await.unwrap();

    let offer = w
        .offers
        .create_offer(listing.id, BUYER, Decimal::from(150), None)
        .await
        .unwrap();
    let event = match w
        .offers
        .respond(offer.id, SELLER, OfferAction::Accept, None, None)
        .await
        .unwrap()
    {
        OfferOutcome::Accepted(e) => e,
        other => panic!("expected acceptance, got {other:?}"),
    };
    let held = w.escrow.open_from_offer(&event).await.unwrap();

    let cancelled = w.escrow.cancel_from_review(held.id, ADMIN).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);
    assert_eq!(w.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_one_open_transaction_per_listing() {
    let w = World::new();
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    assert_eq!(txn.status, TransactionStatus::AwaitingPayment);

    // Even with a fresh accepted-offer event, the listing is taken.
    let event = seatswap::offer::OfferAccepted {
        offer_id: seatswap::core_types::OfferId::new(),
        listing_id: listing.id,
        buyer_id: OTHER_BUYER,
        seller_id: SELLER,
        amount: Decimal::from(160),
    };
    let err = w.escrow.open_from_offer(&event).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn test_expire_unpaid_sweep() {
    let w = World::with_escrow_config(EscrowConfig {
        payment_deadline: Duration::zero(),
        ..Default::default()
    });
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;

    // Deadline already lapsed; the sweep cancels and reopens the listing.
    let swept = w.escrow.expire_unpaid(50).await.unwrap();
    assert_eq!(swept, 1);
    assert_eq!(w.txn_status(&txn).await, TransactionStatus::Cancelled);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Active);

    let payment = w
        .store
        .get_payment_for_transaction(txn.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    // Idempotent on re-run.
    assert_eq!(w.escrow.expire_unpaid(50).await.unwrap(), 0);
}

#[tokio::test]
async fn test_auto_complete_overdue_transfer() {
    let w = World::with_escrow_config(EscrowConfig {
        transfer_deadline: Duration::zero(),
        ..Default::default()
    });
    let listing = w.seed_listing(200).await;
    let txn = w.open_transaction(&listing).await;
    w.confirm_payment(&txn).await;
    w.escrow.start_transfer(txn.id, SELLER).await.unwrap();

    let swept = w.escrow.auto_complete_overdue(50).await.unwrap();
    assert_eq!(swept, 1);
    assert_eq!(w.txn_status(&txn).await, TransactionStatus::Completed);
    assert_eq!(w.listing_status(&listing).await, ListingStatus::Sold);
}
