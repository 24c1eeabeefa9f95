//! Wallet command-flow integration tests
//!
//! Drives the command handlers directly against PostgreSQL, without the
//! HTTP layer in between.

use std::sync::Arc;

use rust_decimal_macros::dec;
use uuid::Uuid;

use student_wallet::aggregate::RechargeStatus;
use student_wallet::gateway::{PaymentGatewayRegistry, StripeGateway};
use student_wallet::handlers::{
    CompleteRechargeCommand, CompleteRechargeHandler, CreateWalletCommand, CreateWalletHandler,
    PayLectureCommand, PayLectureHandler, RechargeWalletCommand, RechargeWalletHandler,
};
use student_wallet::store::{RechargeStore, WalletStore};

mod common;

fn gateways() -> Arc<PaymentGatewayRegistry> {
    Arc::new(
        PaymentGatewayRegistry::new().register(Arc::new(StripeGateway::new(
            "whsec_test".to_string(),
        ))),
    )
}

fn recharge_command(wallet_id: Uuid, amount: rust_decimal::Decimal) -> RechargeWalletCommand {
    RechargeWalletCommand::new(wallet_id, amount, "EGP".to_string(), "stripe".to_string())
        .with_callback_url("https://app.example.com/wallet/return".to_string())
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_create_wallet_is_idempotent_per_student() {
    let pool = common::setup_test_db().await;
    let handler = CreateWalletHandler::new(pool.clone());
    let student_id = Uuid::new_v4();

    let first = handler
        .execute(CreateWalletCommand::new(student_id, "EGP".to_string()))
        .await
        .unwrap();
    assert!(first.created);

    // Same student again: the existing wallet comes back untouched
    let second = handler
        .execute(CreateWalletCommand::new(student_id, "EGP".to_string()))
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.wallet_id, first.wallet_id);

    let wallet = WalletStore::new(pool.clone())
        .get(first.wallet_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance().amount(), dec!(0));
    assert!(wallet.is_active());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_recharge_cycle_completes_and_credits() {
    let pool = common::setup_test_db().await;
    let wallet_id = common::seed_wallet(&pool, Uuid::new_v4(), dec!(10)).await;

    let recharge_handler = RechargeWalletHandler::new(pool.clone(), gateways());
    let issued = recharge_handler
        .execute(recharge_command(wallet_id, dec!(90)))
        .await
        .unwrap();
    assert_eq!(issued.status, RechargeStatus::Pending);
    assert!(!issued.provider_reference_id.is_empty());
    assert!(issued.client_payment_token.is_some());

    // Only one in-flight recharge per wallet
    let overlapping = recharge_handler
        .execute(recharge_command(wallet_id, dec!(30)))
        .await;
    assert!(overlapping.is_err());

    // The provider confirms
    let complete_handler = CompleteRechargeHandler::new(pool.clone());
    let resolved = complete_handler
        .execute(
            CompleteRechargeCommand::new(
                issued.provider_reference_id.clone(),
                RechargeStatus::Completed,
            )
            .with_amount(dec!(90)),
        )
        .await
        .unwrap();
    assert!(resolved.applied);
    assert_eq!(resolved.recharge_id, Some(issued.recharge_id));

    let wallets = WalletStore::new(pool.clone());
    let wallet = wallets.get(wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance().amount(), dec!(100));

    // A duplicate signal is a no-op
    let duplicate = complete_handler
        .execute(CompleteRechargeCommand::new(
            issued.provider_reference_id.clone(),
            RechargeStatus::Completed,
        ))
        .await
        .unwrap();
    assert!(!duplicate.applied);
    assert_eq!(duplicate.recharge_id, Some(issued.recharge_id));

    let wallet = wallets.get(wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance().amount(), dec!(100));

    let recharges = RechargeStore::new(pool.clone());
    assert_eq!(recharges.total_recharged(wallet_id).await.unwrap(), dec!(90));
    assert!(!recharges.has_pending_recharge(wallet_id).await.unwrap());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_failed_recharge_leaves_balance_alone() {
    let pool = common::setup_test_db().await;
    let wallet_id = common::seed_wallet(&pool, Uuid::new_v4(), dec!(25)).await;

    let issued = RechargeWalletHandler::new(pool.clone(), gateways())
        .execute(recharge_command(wallet_id, dec!(75)))
        .await
        .unwrap();

    let resolved = CompleteRechargeHandler::new(pool.clone())
        .execute(CompleteRechargeCommand::new(
            issued.provider_reference_id.clone(),
            RechargeStatus::Failed,
        ))
        .await
        .unwrap();
    assert!(resolved.applied);

    let wallets = WalletStore::new(pool.clone());
    let wallet = wallets.get(wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance().amount(), dec!(25));

    // No ledger entry for a failed recharge
    let entries = wallets.ledger_page(wallet_id, 10, 0).await.unwrap();
    assert!(entries.is_empty());

    let recharges = RechargeStore::new(pool.clone());
    let recharge = recharges.get(issued.recharge_id).await.unwrap().unwrap();
    assert_eq!(recharge.status(), RechargeStatus::Failed);
    assert!(recharge.completed_at().is_some());
    assert_eq!(recharges.total_recharged(wallet_id).await.unwrap(), dec!(0));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_unknown_provider_reference_is_ignored() {
    let pool = common::setup_test_db().await;

    let result = CompleteRechargeHandler::new(pool)
        .execute(CompleteRechargeCommand::new(
            "pi_does_not_exist".to_string(),
            RechargeStatus::Completed,
        ))
        .await
        .unwrap();

    assert!(!result.applied);
    assert_eq!(result.recharge_id, None);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_lecture_payment_debits_and_guards_balance() {
    let pool = common::setup_test_db().await;
    let student_id = Uuid::new_v4();
    let wallet_id = common::seed_wallet(&pool, student_id, dec!(100)).await;

    let handler = PayLectureHandler::new(pool.clone());
    let lecture_id = Uuid::new_v4();

    let paid = handler
        .execute(PayLectureCommand::new(
            wallet_id, student_id, lecture_id, dec!(60),
        ))
        .await
        .unwrap();
    assert_eq!(paid.balance, dec!(40));

    let wallets = WalletStore::new(pool.clone());
    let entries = wallets.ledger_page(wallet_id, 10, 0).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reference_id(), lecture_id);

    // Balance cannot go negative
    let overdraft = handler
        .execute(PayLectureCommand::new(
            wallet_id,
            student_id,
            Uuid::new_v4(),
            dec!(60),
        ))
        .await;
    assert!(overdraft.is_err());

    let wallet = wallets.get(wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance().amount(), dec!(40));

    // Someone else's wallet is off limits
    let stranger = handler
        .execute(PayLectureCommand::new(
            wallet_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(10),
        ))
        .await;
    assert!(stranger.is_err());
}
