//! Stock ledger service tests
//!
//! Restock, issue, pickup confirmation and transaction deletion against the
//! in-memory store, including concurrent issues on one product.

mod common;

use common::*;
use proptest::prelude::*;
use shared::ledger::IssueInput;
use shared::{OrderStatus, TransactionStatus};
use uuid::Uuid;

use agristock::error::AppError;
use agristock::store::{Change, Store};
use agristock::services::order::OrderService;
use agristock::services::LedgerService;
use shared::orders::LineRequest;

fn issue_input(quantity: i64, invoiced: &str, order_id: Option<Uuid>) -> IssueInput {
    IssueInput {
        qty_issued: quantity,
        received_from_issued_to: "Ama Owusu".to_string(),
        invoiced_amount: dec(invoiced),
        order_id,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_restock_issue_delete_scenario() {
        let app = test_app();
        let product = seed_product(&app.state, "Urea 46%", 100, "18.50").await;
        let ledger = LedgerService::new(&app.state);
        assert_eq!(stock_of(&app.state, product.id).await, (100, 100));

        let receipt = ledger
            .restock(product.id, restock_input(50, "10", "19.00", "15"))
            .await
            .unwrap();
        assert_eq!(receipt.status, TransactionStatus::Receipt);
        assert_eq!(receipt.value_in_cedi, dec("150.00"));
        assert_eq!(stock_of(&app.state, product.id).await, (150, 150));

        let issue = ledger.issue(product.id, issue_input(30, "20", None)).await.unwrap();
        assert_eq!(issue.value_in_cedi, dec("300.00"));
        assert_eq!(issue.cedi_conversion_rate, dec("15"));
        assert!(!issue.pickup_confirmed);
        assert_eq!(stock_of(&app.state, product.id).await, (120, 150));

        ledger.delete_transaction(product.id, issue.id).await.unwrap();
        assert_eq!(stock_of(&app.state, product.id).await, (150, 180));

        let transactions = ledger.list_transactions(product.id).await.unwrap();
        assert_eq!(transactions.len(), 2);
        assert!(transactions.iter().all(|t| t.is_receipt()));
    }

    #[tokio::test]
    async fn test_restock_overwrites_selling_price() {
        let app = test_app();
        let product = seed_product(&app.state, "Potash", 10, "12.00").await;
        LedgerService::new(&app.state)
            .restock(product.id, restock_input(5, "3", "13.25", "14.5"))
            .await
            .unwrap();

        let product = agristock::services::ProductService::new(&app.state)
            .get(product.id)
            .await
            .unwrap();
        assert_eq!(product.selling_price, dec("13.25"));
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_rejected_without_changes() {
        let app = test_app();
        let product = seed_product(&app.state, "Urea", 10, "18.50").await;
        let ledger = LedgerService::new(&app.state);

        let mut input = restock_input(5, "1", "18.50", "15");
        input.value_in_euro = rust_decimal::Decimal::MAX;
        let err = ledger.restock(product.id, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "valueInEuro"));

        let mut input = issue_input(2, "1", None);
        input.invoiced_amount = rust_decimal::Decimal::MAX;
        let err = ledger.issue(product.id, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "invoicedAmount"));

        assert_eq!(stock_of(&app.state, product.id).await, (10, 10));
        assert_eq!(ledger.list_transactions(product.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let app = test_app();
        let ledger = LedgerService::new(&app.state);
        let err = ledger
            .restock(Uuid::new_v4(), restock_input(5, "1", "1", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = ledger.list_transactions(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_issue_without_receipt_has_no_rate() {
        let app = test_app();
        let mut product = seed_product(&app.state, "Empty Sacks", 0, "0").await;
        // stock carried over from before the ledger existed
        product.available_stock = 5;
        product.stock_balance = 5;
        app.state
            .store
            .commit(Change::UpdateProduct(product.clone()).into())
            .await
            .unwrap();

        let err = LedgerService::new(&app.state)
            .issue(product.id, issue_input(1, "5", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoConversionRate(_)));
        assert_eq!(stock_of(&app.state, product.id).await, (5, 5));
    }

    #[tokio::test]
    async fn test_issue_more_than_available() {
        let app = test_app();
        let product = seed_product(&app.state, "NPK 15-15-15", 10, "20").await;
        let err = LedgerService::new(&app.state)
            .issue(product.id, issue_input(11, "5", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock { requested: 11, available: 10, .. }
        ));
        assert_eq!(stock_of(&app.state, product.id).await, (10, 10));
    }

    #[tokio::test]
    async fn test_deleting_receipt_guards_negative_stock() {
        let app = test_app();
        let product = seed_product(&app.state, "Glyphosate", 10, "8").await;
        let ledger = LedgerService::new(&app.state);
        let receipt_id = ledger.list_transactions(product.id).await.unwrap()[0].id;

        ledger.issue(product.id, issue_input(6, "10", None)).await.unwrap();
        let err = ledger.delete_transaction(product.id, receipt_id).await.unwrap_err();
        assert!(matches!(err, AppError::NegativeStockGuard(_)));
        assert_eq!(stock_of(&app.state, product.id).await, (4, 10));
        assert_eq!(ledger.list_transactions(product.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deleting_order_issue_reverts_approval() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let product = seed_product(&app.state, "Cocoa Spray", 20, "9").await;
        let orders = OrderService::new(&app.state);
        let order = orders
            .create(farmer.id, vec![LineRequest { product_id: product.id, quantity: 2 }])
            .await
            .unwrap();
        orders.mark_paid(order.id).await.unwrap();

        let ledger = LedgerService::new(&app.state);
        let issue = ledger
            .issue(product.id, issue_input(2, "18", Some(order.id)))
            .await
            .unwrap();

        let confirmed = ledger.confirm_pickup(order.id).await.unwrap();
        assert_eq!(confirmed.id, issue.id);
        assert!(confirmed.pickup_confirmed);

        ledger.delete_transaction(product.id, issue.id).await.unwrap();
        let order = orders.by_id(order.id).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirm_pickup_without_transaction() {
        let app = test_app();
        let err = LedgerService::new(&app.state)
            .confirm_pickup(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_issues_never_oversell() {
        let app = test_app();
        let product = seed_product(&app.state, "Sulphate of Ammonia", 50, "11").await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = LedgerService::new(&app.state);
            let product_id = product.id;
            handles.push(tokio::spawn(async move {
                ledger.issue(product_id, issue_input(3, "1", None)).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(AppError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 16);
        assert_eq!(stock_of(&app.state, product.id).await, (2, 50));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        Restock(i64),
        Issue(i64),
        DeleteOldest,
        DeleteNewest,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..40).prop_map(Op::Restock),
            (1i64..40).prop_map(Op::Issue),
            Just(Op::DeleteOldest),
            Just(Op::DeleteNewest),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Any sequence of ledger operations keeps 0 <= available <= balance,
        /// whether individual operations succeed or are refused
        #[test]
        fn prop_service_sequence_keeps_stock_consistent(ops in prop::collection::vec(op_strategy(), 1..25)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let app = test_app();
                let product = seed_product(&app.state, "Urea", 10, "5").await;
                let ledger = LedgerService::new(&app.state);

                for op in ops {
                    let _ = match op {
                        Op::Restock(q) => ledger.restock(product.id, restock_input(q, "2", "5", "15.2")).await.map(|_| ()),
                        Op::Issue(q) => ledger.issue(product.id, issue_input(q, "3", None)).await.map(|_| ()),
                        Op::DeleteOldest | Op::DeleteNewest => {
                            let transactions = ledger.list_transactions(product.id).await.unwrap();
                            let target = if matches!(op, Op::DeleteOldest) {
                                transactions.first()
                            } else {
                                transactions.last()
                            };
                            match target {
                                Some(t) => ledger.delete_transaction(product.id, t.id).await.map(|_| ()),
                                None => Ok(()),
                            }
                        }
                    };

                    let (available, balance) = stock_of(&app.state, product.id).await;
                    assert!(available >= 0);
                    assert!(available <= balance);
                }
            });
        }
    }
}
