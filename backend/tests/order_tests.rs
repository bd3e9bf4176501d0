//! Order lifecycle tests
//!
//! Pricing, payment commit, re-pricing, rejection and pickup release against
//! the in-memory store.

mod common;

use common::*;
use proptest::prelude::*;
use shared::orders::LineRequest;
use shared::{OrderStatus, PaymentStatus, PickupStatus, ReservationState};
use uuid::Uuid;

use agristock::error::AppError;
use agristock::services::order::{OrderService, OrderUpdate, UpdateOrderInput};
use agristock::services::ProductService;

fn line(product_id: Uuid, quantity: i64) -> LineRequest {
    LineRequest { product_id, quantity }
}

fn updated(outcome: OrderUpdate) -> shared::Order {
    match outcome {
        OrderUpdate::Updated(order) => order,
        OrderUpdate::Deleted => panic!("order was deleted"),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_prices_lines_without_moving_stock() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 40, "18.50").await;
        let potash = seed_product(&app.state, "Potash", 10, "22.00").await;

        let order = OrderService::new(&app.state)
            .create(farmer.id, vec![line(urea.id, 4), line(potash.id, 1)])
            .await
            .unwrap();

        assert_eq!(order.total_cost, dec("96.00"));
        assert_eq!(order.order_status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.awaiting_pickup, PickupStatus::AwaitingCollection);
        assert_eq!(order.reservation, ReservationState::Requested);
        assert_eq!(stock_of(&app.state, urea.id).await, (40, 40));
    }

    #[tokio::test]
    async fn test_create_with_insufficient_lines_persists_nothing() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let a = seed_product(&app.state, "Urea", 3, "10").await;
        let b = seed_product(&app.state, "Potash", 2, "10").await;
        let orders = OrderService::new(&app.state);

        let err = orders
            .create(farmer.id, vec![line(a.id, 5), line(b.id, 9)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));
        assert!(orders.all(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_checks_farmer_and_products() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 3, "10").await;
        let orders = OrderService::new(&app.state);

        let err = orders
            .create(Uuid::new_v4(), vec![line(urea.id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = orders
            .create(farmer.id, vec![line(Uuid::new_v4(), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = orders.create(farmer.id, vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_mark_paid_commits_stock_once() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 40, "18.50").await;
        let orders = OrderService::new(&app.state);
        let order = orders.create(farmer.id, vec![line(urea.id, 4)]).await.unwrap();

        let paid = orders.mark_paid(order.id).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.order_status, OrderStatus::Approved);
        assert_eq!(paid.reservation, ReservationState::Committed);
        assert_eq!(stock_of(&app.state, urea.id).await, (36, 40));

        let err = orders.mark_paid(order.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyPaid(_)));
        assert_eq!(stock_of(&app.state, urea.id).await, (36, 40));

        let err = orders.mark_paid(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_paid_fails_when_stock_was_issued_meanwhile() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 5, "10").await;
        let orders = OrderService::new(&app.state);
        let first = orders.create(farmer.id, vec![line(urea.id, 4)]).await.unwrap();
        let second = orders.create(farmer.id, vec![line(urea.id, 4)]).await.unwrap();

        orders.mark_paid(first.id).await.unwrap();
        let err = orders.mark_paid(second.id).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));

        let second = orders.by_id(second.id).await.unwrap();
        assert_eq!(second.payment_status, PaymentStatus::Pending);
        assert_eq!(stock_of(&app.state, urea.id).await, (1, 5));
    }

    #[tokio::test]
    async fn test_reject_deletes_order_and_returns_committed_stock() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 10, "10").await;
        let orders = OrderService::new(&app.state);
        let order = orders.create(farmer.id, vec![line(urea.id, 3)]).await.unwrap();
        orders.mark_paid(order.id).await.unwrap();

        let outcome = orders
            .update(
                order.id,
                UpdateOrderInput {
                    order_status: Some(OrderStatus::Rejected),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, OrderUpdate::Deleted));

        let err = orders.by_id(order.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(stock_of(&app.state, urea.id).await, (10, 10));
    }

    #[tokio::test]
    async fn test_replacing_lines_of_paid_order_moves_the_difference() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 10, "10").await;
        let potash = seed_product(&app.state, "Potash", 10, "20").await;
        let orders = OrderService::new(&app.state);
        let order = orders.create(farmer.id, vec![line(urea.id, 8)]).await.unwrap();
        orders.mark_paid(order.id).await.unwrap();
        assert_eq!(stock_of(&app.state, urea.id).await, (2, 10));

        // 10 > available 2, but the 8 already held count towards it
        let order = updated(
            orders
                .update(
                    order.id,
                    UpdateOrderInput {
                        products: Some(vec![line(urea.id, 10), line(potash.id, 1)]),
                        ..Default::default()
                    },
                )
                .await
                .unwrap(),
        );
        assert_eq!(order.total_cost, dec("120.00"));
        assert_eq!(stock_of(&app.state, urea.id).await, (0, 10));
        assert_eq!(stock_of(&app.state, potash.id).await, (9, 10));

        let order = updated(
            orders
                .update(
                    order.id,
                    UpdateOrderInput {
                        products: Some(vec![line(potash.id, 2)]),
                        ..Default::default()
                    },
                )
                .await
                .unwrap(),
        );
        assert_eq!(order.products.len(), 1);
        assert_eq!(stock_of(&app.state, urea.id).await, (10, 10));
        assert_eq!(stock_of(&app.state, potash.id).await, (8, 10));
    }

    #[tokio::test]
    async fn test_order_keeps_prices_quoted_at_creation() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 20, "18.50").await;
        let orders = OrderService::new(&app.state);
        let order = orders.create(farmer.id, vec![line(urea.id, 4)]).await.unwrap();
        assert_eq!(order.total_cost, dec("74.00"));

        ProductService::new(&app.state)
            .update(
                urea.id,
                shared::ProductPatch {
                    selling_price: Some(dec("25.00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        // a restock quotes a new selling price as well
        agristock::services::LedgerService::new(&app.state)
            .restock(urea.id, restock_input(5, "10", "30.00", "15"))
            .await
            .unwrap();

        let stored = orders.by_id(order.id).await.unwrap();
        assert_eq!(stored.total_cost, dec("74.00"));
        assert_eq!(stored.products[0].unit_price, dec("18.50"));
        assert_eq!(stored.products[0].cost, dec("74.00"));

        let paid = orders.mark_paid(order.id).await.unwrap();
        assert_eq!(paid.total_cost, dec("74.00"));
        assert_eq!(paid.products[0].unit_price, dec("18.50"));
    }

    #[tokio::test]
    async fn test_repricing_unpaid_order_uses_current_price() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 10, "10").await;
        let orders = OrderService::new(&app.state);
        let order = orders.create(farmer.id, vec![line(urea.id, 2)]).await.unwrap();

        ProductService::new(&app.state)
            .update(
                urea.id,
                shared::ProductPatch {
                    selling_price: Some(dec("12.50")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let order = updated(
            orders
                .update(
                    order.id,
                    UpdateOrderInput {
                        products: Some(vec![line(urea.id, 2)]),
                        ..Default::default()
                    },
                )
                .await
                .unwrap(),
        );
        assert_eq!(order.total_cost, dec("25.00"));
        assert_eq!(stock_of(&app.state, urea.id).await, (10, 10));
    }

    #[tokio::test]
    async fn test_pickup_requires_payment_and_releases_balance() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 10, "10").await;
        let orders = OrderService::new(&app.state);
        let order = orders.create(farmer.id, vec![line(urea.id, 4)]).await.unwrap();
        let collect = || UpdateOrderInput {
            awaiting_pickup: Some(PickupStatus::Completed),
            ..Default::default()
        };

        let err = orders.update(order.id, collect()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(stock_of(&app.state, urea.id).await, (10, 10));

        orders.mark_paid(order.id).await.unwrap();
        let order = updated(orders.update(order.id, collect()).await.unwrap());
        assert_eq!(order.awaiting_pickup, PickupStatus::Completed);
        assert_eq!(order.reservation, ReservationState::Released);
        assert_eq!(stock_of(&app.state, urea.id).await, (6, 6));

        let err = orders.update(order.id, collect()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(stock_of(&app.state, urea.id).await, (6, 6));
    }

    #[tokio::test]
    async fn test_update_requires_order() {
        let app = test_app();
        let err = OrderService::new(&app.state)
            .update(Uuid::new_v4(), UpdateOrderInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_queries() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let other = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 10, "10").await;
        let orders = OrderService::new(&app.state);

        let a = orders.create(farmer.id, vec![line(urea.id, 1)]).await.unwrap();
        orders.create(farmer.id, vec![line(urea.id, 1)]).await.unwrap();
        orders.mark_paid(a.id).await.unwrap();

        assert_eq!(orders.pending_count().await.unwrap(), 1);
        assert_eq!(orders.by_farmer(farmer.id).await.unwrap().len(), 2);
        assert!(matches!(
            orders.by_farmer(other.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(orders.by_id(a.id).await.unwrap().id, a.id);
        assert_eq!(orders.all(&Default::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_referenced_product_cannot_be_deleted() {
        let app = test_app();
        let farmer = seed_farmer(&app.state).await;
        let urea = seed_product(&app.state, "Urea", 10, "10").await;
        OrderService::new(&app.state)
            .create(farmer.id, vec![line(urea.id, 1)])
            .await
            .unwrap();

        let err = ProductService::new(&app.state).delete(urea.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Total cost equals the sum of quantity x selling price at order time
        #[test]
        fn prop_total_cost_matches_lines(
            quantities in prop::collection::vec(1i64..20, 1..5),
            cents in prop::collection::vec(1i64..10_000, 5),
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let app = test_app();
                let farmer = seed_farmer(&app.state).await;

                let mut requests = Vec::new();
                let mut expected = rust_decimal::Decimal::ZERO;
                for (i, quantity) in quantities.iter().enumerate() {
                    let price = rust_decimal::Decimal::new(cents[i], 2);
                    let product = seed_product(&app.state, &format!("Product {}", i), 100, &price.to_string()).await;
                    requests.push(line(product.id, *quantity));
                    expected += price * rust_decimal::Decimal::from(*quantity);
                }

                let order = OrderService::new(&app.state).create(farmer.id, requests).await.unwrap();
                assert_eq!(order.total_cost, expected);
            });
        }

        /// Pay then reject always hands every committed unit back
        #[test]
        fn prop_pay_then_reject_restores_stock(quantity in 1i64..30) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let app = test_app();
                let farmer = seed_farmer(&app.state).await;
                let product = seed_product(&app.state, "Urea", 30, "7.25").await;
                let orders = OrderService::new(&app.state);

                let order = orders.create(farmer.id, vec![line(product.id, quantity)]).await.unwrap();
                orders.mark_paid(order.id).await.unwrap();
                assert_eq!(stock_of(&app.state, product.id).await, (30 - quantity, 30));

                orders
                    .update(order.id, UpdateOrderInput { order_status: Some(OrderStatus::Rejected), ..Default::default() })
                    .await
                    .unwrap();
                assert_eq!(stock_of(&app.state, product.id).await, (30, 30));
            });
        }
    }
}
