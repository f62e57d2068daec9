//! Coverage of the bidding protocol: bid preconditions, the one-bid-per-driver
//! rule, and the exclusive accept with its fan-out rejection of rival bids.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

use common::{proof_file, TestApp};
use cropmate_api::auth::AuthUser;
use cropmate_api::entities::delivery::DeliveryStatus;
use cropmate_api::entities::delivery_request::RequestStatus;
use cropmate_api::entities::order::OrderStatus;
use cropmate_api::errors::ServiceError;
use cropmate_api::services::delivery_requests::CreateDeliveryRequestInput;
use cropmate_api::services::orders::CreateOrderRequest;

/// Drives an order to `ReadyForDelivery` and returns (order_id, delivery_id).
async fn ready_order(app: &TestApp) -> (Uuid, Uuid) {
    let order = app
        .services
        .orders
        .create_order(
            &app.customer,
            CreateOrderRequest {
                crop_id: app.crop_id,
                quantity: 4,
                delivery_address: "14 Mabini St, Quezon City".to_string(),
                payment_proof: proof_file("payment.png"),
            },
        )
        .await
        .unwrap();
    app.services
        .orders
        .confirm_payment(&app.farmer, order.id)
        .await
        .unwrap();
    app.services
        .orders
        .mark_ready_for_delivery(&app.farmer, order.id)
        .await
        .unwrap();

    let deliveries = app.services.deliveries.list_available(&app.driver).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    (order.id, deliveries[0].id)
}

fn bid(delivery_id: Uuid, fee: Decimal) -> CreateDeliveryRequestInput {
    CreateDeliveryRequestInput {
        delivery_id,
        custom_fee: fee,
        message: Some("Can pick up this afternoon".to_string()),
    }
}

#[tokio::test]
async fn bid_requires_pending_delivery_on_a_ready_order() {
    let app = TestApp::spawn().await;

    // Order exists but payment is not yet confirmed: no delivery at all.
    let order = app
        .services
        .orders
        .create_order(
            &app.customer,
            CreateOrderRequest {
                crop_id: app.crop_id,
                quantity: 1,
                delivery_address: "14 Mabini St".to_string(),
                payment_proof: proof_file("p.png"),
            },
        )
        .await
        .unwrap();
    app.services
        .orders
        .confirm_payment(&app.farmer, order.id)
        .await
        .unwrap();

    // Delivery is pending but the order is only PaymentReceived.
    let delivery = app
        .services
        .deliveries
        .list_for_driver(&app.driver)
        .await
        .unwrap();
    assert!(delivery.is_empty());

    let deliveries = cropmate_api::entities::Delivery::find()
        .all(&*app.db)
        .await
        .unwrap();
    let err = app
        .services
        .delivery_requests
        .create_request(&app.driver, bid(deliveries[0].id, dec!(12.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn bid_fee_must_be_positive_and_bids_are_unique_per_driver() {
    let app = TestApp::spawn().await;
    let (_, delivery_id) = ready_order(&app).await;

    let err = app
        .services
        .delivery_requests
        .create_request(&app.driver, bid(delivery_id, Decimal::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    app.services
        .delivery_requests
        .create_request(&app.driver, bid(delivery_id, dec!(12.00)))
        .await
        .unwrap();

    // Same driver, same delivery: conflict even with a different fee.
    let err = app
        .services
        .delivery_requests
        .create_request(&app.driver, bid(delivery_id, dec!(9.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // A different driver may still bid.
    app.services
        .delivery_requests
        .create_request(&app.second_driver, bid(delivery_id, dec!(11.00)))
        .await
        .unwrap();
}

#[tokio::test]
async fn accept_rejects_all_rival_bids_and_binds_the_driver() {
    let app = TestApp::spawn().await;
    let (order_id, delivery_id) = ready_order(&app).await;

    let winning = app
        .services
        .delivery_requests
        .create_request(&app.driver, bid(delivery_id, dec!(12.00)))
        .await
        .unwrap();
    let losing = app
        .services
        .delivery_requests
        .create_request(&app.second_driver, bid(delivery_id, dec!(10.00)))
        .await
        .unwrap();
    let also_losing = app
        .services
        .delivery_requests
        .create_request(&app.third_driver, bid(delivery_id, dec!(11.00)))
        .await
        .unwrap();

    let pending = app
        .services
        .delivery_requests
        .list_for_customer(&app.customer)
        .await
        .unwrap();
    assert_eq!(pending.len(), 3);

    let accepted = app
        .services
        .delivery_requests
        .accept_request(&app.customer, winning.id)
        .await
        .unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);

    // Both rival bids lost automatically.
    for (rival, request_id) in [
        (&app.second_driver, losing.id),
        (&app.third_driver, also_losing.id),
    ] {
        let requests = app
            .services
            .delivery_requests
            .list_for_driver(rival)
            .await
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, request_id);
        assert_eq!(requests[0].status, RequestStatus::Rejected);
    }

    // Delivery bound to the winner; order in transit.
    let delivery = app.services.deliveries.get_delivery(delivery_id).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Accepted);
    assert_eq!(delivery.driver_id, Some(app.driver.user_id));

    let order = app.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::InTransit);

    // Accepting the already-rejected rival now fails.
    let err = app
        .services
        .delivery_requests
        .accept_request(&app.customer, losing.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn accept_is_owner_only() {
    let app = TestApp::spawn().await;
    let (_, delivery_id) = ready_order(&app).await;

    let request = app
        .services
        .delivery_requests
        .create_request(&app.driver, bid(delivery_id, dec!(12.00)))
        .await
        .unwrap();

    let other_customer = AuthUser {
        user_id: Uuid::new_v4(),
        role: cropmate_api::auth::UserRole::Customer,
        token_id: "other".into(),
    };
    let err = app
        .services
        .delivery_requests
        .accept_request(&other_customer, request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));

    // Drivers cannot accept bids at all.
    let err = app
        .services
        .delivery_requests
        .accept_request(&app.driver, request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn reject_declines_a_single_bid_only() {
    let app = TestApp::spawn().await;
    let (_, delivery_id) = ready_order(&app).await;

    let first = app
        .services
        .delivery_requests
        .create_request(&app.driver, bid(delivery_id, dec!(12.00)))
        .await
        .unwrap();
    let second = app
        .services
        .delivery_requests
        .create_request(&app.second_driver, bid(delivery_id, dec!(10.00)))
        .await
        .unwrap();

    let rejected = app
        .services
        .delivery_requests
        .reject_request(&app.customer, first.id)
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);

    // The sibling bid and the delivery are untouched.
    let remaining = app
        .services
        .delivery_requests
        .list_for_customer(&app.customer)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second.id);

    let delivery = app.services.deliveries.get_delivery(delivery_id).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Pending);
    assert!(delivery.driver_id.is_none());

    // Rejection of a processed bid fails.
    let err = app
        .services
        .delivery_requests
        .reject_request(&app.customer, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}
