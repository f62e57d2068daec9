//! Shared harness for the lifecycle integration tests: an in-memory SQLite
//! database with the full schema, seeded marketplace accounts, and the
//! services wired against a recording storage stub. `router()` exposes the
//! same stack behind the full axum surface for handler-level tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database};
use tokio::sync::mpsc;
use uuid::Uuid;

use cropmate_api::auth::{AuthConfig, AuthService, AuthUser, UserRole};
use cropmate_api::config::AppConfig;
use cropmate_api::db::{run_migrations, DbPool};
use cropmate_api::entities::{crop, user};
use cropmate_api::events::{Event, EventSender};
use cropmate_api::handlers::AppServices;
use cropmate_api::storage::{InMemoryObjectStorage, UploadFile};
use cropmate_api::{api_v1_routes, AppState};

const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub storage: Arc<InMemoryObjectStorage>,
    pub auth_service: Arc<AuthService>,
    pub farmer: AuthUser,
    pub customer: AuthUser,
    pub driver: AuthUser,
    pub second_driver: AuthUser,
    pub third_driver: AuthUser,
    pub crop_id: Uuid,
    event_sender: EventSender,
    // Keeps the event channel open so sends during tests do not fail.
    _event_rx: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        // A single connection so every query sees the same in-memory database.
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .sqlx_logging(false);

        let db = Database::connect(opt)
            .await
            .expect("failed to open in-memory database");
        run_migrations(&db).await.expect("migrations failed");
        let db = Arc::new(db);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);

        let storage = InMemoryObjectStorage::new();
        let services = AppServices::new(
            db.clone(),
            storage.clone(),
            Arc::new(event_sender.clone()),
        );

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            TEST_JWT_SECRET.into(),
            "cropmate-api".into(),
            "cropmate".into(),
            Duration::from_secs(3600),
        )));

        let farmer = seed_user(&db, "Ana Reyes", "ana@farm.test", UserRole::Farmer).await;
        let customer = seed_user(&db, "Ben Cruz", "ben@mail.test", UserRole::Customer).await;
        let driver = seed_user(&db, "Caloy Dizon", "caloy@mail.test", UserRole::Driver).await;
        let second_driver = seed_user(&db, "Dina Ramos", "dina@mail.test", UserRole::Driver).await;
        let third_driver = seed_user(&db, "Ely Santos", "ely@mail.test", UserRole::Driver).await;

        let crop_id = seed_crop(&db, farmer.user_id, dec!(10.50)).await;

        Self {
            db,
            services,
            storage,
            auth_service,
            farmer,
            customer,
            driver,
            second_driver,
            third_driver,
            crop_id,
            event_sender,
            _event_rx: event_rx,
        }
    }

    /// The full `/api/v1` router over this harness's state.
    pub fn router(&self) -> Router {
        let state = AppState {
            db: self.db.clone(),
            config: AppConfig::new(
                "sqlite::memory:".into(),
                TEST_JWT_SECRET.into(),
                3600,
                "127.0.0.1".into(),
                0,
                "test".into(),
            ),
            event_sender: self.event_sender.clone(),
            auth_service: self.auth_service.clone(),
            services: self.services.clone(),
        };

        Router::new()
            .nest("/api/v1", api_v1_routes())
            .with_state(state)
    }

    /// A valid bearer token for the given seeded account.
    pub fn token_for(&self, user: &AuthUser) -> String {
        self.auth_service
            .issue_token(user.user_id, user.role)
            .expect("failed to issue test token")
    }
}

async fn seed_user(db: &DbPool, name: &str, email: &str, role: UserRole) -> AuthUser {
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        role: Set(role),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("failed to seed user");

    AuthUser {
        user_id: id,
        role,
        token_id: format!("test-{}", email),
    }
}

pub async fn seed_crop(db: &DbPool, farmer_id: Uuid, price_per_unit: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    crop::ActiveModel {
        id: Set(id),
        name: Set("Tomatoes".to_string()),
        description: Set(Some("Vine-ripened".to_string())),
        price_per_unit: Set(price_per_unit),
        available_quantity: Set(500),
        unit: Set("kg".to_string()),
        image_url: Set(None),
        farmer_id: Set(farmer_id),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("failed to seed crop");
    id
}

pub fn proof_file(name: &str) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}
