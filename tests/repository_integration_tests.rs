use chrono::{Duration, Utc};
use service_portal::{
    auth::Role,
    models::NewSession,
    repository::{PostgresRepository, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the database pool for one test.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Inserts a user with a unique email and returns `(id, email)`.
async fn create_test_user(pool: &PgPool, role: &str, company_id: Option<Uuid>) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let email = format!("{role}-{id}@portal.test");
    let hash = bcrypt::hash("integration-password", 4).unwrap();

    sqlx::query(
        "INSERT INTO users (id, company_id, email, password_hash, role) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(company_id)
    .bind(&email)
    .bind(hash)
    .bind(role)
    .execute(pool)
    .await
    .expect("Failed to insert test user");

    (id, email)
}

fn new_session(user_id: Uuid, ttl: Duration) -> NewSession {
    NewSession {
        token: format!("token-{}", Uuid::new_v4()),
        user_id,
        expires_at: Utc::now() + ttl,
    }
}

// --- Session Records ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_session_lookup_joins_user_role() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let company = Uuid::new_v4();
    let (user_id, _) = create_test_user(&ctx.pool, "technician", Some(company)).await;

    let session = new_session(user_id, Duration::hours(1));
    repo.create_session(session.clone()).await.unwrap();

    let record = repo.lookup_session(&session.token).await.unwrap().unwrap();
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.role, Role::Technician);
    assert_eq!(record.company_id, Some(company));
    // Postgres keeps microseconds.
    assert_eq!(
        record.expires_at.timestamp_micros(),
        session.expires_at.timestamp_micros()
    );
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_expired_session_is_still_returned() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let (user_id, _) = create_test_user(&ctx.pool, "customer", Some(Uuid::new_v4())).await;

    let session = new_session(user_id, -Duration::hours(1));
    repo.create_session(session.clone()).await.unwrap();

    let record = repo.lookup_session(&session.token).await.unwrap().unwrap();
    assert!(record.expires_at < Utc::now());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_token_lookup_is_none() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    assert!(repo.lookup_session("no-such-token").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_session_and_revoke_all() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let (user_id, _) = create_test_user(&ctx.pool, "admin", Some(Uuid::new_v4())).await;

    let first = new_session(user_id, Duration::hours(1));
    let second = new_session(user_id, Duration::hours(1));
    let third = new_session(user_id, Duration::hours(1));
    for session in [&first, &second, &third] {
        repo.create_session(session.clone()).await.unwrap();
    }

    assert!(repo.delete_session(&first.token).await.unwrap());
    assert!(!repo.delete_session(&first.token).await.unwrap());

    assert_eq!(repo.delete_user_sessions(user_id).await.unwrap(), 2);
    assert!(repo.lookup_session(&second.token).await.unwrap().is_none());
}

// --- Users ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_find_credentials_by_email_ignores_case() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let (user_id, email) = create_test_user(&ctx.pool, "superadmin", None).await;

    let found = repo
        .find_credentials_by_email(&email.to_uppercase())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.user.id, user_id);
    assert_eq!(found.user.role, Role::SuperAdmin);
    assert_eq!(found.user.company_id, None);
    assert!(bcrypt::verify("integration-password", &found.password_hash).unwrap());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_password_and_get_user() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let (user_id, email) = create_test_user(&ctx.pool, "dispatcher", Some(Uuid::new_v4())).await;

    assert!(repo.update_password(user_id, "new-hash").await.unwrap());
    assert!(!repo.update_password(Uuid::new_v4(), "new-hash").await.unwrap());

    let credentials = repo.find_credentials_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(credentials.password_hash, "new-hash");

    let user = repo.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.email, email);
    assert_eq!(user.role, Role::from("dispatcher"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_ping() {
    let ctx = DbTestContext::setup().await;
    ctx.repository().ping().await.unwrap();
}
