use std::{collections::HashMap, fmt, fs::File, net::SocketAddr};

use anyhow::Context;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use carpool::{
    auth::{self, AuthenticatedUser},
    config::AppConfig,
    db::init_pool,
    error::AppError,
    models::{carpool::Carpool, ride_request::RideRequest},
    routes::create_router,
    services::{directory, store::DocumentStore},
    state::AppState,
};
use chrono::Utc;
use cucumber::{given, then, when, World as _};
use tempfile::TempDir;
use tower::ServiceExt;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    users: HashMap<String, AuthenticatedUser>,
    request_id: Option<String>,
    carpool_id: Option<String>,
    last_failure: Option<AppError>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn user(&self, name: &str) -> &AuthenticatedUser {
        self.users
            .get(name)
            .unwrap_or_else(|| panic!("user {name} must be registered first"))
    }

    fn request_id(&self) -> String {
        self.request_id
            .clone()
            .expect("a ride request must exist first")
    }

    fn carpool_id(&self) -> String {
        self.carpool_id.clone().expect("a carpool must exist first")
    }

    fn record<T>(&mut self, result: Result<T, AppError>) {
        match result {
            Ok(_) => self.last_failure = None,
            Err(err) => self.last_failure = Some(err),
        }
    }

    async fn current_request(&self) -> RideRequest {
        self.app_state()
            .store
            .find(&self.request_id())
            .await
            .expect("load ride request")
    }

    async fn current_carpool(&self) -> Carpool {
        self.app_state()
            .store
            .find(&self.carpool_id())
            .await
            .expect("load carpool")
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let data_root = root.path().join("data");
        let spa_root = root.path().join("public");
        std::fs::create_dir_all(&data_root)?;
        std::fs::create_dir_all(&spa_root)?;

        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_root: data_root.clone(),
            spa_root,
            session_ttl_hours: 24,
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let store = DocumentStore::new(config.data_root.clone());
        store.ensure_structure().await?;

        let app = AppState::new(config, db, store);
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.users.clear();
    world.request_id = None;
    world.carpool_id = None;
    world.last_failure = None;
}

#[given(
    regex = r#"^a registered user \"([^\"]+)\" with email \"([^\"]+)\" and password \"([^\"]+)\"$"#
)]
async fn given_registered_user(world: &mut AppWorld, name: String, email: String, password: String) {
    let created = auth::register_user(world.app_state(), &name, &email, &password)
        .await
        .expect("register user");
    world.users.insert(name, created);
}

#[when(
    regex = r#"^I register a user \"([^\"]+)\" with email \"([^\"]+)\" and password \"([^\"]+)\"$"#
)]
async fn when_register_user(world: &mut AppWorld, name: String, email: String, password: String) {
    match auth::register_user(world.app_state(), &name, &email, &password).await {
        Ok(created) => {
            world.users.insert(name, created);
            world.last_failure = None;
        }
        Err(err) => world.last_failure = Some(err),
    }
}

#[then(regex = r#"^I can authenticate with email \"([^\"]+)\" and password \"([^\"]+)\"$"#)]
async fn then_can_authenticate(world: &mut AppWorld, email: String, password: String) {
    let authed = auth::authenticate_user(world.app_state(), &email, &password)
        .await
        .expect("authentication");
    assert_eq!(authed.email, email);
}

#[then(regex = r#"^authenticating with email \"([^\"]+)\" and password \"([^\"]+)\" is rejected$"#)]
async fn then_authentication_rejected(world: &mut AppWorld, email: String, password: String) {
    let result = auth::authenticate_user(world.app_state(), &email, &password).await;
    assert!(
        matches!(result, Err(AppError::Unauthorized)),
        "expected unauthorized, got {result:?}"
    );
}

#[then(regex = r#"^a session token issued for \"([^\"]+)\" resolves back to them$"#)]
async fn then_session_round_trip(world: &mut AppWorld, name: String) {
    let user_id = world.user(&name).id;
    let token = auth::create_session(world.app_state(), user_id)
        .await
        .expect("create session");
    let resolved = auth::resolve_token(world.app_state(), &token)
        .await
        .expect("resolve token")
        .expect("token should resolve to a user");
    assert_eq!(resolved.id, user_id);

    auth::destroy_session(world.app_state(), &token)
        .await
        .expect("destroy session");
    let gone = auth::resolve_token(world.app_state(), &token)
        .await
        .expect("resolve token");
    assert!(gone.is_none(), "destroyed session should not resolve");
}

#[given(regex = r#"^\"([^\"]+)\" created a ride request for \"([^\"]+)\"$"#)]
async fn given_ride_request(world: &mut AppWorld, name: String, event: String) {
    let requester = world.user(&name).uuid.clone();
    let request = RideRequest::new(
        event,
        Utc::now(),
        "Home rink".to_string(),
        "Away rink".to_string(),
        &requester,
    )
    .expect("valid ride request");
    let saved = world
        .app_state()
        .store
        .insert(request)
        .await
        .expect("insert ride request");
    world.request_id = Some(saved.id);
}

#[when(regex = r#"^\"([^\"]+)\" accepts the ride request$"#)]
async fn when_accept(world: &mut AppWorld, name: String) {
    let caller = world.user(&name).uuid.clone();
    let id = world.request_id();
    let result = world
        .app_state()
        .store
        .update(&id, |request: &mut RideRequest| request.accept(&caller))
        .await;
    world.record(result);
}

#[when(regex = r#"^\"([^\"]+)\" unaccepts the ride request$"#)]
async fn when_unaccept(world: &mut AppWorld, name: String) {
    let caller = world.user(&name).uuid.clone();
    let id = world.request_id();
    let result = world
        .app_state()
        .store
        .update(&id, |request: &mut RideRequest| request.unaccept(&caller))
        .await;
    world.record(result);
}

#[when(regex = r#"^\"([^\"]+)\" cancels the ride request$"#)]
async fn when_cancel(world: &mut AppWorld, name: String) {
    let caller = world.user(&name).uuid.clone();
    let id = world.request_id();
    let result = world
        .app_state()
        .store
        .update(&id, |request: &mut RideRequest| request.cancel(&caller))
        .await;
    world.record(result);
}

#[when(regex = r#"^\"([^\"]+)\" adds the note \"([^\"]*)\" to the ride request$"#)]
async fn when_add_note(world: &mut AppWorld, name: String, content: String) {
    let caller = world.user(&name).uuid.clone();
    let id = world.request_id();
    let result = world
        .app_state()
        .store
        .update(&id, |request: &mut RideRequest| {
            request.add_note(&caller, &content)
        })
        .await;
    world.record(result);
}

#[when(regex = r#"^\"([^\"]+)\" fulfills the ride request$"#)]
async fn when_fulfill(world: &mut AppWorld, name: String) {
    let driver = world.user(&name).uuid.clone();
    let id = world.request_id();
    let state = world.app_state().clone();
    let result = async {
        let updated = state
            .store
            .update(&id, |request: &mut RideRequest| request.fulfill())
            .await?;
        state
            .store
            .insert(Carpool::from_request(&updated, &driver))
            .await
    }
    .await;
    if let Ok(carpool) = &result {
        world.carpool_id = Some(carpool.id.clone());
    }
    world.record(result);
}

#[then(regex = r#"^the ride request has status \"([^\"]+)\"$"#)]
async fn then_request_status(world: &mut AppWorld, expected: String) {
    let request = world.current_request().await;
    assert_eq!(request.status.as_str(), expected);
}

#[then(regex = r#"^the ride request is accepted by \"([^\"]+)\"$"#)]
async fn then_request_accepted_by(world: &mut AppWorld, name: String) {
    let expected = world.user(&name).uuid.clone();
    let request = world.current_request().await;
    assert_eq!(request.accepted_by.as_deref(), Some(expected.as_str()));
}

#[then("the ride request has no accepter")]
async fn then_request_has_no_accepter(world: &mut AppWorld) {
    let request = world.current_request().await;
    assert!(request.accepted_by.is_none());
}

#[then(regex = r#"^the ride request has (\d+) notes?$"#)]
async fn then_request_note_count(world: &mut AppWorld, expected: usize) {
    let request = world.current_request().await;
    assert_eq!(request.notes.len(), expected);
}

#[then(regex = r#"^the latest note is by \"([^\"]+)\" and reads \"([^\"]+)\"$"#)]
async fn then_latest_note(world: &mut AppWorld, name: String, content: String) {
    let author = world.user(&name).uuid.clone();
    let request = world.current_request().await;
    let latest = request.notes.last().expect("at least one note expected");
    assert_eq!(latest.author, author);
    assert_eq!(latest.content, content);
}

#[then("the notes are ordered oldest first")]
async fn then_notes_ordered(world: &mut AppWorld) {
    let request = world.current_request().await;
    for pair in request.notes.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }
}

#[then(regex = r#"^the operation fails with \"([^\"]+)\"$"#)]
async fn then_operation_fails(world: &mut AppWorld, kind: String) {
    let err = world
        .last_failure
        .as_ref()
        .expect("expected the previous operation to fail");
    let matched = match kind.as_str() {
        "forbidden" => matches!(err, AppError::Forbidden),
        "conflict" => matches!(err, AppError::Conflict(_)),
        "not found" => matches!(err, AppError::NotFound),
        "validation" => matches!(err, AppError::BadRequest(_)),
        "unauthorized" => matches!(err, AppError::Unauthorized),
        other => panic!("unknown failure kind: {other}"),
    };
    assert!(matched, "expected {kind}, got {err:?}");
}

#[then("the operation succeeds")]
async fn then_operation_succeeds(world: &mut AppWorld) {
    assert!(
        world.last_failure.is_none(),
        "expected success, got {:?}",
        world.last_failure
    );
}

#[given(regex = r#"^\"([^\"]+)\" created a carpool for \"([^\"]+)\"$"#)]
async fn given_carpool(world: &mut AppWorld, name: String, event: String) {
    let driver = world.user(&name).uuid.clone();
    let carpool = Carpool::new(
        event,
        Utc::now(),
        "Home rink".to_string(),
        "Away rink".to_string(),
        &driver,
    )
    .expect("valid carpool");
    let saved = world
        .app_state()
        .store
        .insert(carpool)
        .await
        .expect("insert carpool");
    world.carpool_id = Some(saved.id);
}

#[when(regex = r#"^\"([^\"]+)\" joins the carpool$"#)]
async fn when_join_carpool(world: &mut AppWorld, name: String) {
    let caller = world.user(&name).uuid.clone();
    let id = world.carpool_id();
    let result = world
        .app_state()
        .store
        .update(&id, |carpool: &mut Carpool| carpool.join(&caller))
        .await;
    world.record(result);
}

#[when(regex = r#"^\"([^\"]+)\" leaves the carpool$"#)]
async fn when_leave_carpool(world: &mut AppWorld, name: String) {
    let caller = world.user(&name).uuid.clone();
    let id = world.carpool_id();
    let result = world
        .app_state()
        .store
        .update(&id, |carpool: &mut Carpool| carpool.leave(&caller))
        .await;
    world.record(result);
}

#[then(regex = r#"^the carpool has (\d+) passengers?$"#)]
async fn then_carpool_passenger_count(world: &mut AppWorld, expected: usize) {
    let carpool = world.current_carpool().await;
    assert_eq!(carpool.passengers.len(), expected);
}

#[then(regex = r#"^the carpool passengers include \"([^\"]+)\"$"#)]
async fn then_carpool_passengers_include(world: &mut AppWorld, name: String) {
    let expected = world.user(&name).uuid.clone();
    let carpool = world.current_carpool().await;
    assert!(
        carpool.passengers.iter().any(|p| p == &expected),
        "expected {name} among passengers"
    );
}

#[then(regex = r#"^the carpool copies the ride request itinerary for \"([^\"]+)\"$"#)]
async fn then_carpool_copies_itinerary(world: &mut AppWorld, event: String) {
    let request = world.current_request().await;
    let carpool = world.current_carpool().await;
    assert_eq!(carpool.event, event);
    assert_eq!(carpool.date, request.date);
    assert_eq!(carpool.start_location, request.start_location);
    assert_eq!(carpool.end_location, request.end_location);
    assert!(carpool.passengers.is_empty());
}

#[then(regex = r#"^the carpool driver is \"([^\"]+)\"$"#)]
async fn then_carpool_driver(world: &mut AppWorld, name: String) {
    let expected = world.user(&name).uuid.clone();
    let carpool = world.current_carpool().await;
    assert_eq!(carpool.driver, expected);
}

#[then(regex = r#"^the accepter resolves to the display name \"([^\"]+)\"$"#)]
async fn then_accepter_display_name(world: &mut AppWorld, expected: String) {
    let request = world.current_request().await;
    let accepter = request.accepted_by.expect("request should have an accepter");
    let refs = directory::resolve_refs(&world.app_state().db, [accepter.as_str()])
        .await
        .expect("resolve user refs");
    let user_ref = refs.get(&accepter).expect("accepter should resolve");
    assert_eq!(user_ref.name, expected);
}

#[then("the ride request listing contains it")]
async fn then_listing_contains_request(world: &mut AppWorld) {
    let id = world.request_id();
    let requests: Vec<RideRequest> = world
        .app_state()
        .store
        .list()
        .await
        .expect("list ride requests");
    assert!(requests.iter().any(|r| r.id == id));
}

#[then("an anonymous request to list ride requests is rejected over HTTP")]
async fn then_anonymous_http_rejected(world: &mut AppWorld) {
    let router = create_router(world.app_state().clone());
    let request = Request::builder()
        .uri("/api/ride-requests")
        .body(Body::empty())
        .expect("build request");
    let response = router.oneshot(request).await.expect("router response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
