//! Example: A small pet store behind the problem pipeline
//!
//! Every response is negotiated: try
//!
//! ```text
//! curl -i localhost:8080/pets/1 -H 'Accept: application/json'
//! curl -i localhost:8080/pets/9 -H 'Accept: application/json'
//! curl -i localhost:8080/pets/1 -H 'Accept: text/html'
//! curl -i -X POST localhost:8080/pets -H 'Accept: application/json' -H 'Content-Type: text/plain'
//! curl -i localhost:8080/boom -H 'Accept: application/json'
//! ```
//!
//! Set `API_PROBLEM_PROBLEMS__DEBUG=true` to see failure details in 500 bodies.
//!
//! Run with: cargo run --example negotiated-api

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use api_problem::prelude::*;
use axum::body::Bytes;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tower::BoxError;
use tower_http::trace::TraceLayer;

type HandlerResult = std::result::Result<Response, Failure>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pet {
    id: u32,
    name: String,
    #[serde(default)]
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewPet {
    name: String,
    tag: Option<String>,
}

#[derive(Clone)]
struct AppState {
    responses: ResponseBuilder,
    pets: Arc<Mutex<BTreeMap<u32, Pet>>>,
}

impl AppState {
    fn lookup(&self, id: u32) -> std::result::Result<Pet, Failure> {
        let pets = self
            .pets
            .lock()
            .map_err(|_| Failure::msg("pet store lock poisoned"))?;
        pets.get(&id).cloned().ok_or_else(|| {
            Problem::not_found()
                .with_detail(format!("Pet {id} does not exist"))
                .with_instance(format!("/pets/{id}"))
                .into()
        })
    }
}

async fn list_pets(State(state): State<AppState>, Negotiated(outcome): Negotiated) -> HandlerResult {
    let pets: Vec<Pet> = state
        .pets
        .lock()
        .map_err(|_| Failure::msg("pet store lock poisoned"))?
        .values()
        .cloned()
        .collect();
    Ok(state.responses.success(&pets, outcome.accept_media_type())?)
}

async fn show_pet(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Negotiated(outcome): Negotiated,
) -> HandlerResult {
    let pet = state.lookup(id)?;
    Ok(state.responses.success(&pet, outcome.accept_media_type())?)
}

async fn create_pet(
    State(state): State<AppState>,
    Negotiated(outcome): Negotiated,
    body: Bytes,
) -> HandlerResult {
    let new_pet: NewPet = serde_json::from_slice(&body).map_err(|e| {
        Problem::bad_request(vec![InvalidParameter::new("body", e.to_string())])
    })?;

    if new_pet.name.trim().is_empty() {
        return Err(Problem::unprocessable_entity(vec![InvalidParameter::new(
            "name",
            "must not be empty",
        )])
        .into());
    }

    let mut pets = state
        .pets
        .lock()
        .map_err(|_| Failure::msg("pet store lock poisoned"))?;
    let id = pets.keys().next_back().map_or(1, |id| id + 1);
    let pet = Pet {
        id,
        name: new_pet.name,
        tag: new_pet.tag,
    };
    pets.insert(id, pet.clone());

    Ok(state.responses.success_with(
        &pet,
        outcome.accept_media_type(),
        StatusCode::CREATED,
        None,
    )?)
}

async fn delete_pet(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Negotiated(outcome): Negotiated,
) -> HandlerResult {
    state.lookup(id)?;
    state
        .pets
        .lock()
        .map_err(|_| Failure::msg("pet store lock poisoned"))?
        .remove(&id);
    Ok(state.responses.empty(outcome.accept_media_type())?)
}

/// Old route kept for clients that have not moved yet
async fn legacy_pet(State(state): State<AppState>, Path(id): Path<u32>) -> HandlerResult {
    Ok(state
        .responses
        .redirect_with_status(&format!("/pets/{id}"), StatusCode::PERMANENT_REDIRECT)?)
}

async fn boom() -> HandlerResult {
    let cause = std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "database refused connection",
    );
    let error = anyhow::Error::new(cause).context("Loading inventory failed");
    Err(Failure::from_boxed(error.into()))
}

async fn panics() -> HandlerResult {
    panic!("handler panicked while rendering");
}

async fn escalated(error: BoxError) -> StatusCode {
    tracing::error!(error = %error, "Failure escaped the problem pipeline");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_for_service("negotiated-api")?;
    init_tracing(&config)?;

    let pipeline = ProblemPipeline::from_config(&config)?;

    let mut pets = BTreeMap::new();
    pets.insert(
        1,
        Pet {
            id: 1,
            name: "Rex".to_string(),
            tag: Some("dog".to_string()),
        },
    );
    let state = AppState {
        responses: pipeline.responses().clone(),
        pets: Arc::new(Mutex::new(pets)),
    };

    let app = Router::new()
        .route("/pets", get(list_pets).post(create_pet))
        .route("/pets/{id}", get(show_pet).delete(delete_pet))
        .route("/legacy/pets/{id}", get(legacy_pet))
        .route("/boom", get(boom))
        .route("/panic", get(panics))
        .layer(
            tower::ServiceBuilder::new()
                .layer(HandleErrorLayer::new(escalated))
                .layer(pipeline.layers()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
