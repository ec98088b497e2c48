//! Roster Backend - Rust-powered user directory service
//!
//! Process entry point: wires together config, database, schema sync, and
//! the axum server. The API itself lives behind /graphql.

use std::net::SocketAddr;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Router;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster::config::Config;
use roster::db::Database;
use roster::{AppState, api, graphql};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Roster Backend");
    tracing::info!(port = config.port, "Configuration loaded");

    let db = Database::connect(&config.database_url).await?;
    tracing::info!(path = %config.database_url, "Database connected");

    // Bring tables in line with the entity definitions
    let sync_result = db.sync_schema().await;
    if !sync_result.tables_created.is_empty() {
        tracing::info!(tables = ?sync_result.tables_created, "Created tables");
    }
    if !sync_result.columns_added.is_empty() {
        tracing::info!(columns = ?sync_result.columns_added, "Added columns");
    }
    for err in &sync_result.errors {
        tracing::warn!(error = %err, "Schema sync error");
    }
    tracing::info!("Schema in sync with entity definitions");

    let schema = graphql::build_schema(db.clone());
    tracing::info!("GraphQL schema assembled");

    let state = AppState {
        config: config.clone(),
        db,
        schema,
    };

    // GraphQL carries the whole API; the REST routes are just the probes
    let app = Router::new()
        .merge(api::health::router())
        .route("/graphql", get(graphiql).post(graphql_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);
    tracing::info!("GraphiQL available at {}/graphql", config.public_base_url());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Executes a GraphQL request against the schema.
async fn graphql_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    state.schema.execute(req.into_inner()).await.into()
}

/// Serves the GraphiQL playground to browsers.
async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    // Browsers ask for HTML; API clients get a JSON hint instead
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(GraphiQLSource::build().endpoint("/graphql").finish())
            .into_response()
    } else {
        (
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GraphQL queries go over POST with Content-Type: application/json; GET only serves the GraphiQL playground"
            })),
        )
            .into_response()
    }
}
