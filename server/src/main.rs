use std::process::ExitCode;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::{Logger, Next, from_fn};
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use burnlink_core::token::TOKEN_SEPARATOR;
use burnlink_srv::config::{Config, StoreConfig};
use burnlink_srv::db::get_connection;
use burnlink_srv::link::LinkBuilder;
use burnlink_srv::{MemoryStore, SecretProtocol, SecretStore};
use log::{LevelFilter, error, info, warn};
use uuid::Uuid;

use crate::routes::AppState;

mod routes;
mod views;

/// Request log line. The path goes through [`redact_path`] so keys never
/// reach the log.
const LOG_FORMAT: &str = r#"[%{x-request-id}i] %a "%{route}xi" %s %b %Dms"#;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 64;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    pretty_env_logger::formatted_timed_builder()
        .format_timestamp_millis()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match &config.store {
        StoreConfig::Memory => {
            warn!("Using the in-memory store. Secrets will not survive a restart");
            serve(MemoryStore::new(), &config).await
        }
        StoreConfig::Postgres(db) => match get_connection(db).await {
            Ok(handler) => serve(handler, &config).await,
            Err(e) => {
                error!("Failed to connect to the database: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    match result {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve<S: SecretStore>(store: S, config: &Config) -> std::io::Result<()> {
    let protocol = SecretProtocol::from_config(store, config);

    // Refuse to take traffic we could not serve.
    if let Err(e) = protocol.health_check().await {
        return Err(std::io::Error::other(format!("store is unreachable: {e}")));
    }

    let state = Data::new(AppState {
        protocol,
        links: LinkBuilder::new(config.link.clone()),
    });

    let body_limit = body_limit(config.max_size);

    info!("Starting server on {}:{}", config.address, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::FormConfig::default().limit(body_limit))
            .app_data(web::JsonConfig::default().limit(body_limit))
            .wrap(
                Logger::new(LOG_FORMAT)
                    .custom_request_replace("route", |req: &ServiceRequest| {
                        format!("{} {}", req.method(), redact_path(req.path()))
                    }),
            )
            .wrap(from_fn(request_id))
            .configure(routes::configure::<S>)
    })
    .bind((config.address.as_str(), config.port))?
    .run()
    .await?;

    info!("Shutting down, closing store connections");
    Ok(())
}

/// Form encoding can triple the size of the secret.
fn body_limit(max_size: usize) -> usize {
    max_size.saturating_mul(3).saturating_add(1024)
}

/// Tags every request with an id for the request log and echoes it back.
/// A well formed id sent by a proxy is kept, anything else is replaced.
async fn request_id(
    mut req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let id = tag_request(&mut req);
    let mut res = next.call(req).await?;
    res.headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), id);
    Ok(res)
}

fn tag_request(req: &mut ServiceRequest) -> HeaderValue {
    let supplied = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|v| is_plain_request_id(v.as_bytes()))
        .cloned();

    let id = match supplied {
        Some(id) => id,
        None => {
            let generated = Uuid::new_v4().simple().to_string();
            HeaderValue::from_str(&generated).unwrap_or_else(|_| HeaderValue::from_static("-"))
        }
    };

    req.headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), id.clone());
    id
}

fn is_plain_request_id(raw: &[u8]) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_REQUEST_ID_LEN
        && raw
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Cuts everything after the token separator, plain or percent-encoded.
fn redact_path(path: &str) -> String {
    let cut = path
        .find(TOKEN_SEPARATOR)
        .or_else(|| path.to_ascii_uppercase().find("%7E"));

    match cut {
        Some(i) => {
            let tail = &path[i..];
            let rest = tail.find('/').map_or("", |j| &tail[j..]);
            format!("{}{TOKEN_SEPARATOR}<redacted>{rest}", &path[..i])
        }
        None => path.to_string(),
    }
}
