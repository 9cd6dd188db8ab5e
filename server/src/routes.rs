use actix_web::http::header::CACHE_CONTROL;
use actix_web::web::{self, Data, Form, Json, Path};
use actix_web::{HttpRequest, HttpResponse};
use burnlink_shared::{
    CreateSecretRequest, CreateSecretResponse, ErrorResponse, RevealedSecret, SecretStatus,
};
use burnlink_srv::link::LinkBuilder;
use burnlink_srv::{ProtocolError, Published, SecretProtocol, SecretStore};
use chrono::{TimeDelta, Utc};
use log::{debug, error, info};
use serde::Deserialize;

use crate::views;

pub struct AppState<S> {
    pub protocol: SecretProtocol<S>,
    pub links: LinkBuilder,
}

/// Form posted by the index page.
#[derive(Deserialize)]
struct SetSecretForm {
    password: String,
    ttl: String,
}

pub fn configure<S: SecretStore>(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(health::<S>))
        .service(
            web::scope("/api/secrets")
                .route("", web::post().to(api_create_secret::<S>))
                .route("/{token}", web::get().to(api_peek_secret::<S>))
                .route("/{token}/reveal", web::post().to(api_reveal_secret::<S>)),
        )
        .route("/", web::get().to(index::<S>))
        .route("/", web::post().to(create_secret::<S>))
        .route("/{token}", web::get().to(preview_secret::<S>))
        .route("/{token}", web::post().to(reveal_secret::<S>));
}

async fn health<S: SecretStore>(state: Data<AppState<S>>) -> HttpResponse {
    match state.protocol.health_check().await {
        Ok(()) => HttpResponse::Ok().body("ok"),
        Err(_) => HttpResponse::ServiceUnavailable().body("store unreachable"),
    }
}

async fn index<S: SecretStore>(state: Data<AppState<S>>) -> HttpResponse {
    views::index(state.protocol.max_size(), None)
}

async fn create_secret<S: SecretStore>(
    req: HttpRequest,
    state: Data<AppState<S>>,
    form: Form<SetSecretForm>,
) -> HttpResponse {
    let form = form.into_inner();

    match state.protocol.publish(&form.password, &form.ttl).await {
        Ok(published) => {
            let link = state
                .links
                .build(req.connection_info().host(), &published.token);
            info!("Created secret expiring after one {}", published.ttl);
            views::confirm(&link, published.ttl)
        }
        Err(ProtocolError::InvalidRequest(message)) => {
            views::index(state.protocol.max_size(), Some(message.as_str()))
        }
        Err(e) => {
            error!("Failed to create secret: {e}");
            views::server_error()
        }
    }
}

async fn preview_secret<S: SecretStore>(
    token: Path<String>,
    state: Data<AppState<S>>,
) -> HttpResponse {
    match state.protocol.peek(&token.into_inner()).await {
        Ok(true) => views::preview(),
        Ok(false) => views::expired(),
        Err(e) => html_error(e),
    }
}

async fn reveal_secret<S: SecretStore>(
    token: Path<String>,
    state: Data<AppState<S>>,
) -> HttpResponse {
    match state.protocol.consume(&token.into_inner()).await {
        Ok(Some(secret)) => views::password(&secret),
        Ok(None) => views::expired(),
        Err(e) => html_error(e),
    }
}

async fn api_create_secret<S: SecretStore>(
    req: HttpRequest,
    state: Data<AppState<S>>,
    payload: Json<CreateSecretRequest>,
) -> HttpResponse {
    let payload = payload.into_inner();

    match state.protocol.publish(&payload.plaintext, &payload.ttl).await {
        Ok(Published { token, ttl }) => {
            let link = state.links.build(req.connection_info().host(), &token);
            info!("Created secret expiring after one {ttl}");
            HttpResponse::Ok().json(CreateSecretResponse {
                link,
                token,
                expires_at: Utc::now() + TimeDelta::seconds(ttl.as_secs() as i64),
            })
        }
        Err(e) => api_error(e),
    }
}

async fn api_peek_secret<S: SecretStore>(
    token: Path<String>,
    state: Data<AppState<S>>,
) -> HttpResponse {
    match state.protocol.peek(&token.into_inner()).await {
        Ok(true) => HttpResponse::Ok().json(SecretStatus { exists: true }),
        Ok(false) => not_found(),
        Err(e) => api_error(e),
    }
}

async fn api_reveal_secret<S: SecretStore>(
    token: Path<String>,
    state: Data<AppState<S>>,
) -> HttpResponse {
    match state.protocol.consume(&token.into_inner()).await {
        Ok(Some(secret)) => HttpResponse::Ok()
            .insert_header((CACHE_CONTROL, "no-store"))
            .json(RevealedSecret {
                plaintext: secret.as_str().to_string(),
            }),
        Ok(None) => not_found(),
        Err(e) => api_error(e),
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(SecretStatus { exists: false })
}

/// Malformed tokens render exactly like missing secrets.
fn html_error(e: ProtocolError) -> HttpResponse {
    match e {
        ProtocolError::InvalidToken(e) => {
            debug!("Rejected token: {e}");
            views::expired()
        }
        ProtocolError::InvalidRequest(_) => views::expired(),
        e => {
            error!("Secret lookup failed: {e}");
            views::server_error()
        }
    }
}

fn api_error(e: ProtocolError) -> HttpResponse {
    match e {
        ProtocolError::InvalidRequest(message) => {
            HttpResponse::BadRequest().json(ErrorResponse::new(message))
        }
        ProtocolError::InvalidToken(e) => {
            debug!("Rejected token: {e}");
            not_found()
        }
        e => {
            error!("Secret request failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse::new("internal server error"))
        }
    }
}
