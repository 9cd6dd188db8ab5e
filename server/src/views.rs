use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::{CACHE_CONTROL, REFERRER_POLICY};
use askama::Template;
use burnlink_core::Ttl;
use log::error;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage<'a> {
    ttls: &'a [Ttl],
    max_size: usize,
    error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "confirm.html")]
struct ConfirmPage<'a> {
    link: &'a str,
    ttl: Ttl,
}

#[derive(Template)]
#[template(path = "preview.html")]
struct PreviewPage;

#[derive(Template)]
#[template(path = "password.html")]
struct PasswordPage<'a> {
    secret: &'a str,
}

#[derive(Template)]
#[template(path = "expired.html")]
struct ExpiredPage;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage;

pub fn index(max_size: usize, error: Option<&str>) -> HttpResponse {
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    render(
        &IndexPage {
            ttls: &Ttl::ALL,
            max_size,
            error,
        },
        status,
    )
}

pub fn confirm(link: &str, ttl: Ttl) -> HttpResponse {
    render(&ConfirmPage { link, ttl }, StatusCode::OK)
}

pub fn preview() -> HttpResponse {
    render(&PreviewPage, StatusCode::OK)
}

pub fn password(secret: &str) -> HttpResponse {
    render(&PasswordPage { secret }, StatusCode::OK)
}

/// Shared by "never existed", "expired", "already viewed" and "malformed link".
pub fn expired() -> HttpResponse {
    render(&ExpiredPage, StatusCode::NOT_FOUND)
}

pub fn server_error() -> HttpResponse {
    render(&ErrorPage, StatusCode::INTERNAL_SERVER_ERROR)
}

fn render(page: &impl Template, status: StatusCode) -> HttpResponse {
    match page.render() {
        Ok(body) => HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .insert_header((CACHE_CONTROL, "no-store"))
            .insert_header((REFERRER_POLICY, "no-referrer"))
            .body(body),
        Err(e) => {
            error!("Failed to render template: {e}");
            HttpResponse::InternalServerError().body("internal server error")
        }
    }
}
