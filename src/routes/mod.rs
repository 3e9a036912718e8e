// Route definitions

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::{error::AppError, AppState};

// Declare submodules for different route groups
mod api;
mod pages;

pub const VISITOR_COOKIE: &str = "visitor_id";

/// The browser the request came from. Booking state is stored under this id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visitor(String);

impl Visitor {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Visitor>()
            .cloned()
            .ok_or_else(|| AppError::InternalServerError(anyhow::anyhow!("visitor middleware is not installed")))
    }
}

// Issues a visitor cookie to first-time browsers (and to ones presenting a malformed id)
async fn ensure_visitor(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let existing = jar
        .get(VISITOR_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok());

    let (id, jar) = match existing {
        Some(id) => (id, jar),
        None => {
            let id = Uuid::new_v4();
            tracing::debug!(visitor = %id, "New visitor");
            let cookie = Cookie::build((VISITOR_COOKIE, id.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            (id, jar.add(cookie))
        }
    };

    request.extensions_mut().insert(Visitor(id.to_string()));
    let response = next.run(request).await;
    (jar, response).into_response()
}

pub fn create_router(app_state: AppState) -> Router {
    // JSON and SSE views of the booking session
    let api_router = Router::new()
        .route("/session", get(api::session_status))
        .route("/session/countdown", get(api::session_countdown))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(pages::search_page))
        .route("/results", get(pages::results_page))
        .route("/results/select", post(pages::select_offer))
        .route("/booking-payment", get(pages::booking_payment_page).post(pages::submit_booking))
        .route("/booking-payment/back", post(pages::leave_booking))
        .route("/session/expire", post(pages::acknowledge_expiry))
        .route("/booking-confirmation", get(pages::booking_confirmation))
        .nest("/api", api_router)
        .with_state(app_state)
        .layer(middleware::from_fn(ensure_visitor))
}
