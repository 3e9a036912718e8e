// Client for the booking backend. Every endpoint takes a form-encoded POST and answers with JSON.
// Raw response shapes stay private to this module; callers only see validated results.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    criteria::SearchCriteria,
    models::{BookingConfirmation, BreakdownEntry, Evaluation, Hotel, HotelSearchPage, RoomBreakdown},
    pricing::BreakdownOutcome,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned an unreadable response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint} rejected the request: {message}")]
    Rejected { endpoint: &'static str, message: String },
}

/// Identifies the offer a guest-details screen is working on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferRef {
    pub hotel_search_code: String,
    pub hotel_code: String,
    pub check_in: String,
}

impl OfferRef {
    fn form(&self) -> Vec<(String, String)> {
        vec![
            ("hotelSearchCode".to_string(), self.hotel_search_code.clone()),
            ("checkIn".to_string(), self.check_in.clone()),
            ("hotelCode".to_string(), self.hotel_code.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVerification {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReceipt {
    pub booking_code: String,
}

#[async_trait]
pub trait HotelBackend: Send + Sync {
    async fn search_hotels(&self, criteria: &SearchCriteria, page: u32) -> Result<HotelSearchPage, BackendError>;
    async fn booking_evaluation(&self, offer: &OfferRef) -> Result<Evaluation, BackendError>;
    /// An unsuccessful or empty breakdown is `Ok(Unavailable)`, not an error.
    async fn price_breakdown(&self, offer: &OfferRef) -> Result<BreakdownOutcome, BackendError>;
    /// `Err(Rejected)` when the payment could not be confirmed.
    async fn verify_payment(&self, payment_reference: &str) -> Result<PaymentVerification, BackendError>;
    async fn book_hotel(&self, payload: &[(String, String)]) -> Result<BookingReceipt, BackendError>;
    async fn booking_details(&self, booking_code: &str) -> Result<BookingConfirmation, BackendError>;
    /// Status payload; nothing reads it beyond logging.
    async fn voucher_request(&self, booking_code: &str) -> Result<Value, BackendError>;
}

// --- Raw response shapes ---

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Page {
        #[serde(alias = "Hotels", alias = "results")]
        hotels: Vec<Hotel>,
        #[serde(default, alias = "currentPage")]
        page: Option<u32>,
        #[serde(default, alias = "totalPages")]
        total_pages: Option<u32>,
    },
    List(Vec<Hotel>),
}

#[derive(Deserialize)]
struct EvaluationResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "Remarks", alias = "remark")]
    remarks: Option<String>,
    #[serde(default, alias = "TotalPrice", alias = "totalPrice")]
    total_price: Option<Decimal>,
    #[serde(default, alias = "Currency")]
    currency: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BreakdownItems {
    Rooms(Vec<RoomBreakdown>),
    Entries(Vec<BreakdownEntry>),
}

#[derive(Deserialize)]
struct BreakdownResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    price_breakdown: Option<BreakdownItems>,
}

#[derive(Deserialize)]
struct StatusResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "bookingCode", alias = "booking_reference")]
    booking_code: Option<Value>,
}

fn rejected(endpoint: &'static str, message: Option<String>) -> BackendError {
    BackendError::Rejected {
        endpoint,
        message: message.unwrap_or_else(|| "no reason given".to_string()),
    }
}

// Builds the shared HTTP client
pub fn build_http_client() -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!("hotelbook_rust/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build reqwest client")
}

pub struct BackendClient {
    http: Arc<Client>,
    base_url: String,
}

impl BackendClient {
    pub fn new(http: Arc<Client>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        form: &[(String, String)],
    ) -> Result<T, BackendError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(endpoint, url, "Calling backend");

        let response = self
            .http
            .post(&url)
            .form(form)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        let body = response
            .bytes()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        serde_json::from_slice(&body).map_err(|source| {
            // Log full body at debug level for inspection
            tracing::debug!(endpoint, response_body = %String::from_utf8_lossy(&body), "Backend JSON decode failed");
            BackendError::Decode { endpoint, source }
        })
    }
}

const LOCAL_SEARCH_KEYS: &[&str] = &["destinationDisplay", "roomBasis", "starLevels", "minPrice", "maxPrice", "amenities"];

#[async_trait]
impl HotelBackend for BackendClient {
    async fn search_hotels(&self, criteria: &SearchCriteria, page: u32) -> Result<HotelSearchPage, BackendError> {
        // Display name and amenities stay on this side; filters are re-sent in backend form
        let mut form: Vec<(String, String)> = criteria
            .query_pairs()
            .into_iter()
            .filter(|(k, _)| !LOCAL_SEARCH_KEYS.contains(&k.as_str()))
            .collect();
        form.push(("page".to_string(), page.to_string()));
        form.extend(criteria.filters.backend_form());

        let page_data = match self.post_form::<SearchResponse>("searchHotels", &form).await? {
            SearchResponse::Page { hotels, page: current, total_pages } => HotelSearchPage {
                hotels,
                page: current.unwrap_or(page),
                total_pages: total_pages.unwrap_or(1),
            },
            SearchResponse::List(hotels) => HotelSearchPage { hotels, page, total_pages: 1 },
        };
        tracing::info!(
            destination = %criteria.destination,
            page = page_data.page,
            hotels = page_data.hotels.len(),
            "Hotel search complete"
        );
        Ok(page_data)
    }

    async fn booking_evaluation(&self, offer: &OfferRef) -> Result<Evaluation, BackendError> {
        const ENDPOINT: &str = "bookingEvaluation";
        let response: EvaluationResponse = self.post_form(ENDPOINT, &offer.form()).await?;
        if response.success == Some(false) {
            return Err(rejected(ENDPOINT, response.message));
        }
        Ok(Evaluation {
            remarks: response.remarks.unwrap_or_default(),
            total_price: response.total_price,
            currency: response.currency,
        })
    }

    async fn price_breakdown(&self, offer: &OfferRef) -> Result<BreakdownOutcome, BackendError> {
        let response: BreakdownResponse = self.post_form("priceBreakdown", &offer.form()).await?;
        if response.success == Some(false) {
            tracing::warn!(hotel_search_code = %offer.hotel_search_code, "Price breakdown marked unsuccessful");
            return Ok(BreakdownOutcome::Unavailable);
        }
        Ok(match response.price_breakdown {
            None => BreakdownOutcome::Unavailable,
            Some(BreakdownItems::Rooms(rooms)) => BreakdownOutcome::from_rooms(rooms),
            Some(BreakdownItems::Entries(entries)) => BreakdownOutcome::from_rooms(vec![RoomBreakdown {
                room: None,
                currency: None,
                breakdown: entries,
            }]),
        })
    }

    async fn verify_payment(&self, payment_reference: &str) -> Result<PaymentVerification, BackendError> {
        const ENDPOINT: &str = "verifyPayment";
        let form = [("reference".to_string(), payment_reference.to_string())];
        let response: StatusResponse = self.post_form(ENDPOINT, &form).await?;
        if !response.success {
            return Err(rejected(ENDPOINT, response.message));
        }
        Ok(PaymentVerification {
            message: response.message.unwrap_or_else(|| "Payment verified".to_string()),
        })
    }

    async fn book_hotel(&self, payload: &[(String, String)]) -> Result<BookingReceipt, BackendError> {
        const ENDPOINT: &str = "bookHotel";
        let response: StatusResponse = self.post_form(ENDPOINT, payload).await?;
        if !response.success {
            return Err(rejected(ENDPOINT, response.message));
        }
        let booking_code = match response.booking_code {
            Some(Value::String(code)) if !code.is_empty() => code,
            Some(Value::Number(code)) => code.to_string(),
            _ => return Err(rejected(ENDPOINT, Some("booking succeeded without a booking code".to_string()))),
        };
        tracing::info!(%booking_code, "Hotel booked");
        Ok(BookingReceipt { booking_code })
    }

    async fn booking_details(&self, booking_code: &str) -> Result<BookingConfirmation, BackendError> {
        const ENDPOINT: &str = "bookingDetails";
        let form = [("bookingCode".to_string(), booking_code.to_string())];
        let value: Value = self.post_form(ENDPOINT, &form).await?;
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value.get("message").and_then(Value::as_str).map(str::to_string);
            return Err(rejected(ENDPOINT, message));
        }
        serde_json::from_value(value).map_err(|source| BackendError::Decode { endpoint: ENDPOINT, source })
    }

    async fn voucher_request(&self, booking_code: &str) -> Result<Value, BackendError> {
        let form = [("bookingCode".to_string(), booking_code.to_string())];
        self.post_form("voucherRequest", &form).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn stub(router: Router) -> BackendClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        BackendClient::new(Arc::new(Client::new()), format!("http://{addr}/"))
    }

    fn offer_ref() -> OfferRef {
        OfferRef {
            hotel_search_code: "HSC-1".into(),
            hotel_code: "H1".into(),
            check_in: "2025-06-01".into(),
        }
    }

    #[tokio::test]
    async fn grouped_and_flat_breakdowns_are_both_accepted() {
        let client = stub(
            Router::new()
                .route(
                    "/priceBreakdown",
                    post(|Form(form): Form<HashMap<String, String>>| async move {
                        if form.get("hotelSearchCode").map(String::as_str) == Some("flat") {
                            Json(json!({ "success": true, "price_breakdown": [
                                { "from_date": "2025-06-01", "to_date": "2025-06-02", "price": 90, "currency": "USD" }
                            ]}))
                        } else {
                            Json(json!({ "success": true, "price_breakdown": [
                                { "room": "Double", "breakdown": [
                                    { "from_date": "2025-06-01", "to_date": "2025-06-02", "price": 90 }
                                ]}
                            ]}))
                        }
                    }),
                ),
        )
        .await;

        let grouped = client.price_breakdown(&offer_ref()).await.unwrap();
        match grouped {
            BreakdownOutcome::Available(rooms) => assert_eq!(rooms[0].room.as_deref(), Some("Double")),
            BreakdownOutcome::Unavailable => panic!("expected a breakdown"),
        }

        let flat = OfferRef { hotel_search_code: "flat".into(), ..offer_ref() };
        match client.price_breakdown(&flat).await.unwrap() {
            BreakdownOutcome::Available(rooms) => {
                assert_eq!(rooms.len(), 1);
                assert_eq!(rooms[0].breakdown[0].price, Decimal::from(90));
            }
            BreakdownOutcome::Unavailable => panic!("expected a breakdown"),
        }
    }

    #[tokio::test]
    async fn unsuccessful_breakdown_degrades_instead_of_failing() {
        let client = stub(Router::new().route(
            "/priceBreakdown",
            post(|| async { Json(json!({ "success": false, "message": "not priced" })) }),
        ))
        .await;
        assert_eq!(client.price_breakdown(&offer_ref()).await.unwrap(), BreakdownOutcome::Unavailable);
    }

    #[tokio::test]
    async fn rejected_payment_and_booking_surface_the_message() {
        let client = stub(
            Router::new()
                .route(
                    "/verifyPayment",
                    post(|| async { Json(json!({ "success": false, "message": "Card declined" })) }),
                )
                .route(
                    "/bookHotel",
                    post(|| async { Json(json!({ "success": true, "bookingCode": 7781 })) }),
                ),
        )
        .await;

        match client.verify_payment("PAY-1").await {
            Err(BackendError::Rejected { endpoint, message }) => {
                assert_eq!(endpoint, "verifyPayment");
                assert_eq!(message, "Card declined");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let receipt = client.book_hotel(&[("hotelCode".into(), "H1".into())]).await.unwrap();
        assert_eq!(receipt.booking_code, "7781");
    }

    #[tokio::test]
    async fn search_accepts_a_bare_hotel_list() {
        let client = stub(Router::new().route(
            "/searchHotels",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(form.get("page").map(String::as_str), Some("2"));
                assert!(!form.contains_key("destinationDisplay"));
                assert!(!form.contains_key("amenities"));
                assert_eq!(form.get("starLevels").map(String::as_str), Some("4,5"));
                assert_eq!(form.get("minPrice").map(String::as_str), Some(""));
                Json(json!([{ "HotelCode": "H1", "HotelName": "Harbour View", "Offers": [] }]))
            }),
        ))
        .await;

        let criteria = crate::criteria::SearchCriteria {
            destination: "LON".into(),
            destination_display: "London".into(),
            check_in: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out: chrono::NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            currency: "USD".into(),
            nationality: "NG".into(),
            rooms: vec![crate::criteria::RoomOccupancy { adults: 2, children: 0, children_ages: vec![] }],
            filters: crate::criteria::SearchFilters {
                star_levels: vec![4, 5],
                amenities: vec!["wifi".into()],
                ..Default::default()
            },
        };
        let page = client.search_hotels(&criteria, 2).await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.hotels[0].hotel_code, "H1");
    }

    #[tokio::test]
    async fn http_errors_are_transport_failures() {
        let client = stub(Router::new()).await;
        assert!(matches!(
            client.booking_details("X").await,
            Err(BackendError::Transport { endpoint: "bookingDetails", .. })
        ));
    }
}
