//! The USSD turn handler.
//!
//! One POST per turn: fetch or create the session, expire it when the
//! wall-clock TTL has lapsed, look up the customer on the first home
//! render, hand the turn to the menu engine, persist the menu transition
//! and emit the `"{action} {message}"` frame. Everything except parameter
//! validation answers HTTP 200: the telco channel can only display USSD
//! frames.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Form, FromRequest, Json, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use ussd_gateway_core::{CustomerData, Session, SessionKey};
use ussd_gateway_engine::{Frame, FrameAction, StepResult, Turn};
use ussd_gateway_upstream::UpstreamEnvelope;

/// Raw turn request body; accepted as form-urlencoded or JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UssdRequest {
    /// Caller MSISDN in country-code form.
    #[serde(default)]
    pub msisdn: Option<String>,

    /// Aggregator session identifier.
    #[serde(default)]
    pub sessionid: Option<String>,

    /// Dialled shortcode.
    #[serde(default)]
    pub shortcode: Option<String>,

    /// Caller input for this turn.
    #[serde(default)]
    pub response: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequest<S> for UssdRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            let Json(body) = Json::<Self>::from_request(req, state)
                .await
                .map_err(|e| AppError::invalid_parameters().with_source(e.into()))?;
            Ok(body)
        } else {
            let Form(body) = Form::<Self>::from_request(req, state)
                .await
                .map_err(|e| AppError::invalid_parameters().with_source(e.into()))?;
            Ok(body)
        }
    }
}

/// Validated turn parameters.
struct TurnParams {
    msisdn: String,
    session_id: String,
    shortcode: Option<String>,
    input: String,
}

impl UssdRequest {
    fn validate(self) -> Result<TurnParams, AppError> {
        let msisdn = self
            .msisdn
            .filter(|m| !m.is_empty())
            .ok_or_else(AppError::invalid_parameters)?;
        let session_id = self
            .sessionid
            .filter(|s| !s.is_empty())
            .ok_or_else(AppError::invalid_parameters)?;

        if !msisdn.bytes().all(|b| b.is_ascii_digit()) || !(9..=15).contains(&msisdn.len()) {
            return Err(AppError::invalid_parameters());
        }
        if !(3..=50).contains(&session_id.len()) {
            return Err(AppError::invalid_parameters());
        }

        let shortcode = self.shortcode.filter(|s| !s.is_empty());
        if let Some(shortcode) = &shortcode {
            if !shortcode.bytes().all(|b| b.is_ascii_digit())
                || !(3..=6).contains(&shortcode.len())
            {
                return Err(AppError::invalid_parameters());
            }
        }

        let input = self.response.unwrap_or_default();
        if input.len() > 500 {
            return Err(AppError::invalid_parameters());
        }

        Ok(TurnParams {
            msisdn,
            session_id,
            shortcode,
            input: input.trim().to_string(),
        })
    }
}

/// Handle one USSD turn.
pub async fn handle_turn(
    State(state): State<Arc<AppState>>,
    request: UssdRequest,
) -> Result<Response, AppError> {
    let params = request.validate()?;

    let key = state
        .sessions
        .key(&params.msisdn, &params.session_id, params.shortcode.as_deref());

    tracing::info!(session = %key, input_len = params.input.len(), "Turn received");

    match run_turn(&state, &key, &params.input).await {
        Ok(frame) => Ok(frame_response(&frame)),
        Err(e) => {
            // Recoverable infrastructure failure: answer with a frame, and
            // leave the session alone so a retry can resume.
            tracing::error!(session = %key, error = %e, "Turn failed");
            Ok(frame_response(&Frame::end(
                "Service temporarily unavailable. Please try again later.",
            )))
        }
    }
}

async fn run_turn(
    state: &AppState,
    key: &SessionKey,
    input: &str,
) -> ussd_gateway_core::Result<Frame> {
    let mut session = match state.sessions.get(key).await? {
        Some(session) => session,
        None => state.sessions.create(key).await?,
    };

    let ttl = i64::try_from(state.sessions.config().ttl_seconds).unwrap_or(i64::MAX);
    if state.sessions.elapsed_seconds(key).await? > ttl {
        tracing::info!(session = %key, "Session exceeded TTL; starting fresh");
        state.sessions.clear(key).await?;
        session = state.sessions.create(key).await?;
    }

    if session.current_menu == "home" && session.customer_data.is_none() {
        let envelope = state.api.get_customer(key, &session).await;
        let customer = if envelope.success {
            customer_from_envelope(&envelope)
        } else {
            tracing::warn!(session = %key, status = %envelope.status, "Customer lookup failed; using guest");
            CustomerData::guest()
        };

        session = state
            .sessions
            .update(key, &json!({ "customerData": customer }))
            .await?;
    }

    let context = build_context(&session);
    let current_menu = session.current_menu.clone();
    let mut turn = Turn::new(key.clone(), session, context);

    let frame = if input.is_empty() {
        state.engine.render(&current_menu, &mut turn).await
    } else {
        let step = state.engine.process(&current_menu, input, &mut turn).await;
        step_to_frame(state, step, &current_menu, &mut turn).await
    };

    if let Some(next_menu) = &frame.next_menu {
        if *next_menu != turn.session.current_menu {
            let mut history = turn.session.menu_history.clone();
            history.push(next_menu.clone());

            state
                .sessions
                .update(key, &json!({ "currentMenu": next_menu, "menuHistory": history }))
                .await?;
        }
    }

    if frame.action == FrameAction::End {
        state.sessions.clear(key).await?;
    }

    Ok(frame)
}

/// Convert a processing outcome into the frame to emit.
///
/// A bare `nextMenu` renders the target; an error re-renders the retry
/// menu with the message prefixed; a message-bearing result is emitted
/// directly.
async fn step_to_frame(
    state: &AppState,
    step: StepResult,
    current_menu: &str,
    turn: &mut Turn,
) -> Frame {
    if let Some(message) = step.message {
        return Frame {
            action: step.action.unwrap_or(FrameAction::Con),
            message,
            next_menu: step.next_menu,
        };
    }

    if step.is_error() {
        let retry_menu = step
            .retry_menu
            .unwrap_or_else(|| current_menu.to_string());
        let rendered = state.engine.render(&retry_menu, turn).await;
        let error_message = step
            .error_message
            .unwrap_or_else(|| "Invalid selection. Please try again.".to_string());

        return Frame {
            action: rendered.action,
            message: format!("{error_message}\n\n{}", rendered.message),
            next_menu: Some(retry_menu),
        };
    }

    if let Some(next_menu) = step.next_menu {
        let rendered = state.engine.render(&next_menu, turn).await;
        return Frame {
            action: rendered.action,
            message: rendered.message,
            next_menu: rendered.next_menu.or(Some(next_menu)),
        };
    }

    state.engine.render(current_menu, turn).await
}

/// Build the rendering context for a turn.
fn build_context(session: &Session) -> Value {
    let customer = session
        .customer_data
        .as_ref()
        .and_then(|c| serde_json::to_value(c).ok())
        .unwrap_or(Value::Null);
    let session_value = serde_json::to_value(session).unwrap_or(Value::Null);

    json!({
        "customer": customer,
        "session": session_value,
        "data": {},
        "transaction": {}
    })
}

/// Build a customer record from a successful `GETCUSTOMER` envelope.
fn customer_from_envelope(envelope: &UpstreamEnvelope) -> CustomerData {
    let field = |name: &str| {
        envelope
            .field(name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let Some(customer_id) = field("CUSTOMERID") else {
        return CustomerData::guest();
    };

    let split_list = |raw: Option<String>| {
        raw.map(|r| {
            r.split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
    };

    CustomerData {
        customer_id,
        first_name: field("FIRSTNAME").unwrap_or_else(|| "Customer".to_string()),
        last_name: field("LASTNAME").unwrap_or_default(),
        language: field("LANGUAGE").unwrap_or_else(|| "en".to_string()),
        accounts: split_list(field("BANKACCOUNTS").or_else(|| field("ACCOUNTS"))),
        aliases: split_list(field("ALIASES")),
        id_number: field("IDNUMBER"),
        email: field("EMAIL"),
    }
}

fn frame_response(frame: &Frame) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        frame.to_wire(),
    )
        .into_response()
}
