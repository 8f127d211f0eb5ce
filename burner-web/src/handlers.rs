use std::{borrow::Cow, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use burner_common::message::{HeaderFields, Message};
use burner_store::Mailbox;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AliasGenerator;

/// Shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub mailbox: Mailbox,
    pub domain: String,
    pub started_at: DateTime<Utc>,
    pub retention_hours: u64,
    pub aliases: AliasGenerator,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(stats))
        .route("/api/alias", get(alias))
        .route("/api/mailbox/{alias}", get(mailbox))
        .route("/api/mail/{id}", get(mail))
        .route("/api/mail/{id}/raw", get(raw))
        .with_state(Arc::new(state))
}

#[derive(Debug)]
enum ApiError {
    BadId(String),
    NotFound(u64),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadId(id) => (StatusCode::BAD_REQUEST, format!("Invalid message id {id:?}")),
            Self::NotFound(id) => (StatusCode::NOT_FOUND, format!("No message with id {id}")),
        };

        (status, Json(serde_json::json!({ "error": error }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Stats<'a> {
    processed: u64,
    started_at: DateTime<Utc>,
    domain: &'a str,
    retention_hours: u64,
}

#[derive(Debug, Serialize)]
struct Placeholder<'a> {
    alias: String,
    domain: &'a str,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    id: u64,
    received_at: DateTime<Utc>,
    sender: &'a str,
    recipients: &'a [String],
    subject: &'a str,
    size: usize,
}

impl<'a> From<&'a Message> for Summary<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            id: message.id,
            received_at: message.received_at,
            sender: &message.sender,
            recipients: &message.recipients,
            subject: &message.subject,
            size: message.size(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Detail<'a> {
    #[serde(flatten)]
    summary: Summary<'a>,
    headers: &'a HeaderFields,
    body: Cow<'a, str>,
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    Json(Stats {
        processed: state.mailbox.count_accepted().await,
        started_at: state.started_at,
        domain: &state.domain,
        retention_hours: state.retention_hours,
    })
    .into_response()
}

async fn alias(State(state): State<Arc<AppState>>) -> Response {
    Json(Placeholder {
        alias: state.aliases.generate(),
        domain: &state.domain,
    })
    .into_response()
}

/// Everything held for `alias`, newest first. An alias nobody wrote to is an
/// empty mailbox, not an error.
async fn mailbox(State(state): State<Arc<AppState>>, Path(alias): Path<String>) -> Response {
    let mut messages = state.mailbox.find_by_alias(&alias).await;
    messages.sort_by(|a, b| {
        b.received_at
            .cmp(&a.received_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    tracing::debug!(alias = %alias, count = messages.len(), "Mailbox listed");

    Json(
        messages
            .iter()
            .map(|message| Summary::from(message.as_ref()))
            .collect::<Vec<_>>(),
    )
    .into_response()
}

async fn find(state: &AppState, id: &str) -> Result<Arc<Message>, ApiError> {
    let id = id
        .parse::<u64>()
        .map_err(|_| ApiError::BadId(id.to_string()))?;

    state
        .mailbox
        .find_by_id(id)
        .await
        .ok_or(ApiError::NotFound(id))
}

async fn mail(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match find(&state, &id).await {
        Ok(message) => Json(Detail {
            summary: Summary::from(message.as_ref()),
            headers: &message.headers,
            body: message.body_text(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn raw(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let message = match find(&state, &id).await {
        Ok(message) => message,
        Err(err) => return err.into_response(),
    };

    let name = if message.sender.is_empty() {
        "message"
    } else {
        message.sender.as_str()
    };
    let disposition = HeaderValue::try_from(format!("attachment; filename={name}.eml"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=message.eml"));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("message/rfc822")),
            (CONTENT_DISPOSITION, disposition),
        ],
        message.raw.clone(),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroUsize;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use burner_common::message::{Envelope, MessageDraft};
    use burner_store::{MailboxStore, MemoryMailbox};
    use chrono::TimeZone;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn state() -> AppState {
        let store = Arc::new(MemoryMailbox::new(NonZeroUsize::new(10).unwrap()));

        for (minute, sender, to, subject) in [
            (0, "a@x.test", "bob@burner.test", "older"),
            (5, "", "bob@burner.test", "newer"),
            (3, "c@x.test", "carol@burner.test", "other"),
        ] {
            let raw = format!("Subject: {subject}\r\nX-Tag: t\r\n\r\nBody é {subject}\r\n");
            let draft = MessageDraft::parse(
                Envelope::new(sender, vec![to.to_string()]),
                raw.into_bytes(),
                Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
            )
            .unwrap();
            store.save(draft).await.unwrap();
        }

        AppState {
            mailbox: Mailbox::new(store),
            domain: "burner.test".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
            retention_hours: 4,
            aliases: AliasGenerator::default(),
        }
    }

    async fn get(uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = router(state().await)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, body.to_vec(), disposition)
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let (status, body, _) = get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn stats() {
        let (status, body) = get_json("/api/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], 3);
        assert_eq!(body["started_at"], "2024-03-01T11:00:00Z");
        assert_eq!(body["domain"], "burner.test");
        assert_eq!(body["retention_hours"], 4);
    }

    #[tokio::test]
    async fn placeholder_alias() {
        let (status, body) = get_json("/api/alias").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alias"], "alias");
        assert_eq!(body["domain"], "burner.test");
    }

    #[tokio::test]
    async fn mailbox_is_newest_first() {
        let (status, body) = get_json("/api/mailbox/bob").await;

        assert_eq!(status, StatusCode::OK);
        let subjects: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["subject"].as_str().unwrap())
            .collect();
        assert_eq!(subjects, vec!["newer", "older"]);
        assert_eq!(body[0]["sender"], "");
        assert_eq!(body[0]["recipients"][0], "bob@burner.test");
        assert_eq!(body[1]["received_at"], "2024-03-01T12:00:00Z");
        assert!(body[0]["size"].as_u64().unwrap() > 0);
        assert!(body[0].get("raw").is_none());
    }

    #[tokio::test]
    async fn unknown_alias_is_empty() {
        let (status, body) = get_json("/api/mailbox/nobody").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn single_message() {
        let (status, body) = get_json("/api/mail/3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 3);
        assert_eq!(body["subject"], "other");
        assert_eq!(body["body"], "Body \u{e9} other\r\n");
        assert_eq!(body["headers"][1]["name"], "X-Tag");
        assert_eq!(body["headers"][1]["values"][0], "t");
    }

    #[tokio::test]
    async fn missing_and_malformed_ids() {
        let (status, body) = get_json("/api/mail/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No message with id 99");

        let (status, _) = get_json("/api/mail/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get("/api/mail/-1/raw").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn raw_download() {
        let (status, body, disposition) = get("/api/mail/1/raw").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"Subject: older\r\n"));
        assert_eq!(
            disposition.as_deref(),
            Some("attachment; filename=a@x.test.eml")
        );

        let (_, _, disposition) = get("/api/mail/2/raw").await;
        assert_eq!(
            disposition.as_deref(),
            Some("attachment; filename=message.eml")
        );
    }
}
