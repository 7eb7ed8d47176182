//! Submission payload extraction.
//!
//! A submission arrives either as a JSON body `{"answers": {...}}` or,
//! when files are involved, as multipart form data with an `answers`
//! JSON part plus one file part per upload field named
//! `answers.{field_id}` (bracket style `answers[{field_id}]` is also
//! accepted). Keys that are not valid field ids are dropped here, in
//! line with the engine's orphan-answer policy.

use actix_web::{web, HttpMessage, HttpRequest};
use actix_multipart::Multipart;
use ef_core::error::AppError;
use ef_core::traits::UploadStore;
use ef_core::validation::AnswerSet;
use ef_core::value::RawAnswer;
use futures_util::StreamExt;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// 10 MiB per part, which also bounds JSON bodies.
const MAX_PART_BYTES: usize = 10 * 1024 * 1024;

/// The parsed candidate answers plus any files already written to the
/// store (so a rejected submission can clean them up).
pub struct SubmissionPayload {
    pub answers: AnswerSet,
    pub uploaded_paths: Vec<String>,
}

pub async fn read_submission(
    req: &HttpRequest,
    payload: web::Payload,
    store: &dyn UploadStore,
) -> ApiResult<SubmissionPayload> {
    if req.content_type().starts_with("multipart/form-data") {
        read_multipart(req, payload, store).await
    } else {
        read_json(payload).await
    }
}

async fn read_json(mut payload: web::Payload) -> ApiResult<SubmissionPayload> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk
            .map_err(|e| AppError::ValidationError(format!("could not read body: {e}")))?;
        if body.len() + chunk.len() > MAX_PART_BYTES {
            return Err(AppError::ValidationError("request body too large".into()).into());
        }
        body.extend_from_slice(&chunk);
    }

    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("invalid JSON body: {e}")))?;
    let answers = value
        .get("answers")
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::ValidationError("missing \"answers\" object".into()))?;

    Ok(SubmissionPayload {
        answers: json_answers(answers),
        uploaded_paths: Vec::new(),
    })
}

async fn read_multipart(
    req: &HttpRequest,
    payload: web::Payload,
    store: &dyn UploadStore,
) -> ApiResult<SubmissionPayload> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut answers = AnswerSet::new();
    let mut uploaded_paths = Vec::new();

    while let Some(part) = multipart.next().await {
        let mut part =
            part.map_err(|e| AppError::ValidationError(format!("invalid multipart: {e}")))?;
        let disposition = part.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);

        let mut data = web::BytesMut::new();
        while let Some(chunk) = part.next().await {
            let chunk = chunk
                .map_err(|e| AppError::ValidationError(format!("invalid multipart: {e}")))?;
            if data.len() + chunk.len() > MAX_PART_BYTES {
                return Err(AppError::ValidationError("upload too large".into()).into());
            }
            data.extend_from_slice(&chunk);
        }

        if name == "answers" {
            let value: Value = serde_json::from_slice(&data).map_err(|e| {
                AppError::ValidationError(format!("invalid \"answers\" part: {e}"))
            })?;
            if let Some(map) = value.as_object() {
                answers.extend(json_answers(map));
            }
        } else if let Some(field_id) = part_field_id(&name) {
            match filename {
                Some(original_filename) => {
                    let path = store
                        .save(data.to_vec(), &original_filename)
                        .await
                        .map_err(ApiError::from)?;
                    uploaded_paths.push(path.clone());
                    answers.insert(
                        field_id,
                        RawAnswer::File {
                            path,
                            original_filename,
                        },
                    );
                }
                None => {
                    // A text part; may carry a JSON value or plain text.
                    let text = String::from_utf8_lossy(&data).to_string();
                    let raw = serde_json::from_str::<Value>(&text)
                        .ok()
                        .and_then(|v| RawAnswer::from_json(&v))
                        .unwrap_or(RawAnswer::Text(text));
                    answers.insert(field_id, raw);
                }
            }
        }
        // Unrecognized part names are ignored.
    }

    Ok(SubmissionPayload {
        answers,
        uploaded_paths,
    })
}

/// Converts a JSON answers object to the engine's answer set. Keys that
/// are not UUIDs and values with no raw shape are dropped.
pub fn json_answers(map: &serde_json::Map<String, Value>) -> AnswerSet {
    let mut answers = AnswerSet::new();
    for (key, value) in map {
        let Ok(field_id) = Uuid::parse_str(key) else {
            continue;
        };
        if let Some(raw) = RawAnswer::from_json(value) {
            answers.insert(field_id, raw);
        }
    }
    answers
}

/// Extracts the field id from `answers.{id}` or `answers[{id}]`.
fn part_field_id(name: &str) -> Option<Uuid> {
    let id = name
        .strip_prefix("answers.")
        .or_else(|| name.strip_prefix("answers[").and_then(|s| s.strip_suffix(']')))?;
    Uuid::parse_str(id).ok()
}
