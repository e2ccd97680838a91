use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use super::{ok, require_user};
use crate::capture::{HighlightCanvas, Point};
use crate::mastery::{DictionaryQuery, FamiliarityTier};
use crate::response::AppError;
use crate::services::{CapturedImage, LookupRequest};
use crate::state::AppState;

const DEFAULT_MIME_TYPE: &str = "image/jpeg";
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DictionaryParams {
    search: Option<String>,
    tier: Option<String>,
}

impl DictionaryParams {
    fn into_query(self) -> Result<DictionaryQuery, AppError> {
        let tier = match self.tier.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(
                FamiliarityTier::parse(raw)
                    .ok_or_else(|| AppError::validation(format!("unknown tier: {raw}")))?,
            ),
        };
        Ok(DictionaryQuery {
            search: self.search,
            tier,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LookupBody {
    image: String,
    mime_type: Option<String>,
    strokes: Vec<Vec<Point>>,
    canvas_width: f32,
    canvas_height: f32,
    stroke_width: Option<f32>,
    target_language: Option<String>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DictionaryParams>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let query = params.into_query()?;
    let engine = state.engine();
    let snapshot = engine.load_snapshot(&user_id).await?;
    Ok(ok(engine.dictionary(&snapshot, &query)).into_response())
}

pub(super) async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(params): Query<DictionaryParams>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let query = params.into_query()?;
    let engine = state.engine();
    let snapshot = engine.remove_term(&user_id, &key).await?;
    Ok(ok(engine.dictionary(&snapshot, &query)).into_response())
}

pub(super) async fn lookup(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<LookupBody>,
) -> Result<Response, AppError> {
    let user_id = require_user(&headers)?;
    let engine = state.engine();
    let request = build_lookup_request(body, &engine.settings().target_language)?;
    let term = engine.capture_term(&user_id, &request).await?;
    Ok((StatusCode::CREATED, ok(term)).into_response())
}

fn build_lookup_request(body: LookupBody, default_language: &str) -> Result<LookupRequest, AppError> {
    if !is_positive(body.canvas_width) || !is_positive(body.canvas_height) {
        return Err(AppError::validation("canvasWidth and canvasHeight must be positive"));
    }

    let (data, mime_type) = split_data_url(&body.image, body.mime_type.as_deref());
    if data.is_empty() {
        return Err(AppError::validation("image is empty"));
    }
    let decoded = STANDARD
        .decode(data)
        .map_err(|e| AppError::bad_request(format!("image is not valid base64: {e}")))?;
    if decoded.len() > MAX_IMAGE_BYTES {
        return Err(AppError::validation("image is too large"));
    }

    let mut canvas = HighlightCanvas::new(body.canvas_width, body.canvas_height);
    if let Some(width) = body.stroke_width.filter(|w| w.is_finite()) {
        canvas = canvas.with_stroke_width(width);
    }
    for stroke in &body.strokes {
        let mut points = stroke.iter().copied().filter(|p| p.x.is_finite() && p.y.is_finite());
        let Some(first) = points.next() else {
            continue;
        };
        canvas.begin(first);
        for point in points {
            canvas.extend(point);
        }
        canvas.end();
    }

    let target_language = body
        .target_language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| default_language.to_string());

    Ok(LookupRequest {
        image: CapturedImage {
            data: data.to_string(),
            mime_type,
        },
        highlight: canvas.region(),
        target_language,
    })
}

fn is_positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

/// Accepts bare base64 or a `data:<mime>;base64,` URL.
fn split_data_url<'a>(raw: &'a str, mime_type: Option<&str>) -> (&'a str, String) {
    let raw = raw.trim();
    let fallback = || {
        mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string()
    };

    if let Some(rest) = raw.strip_prefix("data:") {
        if let Some((header, data)) = rest.split_once(',') {
            let mime = header.trim_end_matches(";base64");
            let mime = if mime.is_empty() { fallback() } else { mime.to_string() };
            return (data.trim(), mime);
        }
    }
    (raw, fallback())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(image: &str) -> LookupBody {
        LookupBody {
            image: image.to_string(),
            mime_type: None,
            strokes: vec![vec![Point::new(10.0, 10.0), Point::new(60.0, 12.0)], vec![]],
            canvas_width: 300.0,
            canvas_height: 600.0,
            stroke_width: None,
            target_language: Some("  ".into()),
        }
    }

    #[test]
    fn data_urls_are_split() {
        let (data, mime) = split_data_url("data:image/png;base64,AAAA", None);
        assert_eq!(data, "AAAA");
        assert_eq!(mime, "image/png");

        let (data, mime) = split_data_url("AAAA", Some("image/webp"));
        assert_eq!(data, "AAAA");
        assert_eq!(mime, "image/webp");
    }

    #[test]
    fn lookup_request_from_body() {
        let request = build_lookup_request(body("aGVsbG8="), "Spanish").unwrap();
        assert_eq!(request.target_language, "Spanish");
        assert_eq!(request.image.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(request.highlight.strokes.len(), 1);
        assert_eq!(request.highlight.svg_paths(), vec!["M 10 10 L 60 12".to_string()]);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = build_lookup_request(body("not base64!"), "Spanish").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let mut zero = body("aGVsbG8=");
        zero.canvas_width = 0.0;
        assert!(build_lookup_request(zero, "Spanish").is_err());
    }

    #[test]
    fn tier_filter_parsing() {
        let params = DictionaryParams { search: None, tier: Some("Mastered".into()) };
        assert_eq!(params.into_query().unwrap().tier, Some(FamiliarityTier::Mastered));
        let params = DictionaryParams { search: None, tier: Some("all".into()) };
        assert_eq!(params.into_query().unwrap().tier, None);
        let params = DictionaryParams { search: None, tier: Some("expert".into()) };
        assert!(params.into_query().is_err());
    }
}
