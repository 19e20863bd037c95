//! Route handlers
//!
//! Query parameters are taken as raw strings and validated here so every
//! malformed request gets the same JSON error body.

use anistream_core::{ProviderDescriptor, ResolutionResult, ResolveRequest, StreamSource};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveParams {
    pub title: Option<String>,
    /// Catalog id, used when no title is given
    pub id: Option<String>,
    pub episode: Option<String>,
    /// Preferred provider id
    pub source: Option<String>,
    pub force_refresh: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBody {
    pub url: String,
    pub quality: String,
    pub is_hls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl From<StreamSource> for SourceBody {
    fn from(source: StreamSource) -> Self {
        Self {
            url: source.url,
            quality: source.quality_label,
            is_hls: source.is_hls,
            container: source.container,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveBody {
    pub sources: Vec<SourceBody>,
    pub provider_used: String,
    pub resolved_at: String,
}

impl From<ResolutionResult> for ResolveBody {
    fn from(result: ResolutionResult) -> Self {
        Self {
            sources: result.sources.into_iter().map(SourceBody::from).collect(),
            provider_used: result.provider_used,
            resolved_at: result.resolved_at.to_rfc3339(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_episode(raw: Option<String>) -> Result<f64, AppError> {
    let raw = non_blank(raw).ok_or_else(|| AppError::BadRequest("episode is required".to_string()))?;
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .ok_or_else(|| AppError::BadRequest(format!("episode must be a non-negative number, got `{}`", raw)))
}

fn parse_flag(raw: Option<String>) -> Result<bool, AppError> {
    match non_blank(raw).as_deref() {
        None | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(AppError::BadRequest(format!(
            "forceRefresh must be true or false, got `{}`",
            other
        ))),
    }
}

async fn requested_title(state: &AppState, params: &mut ResolveParams) -> Result<String, AppError> {
    if let Some(title) = non_blank(params.title.take()) {
        return Ok(title);
    }
    let Some(raw_id) = non_blank(params.id.take()) else {
        return Err(AppError::BadRequest("title or id is required".to_string()));
    };
    let id: u64 = raw_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("id must be numeric, got `{}`", raw_id)))?;
    let catalog = state
        .service
        .catalog()
        .ok_or_else(|| AppError::BadRequest("catalog lookups are not configured".to_string()))?;
    Ok(catalog.title_for(id).await?)
}

/// `GET /resolve`
pub async fn resolve(
    State(state): State<AppState>,
    Query(mut params): Query<ResolveParams>,
) -> Result<Json<ResolveBody>, AppError> {
    let episode = parse_episode(params.episode.take())?;
    let force_refresh = parse_flag(params.force_refresh.take())?;
    let title = requested_title(&state, &mut params).await?;

    let mut request = ResolveRequest::new(title, episode).force_refresh(force_refresh);
    if let Some(source) = non_blank(params.source.take()) {
        request = request.with_provider(source);
    }

    let result = state.service.resolve(&request).await?;
    tracing::info!(
        title = %request.title,
        episode,
        provider = %result.provider_used,
        sources = result.sources.len(),
        "resolve served"
    );
    Ok(Json(result.into()))
}

/// `GET /providers`
pub async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderDescriptor>> {
    Json(state.service.providers())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_episode() {
        assert_eq!(parse_episode(Some("3".to_string())).unwrap(), 3.0);
        assert_eq!(parse_episode(Some(" 10.5 ".to_string())).unwrap(), 10.5);
        assert!(parse_episode(None).is_err());
        assert!(parse_episode(Some("one".to_string())).is_err());
        assert!(parse_episode(Some("-1".to_string())).is_err());
        assert!(parse_episode(Some("NaN".to_string())).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(!parse_flag(None).unwrap());
        assert!(parse_flag(Some("true".to_string())).unwrap());
        assert!(!parse_flag(Some("0".to_string())).unwrap());
        assert!(parse_flag(Some("maybe".to_string())).is_err());
    }
}
