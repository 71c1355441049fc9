use crate::analysis::{MIN_DATA_POINTS, RiskProfile, compute_beta};
use crate::config::SharedAppConfig;
use crate::data_structures::Period;
use crate::history::SharedHistoryProvider;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Deserialize)]
pub struct BetaQuery {
    #[serde(default)]
    pub period: Period,
}

#[derive(Debug, Serialize)]
pub struct BetaResponse {
    pub code: String,
    pub index_code: String,
    pub period: Period,
    pub beta: f64,
    pub correlation: f64,
    pub data_points: usize,
    pub profile: RiskProfile,
    pub profile_label: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ApiErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[instrument]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

#[instrument(skip(provider, config), fields(code = %code, period = %query.period))]
pub async fn beta_handler(
    State(provider): State<SharedHistoryProvider>,
    State(config): State<SharedAppConfig>,
    Path(code): Path<String>,
    Query(query): Query<BetaQuery>,
) -> Response {
    debug!("Received beta request");

    let index_code = config.market_index_code.clone();

    // The stock and index series are independent fetches; run them together
    let histories = futures::try_join!(
        provider.daily_history(&code, query.period),
        provider.daily_history(&index_code, query.period),
    );

    let (stock, index) = match histories {
        Ok(histories) => histories,
        Err(e) if e.is_not_found() => {
            warn!(error = ?e, "History not found");
            return error_response(
                StatusCode::NOT_FOUND,
                "指定された銘柄の株価データが見つかりません",
            );
        }
        Err(e) => {
            error!(error = ?e, "History fetch failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "株価データの取得に失敗しました。しばらくしてから再度お試しください",
            );
        }
    };

    // Fast-fail on each raw series before aligning anything
    if stock.len() < MIN_DATA_POINTS || index.len() < MIN_DATA_POINTS {
        warn!(
            stock_points = stock.len(),
            index_points = index.len(),
            "Insufficient raw history"
        );
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "株価データが不足しているため、ベータ値を計算できません（最低20日分の終値が必要です）",
        );
    }

    let result = compute_beta(&stock, &index);

    if result.data_points < MIN_DATA_POINTS {
        warn!(
            aligned_points = result.data_points,
            "Insufficient aligned history"
        );
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "株価指数と一致する取引日が不足しているため、ベータ値を計算できません",
        );
    }

    let profile = RiskProfile::from_beta(result.beta);
    info!(
        beta = result.beta,
        correlation = result.correlation,
        data_points = result.data_points,
        profile = ?profile,
        "Computed beta"
    );

    (
        StatusCode::OK,
        Json(BetaResponse {
            code,
            index_code,
            period: query.period,
            beta: result.beta,
            correlation: result.correlation,
            data_points: result.data_points,
            profile,
            profile_label: profile.label_ja().to_string(),
        }),
    )
        .into_response()
}
