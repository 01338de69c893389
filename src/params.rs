//! Typed arguments for each market-data tool.
//!
//! Every field is optional and unset fields are left out when the struct is
//! encoded, so the upstream API sees an omitted key rather than a null. The
//! doc comment on each field is the description advertised to the host.
//!
//! Defaults are advertised in the schema only. An omitted parameter stays
//! omitted and the upstream applies its own default.
//!
//! Only the JSON shape is checked here. Date formats, code formats and the
//! upstream's own limits are left for the upstream API to reject.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StockBasicParams {
    /// Stock code (e.g., 000001.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Company name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Exchange code (SSE, SZSE, BSE)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Market type (主板, 科创板, 创业板, 北交所)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    /// Hong Kong Stock Connect eligibility (N, H, S)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hs: Option<String>,
    /// Listing status (L, D, P)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_status: Option<String>,
    /// Number of records to return (max 2000)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(default = "default_limit")]
    pub limit: Option<i64>,
    /// Offset for pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(default = "default_offset")]
    pub offset: Option<i64>,
}

fn default_limit() -> Option<i64> {
    Some(2000)
}

fn default_offset() -> Option<i64> {
    Some(0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyParams {
    /// Stock code (e.g., 000001.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Trade date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeeklyParams {
    /// Stock code (e.g., 000001.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Trade date (weekly last trading date, YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyParams {
    /// Stock code (e.g., 000001.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Trade date (monthly last trading date, YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexDailyParams {
    /// Index code (e.g., 000001.SH, 399300.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Trade date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexWeeklyParams {
    /// Index code (e.g., 000001.SH, 399300.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Trade date (weekly last trading date, YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexMonthlyParams {
    /// Index code (e.g., 000001.SH, 399300.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Trade date (monthly last trading date, YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexDailyBasicParams {
    /// Index code (e.g., 000001.SH, 399300.SZ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_code: Option<String>,
    /// Trade date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexWeightParams {
    /// Index code, source from index basic info interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_code: Option<String>,
    /// Trade date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    /// Start date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End date (YYYYMMDD format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}
