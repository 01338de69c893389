//! # Tool Registry
//!
//! The fixed catalogue of market-data tools. Each entry pairs the name the
//! host calls with the upstream `api_name` it forwards to and a typed
//! parameter struct from [`crate::params`]; the advertised input schema is
//! generated from that struct.
//!
//! Schemas are advertised, not enforced: the only server-side check is that
//! arguments decode into the parameter struct. Everything else is validated
//! by the upstream API, which answers bad parameters with an application
//! error.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use schemars::schema::{InstanceType, Schema, SingleOrVec};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::{
    DailyParams, IndexDailyBasicParams, IndexDailyParams, IndexMonthlyParams, IndexWeeklyParams,
    IndexWeightParams, MonthlyParams, StockBasicParams, WeeklyParams,
};
use crate::types::{ParamKind, PropertySchema, Tool, ToolAnnotations, ToolInputSchema};

/// Raised when a tool name is not in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tool: {0}")]
pub struct UnknownTool(pub String);

/// One entry of the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TushareTool {
    StockBasic,
    Daily,
    Weekly,
    Monthly,
    IndexDaily,
    IndexWeekly,
    IndexMonthly,
    IndexDailyBasic,
    IndexWeight,
}

impl TushareTool {
    /// Every tool, in the order they are advertised.
    pub const ALL: [TushareTool; 9] = [
        TushareTool::StockBasic,
        TushareTool::Daily,
        TushareTool::Weekly,
        TushareTool::Monthly,
        TushareTool::IndexDaily,
        TushareTool::IndexWeekly,
        TushareTool::IndexMonthly,
        TushareTool::IndexDailyBasic,
        TushareTool::IndexWeight,
    ];

    /// The name the host calls the tool by.
    pub fn name(self) -> &'static str {
        match self {
            TushareTool::StockBasic => "stock_basic",
            TushareTool::Daily => "daily",
            TushareTool::Weekly => "weekly",
            TushareTool::Monthly => "monthly",
            TushareTool::IndexDaily => "index_daily",
            TushareTool::IndexWeekly => "index_weekly",
            TushareTool::IndexMonthly => "index_monthly",
            TushareTool::IndexDailyBasic => "index_dailybasic",
            TushareTool::IndexWeight => "index_weight",
        }
    }

    /// The upstream dataset the tool reads. Every tool currently shares its
    /// name with its dataset.
    pub fn api_name(self) -> &'static str {
        self.name()
    }

    pub fn description(self) -> &'static str {
        match self {
            TushareTool::StockBasic => "Get basic stock information and company details",
            TushareTool::Daily => "Get daily stock prices and trading data",
            TushareTool::Weekly => {
                "Get weekly stock prices and trading data (requires 2000+ Tushare points)"
            }
            TushareTool::Monthly => {
                "Get monthly stock prices and trading data (requires 2000+ Tushare points)"
            }
            TushareTool::IndexDaily => {
                "Get index daily prices and trading data (requires 2000+ Tushare points)"
            }
            TushareTool::IndexWeekly => {
                "Get index weekly prices and trading data (requires 600+ Tushare points)"
            }
            TushareTool::IndexMonthly => {
                "Get index monthly prices and trading data (requires 600+ Tushare points)"
            }
            TushareTool::IndexDailyBasic => {
                "Get index daily basic indicators like PE, PB, turnover rate (requires 400+ Tushare points)"
            }
            TushareTool::IndexWeight => {
                "Get index component weights and constituents (requires 2000+ Tushare points)"
            }
        }
    }

    fn title(self) -> &'static str {
        match self {
            TushareTool::StockBasic => "Stock list",
            TushareTool::Daily => "Daily stock bars",
            TushareTool::Weekly => "Weekly stock bars",
            TushareTool::Monthly => "Monthly stock bars",
            TushareTool::IndexDaily => "Daily index bars",
            TushareTool::IndexWeekly => "Weekly index bars",
            TushareTool::IndexMonthly => "Monthly index bars",
            TushareTool::IndexDailyBasic => "Index valuation indicators",
            TushareTool::IndexWeight => "Index constituent weights",
        }
    }

    /// The schema advertised for the tool's arguments.
    pub fn input_schema(self) -> ToolInputSchema {
        match self {
            TushareTool::StockBasic => input_schema_for::<StockBasicParams>(),
            TushareTool::Daily => input_schema_for::<DailyParams>(),
            TushareTool::Weekly => input_schema_for::<WeeklyParams>(),
            TushareTool::Monthly => input_schema_for::<MonthlyParams>(),
            TushareTool::IndexDaily => input_schema_for::<IndexDailyParams>(),
            TushareTool::IndexWeekly => input_schema_for::<IndexWeeklyParams>(),
            TushareTool::IndexMonthly => input_schema_for::<IndexMonthlyParams>(),
            TushareTool::IndexDailyBasic => input_schema_for::<IndexDailyBasicParams>(),
            TushareTool::IndexWeight => input_schema_for::<IndexWeightParams>(),
        }
    }

    /// Decodes `arguments` into the tool's parameter struct and re-encodes
    /// it as the upstream `params` mapping. Declared keys must have the
    /// declared JSON type; unset fields are omitted. Keys the tool does not
    /// declare are passed through unchanged for the upstream to judge.
    pub fn encode_params(
        self,
        arguments: Map<String, Value>,
    ) -> Result<Map<String, Value>, serde_json::Error> {
        match self {
            TushareTool::StockBasic => reencode::<StockBasicParams>(arguments),
            TushareTool::Daily => reencode::<DailyParams>(arguments),
            TushareTool::Weekly => reencode::<WeeklyParams>(arguments),
            TushareTool::Monthly => reencode::<MonthlyParams>(arguments),
            TushareTool::IndexDaily => reencode::<IndexDailyParams>(arguments),
            TushareTool::IndexWeekly => reencode::<IndexWeeklyParams>(arguments),
            TushareTool::IndexMonthly => reencode::<IndexMonthlyParams>(arguments),
            TushareTool::IndexDailyBasic => reencode::<IndexDailyBasicParams>(arguments),
            TushareTool::IndexWeight => reencode::<IndexWeightParams>(arguments),
        }
    }

    /// The full descriptor sent to the host on `tools/list`.
    pub fn descriptor(self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
            annotations: Some(ToolAnnotations {
                title: Some(self.title().to_string()),
                read_only_hint: Some(true),
                destructive_hint: Some(false),
                idempotent_hint: Some(true),
                open_world_hint: Some(true),
            }),
        }
    }
}

impl fmt::Display for TushareTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TushareTool {
    type Err = UnknownTool;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        TushareTool::ALL
            .into_iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| UnknownTool(name.to_string()))
    }
}

/// A tool's declared parameters plus whatever else the host sent.
#[derive(Deserialize, Serialize)]
struct Forwarded<P> {
    #[serde(flatten)]
    declared: P,
    #[serde(flatten)]
    undeclared: Map<String, Value>,
}

fn reencode<P>(arguments: Map<String, Value>) -> Result<Map<String, Value>, serde_json::Error>
where
    P: DeserializeOwned + Serialize,
{
    let params: Forwarded<P> = serde_json::from_value(Value::Object(arguments))?;
    serde_json::from_value(serde_json::to_value(params)?)
}

/// Flattens the schemars output for `P` into the `{type, description,
/// default}` property shape hosts expect. Optional fields come out of schemars as
/// `["<type>", "null"]`; the null member is dropped since every parameter
/// is optional anyway.
fn input_schema_for<P: JsonSchema>() -> ToolInputSchema {
    let root = schemars::schema_for!(P);
    let mut properties = IndexMap::new();

    if let Some(object) = root.schema.object {
        for (name, schema) in object.properties {
            let Schema::Object(schema) = schema else {
                continue;
            };
            let kind = schema
                .instance_type
                .as_ref()
                .and_then(param_kind)
                .unwrap_or(ParamKind::String);
            let (description, default) = schema
                .metadata
                .map(|metadata| (metadata.description, metadata.default))
                .unwrap_or_default();
            properties.insert(
                name,
                PropertySchema {
                    kind,
                    description,
                    default,
                },
            );
        }
    }

    ToolInputSchema::object(properties)
}

fn param_kind(instance_type: &SingleOrVec<InstanceType>) -> Option<ParamKind> {
    let primary = match instance_type {
        SingleOrVec::Single(single) => Some(**single),
        SingleOrVec::Vec(types) => types.iter().copied().find(|t| *t != InstanceType::Null),
    }?;

    match primary {
        InstanceType::String => Some(ParamKind::String),
        InstanceType::Integer => Some(ParamKind::Integer),
        InstanceType::Number => Some(ParamKind::Number),
        InstanceType::Boolean => Some(ParamKind::Boolean),
        _ => None,
    }
}

/// Registry of the tools the server exposes.
///
/// Descriptors are generated once when the registry is built and are never
/// mutated afterwards, so a shared `Tools` needs no locking.
pub struct Tools {
    tools: Vec<Tool>,
    index: HashMap<&'static str, TushareTool>,
}

impl Tools {
    /// Builds the registry over the full catalogue.
    pub fn new() -> Self {
        Self::with_tools(&TushareTool::ALL)
    }

    /// Builds a registry exposing only `tools`, in the given order.
    pub fn with_tools(tools: &[TushareTool]) -> Self {
        let mut index = HashMap::new();
        let mut descriptors = Vec::with_capacity(tools.len());
        for tool in tools {
            if index.insert(tool.name(), *tool).is_none() {
                descriptors.push(tool.descriptor());
            }
        }

        Self {
            tools: descriptors,
            index,
        }
    }

    /// Lists all registered tools in catalogue order.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    /// Resolves a tool name to its catalogue entry.
    pub fn resolve(&self, name: &str) -> Result<TushareTool, UnknownTool> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| UnknownTool(name.to_string()))
    }
}

impl Default for Tools {
    fn default() -> Self {
        Self::new()
    }
}
