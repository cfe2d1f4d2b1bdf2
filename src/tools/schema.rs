//! Typed tool schemas
//!
//! Every tool the analyst can call is a variant of [`ToolId`]; its parameter
//! schema and remote binding are fixed at compile time.

use crate::error::OrchestrationError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    GetTopTrendingTickers,
    GetNews,
    ScrapeWebsite,
    GetOptions,
    GetVolatilityData,
    ProcessWsbData,
    GetTickerAnalysis,
    FetchFearAndGreed,
    FetchBitcoinFearAndGreed,
}

/// Location of a tool on the remote-execution platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteBinding {
    pub app: &'static str,
    pub function: &'static str,
}

impl ToolId {
    pub const ALL: [ToolId; 9] = [
        ToolId::GetTopTrendingTickers,
        ToolId::GetNews,
        ToolId::ScrapeWebsite,
        ToolId::GetOptions,
        ToolId::GetVolatilityData,
        ToolId::ProcessWsbData,
        ToolId::GetTickerAnalysis,
        ToolId::FetchFearAndGreed,
        ToolId::FetchBitcoinFearAndGreed,
    ];

    /// Toolset advertised to the analyst persona unless configured otherwise.
    pub const ANALYST_DEFAULTS: [ToolId; 7] = [
        ToolId::GetTopTrendingTickers,
        ToolId::GetNews,
        ToolId::ScrapeWebsite,
        ToolId::GetOptions,
        ToolId::GetVolatilityData,
        ToolId::ProcessWsbData,
        ToolId::GetTickerAnalysis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolId::GetTopTrendingTickers => "get_top_trending_tickers",
            ToolId::GetNews => "get_news",
            ToolId::ScrapeWebsite => "scrape_website",
            ToolId::GetOptions => "get_options",
            ToolId::GetVolatilityData => "get_volatility_data",
            ToolId::ProcessWsbData => "process_wsb_data",
            ToolId::GetTickerAnalysis => "get_ticker_analysis",
            ToolId::FetchFearAndGreed => "fetch_fear_and_greed",
            ToolId::FetchBitcoinFearAndGreed => "fetch_bitcoin_fear_and_greed",
        }
    }

    pub fn binding(self) -> RemoteBinding {
        let (app, function) = match self {
            ToolId::GetTopTrendingTickers => ("trending-stocks", "get_top_trending_tickers"),
            ToolId::GetNews => ("news", "get_news"),
            ToolId::ScrapeWebsite => ("firecrawl-app", "scrape_website"),
            ToolId::GetOptions => ("options", "get_options"),
            ToolId::GetVolatilityData => ("volatility-analysis", "get_volatility_data"),
            ToolId::ProcessWsbData => ("wsb-client", "process_wsb_data"),
            // The report generator is exposed under a different function name.
            ToolId::GetTickerAnalysis => ("ticker-analysis", "generate_investment_report"),
            ToolId::FetchFearAndGreed => ("fear-and-greed", "fetch_fear_and_greed"),
            ToolId::FetchBitcoinFearAndGreed => {
                ("bitcoin-fear-and-greed", "fetch_bitcoin_fear_and_greed")
            }
        };

        RemoteBinding { app, function }
    }

    pub fn schema(self) -> ToolSchema {
        use ParamType::{Integer, Number, StringArray};

        let (description, parameters) = match self {
            ToolId::GetTopTrendingTickers => (
                "Fetch a list of the top trending stock tickers from social media platforms like WallStreetBets",
                vec![ParamSpec::optional("num_stocks", Integer, "Number of trending stocks to return")
                    .with_default(json!(10))],
            ),
            ToolId::GetNews => (
                "Fetch recent news articles about a specific topic",
                vec![
                    ParamSpec::required(
                        "search_term",
                        ParamType::String,
                        "The main topic or keyword to search for in news articles",
                    ),
                    ParamSpec::optional(
                        "search_description",
                        ParamType::String,
                        "Additional context or keywords to refine the search",
                    ),
                    ParamSpec::optional("max_results", Integer, "Maximum number of news articles to return")
                        .with_default(json!(10)),
                ],
            ),
            ToolId::ScrapeWebsite => (
                "Scrape a website URL and return its content, metadata and a cleaned version of the main text",
                vec![ParamSpec::required("url", ParamType::String, "The full URL of the website to scrape")],
            ),
            ToolId::GetOptions => (
                "Retrieve the options with the highest open interest for a ticker symbol",
                vec![
                    ParamSpec::required("ticker_symbol", ParamType::String, "The ticker symbol of the stock"),
                    ParamSpec::optional(
                        "num_options",
                        Integer,
                        "Number of top options to retrieve based on open interest",
                    )
                    .with_default(json!(10)),
                    ParamSpec::optional("start_date", ParamType::String, "Start date for option expiry filter (YYYY-MM-DD)"),
                    ParamSpec::optional("end_date", ParamType::String, "End date for option expiry filter (YYYY-MM-DD)"),
                    ParamSpec::optional("strike_lower", Number, "Lower bound for strike price"),
                    ParamSpec::optional("strike_upper", Number, "Upper bound for strike price"),
                    ParamSpec::optional(
                        "option_type",
                        ParamType::String,
                        "Filter by option type ('C' for calls, 'P' for puts)",
                    )
                    .one_of(&["C", "P"]),
                ],
            ),
            ToolId::GetVolatilityData => (
                "Fetch volatility metrics (IV rank, liquidity, borrow rate, earnings dates) for watchlist symbols and extra tickers",
                vec![
                    ParamSpec::optional(
                        "additional_tickers",
                        StringArray,
                        "Additional ticker symbols to include regardless of metrics",
                    ),
                    ParamSpec::optional("iv_rank_below", Number, "Include symbols with IV rank below this value (0-1)"),
                    ParamSpec::optional("iv_rank_above", Number, "Include symbols with IV rank above this value (0-1)"),
                ],
            ),
            ToolId::ProcessWsbData => (
                "Fetch and analyze recent WallStreetBets posts and comments",
                vec![],
            ),
            ToolId::GetTickerAnalysis => (
                "Generate a comprehensive investment report for a specific ticker symbol",
                vec![ParamSpec::required(
                    "ticker_to_research",
                    ParamType::String,
                    "The ticker symbol to research (e.g., 'TSLA')",
                )],
            ),
            ToolId::FetchFearAndGreed => (
                "Get the CNN Fear & Greed index with its current score and recent history",
                vec![ParamSpec::optional("days", Integer, "Number of historical days to include (0 = current only)")
                    .with_default(json!(30))],
            ),
            ToolId::FetchBitcoinFearAndGreed => (
                "Get the crypto Fear & Greed index history",
                vec![ParamSpec::optional("days", Integer, "Number of historical days to include")
                    .with_default(json!(30))],
            ),
        };

        ToolSchema {
            name: self.name(),
            description,
            parameters,
        }
    }
}

impl FromStr for ToolId {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ToolId::ALL
            .into_iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| OrchestrationError::ToolNotFound(name.to_string()))
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for RemoteBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.function)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    StringArray,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    pub allowed: &'static [&'static str],
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
            default: None,
            allowed: &[],
        }
    }

    pub fn optional(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut property = match self.kind {
            ParamType::String => json!({ "type": "string" }),
            ParamType::Integer => json!({ "type": "integer" }),
            ParamType::Number => json!({ "type": "number" }),
            ParamType::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        };

        property["description"] = json!(self.description);
        if let Some(default) = &self.default {
            property["default"] = default.clone();
        }
        if !self.allowed.is_empty() {
            property["enum"] = json!(self.allowed);
        }

        property
    }
}

/// Machine-readable description of one tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSchema {
    /// JSON-Schema object describing the tool's input.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            properties.insert(param.name.to_string(), param.to_json_schema());
            if param.required {
                required.push(param.name);
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
