//! Typed access to the crypto tool server's tools.
//!
//! The server answers with MCP content arrays whose text blocks hold JSON
//! documents. Each wrapper calls one tool and decodes that JSON into the
//! matching type.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::model::ToolCall;
use crate::tools::{ToolError, ToolHost};
use crate::{Error, Result};

pub const GET_PRICE: &str = "get_price";
pub const GET_COIN_LIST: &str = "get_coin_list";
pub const GET_MARKET_DATA: &str = "get_market_data";
pub const GET_TRENDING: &str = "get_trending";

/// Prices keyed by coin id, then by quote currency.
pub type PriceTable = HashMap<String, HashMap<String, f64>>;

/// Arguments for [`CryptoTools::get_price`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<String>,
    /// Comma-separated quote currencies.
    pub vs_currencies: String,
}

impl Default for PriceQuery {
    fn default() -> Self {
        Self {
            ids: None,
            symbols: None,
            vs_currencies: "usd".to_string(),
        }
    }
}

impl PriceQuery {
    pub fn ids(ids: impl Into<String>) -> Self {
        Self {
            ids: Some(ids.into()),
            ..Self::default()
        }
    }

    pub fn symbols(symbols: impl Into<String>) -> Self {
        Self {
            symbols: Some(symbols.into()),
            ..Self::default()
        }
    }

    pub fn vs_currencies(mut self, vs_currencies: impl Into<String>) -> Self {
        self.vs_currencies = vs_currencies.into();
        self
    }
}

/// Arguments for [`CryptoTools::get_market_data`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketQuery {
    pub vs_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
    pub sparkline: bool,
}

impl Default for MarketQuery {
    fn default() -> Self {
        Self {
            vs_currency: "usd".to_string(),
            ids: None,
            category: None,
            order: "market_cap_desc".to_string(),
            per_page: 100,
            page: 1,
            sparkline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoinInfo {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// One row of the markets listing. Upstream leaves many fields null for
/// young or thinly traded coins.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketData {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub fully_diluted_valuation: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_change_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub max_supply: Option<f64>,
    #[serde(default)]
    pub ath: Option<f64>,
    #[serde(default)]
    pub ath_change_percentage: Option<f64>,
    #[serde(default)]
    pub ath_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub atl: Option<f64>,
    #[serde(default)]
    pub atl_change_percentage: Option<f64>,
    #[serde(default)]
    pub atl_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrendingResponse {
    pub coins: Vec<TrendingEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrendingEntry {
    pub item: TrendingCoin,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrendingCoin {
    pub id: String,
    #[serde(default)]
    pub coin_id: Option<u64>,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub price_btc: Option<f64>,
    #[serde(default)]
    pub score: Option<u32>,
}

/// Typed wrappers over a [`ToolHost`] serving the crypto tools.
pub struct CryptoTools<'a, H> {
    host: &'a H,
}

impl<'a, H: ToolHost> CryptoTools<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Current prices of the requested coins.
    pub async fn get_price(&self, query: &PriceQuery) -> Result<PriceTable> {
        let output = self.call(GET_PRICE, to_arguments(query)?).await?;
        decode_document(&output).map_err(|e| report(GET_PRICE, e))
    }

    /// Every coin the upstream knows about.
    pub async fn get_coin_list(&self) -> Result<Vec<CoinInfo>> {
        let output = self.call(GET_COIN_LIST, Value::Object(Default::default())).await?;
        decode_list(&output).map_err(|e| report(GET_COIN_LIST, e))
    }

    /// A page of the markets listing.
    pub async fn get_market_data(&self, query: &MarketQuery) -> Result<Vec<MarketData>> {
        let output = self.call(GET_MARKET_DATA, to_arguments(query)?).await?;
        decode_list(&output).map_err(|e| report(GET_MARKET_DATA, e))
    }

    /// Coins trending in the last 24 hours.
    pub async fn get_trending(&self) -> Result<TrendingResponse> {
        let output = self.call(GET_TRENDING, Value::Object(Default::default())).await?;
        decode_document(&output).map_err(|e| report(GET_TRENDING, e))
    }

    async fn call(&self, name: &str, input: Value) -> Result<Value> {
        let call = ToolCall {
            id: format!("direct-{name}"),
            name: name.to_string(),
            input,
        };
        self.host
            .execute(&call)
            .await
            .map_err(|e| report(name, e))
    }
}

fn report(name: &str, e: ToolError) -> Error {
    error!(tool = name, error = %e, "crypto tool request failed");
    Error::tool(name, e)
}

fn to_arguments(query: &impl Serialize) -> Result<Value> {
    serde_json::to_value(query)
        .map_err(|e| Error::tool("arguments", ToolError::InvalidInput(e.to_string())))
}

/// Pull the JSON documents out of a tool payload.
///
/// An MCP content array yields one document per text block. Any other value
/// is taken to be the document itself.
fn documents(output: &Value) -> std::result::Result<Vec<Value>, ToolError> {
    let blocks = match output.as_array() {
        Some(blocks) if !blocks.is_empty() && blocks.iter().all(is_content_block) => blocks,
        _ => return Ok(vec![output.clone()]),
    };

    let texts: Vec<&str> = blocks
        .iter()
        .filter_map(|block| block["text"].as_str())
        .collect();
    if texts.is_empty() {
        return Err(ToolError::MalformedPayload(
            "tool result has no text content".to_string(),
        ));
    }

    texts
        .into_iter()
        .map(|text| {
            serde_json::from_str(text).map_err(|e| ToolError::MalformedPayload(e.to_string()))
        })
        .collect()
}

fn is_content_block(value: &Value) -> bool {
    value.get("type").is_some_and(Value::is_string)
}

fn decode_document<T: DeserializeOwned>(output: &Value) -> std::result::Result<T, ToolError> {
    let mut docs = documents(output)?;
    if docs.len() != 1 {
        return Err(ToolError::MalformedPayload(format!(
            "expected one JSON document, got {}",
            docs.len()
        )));
    }
    serde_json::from_value(docs.remove(0)).map_err(|e| ToolError::MalformedPayload(e.to_string()))
}

/// Lists come either as one array document or as one document per element.
fn decode_list<T: DeserializeOwned>(output: &Value) -> std::result::Result<Vec<T>, ToolError> {
    let docs = documents(output)?;
    let items = match <[Value; 1]>::try_from(docs) {
        Ok([Value::Array(items)]) => items,
        Ok([single]) => vec![single],
        Err(docs) => docs,
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| ToolError::MalformedPayload(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolSpec;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every tool with a fixed payload and records the calls.
    struct FixedTools {
        payload: Value,
        calls: Mutex<Vec<ToolCall>>,
    }

    impl FixedTools {
        fn text(texts: &[&str]) -> Self {
            let blocks: Vec<Value> = texts
                .iter()
                .map(|t| json!({"type": "text", "text": t}))
                .collect();
            Self {
                payload: Value::Array(blocks),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn last_call(&self) -> ToolCall {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl ToolHost for FixedTools {
        fn specs(&self) -> &[ToolSpec] {
            &[]
        }

        async fn execute(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
            self.calls.lock().unwrap().push(call.clone());
            Ok(self.payload.clone())
        }
    }

    #[tokio::test]
    async fn price_has_numeric_usd_and_eur() {
        let host = FixedTools::text(&[r#"{"bitcoin":{"usd":65000.5,"eur":60000.25}}"#]);
        let tools = CryptoTools::new(&host);

        let prices = tools
            .get_price(&PriceQuery::ids("bitcoin").vs_currencies("usd,eur"))
            .await
            .unwrap();

        assert_eq!(prices["bitcoin"]["usd"], 65000.5);
        assert_eq!(prices["bitcoin"]["eur"], 60000.25);

        let call = host.last_call();
        assert_eq!(call.name, GET_PRICE);
        assert_eq!(call.input, json!({"ids": "bitcoin", "vs_currencies": "usd,eur"}));
    }

    #[tokio::test]
    async fn malformed_json_is_reported() {
        let host = FixedTools::text(&["{\"bitcoin\": {\"usd\": 650"]);
        let tools = CryptoTools::new(&host);

        let err = tools.get_price(&PriceQuery::ids("bitcoin")).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Tool { ref name, source: ToolError::MalformedPayload(_) } if name == GET_PRICE
        ));
    }

    #[tokio::test]
    async fn wrong_shape_is_reported() {
        let host = FixedTools::text(&[r#"{"bitcoin":{"usd":"a lot"}}"#]);
        let tools = CryptoTools::new(&host);

        let err = tools.get_price(&PriceQuery::default()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Tool { source: ToolError::MalformedPayload(_), .. }
        ));
    }

    #[tokio::test]
    async fn market_data_defaults_and_per_block_rows() {
        let host = FixedTools::text(&[
            r#"{"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":65000.5,
                "market_cap_rank":1,"ath_date":"2024-03-14T07:10:36.635Z","max_supply":21000000}"#,
            r#"{"id":"ethereum","symbol":"eth","name":"Ethereum","current_price":3400.1,
                "market_cap_rank":2,"max_supply":null}"#,
        ]);
        let tools = CryptoTools::new(&host);

        let rows = tools
            .get_market_data(&MarketQuery {
                per_page: 10,
                ..MarketQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].market_cap_rank, Some(1));
        assert_eq!(rows[0].ath_date.unwrap().timestamp(), 1710400236);
        assert!(rows[1].max_supply.is_none());

        assert_eq!(
            host.last_call().input,
            json!({
                "vs_currency": "usd",
                "order": "market_cap_desc",
                "per_page": 10,
                "page": 1,
                "sparkline": false
            })
        );
    }

    #[tokio::test]
    async fn coin_list_accepts_single_array_block() {
        let host = FixedTools::text(&[
            r#"[{"id":"bitcoin","symbol":"btc","name":"Bitcoin"},{"id":"ethereum","symbol":"eth","name":"Ethereum"}]"#,
        ]);
        let tools = CryptoTools::new(&host);

        let coins = tools.get_coin_list().await.unwrap();

        assert_eq!(coins.len(), 2);
        assert_eq!(coins[1].symbol, "eth");
        assert_eq!(host.last_call().input, json!({}));
    }

    #[tokio::test]
    async fn trending_coins_decode() {
        let host = FixedTools::text(&[
            r#"{"coins":[{"item":{"id":"pepe","coin_id":29850,"name":"Pepe","symbol":"PEPE",
                "market_cap_rank":30,"thumb":"https://img/pepe.png","price_btc":1.4e-10,"score":0}}]}"#,
        ]);
        let tools = CryptoTools::new(&host);

        let trending = tools.get_trending().await.unwrap();

        assert_eq!(trending.coins.len(), 1);
        assert_eq!(trending.coins[0].item.symbol, "PEPE");
        assert_eq!(trending.coins[0].item.score, Some(0));
        assert!(trending.coins[0].item.slug.is_none());
    }

    #[test]
    fn non_content_payload_is_the_document() {
        let payload = json!({"bitcoin": {"usd": 1.0}});
        let prices: PriceTable = decode_document(&payload).unwrap();
        assert_eq!(prices["bitcoin"]["usd"], 1.0);
    }

    #[test]
    fn content_without_text_is_malformed() {
        let payload = json!([{"type": "image", "data": "aGk=", "mimeType": "image/png"}]);
        assert!(matches!(
            documents(&payload),
            Err(ToolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn multiple_documents_for_single_value_is_malformed() {
        let payload = json!([
            {"type": "text", "text": "{}"},
            {"type": "text", "text": "{}"}
        ]);
        assert!(decode_document::<TrendingResponse>(&payload).is_err());
    }
}
