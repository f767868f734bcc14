//! Plain-text rendering of tool listings and crypto data.

use std::fmt::Write;

use runtime::ToolSpec;
use runtime::crypto::{CoinInfo, MarketData, PriceTable, TrendingResponse};

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn tools(specs: &[ToolSpec]) -> String {
    if specs.is_empty() {
        return "No tools available.".to_string();
    }

    let width = specs.iter().map(|s| s.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for spec in specs {
        let _ = writeln!(out, "{:<width$}  {}", spec.name, spec.description);
    }
    out
}

/// One line per coin and currency, sorted. Table ordering is unspecified
/// otherwise.
pub fn prices(table: &PriceTable) -> String {
    let mut coins: Vec<_> = table.iter().collect();
    coins.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (coin, quotes) in coins {
        let mut quotes: Vec<_> = quotes.iter().collect();
        quotes.sort_by(|a, b| a.0.cmp(b.0));
        for (currency, amount) in quotes {
            let _ = writeln!(out, "{coin}: {amount} {}", currency.to_uppercase());
        }
    }
    out
}

pub fn coins(list: &[CoinInfo], limit: usize) -> String {
    let mut out = String::new();
    for coin in list.iter().take(limit) {
        let _ = writeln!(out, "{:<24}  {:<8}  {}", coin.id, coin.symbol, coin.name);
    }
    if list.len() > limit {
        let _ = writeln!(out, "... {} more", list.len() - limit);
    }
    out
}

pub fn markets(rows: &[MarketData]) -> String {
    let mut out = format!(
        "{:<5} {:<20} {:<8} {:>14} {:>20} {:>8}\n",
        "RANK", "NAME", "SYMBOL", "PRICE", "MARKET CAP", "24H %"
    );
    for row in rows {
        let change = row
            .price_change_percentage_24h
            .map(|pct| format!("{pct:.2}"));
        let _ = writeln!(
            out,
            "{:<5} {:<20} {:<8} {:>14} {:>20} {:>8}",
            cell(row.market_cap_rank),
            row.name,
            row.symbol.to_uppercase(),
            cell(row.current_price),
            cell(row.market_cap),
            cell(change),
        );
    }
    out
}

pub fn trending(response: &TrendingResponse) -> String {
    let mut out = String::new();
    for (i, entry) in response.coins.iter().enumerate() {
        let coin = &entry.item;
        let _ = writeln!(
            out,
            "{:>2}. {} ({}) rank {}",
            i + 1,
            coin.name,
            coin.symbol.to_uppercase(),
            cell(coin.market_cap_rank),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn prices_are_sorted_by_coin_then_currency() {
        let mut table = PriceTable::new();
        table.insert(
            "ethereum".into(),
            HashMap::from([("usd".to_string(), 3100.0)]),
        );
        table.insert(
            "bitcoin".into(),
            HashMap::from([("usd".to_string(), 65000.5), ("eur".to_string(), 60000.25)]),
        );

        assert_eq!(
            prices(&table),
            "bitcoin: 60000.25 EUR\nbitcoin: 65000.5 USD\nethereum: 3100 USD\n"
        );
    }

    #[test]
    fn tools_align_names() {
        let specs = vec![
            ToolSpec {
                name: "get_price".into(),
                description: "Coin prices".into(),
                schema: json!({}),
            },
            ToolSpec {
                name: "get_trending".into(),
                description: "Trending coins".into(),
                schema: json!({}),
            },
        ];

        assert_eq!(
            tools(&specs),
            "get_price     Coin prices\nget_trending  Trending coins\n"
        );
        assert_eq!(tools(&[]), "No tools available.");
    }

    #[test]
    fn coins_are_truncated_at_limit() {
        let list: Vec<CoinInfo> = (0..3)
            .map(|i| CoinInfo {
                id: format!("coin-{i}"),
                symbol: format!("c{i}"),
                name: format!("Coin {i}"),
            })
            .collect();

        let out = coins(&list, 2);
        assert_eq!(out.lines().count(), 3);
        assert!(out.ends_with("... 1 more\n"));
    }

    #[test]
    fn markets_fill_missing_fields() {
        let rows: Vec<MarketData> = serde_json::from_value(json!([
            {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin",
             "current_price": 65000.5, "market_cap": 1.28e12, "market_cap_rank": 1,
             "price_change_percentage_24h": -1.234},
            {"id": "newcoin", "symbol": "new", "name": "New Coin"}
        ]))
        .unwrap();

        let out = markets(&rows);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1     Bitcoin"));
        assert!(lines[1].contains("BTC"));
        assert!(lines[1].ends_with("-1.23"));
        assert!(lines[2].starts_with("-     New Coin"));
    }

    #[test]
    fn trending_is_numbered() {
        let response: TrendingResponse = serde_json::from_value(json!({
            "coins": [
                {"item": {"id": "pepe", "name": "Pepe", "symbol": "pepe", "market_cap_rank": 24}},
                {"item": {"id": "fresh", "name": "Fresh", "symbol": "frs"}}
            ]
        }))
        .unwrap();

        assert_eq!(
            trending(&response),
            " 1. Pepe (PEPE) rank 24\n 2. Fresh (FRS) rank -\n"
        );
    }
}
