//! 形の揺れるAPIレスポンス向けの寛容なデシリアライズ関数
//!
//! `#[serde(default, deserialize_with = "...")]` と組み合わせて使う。
//! 想定外の形の値は失敗にせず、`None` または既定値として扱う。

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 解析できない値を `None` として扱う
pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }

    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!("想定外の形式の値を無視します: {e}");
            Ok(None)
        }
    }
}

/// 解析できない値や `null` を既定値として扱う
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(option(deserializer)?.unwrap_or_default())
}

/// 配列のうち解析できた要素だけを残す（配列でなければ空）
pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!("配列として解析できない値を無視します: {other}");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("配列の要素を解析できないため読み飛ばします: {e}");
                None
            }
        })
        .collect())
}

/// 金額（数値または `"12.50"` のような文字列）
pub fn amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Null => None,
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_number(text),
        other => {
            warn!("金額として解析できない値を無視します: {other}");
            None
        }
    }
    .filter(|amount| amount.is_finite()))
}

/// バイト数（整数、`120.0` のような小数、または数字の文字列）
pub fn size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let size = match &value {
        Value::Null => None,
        Value::Number(number) => number.as_u64().or_else(|| number.as_f64().and_then(to_size)),
        Value::String(text) => parse_number(text).and_then(to_size),
        other => {
            warn!("ファイルサイズとして解析できない値を無視します: {other}");
            None
        }
    };
    Ok(size)
}

/// 桁区切りのカンマを除いて数値として解析する
fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse().ok()
}

fn to_size(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}
