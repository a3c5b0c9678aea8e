pub mod lenient;

use chrono::{DateTime, NaiveDateTime, Utc};

/// APIサーバーが返す日時文字列を解析する
///
/// # 対応形式
/// - RFC3339（タイムゾーン付き）
/// - タイムゾーンなしのISO8601（UTCとして扱う）
///
/// # 戻り値
/// 解析できた場合はSome、それ以外はNone
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    // バックエンドはタイムゾーンなしのUTC日時を返すことがある
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// 日時文字列を解析し、失敗時はフォールバック値を使う
pub fn parse_timestamp_or(value: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match value {
        Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
            log::warn!("日時の解析に失敗しました: {raw}");
            fallback
        }),
        None => fallback,
    }
}

/// ファイルサイズを人が読みやすい形式に変換する
///
/// # 例
/// - 0 → "0 Bytes"
/// - 1536 → "1.5 KB"
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    // 小数点以下2桁に丸め、末尾の0は落とす
    let rounded = format!("{size:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
