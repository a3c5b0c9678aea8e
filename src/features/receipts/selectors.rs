// 一覧表示用の読み取り専用ヘルパー

use super::models::Receipt;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 並び替えの基準
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// 作成日時の新しい順
    #[default]
    Date,
    /// 合計金額の大きい順（未解析は0として扱う）
    Amount,
    /// 店舗名の辞書順（未解析は空文字として扱う）
    Merchant,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "date" => Some(SortKey::Date),
            "amount" => Some(SortKey::Amount),
            "merchant" => Some(SortKey::Merchant),
            _ => None,
        }
    }
}

/// ファイル名または店舗名に検索語を含むかどうか（大文字小文字は区別しない）
pub fn matches_search(receipt: &Receipt, term: &str) -> bool {
    let term = term.to_lowercase();
    let filename = receipt.filename().unwrap_or("").to_lowercase();
    let merchant = receipt.merchant_name().unwrap_or("").to_lowercase();
    filename.contains(&term) || merchant.contains(&term)
}

/// 検索語で絞り込む（空の検索語はすべて一致）
pub fn search<'a>(receipts: &'a [Receipt], term: &str) -> Vec<&'a Receipt> {
    receipts
        .iter()
        .filter(|receipt| matches_search(receipt, term))
        .collect()
}

/// 並び替える（同順位は元の順序を保つ）
pub fn sort_receipts(receipts: &mut [&Receipt], key: SortKey) {
    receipts.sort_by(|a, b| compare(a, b, key));
}

fn compare(a: &Receipt, b: &Receipt, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => b.created_at.cmp(&a.created_at),
        SortKey::Amount => {
            let amount_a = a.total_amount().unwrap_or(0.0);
            let amount_b = b.total_amount().unwrap_or(0.0);
            amount_b.total_cmp(&amount_a)
        }
        SortKey::Merchant => a
            .merchant_name()
            .unwrap_or("")
            .cmp(b.merchant_name().unwrap_or("")),
    }
}

/// 検索と並び替えをまとめて行う
pub fn filter_and_sort<'a>(receipts: &'a [Receipt], term: &str, key: SortKey) -> Vec<&'a Receipt> {
    let mut visible = search(receipts, term);
    sort_receipts(&mut visible, key);
    visible
}

/// 合計金額の総和（未解析の領収書は0として扱う）
pub fn total_spent<'a, I>(receipts: I) -> f64
where
    I: IntoIterator<Item = &'a Receipt>,
{
    receipts
        .into_iter()
        .filter_map(|receipt| receipt.total_amount())
        .sum()
}
