//! Deterministic product-attribute extraction from Turkish listing text.
//!
//! Handles the two shapes sellers use: structured dumps
//! ("Marka: Toyota, Model: Corolla, Fiyat: 500.000 TL") and free-form sell
//! sentences ("iphone 13 satıyorum 25 bin tl"). Deeper semantic extraction
//! belongs to the downstream agents; this keeps the draft FSM functional
//! without them.

use regex::Regex;
use serde_json::{Map, Value};

use crate::intent::normalize;
use crate::price::clean_price;

/// Canonical condition values stored on a draft.
pub fn normalize_condition(raw: &str) -> Option<&'static str> {
    let folded = normalize(raw);
    if folded.contains("yenilenmis") || folded.contains("refurbished") {
        Some("refurbished")
    } else if folded.contains("ikinci el")
        || folded.contains("2. el")
        || folded.contains("kullanilmis")
        || folded.contains("used")
    {
        Some("used")
    } else if folded.contains("sifir") || folded.contains("yeni") || folded.contains("new") {
        Some("new")
    } else {
        None
    }
}

/// Pulls whatever attributes the text carries into a flat JSON object with
/// the keys the draft FSM merges: `title`, `price`, `condition`,
/// `category`, `description`, `location`, `stock`, `brand`, `model`.
pub fn extract_attributes(text: &str) -> Map<String, Value> {
    let mut attrs = Map::new();

    let pair_re = Regex::new(
        r"(?i)\b(marka|model|fiyat|başlık|baslik|kategori|durum|açıklama|aciklama|konum|şehir|sehir|lokasyon|stok)\s*[:=]\s*([^,;\n]+)",
    )
    .expect("static regex");

    for capture in pair_re.captures_iter(text) {
        let key = normalize(&capture[1]);
        let value = capture[2].trim();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "marka" => insert_str(&mut attrs, "brand", value),
            "model" => insert_str(&mut attrs, "model", value),
            "fiyat" => {
                if let Some(price) = clean_price(value) {
                    attrs.insert("price".into(), Value::from(price));
                }
            }
            "baslik" => insert_str(&mut attrs, "title", value),
            "kategori" => insert_str(&mut attrs, "category", value),
            "durum" => {
                if let Some(condition) = normalize_condition(value) {
                    insert_str(&mut attrs, "condition", condition);
                }
            }
            "aciklama" => insert_str(&mut attrs, "description", value),
            "konum" | "sehir" | "lokasyon" => insert_str(&mut attrs, "location", value),
            "stok" => {
                if let Ok(stock) = value.trim().parse::<i64>() {
                    attrs.insert("stock".into(), Value::from(stock));
                }
            }
            _ => {}
        }
    }

    // Brand + model compose a title when none was given explicitly.
    if !attrs.contains_key("title") {
        if let (Some(brand), Some(model)) = (
            attrs.get("brand").and_then(Value::as_str),
            attrs.get("model").and_then(Value::as_str),
        ) {
            let title = format!("{brand} {model}");
            attrs.insert("title".into(), Value::from(title));
        }
    }

    // Free-form price: "25 bin tl", "54,999 TL", "fiyatı 27000 yap".
    if !attrs.contains_key("price") {
        if let Some(price) = freeform_price(text) {
            attrs.insert("price".into(), Value::from(price));
        }
    }

    // Free-form condition words.
    if !attrs.contains_key("condition") {
        if let Some(condition) = normalize_condition(text) {
            insert_str(&mut attrs, "condition", condition);
        }
    }

    // Free-form title for sell sentences: the product words that remain
    // after dropping verbs, prices, and filler. Only sell sentences carry
    // one; edit phrases ("fiyatı 2500 yap") must not grow a title.
    if !attrs.contains_key("title") && has_sell_marker(text) {
        if let Some(title) = freeform_title(text) {
            insert_str(&mut attrs, "title", &title);
        }
    }

    attrs
}

fn has_sell_marker(text: &str) -> bool {
    let folded = normalize(text);
    folded.contains("ilan ver")
        || folded
            .split(|c: char| !c.is_alphanumeric())
            .any(|t| t.starts_with("sat") && !t.starts_with("satin"))
}

fn insert_str(attrs: &mut Map<String, Value>, key: &str, value: &str) {
    attrs.insert(key.to_string(), Value::from(value.trim().to_string()));
}

fn freeform_price(text: &str) -> Option<i64> {
    let folded = normalize(text);

    // "fiyatı 27000 yap" / "fiyat 300 olsun"
    let update_re = Regex::new(r"\bfiyat(?:ini|i)?\s+(\S+)\s+(?:yap|olsun)\b").expect("static regex");
    if let Some(capture) = update_re.captures(&folded) {
        if let Some(price) = clean_price(&capture[1]) {
            return Some(price);
        }
    }

    // Any TL-denominated amount, scale words included.
    let amount_re =
        Regex::new(r"\d[\d.,]*\s*(?:bin|milyon)?\s*(?:tl|₺)").expect("static regex");
    if let Some(found) = amount_re.find(&folded) {
        return clean_price(found.as_str());
    }
    None
}

/// Words that carry no product information in a sell sentence.
const TITLE_STOPWORDS: [&str; 19] = [
    "satiyorum",
    "satmak",
    "satayim",
    "satilik",
    "istiyorum",
    "isterim",
    "ilan",
    "ver",
    "vermek",
    "tl",
    "lira",
    "bin",
    "milyon",
    "adet",
    "sifir",
    "ikinci",
    "el",
    "kullanilmis",
    "yenilenmis",
];

const SCALE_WORDS: [&str; 4] = ["bin", "milyon", "tl", "lira"];

fn freeform_title(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let folded: Vec<String> = words
        .iter()
        .map(|w| normalize(w.trim_matches(|c: char| !c.is_alphanumeric())))
        .collect();

    let mut kept: Vec<&str> = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let f = &folded[i];
        if f.is_empty() || TITLE_STOPWORDS.contains(&f.as_str()) {
            continue;
        }
        if f.chars().all(|c| c.is_ascii_digit()) {
            // A number directly before a scale or currency word is a price
            // ("25 bin tl"); a short one elsewhere is a model ("iphone 13").
            let before_scale = folded
                .get(i + 1)
                .is_some_and(|next| SCALE_WORDS.contains(&next.as_str()));
            if before_scale || f.len() > 4 {
                continue;
            }
        }
        if f.chars().any(|c| c.is_ascii_digit()) && f.contains(['.', ',']) {
            continue;
        }
        kept.push(word);
        if kept.len() == 4 {
            break;
        }
    }
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}
