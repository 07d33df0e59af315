//! Deterministic category inference for listings.
//!
//! A keyword scorer over the Turkish category library. This fills the
//! category when the seller never names one, and arbitrates when their
//! choice disagrees with a confident inference.

use crate::intent::normalize;

/// Category library with their scoring keywords (folded at match time).
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Otomotiv",
        &[
            "araba", "araç", "otomobil", "motor", "kamyon", "motorsiklet", "bmw", "mercedes",
            "volkswagen", "renault", "toyota", "honda", "lastik", "jant",
        ],
    ),
    (
        "Elektronik",
        &[
            "telefon", "bilgisayar", "laptop", "tablet", "televizyon", "iphone", "samsung",
            "macbook", "konsol", "playstation", "xbox", "kulaklık", "şarj", "kamera",
        ],
    ),
    (
        "Emlak",
        &[
            "ev", "daire", "dubleks", "villa", "arsa", "işyeri", "ofis", "kiralık", "satılık",
            "bahçe", "site", "kat", "oda", "salon", "balkon",
        ],
    ),
    (
        "Mobilya",
        &[
            "koltuk", "masa", "sandalye", "dolap", "yatak", "kanepe", "gardırop", "kitaplık",
            "konsol", "berjer",
        ],
    ),
    (
        "Giyim",
        &[
            "ayakkabı", "bot", "mont", "kaban", "pantolon", "gömlek", "elbise", "ceket",
            "tişört", "etek",
        ],
    ),
    (
        "Kozmetik & Bakım",
        &[
            "kolonya", "parfüm", "koku", "deodorant", "şampuan", "sabun", "krem", "makyaj",
            "cilt bakımı", "tıraş",
        ],
    ),
    (
        "Spor & Outdoor",
        &[
            "bisiklet", "scooter", "kamp", "çadır", "fitness", "dağ bisikleti", "kayak",
            "dalış", "koşu bandı",
        ],
    ),
    (
        "Hobi & Eğlence",
        &["gitar", "piyano", "kitap", "roman", "koleksiyon", "pul", "oyun", "puzzle"],
    ),
    (
        "Anne & Bebek",
        &[
            "bebek arabası", "mama sandalyesi", "oyuncak", "bebek odası", "biberon",
            "bebek giysileri",
        ],
    ),
    (
        "Hayvanlar",
        &["köpek", "kedi", "kuş", "akvaryum", "mama", "kafes", "evcil hayvan", "pet"],
    ),
    (
        "Ev & Yaşam",
        &[
            "mutfak", "tencere", "tabak", "dekorasyon", "vazo", "lamba", "halı", "perde",
            "tekstil",
        ],
    ),
];

pub const DEFAULT_CATEGORY: &str = "Genel";

/// Scored suggestion from the keyword library.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySuggestion {
    pub category: &'static str,
    /// Match count capped to 1.0 at three keyword hits
    pub confidence: f32,
}

/// Score every category against title + description and return the best
/// match, if any keyword hit at all.
pub fn suggest_category(title: &str, description: Option<&str>) -> Option<CategorySuggestion> {
    let mut text = normalize(title);
    if let Some(desc) = description {
        text.push(' ');
        text.push_str(&normalize(desc));
    }

    let mut best: Option<(&'static str, u32)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let score = keywords
            .iter()
            .filter(|kw| text.contains(normalize(kw).as_str()))
            .count() as u32;
        if score > 0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((category, score));
        }
    }

    best.map(|(category, score)| CategorySuggestion {
        category,
        confidence: (score as f32 / 3.0).min(1.0),
    })
}

/// Category filled from the user's choice when present, otherwise inferred,
/// otherwise the generic bucket. Returns `(category, corrected_from)`:
/// `corrected_from` carries the user's original when a confident inference
/// overrode it.
pub fn resolve_category(
    user_category: Option<&str>,
    title: &str,
    description: Option<&str>,
) -> (String, Option<String>) {
    let suggestion = suggest_category(title, description);
    match user_category {
        None => (
            suggestion
                .map(|s| s.category.to_string())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            None,
        ),
        Some(user) => match suggestion {
            Some(s) if s.confidence >= 0.6 && !categories_agree(user, s.category) => {
                (s.category.to_string(), Some(user.to_string()))
            }
            _ => (user.to_string(), None),
        },
    }
}

fn categories_agree(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    a.contains(&b) || b.contains(&a)
}

/// The metadata `type` discriminator the storefront filters on.
pub fn listing_type(category: &str) -> &'static str {
    let folded = normalize(category);
    if folded.contains("otomotiv") || folded.contains("arac") || folded.contains("vasita") {
        "vehicle"
    } else if folded.contains("elektronik") || folded.contains("telefon") {
        "electronics"
    } else if folded.contains("emlak") || folded.contains("konut") {
        "property"
    } else if folded.contains("giyim") || folded.contains("moda") {
        "fashion"
    } else {
        "general"
    }
}
