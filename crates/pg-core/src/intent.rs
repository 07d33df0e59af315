//! # Intent Router
//!
//! Deterministic keyword-priority classifier over the closed intent set.
//!
//! This is deliberately NOT a learned classifier: observed drift between
//! Turkish phrasings broke earlier LLM-routed versions, so the ordered rule
//! list below IS the contract. Rules are applied strictly top to bottom;
//! the first match wins.

use regex::Regex;

use crate::config::RouterKeywords;
use crate::models::Intent;

/// Turkish-aware lowercasing plus diacritic folding (ı→i, ş→s, ğ→g, ü→u,
/// ö→o, ç→c). Matching happens on this normalized form.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            // Turkish dotted/dotless I both fold to plain i
            'İ' | 'I' | 'ı' | 'î' | 'Î' => out.push('i'),
            'Ş' | 'ş' => out.push('s'),
            'Ğ' | 'ğ' => out.push('g'),
            'Ü' | 'ü' | 'û' | 'Û' => out.push('u'),
            'Ö' | 'ö' => out.push('o'),
            'Ç' | 'ç' => out.push('c'),
            'Â' | 'â' => out.push('a'),
            // combining dot-above left over from uppercase dotted I
            '\u{307}' => {}
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

fn tokenize(normalized: &str) -> Vec<&str> {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// The `ilan` noun family used by the delete rule, in folded form.
const ILAN_FAMILY: [&str; 4] = ["ilan", "ilani", "ilanim", "ilanimi"];

/// Product attribute keys that mark a structured listing dump.
const ATTRIBUTE_KEYS: &str = "marka|model|fiyat|baslik|kategori|durum|aciklama|konum|stok";

pub struct IntentRouter {
    cancel: Vec<String>,
    delete: Vec<String>,
    own_listings: Vec<String>,
    all_listings: Vec<String>,
    update: Vec<String>,
    confirm: Vec<String>,
    sell: Vec<String>,
    buy: Vec<String>,
    price_update_re: Regex,
    possessive_re: Regex,
    attr_pair_re: Regex,
    price_tl_re: Regex,
}

impl IntentRouter {
    pub fn new(keywords: &RouterKeywords) -> Self {
        let fold = |set: &[String]| set.iter().map(|k| normalize(k)).collect::<Vec<_>>();
        IntentRouter {
            cancel: fold(&keywords.cancel),
            delete: fold(&keywords.delete),
            own_listings: fold(&keywords.own_listings),
            all_listings: fold(&keywords.all_listings),
            update: fold(&keywords.update),
            confirm: fold(&keywords.confirm),
            sell: fold(&keywords.sell),
            buy: fold(&keywords.buy),
            // "fiyatı 27000 yap" / "fiyat 300 olsun", folded
            price_update_re: Regex::new(r"\bfiyat(?:ini|i)?\s+\S+\s+(?:yap|olsun)\b")
                .expect("static regex"),
            // "arabam var", "telefonum var"
            possessive_re: Regex::new(r"\b\p{L}+(?:um|im)\s+var\b").expect("static regex"),
            attr_pair_re: Regex::new(&format!(r"\b(?:{ATTRIBUTE_KEYS})\s*[:=]"))
                .expect("static regex"),
            price_tl_re: Regex::new(r"\d[\d.,]*\s*(?:tl|₺)").expect("static regex"),
        }
    }

    /// Pure function of `(normalized(text), has_existing_draft)`: same
    /// inputs, same output.
    pub fn classify(&self, text: &str, has_existing_draft: bool) -> Intent {
        let normalized = normalize(text);
        let tokens = tokenize(&normalized);
        // Padded token string gives whole-token semantics for phrase checks.
        let padded = format!(" {} ", tokens.join(" "));

        let any = |set: &[String]| set.iter().any(|kw| contains_keyword(&padded, kw));

        // 1. "ilan" + a delete verb wins even over cancel keywords.
        if any(&self.delete) && ILAN_FAMILY.iter().any(|n| has_token(&padded, n)) {
            return Intent::DeleteListing;
        }

        // 2. The user's own listings.
        if any(&self.own_listings) {
            return Intent::ViewMyListings;
        }

        // 3. Everyone's listings are a search, not a personal view.
        if any(&self.all_listings) {
            return Intent::SearchProduct;
        }

        // 4. Edit verbs or the "fiyatı X yap/olsun" pattern.
        if any(&self.update) || self.price_update_re.is_match(&normalized) {
            return Intent::UpdateListing;
        }

        // 5. Confirmation words only publish when a draft is waiting.
        if has_existing_draft && any(&self.confirm) {
            return Intent::PublishListing;
        }

        // 6. Selling: explicit sell verbs, the possessive-plus-sell pattern,
        //    or a structured attribute dump ("Marka: ..., Fiyat: ... TL").
        if any(&self.sell)
            || (self.possessive_re.is_match(&normalized) && has_sell_stem(&tokens))
            || self.is_attribute_dump(&normalized)
        {
            return Intent::CreateListing;
        }

        // 7. Buying vocabulary.
        if any(&self.buy) {
            return Intent::SearchProduct;
        }

        // 8. Cancel only without any ilan* token in sight.
        if any(&self.cancel) && !tokens.iter().any(|t| t.starts_with("ilan")) {
            return Intent::Cancel;
        }

        // 9. Everything else is conversation.
        Intent::SmallTalk
    }

    /// Session-cancel check used by the controller before routing. Same
    /// guard as rule 8: a cancel keyword next to an `ilan*` token is about
    /// a listing, not about the session.
    pub fn is_cancel_message(&self, text: &str) -> bool {
        let normalized = normalize(text);
        let tokens = tokenize(&normalized);
        let padded = format!(" {} ", tokens.join(" "));
        self.cancel.iter().any(|kw| contains_keyword(&padded, kw))
            && !tokens.iter().any(|t| t.starts_with("ilan"))
    }

    /// Two attribute pairs, or one pair next to a TL-denominated price,
    /// classify as a listing dump even without a sell verb.
    fn is_attribute_dump(&self, normalized: &str) -> bool {
        let pairs = self.attr_pair_re.find_iter(normalized).count();
        pairs >= 2 || (pairs == 1 && self.price_tl_re.is_match(normalized))
    }
}

/// Single words match as whole tokens; multi-word phrases anchor on a word
/// boundary and allow the last word to continue ("ilan ver" covers
/// "ilan vermek").
fn contains_keyword(padded: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        padded.contains(&format!(" {keyword}"))
    } else {
        has_token(padded, keyword)
    }
}

fn has_token(padded: &str, token: &str) -> bool {
    padded.contains(&format!(" {token} "))
}

fn has_sell_stem(tokens: &[&str]) -> bool {
    // "satın" is buying vocabulary despite the shared stem.
    tokens
        .iter()
        .any(|t| t.starts_with("sat") && !t.starts_with("satin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterKeywords;

    fn router() -> IntentRouter {
        IntentRouter::new(&RouterKeywords::default())
    }

    #[test]
    fn normalization_folds_turkish_diacritics() {
        assert_eq!(normalize("İlanımı SİL"), "ilanimi sil");
        assert_eq!(normalize("vazgeç"), "vazgec");
        assert_eq!(normalize("yayınla"), "yayinla");
    }

    #[test]
    fn delete_beats_cancel_when_both_present() {
        // "iptal" alone cancels, but next to "ilan" + a delete verb the
        // delete rule wins.
        let r = router();
        assert_eq!(r.classify("ilanımı sil, iptal olsun", false), Intent::DeleteListing);
        assert_eq!(r.classify("iptal", false), Intent::Cancel);
    }

    #[test]
    fn delete_requires_the_ilan_noun() {
        let r = router();
        assert_eq!(r.classify("şunu sil", false), Intent::SmallTalk);
        assert_eq!(r.classify("ilanı silmek istiyorum", false), Intent::DeleteListing);
        assert_eq!(r.classify("ilan kaldır", false), Intent::DeleteListing);
    }

    #[test]
    fn own_listings_and_global_search_are_distinct() {
        let r = router();
        assert_eq!(r.classify("ilanlarımı göster", false), Intent::ViewMyListings);
        assert_eq!(r.classify("bana ait ilanlar", false), Intent::ViewMyListings);
        assert_eq!(r.classify("tüm ilanları göster", false), Intent::SearchProduct);
        assert_eq!(r.classify("bu ilan kime ait", false), Intent::SearchProduct);
    }

    #[test]
    fn update_matches_verbs_and_price_pattern() {
        let r = router();
        assert_eq!(r.classify("fiyatı güncelle", false), Intent::UpdateListing);
        assert_eq!(r.classify("fiyatı 27000 yap", false), Intent::UpdateListing);
        assert_eq!(r.classify("fiyat 300 olsun", false), Intent::UpdateListing);
    }

    #[test]
    fn confirm_words_publish_only_with_a_draft() {
        let r = router();
        assert_eq!(r.classify("onayla", true), Intent::PublishListing);
        assert_eq!(r.classify("evet", true), Intent::PublishListing);
        // Without a waiting draft, "tamam" is just conversation.
        assert_eq!(r.classify("tamam", false), Intent::SmallTalk);
    }

    #[test]
    fn sell_verbs_open_listings() {
        let r = router();
        assert_eq!(r.classify("Araba satmak istiyorum", false), Intent::CreateListing);
        assert_eq!(r.classify("iphone 13 satıyorum 25 bin tl", false), Intent::CreateListing);
        assert_eq!(r.classify("ilan vermek istiyorum", false), Intent::CreateListing);
    }

    #[test]
    fn possessive_needs_a_sell_verb() {
        let r = router();
        assert_eq!(r.classify("arabam var satmak isterim", false), Intent::CreateListing);
        // Possessive alone could just as well precede a question.
        assert_eq!(r.classify("arabam var", false), Intent::SmallTalk);
    }

    #[test]
    fn attribute_dump_classifies_as_create() {
        let r = router();
        assert_eq!(
            r.classify("Marka: Toyota, Model: Corolla, Fiyat: 500.000 TL", false),
            Intent::CreateListing
        );
        assert_eq!(r.classify("Fiyat: 500.000 TL", false), Intent::CreateListing);
    }

    #[test]
    fn buy_vocabulary_searches() {
        let r = router();
        assert_eq!(r.classify("ucuz telefon var mı", false), Intent::SearchProduct);
        assert_eq!(r.classify("araba almak istiyorum", false), Intent::SearchProduct);
        assert_eq!(r.classify("bisiklet arıyorum", false), Intent::SearchProduct);
    }

    #[test]
    fn cancel_excluded_near_ilan_tokens() {
        let r = router();
        assert_eq!(r.classify("vazgeç", false), Intent::Cancel);
        // cancel keyword next to an ilan token falls through to small talk
        assert_eq!(r.classify("ilandan vazgeç", false), Intent::SmallTalk);
    }

    #[test]
    fn greetings_are_small_talk() {
        let r = router();
        assert_eq!(r.classify("Merhaba, nasılsın?", false), Intent::SmallTalk);
        assert_eq!(r.classify("teşekkürler", false), Intent::SmallTalk);
    }

    #[test]
    fn classification_is_pure() {
        let r = router();
        for _ in 0..3 {
            assert_eq!(r.classify("fiyatı 27000 yap", true), Intent::UpdateListing);
        }
    }

    #[test]
    fn whole_token_matching_avoids_substring_hits() {
        let r = router();
        // "tamamen" must not trigger the confirm keyword "tamam".
        assert_eq!(r.classify("tamamen katılıyorum", true), Intent::SmallTalk);
        // "bul" inside "bulut" must not trigger search.
        assert_eq!(r.classify("bulut gibi", false), Intent::SmallTalk);
    }
}
