//! User-visible Turkish message catalogue.
//!
//! The controller is the single place that turns domain outcomes and error
//! kinds into chat text. Technical detail goes to the logs, never in here.

use chrono::{DateTime, Utc};
use pg_core::error::GatewayError;
use pg_core::models::Draft;
use serde_json::Value;

pub fn pin_prompt() -> String {
    "🔒 Güvenlik için 4 haneli PIN kodunuzu girin".to_string()
}

pub fn login_success(minutes: u64) -> String {
    format!("✅ Giriş başarılı! 🕐 {minutes} dakika boyunca işlem yapabilirsiniz.")
}

pub fn pin_invalid(remaining_attempts: u32) -> String {
    format!("❌ PIN hatalı. {remaining_attempts} deneme hakkınız kaldı")
}

pub fn pin_locked(blocked_until: DateTime<Utc>) -> String {
    let minutes = (blocked_until - Utc::now()).num_minutes().max(1);
    format!("🚫 Çok fazla hatalı deneme. Hesabınız kilitlendi, {minutes} dakika sonra tekrar deneyin.")
}

pub fn pin_not_registered() -> String {
    "Bu numara için kayıtlı PIN bulunamadı. Lütfen önce hesabınızda PIN oluşturun.".to_string()
}

pub fn pin_registered() -> String {
    "PIN başarıyla kaydedildi. Lütfen PIN'inizi güvenli bir yerde saklayın.".to_string()
}

pub fn session_cancelled() -> String {
    "✅ İşlem iptal edildi. Oturumunuz kapatıldı.".to_string()
}

pub fn safety_refusal(message: &str) -> String {
    if message.trim().is_empty() {
        "🚫 Bu görsel pazaryeri kurallarına uygun değil. İlan oluşturulamaz.".to_string()
    } else {
        format!("🚫 {message}")
    }
}

pub fn missing_field(field: &str) -> String {
    let label = match field {
        "title" => "Ürün başlığı",
        "price" => "Fiyat",
        "category" => "Kategori",
        other => other,
    };
    format!("{label} bilgisi gerekli. Lütfen belirtin.")
}

pub fn draft_preview(draft: &Draft) -> String {
    let bag = draft.listing_data.as_object();
    let field = |key: &str| {
        bag.and_then(|b| b.get(key))
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_string()
    };
    let price = bag
        .and_then(|b| b.get("price"))
        .and_then(Value::as_i64)
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "📝 İlan önizlemesi:\n\
         📱 {}\n\
         💰 {} TL\n\
         📦 Durum: {}\n\
         📍 {}\n\
         \n\
         ✅ Onaylamak için 'onayla' yazın\n\
         ✏️ Değiştirmek için 'fiyat X olsun' gibi komutlar verin",
        field("title"),
        price,
        field("condition"),
        field("location"),
    )
}

pub fn publish_success(title: &str, price: i64, location: &str, listing_id: uuid::Uuid) -> String {
    format!(
        "✅ İlanınız başarıyla yayınlandı!\n\
         📱 {title}\n\
         💰 {price} TL\n\
         📍 {location}\n\
         \n\
         İlan ID: {listing_id}"
    )
}

pub fn publish_failed(error: &GatewayError) -> String {
    let reason = match error {
        GatewayError::Validation(_) => "eksik veya geçersiz bilgi",
        GatewayError::IntegrityViolation(_) => "ilan bilgileri mevcut bir kayıtla çakışıyor",
        _ => "veritabanına ulaşılamıyor",
    };
    format!("❌ İlan kaydedilemedi: {reason}.\nLütfen bilgileri kontrol edip tekrar deneyin.")
}

pub fn no_draft_to_publish() -> String {
    "Yayınlanacak bir ilan yok. Önce ürün bilgilerini verin.".to_string()
}

pub fn draft_cancelled() -> String {
    "🔄 İşlem iptal edildi.\n\
     \n\
     Yeni bir işlem için:\n\
     • Ürün satmak: Ürün bilgilerini yazın\n\
     • Ürün aramak: Ne aradığınızı söyleyin"
        .to_string()
}

pub fn agent_unavailable() -> String {
    "😔 Şu anda yanıt veremiyorum. Lütfen birkaç dakika sonra tekrar deneyin.".to_string()
}

pub fn store_unavailable() -> String {
    "Veritabanı hatası. Lütfen daha sonra tekrar deneyin.".to_string()
}

pub fn generic_error() -> String {
    "Bir şeyler ters gitti. Lütfen tekrar deneyin.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_greeting_names_the_window() {
        assert_eq!(
            login_success(10),
            "✅ Giriş başarılı! 🕐 10 dakika boyunca işlem yapabilirsiniz."
        );
    }

    #[test]
    fn invalid_pin_counts_down() {
        assert_eq!(pin_invalid(2), "❌ PIN hatalı. 2 deneme hakkınız kaldı");
        assert_eq!(pin_invalid(1), "❌ PIN hatalı. 1 deneme hakkınız kaldı");
    }

    #[test]
    fn publish_failure_reasons_stay_human() {
        let msg = publish_failed(&GatewayError::Validation("title empty".into()));
        assert!(msg.contains("eksik veya geçersiz bilgi"));
        assert!(!msg.contains("title empty"));
    }
}
