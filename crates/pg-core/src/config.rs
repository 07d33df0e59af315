//! Runtime configuration, read once from the environment at startup.
//!
//! Every tunable has a production default; `.env` files are honored by the
//! binary before this is constructed.

use std::env;
use std::time::Duration;

/// Keyword sets driving the intent router. Configurable because trigger
/// vocabularies get tuned in production without redeploys.
#[derive(Debug, Clone)]
pub struct RouterKeywords {
    pub cancel: Vec<String>,
    pub delete: Vec<String>,
    pub own_listings: Vec<String>,
    pub all_listings: Vec<String>,
    pub update: Vec<String>,
    pub confirm: Vec<String>,
    pub sell: Vec<String>,
    pub buy: Vec<String>,
}

impl Default for RouterKeywords {
    fn default() -> Self {
        RouterKeywords {
            cancel: to_vec(&["iptal", "vazgeç", "kapat", "çık", "cancel", "stop"]),
            delete: to_vec(&["sil", "silebilir", "silmek", "silme", "kaldır"]),
            own_listings: to_vec(&["ilanlarım", "ilanlarımı", "bana ait"]),
            all_listings: to_vec(&["tüm ilanlar", "tüm ilanları", "kime ait"]),
            update: to_vec(&["değiştir", "güncelle", "düzenle"]),
            confirm: to_vec(&["onayla", "yayınla", "tamam", "evet", "paylaş", "onaylıyorum"]),
            sell: to_vec(&["satıyorum", "satmak", "satayım", "ilan ver"]),
            buy: to_vec(&["almak", "alıcı", "arıyorum", "var mı", "bul", "uygun", "ucuz"]),
        }
    }
}

/// Immutable gateway configuration shared across workers.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Absolute session lifetime (SESSION_TTL_SECONDS, default 600)
    pub session_ttl: Duration,
    /// Consecutive failures before a lockout (PIN_MAX_FAILED, default 3)
    pub pin_max_failed: u32,
    /// Lockout duration (PIN_LOCK_SECONDS, default 900)
    pub pin_lock: Duration,
    /// Image classifier call budget (SAFETY_TIMEOUT_MS, default 8000)
    pub safety_timeout: Duration,
    /// Agent backend call budget (AGENT_TIMEOUT_MS, default 15000)
    pub agent_timeout: Duration,
    /// Hard wall-clock bound for one turn (TURN_DEADLINE_MS, default 20000)
    pub turn_deadline: Duration,
    /// Classifier outage policy (SAFETY_FAIL_OPEN, default true)
    pub safety_fail_open: bool,
    pub keywords: RouterKeywords,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            session_ttl: Duration::from_secs(600),
            pin_max_failed: 3,
            pin_lock: Duration::from_secs(900),
            safety_timeout: Duration::from_millis(8000),
            agent_timeout: Duration::from_millis(15000),
            turn_deadline: Duration::from_millis(20000),
            safety_fail_open: true,
            keywords: RouterKeywords::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = RouterKeywords::default();
        GatewayConfig {
            session_ttl: Duration::from_secs(env_u64("SESSION_TTL_SECONDS", 600)),
            pin_max_failed: env_u64("PIN_MAX_FAILED", 3) as u32,
            pin_lock: Duration::from_secs(env_u64("PIN_LOCK_SECONDS", 900)),
            safety_timeout: Duration::from_millis(env_u64("SAFETY_TIMEOUT_MS", 8000)),
            agent_timeout: Duration::from_millis(env_u64("AGENT_TIMEOUT_MS", 15000)),
            turn_deadline: Duration::from_millis(env_u64("TURN_DEADLINE_MS", 20000)),
            safety_fail_open: env_bool("SAFETY_FAIL_OPEN", true),
            keywords: RouterKeywords {
                cancel: env_list("CANCEL_KEYWORDS", defaults.cancel),
                delete: env_list("DELETE_TRIGGERS", defaults.delete),
                own_listings: env_list("OWN_LISTING_TRIGGERS", defaults.own_listings),
                all_listings: env_list("ALL_LISTING_TRIGGERS", defaults.all_listings),
                update: env_list("UPDATE_TRIGGERS", defaults.update),
                confirm: env_list("CONFIRM_TRIGGERS", defaults.confirm),
                sell: env_list("SELL_TRIGGERS", defaults.sell),
                buy: env_list("BUY_TRIGGERS", defaults.buy),
            },
        }
    }

    /// Whole minutes shown in the login greeting.
    pub fn session_ttl_minutes(&self) -> u64 {
        self.session_ttl.as_secs() / 60
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

/// Comma-separated override; empty or missing keeps the default set.
fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => {
            let items: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if items.is_empty() {
                default
            } else {
                items
            }
        }
        Err(_) => default,
    }
}

fn to_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_constants() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.session_ttl.as_secs(), 600);
        assert_eq!(cfg.pin_max_failed, 3);
        assert_eq!(cfg.pin_lock.as_secs(), 900);
        assert_eq!(cfg.session_ttl_minutes(), 10);
        assert!(cfg.safety_fail_open);
    }

    #[test]
    fn keyword_defaults_include_turkish_cancel_set() {
        let kw = RouterKeywords::default();
        assert!(kw.cancel.iter().any(|k| k == "iptal"));
        assert!(kw.cancel.iter().any(|k| k == "vazgeç"));
        assert_eq!(kw.delete.len(), 5);
    }
}
