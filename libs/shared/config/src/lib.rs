use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which working ranges the availability calculator reports for a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Ranges that already hold at least one appointment.
    #[default]
    Occupied,
    /// Ranges with no appointment inside them.
    Free,
}

impl FromStr for SlotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "occupied" => Ok(SlotPolicy::Occupied),
            "free" => Ok(SlotPolicy::Free),
            other => Err(format!("unknown slot policy: {}", other)),
        }
    }
}

impl fmt::Display for SlotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotPolicy::Occupied => write!(f, "occupied"),
            SlotPolicy::Free => write!(f, "free"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingConfig {
    pub slot_policy: SlotPolicy,
    /// Reject proposals at or past the end of the matching slot.
    pub enforce_slot_end: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_policy: SlotPolicy::Occupied,
            enforce_slot_end: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bind_addr: String,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            token_ttl_hours: parse_or_default("TOKEN_TTL_HOURS", 24),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            scheduling: SchedulingConfig {
                slot_policy: parse_or_default("SCHEDULING_SLOT_POLICY", SlotPolicy::Occupied),
                enforce_slot_end: parse_or_default("SCHEDULING_ENFORCE_SLOT_END", true),
            },
        };

        if config.jwt_secret.is_empty() {
            warn!("JWT_SECRET is empty - every token will be rejected");
        }

        if !config.is_configured() {
            warn!("Supabase not configured - falling back to in-memory storage");
        }

        config
    }

    /// Whether the remote store can be used.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
