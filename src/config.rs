use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub order_queue_size: usize,
    pub event_buffer_size: usize,
    pub dispatch: DispatchSettings,
}

/// Tunables of the dispatch core.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub radius_km: f64,
    /// How long a courier has to answer an offer.
    pub offer_window: Duration,
    pub sweep_interval: Duration,
    /// A pending order older than this is auto-cancelled.
    pub pending_ttl: chrono::Duration,
    /// An assigned order not picked up within this is released.
    pub pickup_ttl: chrono::Duration,
    pub cost_per_km: f64,
    pub min_delivery_fee: f64,
    pub default_delivery_fee: f64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            offer_window: Duration::from_secs(20),
            sweep_interval: Duration::from_secs(300),
            pending_ttl: chrono::Duration::minutes(15),
            pickup_ttl: chrono::Duration::minutes(30),
            cost_per_km: 5.0,
            min_delivery_fee: 5.0,
            default_delivery_fee: 10.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            order_queue_size: 1024,
            event_buffer_size: 1024,
            dispatch: DispatchSettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = DispatchSettings::default();
        let dispatch = DispatchSettings {
            radius_km: parse_or_default("DISPATCH_RADIUS_KM", defaults.radius_km)?,
            offer_window: Duration::from_secs(parse_or_default("OFFER_WINDOW_SECS", 20)?),
            sweep_interval: Duration::from_secs(parse_or_default("SWEEP_INTERVAL_SECS", 300)?),
            pending_ttl: chrono::Duration::minutes(parse_or_default("PENDING_TTL_MINUTES", 15)?),
            pickup_ttl: chrono::Duration::minutes(parse_or_default("PICKUP_TTL_MINUTES", 30)?),
            cost_per_km: parse_or_default("COST_PER_KM", defaults.cost_per_km)?,
            min_delivery_fee: parse_or_default("MIN_DELIVERY_FEE", defaults.min_delivery_fee)?,
            default_delivery_fee: parse_or_default(
                "DEFAULT_DELIVERY_FEE",
                defaults.default_delivery_fee,
            )?,
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                Ok("compact") | Err(_) => LogFormat::Compact,
                Ok(other) => {
                    return Err(AppError::Internal(format!(
                        "invalid LOG_FORMAT: {other}, expected compact or json"
                    )));
                }
            },
            order_queue_size: parse_or_default("ORDER_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            dispatch,
        };
        config.validate()?;

        Ok(config)
    }

    /// Rejects values the channels or the dispatch core cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        let dispatch = &self.dispatch;

        if !dispatch.radius_km.is_finite() || dispatch.radius_km <= 0.0 {
            return Err(invalid("DISPATCH_RADIUS_KM", "must be a finite number > 0"));
        }
        if dispatch.offer_window.is_zero() {
            return Err(invalid("OFFER_WINDOW_SECS", "must be > 0"));
        }
        if dispatch.sweep_interval.is_zero() {
            return Err(invalid("SWEEP_INTERVAL_SECS", "must be > 0"));
        }
        for (key, value) in [
            ("COST_PER_KM", dispatch.cost_per_km),
            ("MIN_DELIVERY_FEE", dispatch.min_delivery_fee),
            ("DEFAULT_DELIVERY_FEE", dispatch.default_delivery_fee),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(key, "must be a finite number >= 0"));
            }
        }
        if self.order_queue_size == 0 {
            return Err(invalid("ORDER_QUEUE_SIZE", "must be > 0"));
        }
        if self.event_buffer_size == 0 {
            return Err(invalid("EVENT_BUFFER_SIZE", "must be > 0"));
        }

        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> AppError {
    AppError::Internal(format!("invalid {key}: {reason}"))
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
