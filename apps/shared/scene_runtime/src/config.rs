use scene_schema::Validatable;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use tracing::Level;

/// A byte size value that can be specified as a number or a string with suffix (K, M, G)
/// Examples: 1024, "100K", "4M", "1G"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(pub usize);

impl ByteSize {
    /// Parse a string with optional K/M/G suffix into bytes
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty string".to_string());
        }

        let (num_part, multiplier) = if let Some(prefix) = s.strip_suffix('K').or_else(|| s.strip_suffix('k')) {
            (prefix, 1024usize)
        } else if let Some(prefix) = s.strip_suffix('M').or_else(|| s.strip_suffix('m')) {
            (prefix, 1024 * 1024)
        } else if let Some(prefix) = s.strip_suffix('G').or_else(|| s.strip_suffix('g')) {
            (prefix, 1024 * 1024 * 1024)
        } else {
            (s, 1)
        };

        let num: usize = num_part.trim().parse()
            .map_err(|e| format!("Invalid number '{}': {}", num_part, e))?;

        Ok(ByteSize(num.saturating_mul(multiplier)))
    }

    /// Get the value in bytes
    pub fn as_bytes(&self) -> usize {
        self.0
    }
}

impl Default for ByteSize {
    fn default() -> Self {
        ByteSize(scene_protocol::DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes >= 1024 * 1024 * 1024 && bytes % (1024 * 1024 * 1024) == 0 {
            write!(f, "{}G", bytes / (1024 * 1024 * 1024))
        } else if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
            write!(f, "{}M", bytes / (1024 * 1024))
        } else if bytes >= 1024 && bytes % 1024 == 0 {
            write!(f, "{}K", bytes / 1024)
        } else {
            write!(f, "{}", bytes)
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ByteSizeVisitor;

        impl<'de> Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number or a string with optional K/M/G suffix (e.g., 1024, \"100K\", \"4M\", \"1G\")")
            }

            fn visit_u64<E>(self, value: u64) -> Result<ByteSize, E>
            where
                E: de::Error,
            {
                Ok(ByteSize(value as usize))
            }

            fn visit_i64<E>(self, value: i64) -> Result<ByteSize, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    Err(E::custom("byte size cannot be negative"))
                } else {
                    Ok(ByteSize(value as usize))
                }
            }

            fn visit_str<E>(self, value: &str) -> Result<ByteSize, E>
            where
                E: de::Error,
            {
                ByteSize::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

impl JsonSchema for ByteSize {
    fn schema_name() -> String {
        "ByteSize".to_string()
    }

    fn json_schema(_gen: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        use schemars::schema::{Schema, SchemaObject, InstanceType, SingleOrVec};

        let mut schema = SchemaObject::default();
        schema.instance_type = Some(SingleOrVec::Vec(vec![
            InstanceType::String,
            InstanceType::Integer,
        ]));
        schema.metadata().description = Some(
            "Byte size as number or string with suffix (K=KB, M=MB, G=GB). Examples: 1024, \"100K\", \"4M\", \"1G\"".to_string()
        );
        Schema::Object(schema)
    }
}

/// Scene session configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Scene Session Configuration")]
#[schemars(description = "Configuration for one scene runtime session")]
pub struct SessionConfig {
    /// Scene identifier used in logs
    #[serde(default = "default_scene_id")]
    #[schemars(description = "Identifier of the scene, shown as the prefix of system log lines")]
    pub scene_id: String,

    /// Simulation tick rate in Hz
    #[serde(default = "default_tick_rate")]
    #[schemars(description = "Simulation ticks per second", range(min = 1, max = 240))]
    pub tick_rate: u64,

    /// Largest frame exchanged with the host
    #[serde(default)]
    #[schemars(description = "Maximum size of one message to or from the host. Accepts numbers or strings with K/M/G suffix (default: 4M)")]
    pub max_message_size: ByteSize,

    /// Ticks a host query may stay unanswered
    #[serde(default = "default_query_timeout_ticks")]
    #[schemars(description = "Ticks after which an unanswered host query times out. 0 disables the timeout")]
    pub query_timeout_ticks: u32,

    /// Send a batch even when a tick produced no operations
    #[serde(default)]
    #[schemars(description = "Send a batch every tick, even when it carries no operations")]
    pub send_empty_batches: bool,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[schemars(description = "Log level: trace, debug, info, warn, error")]
    #[schemars(regex(pattern = r"^(trace|debug|info|warn|error)$"))]
    pub log_level: String,
}

fn default_scene_id() -> String {
    "scene".to_string()
}

fn default_tick_rate() -> u64 {
    30
}

fn default_query_timeout_ticks() -> u32 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scene_id: default_scene_id(),
            tick_rate: default_tick_rate(),
            max_message_size: ByteSize::default(),
            query_timeout_ticks: default_query_timeout_ticks(),
            send_empty_batches: false,
            log_level: default_log_level(),
        }
    }
}

impl SessionConfig {
    /// Wall-clock length of one tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.clamp(1, 240) as f64)
    }

    /// Configured level, falling back to INFO
    pub fn level(&self) -> Level {
        scene_log::parse_level(&self.log_level).unwrap_or(Level::INFO)
    }
}

impl Validatable for SessionConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.scene_id, "scene");
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.max_message_size.as_bytes(), 4 * 1024 * 1024);
        assert_eq!(config.query_timeout_ticks, 300);
        assert!(!config.send_empty_batches);
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_valid_json() {
        let json = r#"{
            "scene_id": "plaza",
            "tick_rate": 60,
            "max_message_size": "256K",
            "log_level": "debug"
        }"#;

        let config = SessionConfig::from_json_str(json).unwrap();
        assert_eq!(config.scene_id, "plaza");
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_message_size.as_bytes(), 256 * 1024);
        assert_eq!(config.query_timeout_ticks, 300);
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.tick_interval(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_invalid_log_level() {
        let result = SessionConfig::from_json_str(r#"{"log_level": "loud"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_tick_rate_out_of_range() {
        assert!(SessionConfig::from_json_str(r#"{"tick_rate": 0}"#).is_err());
        assert!(SessionConfig::from_json_str(r#"{"tick_rate": 1000}"#).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"scene_id": "from-file", "send_empty_batches": true}"#).unwrap();

        let path = file.path().to_str().unwrap();
        let config = SessionConfig::from_json_file(path).unwrap();
        assert_eq!(config.scene_id, "from-file");
        assert!(config.send_empty_batches);
    }

    #[test]
    fn test_byte_size_parse() {
        assert_eq!(ByteSize::parse("1024").unwrap().as_bytes(), 1024);
        assert_eq!(ByteSize::parse("0").unwrap().as_bytes(), 0);
        assert_eq!(ByteSize::parse("100K").unwrap().as_bytes(), 100 * 1024);
        assert_eq!(ByteSize::parse(" 100k ").unwrap().as_bytes(), 100 * 1024);
        assert_eq!(ByteSize::parse("4M").unwrap().as_bytes(), 4 * 1024 * 1024);
        assert_eq!(ByteSize::parse("1g").unwrap().as_bytes(), 1024 * 1024 * 1024);

        assert!(ByteSize::parse("").is_err());
        assert!(ByteSize::parse("abc").is_err());
        assert!(ByteSize::parse("100X").is_err());
    }

    #[test]
    fn test_byte_size_serde() {
        let size: ByteSize = serde_json::from_str("1048576").unwrap();
        assert_eq!(size.as_bytes(), 1048576);

        let size: ByteSize = serde_json::from_str("\"4M\"").unwrap();
        assert_eq!(size.as_bytes(), 4 * 1024 * 1024);

        assert!(serde_json::from_str::<ByteSize>("-1").is_err());
        assert_eq!(serde_json::to_string(&ByteSize(2048)).unwrap(), "\"2K\"");
    }

    #[test]
    fn test_byte_size_display() {
        assert_eq!(format!("{}", ByteSize(1024)), "1K");
        assert_eq!(format!("{}", ByteSize(1024 * 1024)), "1M");
        assert_eq!(format!("{}", ByteSize(1024 * 1024 * 1024)), "1G");
        assert_eq!(format!("{}", ByteSize(500)), "500");
    }
}
