use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Sequence is an update or purge sequence as reported by the server.
/// CouchDB 1.x reports plain integers, later releases opaque tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sequence {
    Number(u64),
    Token(String),
}

impl Sequence {
    /// Numeric value of the sequence, including the numeric prefix of a token
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Sequence::Number(n) => Some(*n),
            Sequence::Token(token) => token
                .split_once('-')
                .map_or(token.as_str(), |(prefix, _)| prefix)
                .parse()
                .ok(),
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Number(n) => write!(f, "{}", n),
            Sequence::Token(token) => f.write_str(token),
        }
    }
}

/// CouchDatabaseInfo is the snapshot returned by `GET /{db}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDatabaseInfo")]
pub struct CouchDatabaseInfo {
    pub db_name: String,
    pub doc_count: u64,
    pub doc_del_count: u64,
    pub update_seq: Sequence,
    pub purge_seq: Sequence,
    pub compact_running: bool,
    pub disk_size: u64,
    pub data_size: u64,
    /// Microseconds since the epoch, as reported by the server
    pub instance_start_time: u64,
    pub disk_format_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_update_seq: Option<Sequence>,
}

impl CouchDatabaseInfo {
    /// Server start time. `None` when the server reports zero (clustered CouchDB).
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        if self.instance_start_time == 0 {
            return None;
        }
        let secs = i64::try_from(self.instance_start_time / 1_000_000).ok()?;
        let nanos = (self.instance_start_time % 1_000_000) as u32 * 1_000;
        DateTime::<Utc>::from_timestamp(secs, nanos)
    }
}

#[derive(Deserialize)]
struct RawDatabaseInfo {
    db_name: String,
    #[serde(deserialize_with = "lenient_u64")]
    doc_count: u64,
    #[serde(deserialize_with = "lenient_u64")]
    doc_del_count: u64,
    update_seq: Sequence,
    purge_seq: Sequence,
    compact_running: bool,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    disk_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    data_size: Option<u64>,
    #[serde(default)]
    sizes: Option<RawSizes>,
    #[serde(deserialize_with = "lenient_u64")]
    instance_start_time: u64,
    disk_format_version: u32,
    #[serde(default)]
    committed_update_seq: Option<Sequence>,
}

// CouchDB 2.0+ moved disk and data sizes into a nested object
#[derive(Deserialize)]
struct RawSizes {
    file: u64,
    active: u64,
}

impl TryFrom<RawDatabaseInfo> for CouchDatabaseInfo {
    type Error = String;

    fn try_from(raw: RawDatabaseInfo) -> Result<Self, Self::Error> {
        let disk_size = raw
            .disk_size
            .or_else(|| raw.sizes.as_ref().map(|s| s.file))
            .ok_or_else(|| "missing field `disk_size`".to_string())?;
        let data_size = raw
            .data_size
            .or_else(|| raw.sizes.as_ref().map(|s| s.active))
            .ok_or_else(|| "missing field `data_size`".to_string())?;

        Ok(Self {
            db_name: raw.db_name,
            doc_count: raw.doc_count,
            doc_del_count: raw.doc_del_count,
            update_seq: raw.update_seq,
            purge_seq: raw.purge_seq,
            compact_running: raw.compact_running,
            disk_size,
            data_size,
            instance_start_time: raw.instance_start_time,
            disk_format_version: raw.disk_format_version,
            committed_update_seq: raw.committed_update_seq,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .parse()
                .map_err(|_| E::custom(format!("expected an unsigned integer, got {:?}", s))),
        }
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    NumberOrString::deserialize(deserializer)?.into_u64()
}

fn lenient_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_u64)
        .transpose()
}
