use crate::error::PayloadError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One decoded response from the listing endpoint.
///
/// Items stay as raw JSON until the accumulator walks them, so a single bad
/// entry is skipped instead of failing the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListPage {
    #[serde(default)]
    item_list: Option<Vec<Value>>,
    #[serde(default)]
    has_more: Option<Value>,
    #[serde(default)]
    cursor: Option<Value>,
}

impl ItemListPage {
    pub fn decode(body: &str) -> Result<Self, PayloadError> {
        if body.trim().is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(serde_json::from_str(body)?)
    }

    pub fn len(&self) -> usize {
        self.item_list.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_items(self) -> Vec<Value> {
        self.item_list.unwrap_or_default()
    }

    /// `Some(false)` when the endpoint says there is nothing left to load.
    pub fn has_more(&self) -> Option<bool> {
        match self.has_more.as_ref()? {
            Value::Bool(flag) => Some(*flag),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        }
    }

    pub fn cursor(&self) -> Option<String> {
        match self.cursor.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A single item entry with missing statistics filled in as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub id: String,
    pub desc: String,
    pub play_count: u64,
    pub digg_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    desc: Option<Value>,
    #[serde(default)]
    stats: Option<Value>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStats {
    #[serde(default, deserialize_with = "lenient_count")]
    play_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    digg_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    comment_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    share_count: u64,
}

impl VideoEntry {
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let raw: RawEntry = serde_json::from_value(value)?;
        let id = match raw.id {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(PayloadError::MissingId),
        };
        // Only the identifier is required; odd shapes elsewhere fall back to defaults.
        let stats = match raw.stats {
            Some(stats @ Value::Object(_)) => serde_json::from_value(stats).unwrap_or_default(),
            _ => RawStats::default(),
        };
        let desc = match raw.desc {
            Some(Value::String(desc)) => desc,
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(flag)) => flag.to_string(),
            _ => String::new(),
        };

        Ok(Self {
            id,
            desc,
            play_count: stats.play_count,
            digg_count: stats.digg_count,
            comment_count: stats.comment_count,
            share_count: stats.share_count,
        })
    }
}

// Counts show up as numbers, numeric strings or null depending on the item.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
