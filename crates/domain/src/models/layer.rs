//! Map layer models: threat zones and transport lines.

use serde::{Deserialize, Deserializer, Serialize};

use super::entity::LatLng;

/// Severity of a threat zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ThreatSeverity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// Fill and stroke color on the map.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Low => "#FFEB3B",
            Self::Medium => "#FF9800",
            Self::High => "#F44336",
            Self::Critical => "#B71C1C",
        }
    }
}

impl<'de> Deserialize<'de> for ThreatSeverity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(serde::de::Error::custom(
                "severity must be one of Low, Medium, High, Critical",
            )),
        }
    }
}

impl std::fmt::Display for ThreatSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A time-bounded hazard area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatZone {
    #[serde(alias = "id", deserialize_with = "shared::serde::i64_lenient")]
    pub threat_id: i64,

    #[serde(default, alias = "threat_name", alias = "title")]
    pub name: String,

    #[serde(default, alias = "coordinates")]
    pub boundary: Vec<LatLng>,

    #[serde(default, alias = "threat_level", alias = "level")]
    pub severity: ThreatSeverity,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub end_date: Option<String>,
}

/// Category of a line layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineCategory {
    Ptcl,
    Railway,
    Highways,
    Threat,
    #[default]
    Default,
}

impl LineCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ptcl => "ptcl",
            Self::Railway => "railway",
            Self::Highways => "highways",
            Self::Threat => "threat",
            Self::Default => "default",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Ptcl => "#1E88E5",
            Self::Railway => "#6D4C41",
            Self::Highways => "#FB8C00",
            Self::Threat => "#E53935",
            Self::Default => "#607D8B",
        }
    }

    pub fn is_dashed(&self) -> bool {
        matches!(self, Self::Threat)
    }
}

impl<'de> Deserialize<'de> for LineCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(match s.trim().to_lowercase().as_str() {
            "ptcl" => Self::Ptcl,
            "railway" | "railways" => Self::Railway,
            "highways" | "highway" => Self::Highways,
            "threat" => Self::Threat,
            _ => Self::Default,
        })
    }
}

/// A transport or utility line drawn as a polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineLayer {
    #[serde(alias = "id", deserialize_with = "shared::serde::i64_lenient")]
    pub line_id: i64,

    #[serde(default, alias = "line_name")]
    pub name: String,

    #[serde(default, alias = "type", alias = "line_type")]
    pub category: LineCategory,

    #[serde(default, alias = "coordinates")]
    pub points: Vec<LatLng>,
}
