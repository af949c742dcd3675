//! Core data types for the harvester.
//!
//! Records are typed at the ingestion boundary; everything downstream of the
//! assemblers works on these structs rather than on raw JSON.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_ZOOM, UNASSIGNED_REGION_ID};

/// Kind of point of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    /// Head or regional office.
    Office,

    /// Branch office.
    Branch,

    /// Automated teller machine.
    Atm,

    /// Cash desk.
    Cash,

    /// Self-service zone.
    SelfOffice,
}

impl PointType {
    /// Every type, in the order the API filter expects.
    pub const ALL: [PointType; 5] = [
        Self::Office,
        Self::Branch,
        Self::Atm,
        Self::Cash,
        Self::SelfOffice,
    ];

    /// Wire/storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Office => "office",
            Self::Branch => "branch",
            Self::Atm => "atm",
            Self::Cash => "cash",
            Self::SelfOffice => "self_office",
        }
    }

    /// Parse a wire string. Unknown strings yield `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == text)
    }
}

/// A town (the API calls these "regions"; they are the fetch scopes).
#[derive(Debug, Clone, PartialEq)]
pub struct Town {
    /// Source-assigned identifier.
    pub id: i64,

    /// Display name; may gain a " (Region)" qualifier when ambiguous.
    pub name: String,

    /// Latin name.
    pub name_tr: String,

    /// Owning region, `0` while unassigned.
    pub region_id: i64,

    pub regional_center: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zoom: i64,
    pub has_emblem: bool,
}

impl Town {
    /// Create an unresolved town with default zoom and no coordinates.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, name_tr: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            name_tr: name_tr.into(),
            region_id: UNASSIGNED_REGION_ID,
            regional_center: false,
            latitude: None,
            longitude: None,
            zoom: DEFAULT_ZOOM,
            has_emblem: false,
        }
    }

    /// Both coordinates, if present and finite.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.region_id != UNASSIGNED_REGION_ID
    }
}

/// An administrative region grouping towns.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub name_tr: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zoom: i64,
}

impl Region {
    /// Placeholder region known only by name (synthesized from geocoding).
    #[must_use]
    pub fn placeholder(id: i64, name: impl Into<String>, name_tr: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            name_tr: name_tr.into(),
            latitude: None,
            longitude: None,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// A bank point of service as delivered by the detail API.
#[derive(Debug, Clone, PartialEq)]
pub struct CashPoint {
    pub id: i64,
    pub point_type: PointType,
    pub bank_id: i64,
    pub town_id: i64,

    /// `Some(0.0)` when the source sent null, `None` when it sent nothing.
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,

    pub address: String,
    pub address_comment: String,
    pub metro_name: String,
    pub free_access: bool,
    pub main_office: bool,
    pub without_weekend: bool,
    pub round_the_clock: bool,
    pub works_as_shop: bool,
    pub schedule_general: String,
    pub schedule_private: String,
    pub schedule_vip: String,
    pub tel: String,

    /// Free-text annotation.
    pub additional: String,
}

impl CashPoint {
    /// Minimal point with empty text fields.
    #[must_use]
    pub fn new(id: i64, point_type: PointType, bank_id: i64, town_id: i64) -> Self {
        Self {
            id,
            point_type,
            bank_id,
            town_id,
            longitude: None,
            latitude: None,
            address: String::new(),
            address_comment: String::new(),
            metro_name: String::new(),
            free_access: true,
            main_office: false,
            without_weekend: false,
            round_the_clock: false,
            works_as_shop: false,
            schedule_general: String::new(),
            schedule_private: String::new(),
            schedule_vip: String::new(),
            tel: String::new(),
            additional: String::new(),
        }
    }
}

/// A cash point after annotation normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedCashPoint {
    /// The point, with cleaned `additional` and possibly revoked `free_access`.
    pub point: CashPoint,
    pub rub: bool,
    pub usd: bool,
    pub eur: bool,
    pub cash_in: bool,
}

/// A bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    pub id: i64,
    pub name: String,
    pub licence: Option<i64>,
    pub name_tr: String,
    pub region: String,
}

/// Branch-to-parent relation between two banks. The parent is referenced by
/// id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankBranch {
    pub id: i64,
    pub parent: i64,
}
