//! Reverse geocoding of town coordinates to an administrative area name.

use roxmltree::Document;

use crate::error::Result;
use crate::http::Transport;
use crate::xml::{find_by_path, get_text, has_tag};

/// Path from a `featureMember` to the region-level place name.
const AREA_NAME_PATH: &str =
    "GeoObject/metaDataProperty/GeocoderMetaData/AddressDetails/Country/AdministrativeArea/AdministrativeAreaName";

/// Coordinates to administrative area lookup.
pub trait ReverseGeocoder {
    /// Name of the administrative area containing the point, or `None`
    /// when the service knows of none. Connectivity loss is an `Err`.
    fn administrative_area(&self, latitude: f64, longitude: f64) -> Result<Option<String>>;
}

/// Yandex geocoder HTTP API.
pub struct YandexGeocoder<T> {
    transport: T,
    base_url: String,
    api_key: Option<String>,
}

impl<T: Transport> YandexGeocoder<T> {
    pub fn new(transport: T, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Request URL for a point. Yandex expects longitude first.
    #[must_use]
    pub fn request_url(&self, latitude: f64, longitude: f64) -> String {
        let mut url = format!("{}?geocode={longitude},{latitude}", self.base_url);
        if let Some(key) = &self.api_key {
            url.push_str("&apikey=");
            url.push_str(key);
        }
        url
    }
}

impl<T: Transport> ReverseGeocoder for YandexGeocoder<T> {
    fn administrative_area(&self, latitude: f64, longitude: f64) -> Result<Option<String>> {
        let body = self.transport.get(&self.request_url(latitude, longitude))?;
        parse_administrative_area(&body)
    }
}

/// First administrative area name found among the feature members.
///
/// # Examples
/// ```
/// use cashpoints_harvester::geocode::parse_administrative_area;
///
/// let xml = r#"<ymaps><GeoObjectCollection><featureMember><GeoObject><metaDataProperty>
///   <GeocoderMetaData><AddressDetails><Country><AdministrativeArea>
///   <AdministrativeAreaName>Московская область</AdministrativeAreaName>
///   </AdministrativeArea></Country></AddressDetails></GeocoderMetaData>
///   </metaDataProperty></GeoObject></featureMember></GeoObjectCollection></ymaps>"#;
/// assert_eq!(
///     parse_administrative_area(xml).unwrap().as_deref(),
///     Some("Московская область")
/// );
/// ```
pub fn parse_administrative_area(xml: &str) -> Result<Option<String>> {
    let doc = Document::parse(xml)?;
    let name = doc
        .descendants()
        .filter(|n| has_tag(*n, "featureMember"))
        .filter_map(|member| find_by_path(member, AREA_NAME_PATH))
        .map(get_text)
        .find(|name| !name.is_empty());
    Ok(name)
}
