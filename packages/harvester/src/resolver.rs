//! Canonical region resolution for towns.
//!
//! Each town goes `Unresolved -> ParentLookup -> {Resolved | NeedsGeocode}`:
//!
//! 1. [`Resolver::resolve_towns`] maps raw records to [`Town`]s and resolves
//!    each `parent_id` against the known regions, looking unknown parents up
//!    through the API. The catch-all "Другие" region leaves the town at
//!    region `0`.
//! 2. [`Resolver::fetch_regions`] reverse-geocodes every town still at `0`
//!    and reuses or synthesizes a region for the returned area name.
//! 3. [`disambiguate_names`] qualifies duplicate town names with their
//!    region name.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde_json::{json, Value};

use crate::config::{
    DEFAULT_ZOOM, METHOD_REGION, OTHERS_REGION_NAME_TR, REGION_ID_FLOOR, UNASSIGNED_REGION_ID,
};
use crate::error::Result;
use crate::fields;
use crate::geocode::ReverseGeocoder;
use crate::http::Transport;
use crate::rpc::RpcClient;
use crate::transliterate::{name_from_url_code, transliterate};
use crate::types::{Region, Town};

/// A town record together with the parent id it was delivered with.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTown {
    pub town: Town,
    pub parent_id: Option<i64>,
}

/// Map one source town object.
///
/// `name_tr` falls back to the url code, then to transliteration.
pub fn town_from_json(value: &Value) -> Result<RawTown> {
    let id = fields::required_i64(value, "id", "town")?;
    let context = format!("town {id}");
    let name = fields::required_str(value, "name", &context)?.trim().to_string();

    let name_tr = match (
        fields::text(value, "name_tr"),
        fields::text(value, "region_code"),
    ) {
        (tr, _) if !tr.is_empty() => tr,
        (_, code) if !code.is_empty() => name_from_url_code(&code),
        _ => transliterate(&name),
    };

    let mut town = Town::new(id, name, name_tr);
    town.regional_center = fields::flag(value, "regional_center");
    town.latitude = fields::optional_f64(value, "latitude");
    town.longitude = fields::optional_f64(value, "longitude");
    town.zoom = fields::optional_i64(value, "zoom").unwrap_or(DEFAULT_ZOOM);
    town.has_emblem = fields::flag(value, "has_emblem");

    Ok(RawTown {
        town,
        parent_id: fields::optional_i64(value, "parent_id").filter(|id| *id > 0),
    })
}

/// Map a region detail object. `fallback_id` is used when the object has no id.
pub fn region_from_json(value: &Value, fallback_id: i64) -> Result<Region> {
    let id = fields::optional_i64(value, "id").unwrap_or(fallback_id);
    let name = fields::required_str(value, "name", &format!("region {id}"))?
        .trim()
        .to_string();
    let code = fields::text(value, "region_code");
    let name_tr = if code.is_empty() {
        transliterate(&name)
    } else {
        name_from_url_code(&code)
    };

    Ok(Region {
        id,
        name,
        name_tr,
        latitude: fields::optional_f64(value, "latitude"),
        longitude: fields::optional_f64(value, "longitude"),
        zoom: fields::optional_i64(value, "zoom").unwrap_or(DEFAULT_ZOOM),
    })
}

/// Owns the region map for one resolution run.
pub struct Resolver<'a, T, G> {
    client: &'a RpcClient<T>,
    geocoder: &'a G,
    regions: BTreeMap<i64, Region>,
    /// Parent ids known to be the "others" region.
    others: HashSet<i64>,
    /// Ids created by the geocoding fallback.
    synthesized: BTreeSet<i64>,
    /// Towns without usable coordinates; never geocoded again.
    unresolvable: HashSet<i64>,
}

impl<'a, T: Transport, G: ReverseGeocoder> Resolver<'a, T, G> {
    pub fn new(client: &'a RpcClient<T>, geocoder: &'a G) -> Self {
        Self {
            client,
            geocoder,
            regions: BTreeMap::new(),
            others: HashSet::new(),
            synthesized: BTreeSet::new(),
            unresolvable: HashSet::new(),
        }
    }

    /// Seed with already known regions.
    #[must_use]
    pub fn with_regions(mut self, regions: impl IntoIterator<Item = Region>) -> Self {
        self.regions
            .extend(regions.into_iter().map(|region| (region.id, region)));
        self
    }

    #[must_use]
    pub fn regions(&self) -> &BTreeMap<i64, Region> {
        &self.regions
    }

    #[must_use]
    pub fn into_regions(self) -> BTreeMap<i64, Region> {
        self.regions
    }

    /// Region ids created by the geocoding fallback.
    #[must_use]
    pub fn synthesized_ids(&self) -> &BTreeSet<i64> {
        &self.synthesized
    }

    /// Map raw town objects and resolve their parents.
    pub fn resolve_towns(&mut self, raw: &[Value]) -> Result<Vec<Town>> {
        let mut towns = Vec::with_capacity(raw.len());
        for value in raw {
            let RawTown { mut town, parent_id } = town_from_json(value)?;
            self.resolve_parent(&mut town, parent_id)
                .map_err(|e| e.in_scope("town", town.id))?;
            towns.push(town);
        }
        Ok(towns)
    }

    /// Set `town.region_id` from its parent, looking the parent up if unknown.
    pub fn resolve_parent(&mut self, town: &mut Town, parent_id: Option<i64>) -> Result<()> {
        let Some(parent_id) = parent_id else {
            town.region_id = UNASSIGNED_REGION_ID;
            return Ok(());
        };

        if self.regions.contains_key(&parent_id) {
            town.region_id = parent_id;
            return Ok(());
        }
        if self.others.contains(&parent_id) {
            town.region_id = UNASSIGNED_REGION_ID;
            return Ok(());
        }

        let Some(data) = self
            .client
            .call(METHOD_REGION, &json!({ "region_id": parent_id }))?
        else {
            tracing::warn!(
                town_id = town.id,
                parent_id,
                "region lookup failed, leaving town unassigned"
            );
            town.region_id = UNASSIGNED_REGION_ID;
            return Ok(());
        };

        let region = region_from_json(&data.data, parent_id)?;
        if transliterate(&region.name) == OTHERS_REGION_NAME_TR {
            tracing::debug!(town_id = town.id, parent_id, "parent is the others region");
            self.others.insert(parent_id);
            town.region_id = UNASSIGNED_REGION_ID;
            return Ok(());
        }

        tracing::debug!(region_id = region.id, name = %region.name, "registered region");
        town.region_id = region.id;
        self.regions.insert(region.id, region);
        Ok(())
    }

    /// Reverse-geocode every unassigned town.
    ///
    /// Towns without coordinates get region `0` and coordinates `0.0` and are
    /// never retried. A lost connection aborts the pass; any other lookup
    /// failure leaves the town unassigned.
    pub fn fetch_regions(&mut self, towns: &mut [Town]) -> Result<()> {
        for town in towns.iter_mut().filter(|t| !t.is_resolved()) {
            if self.unresolvable.contains(&town.id) {
                continue;
            }

            let Some((latitude, longitude)) = town.coordinates() else {
                tracing::info!(
                    town_id = town.id,
                    name = %town.name,
                    "no coordinates, cannot geocode"
                );
                town.region_id = UNASSIGNED_REGION_ID;
                town.latitude = Some(0.0);
                town.longitude = Some(0.0);
                self.unresolvable.insert(town.id);
                continue;
            };

            let area = match self.geocoder.administrative_area(latitude, longitude) {
                Ok(Some(area)) => area,
                Ok(None) => {
                    tracing::warn!(
                        town_id = town.id,
                        name = %town.name,
                        "no administrative area found"
                    );
                    continue;
                }
                Err(e) if e.is_connection() => return Err(e.in_scope("town", town.id)),
                Err(e) => {
                    tracing::warn!(town_id = town.id, error = %e, "geocoding failed");
                    continue;
                }
            };

            town.region_id = self.region_id_for_area(&area);
            tracing::debug!(town_id = town.id, region_id = town.region_id, %area, "geocoded");
        }
        Ok(())
    }

    /// Existing region with this name, or a new placeholder region.
    pub fn region_id_for_area(&mut self, area: &str) -> i64 {
        if let Some(region) = self.regions.values().find(|r| r.name == area) {
            return region.id;
        }

        let id = self.next_region_id();
        self.synthesized.insert(id);
        self.regions
            .insert(id, Region::placeholder(id, area, transliterate(area)));
        tracing::info!(region_id = id, name = %area, "synthesized region");
        id
    }

    /// Smallest id at or above the floor not used by any known region.
    fn next_region_id(&self) -> i64 {
        let mut candidate = REGION_ID_FLOOR;
        while self.regions.contains_key(&candidate) || self.synthesized.contains(&candidate) {
            candidate += 1;
        }
        candidate
    }
}

/// Append `" (<region name>)"` to every town whose name is not unique.
///
/// Returns the number of towns renamed. Duplicates without a known region
/// are logged and left as they are.
pub fn disambiguate_names(towns: &mut [Town], regions: &BTreeMap<i64, Region>) -> usize {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for town in towns.iter() {
        *counts.entry(town.name.clone()).or_default() += 1;
    }

    let mut renamed = 0;
    for town in towns.iter_mut() {
        if counts.get(&town.name).copied().unwrap_or(0) < 2 {
            continue;
        }
        let region = (town.region_id != UNASSIGNED_REGION_ID)
            .then(|| regions.get(&town.region_id))
            .flatten();
        match region {
            Some(region) => {
                town.name = format!("{} ({})", town.name, region.name);
                renamed += 1;
            }
            None => {
                tracing::error!(
                    town_id = town.id,
                    name = %town.name,
                    region_id = town.region_id,
                    "duplicate town name without region, cannot disambiguate"
                );
            }
        }
    }
    renamed
}

/// Full resolution: parents, geocoding fallback, name disambiguation.
pub fn resolve_all<T: Transport, G: ReverseGeocoder>(
    client: &RpcClient<T>,
    geocoder: &G,
    raw: &[Value],
) -> Result<(Vec<Town>, BTreeMap<i64, Region>)> {
    let mut resolver = Resolver::new(client, geocoder);
    let mut towns = resolver.resolve_towns(raw)?;
    resolver.fetch_regions(&mut towns)?;
    let regions = resolver.into_regions();
    let renamed = disambiguate_names(&mut towns, &regions);
    tracing::info!(
        towns = towns.len(),
        regions = regions.len(),
        renamed,
        "towns resolved"
    );
    Ok((towns, regions))
}
