//! Pipeline stages that tie the components to their database files.
//!
//! Stages run in order `towns` -> `cashpoints` -> `postprocess`, with `banks`
//! independent of the rest. Each reads its input file, writes one output
//! database and returns a summary of what it stored.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::banks::fetch_banks;
use crate::cashpoint::fetch_cash_points;
use crate::error::{HarvesterError, Result};
use crate::fetcher::{BatchFetcher, FetchProgress};
use crate::geocode::ReverseGeocoder;
use crate::http::Transport;
use crate::normalize::{cash_in_index, enrich};
use crate::resolver::resolve_all;
use crate::rpc::RpcClient;
use crate::store::Store;

/// Progress events emitted by [`harvest_cash_points`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A page of the current town finished.
    Page { town_id: i64, page: FetchProgress },

    /// A town was committed.
    Scope { town_id: i64, last_town_id: i64 },

    /// A town below the resume point was skipped.
    Skipped { town_id: i64 },
}

impl Progress {
    /// Completion of the whole run, as the share of the highest town id reached.
    #[must_use]
    pub fn percent(&self) -> Option<u32> {
        match *self {
            Self::Scope {
                town_id,
                last_town_id,
            } if last_town_id > 0 => {
                let share = town_id as f64 / last_town_id as f64 * 100.0;
                Some(share.round().clamp(0.0, 100.0) as u32)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TownSummary {
    pub towns: usize,
    pub regions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CashPointSummary {
    pub towns: usize,
    pub skipped: usize,
    pub cash_points: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BankSummary {
    pub banks: usize,
    pub branches: usize,
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(HarvesterError::InputNotFound(path.to_path_buf()))
    }
}

/// Remove a previous output database unless the run appends to it.
pub fn prepare_output(path: &Path, append: bool) -> Result<()> {
    if !append && path.is_file() {
        fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "removed previous output");
    }
    Ok(())
}

/// Read the raw town list document `{"data": [...]}`.
pub fn read_raw_towns(path: &Path) -> Result<Vec<Value>> {
    require_file(path)?;
    let document: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let towns = document
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| HarvesterError::MissingField {
            field: "data".to_string(),
            context: path.display().to_string(),
        })?;
    if towns.is_empty() {
        return Err(HarvesterError::EmptyInput(format!(
            "no towns in {}",
            path.display()
        )));
    }
    Ok(towns.clone())
}

/// Resolve raw towns and write towns and regions to `output`.
pub fn harvest_towns<T: Transport, G: ReverseGeocoder>(
    client: &RpcClient<T>,
    geocoder: &G,
    raw: &[Value],
    output: &Path,
) -> Result<TownSummary> {
    let (towns, regions) = resolve_all(client, geocoder, raw)?;

    prepare_output(output, false)?;
    let mut store = Store::open(output)?;
    store.create_town_tables()?;
    let towns = store.insert_towns(&towns)?;
    let regions = store.insert_regions(regions.values())?;
    Ok(TownSummary { towns, regions })
}

/// Fetch the cash points of every town in `towns_db` into `output`.
///
/// Towns are processed in ascending id order, one committed transaction per
/// town. With `resume_from` the output is kept and towns below that id are
/// skipped. A failure names the town it happened on.
pub fn harvest_cash_points<T: Transport>(
    fetcher: &BatchFetcher<'_, T>,
    towns_db: &Path,
    output: &Path,
    resume_from: Option<i64>,
    mut report: impl FnMut(Progress),
) -> Result<CashPointSummary> {
    require_file(towns_db)?;
    let town_ids = Store::open(towns_db)?.town_ids()?;
    let Some(&last_town_id) = town_ids.last() else {
        return Err(HarvesterError::EmptyInput(format!(
            "no town ids in {}",
            towns_db.display()
        )));
    };

    let resume_from = resume_from.filter(|id| *id > 0);
    prepare_output(output, resume_from.is_some())?;
    let mut store = Store::open(output)?;
    store.create_cashpoint_table()?;

    let mut summary = CashPointSummary::default();
    for town_id in town_ids {
        if resume_from.is_some_and(|start| town_id < start) {
            tracing::debug!(town_id, "below resume point, skipping");
            summary.skipped += 1;
            report(Progress::Skipped { town_id });
            continue;
        }

        let points = fetch_cash_points(fetcher, town_id, |page| {
            report(Progress::Page { town_id, page });
        })
        .map_err(|e| e.in_scope("town", town_id))?;
        let stored = store
            .commit_scope(&points)
            .map_err(|e| e.in_scope("town", town_id))?;

        tracing::info!(town_id, stored, "town committed");
        summary.towns += 1;
        summary.cash_points += stored;
        report(Progress::Scope {
            town_id,
            last_town_id,
        });
    }
    Ok(summary)
}

/// Normalize raw cash points from `input` into the enriched table of `output`.
pub fn postprocess(input: &Path, output: &Path) -> Result<usize> {
    require_file(input)?;
    let points = Store::open(input)?.load_cash_points()?;
    if points.is_empty() {
        return Err(HarvesterError::EmptyInput(format!(
            "no cash points in {}",
            input.display()
        )));
    }

    let cash_in = cash_in_index(&points);
    tracing::debug!(cash_in = cash_in.len(), "cash-in index built");
    let enriched: Vec<_> = points
        .into_iter()
        .map(|point| {
            let has_cash_in = cash_in.contains(&point.id);
            enrich(point, has_cash_in)
        })
        .collect();

    prepare_output(output, false)?;
    let mut store = Store::open(output)?;
    store.create_enriched_cashpoint_table()?;
    store.insert_enriched(&enriched)
}

/// Fetch the bank list into `output`.
pub fn harvest_banks<T: Transport>(client: &RpcClient<T>, output: &Path) -> Result<BankSummary> {
    let (banks, branches) = fetch_banks(client)?;

    prepare_output(output, false)?;
    let mut store = Store::open(output)?;
    store.create_bank_tables()?;
    store.insert_banks(&banks, &branches)?;
    Ok(BankSummary {
        banks: banks.len(),
        branches: branches.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::http::mock::ScriptedTransport;
    use crate::types::Town;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn towns_db(dir: &Path, ids: &[i64]) -> std::path::PathBuf {
        let path = dir.join("towns.db");
        let mut store = Store::open(&path).unwrap();
        store.create_town_tables().unwrap();
        let towns: Vec<Town> = ids
            .iter()
            .map(|id| Town::new(*id, format!("town {id}"), format!("town {id}")))
            .collect();
        store.insert_towns(&towns).unwrap();
        path
    }

    fn script_town(transport: &ScriptedTransport, point_ids: &[i64]) {
        transport.respond(json!({"result": {"data": [], "total": point_ids.len()}}));
        if point_ids.is_empty() {
            return;
        }
        let summary: Vec<Value> = point_ids.iter().map(|id| json!({"id": id})).collect();
        let details: Vec<Value> = point_ids
            .iter()
            .map(|id| json!({"id": id, "type": "atm", "bank_id": 1}))
            .collect();
        transport
            .respond(json!({"result": {"data": summary}}))
            .respond(json!({"result": {"data": details}}));
    }

    #[test]
    fn test_percent_uses_last_town_id() {
        let progress = Progress::Scope {
            town_id: 1,
            last_town_id: 3,
        };
        assert_eq!(progress.percent(), Some(33));
        assert_eq!(Progress::Skipped { town_id: 1 }.percent(), None);
    }

    #[test]
    fn test_cash_points_commit_per_town() {
        let dir = tempfile::tempdir().unwrap();
        let towns = towns_db(dir.path(), &[2, 1]);
        let output = dir.path().join("cashpoints.db");

        let transport = ScriptedTransport::new();
        script_town(&transport, &[10, 11]);
        script_town(&transport, &[]);
        let client = RpcClient::new(&transport, "http://api.test/", RetryPolicy::immediate(1));
        let fetcher = BatchFetcher::new(&client, 25);

        let mut events = Vec::new();
        let summary =
            harvest_cash_points(&fetcher, &towns, &output, None, |p| events.push(p)).unwrap();

        assert_eq!(
            summary,
            CashPointSummary {
                towns: 2,
                skipped: 0,
                cash_points: 2
            }
        );
        let percents: Vec<u32> = events.iter().filter_map(Progress::percent).collect();
        assert_eq!(percents, vec![50, 100]);

        let stored = Store::open(&output).unwrap().load_cash_points().unwrap();
        assert!(stored.iter().all(|p| p.town_id == 1));
    }

    #[test]
    fn test_resume_skips_lower_towns_and_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        let towns = towns_db(dir.path(), &[1, 2, 3]);
        let output = dir.path().join("cashpoints.db");
        {
            let mut store = Store::open(&output).unwrap();
            store.create_cashpoint_table().unwrap();
            store
                .commit_scope(&[crate::types::CashPoint::new(
                    5,
                    crate::types::PointType::Cash,
                    1,
                    1,
                )])
                .unwrap();
        }

        let transport = ScriptedTransport::new();
        script_town(&transport, &[20]);
        script_town(&transport, &[30]);
        let client = RpcClient::new(&transport, "http://api.test/", RetryPolicy::immediate(1));
        let fetcher = BatchFetcher::new(&client, 25);

        let summary = harvest_cash_points(&fetcher, &towns, &output, Some(2), |_| {}).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.towns, 2);
        assert_eq!(Store::open(&output).unwrap().count("cashpoints").unwrap(), 3);
    }

    #[test]
    fn test_failure_names_the_town() {
        let dir = tempfile::tempdir().unwrap();
        let towns = towns_db(dir.path(), &[7]);
        let output = dir.path().join("cashpoints.db");

        let transport = ScriptedTransport::new();
        transport.respond(json!({"unexpected": "shape"}));
        let client = RpcClient::new(&transport, "http://api.test/", RetryPolicy::immediate(1));
        let fetcher = BatchFetcher::new(&client, 25);

        let err = harvest_cash_points(&fetcher, &towns, &output, None, |_| {}).unwrap_err();
        assert!(err.to_string().starts_with("Failed on town 7"));
    }

    #[test]
    fn test_missing_and_empty_towns_db() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let client = RpcClient::new(&transport, "http://api.test/", RetryPolicy::immediate(1));
        let fetcher = BatchFetcher::new(&client, 25);
        let output = dir.path().join("out.db");

        let missing = dir.path().join("missing.db");
        let err = harvest_cash_points(&fetcher, &missing, &output, None, |_| {}).unwrap_err();
        assert_eq!(err.exit_code(), 3);

        let empty = towns_db(dir.path(), &[]);
        let err = harvest_cash_points(&fetcher, &empty, &output, None, |_| {}).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_postprocess_enriches_points() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cashpoints.db");
        let output = dir.path().join("processed.db");

        let mut plain = crate::types::CashPoint::new(1, crate::types::PointType::Atm, 1, 4);
        plain.additional = "Вход по пропускам, валюта: рубли, доллары".to_string();
        let mut deposit = crate::types::CashPoint::new(2, crate::types::PointType::Atm, 1, 4);
        deposit.additional = "Функция приема наличных".to_string();
        {
            let mut store = Store::open(&input).unwrap();
            store.create_cashpoint_table().unwrap();
            store.commit_scope(&[plain, deposit]).unwrap();
        }

        assert_eq!(postprocess(&input, &output).unwrap(), 2);
        let enriched = Store::open(&output).unwrap().load_enriched().unwrap();
        assert!(!enriched[0].point.free_access);
        assert!(enriched[0].usd);
        assert!(!enriched[0].cash_in);
        assert!(enriched[1].cash_in);
    }

    #[test]
    fn test_read_raw_towns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("towns.json");

        fs::write(&path, r#"{"data": [{"id": 1, "name": "Москва"}]}"#).unwrap();
        assert_eq!(read_raw_towns(&path).unwrap().len(), 1);

        fs::write(&path, r#"{"data": []}"#).unwrap();
        assert_eq!(read_raw_towns(&path).unwrap_err().exit_code(), 4);

        fs::write(&path, r#"{"items": []}"#).unwrap();
        assert!(matches!(
            read_raw_towns(&path),
            Err(HarvesterError::MissingField { .. })
        ));
    }

    #[test]
    fn test_prepare_output_respects_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.db");
        fs::write(&path, "x").unwrap();

        prepare_output(&path, true).unwrap();
        assert!(path.exists());
        prepare_output(&path, false).unwrap();
        assert!(!path.exists());
    }
}
