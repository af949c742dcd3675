//! Paginated list-then-detail fetching of point records for one scope.
//!
//! A scope is one town id. The fetch is a prefetch for the total count, then
//! per page a summary list request followed by one batched detail request for
//! the ids on that page. Pages whose requests degrade to an empty result are
//! skipped and logged; their records are lost for this run.

use serde_json::{json, Value};

use crate::config::{METHOD_LIST_OBJECTS, METHOD_OBJECTS_DATA};
use crate::error::{HarvesterError, Result};
use crate::http::Transport;
use crate::rpc::RpcClient;
use crate::types::PointType;

/// Cumulative progress within one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub done: usize,
    pub total: usize,
}

/// List-then-detail fetcher over an [`RpcClient`].
pub struct BatchFetcher<'a, T> {
    client: &'a RpcClient<T>,
    page_size: usize,
    types: Vec<PointType>,
}

impl<'a, T: Transport> BatchFetcher<'a, T> {
    /// Fetcher for every point type.
    pub fn new(client: &'a RpcClient<T>, page_size: usize) -> Self {
        Self {
            client,
            page_size,
            types: PointType::ALL.to_vec(),
        }
    }

    /// Restrict the point types requested.
    #[must_use]
    pub fn with_types(mut self, types: Vec<PointType>) -> Self {
        self.types = types;
        self
    }

    fn filter_params(&self, town_id: i64, offset: Option<usize>) -> Value {
        let types: Vec<&str> = self.types.iter().map(PointType::as_str).collect();
        let mut params = json!({
            "with_empty_coordinates": true,
            "limit": self.page_size,
            "type": types,
            "region_id": [town_id],
        });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }
        params
    }

    /// Number of records the API reports for `town_id`, or `None` when the
    /// prefetch itself degraded to an empty result.
    pub fn prefetch_total(&self, town_id: i64) -> Result<Option<usize>> {
        let Some(data) = self
            .client
            .call(METHOD_LIST_OBJECTS, &self.filter_params(town_id, None))?
        else {
            return Ok(None);
        };

        let total = data.total.ok_or_else(|| HarvesterError::MissingField {
            field: "result.total".to_string(),
            context: format!("prefetch for town {town_id}"),
        })?;
        let total = usize::try_from(total).map_err(|_| HarvesterError::InvalidField {
            field: "result.total".to_string(),
            context: format!("prefetch for town {town_id}"),
            value: total.to_string(),
        })?;
        Ok(Some(total))
    }

    /// Fetch all detail records for `town_id`.
    ///
    /// # Arguments
    /// * `town_id` - Scope to fetch
    /// * `progress` - Called with cumulative `(done, total)` after each page
    ///
    /// # Returns
    /// Raw detail records in page order
    pub fn fetch_scope(
        &self,
        town_id: i64,
        mut progress: impl FnMut(FetchProgress),
    ) -> Result<Vec<Value>> {
        let total = match self.prefetch_total(town_id)? {
            Some(0) => {
                tracing::info!(town_id, "zero total count in prefetch");
                return Ok(Vec::new());
            }
            Some(total) => total,
            None => {
                tracing::warn!(town_id, "prefetch failed, skipping town");
                return Ok(Vec::new());
            }
        };

        let pages = total.div_ceil(self.page_size);
        tracing::debug!(town_id, total, pages, "fetching town");

        // `total` is whatever the server claims; never size buffers from it.
        let mut records = Vec::new();
        for page in 0..pages {
            let offset = page * self.page_size;
            records.extend(self.fetch_page(town_id, page, offset)?);
            progress(FetchProgress {
                done: (offset + self.page_size).min(total),
                total,
            });
        }
        Ok(records)
    }

    /// One summary request plus its detail batch. Empty results skip the page.
    fn fetch_page(&self, town_id: i64, page: usize, offset: usize) -> Result<Vec<Value>> {
        let params = self.filter_params(town_id, Some(offset));
        let Some(summary) = self.client.call(METHOD_LIST_OBJECTS, &params)? else {
            tracing::warn!(town_id, page, offset, "summary list failed, skipping page");
            return Ok(Vec::new());
        };

        let ids = summary
            .items()
            .iter()
            .map(|item| summary_id(item, town_id))
            .collect::<Result<Vec<_>>>()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let params = json!({ "id_list": ids });
        match self.client.call(METHOD_OBJECTS_DATA, &params)? {
            Some(detail) => Ok(detail.items().to_vec()),
            None => {
                tracing::warn!(town_id, page, offset, "detail batch failed, skipping page");
                Ok(Vec::new())
            }
        }
    }
}

/// The detail method takes ids as strings whatever the list method returned.
fn summary_id(item: &Value, town_id: i64) -> Result<String> {
    match item.get("id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(HarvesterError::MissingField {
            field: "id".to_string(),
            context: format!("summary list for town {town_id}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::http::mock::ScriptedTransport;
    use pretty_assertions::assert_eq;

    fn summary(ids: &[i64]) -> Value {
        let items: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
        json!({"result": {"data": items}})
    }

    fn details(ids: &[i64]) -> Value {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "type": "atm"}))
            .collect();
        json!({"result": {"data": items}})
    }

    fn rpc(transport: &ScriptedTransport, attempts: u32) -> RpcClient<&ScriptedTransport> {
        RpcClient::new(transport, "http://api.test/", RetryPolicy::immediate(attempts))
    }

    #[test]
    fn test_zero_total_stops_after_prefetch() {
        let transport = ScriptedTransport::new();
        transport.respond(json!({"result": {"data": [], "total": 0}}));
        let client = rpc(&transport, 5);

        let records = BatchFetcher::new(&client, 25).fetch_scope(4, |_| {}).unwrap();
        assert!(records.is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_thirty_records_two_pages() {
        let first: Vec<i64> = (1..=25).collect();
        let second: Vec<i64> = (26..=30).collect();
        let transport = ScriptedTransport::new();
        transport
            .respond(json!({"result": {"data": [], "total": 30}}))
            .respond(summary(&first))
            .respond(details(&first))
            .respond(summary(&second))
            .respond(details(&second));
        let client = rpc(&transport, 5);

        let mut reports = Vec::new();
        let records = BatchFetcher::new(&client, 25)
            .fetch_scope(4, |p| reports.push(p))
            .unwrap();

        assert_eq!(records.len(), 30);
        let offsets: Vec<Value> = transport
            .json_bodies()
            .iter()
            .filter(|b| b["method"] == METHOD_LIST_OBJECTS)
            .filter_map(|b| b["params"].get("offset").cloned())
            .collect();
        assert_eq!(offsets, vec![json!(0), json!(25)]);
        assert_eq!(
            reports,
            vec![
                FetchProgress { done: 25, total: 30 },
                FetchProgress { done: 30, total: 30 },
            ]
        );
    }

    #[test]
    fn test_detail_request_carries_string_ids() {
        let transport = ScriptedTransport::new();
        transport
            .respond(json!({"result": {"data": [], "total": 2}}))
            .respond(json!({"result": {"data": [{"id": 11}, {"id": "12"}]}}))
            .respond(details(&[11, 12]));
        let client = rpc(&transport, 5);

        BatchFetcher::new(&client, 25).fetch_scope(4, |_| {}).unwrap();

        let bodies = transport.json_bodies();
        assert_eq!(bodies[2]["method"], METHOD_OBJECTS_DATA);
        assert_eq!(bodies[2]["params"]["id_list"], json!(["11", "12"]));
        assert_eq!(bodies[1]["params"]["region_id"], json!([4]));
        assert_eq!(
            bodies[1]["params"]["type"],
            json!(["office", "branch", "atm", "cash", "self_office"])
        );
    }

    #[test]
    fn test_failed_page_is_skipped() {
        let transport = ScriptedTransport::new();
        transport
            .respond(json!({"result": {"data": [], "total": 3}}))
            .respond(json!({"error": {"message": "busy"}}))
            .respond(json!({"error": {"message": "busy"}}))
            .respond(summary(&[3]))
            .respond(details(&[3]));
        let client = rpc(&transport, 2);

        let records = BatchFetcher::new(&client, 2).fetch_scope(4, |_| {}).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], 3);
    }

    #[test]
    fn test_failed_prefetch_yields_empty() {
        let transport = ScriptedTransport::new();
        transport.respond(json!({"error": {"message": "busy"}}));
        let client = rpc(&transport, 1);

        let records = BatchFetcher::new(&client, 25).fetch_scope(4, |_| {}).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_prefetch_without_total_is_data_error() {
        let transport = ScriptedTransport::new();
        transport.respond(json!({"result": {"data": []}}));
        let client = rpc(&transport, 1);

        let err = BatchFetcher::new(&client, 25)
            .fetch_scope(4, |_| {})
            .unwrap_err();
        assert!(matches!(err, HarvesterError::MissingField { .. }));
    }

    #[test]
    fn test_huge_total_does_not_preallocate() {
        let transport = ScriptedTransport::new();
        transport
            .respond(json!({"result": {"data": [], "total": 1_000_000_000_000_000_u64}}))
            .fail(HarvesterError::Connection {
                url: "http://api.test/".to_string(),
                message: "refused".to_string(),
            });
        let client = rpc(&transport, 1);

        let err = BatchFetcher::new(&client, 25)
            .fetch_scope(4, |_| {})
            .unwrap_err();
        assert!(err.is_connection());
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_with_types_restricts_filter() {
        let transport = ScriptedTransport::new();
        transport.respond(json!({"result": {"data": [], "total": 0}}));
        let client = rpc(&transport, 1);

        BatchFetcher::new(&client, 25)
            .with_types(vec![PointType::Atm])
            .fetch_scope(4, |_| {})
            .unwrap();
        assert_eq!(transport.json_bodies()[0]["params"]["type"], json!(["atm"]));
    }
}
