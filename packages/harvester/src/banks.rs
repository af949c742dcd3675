//! Bank list harvest.
//!
//! The API lists head banks and their city branches together. A branch has
//! no licence and is named `"<parent name> — <city>"`; it is recorded as a
//! [`BankBranch`] pointing at the parent's id.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::config::METHOD_BANK_LIST;
use crate::error::{HarvesterError, Result};
use crate::fields;
use crate::http::Transport;
use crate::rpc::RpcClient;
use crate::types::{Bank, BankBranch};

/// Separator between parent name and city in branch names.
const BRANCH_SEPARATOR: char = '\u{2014}';

/// One bank list entry before licence filtering.
#[derive(Debug, Clone, PartialEq)]
struct ListedBank {
    id: i64,
    name: String,
    licence: String,
    name_eng: String,
    region: String,
}

fn listed_bank(value: &Value) -> Result<ListedBank> {
    let id = fields::required_i64(value, "bank_id", "bank list")?;
    Ok(ListedBank {
        id,
        name: fields::text(value, "bank_name"),
        licence: fields::text(value, "licence"),
        name_eng: fields::text(value, "name_eng"),
        region: fields::text(value, "region"),
    })
}

/// Licence number, if the licence text is purely digits.
fn parse_licence(text: &str) -> Option<i64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parent name of a branch entry, or `None` for a head bank.
fn branch_parent_name(bank: &ListedBank) -> Option<&str> {
    if bank.name.is_empty() || !bank.licence.is_empty() {
        return None;
    }
    bank.name
        .find(BRANCH_SEPARATOR)
        .map(|index| bank.name[..index].trim())
}

/// Split raw bank list records into persisted banks and branch relations.
///
/// Banks without a numeric licence are dropped. A branch whose parent name
/// matches no listed bank is a data error.
pub fn banks_from_json(records: &[Value]) -> Result<(Vec<Bank>, Vec<BankBranch>)> {
    let listed = records
        .iter()
        .map(listed_bank)
        .collect::<Result<Vec<_>>>()?;

    let ids_by_name: HashMap<&str, i64> = listed.iter().map(|b| (b.name.as_str(), b.id)).collect();

    let mut banks = Vec::new();
    let mut branches = Vec::new();
    for bank in &listed {
        if let Some(parent_name) = branch_parent_name(bank) {
            let parent = ids_by_name.get(parent_name).copied().ok_or_else(|| {
                HarvesterError::InvalidField {
                    field: "bank_name".to_string(),
                    context: format!("bank {}", bank.id),
                    value: format!("unknown parent bank '{parent_name}'"),
                }
            })?;
            branches.push(BankBranch {
                id: bank.id,
                parent,
            });
        }

        match parse_licence(&bank.licence) {
            Some(licence) => banks.push(Bank {
                id: bank.id,
                name: bank.name.clone(),
                licence: Some(licence),
                name_tr: bank.name_eng.clone(),
                region: bank.region.clone(),
            }),
            None => tracing::debug!(
                bank_id = bank.id,
                licence = %bank.licence,
                "skipping bank without numeric licence"
            ),
        }
    }

    Ok((banks, branches))
}

/// Fetch the bank list. An exhausted call yields empty lists.
pub fn fetch_banks<T: Transport>(client: &RpcClient<T>) -> Result<(Vec<Bank>, Vec<BankBranch>)> {
    let Some(data) = client.call(METHOD_BANK_LIST, &json!({}))? else {
        tracing::warn!("bank list request failed, nothing to store");
        return Ok((Vec::new(), Vec::new()));
    };
    let (banks, branches) = banks_from_json(data.items())?;
    tracing::info!(banks = banks.len(), branches = branches.len(), "bank list fetched");
    Ok((banks, branches))
}
