//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;

use cashpoints_harvester::http::Transport;
use cashpoints_harvester::{HarvesterError, Result};
use serde_json::{json, Value};

/// In-memory API answering each RPC call through a handler keyed on the
/// method name. GET requests (geocoder) go to a separate handler.
pub struct FakeApi<P, G> {
    on_post: P,
    on_get: G,
    methods: RefCell<Vec<String>>,
}

impl<P, G> FakeApi<P, G>
where
    P: Fn(&str, &Value) -> Value,
    G: Fn(&str) -> String,
{
    pub fn new(on_post: P, on_get: G) -> Self {
        Self {
            on_post,
            on_get,
            methods: RefCell::new(Vec::new()),
        }
    }

    /// RPC methods called so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.methods.borrow().clone()
    }
}

impl<P, G> Transport for FakeApi<P, G>
where
    P: Fn(&str, &Value) -> Value,
    G: Fn(&str) -> String,
{
    fn post(&self, _url: &str, _headers: &[(&str, &str)], body: &str) -> Result<String> {
        let request: Value = serde_json::from_str(body)?;
        let method = request["method"]
            .as_str()
            .ok_or_else(|| HarvesterError::Config("request without method".into()))?;
        self.methods.borrow_mut().push(method.to_string());
        Ok((self.on_post)(method, &request["params"]).to_string())
    }

    fn get(&self, url: &str) -> Result<String> {
        Ok((self.on_get)(url))
    }
}

/// Success envelope.
pub fn ok(data: Value) -> Value {
    json!({ "result": { "data": data } })
}

/// Success envelope with a total count.
pub fn ok_total(data: Value, total: usize) -> Value {
    json!({ "result": { "data": data, "total": total } })
}

/// Error envelope.
pub fn api_error(message: &str) -> Value {
    json!({ "error": { "message": message } })
}

/// Geocoder answer naming one administrative area.
pub fn geocoder_xml(area: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<ymaps xmlns="http://maps.yandex.ru/ymaps/1.x">
  <GeoObjectCollection>
    <featureMember xmlns="http://www.opengis.net/gml">
      <GeoObject xmlns="http://maps.yandex.ru/ymaps/1.x">
        <metaDataProperty xmlns="http://www.opengis.net/gml">
          <GeocoderMetaData xmlns="http://maps.yandex.ru/geocoder/1.x">
            <AddressDetails xmlns="urn:oasis:names:tc:ciq:xsdschema:xAL:2.0">
              <Country>
                <AdministrativeArea>
                  <AdministrativeAreaName>{area}</AdministrativeAreaName>
                </AdministrativeArea>
              </Country>
            </AddressDetails>
          </GeocoderMetaData>
        </metaDataProperty>
      </GeoObject>
    </featureMember>
  </GeoObjectCollection>
</ymaps>"#
    )
}
