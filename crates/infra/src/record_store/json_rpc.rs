//! Record store adapter speaking the store's JSON-RPC `execute_kw` protocol.
//!
//! Wire conventions handled here: relational many-to-one fields arrive as
//! `[id, "display name"]`, unset fields arrive as `false`, datetimes are naive
//! `YYYY-MM-DD HH:MM:SS` strings.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, warn};

use pickflow_chatter::ChatterMessage;
use pickflow_core::{BatchId, LocationId, MessageId, MoveLineId, PickingId, ProductId};
use pickflow_picking::{Batch, BatchState, Location, MoveLine, Product, parse_scheduled_date};

use super::{BatchQuery, RecordStore, StoreError};
use crate::config::StoreConfig;

const BATCH_MODEL: &str = "stock.picking.batch";
const BATCH_FIELDS: &[&str] = &[
    "id",
    "name",
    "state",
    "scheduled_date",
    "user_id",
    "picking_ids",
    "move_line_ids",
];
const MOVE_LINE_MODEL: &str = "stock.move.line";
const MOVE_LINE_FIELDS: &[&str] = &[
    "id",
    "picking_id",
    "product_id",
    "location_id",
    "location_dest_id",
    "lot_id",
    "lot_name",
    "expiration_date",
    "package_id",
    "product_uom_qty",
    "qty_done",
];

/// JSON-RPC client for the external record store.
#[derive(Debug)]
pub struct JsonRpcStore {
    client: reqwest::Client,
    endpoint: String,
    config: StoreConfig,
    next_id: AtomicU64,
}

impl JsonRpcStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: StoreConfig) -> Self {
        let endpoint = format!("{}/jsonrpc", config.url.trim_end_matches('/'));
        Self {
            client,
            endpoint,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: JsonValue,
        kwargs: JsonValue,
    ) -> Result<JsonValue, StoreError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": [
                    self.config.database,
                    self.config.uid,
                    self.config.api_key,
                    model,
                    method,
                    args,
                    kwargs,
                ],
            },
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        debug!(model, method, "record store call");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    StoreError::Connectivity(format!("{}: {e}", self.endpoint))
                } else {
                    StoreError::Remote(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StoreError::Authentication(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(StoreError::Remote(format!("HTTP {status} from {model}.{method}")));
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("response body: {e}")))?;
        rpc_result(payload)
    }

    async fn search_read(
        &self,
        model: &str,
        domain: JsonValue,
        fields: &[&str],
        order: &str,
        limit: Option<usize>,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let mut kwargs = json!({ "fields": fields, "order": order });
        if let Some(limit) = limit {
            kwargs["limit"] = json!(limit);
        }
        let result = self
            .execute_kw(model, "search_read", json!([domain]), kwargs)
            .await?;
        as_records(result)
    }

    async fn read(
        &self,
        model: &str,
        ids: &[u64],
        fields: &[&str],
    ) -> Result<Vec<JsonValue>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let result = self
            .execute_kw(model, "read", json!([ids]), json!({ "fields": fields }))
            .await?;
        as_records(result)
    }

    async fn search_count(&self, model: &str, domain: JsonValue) -> Result<usize, StoreError> {
        let result = self
            .execute_kw(model, "search_count", json!([domain]), json!({}))
            .await?;
        result
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| StoreError::Decode(format!("{model}.search_count returned {result}")))
    }

    async fn products(&self, ids: &[u64]) -> Result<BTreeMap<u64, Product>, StoreError> {
        let records = self
            .read(
                "product.product",
                ids,
                &["id", "display_name", "barcode", "default_code"],
            )
            .await?;
        records
            .iter()
            .map(|r| decode_product(r).map(|p| (p.id.get(), p)))
            .collect()
    }

    async fn locations(&self, ids: &[u64]) -> Result<BTreeMap<u64, Location>, StoreError> {
        let records = self
            .read(
                "stock.location",
                ids,
                &["id", "complete_name", "barcode", "location_id", "child_ids"],
            )
            .await?;
        records
            .iter()
            .map(|r| decode_location(r).map(|l| (l.id.get(), l)))
            .collect()
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonRpcStore {
    async fn search_batches(&self, query: &BatchQuery) -> Result<Vec<Batch>, StoreError> {
        let records = self
            .search_read(
                BATCH_MODEL,
                batch_domain(query),
                BATCH_FIELDS,
                "scheduled_date asc, id asc",
                query.limit,
            )
            .await?;
        records.iter().map(decode_batch).collect()
    }

    async fn read_batch(&self, id: BatchId) -> Result<Batch, StoreError> {
        let records = self.read(BATCH_MODEL, &[id.get()], BATCH_FIELDS).await?;
        let record = records
            .first()
            .ok_or_else(|| StoreError::NotFound(format!("batch {id}")))?;
        decode_batch(record)
    }

    async fn read_move_lines(&self, ids: &[MoveLineId]) -> Result<Vec<MoveLine>, StoreError> {
        let raw_ids: Vec<u64> = ids.iter().map(|id| id.get()).collect();
        let records = self.read(MOVE_LINE_MODEL, &raw_ids, MOVE_LINE_FIELDS).await?;

        let mut product_ids = Vec::new();
        let mut location_ids = Vec::new();
        for record in &records {
            product_ids.extend(many2one(&record["product_id"]).map(|(id, _)| id));
            location_ids.extend(many2one(&record["location_id"]).map(|(id, _)| id));
            location_ids.extend(many2one(&record["location_dest_id"]).map(|(id, _)| id));
        }
        product_ids.sort_unstable();
        product_ids.dedup();
        location_ids.sort_unstable();
        location_ids.dedup();

        let products = self.products(&product_ids).await?;
        let locations = self.locations(&location_ids).await?;

        records
            .iter()
            .map(|record| decode_move_line(record, &products, &locations))
            .collect()
    }

    async fn read_messages(&self, batch: BatchId) -> Result<Vec<ChatterMessage>, StoreError> {
        let domain = json!([["model", "=", BATCH_MODEL], ["res_id", "=", batch.get()]]);
        let records = self
            .search_read(
                "mail.message",
                domain,
                &["id", "body", "date", "author_id"],
                "date asc, id asc",
                None,
            )
            .await?;
        records.iter().map(decode_message).collect()
    }

    async fn count_pickings(&self, batch: BatchId) -> Result<usize, StoreError> {
        self.search_count("stock.picking", json!([["batch_id", "=", batch.get()]]))
            .await
    }

    async fn count_move_lines(&self, batch: BatchId) -> Result<usize, StoreError> {
        self.search_count(MOVE_LINE_MODEL, json!([["batch_id", "=", batch.get()]]))
            .await
    }

    async fn write_quantity_done(&self, line: MoveLineId, quantity: f64) -> Result<(), StoreError> {
        let result = self
            .execute_kw(
                MOVE_LINE_MODEL,
                "write",
                json!([[line.get()], { "qty_done": quantity }]),
                json!({}),
            )
            .await?;
        if result.as_bool() != Some(true) {
            return Err(StoreError::Remote(format!(
                "write of move line {line} was not acknowledged"
            )));
        }
        Ok(())
    }
}

/// Unwrap a JSON-RPC envelope into its result, mapping access errors to authentication failures.
fn rpc_result(mut payload: JsonValue) -> Result<JsonValue, StoreError> {
    if let Some(error) = payload.get("error") {
        let name = error["data"]["name"].as_str().unwrap_or_default();
        let message = error["data"]["message"]
            .as_str()
            .or_else(|| error["message"].as_str())
            .unwrap_or("unknown error")
            .to_string();
        if name.contains("AccessDenied") || name.contains("AccessError") {
            return Err(StoreError::Authentication(message));
        }
        if name.contains("MissingError") {
            return Err(StoreError::NotFound(message));
        }
        return Err(StoreError::Remote(message));
    }
    match payload.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(StoreError::Decode("response without result".to_string())),
    }
}

fn as_records(value: JsonValue) -> Result<Vec<JsonValue>, StoreError> {
    match value {
        JsonValue::Array(records) => Ok(records),
        other => Err(StoreError::Decode(format!("expected a record list, got {other}"))),
    }
}

fn batch_domain(query: &BatchQuery) -> JsonValue {
    let mut domain = Vec::new();
    if let Some(state) = query.state {
        domain.push(json!(["state", "=", state.as_str()]));
    }
    if let Some(day) = query.scheduled_on {
        domain.push(json!(["scheduled_date", ">=", format!("{day} 00:00:00")]));
        domain.push(json!(["scheduled_date", "<=", format!("{day} 23:59:59")]));
    }
    JsonValue::Array(domain)
}

/// `false` and `null` both mean "unset".
fn present(value: &JsonValue) -> Option<&JsonValue> {
    match value {
        JsonValue::Null | JsonValue::Bool(false) => None,
        other => Some(other),
    }
}

fn text(value: &JsonValue) -> Option<String> {
    present(value)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn many2one(value: &JsonValue) -> Option<(u64, String)> {
    let pair = present(value)?.as_array()?;
    let id = pair.first()?.as_i64().filter(|id| *id > 0)? as u64;
    let name = pair.get(1).and_then(JsonValue::as_str).unwrap_or_default();
    Some((id, name.to_string()))
}

fn id_list(value: &JsonValue) -> Vec<u64> {
    present(value)
        .and_then(JsonValue::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(JsonValue::as_i64)
                .filter(|id| *id > 0)
                .map(|id| id as u64)
                .collect()
        })
        .unwrap_or_default()
}

fn record_id(record: &JsonValue, what: &str) -> Result<i64, StoreError> {
    record["id"]
        .as_i64()
        .ok_or_else(|| StoreError::Decode(format!("{what} without id")))
}

fn number(record: &JsonValue, field: &str) -> f64 {
    present(&record[field]).and_then(JsonValue::as_f64).unwrap_or(0.0)
}

fn datetime(value: &JsonValue) -> Result<Option<NaiveDateTime>, StoreError> {
    text(value)
        .map(|raw| parse_scheduled_date(&raw))
        .transpose()
        .map_err(StoreError::from)
}

fn decode_batch(record: &JsonValue) -> Result<Batch, StoreError> {
    let id = BatchId::try_from_raw(record_id(record, "batch")?)?;
    let state = BatchState::parse(record["state"].as_str().unwrap_or_default())?;
    let mut batch = Batch::new(id, text(&record["name"]).unwrap_or_default(), state);
    batch.scheduled_date = datetime(&record["scheduled_date"])?;
    batch.assignee = many2one(&record["user_id"]).map(|(_, name)| name);
    batch.picking_ids = id_list(&record["picking_ids"])
        .into_iter()
        .map(PickingId::new)
        .collect();
    batch.move_line_ids = id_list(&record["move_line_ids"])
        .into_iter()
        .map(MoveLineId::new)
        .collect();
    Ok(batch)
}

fn decode_product(record: &JsonValue) -> Result<Product, StoreError> {
    let id = ProductId::try_from_raw(record_id(record, "product")?)?;
    Ok(Product {
        id,
        name: text(&record["display_name"]).unwrap_or_default(),
        barcode: text(&record["barcode"]),
        default_code: text(&record["default_code"]),
    })
}

fn decode_location(record: &JsonValue) -> Result<Location, StoreError> {
    let id = LocationId::try_from_raw(record_id(record, "location")?)?;
    Ok(Location {
        id,
        complete_name: text(&record["complete_name"]).unwrap_or_default(),
        barcode: text(&record["barcode"]),
        parent_id: many2one(&record["location_id"]).map(|(id, _)| LocationId::new(id)),
        child_ids: id_list(&record["child_ids"])
            .into_iter()
            .map(LocationId::new)
            .collect(),
    })
}

fn decode_move_line(
    record: &JsonValue,
    products: &BTreeMap<u64, Product>,
    locations: &BTreeMap<u64, Location>,
) -> Result<MoveLine, StoreError> {
    let id = MoveLineId::try_from_raw(record_id(record, "move line")?)?;

    let (product_id, product_name) = many2one(&record["product_id"])
        .ok_or_else(|| StoreError::Decode(format!("move line {id} without product")))?;
    let product = products
        .get(&product_id)
        .cloned()
        .unwrap_or_else(|| Product::new(ProductId::new(product_id), product_name));

    let (location_id, location_name) = many2one(&record["location_id"])
        .ok_or_else(|| StoreError::Decode(format!("move line {id} without source location")))?;
    let location = locations
        .get(&location_id)
        .cloned()
        .unwrap_or_else(|| Location::new(LocationId::new(location_id), location_name));

    let location_dest = many2one(&record["location_dest_id"]).map(|(dest_id, name)| {
        locations
            .get(&dest_id)
            .cloned()
            .unwrap_or_else(|| Location::new(LocationId::new(dest_id), name))
    });

    let expiry = match text(&record["expiration_date"]) {
        Some(raw) => match parse_scheduled_date(&raw) {
            Ok(dt) => Some(dt.date()),
            Err(err) => {
                warn!(move_line = %id, error = %err, "ignoring unreadable expiration date");
                None
            }
        },
        None => None,
    };

    Ok(MoveLine {
        id,
        picking_id: many2one(&record["picking_id"]).map(|(id, _)| PickingId::new(id)),
        product,
        location,
        location_dest,
        lot: many2one(&record["lot_id"])
            .map(|(_, name)| name)
            .or_else(|| text(&record["lot_name"])),
        expiry,
        package: many2one(&record["package_id"]).map(|(_, name)| name),
        quantity: number(record, "product_uom_qty"),
        quantity_done: number(record, "qty_done"),
    })
}

fn decode_message(record: &JsonValue) -> Result<ChatterMessage, StoreError> {
    let id = MessageId::try_from_raw(record_id(record, "message")?)?;
    let mut message = ChatterMessage::new(id, text(&record["body"]).unwrap_or_default());
    // Chatter is mined leniently: an unreadable timestamp only drops the date.
    message.date = datetime(&record["date"]).ok().flatten();
    message.author = many2one(&record["author_id"]).map(|(_, name)| name);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn false_means_absent() {
        assert_eq!(text(&json!(false)), None);
        assert_eq!(text(&json!("  ")), None);
        assert_eq!(many2one(&json!(false)), None);
        assert_eq!(many2one(&json!([4, "Anna"])), Some((4, "Anna".to_string())));
        assert!(id_list(&json!(false)).is_empty());
        assert_eq!(id_list(&json!([3, 0, 5])), vec![3, 5]);
    }

    #[test]
    fn decodes_batch_record() {
        let batch = decode_batch(&json!({
            "id": 12,
            "name": "BATCH/00012",
            "state": "in_progress",
            "scheduled_date": "2024-05-02 06:00:00",
            "user_id": [7, "Van 3"],
            "picking_ids": [100, 101],
            "move_line_ids": [1, 2, 3],
        }))
        .unwrap();
        assert_eq!(batch.id, BatchId::new(12));
        assert_eq!(batch.state, BatchState::InProgress);
        assert_eq!(batch.assignee.as_deref(), Some("Van 3"));
        assert_eq!(batch.picking_ids.len(), 2);
        assert_eq!(batch.move_line_ids.len(), 3);
        assert_eq!(
            batch.scheduled_date.map(|d| d.to_string()).as_deref(),
            Some("2024-05-02 06:00:00")
        );
    }

    #[test]
    fn batch_without_id_or_with_bad_date_is_rejected() {
        let err = decode_batch(&json!({ "id": false, "state": "draft" })).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));

        let err = decode_batch(&json!({
            "id": 1,
            "state": "draft",
            "scheduled_date": "tomorrow",
        }))
        .unwrap_err();
        assert!(matches!(err, StoreError::Decode(msg) if msg.contains("scheduled date")));
    }

    #[test]
    fn decodes_move_line_with_resolved_detail() {
        let mut products = BTreeMap::new();
        products.insert(
            5,
            Product::new(ProductId::new(5), "Ice cream").with_barcode("4600001"),
        );
        let mut locations = BTreeMap::new();
        locations.insert(
            9,
            Location::new(LocationId::new(9), "WH/Frozen/F-02").with_barcode("LOC-F02"),
        );

        let line = decode_move_line(
            &json!({
                "id": 40,
                "picking_id": [3, "OUT/0003"],
                "product_id": [5, "Ice cream"],
                "location_id": [9, "WH/Frozen/F-02"],
                "location_dest_id": [2, "WH/Output"],
                "lot_id": false,
                "lot_name": "L-77",
                "expiration_date": "2024-09-30 00:00:00",
                "package_id": false,
                "product_uom_qty": 6.0,
                "qty_done": 2.0,
            }),
            &products,
            &locations,
        )
        .unwrap();

        assert_eq!(line.product.barcode.as_deref(), Some("4600001"));
        assert_eq!(line.location.barcode.as_deref(), Some("LOC-F02"));
        assert_eq!(line.location_dest.map(|l| l.complete_name), Some("WH/Output".to_string()));
        assert_eq!(line.lot.as_deref(), Some("L-77"));
        assert_eq!(line.expiry.map(|d| d.to_string()).as_deref(), Some("2024-09-30"));
        assert_eq!(line.package, None);
        assert_eq!(line.quantity, 6.0);
        assert_eq!(line.quantity_done, 2.0);
    }

    #[test]
    fn rpc_errors_are_classified() {
        let denied = json!({ "error": { "message": "Odoo Server Error", "data": {
            "name": "odoo.exceptions.AccessDenied", "message": "Access Denied" } } });
        assert_eq!(
            rpc_result(denied).unwrap_err(),
            StoreError::Authentication("Access Denied".to_string())
        );

        let other = json!({ "error": { "message": "boom", "data": {} } });
        assert_eq!(rpc_result(other).unwrap_err(), StoreError::Remote("boom".to_string()));

        assert_eq!(rpc_result(json!({ "result": 3 })).unwrap(), json!(3));
    }

    #[test]
    fn message_with_unreadable_date_keeps_its_body() {
        let message = decode_message(&json!({
            "id": 8,
            "body": "<p>[PROBLEM] dented box</p>",
            "date": "yesterday",
            "author_id": [2, "Maria"],
        }))
        .unwrap();
        assert_eq!(message.date, None);
        assert_eq!(message.author.as_deref(), Some("Maria"));
    }

    #[test]
    fn batch_domain_encodes_filters() {
        let query = BatchQuery::new()
            .with_state(BatchState::Done)
            .scheduled_on(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(
            batch_domain(&query),
            json!([
                ["state", "=", "done"],
                ["scheduled_date", ">=", "2024-05-02 00:00:00"],
                ["scheduled_date", "<=", "2024-05-02 23:59:59"],
            ])
        );
    }
}
