//! Shared helpers for the router and import tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use opsreport::observability::MetricsRegistry;
use opsreport::state::AppState;
use opsreport::store::MemoryStore;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use tower::ServiceExt;

pub const BOUNDARY: &str = "----opsreport-test-boundary";

/// Router over a fresh in-memory store, plus a handle on that store.
pub fn app() -> (Router, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::new());
	let metrics = Arc::new(MetricsRegistry::new().expect("metrics registry"));
	let state = AppState::new(store.clone(), metrics, 2);
	(opsreport::router(state, 1024 * 1024), store)
}

/// A cell in a fixture workbook.
pub enum Cell<'a> {
	Text(&'a str),
	Number(f64),
	Link(&'a str, &'a str),
	Empty,
}

/// Build an `.xlsx` whose first sheet holds `rows`, starting at A1.
pub fn workbook(rows: &[Vec<Cell>]) -> Vec<u8> {
	let mut wb = Workbook::new();
	let ws = wb.add_worksheet();
	for (r, cells) in rows.iter().enumerate() {
		for (c, cell) in cells.iter().enumerate() {
			let (r, c) = (r as u32, c as u16);
			match cell {
				Cell::Text(s) => {
					ws.write_string(r, c, *s).expect("write string");
				}
				Cell::Number(n) => {
					ws.write_number(r, c, *n).expect("write number");
				}
				Cell::Link(text, url) => {
					ws.write_url_with_text(r, c, *url, *text).expect("write url");
				}
				Cell::Empty => {}
			}
		}
	}
	wb.save_to_buffer().expect("save workbook")
}

pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
	let mut body = Vec::new();
	body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
	body.extend_from_slice(
		format!(
			"Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
			field, filename
		)
		.as_bytes(),
	);
	body.extend_from_slice(
		b"Content-Type: application/vnd.openxmlformats-officedocument.spreadsheetml.sheet\r\n\r\n",
	);
	body.extend_from_slice(bytes);
	body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
	body
}

pub fn upload_request(uri: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header(
			header::CONTENT_TYPE,
			format!("multipart/form-data; boundary={}", BOUNDARY),
		)
		.body(Body::from(multipart_body("file", filename, bytes)))
		.expect("request")
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(body.to_string()))
		.expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(uri)
		.body(Body::empty())
		.expect("request")
}

/// Send one request and decode the JSON body (`Null` when empty).
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
	let resp = app.clone().oneshot(req).await.expect("response");
	let status = resp.status();
	let bytes = to_bytes(resp.into_body(), usize::MAX)
		.await
		.expect("read body");
	let value = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).unwrap_or_else(|_| {
			Value::String(String::from_utf8_lossy(&bytes).into_owned())
		})
	};
	(status, value)
}

/// Categorization export with two banners and hyperlinked request ids.
pub fn categorization_workbook() -> Vec<u8> {
	use Cell::*;
	workbook(&[
		vec![Text("Technician"), Text("Created Time"), Text("Request ID")],
		vec![Empty, Text("Consulta")],
		vec![
			Text("ana"),
			Number(45292.5),
			Link("1001", "https://sd.local/WorkOrder.do?woID=1001&woMode=viewWO"),
			Text("Ventas"),
			Text("No imprime"),
			Text(""),
			Text("500"),
		],
		vec![
			Text("luis"),
			Number(45293.0),
			Number(1002.0),
			Text("Compras"),
			Text("Error OC"),
			Text("PRB-1"),
			Text("No asignado"),
		],
		vec![Text("Requerimiento")],
		vec![
			Text("eva"),
			Number(45294.0),
			Number(998.0),
			Text("Ventas"),
			Text("Nuevo reporte"),
			Text(""),
			Text("500"),
		],
	])
}

/// War-room export: title row, header row, then `rows` as
/// `(serial date, incident, application)`.
pub fn war_room_workbook(rows: &[(f64, &str, &str)]) -> Vec<u8> {
	use Cell::*;
	let mut sheet = vec![
		vec![Text("War Rooms")],
		vec![Text("Fecha"), Text("Incidente"), Text("Aplicación")],
	];
	for (date, incident, app) in rows {
		sheet.push(vec![
			Number(*date),
			Text(*incident),
			Text(*app),
			Text("09:00"),
			Text("10:30"),
			Empty,
			Number(4.0),
			Text("Cerrado"),
		]);
	}
	workbook(&sheet)
}

pub fn request_tag_workbook() -> Vec<u8> {
	use Cell::*;
	workbook(&[
		vec![Text("Solicitud"), Text("Información"), Text("Tag")],
		vec![Number(500.0), Text("Cliente VIP"), Text("Urgente")],
		vec![Number(500.0), Text("Legal"), Text("No asignado")],
		vec![Number(500.0), Text("Cliente VIP"), Text("Urgente")],
	])
}
