use crate::client::{ClientError, SnmpClient};
use crate::middleware::{cors_layer, trace::trace_requests};
use crate::mib::{MibRegistryRef, ScalarId};
use crate::protocol::{Value, VarBind};
use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::{CacheError, MetricCacheRef, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::TcpListener;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

/// Which responder produced a [`MetricsPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "HTTP/TCP")]
    Http,
    #[serde(rename = "SNMP/UDP")]
    Snmp,
}

/// The JSON document served by both metrics routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    pub cpu: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    pub os: String,
    pub uptime: u64,
    pub cpu_name: String,
    pub cpu_cores: u32,
    pub temp: f64,
    /// MB/s.
    pub rx_sec: f64,
    /// MB/s.
    pub tx_sec: f64,
    pub disk_used_percentage: f64,
    pub disk_total_gb: f64,
    /// Unix milliseconds of the snapshot the payload was built from.
    pub timestamp: i64,
    pub protocol: Protocol,
}

impl MetricsPayload {
    pub fn native(snapshot: &Snapshot) -> Self {
        MetricsPayload {
            cpu: snapshot.cpu_load_percent(),
            memory_used_mb: snapshot.memory_used_mb(),
            memory_total_mb: snapshot.memory_total_mb(),
            os: snapshot.os_description().clone(),
            uptime: snapshot.uptime_seconds(),
            cpu_name: snapshot.cpu_name().clone(),
            cpu_cores: snapshot.cpu_physical_cores(),
            temp: snapshot.cpu_temperature_c(),
            rx_sec: snapshot.network_rx_mbs(),
            tx_sec: snapshot.network_tx_mbs(),
            disk_used_percentage: snapshot.disk_used_percent(),
            disk_total_gb: snapshot.disk_total_gb(),
            timestamp: snapshot.captured_at_unix_ms(),
            protocol: Protocol::Http,
        }
    }

    /// SNMP values for the seven core fields, the rest from `snapshot`.
    pub fn from_snmp(snapshot: &Snapshot, view: &SnmpView) -> Self {
        MetricsPayload {
            cpu: view.cpu as f64,
            memory_used_mb: view.memory_used_mb as f64,
            memory_total_mb: view.memory_total_mb as f64,
            os: view.os.clone(),
            rx_sec: view.rx_kbs as f64 / 1024.0,
            tx_sec: view.tx_kbs as f64 / 1024.0,
            disk_used_percentage: view.disk_used_percent as f64,
            protocol: Protocol::Snmp,
            ..MetricsPayload::native(snapshot)
        }
    }

    /// JSON has no representation for NaN or infinity.
    fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("cpu", self.cpu),
            ("memoryUsedMb", self.memory_used_mb),
            ("memoryTotalMb", self.memory_total_mb),
            ("temp", self.temp),
            ("rxSec", self.rx_sec),
            ("txSec", self.tx_sec),
            ("diskUsedPercentage", self.disk_used_percentage),
            ("diskTotalGb", self.disk_total_gb),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(field, _)| field)
    }
}

/// The seven core metrics as read back over SNMP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpView {
    pub cpu: i64,
    pub memory_used_mb: i64,
    pub memory_total_mb: i64,
    pub rx_kbs: i64,
    pub tx_kbs: i64,
    pub disk_used_percent: i64,
    pub os: String,
}

impl SnmpView {
    /// Matches the bindings of a GET response to the registered scalars. Every scalar must be
    /// present with its declared syntax.
    pub fn from_varbinds(mib: &MibRegistryRef, varbinds: &[VarBind]) -> Result<Self, ClientError> {
        let value_of = |id: ScalarId| -> Result<Value, ClientError> {
            let oid = mib.oid_of(id).ok_or_else(|| {
                ClientError::UnexpectedResponse(format!("{} is not registered", id))
            })?;
            let varbind = varbinds
                .iter()
                .find(|varbind| &varbind.oid == oid)
                .ok_or_else(|| ClientError::UnexpectedResponse(format!("{} missing", id)))?;
            if varbind.value.is_exception() {
                return Err(ClientError::UnexpectedResponse(format!(
                    "{}: {}",
                    id, varbind.value
                )));
            }
            Ok(varbind.value.clone())
        };
        let integer = |id: ScalarId| -> Result<i64, ClientError> {
            let value = value_of(id)?;
            value.as_integer().ok_or_else(|| {
                ClientError::UnexpectedResponse(format!("{} is not an INTEGER: {}", id, value))
            })
        };

        let os = value_of(ScalarId::OsDescription)?;
        let os = os.as_octets().ok_or_else(|| {
            ClientError::UnexpectedResponse(format!(
                "{} is not an OCTET STRING: {}",
                ScalarId::OsDescription,
                os
            ))
        })?;

        Ok(SnmpView {
            cpu: integer(ScalarId::Cpu)?,
            memory_used_mb: integer(ScalarId::MemoryUsed)?,
            memory_total_mb: integer(ScalarId::MemoryTotal)?,
            rx_kbs: integer(ScalarId::RxRate)?,
            tx_kbs: integer(ScalarId::TxRate)?,
            disk_used_percent: integer(ScalarId::DiskUsed)?,
            os: String::from_utf8_lossy(os).into_owned(),
        })
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    NoData(#[from] CacheError),
    #[error("Failed to serialize metrics: {0}")]
    Serialization(String),
    #[error("SNMP round trip failed: {0}")]
    Snmp(#[from] ClientError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NoData(_) => {
                warn!("{}", self);
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Serialization(_) | ApiError::Snmp(_) => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct HttpState {
    cache: MetricCacheRef,
    mib: MibRegistryRef,
    snmp_client: Arc<SnmpClient>,
    #[builder(default = "/metrics".to_string(), setter(into))]
    metrics_path: String,
}

impl HttpState {
    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }

    pub fn snmp_path(&self) -> String {
        format!("{}/snmp", self.metrics_path.trim_end_matches('/'))
    }
}

pub fn router(state: HttpState) -> Router {
    let metrics_path = state.metrics_path().to_string();
    let snmp_path = state.snmp_path();

    Router::new()
        // GET handlers also answer HEAD unless HEAD is routed explicitly
        .route(
            &metrics_path,
            get(native_metrics).head(not_found).fallback(not_found),
        )
        .route(
            &snmp_path,
            get(snmp_metrics).head(not_found).fallback(not_found),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(axum::middleware::from_fn(trace_requests))
        .layer(cors_layer())
}

/// Serves `router` on an already bound listener until the server fails.
pub async fn serve(listener: TcpListener, router: Router) -> anyhow::Result<()> {
    listener.set_nonblocking(true)?;
    info!("HTTP responder listening on http://{}", listener.local_addr()?);

    axum::Server::from_tcp(listener)?
        .serve(router.into_make_service())
        .await
        .context("HTTP responder failed")
}

async fn native_metrics(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let snapshot = state.cache.read()?;
    json_response(&MetricsPayload::native(&snapshot))
}

async fn snmp_metrics(State(state): State<HttpState>) -> Result<Response, ApiError> {
    if state.cache.is_empty() {
        return Err(CacheError::NoDataYet.into());
    }
    let varbinds = state.snmp_client.get(&state.mib.oids()).await?;
    let view = SnmpView::from_varbinds(&state.mib, &varbinds)?;

    // cache-only fields come from the snapshot current after the round trip
    let snapshot = state.cache.read()?;
    let generation = state.mib.generation();
    if generation != snapshot.cycle() {
        debug!(
            mib = generation,
            cache = snapshot.cycle(),
            "SNMP values and cached snapshot are from different cycles"
        );
    }
    json_response(&MetricsPayload::from_snmp(&snapshot, &view))
}

fn json_response(payload: &MetricsPayload) -> Result<Response, ApiError> {
    if let Some(field) = payload.non_finite_field() {
        return Err(ApiError::Serialization(format!(
            "`{}` is not a finite number",
            field
        )));
    }
    let body = serde_json::to_vec(payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
