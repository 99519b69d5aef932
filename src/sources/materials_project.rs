//! # Materials Project 客户端
//!
//! 通过 Materials Project REST API (`/materials/summary/`) 检索体相结构。
//! 按化学式检索时选取 `energy_above_hull` 最低的条目。
//!
//! ## 错误映射
//! - 缺少 API key、401/403、其他非 2xx、连接失败、响应格式错误 → `IntegrationUnavailable`
//! - 没有带结构的条目 → `MaterialNotFound`
//! - 请求超时 → `RetrievalTimeout`
//!
//! ## 依赖关系
//! - 被 `sources/mod.rs` 使用
//! - 使用 `reqwest` (blocking), `serde`

use super::{LookupRequest, StructureSource};
use crate::error::ResolutionError;
use crate::models::{Atom, BulkStructure, Crystal, Lattice};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.materialsproject.org";

const SOURCE_NAME: &str = "materials-project";
const FIELDS: &str = "material_id,formula_pretty,energy_above_hull,structure";

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl Default for MpConfig {
    fn default() -> Self {
        MpConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// API 响应
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    data: Vec<SummaryDoc>,
}

#[derive(Debug, Deserialize)]
struct SummaryDoc {
    material_id: String,
    #[serde(default)]
    formula_pretty: Option<String>,
    #[serde(default)]
    energy_above_hull: Option<f64>,
    #[serde(default)]
    structure: Option<StructureDoc>,
}

/// pymatgen `Structure.as_dict()` 的子集
#[derive(Debug, Deserialize)]
struct StructureDoc {
    lattice: LatticeDoc,
    sites: Vec<SiteDoc>,
}

#[derive(Debug, Deserialize)]
struct LatticeDoc {
    matrix: [[f64; 3]; 3],
}

#[derive(Debug, Deserialize)]
struct SiteDoc {
    species: Vec<SpeciesDoc>,
    abc: [f64; 3],
}

#[derive(Debug, Deserialize)]
struct SpeciesDoc {
    element: String,
    #[serde(default = "full_occupancy")]
    occu: f64,
}

fn full_occupancy() -> f64 {
    1.0
}

// ─────────────────────────────────────────────────────────────
// 客户端
// ─────────────────────────────────────────────────────────────

pub struct MaterialsProjectClient {
    config: MpConfig,
    http: Result<Client, String>,
}

impl MaterialsProjectClient {
    pub fn new(config: MpConfig) -> Self {
        let http = Client::builder()
            .user_agent(concat!("slabgen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| e.to_string());

        MaterialsProjectClient { config, http }
    }

    fn unavailable(reason: impl Into<String>) -> ResolutionError {
        ResolutionError::IntegrationUnavailable {
            source_name: SOURCE_NAME.to_string(),
            reason: reason.into(),
        }
    }

    fn transport_error(
        e: reqwest::Error,
        request: &LookupRequest,
        timeout: Duration,
    ) -> ResolutionError {
        if e.is_timeout() {
            ResolutionError::RetrievalTimeout {
                query: request.to_string(),
                seconds: timeout.as_secs(),
            }
        } else {
            Self::unavailable(format!("request failed: {}", e))
        }
    }
}

impl StructureSource for MaterialsProjectClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn probe(&self) -> Result<(), ResolutionError> {
        if let Err(e) = &self.http {
            return Err(Self::unavailable(format!("HTTP client error: {}", e)));
        }
        match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(Self::unavailable(
                "API key not found; set MP_API_KEY (or legacy MAPI_KEY) or pass --mp-api-key",
            )),
        }
    }

    fn lookup(
        &self,
        request: &LookupRequest,
        timeout: Duration,
    ) -> Result<BulkStructure, ResolutionError> {
        self.probe()?;
        let http = self.http.as_ref().map_err(|e| Self::unavailable(e.clone()))?;
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        let url = format!(
            "{}/materials/summary/",
            self.config.endpoint.trim_end_matches('/')
        );
        let filter = match request {
            LookupRequest::Formula(formula) => ("formula", formula.as_str()),
            LookupRequest::Id(id) => ("material_ids", id.as_str()),
        };
        tracing::info!(%url, %request, "querying Materials Project");

        let response = http
            .get(&url)
            .header("X-API-KEY", api_key)
            .query(&[filter, ("_fields", FIELDS)])
            .timeout(timeout)
            .send()
            .map_err(|e| Self::transport_error(e, request, timeout))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Self::unavailable(
                    "invalid or expired API key; obtain a new key from the Materials Project dashboard",
                ))
            }
            status if !status.is_success() => {
                return Err(Self::unavailable(format!("HTTP {}", status)))
            }
            _ => {}
        }

        let body: SummaryResponse = response
            .json()
            .map_err(|e| {
                if e.is_timeout() {
                    Self::transport_error(e, request, timeout)
                } else {
                    Self::unavailable(format!("malformed response: {}", e))
                }
            })?;

        select_bulk(body.data, request)
    }
}

/// 在带结构的条目中选取 `energy_above_hull` 最低者并转换为体相结构
fn select_bulk(
    docs: Vec<SummaryDoc>,
    request: &LookupRequest,
) -> Result<BulkStructure, ResolutionError> {
    let (doc, structure) = docs
        .into_iter()
        .filter_map(|mut doc| {
            let structure = doc.structure.take()?;
            Some((doc, structure))
        })
        .min_by(|(a, _), (b, _)| {
            let ea = a.energy_above_hull.unwrap_or(f64::INFINITY);
            let eb = b.energy_above_hull.unwrap_or(f64::INFINITY);
            ea.total_cmp(&eb)
        })
        .ok_or_else(|| ResolutionError::MaterialNotFound {
            query: request.to_string(),
        })?;

    tracing::debug!(
        material_id = %doc.material_id,
        e_above_hull = ?doc.energy_above_hull,
        sites = structure.sites.len(),
        "selected Materials Project entry"
    );

    let atoms = structure
        .sites
        .into_iter()
        .enumerate()
        .map(|(i, site)| {
            // 无序位点取占据率最高的元素
            site.species
                .into_iter()
                .max_by(|a, b| a.occu.total_cmp(&b.occu))
                .map(|majority| Atom::new(majority.element, site.abc))
                .ok_or_else(|| {
                    MaterialsProjectClient::unavailable(format!(
                        "malformed structure for {}: site {} has no species",
                        doc.material_id,
                        i + 1
                    ))
                })
        })
        .collect::<Result<Vec<Atom>, ResolutionError>>()?;

    let crystal = Crystal::new(
        doc.material_id.clone(),
        Lattice::from_vectors(structure.lattice.matrix),
        atoms,
    );
    let formula = crystal.reduced_formula();
    if let Some(pretty) = &doc.formula_pretty {
        tracing::debug!(formula_pretty = %pretty, reduced = %formula, "entry formula");
    }

    Ok(BulkStructure {
        material_id: Some(doc.material_id),
        formula,
        crystal,
    })
}
