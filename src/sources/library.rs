//! # 本地结构库
//!
//! 从本地目录读取 POSCAR 文件作为体相结构。文件按检索键命名：
//! `<key>.vasp`、`<key>.poscar` 或 `POSCAR_<key>`，键为化学式（如 `Si`）
//! 或材料 ID（如 `mp-149`）。
//!
//! ## 依赖关系
//! - 被 `sources/mod.rs` 使用
//! - 使用 `parsers/poscar.rs`

use super::{LookupRequest, StructureSource};
use crate::error::ResolutionError;
use crate::models::BulkStructure;
use crate::parsers::parse_poscar_file;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SOURCE_NAME: &str = "local-library";

pub struct LocalLibrary {
    root: Option<PathBuf>,
}

impl LocalLibrary {
    pub fn new(root: Option<PathBuf>) -> Self {
        LocalLibrary { root }
    }

    fn unavailable(reason: impl Into<String>) -> ResolutionError {
        ResolutionError::IntegrationUnavailable {
            source_name: SOURCE_NAME.to_string(),
            reason: reason.into(),
        }
    }

    /// 按命名约定查找结构文件
    fn find(root: &Path, key: &str) -> Option<PathBuf> {
        [
            format!("{}.vasp", key),
            format!("{}.poscar", key),
            format!("POSCAR_{}", key),
        ]
        .into_iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
    }
}

impl StructureSource for LocalLibrary {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn probe(&self) -> Result<(), ResolutionError> {
        match &self.root {
            None => Err(Self::unavailable(
                "no library directory; set SLABGEN_LIBRARY or pass --library",
            )),
            Some(root) if !root.is_dir() => Err(Self::unavailable(format!(
                "library directory not found: {}",
                root.display()
            ))),
            Some(_) => Ok(()),
        }
    }

    /// 本地读取不会阻塞，`timeout` 不生效
    fn lookup(
        &self,
        request: &LookupRequest,
        _timeout: Duration,
    ) -> Result<BulkStructure, ResolutionError> {
        self.probe()?;
        let root = self.root.as_deref().ok_or_else(|| Self::unavailable("no library directory"))?;

        let path = Self::find(root, request.key()).ok_or_else(|| {
            ResolutionError::MaterialNotFound {
                query: request.to_string(),
            }
        })?;
        tracing::debug!(path = %path.display(), %request, "reading library structure");

        let crystal = parse_poscar_file(&path)
            .map_err(|e| Self::unavailable(format!("{}: {}", path.display(), e)))?;
        if crystal.atoms.is_empty() {
            return Err(ResolutionError::MaterialNotFound {
                query: request.to_string(),
            });
        }

        let material_id = match request {
            LookupRequest::Id(id) => Some(id.clone()),
            LookupRequest::Formula(_) => None,
        };
        Ok(BulkStructure {
            material_id,
            formula: crystal.reduced_formula(),
            crystal,
        })
    }
}
