//! # 结构数据源模块
//!
//! 按材料标识检索体相结构。`resolve` 根据标识的形态决定按化学式还是按 ID
//! 查询；`SourceResolver` 在多个数据源之间选择一个可用的集成。
//!
//! ## 集成选择
//! 数据源按优先级排列（Materials Project 在前，本地结构库在后）。首次检索时
//! 依次尝试，第一个给出查询级结果的数据源通过 `OnceLock` 提交，此后整个
//! 进程（或整个批处理）都使用它。并发的首次调用者可能各自尝试，但最终都
//! 收敛到同一个已提交的选择。
//!
//! 只有集成不可用（探测失败，或检索时认证 / 连接失败）才会切换到下一个
//! 数据源；检索失败（`MaterialNotFound`、`RetrievalTimeout`）原样返回，
//! 不做回退。
//!
//! ## 依赖关系
//! - 被 `pipeline/mod.rs`, `commands/` 使用
//! - 使用 `config.rs`, `models/`
//! - 子模块: materials_project, library

pub mod library;
pub mod materials_project;

use crate::config::Settings;
use crate::error::ResolutionError;
use crate::models::{BulkStructure, MaterialRef};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

pub use library::LocalLibrary;
pub use materials_project::MaterialsProjectClient;

/// 检索请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRequest {
    Formula(String),
    Id(String),
}

impl LookupRequest {
    /// 请求中的键（化学式或 ID）
    pub fn key(&self) -> &str {
        match self {
            LookupRequest::Formula(s) | LookupRequest::Id(s) => s,
        }
    }
}

impl fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupRequest::Formula(formula) => write!(f, "formula '{}'", formula),
            LookupRequest::Id(id) => write!(f, "material ID {}", id),
        }
    }
}

/// 由材料标识决定查询方式，纯分派，无 I/O
pub fn resolve(material: &MaterialRef) -> LookupRequest {
    match material {
        MaterialRef::Formula(formula) => LookupRequest::Formula(formula.clone()),
        MaterialRef::MpId(id) => LookupRequest::Id(id.clone()),
    }
}

/// 体相结构数据源
pub trait StructureSource: Send + Sync {
    /// 数据源名称（用于日志与报告）
    fn name(&self) -> &str;

    /// 检查集成是否可用（凭据、目录等），不做任何检索
    fn probe(&self) -> Result<(), ResolutionError>;

    /// 检索体相结构
    fn lookup(
        &self,
        request: &LookupRequest,
        timeout: Duration,
    ) -> Result<BulkStructure, ResolutionError>;
}

/// 检索结果及其来源
#[derive(Debug, Clone)]
pub struct Fetched {
    pub source: String,
    pub bulk: BulkStructure,
}

/// 数据源选择器
pub struct SourceResolver {
    sources: Vec<Box<dyn StructureSource>>,
    selected: OnceLock<usize>,
    timeout: Duration,
}

impl SourceResolver {
    pub fn new(sources: Vec<Box<dyn StructureSource>>, timeout: Duration) -> Self {
        SourceResolver {
            sources,
            selected: OnceLock::new(),
            timeout,
        }
    }

    /// 从配置构建：Materials Project（未禁用时）在前，本地结构库在后
    pub fn from_settings(settings: &Settings) -> Self {
        let mut sources: Vec<Box<dyn StructureSource>> = Vec::new();
        if settings.use_mp_api {
            sources.push(Box::new(MaterialsProjectClient::new(settings.mp_config())));
        }
        sources.push(Box::new(LocalLibrary::new(settings.library.clone())));
        SourceResolver::new(sources, settings.timeout)
    }

    /// 已提交的数据源名称；尚未提交时为 `None`
    pub fn selected(&self) -> Option<&str> {
        self.selected.get().map(|&index| self.sources[index].name())
    }

    /// 检索材料的体相结构
    ///
    /// 尚未提交时按优先级尝试各数据源：探测失败或检索时报告集成不可用
    /// （认证失败、连接失败、5xx）都切换到下一个；第一个给出查询级结果
    /// （成功、`MaterialNotFound`、`RetrievalTimeout`）的数据源被提交。
    pub fn fetch(&self, material: &MaterialRef) -> Result<Fetched, ResolutionError> {
        let request = resolve(material);
        if let Some(&index) = self.selected.get() {
            return self.lookup_with(index, &request);
        }

        let mut reasons = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            let attempt = source
                .probe()
                .and_then(|()| source.lookup(&request, self.timeout));
            let result = match attempt {
                Err(e @ ResolutionError::IntegrationUnavailable { .. }) => {
                    tracing::warn!(source = source.name(), error = %e, "structure source unavailable");
                    reasons.push(e.to_string());
                    continue;
                }
                other => other,
            };

            // 并发的首次调用者以先提交者为准
            let committed = *self.selected.get_or_init(|| index);
            tracing::info!(source = self.sources[committed].name(), "structure source selected");
            if committed != index {
                return self.lookup_with(committed, &request);
            }
            return result.map(|bulk| Fetched {
                source: source.name().to_string(),
                bulk,
            });
        }

        Err(ResolutionError::IntegrationUnavailable {
            source_name: self
                .sources
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", "),
            reason: if reasons.is_empty() {
                "no structure sources configured".to_string()
            } else {
                reasons.join("; ")
            },
        })
    }

    fn lookup_with(&self, index: usize, request: &LookupRequest) -> Result<Fetched, ResolutionError> {
        let source = self.sources[index].as_ref();
        tracing::debug!(source = source.name(), %request, "looking up structure");
        let bulk = source.lookup(request, self.timeout)?;
        Ok(Fetched {
            source: source.name().to_string(),
            bulk,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeSource, Shared};
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn resolver(sources: &[Arc<FakeSource>]) -> SourceResolver {
        SourceResolver::new(
            sources
                .iter()
                .map(|s| Box::new(Shared(s.clone())) as Box<dyn StructureSource>)
                .collect(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_resolve_dispatch() {
        assert_eq!(
            resolve(&MaterialRef::Formula("GaAs".to_string())),
            LookupRequest::Formula("GaAs".to_string())
        );
        assert_eq!(
            resolve(&MaterialRef::MpId("mp-149".to_string())),
            LookupRequest::Id("mp-149".to_string())
        );
    }

    #[test]
    fn test_primary_preferred() {
        let primary = Arc::new(FakeSource::new("primary", true));
        let secondary = Arc::new(FakeSource::new("secondary", true));
        let resolver = resolver(&[primary.clone(), secondary.clone()]);

        let fetched = resolver.fetch(&MaterialRef::Formula("Si".to_string())).unwrap();
        assert_eq!(fetched.source, "primary");
        assert_eq!(secondary.probes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fallback_once_and_cached() {
        let primary = Arc::new(FakeSource::new("primary", false));
        let secondary = Arc::new(FakeSource::new("secondary", true));
        let resolver = resolver(&[primary.clone(), secondary.clone()]);

        for _ in 0..3 {
            let fetched = resolver.fetch(&MaterialRef::MpId("mp-149".to_string())).unwrap();
            assert_eq!(fetched.source, "secondary");
        }
        assert_eq!(primary.probes.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.probes.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.lookups.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_not_found_is_not_subject_to_fallback() {
        let primary = Arc::new(FakeSource::new("primary", true));
        let secondary = Arc::new(FakeSource::new("secondary", true));
        let resolver = resolver(&[primary.clone(), secondary.clone()]);

        let err = resolver.fetch(&MaterialRef::Formula("Xx".to_string())).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::MaterialNotFound {
                query: "formula 'Xx'".to_string()
            }
        );
        assert_eq!(secondary.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_nothing_available() {
        let a = Arc::new(FakeSource::new("a", false));
        let b = Arc::new(FakeSource::new("b", false));
        let resolver = resolver(&[a, b]);
        let err = resolver.fetch(&MaterialRef::Formula("Si".to_string())).unwrap_err();
        match err {
            ResolutionError::IntegrationUnavailable { source_name, .. } => {
                assert_eq!(source_name, "a, b")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(resolver.selected(), None);
    }

    #[test]
    fn test_rejected_credentials_fall_back() {
        let primary = Arc::new(FakeSource::failing(
            "primary",
            ResolutionError::IntegrationUnavailable {
                source_name: "primary".to_string(),
                reason: "HTTP 401".to_string(),
            },
        ));
        let secondary = Arc::new(FakeSource::new("secondary", true));
        let resolver = resolver(&[primary.clone(), secondary.clone()]);

        for _ in 0..2 {
            let fetched = resolver.fetch(&MaterialRef::Formula("Si".to_string())).unwrap();
            assert_eq!(fetched.source, "secondary");
        }
        assert_eq!(resolver.selected(), Some("secondary"));
        assert_eq!(primary.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeout_commits_and_is_not_retried_elsewhere() {
        let primary = Arc::new(FakeSource::failing(
            "primary",
            ResolutionError::RetrievalTimeout {
                query: "formula 'Si'".to_string(),
                seconds: 1,
            },
        ));
        let secondary = Arc::new(FakeSource::new("secondary", true));
        let resolver = resolver(&[primary.clone(), secondary.clone()]);

        let err = resolver.fetch(&MaterialRef::Formula("Si".to_string())).unwrap_err();
        assert!(matches!(err, ResolutionError::RetrievalTimeout { seconds: 1, .. }));
        assert_eq!(resolver.selected(), Some("primary"));
        assert_eq!(secondary.probes.load(Ordering::SeqCst), 0);
        assert_eq!(secondary.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_first_use_converges() {
        let primary = Arc::new(FakeSource::new("primary", false));
        let secondary = Arc::new(FakeSource::new("secondary", true));
        let resolver = resolver(&[primary, secondary]);

        let names: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        resolver
                            .fetch(&MaterialRef::Formula("Si".to_string()))
                            .unwrap()
                            .source
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(names.iter().all(|n| n == "secondary"));
        assert_eq!(resolver.selected(), Some("secondary"));
    }
}
