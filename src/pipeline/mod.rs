//! # 流水线编排
//!
//! 单向状态机：`Idle → Fetching → Converting → Building → Saving → Done`，
//! 任一阶段失败即进入终止状态 `Failed(stage)`，后续阶段不再执行，也不做
//! 重试。每次调用对应一个独立的 `PipelineRun`。
//!
//! ## 保存
//! 两个输出文件先写入同目录下的临时文件，全部写成功后再重命名到目标路径；
//! 任一步失败都会删除本次运行产生的所有文件，不留下不完整的输出。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `sources/`, `models/`
//! - 子模块: naming, convert, builder, artifacts

pub mod artifacts;
pub mod builder;
pub mod convert;
pub mod naming;

pub use artifacts::{ArtifactWriter, FileWriter};
pub use builder::{SlabBuilder, SurfaceBuilder, Thickness};
pub use convert::{CartesianConverter, StructureConverter};
pub use naming::{name, ArtifactNames};

use crate::error::{PipelineError, RunFailure, Stage, StageError};
use crate::models::{ArtifactPaths, Lattice, ParsedQuery, SlabModel, SlabSpec};
use crate::sources::SourceResolver;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

// ─────────────────────────────────────────────────────────────
// 运行状态
// ─────────────────────────────────────────────────────────────

/// 流水线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Active(Stage),
    Done,
    Failed(Stage),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Active(stage) => write!(f, "{}", stage),
            RunState::Done => write!(f, "done"),
            RunState::Failed(stage) => write!(f, "failed while {}", stage),
        }
    }
}

/// 各阶段产出摘要
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Fetched {
        source: String,
        material_id: Option<String>,
        formula: String,
    },
    Converted {
        atoms: usize,
    },
    Built {
        atoms: usize,
        layers: u32,
    },
    Saved(ArtifactPaths),
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Fetched {
                source,
                material_id,
                formula,
            } => match material_id {
                Some(id) => write!(f, "fetched {} ({}) from {}", formula, id, source),
                None => write!(f, "fetched {} from {}", formula, source),
            },
            StageOutcome::Converted { atoms } => write!(f, "converted {} atoms", atoms),
            StageOutcome::Built { atoms, layers } => {
                write!(f, "built {} atoms in {} layers", atoms, layers)
            }
            StageOutcome::Saved(paths) => write!(
                f,
                "saved {} and {}",
                paths.cif.display(),
                paths.poscar.display()
            ),
        }
    }
}

/// 单次流水线运行，只向前推进
#[derive(Debug)]
pub struct PipelineRun {
    state: RunState,
    outcomes: Vec<StageOutcome>,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRun {
    pub fn new() -> Self {
        PipelineRun {
            state: RunState::Idle,
            outcomes: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, stage: Stage) {
        let expected = match stage {
            Stage::Fetching => RunState::Idle,
            Stage::Converting => RunState::Active(Stage::Fetching),
            Stage::Building => RunState::Active(Stage::Converting),
            Stage::Saving => RunState::Active(Stage::Building),
        };
        debug_assert_eq!(self.state, expected, "out-of-order transition to {}", stage);
        self.state = RunState::Active(stage);
        tracing::info!(%stage, "stage started");
    }

    fn complete(&mut self, outcome: StageOutcome) {
        self.outcomes.push(outcome);
    }

    fn fail(&mut self, cause: StageError) -> RunFailure {
        let stage = match self.state {
            RunState::Active(stage) => stage,
            // 只有活动阶段会失败
            other => unreachable!("failure outside an active stage: {}", other),
        };
        self.state = RunState::Failed(stage);
        tracing::warn!(%stage, error = %cause, "stage failed");
        RunFailure { stage, cause }
    }

    fn finish(&mut self) {
        debug_assert_eq!(self.state, RunState::Active(Stage::Saving));
        self.state = RunState::Done;
    }

    /// 在当前阶段执行一步，失败时转入 `Failed`
    fn step<T, E: Into<StageError>>(
        &mut self,
        stage: Stage,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, RunFailure> {
        self.enter(stage);
        f().map_err(|e| self.fail(e.into()))
    }
}

/// 成功运行的结果
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 实际使用的参数（`--thickness` 会改变层数）
    pub query: ParsedQuery,
    pub source: String,
    pub material_id: Option<String>,
    pub formula: String,
    pub atoms: usize,
    pub names: ArtifactNames,
    pub paths: ArtifactPaths,
    pub outcomes: Vec<StageOutcome>,
}

// ─────────────────────────────────────────────────────────────
// 编排器
// ─────────────────────────────────────────────────────────────

/// 流水线编排器，持有各阶段协作者的引用，可在线程间共享
pub struct Orchestrator<'a> {
    resolver: &'a SourceResolver,
    converter: &'a dyn StructureConverter,
    builder: &'a dyn SlabBuilder,
    writer: &'a dyn ArtifactWriter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        resolver: &'a SourceResolver,
        converter: &'a dyn StructureConverter,
        builder: &'a dyn SlabBuilder,
        writer: &'a dyn ArtifactWriter,
    ) -> Self {
        Orchestrator {
            resolver,
            converter,
            builder,
            writer,
        }
    }

    /// 执行 Fetch → Convert → Build → Save
    pub fn run(
        &self,
        query: &ParsedQuery,
        out_dir: &Path,
        thickness: Option<Thickness>,
    ) -> Result<RunReport, RunFailure> {
        let mut run = PipelineRun::new();
        let _span = tracing::info_span!("run", material = %query.material, miller = %query.miller)
            .entered();

        // Fetching
        let fetched = run.step(Stage::Fetching, || self.resolver.fetch(&query.material))?;
        run.complete(StageOutcome::Fetched {
            source: fetched.source.clone(),
            material_id: fetched.bulk.material_id.clone(),
            formula: fetched.bulk.formula.clone(),
        });

        // Converting
        let model = run.step(Stage::Converting, || self.converter.to_atom_model(&fetched.bulk))?;
        run.complete(StageOutcome::Converted { atoms: model.len() });

        // Building
        let (query, slab) = run.step(Stage::Building, || {
            let query = match thickness {
                Some(t) => query.with_layers(layers_for(&model.cell, query, t)?),
                None => query.clone(),
            };
            let spec = SlabSpec {
                miller: query.miller,
                layers: query.layers,
                vacuum: query.vacuum,
                supercell: query.supercell,
            };
            let slab = self.builder.build_surface(&model, &spec)?;
            Ok::<_, PipelineError>((query, slab))
        })?;
        run.complete(StageOutcome::Built {
            atoms: slab.crystal.atoms.len(),
            layers: query.layers,
        });

        // Saving
        let names = name(&query);
        let paths = run.step(Stage::Saving, || self.save(&slab, out_dir, &names))?;
        run.complete(StageOutcome::Saved(paths.clone()));
        run.finish();

        tracing::info!(cif = %paths.cif.display(), poscar = %paths.poscar.display(), "run finished");

        Ok(RunReport {
            source: fetched.source,
            material_id: fetched.bulk.material_id,
            formula: fetched.bulk.formula,
            atoms: slab.crystal.atoms.len(),
            query,
            names,
            paths,
            outcomes: run.outcomes,
        })
    }

    /// 原子地写出两个文件
    fn save(
        &self,
        slab: &SlabModel,
        out_dir: &Path,
        names: &ArtifactNames,
    ) -> Result<ArtifactPaths, PipelineError> {
        fs::create_dir_all(out_dir).map_err(|e| io_error(out_dir, e))?;
        let paths = ArtifactPaths {
            cif: out_dir.join(&names.cif),
            poscar: out_dir.join(&names.poscar),
        };

        let mut staging = Staging::default();
        let tmp_cif = staging.temp_for(&paths.cif);
        self.writer.write_cif(slab, &tmp_cif)?;
        let tmp_poscar = staging.temp_for(&paths.poscar);
        self.writer.write_poscar(slab, &tmp_poscar)?;

        staging.commit(&tmp_cif, &paths.cif)?;
        staging.commit(&tmp_poscar, &paths.poscar)?;
        staging.keep();

        Ok(paths)
    }
}

/// `--thickness` 换算层数
fn layers_for(
    cell: &Lattice,
    query: &ParsedQuery,
    thickness: Thickness,
) -> Result<u32, PipelineError> {
    let miller = builder::reduce_miller(query.miller);
    let d = cell.d_spacing(miller.as_array()).ok_or_else(|| {
        PipelineError::GeometryError(format!("cannot compute d-spacing for {}", miller))
    })?;
    let layers = thickness.layers(d);
    tracing::info!(%thickness, d_hkl = d, layers, "layer count from thickness");
    Ok(layers)
}

fn io_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::IoError {
        path: path.display().to_string(),
        source,
    }
}

// ─────────────────────────────────────────────────────────────
// 临时文件
// ─────────────────────────────────────────────────────────────

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 本次保存产生的文件；未调用 `keep` 时在 drop 中全部删除
#[derive(Default)]
struct Staging {
    files: Vec<PathBuf>,
    kept: bool,
}

impl Staging {
    fn temp_for(&mut self, target: &Path) -> PathBuf {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = target.with_file_name(format!(".{}.{}.{}.tmp", file_name, std::process::id(), n));
        self.files.push(tmp.clone());
        tmp
    }

    fn commit(&mut self, tmp: &Path, target: &Path) -> Result<(), PipelineError> {
        fs::rename(tmp, target).map_err(|e| io_error(target, e))?;
        self.files.retain(|f| f != tmp);
        self.files.push(target.to_path_buf());
        Ok(())
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        for file in &self.files {
            if fs::remove_file(file).is_ok() {
                tracing::debug!(path = %file.display(), "removed partial output");
            }
        }
    }
}
