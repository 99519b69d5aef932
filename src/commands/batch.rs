//! # 批量查询
//!
//! 从文件读取查询（每行一条，`#` 开始注释），在线程池上并行执行，
//! 所有查询共享同一个数据源选择器。结束后显示汇总表，并在输出目录写出
//! `manifest.csv`。任一查询失败时返回错误（退出码 1）。
//!
//! ## 依赖关系
//! - 被 `commands/mod.rs` 调用
//! - 使用 `batch/runner.rs`, `pipeline/`, `query/`
//! - 使用 `tabled`, `csv`

use crate::batch::{BatchResult, BatchRunner, ProcessResult};
use crate::cli::Cli;
use crate::config::Settings;
use crate::error::{Result, SlabgenError};
use crate::pipeline::{
    self, CartesianConverter, FileWriter, Orchestrator, RunReport, SurfaceBuilder, Thickness,
};
use crate::query::parse_query;
use crate::sources::SourceResolver;
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// 清单文件名
pub const MANIFEST_NAME: &str = "manifest.csv";

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Query")]
    query: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Output / Error")]
    detail: String,
}

/// 读取查询文件，跳过空行与注释
pub fn read_queries(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| SlabgenError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// 执行批量查询
pub fn execute(cli: &Cli, file: &Path, settings: &Settings) -> Result<()> {
    let queries = read_queries(file)?;
    if queries.is_empty() {
        return Err(SlabgenError::InvalidArgument(format!(
            "no queries found in '{}'",
            file.display()
        )));
    }

    output::print_header(&format!("Batch: {} queries", queries.len()));

    if cli.dry_run {
        return dry_run(&queries);
    }

    let resolver = SourceResolver::from_settings(settings);
    let orchestrator = Orchestrator::new(&resolver, &CartesianConverter, &SurfaceBuilder, &FileWriter);
    let runner = BatchRunner::new(cli.jobs);
    output::print_info(&format!("Running with {} parallel jobs", runner.jobs()));

    let result = runner.run(queries, |text| {
        match process(&orchestrator, text, &cli.output_dir, cli.thickness) {
            Ok(report) => ProcessResult::Success(report),
            Err(e) => {
                tracing::warn!(query = text, error = %e, "query failed");
                ProcessResult::Failed(e.to_string())
            }
        }
    })?;

    print_summary(&result);
    let manifest = write_manifest(&cli.output_dir, &result)?;
    output::print_success(&format!("Manifest saved to '{}'", manifest.display()));

    if result.failed > 0 {
        return Err(SlabgenError::BatchFailed {
            failed: result.failed,
            total: result.total(),
        });
    }

    output::print_done(&format!("{} slabs generated", result.success));
    Ok(())
}

fn process(
    orchestrator: &Orchestrator<'_>,
    text: &str,
    out_dir: &Path,
    thickness: Option<Thickness>,
) -> Result<RunReport> {
    let query = parse_query(text)?;
    Ok(orchestrator.run(&query, out_dir, thickness)?)
}

fn dry_run(queries: &[String]) -> Result<()> {
    let rows: Vec<SummaryRow> = queries
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let (status, detail) = match parse_query(text) {
                Ok(query) => ("parsed", pipeline::name(&query).stem),
                Err(e) => ("invalid", e.to_string()),
            };
            SummaryRow {
                index: i + 1,
                query: text.clone(),
                status,
                detail,
            }
        })
        .collect();

    let invalid = rows.iter().filter(|r| r.status == "invalid").count();
    println!("{}", Table::new(&rows));

    if invalid > 0 {
        return Err(SlabgenError::BatchFailed {
            failed: invalid,
            total: rows.len(),
        });
    }
    Ok(())
}

fn print_summary(result: &BatchResult<RunReport>) {
    let rows: Vec<SummaryRow> = result
        .items
        .iter()
        .enumerate()
        .map(|(i, (text, outcome))| {
            let (status, detail) = match outcome {
                ProcessResult::Success(report) => ("ok", report.names.stem.clone()),
                ProcessResult::Failed(err) => ("failed", err.clone()),
            };
            SummaryRow {
                index: i + 1,
                query: text.clone(),
                status,
                detail,
            }
        })
        .collect();

    output::print_separator();
    println!("{}", Table::new(&rows));
    if result.failed > 0 {
        output::print_warning(&format!(
            "{} of {} queries failed",
            result.failed,
            result.total()
        ));
    }
}

/// 写出 `manifest.csv`
fn write_manifest(out_dir: &Path, result: &BatchResult<RunReport>) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).map_err(|e| SlabgenError::FileWriteError {
        path: out_dir.display().to_string(),
        source: e,
    })?;
    let path = out_dir.join(MANIFEST_NAME);

    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record([
        "query",
        "status",
        "source",
        "material_id",
        "formula",
        "atoms",
        "cif",
        "poscar",
        "error",
    ])?;

    for (text, outcome) in &result.items {
        match outcome {
            ProcessResult::Success(report) => wtr.write_record([
                text.clone(),
                "ok".to_string(),
                report.source.clone(),
                report.material_id.clone().unwrap_or_default(),
                report.formula.clone(),
                report.atoms.to_string(),
                report.paths.cif.display().to_string(),
                report.paths.poscar.display().to_string(),
                String::new(),
            ])?,
            ProcessResult::Failed(err) => {
                let mut record = vec![String::new(); 9];
                record[0] = text.clone();
                record[1] = "failed".to_string();
                record[8] = err.clone();
                wtr.write_record(&record)?
            }
        }
    }

    wtr.flush().map_err(|e| SlabgenError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(path)
}
