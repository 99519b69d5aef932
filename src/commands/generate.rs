//! # 单条查询
//!
//! 解析查询，显示参数表，然后执行一次 Fetch → Convert → Build → Save。
//! `--dry-run` 时只显示参数与将要写出的文件名。
//!
//! ## 依赖关系
//! - 被 `commands/mod.rs` 调用
//! - 使用 `query/`, `pipeline/`, `sources/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::Cli;
use crate::config::Settings;
use crate::error::Result;
use crate::models::ParsedQuery;
use crate::pipeline::{
    self, CartesianConverter, FileWriter, Orchestrator, RunReport, SurfaceBuilder, Thickness,
};
use crate::query::parse_query;
use crate::sources::SourceResolver;
use crate::utils::{output, progress};

use tabled::{Table, Tabled};

#[derive(Tabled)]
pub(crate) struct ParamRow {
    #[tabled(rename = "Parameter")]
    pub name: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// 参数表的行
pub(crate) fn parameter_rows(query: &ParsedQuery, thickness: Option<Thickness>) -> Vec<ParamRow> {
    let layers = match thickness {
        Some(t) => format!("from thickness {}", t),
        None => query.layers.to_string(),
    };
    vec![
        ParamRow {
            name: "Material",
            value: query.material.to_string(),
        },
        ParamRow {
            name: "Miller index",
            value: query.miller.to_string(),
        },
        ParamRow {
            name: "Layers",
            value: layers,
        },
        ParamRow {
            name: "Vacuum (Å)",
            value: query.vacuum.to_string(),
        },
        ParamRow {
            name: "Supercell",
            value: query.supercell.to_string(),
        },
    ]
}

/// 执行单条查询
pub fn execute(cli: &Cli, text: &str, settings: &Settings) -> Result<()> {
    let query = parse_query(text)?;

    output::print_header("Slab Parameters");
    println!("{}", Table::new(parameter_rows(&query, cli.thickness)));

    if cli.dry_run {
        let names = pipeline::name(&query);
        if cli.thickness.is_some() {
            output::print_info("Layer count depends on d_hkl; names below use the parsed count");
        }
        output::print_info(&format!(
            "Dry run, would write to '{}': {}, {}",
            cli.output_dir.display(),
            names.cif,
            names.poscar
        ));
        return Ok(());
    }

    let resolver = SourceResolver::from_settings(settings);
    let orchestrator = Orchestrator::new(&resolver, &CartesianConverter, &SurfaceBuilder, &FileWriter);

    let pb = progress::create_spinner(&format!(
        "Building {} {} slab...",
        query.material, query.miller
    ));
    let result = orchestrator.run(&query, &cli.output_dir, cli.thickness);
    pb.finish_and_clear();
    let report = result?;

    for outcome in &report.outcomes {
        tracing::info!("{}", outcome);
    }
    output::print_artifact("CIF", &report.paths.cif);
    output::print_artifact("POSCAR", &report.paths.poscar);
    output::print_done(&summary(&report));
    Ok(())
}

/// 一行运行摘要
pub(crate) fn summary(report: &RunReport) -> String {
    let material = match &report.material_id {
        Some(id) => format!("{} ({})", report.formula, id),
        None => report.formula.clone(),
    };
    format!(
        "{} {} slab from {}: {} atoms, {} layers, {} Å vacuum, {} supercell",
        material,
        report.query.miller,
        report.source,
        report.atoms,
        report.query.layers,
        report.query.vacuum,
        report.query.supercell
    )
}
