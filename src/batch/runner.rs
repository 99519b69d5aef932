//! # 批量执行器
//!
//! 在 rayon 线程池上并行执行批量查询。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代，结果保持输入顺序
//! - 进度条显示
//! - 错误收集与汇总报告
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::Result;
use crate::utils::progress;

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 单条查询处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult<R> {
    /// 处理成功
    Success(R),
    /// 处理失败（错误信息）
    Failed(String),
}

/// 批量处理结果
#[derive(Debug)]
pub struct BatchResult<R> {
    /// 成功数量
    pub success: usize,
    /// 失败数量
    pub failed: usize,
    /// 按输入顺序排列的 (查询, 结果)
    pub items: Vec<(String, ProcessResult<R>)>,
}

impl<R> Default for BatchResult<R> {
    fn default() -> Self {
        BatchResult {
            success: 0,
            failed: 0,
            items: Vec::new(),
        }
    }
}

impl<R> BatchResult<R> {
    /// 合并处理结果
    pub fn merge(&mut self, item: String, result: ProcessResult<R>) {
        match result {
            ProcessResult::Success(_) => self.success += 1,
            ProcessResult::Failed(_) => self.failed += 1,
        }
        self.items.push((item, result));
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// 创建新的批量执行器，`jobs == 0` 时使用 CPU 核数
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理查询列表
    pub fn run<F, R>(&self, items: Vec<String>, processor: F) -> Result<BatchResult<R>>
    where
        F: Fn(&str) -> ProcessResult<R> + Sync + Send,
        R: Send,
    {
        let pb = progress::create_progress_bar(items.len() as u64, "Generating slabs");
        let failed_count = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()?;

        let results: Vec<ProcessResult<R>> = pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    let result = processor(item);
                    if let ProcessResult::Failed(_) = &result {
                        let failed = failed_count.fetch_add(1, Ordering::Relaxed) + 1;
                        pb.set_message(format!("Generating slabs ({} failed)", failed));
                    }
                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut batch_result = BatchResult::default();
        for (item, result) in items.into_iter().zip(results) {
            batch_result.merge(item, result);
        }

        Ok(batch_result)
    }
}
