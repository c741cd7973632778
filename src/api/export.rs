// ==========================================
// 工程材料检测数据系统 - 导出渲染协作方接口
// ==========================================
// 职责: 定义导出渲染的外部协作方 seam (Excel / PDF 渲染不在核心内)
// 红线: 核心只传递经校验的选择集, 渲染失败必须映射为 ExportFailed
// ==========================================

use crate::domain::field_test::FieldTestResult;
use crate::domain::types::ExportFormat;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing::info;

/// 导出请求: 经校验的非空记录集
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub records: Vec<FieldTestResult>,
    pub requested_by: String,
}

/// 导出产物描述 (渲染方返回)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub format: ExportFormat,
    pub record_count: usize,
}

/// 导出渲染协作方
///
/// 实现方负责实际的 Excel/PDF 生成与落盘。
#[async_trait]
pub trait ExportRenderer: Send + Sync {
    async fn render(
        &self,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, Box<dyn Error + Send + Sync>>;
}

// ==========================================
// LoggingExportRenderer - 仅记录日志的默认实现
// ==========================================
// 用途: 未接入真实渲染方时的占位实现, 也用于集成测试
pub struct LoggingExportRenderer;

#[async_trait]
impl ExportRenderer for LoggingExportRenderer {
    async fn render(
        &self,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, Box<dyn Error + Send + Sync>> {
        let ext = match request.format {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
        };
        let file_name = format!(
            "field-tests-{}.{}",
            chrono::Local::now().format("%Y%m%d-%H%M%S"),
            ext
        );
        info!(
            format = %request.format,
            record_count = request.records.len(),
            requested_by = %request.requested_by,
            file_name = %file_name,
            "导出渲染请求"
        );
        Ok(ExportArtifact {
            file_name,
            format: request.format,
            record_count: request.records.len(),
        })
    }
}
