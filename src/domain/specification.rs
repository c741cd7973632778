// ==========================================
// 工程材料检测数据系统 - 检测规格实体
// ==========================================
// 依据: 项目管理模块 - 按(项目, 材料大类, 部位)维护验收标准
// 红线: 规格一旦被已保存的检测记录引用即不可变, 修改产生新修订
// ==========================================

use crate::domain::types::MaterialFamily;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单个项目同一材料大类下允许的最大部位数
pub const MAX_LOCATIONS_PER_PROJECT_FAMILY: usize = 50;

/// 检测规格 (验收标准)
///
/// 按 (project_id, material_family, location_name) 精确匹配解析。
/// 字段按材料大类取用:
/// - SOIL: max_dry_density / optimum_moisture / min_compaction / 含水率带宽
/// - ASPHALT: target_density / min_compaction..max_compaction (双侧带)
/// - CONCRETE/GROUT: min_psi (信息性; 合格线为强度百分比 >= 100)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specification {
    pub spec_id: String,
    pub project_id: String,
    pub material_family: MaterialFamily,
    pub location_name: String,

    /// 修订号, 从 1 递增; 同一部位仅一条 active 修订
    pub revision: i32,
    pub active: bool,

    // ===== 基准值 (Proctor / 配合比) =====
    /// 最大干密度 (pcf, SOIL)
    pub max_dry_density: Option<f64>,
    /// 最优含水率 (%, SOIL)
    pub optimum_moisture: Option<f64>,
    /// 目标密度 (pcf, ASPHALT)
    pub target_density: Option<f64>,

    // ===== 合格界限 =====
    /// 最低压实度 (%)
    pub min_compaction: Option<f64>,
    /// 最高压实度 (%, 仅 ASPHALT 双侧带使用)
    pub max_compaction: Option<f64>,
    /// 含水率带宽下偏移 (%, 相对最优含水率, 如 -2.0)
    pub min_moisture_delta: Option<f64>,
    /// 含水率带宽上偏移 (%, 相对最优含水率, 如 +2.0)
    pub max_moisture_delta: Option<f64>,
    /// 最低设计强度 (psi, CONCRETE/GROUT)
    pub min_psi: Option<f64>,

    pub created_at: String,
    pub created_by: String,
}

impl Specification {
    /// 创建新规格 (自动生成 UUID, 修订号 1)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: String,
        material_family: MaterialFamily,
        location_name: String,
        created_by: String,
    ) -> Self {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            spec_id: Uuid::new_v4().to_string(),
            project_id,
            material_family,
            location_name,
            revision: 1,
            active: true,
            max_dry_density: None,
            optimum_moisture: None,
            target_density: None,
            min_compaction: None,
            max_compaction: None,
            min_moisture_delta: None,
            max_moisture_delta: None,
            min_psi: None,
            created_at: now,
            created_by,
        }
    }

    /// 是否配置了部位级含水率带宽 (上下偏移均存在)
    pub fn has_moisture_band(&self) -> bool {
        self.min_moisture_delta.is_some() && self.max_moisture_delta.is_some()
    }
}
