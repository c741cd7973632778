// ==========================================
// 工程材料检测数据系统 - 审核工作流引擎
// ==========================================
// 依据: QA_Review_Workflow.md - 审核状态机
// 状态机: PENDING <-> APPROVED, PENDING <-> REJECTED;
//         APPROVED 与 REJECTED 之间不得直接转换
// 红线: 仅 MANAGER/ADMIN 可裁定; APPROVED 记录字段锁定
// ==========================================

use crate::domain::types::{Actor, ReviewStatus};
use crate::engine::error::{EngineError, EngineResult};
use std::collections::BTreeSet;

pub struct ReviewWorkflow;

impl ReviewWorkflow {
    /// 审核权限校验
    pub fn authorize(actor: &Actor) -> EngineResult<()> {
        if actor.can_review() {
            Ok(())
        } else {
            Err(EngineError::Forbidden {
                actor: format!("{} ({})", actor.display_name, actor.role),
            })
        }
    }

    /// 状态转换校验
    ///
    /// 允许: PENDING -> APPROVED / REJECTED; APPROVED / REJECTED -> PENDING (解锁/重审)。
    /// 禁止: APPROVED <-> REJECTED 直接转换, 以及原地转换。
    pub fn validate_transition(from: ReviewStatus, to: ReviewStatus) -> EngineResult<()> {
        use ReviewStatus::*;
        match (from, to) {
            (Pending, Approved) | (Pending, Rejected) | (Approved, Pending) | (Rejected, Pending) => {
                Ok(())
            }
            _ => Err(EngineError::InvalidTransition { from, to }),
        }
    }

    /// 编辑守卫: APPROVED 记录禁止修改业务字段
    pub fn guard_editable(record_id: &str, status: ReviewStatus) -> EngineResult<()> {
        if status == ReviewStatus::Approved {
            Err(EngineError::LockedRecord {
                record_id: record_id.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

// ==========================================
// 审核选择集 (批量操作 / 导出)
// ==========================================
/// 审核界面的记录选择集
///
/// BTreeSet 保证导出顺序稳定可复现。
#[derive(Debug, Clone, Default)]
pub struct ReviewSelection {
    selected: BTreeSet<String>,
}

impl ReviewSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单条记录选中/取消切换
    pub fn toggle(&mut self, record_id: &str) {
        if !self.selected.remove(record_id) {
            self.selected.insert(record_id.to_string());
        }
    }

    /// 全选切换: 选择集恰为可见集时整体清空, 否则以可见集整体替换
    ///
    /// 替换语义保证被筛选隐藏的记录不会滞留在选择集中被导出。
    pub fn toggle_all(&mut self, visible_ids: &[String]) {
        let exactly_visible = !visible_ids.is_empty()
            && self.selected.len() == visible_ids.len()
            && visible_ids.iter().all(|id| self.selected.contains(id));
        if exactly_visible {
            self.selected.clear();
        } else {
            self.selected = visible_ids.iter().cloned().collect();
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, record_id: &str) -> bool {
        self.selected.contains(record_id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// 导出资格校验: 空选择集直接拒绝
    pub fn export_eligible(&self) -> EngineResult<Vec<String>> {
        if self.selected.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        Ok(self.selected.iter().cloned().collect())
    }
}
