// ==========================================
// 工程材料检测数据系统 - 会话身份
// ==========================================
// 职责: 提供当前操作人身份, 供 API 层做权限与留痕
// 说明: 核心不做登录认证, 身份由宿主 (桌面壳/CLI) 注入
// ==========================================

use crate::domain::types::{Actor, Role};

/// 当前操作人提供方
///
/// 宿主应用实现该 trait, 将登录态映射为 Actor。
pub trait ActorProvider: Send + Sync {
    fn current_actor(&self) -> Actor;
}

/// 固定身份提供方
///
/// 用于 CLI 启动摘要与测试场景。
pub struct FixedActorProvider {
    actor: Actor,
}

impl FixedActorProvider {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    /// 本机系统身份 (管理员权限)
    pub fn system() -> Self {
        Self {
            actor: Actor {
                actor_id: "system".to_string(),
                display_name: "系统".to_string(),
                role: Role::Admin,
            },
        }
    }
}

impl ActorProvider for FixedActorProvider {
    fn current_actor(&self) -> Actor {
        self.actor.clone()
    }
}
