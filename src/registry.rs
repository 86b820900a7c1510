// src/registry.rs
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::model::ComponentType;

/// ルートツリー全体を管理するレジストリ
///
/// 正規化処理が使うのは、遅延ロードされたコンポーネントのネストした
/// ルート設定を登録する `config_from_component` のみ
pub trait RouteRegistry: Send + Sync {
    fn config_from_component(&self, component: &ComponentType);
}

#[derive(Debug, Default)]
struct RecordingState {
    pending: VecDeque<ComponentType>,
    loaded: Vec<ComponentType>,
}

/// `config_from_component` で通知されたコンポーネントを順番に記録するレジストリ
///
/// アナライザーは `take_pending` でキューを取り出し、ロードされた
/// コンポーネントの @RouteConfig を改めて解析する
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    state: Mutex<RecordingState>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        // 記録処理は panic しないので、poison されていても中身はそのまま使える
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// まだ処理していないコンポーネントを通知順に取り出す
    pub fn take_pending(&self) -> Vec<ComponentType> {
        self.lock().pending.drain(..).collect()
    }

    /// これまでに通知されたすべてのコンポーネント (重複あり)
    pub fn loaded(&self) -> Vec<ComponentType> {
        self.lock().loaded.clone()
    }
}

impl RouteRegistry for RecordingRegistry {
    fn config_from_component(&self, component: &ComponentType) {
        tracing::debug!(component = %component, "コンポーネントのルート設定を登録");
        let mut state = self.lock();
        state.pending.push_back(component.clone());
        state.loaded.push(component.clone());
    }
}
