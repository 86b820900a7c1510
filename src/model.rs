// src/model.rs
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::LoadError;

/// ルートの data フィールド (任意の JSON オブジェクト)
pub type RouteData = serde_json::Map<String, serde_json::Value>;

/// ローダーが返す Future
pub type ComponentFuture = BoxFuture<'static, Result<ComponentType, LoadError>>;

/// 引数なしで呼び出し、コンポーネント型を解決する Future を返す遅延ローダー
///
/// 呼び出すたびに新しいロードが始まる (メモ化はしない)
pub type Loader = Arc<dyn Fn() -> ComponentFuture + Send + Sync>;

/// ルートに割り当てるコンポーネントクラスへの参照
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentType {
    /// クラス名 (例: "HomeComponent")
    pub name: String,

    /// このクラスを宣言しているソースファイル (分かっている場合のみ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

impl ComponentType {
    pub fn new(name: impl Into<String>) -> Self {
        ComponentType {
            name: name.into(),
            source_file: None,
        }
    }

    pub fn with_source(name: impl Into<String>, source_file: impl Into<PathBuf>) -> Self {
        ComponentType {
            name: name.into(),
            source_file: Some(source_file.into()),
        }
    }

    /// 具体的なクラス参照として扱えるかどうか
    pub fn is_type(&self) -> bool {
        !self.name.is_empty()
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// コンポーネントを直接バインドする通常のルート
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path: String,
    pub component: Option<ComponentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RouteData>,
    pub use_as_default: bool,
}

/// ローダー経由でコンポーネントを遅延ロードするルート
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncRoute {
    pub path: String,
    #[serde(skip)]
    pub loader: Loader,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RouteData>,
    pub use_as_default: bool,
}

impl fmt::Debug for AsyncRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRoute")
            .field("path", &self.path)
            .field("loader", &"<loader>")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("use_as_default", &self.use_as_default)
            .finish()
    }
}

/// 名前付きセカンダリアウトレット向けのルート
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxRoute {
    pub path: String,
    pub component: Option<ComponentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 別パスへのリダイレクト
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub path: String,
    pub redirect_to: String,
}

/// 正規化済みのルート定義
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RouteDefinition {
    Route(Route),
    AsyncRoute(AsyncRoute),
    AuxRoute(AuxRoute),
    Redirect(Redirect),
}

impl RouteDefinition {
    pub fn path(&self) -> &str {
        match self {
            RouteDefinition::Route(r) => &r.path,
            RouteDefinition::AsyncRoute(r) => &r.path,
            RouteDefinition::AuxRoute(r) => &r.path,
            RouteDefinition::Redirect(r) => &r.path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RouteDefinition::Route(_) => "Route",
            RouteDefinition::AsyncRoute(_) => "AsyncRoute",
            RouteDefinition::AuxRoute(_) => "AuxRoute",
            RouteDefinition::Redirect(_) => "Redirect",
        }
    }
}

/// `{ type: "constructor" | "loader", ... }` 形式のコンポーネント定義オブジェクト
///
/// 未知の type をそのままエラーメッセージに載せるため `kind` は文字列のまま保持する
#[derive(Clone, Default)]
pub struct ComponentDefinition {
    pub kind: String,
    pub constructor: Option<ComponentType>,
    pub loader: Option<Loader>,
}

impl ComponentDefinition {
    pub fn constructor(component: ComponentType) -> Self {
        ComponentDefinition {
            kind: "constructor".to_string(),
            constructor: Some(component),
            loader: None,
        }
    }

    pub fn loader(loader: Loader) -> Self {
        ComponentDefinition {
            kind: "loader".to_string(),
            constructor: None,
            loader: Some(loader),
        }
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("kind", &self.kind)
            .field("constructor", &self.constructor)
            .field("loader", &self.loader.as_ref().map(|_| "<loader>"))
            .finish()
    }
}

/// 生の設定における component の値
#[derive(Debug, Clone)]
pub enum RawComponent {
    /// クラスへの直接参照 (`undefined` などは None)
    Type(Option<ComponentType>),
    /// コンポーネント定義オブジェクト
    Definition(ComponentDefinition),
}

impl RawComponent {
    /// 値として「真」と評価されるか (定義オブジェクトは常に真)
    pub fn is_present(&self) -> bool {
        match self {
            RawComponent::Type(component) => component.is_some(),
            RawComponent::Definition(_) => true,
        }
    }
}

/// アプリ開発者が記述したままの、検証前のルート設定
#[derive(Clone, Default)]
pub struct RawRouteConfig {
    pub path: Option<String>,
    pub component: Option<RawComponent>,
    pub loader: Option<Loader>,
    pub redirect_to: Option<String>,
    pub aux: Option<String>,
    pub as_: Option<String>,
    pub name: Option<String>,
    pub data: Option<RouteData>,
    pub use_as_default: Option<bool>,
}

impl fmt::Debug for RawRouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRouteConfig")
            .field("path", &self.path)
            .field("component", &self.component)
            .field("loader", &self.loader.as_ref().map(|_| "<loader>"))
            .field("redirect_to", &self.redirect_to)
            .field("aux", &self.aux)
            .field("as_", &self.as_)
            .field("name", &self.name)
            .field("data", &self.data)
            .field("use_as_default", &self.use_as_default)
            .finish()
    }
}

/// 正規化の入力: 生の設定、または既に正規化済みの定義
#[derive(Debug, Clone)]
pub enum RouteConfig {
    Raw(RawRouteConfig),
    Definition(RouteDefinition),
}

impl From<RawRouteConfig> for RouteConfig {
    fn from(raw: RawRouteConfig) -> Self {
        RouteConfig::Raw(raw)
    }
}

impl From<RouteDefinition> for RouteConfig {
    fn from(definition: RouteDefinition) -> Self {
        RouteConfig::Definition(definition)
    }
}

/// 任意の非同期クロージャを Loader に変換するヘルパー
pub fn loader_fn<F, Fut>(f: F) -> Loader
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ComponentType, LoadError>> + Send + 'static,
{
    Arc::new(move || -> ComponentFuture { Box::pin(f()) })
}
