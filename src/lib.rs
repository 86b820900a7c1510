// src/lib.rs
//! 開発者が書いたルート設定を Route / AsyncRoute / AuxRoute / Redirect に正規化するライブラリと、
//! TypeScript プロジェクトの @RouteConfig を検証する CLI の実装。

pub mod analyzer;
pub mod error;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod registry;
pub mod resolver;

pub use error::{ConfigError, LoadError, ParseError};
pub use model::{
    loader_fn, AsyncRoute, AuxRoute, ComponentDefinition, ComponentFuture, ComponentType, Loader,
    RawComponent, RawRouteConfig, Redirect, Route, RouteConfig, RouteData, RouteDefinition,
};
pub use normalizer::{assert_component_exists, normalize_route_config};
pub use registry::{RecordingRegistry, RouteRegistry};
