// src/normalizer.rs
use futures::FutureExt;
use std::sync::Arc;

use crate::error::{ConfigError, LoadError};
use crate::model::{
    AsyncRoute, AuxRoute, ComponentFuture, ComponentType, Loader, RawComponent, RawRouteConfig,
    Redirect, Route, RouteConfig, RouteDefinition,
};
use crate::registry::RouteRegistry;

/// 空文字は「未指定」とみなす
fn present(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|s| !s.is_empty())
}

/// 生のルート設定 (または正規化済みの定義) を受け取り、
/// Route / AsyncRoute / AuxRoute / Redirect のいずれかを返す。
///
/// トップレベルの `loader` はラップされ、解決したコンポーネントのルート設定が
/// `registry` に登録されるようになる。
pub fn normalize_route_config(
    config: impl Into<RouteConfig>,
    registry: &Arc<dyn RouteRegistry>,
) -> Result<RouteDefinition, ConfigError> {
    let raw = match config.into() {
        // 1) 正規化済みの定義はそのまま返す (AsyncRoute だけはローダーを再ラップ)
        RouteConfig::Definition(RouteDefinition::AsyncRoute(route)) => {
            return Ok(RouteDefinition::AsyncRoute(AsyncRoute {
                loader: wrap_loader_to_reconfigure_registry(route.loader, registry.clone()),
                ..route
            }));
        }
        RouteConfig::Definition(definition) => return Ok(definition),
        RouteConfig::Raw(raw) => raw,
    };

    let definition = normalize_raw(raw, registry)?;
    tracing::debug!(kind = definition.kind(), path = definition.path(), "ルート設定を正規化");
    Ok(definition)
}

fn normalize_raw(
    raw: RawRouteConfig,
    registry: &Arc<dyn RouteRegistry>,
) -> Result<RouteDefinition, ConfigError> {
    // 2) component / redirectTo / loader はちょうど一つ
    let has_component = raw.component.as_ref().is_some_and(RawComponent::is_present);
    let has_redirect = present(&raw.redirect_to).is_some();
    let has_loader = raw.loader.is_some();
    if usize::from(has_component) + usize::from(has_redirect) + usize::from(has_loader) != 1 {
        return Err(ConfigError::ExclusivityViolation);
    }

    // 3) as と name は排他。as は name として扱う
    let name = match (present(&raw.as_), present(&raw.name)) {
        (Some(_), Some(_)) => return Err(ConfigError::AliasConflict),
        (Some(alias), None) => Some(alias.clone()),
        (None, Some(name)) => Some(name.clone()),
        (None, None) => None,
    };

    let RawRouteConfig {
        path,
        component,
        loader,
        redirect_to,
        aux,
        data,
        use_as_default,
        ..
    } = raw;
    let path = path.unwrap_or_default();
    let use_as_default = use_as_default.unwrap_or(false);

    // 4) loader
    if let Some(loader) = loader {
        return Ok(RouteDefinition::AsyncRoute(AsyncRoute {
            path,
            loader: wrap_loader_to_reconfigure_registry(loader, registry.clone()),
            name,
            data,
            use_as_default,
        }));
    }

    // 5) aux (非同期ロードと data はサポートしない)
    if let Some(aux) = aux.filter(|a| !a.is_empty()) {
        let component = match component {
            Some(RawComponent::Type(component)) => component,
            Some(RawComponent::Definition(definition)) => definition.constructor,
            None => None,
        };
        return Ok(RouteDefinition::AuxRoute(AuxRoute {
            path: aux,
            component,
            name,
        }));
    }

    // 6) component
    if let Some(component) = component.filter(RawComponent::is_present) {
        return match component {
            RawComponent::Definition(definition) => match definition.kind.as_str() {
                "constructor" => Ok(RouteDefinition::Route(Route {
                    path,
                    component: definition.constructor,
                    name,
                    data,
                    use_as_default,
                })),
                // ネストしたローダーはラップしない。無ければ呼び出した時点で失敗するローダー
                "loader" => {
                    let loader = definition.loader.unwrap_or_else(|| missing_loader(&path));
                    Ok(RouteDefinition::AsyncRoute(AsyncRoute {
                        path,
                        loader,
                        name,
                        data,
                        use_as_default,
                    }))
                }
                other => Err(ConfigError::InvalidComponentType(other.to_string())),
            },
            RawComponent::Type(component) => Ok(RouteDefinition::Route(Route {
                path,
                component,
                name,
                data,
                use_as_default,
            })),
        };
    }

    // 7) redirectTo
    if let Some(redirect_to) = redirect_to.filter(|r| !r.is_empty()) {
        return Ok(RouteDefinition::Redirect(Redirect { path, redirect_to }));
    }

    // 2) の検査を通過していればここには来ない
    Err(ConfigError::ExclusivityViolation)
}

fn missing_loader(path: &str) -> Loader {
    let message = format!("component definition for route \"{}\" has no loader", path);
    Arc::new(move || -> ComponentFuture {
        futures::future::ready(Err(LoadError::Rejected(message.clone()))).boxed()
    })
}

/// ローダーをラップし、解決したコンポーネント型を `registry` に登録してから返すようにする
///
/// ローダーが失敗した場合はそのままエラーを返し、レジストリには触れない
pub(crate) fn wrap_loader_to_reconfigure_registry(
    loader: Loader,
    registry: Arc<dyn RouteRegistry>,
) -> Loader {
    Arc::new(move || -> ComponentFuture {
        let registry = registry.clone();
        loader()
            .map(move |result| {
                let component_type = result?;
                registry.config_from_component(&component_type);
                Ok(component_type)
            })
            .boxed()
    })
}

/// コンポーネントが具体的なクラスとして定義されているかを検証する
///
/// 循環 import やタイポで undefined になった component を検出するために使う
pub fn assert_component_exists(
    component: Option<&ComponentType>,
    path: &str,
) -> Result<(), ConfigError> {
    match component {
        Some(component) if component.is_type() => Ok(()),
        _ => Err(ConfigError::ComponentUndefined(path.to_string())),
    }
}
