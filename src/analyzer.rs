// src/analyzer.rs
use futures::executor::block_on;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::model::{ComponentType, RouteConfig, RouteDefinition};
use crate::normalizer::{assert_component_exists, normalize_route_config};
use crate::parser::{parse_components_in_file, ComponentRoutes};
use crate::registry::{RecordingRegistry, RouteRegistry};

/// 1 コンポーネント分の解析結果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReport {
    /// クラス名
    pub component: String,

    /// クラスが宣言されているソースファイル
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,

    /// @RouteConfig の各要素の正規化結果
    pub routes: Vec<RouteReport>,
}

impl ComponentReport {
    /// 配下 (遅延ロード先を含む) に 1 件でもエラーがあるか
    pub fn has_errors(&self) -> bool {
        self.routes.iter().any(|route| {
            route.error.is_some() || route.children.as_ref().is_some_and(|c| c.has_errors())
        })
    }
}

/// ルート 1 件の解析結果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    /// 正規化後の定義 (正規化に失敗した場合は None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<RouteDefinition>,

    /// 検証エラー、またはローダーの失敗
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 遅延ロードで登録されたコンポーネントのルート
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<ComponentReport>,
}

/// プロジェクト内のクラスと @RouteConfig を元にルートツリーを組み立てる
pub struct Analyzer {
    components: Vec<ComponentRoutes>,
    registry: Arc<RecordingRegistry>,
}

impl Analyzer {
    pub fn new(components: Vec<ComponentRoutes>) -> Self {
        Analyzer {
            components,
            registry: Arc::new(RecordingRegistry::new()),
        }
    }

    /// WalkDir で全 .ts ファイルを再帰的に探索して解析する
    ///
    /// 構文エラーのあるファイルは警告を出してスキップする
    pub fn from_project(project_dir: &Path) -> Self {
        let mut components = Vec::new();
        let mut files: Vec<PathBuf> = WalkDir::new(project_dir)
            .into_iter()
            .filter_entry(|e| e.file_name() != "node_modules")
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().is_some_and(|ext| ext == "ts")
                    && !e.file_name().to_string_lossy().ends_with(".d.ts")
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();

        for path in files {
            tracing::info!("解析中: {:?}", path);
            match parse_components_in_file(&path) {
                Ok(found) => components.extend(found),
                Err(err) => tracing::warn!("{}", err),
            }
        }

        Self::new(components)
    }

    pub fn components(&self) -> &[ComponentRoutes] {
        &self.components
    }

    /// ソースファイルが分かっていれば完全一致、無ければ名前で探す
    fn find(&self, component: &ComponentType) -> Option<&ComponentRoutes> {
        match &component.source_file {
            Some(_) => self.components.iter().find(|c| &c.component == component),
            None => self
                .components
                .iter()
                .find(|c| c.component.name == component.name),
        }
    }

    /// 名前でコンポーネントを探す
    pub fn component_named(&self, name: &str) -> Option<ComponentType> {
        self.find(&ComponentType::new(name)).map(|c| c.component.clone())
    }

    /// 1 つのコンポーネントを起点にルートツリーを解析する
    pub fn analyze(&self, component: &ComponentType) -> ComponentReport {
        let mut visited = BTreeSet::new();
        self.analyze_component(component, &mut visited)
    }

    /// ルートが指定されなければ @RouteConfig を持つ全コンポーネントを解析し、
    /// 他のコンポーネントから遅延ロードされたものはトップレベルから外す
    pub fn analyze_project(&self, roots: &[String]) -> Vec<ComponentReport> {
        let starts: Vec<ComponentType> = if roots.is_empty() {
            self.components
                .iter()
                .filter(|c| c.has_route_config)
                .map(|c| c.component.clone())
                .collect()
        } else {
            roots
                .iter()
                .map(|name| self.component_named(name).unwrap_or_else(|| ComponentType::new(name)))
                .collect()
        };

        if !roots.is_empty() {
            return starts.iter().map(|start| self.analyze(start)).collect();
        }

        // 先に解析したツリーから遅延ロードされたコンポーネントは改めて出さない
        let mut reports = Vec::new();
        let mut covered: BTreeSet<ComponentType> = BTreeSet::new();
        for start in starts {
            if covered.contains(&start) {
                tracing::debug!("{} は遅延ロード先として出力済み", start);
                continue;
            }
            reports.push(self.analyze(&start));
            covered.extend(self.registry.loaded());
        }
        reports
    }

    fn analyze_component(
        &self,
        component: &ComponentType,
        visited: &mut BTreeSet<ComponentType>,
    ) -> ComponentReport {
        let entry = self.find(component);
        let key = entry.map_or_else(|| component.clone(), |e| e.component.clone());
        visited.insert(key.clone());

        let mut routes = Vec::new();
        match entry {
            Some(entry) => {
                for config in &entry.routes {
                    routes.push(self.analyze_entry(config.clone(), visited));
                }
            }
            None => tracing::warn!("コンポーネント {} の宣言が見つかりません", component),
        }
        // visited は祖先のチェーンだけを持つ。兄弟ルートからの同じロード先は毎回展開する
        visited.remove(&key);

        ComponentReport {
            component: key.name,
            source_file: key.source_file,
            routes,
        }
    }

    fn analyze_entry(
        &self,
        config: RouteConfig,
        visited: &mut BTreeSet<ComponentType>,
    ) -> RouteReport {
        let registry: Arc<dyn RouteRegistry> = self.registry.clone();
        let definition = match normalize_route_config(config, &registry) {
            Ok(definition) => definition,
            Err(err) => {
                tracing::warn!("{}", err);
                return RouteReport {
                    definition: None,
                    error: Some(err.to_string()),
                    children: None,
                };
            }
        };

        let mut error = None;
        let mut children = None;
        match &definition {
            RouteDefinition::Route(route) => {
                if let Err(err) = assert_component_exists(route.component.as_ref(), &route.path) {
                    error = Some(err.to_string());
                }
            }
            RouteDefinition::AuxRoute(route) => {
                if let Err(err) = assert_component_exists(route.component.as_ref(), &route.path) {
                    error = Some(err.to_string());
                }
            }
            RouteDefinition::AsyncRoute(route) => match block_on((route.loader)()) {
                Ok(component) => {
                    tracing::debug!(path = %route.path, component = %component, "遅延ロード完了");
                    // ラップされたローダーなら、ここでレジストリに登録されている
                    for loaded in self.registry.take_pending() {
                        if visited.contains(&loaded) {
                            tracing::debug!("循環参照のため {} をスキップ", loaded);
                            continue;
                        }
                        children = Some(self.analyze_component(&loaded, visited));
                    }
                }
                Err(err) => error = Some(err.to_string()),
            },
            RouteDefinition::Redirect(_) => {}
        }

        if let Some(err) = &error {
            tracing::warn!(path = definition.path(), "{}", err);
        }

        RouteReport {
            definition: Some(definition),
            error,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_project(root: &Path) {
        fs::write(
            root.join("app.ts"),
            r#"
@RouteConfig([
  {path: '/', component: Home, name: 'Home'},
  {path: '/lazy/...', loader: () => System.import('./lazy').then(m => m.LazyCmp), name: 'Lazy'},
  {path: '/gone', loader: () => System.import('./gone').then(m => m.Gone), name: 'Gone'},
  new Route({path: '/broken', component: undefined}),
  {path: '/both', component: Home, redirectTo: '/'}
])
export class AppCmp {}
export class Home {}
"#,
        )
        .unwrap();
        fs::write(
            root.join("lazy.ts"),
            r#"
@RouteConfig([
  {path: '/detail', component: Detail, name: 'Detail'},
  {path: '/back', loader: () => System.import('./app').then(m => m.AppCmp), name: 'Back'}
])
export class LazyCmp {}
export class Detail {}
"#,
        )
        .unwrap();
    }

    #[test]
    fn follows_lazy_loaders_and_reports_errors_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path());
        let analyzer = Analyzer::from_project(dir.path());

        let reports = analyzer.analyze_project(&[]);
        // LazyCmp は AppCmp から遅延ロードされるのでトップレベルには出ない
        assert_eq!(reports.len(), 1);
        let app = &reports[0];
        assert_eq!(app.component, "AppCmp");
        assert_eq!(app.routes.len(), 5);
        assert!(app.has_errors());

        let home = &app.routes[0];
        assert!(home.error.is_none());
        assert_eq!(home.definition.as_ref().unwrap().kind(), "Route");

        let lazy = &app.routes[1];
        assert!(lazy.error.is_none());
        let children = lazy.children.as_ref().unwrap();
        assert_eq!(children.component, "LazyCmp");
        assert_eq!(children.routes.len(), 2);
        // AppCmp へ戻るローダーは循環として展開しない
        assert!(children.routes[1].children.is_none());
        assert!(children.routes[1].error.is_none());

        let gone = &app.routes[2];
        assert!(gone.error.as_ref().unwrap().contains("could not be resolved"));

        let broken = &app.routes[3];
        assert_eq!(
            broken.error.as_deref(),
            Some("Component for route \"/broken\" is not defined, or is not a class.")
        );

        let both = &app.routes[4];
        assert!(both.definition.is_none());
        assert!(both.error.as_ref().unwrap().contains("exactly one \"component\""));
    }

    #[test]
    fn sibling_routes_loading_the_same_component_both_expand() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("app.ts"),
            r#"
@RouteConfig([
  {path: '/a/...', loader: () => System.import('./lazy').then(m => m.LazyCmp), name: 'A'},
  {path: '/b/...', loader: () => System.import('./lazy').then(m => m.LazyCmp), name: 'B'}
])
export class AppCmp {}
"#,
        )
        .unwrap();
        fs::write(
            root.join("lazy.ts"),
            r#"
@RouteConfig([
  {path: '/detail', component: Detail, name: 'Detail'}
])
export class LazyCmp {}
"#,
        )
        .unwrap();

        let analyzer = Analyzer::from_project(root);
        let reports = analyzer.analyze_project(&[]);
        assert_eq!(reports.len(), 1);

        let app = &reports[0];
        for route in &app.routes {
            assert!(route.error.is_none());
            let children = route.children.as_ref().unwrap();
            assert_eq!(children.component, "LazyCmp");
            assert_eq!(children.routes.len(), 1);
        }
    }

    #[test]
    fn explicit_roots_are_always_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path());
        let analyzer = Analyzer::from_project(dir.path());

        let reports = analyzer.analyze_project(&["LazyCmp".to_string()]);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].component, "LazyCmp");
        // 明示した起点からは AppCmp 側へも展開される
        let back = reports[0].routes[1].children.as_ref().unwrap();
        assert_eq!(back.component, "AppCmp");
        assert!(reports[0].has_errors());

        let json = serde_json::to_value(&reports[0]).unwrap();
        assert_eq!(json["routes"][0]["definition"]["type"], "Route");
        assert_eq!(json["routes"][0]["definition"]["component"]["name"], "Detail");
    }
}
