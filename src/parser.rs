// src/parser.rs
use swc_common::{sync::Lrc, FileName, SourceMap};
use swc_ecma_ast::*;
use swc_ecma_parser::{lexer::Lexer, Parser as SwcParser, StringInput, Syntax, TsConfig};
use swc_ecma_visit::{Visit, VisitWith};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, ParseError};
use crate::model::{
    loader_fn, AsyncRoute, AuxRoute, ComponentDefinition, ComponentType, Loader, RawComponent,
    RawRouteConfig, Redirect, Route, RouteConfig, RouteData, RouteDefinition,
};
use crate::resolver::SourceLoader;

/// 1 つのクラス宣言と、その @RouteConfig に書かれたルート定義
#[derive(Debug, Clone)]
pub struct ComponentRoutes {
    /// クラス (ソースファイル付き)
    pub component: ComponentType,

    /// @RouteConfig([...]) の各要素。デコレータが無ければ空
    pub routes: Vec<RouteConfig>,

    /// @RouteConfig デコレータを持っているかどうか
    pub has_route_config: bool,
}

/// AST をトラバースしてクラス宣言と @RouteConfig を抽出するための Visitor
struct RouteConfigVisitor {
    /// この Visitor が解析対象としているファイル
    source_file: PathBuf,
    /// 見つかったクラスを宣言順に格納する Vec
    pub components: Vec<ComponentRoutes>,
}

/// 括弧や `as` キャストを剥がす
fn unwrap_expr(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(ParenExpr { expr, .. }) => unwrap_expr(expr),
        Expr::TsAs(TsAsExpr { expr, .. }) => unwrap_expr(expr),
        other => other,
    }
}

fn prop_key_name(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(Str { value, .. }) => Some(value.to_string()),
        _ => None,
    }
}

fn member_prop_name(prop: &MemberProp) -> Option<String> {
    match prop {
        MemberProp::Ident(ident) => Some(ident.sym.to_string()),
        MemberProp::Computed(ComputedPropName { expr, .. }) => string_value(expr),
        _ => None,
    }
}

/// オブジェクトリテラルの (キー, 値) を列挙する。`{ component }` の省略記法も展開する
fn object_entries(obj_lit: &ObjectLit) -> Vec<(String, Expr)> {
    let mut entries = Vec::new();
    for prop in &obj_lit.props {
        if let PropOrSpread::Prop(boxed_prop) = prop {
            match &**boxed_prop {
                Prop::KeyValue(KeyValueProp { key, value }) => {
                    if let Some(key_name) = prop_key_name(key) {
                        entries.push((key_name, (**value).clone()));
                    }
                }
                Prop::Shorthand(ident) => {
                    entries.push((ident.sym.to_string(), Expr::Ident(ident.clone())));
                }
                _ => {}
            }
        }
    }
    entries
}

/// 文字列リテラル (置換のないテンプレート文字列を含む)
fn string_value(expr: &Expr) -> Option<String> {
    match unwrap_expr(expr) {
        Expr::Lit(Lit::Str(Str { value, .. })) => Some(value.to_string()),
        Expr::Tpl(Tpl { exprs, quasis, .. }) if exprs.is_empty() => {
            quasis.first().map(|q| q.raw.to_string())
        }
        _ => None,
    }
}

/// redirectTo は文字列か、リンク DSL の配列 (`['/Parent', 'Child']`)
///
/// 配列は空でも指定ありとして扱い、セグメントが無ければ "/" になる
fn redirect_value(expr: &Expr) -> Option<String> {
    if let Expr::Array(ArrayLit { elems, .. }) = unwrap_expr(expr) {
        let segments: Vec<String> = elems
            .iter()
            .flatten()
            .filter_map(|elem| string_value(&elem.expr))
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Some("/".to_string());
        }
        return Some(segments.join("/").replace("//", "/"));
    }
    string_value(expr)
}

fn bool_value(expr: &Expr) -> Option<bool> {
    match unwrap_expr(expr) {
        Expr::Lit(Lit::Bool(Bool { value, .. })) => Some(*value),
        _ => None,
    }
}

/// data に書かれたリテラルを JSON に変換する
fn json_value(expr: &Expr) -> serde_json::Value {
    use serde_json::Value;

    match unwrap_expr(expr) {
        Expr::Lit(Lit::Str(Str { value, .. })) => Value::String(value.to_string()),
        Expr::Lit(Lit::Bool(Bool { value, .. })) => Value::Bool(*value),
        Expr::Lit(Lit::Null(_)) => Value::Null,
        Expr::Lit(Lit::Num(Number { value, .. })) => {
            if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                Value::from(*value as i64)
            } else {
                serde_json::Number::from_f64(*value)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Expr::Array(ArrayLit { elems, .. }) => Value::Array(
            elems
                .iter()
                .map(|elem| match elem {
                    Some(elem) => json_value(&elem.expr),
                    None => Value::Null,
                })
                .collect(),
        ),
        Expr::Object(obj_lit) => Value::Object(json_object(obj_lit)),
        other => {
            if let Some(s) = string_value(other) {
                return Value::String(s);
            }
            tracing::warn!("data 内のリテラル以外の値は null として扱います");
            Value::Null
        }
    }
}

fn json_object(obj_lit: &ObjectLit) -> RouteData {
    object_entries(obj_lit)
        .into_iter()
        .map(|(key, value)| (key, json_value(&value)))
        .collect()
}

/// `m => m.Name` から "Name" を取り出す
fn then_export_name(expr: &Expr) -> Option<String> {
    let Expr::Arrow(ArrowExpr { params, body, .. }) = unwrap_expr(expr) else {
        return None;
    };
    let Some(Pat::Ident(BindingIdent { id: param, .. })) = params.first() else {
        return None;
    };
    let BlockStmtOrExpr::Expr(body) = body.as_ref() else {
        return None;
    };
    match unwrap_expr(body) {
        Expr::Member(MemberExpr { obj, prop, .. }) => match unwrap_expr(obj) {
            Expr::Ident(obj_ident) if obj_ident.sym == param.sym => member_prop_name(prop),
            _ => None,
        },
        _ => None,
    }
}

/// `System.import('./x')` または `import('./x')` の指定子
fn import_specifier(call: &CallExpr) -> Option<String> {
    let is_import = match &call.callee {
        Callee::Import(_) => true,
        Callee::Expr(expr) => match unwrap_expr(expr) {
            Expr::Member(MemberExpr { obj, prop, .. }) => {
                matches!(unwrap_expr(obj), Expr::Ident(ident) if &*ident.sym == "System")
                    && member_prop_name(prop).as_deref() == Some("import")
            }
            _ => false,
        },
        _ => false,
    };
    if !is_import {
        return None;
    }
    call.args.first().and_then(|arg| string_value(&arg.expr))
}

/// ローダー本体の式から (import 指定子, export 名) を取り出す
fn loader_target(expr: &Expr) -> Option<(String, Option<String>)> {
    let Expr::Call(call) = unwrap_expr(expr) else {
        return None;
    };
    if let Some(specifier) = import_specifier(call) {
        return Some((specifier, None));
    }
    // `<import>.then(m => m.Name)`
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let Expr::Member(MemberExpr { obj, prop, .. }) = unwrap_expr(callee) else {
        return None;
    };
    if member_prop_name(prop).as_deref() != Some("then") {
        return None;
    }
    let Expr::Call(inner) = unwrap_expr(obj) else {
        return None;
    };
    let specifier = import_specifier(inner)?;
    let export_name = call.args.first().and_then(|arg| then_export_name(&arg.expr));
    Some((specifier, export_name))
}

impl RouteConfigVisitor {
    fn new(source_file: PathBuf) -> Self {
        RouteConfigVisitor {
            source_file,
            components: Vec::new(),
        }
    }

    /// loader に書かれたアロー関数を Loader に変換する
    ///
    /// 解釈できない式でも「loader が指定されている」ことは保つため、
    /// 呼び出すと失敗するローダーを返す
    fn parse_loader(&self, expr: &Expr) -> Loader {
        let target = match unwrap_expr(expr) {
            Expr::Arrow(ArrowExpr { body, .. }) => match body.as_ref() {
                BlockStmtOrExpr::Expr(body) => loader_target(body),
                BlockStmtOrExpr::BlockStmt(BlockStmt { stmts, .. }) => {
                    stmts.iter().find_map(|stmt| match stmt {
                        Stmt::Return(ReturnStmt { arg: Some(arg), .. }) => loader_target(arg),
                        _ => None,
                    })
                }
            },
            _ => None,
        };

        match target {
            Some((specifier, export_name)) => {
                tracing::debug!(%specifier, ?export_name, "      → loader 発見");
                SourceLoader {
                    specifier,
                    export_name,
                    parent_file: self.source_file.clone(),
                }
                .into_loader()
            }
            None => {
                tracing::warn!(file = ?self.source_file, "解釈できない loader 式です");
                let file = self.source_file.display().to_string();
                loader_fn(move || {
                    let file = file.clone();
                    async move {
                        Err(LoadError::Rejected(format!(
                            "unsupported loader expression in {}",
                            file
                        )))
                    }
                })
            }
        }
    }

    fn parse_component_reference(&self, expr: &Expr) -> Option<ComponentType> {
        match unwrap_expr(expr) {
            Expr::Ident(ident) if &*ident.sym == "undefined" => None,
            Expr::Ident(ident) => Some(ComponentType::new(ident.sym.to_string())),
            Expr::Lit(Lit::Null(_)) => None,
            other => {
                tracing::warn!("component にクラス参照以外の値が指定されています: {:?}", other);
                None
            }
        }
    }

    /// `{ type: "constructor" | "loader", constructor?, loader? }`
    fn parse_component_definition(&self, obj_lit: &ObjectLit) -> ComponentDefinition {
        let mut definition = ComponentDefinition {
            kind: "undefined".to_string(),
            ..Default::default()
        };
        for (key, value) in object_entries(obj_lit) {
            match key.as_str() {
                "type" => {
                    if let Some(kind) = string_value(&value) {
                        definition.kind = kind;
                    }
                }
                "constructor" => definition.constructor = self.parse_component_reference(&value),
                "loader" => definition.loader = Some(self.parse_loader(&value)),
                _ => {}
            }
        }
        definition
    }

    fn parse_component(&self, expr: &Expr) -> RawComponent {
        match unwrap_expr(expr) {
            Expr::Object(obj_lit) => RawComponent::Definition(self.parse_component_definition(obj_lit)),
            other => RawComponent::Type(self.parse_component_reference(other)),
        }
    }

    /// ObjectLit (例: `{ path: "/home", component: Home, name: "Home" }`) を受け取り
    /// RawRouteConfig を構築して返すヘルパーメソッド
    fn parse_raw_config(&self, obj_lit: &ObjectLit) -> RawRouteConfig {
        let mut raw = RawRouteConfig::default();

        for (key_name, value) in object_entries(obj_lit) {
            tracing::trace!("    → プロパティ発見: {}", key_name);
            match key_name.as_str() {
                "path" => raw.path = string_value(&value),
                "aux" => raw.aux = string_value(&value),
                "as" => raw.as_ = string_value(&value),
                "name" => raw.name = string_value(&value),
                "redirectTo" => raw.redirect_to = redirect_value(&value),
                "component" => raw.component = Some(self.parse_component(&value)),
                "loader" => raw.loader = Some(self.parse_loader(&value)),
                "data" => {
                    if let Expr::Object(data) = unwrap_expr(&value) {
                        raw.data = Some(json_object(data));
                    }
                }
                "useAsDefault" => raw.use_as_default = bool_value(&value),
                _ => {}
            }
        }

        raw
    }

    /// `new Route({...})` などの明示的な定義
    fn parse_new_definition(&self, new_expr: &NewExpr) -> Option<RouteDefinition> {
        let Expr::Ident(callee) = unwrap_expr(&new_expr.callee) else {
            return None;
        };
        let raw = match new_expr.args.as_ref().and_then(|args| args.first()) {
            Some(arg) => match unwrap_expr(&arg.expr) {
                Expr::Object(obj_lit) => self.parse_raw_config(obj_lit),
                _ => return None,
            },
            None => return None,
        };
        let component = match raw.component {
            Some(RawComponent::Type(component)) => component,
            Some(RawComponent::Definition(definition)) => definition.constructor,
            None => None,
        };
        let path = raw.path.unwrap_or_default();

        match &*callee.sym {
            "Route" => Some(RouteDefinition::Route(Route {
                path,
                component,
                name: raw.name,
                data: raw.data,
                use_as_default: raw.use_as_default.unwrap_or(false),
            })),
            "AsyncRoute" => match raw.loader {
                Some(loader) => Some(RouteDefinition::AsyncRoute(AsyncRoute {
                    path,
                    loader,
                    name: raw.name,
                    data: raw.data,
                    use_as_default: raw.use_as_default.unwrap_or(false),
                })),
                None => {
                    tracing::warn!(%path, "loader の無い new AsyncRoute をスキップします");
                    None
                }
            },
            "AuxRoute" => Some(RouteDefinition::AuxRoute(AuxRoute {
                path,
                component,
                name: raw.name,
            })),
            "Redirect" => Some(RouteDefinition::Redirect(Redirect {
                path,
                redirect_to: raw.redirect_to.unwrap_or_default(),
            })),
            other => {
                tracing::warn!("未知のルート定義クラスです: {}", other);
                None
            }
        }
    }

    fn parse_route_entry(&self, expr: &Expr) -> Option<RouteConfig> {
        match unwrap_expr(expr) {
            Expr::Object(obj_lit) => Some(RouteConfig::Raw(self.parse_raw_config(obj_lit))),
            Expr::New(new_expr) => self.parse_new_definition(new_expr).map(RouteConfig::Definition),
            _ => {
                tracing::warn!(file = ?self.source_file, "ルート要素がオブジェクトでも new 式でもありません");
                None
            }
        }
    }

    /// クラスのデコレータから @RouteConfig([...]) を探す
    fn record_class(&mut self, name: String, class: &Class) {
        let mut routes = Vec::new();
        let mut has_route_config = false;

        for decorator in &class.decorators {
            let Expr::Call(call) = unwrap_expr(&decorator.expr) else {
                continue;
            };
            let Callee::Expr(callee) = &call.callee else {
                continue;
            };
            if !matches!(unwrap_expr(callee), Expr::Ident(ident) if &*ident.sym == "RouteConfig") {
                continue;
            }
            has_route_config = true;

            if let Some(arg) = call.args.first() {
                if let Expr::Array(arr_lit) = unwrap_expr(&arg.expr) {
                    tracing::debug!("  → @RouteConfig 発見 ({}): {} 要素", name, arr_lit.elems.len());
                    for elem in arr_lit.elems.iter().flatten() {
                        if let Some(entry) = self.parse_route_entry(&elem.expr) {
                            routes.push(entry);
                        }
                    }
                }
            }
        }

        self.components.push(ComponentRoutes {
            component: ComponentType::with_source(name, self.source_file.clone()),
            routes,
            has_route_config,
        });
    }
}

impl Visit for RouteConfigVisitor {
    fn visit_class_decl(&mut self, decl: &ClassDecl) {
        self.record_class(decl.ident.sym.to_string(), &decl.class);
        decl.visit_children_with(self);
    }

    /// `export default class Foo {}` など
    fn visit_class_expr(&mut self, expr: &ClassExpr) {
        if let Some(ident) = &expr.ident {
            self.record_class(ident.sym.to_string(), &expr.class);
        }
        expr.visit_children_with(self);
    }
}

/// ソース文字列を解析し、宣言されているクラスとその @RouteConfig を返す
pub fn parse_components_in_source(
    src: String,
    file_path: &Path,
) -> Result<Vec<ComponentRoutes>, ParseError> {
    let cm: Lrc<SourceMap> = Default::default();

    let fm = cm.new_source_file(FileName::Real(file_path.to_path_buf()), src);

    // TypeScript構文でパースする設定
    let syntax = Syntax::Typescript(TsConfig {
        tsx: false,
        decorators: true,
        dts: false,
        no_early_errors: true,
        disallow_ambiguous_jsx_like: true,
    });

    let lexer = Lexer::new(
        syntax,
        Default::default(), // es version
        StringInput::from(&*fm),
        None,
    );

    let mut parser = SwcParser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| ParseError::Syntax {
        path: file_path.to_path_buf(),
        message: format!("{:?}", e.kind()),
    })?;

    let mut visitor = RouteConfigVisitor::new(file_path.to_path_buf());
    visitor.visit_module(&module);

    tracing::debug!(
        file = ?file_path,
        classes = visitor.components.len(),
        "解析完了"
    );

    Ok(visitor.components)
}

/// ファイルを読み込んで `parse_components_in_source` に渡す
pub fn parse_components_in_file(file_path: &Path) -> Result<Vec<ComponentRoutes>, ParseError> {
    let src = fs::read_to_string(file_path).map_err(|e| ParseError::Io {
        path: file_path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_components_in_source(src, file_path)
}
