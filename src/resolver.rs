use path_absolutize::Absolutize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::model::{loader_fn, ComponentType, Loader};
use crate::parser::parse_components_in_file;

/// ローダーの `System.import("...")` / `import("...")` に書かれた指定子を、
/// 親ファイル (`parent_file`) のディレクトリを基準にして実際の .ts ファイルへ解決する関数。
///
/// - `specifier`: import の引数 (例: "./lazy/lazy")
/// - `parent_file`: その式を持つ親ファイルのパス (例: `/proj/src/app/app.ts`)
///
/// 戻り値:
/// - Some(path) → 見つかったファイルの絶対パス
/// - None       → 見つからなかった (相対指定でないものも含む)
pub fn resolve_import_path(specifier: &str, parent_file: &Path) -> Option<PathBuf> {
    // 1) パッケージ名指定 (angular2/core など) は対象外
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return None;
    }

    // 2) parent_file の親ディレクトリを基準にして相対パスを結合し、candidate_base を作成
    //    例: parent_file = /proj/src/app/app.ts
    //        specifier   = "./lazy/lazy"
    //    → candidate_base = /proj/src/app/lazy/lazy
    let parent_dir = parent_file.parent()?;
    let candidate_base = parent_dir.join(specifier);

    // 3) 典型的なファイル名パターンを列挙
    let mut candidates: Vec<PathBuf> = Vec::new();

    // A) 拡張子付きで書かれている場合はそのまま
    if candidate_base.extension().is_some_and(|ext| ext == "ts") {
        candidates.push(candidate_base.clone());
    }

    // B) lazy.ts
    let mut with_ext = candidate_base.clone().into_os_string();
    with_ext.push(".ts");
    candidates.push(PathBuf::from(with_ext));

    // C) lazy/index.ts
    candidates.push(candidate_base.join("index.ts"));

    // 4) 列挙した候補を絶対パス化し、最初に存在するものを返却
    candidates.into_iter().find_map(|cand| {
        let abs = cand.absolutize().ok()?.to_path_buf();
        fs::metadata(&abs).is_ok_and(|m| m.is_file()).then_some(abs)
    })
}

/// ソースに書かれた遅延ローダー
///
/// `() => System.import('./lazy').then(m => m.LazyCmp)` を表す
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoader {
    /// import の指定子
    pub specifier: String,
    /// `.then(m => m.Name)` の Name。無ければモジュール内の最初のクラス
    pub export_name: Option<String>,
    /// ローダーが書かれているファイル
    pub parent_file: PathBuf,
}

impl SourceLoader {
    /// モジュールを解決・解析し、対象クラスを ComponentType として返す
    pub fn load(&self) -> Result<ComponentType, LoadError> {
        let module = resolve_import_path(&self.specifier, &self.parent_file).ok_or_else(|| {
            LoadError::ModuleNotFound {
                specifier: self.specifier.clone(),
                parent: self.parent_file.clone(),
            }
        })?;
        tracing::debug!(module = ?module, "遅延ロード対象モジュールを解析");

        let components = parse_components_in_file(&module)?;
        let found = match &self.export_name {
            Some(name) => components.into_iter().find(|c| &c.component.name == name),
            None => components.into_iter().next(),
        };

        found.map(|c| c.component).ok_or_else(|| LoadError::ExportNotFound {
            module,
            export: self.export_name.clone().unwrap_or_else(|| "default".to_string()),
        })
    }

    pub fn into_loader(self) -> Loader {
        loader_fn(move || {
            let source = self.clone();
            async move { source.load() }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::fs;

    #[test]
    fn resolves_sibling_file_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("app.ts"), "").unwrap();
        fs::write(root.join("lazy.ts"), "").unwrap();
        fs::create_dir(root.join("feature")).unwrap();
        fs::write(root.join("feature").join("index.ts"), "").unwrap();

        let parent = root.join("app.ts");
        let lazy = resolve_import_path("./lazy", &parent).unwrap();
        assert!(lazy.ends_with("lazy.ts"));

        let feature = resolve_import_path("./feature", &parent).unwrap();
        assert!(feature.ends_with("feature/index.ts"));

        assert!(resolve_import_path("./missing", &parent).is_none());
        assert!(resolve_import_path("angular2/core", &parent).is_none());
    }

    #[test]
    fn source_loader_resolves_named_export() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("app.ts"), "").unwrap();
        fs::write(root.join("lazy.ts"), "export class Other {}\nexport class LazyCmp {}\n")
            .unwrap();

        let loader = SourceLoader {
            specifier: "./lazy".into(),
            export_name: Some("LazyCmp".into()),
            parent_file: root.join("app.ts"),
        }
        .into_loader();

        let component = block_on(loader()).unwrap();
        assert_eq!(component.name, "LazyCmp");
        assert!(component.source_file.unwrap().ends_with("lazy.ts"));
    }

    #[test]
    fn source_loader_reports_missing_module_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("lazy.ts"), "export class Other {}\n").unwrap();

        let missing_module = SourceLoader {
            specifier: "./nope".into(),
            export_name: None,
            parent_file: root.join("app.ts"),
        };
        assert!(matches!(
            missing_module.load(),
            Err(LoadError::ModuleNotFound { .. })
        ));

        let missing_export = SourceLoader {
            specifier: "./lazy".into(),
            export_name: Some("LazyCmp".into()),
            parent_file: root.join("app.ts"),
        };
        assert!(matches!(
            missing_export.load(),
            Err(LoadError::ExportNotFound { .. })
        ));
    }
}
