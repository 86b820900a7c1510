// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// ルート設定の検証エラー
///
/// いずれもルートテーブル構築時の開発者ミスであり、リトライはしない
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "Route config should contain exactly one \"component\", \"loader\", or \"redirectTo\" property."
    )]
    ExclusivityViolation,

    #[error("Route config should contain exactly one \"as\" or \"name\" property.")]
    AliasConflict,

    #[error("Invalid component type \"{0}\". Valid types are \"constructor\" and \"loader\".")]
    InvalidComponentType(String),

    #[error("Component for route \"{0}\" is not defined, or is not a class.")]
    ComponentUndefined(String),
}

/// 遅延ローダーの失敗 (ラッパーはそのまま呼び出し元へ伝播する)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("module \"{specifier}\" imported from {parent:?} could not be resolved")]
    ModuleNotFound { specifier: String, parent: PathBuf },

    #[error("module {module:?} does not declare \"{export}\"")]
    ExportNotFound { module: PathBuf, export: String },

    #[error("failed to parse {0}")]
    Parse(String),

    #[error("loader rejected: {0}")]
    Rejected(String),
}

/// TypeScript ソースの解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("failed to read {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("parse error in {path:?}: {message}")]
    Syntax { path: PathBuf, message: String },
}

impl From<ParseError> for LoadError {
    fn from(err: ParseError) -> Self {
        LoadError::Parse(err.to_string())
    }
}
