// src/main.rs

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use route_config_normalizer::analyzer::Analyzer;

/// CLI 引数定義
#[derive(Parser, Debug)]
#[command(
    name = "Route Config Audit",
    version = "0.1.0",
    about = "@RouteConfig のルート定義を正規化・検証し、遅延ロード先を含むルートツリーを JSON 出力する CLI ツール"
)]
struct Cli {
    /// 解析対象のプロジェクトルート
    /// 例: `--project-root C:/path/to/my-angular-project`
    #[arg(short = 'r', long = "project-root", value_name = "DIR")]
    project_root: PathBuf,

    /// 起点にするコンポーネント (複数指定可)。省略時は @RouteConfig を持つ全コンポーネント
    #[arg(short = 'c', long = "root-component", value_name = "NAME")]
    root_components: Vec<String>,

    /// 1 行の JSON で出力する
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログは stderr へ。RUST_LOG で上書き可能
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 1) CLI 引数をパースし、プロジェクトルートを絶対パス化
    let cli = Cli::parse();
    let project_dir = cli.project_root.canonicalize()?;

    // 2) 全 .ts ファイルからクラスと @RouteConfig を収集
    let analyzer = Analyzer::from_project(&project_dir);
    if !analyzer.components().iter().any(|c| c.has_route_config) {
        tracing::error!("@RouteConfig を持つコンポーネントが見つかりませんでした。");
        std::process::exit(1);
    }

    // 3) 正規化・遅延ロードをたどってルートツリーを構築
    let reports = analyzer.analyze_project(&cli.root_components);

    // 4) 最終的なルートツリーを JSON 化して標準出力
    let json = if cli.compact {
        serde_json::to_string(&reports)?
    } else {
        serde_json::to_string_pretty(&reports)?
    };
    println!("{}", json);

    // 検証エラーが 1 件でもあれば失敗として終了
    if reports.iter().any(|r| r.has_errors()) {
        tracing::error!("ルート設定にエラーがあります");
        std::process::exit(2);
    }

    Ok(())
}
