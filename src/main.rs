//! animal-face 主入口

use std::path::{Path, PathBuf};

use animal_face::normalizer::read_raw_image;
use animal_face::{relay, Analyzer, AppConfig, InferenceBackend, Normalizer, Relay, RelayClient};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "animal-face", version, about = "Which animal do you look like?")]
struct Cli {
    /// 配置文件路径（默认使用平台配置目录）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 启动推理中继服务
    Serve,
    /// 分析一张本地照片
    Analyze {
        /// 照片路径
        file: PathBuf,
        /// 远程中继地址；不指定时在本进程内转发
        #[arg(long)]
        relay_url: Option<String>,
        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("animal_face=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => {
            info!("Starting animal-face relay v{}", env!("CARGO_PKG_VERSION"));
            let credential = config.credential();
            relay::server::run(config, credential).await
        }
        Command::Analyze {
            file,
            relay_url,
            json,
        } => {
            let normalizer = Normalizer::new(config.normalizer.clone());
            match relay_url {
                Some(url) => {
                    let analyzer = Analyzer::new(normalizer, RelayClient::new(&url));
                    analyze(&analyzer, &file, json).await
                }
                None => {
                    let relay = Relay::new(config.inference.clone(), config.credential())?;
                    let analyzer = Analyzer::new(normalizer, relay);
                    analyze(&analyzer, &file, json).await
                }
            }
        }
    }
}

async fn analyze<B: InferenceBackend>(
    analyzer: &Analyzer<B>,
    file: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let raw = read_raw_image(file)?;
    let analysis = analyzer.analyze(raw).await.context("Analysis failed")?;
    let result = &analysis.result;

    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.symbol() == result.name() {
        println!("{}", result.animal);
    } else {
        println!("{}  {}", result.symbol(), result.name());
    }
    println!("Similarity: {}%", result.similarity);
    println!();
    println!("Personality: {}", result.traits.personality);
    println!("Likes:       {}", result.traits.likes);
    println!("Dislikes:    {}", result.traits.dislikes);
    println!("Charm:       {}", result.traits.charm);
    Ok(())
}
