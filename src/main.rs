use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use video_share_client::{
    config::{LogConfig, DEFAULT_CONFIG_PATH},
    delete_upload, download_to_file, logging, share_link, AppConfig, BackendClient, HistoryView,
    UploadEvent, UploadManager, UploadRecord, VideoLinks,
};

/// 上传完成后展示的历史记录条数
const RECENT_AFTER_UPLOAD: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "video-share", version, about = "视频分享站分片上传客户端")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 分片上传视频
    Upload {
        /// 本地视频文件
        file: PathBuf,
    },
    /// 查看全部上传历史
    History,
    /// 查看最近上传
    Recent {
        /// 显示条数
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// 获取播放、下载和分享地址
    Stream {
        /// 视频ID
        id: String,
    },
    /// 下载视频
    Download {
        /// 视频ID
        id: String,
        /// 保存路径（默认 <ID>.mp4）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 删除视频
    Delete {
        /// 视频ID
        id: String,
        /// 跳过确认
        #[arg(short, long)]
        yes: bool,
    },
    /// 生成分享链接
    Share {
        /// 视频ID
        id: String,
    },
}

/// 先单独读取日志配置，保证加载完整配置时的日志也能输出
async fn load_log_config(config_path: &str) -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(config_path).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }
    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_config = load_log_config(&args.config).await;
    let _log_guard = logging::init_logging(&log_config);

    let mut config = AppConfig::load_or_default(&args.config).await;
    config.apply_env_overrides();
    config.validate().context("配置无效")?;

    info!(
        "video-share v{} 启动, backend={}",
        env!("CARGO_PKG_VERSION"),
        config.backend.backend_url
    );

    let client = Arc::new(BackendClient::new(&config.backend).context("创建后端客户端失败")?);

    match args.command {
        Command::Upload { file } => upload(&config, client, file).await,
        Command::History => {
            let view = HistoryView::load(&client).await;
            print_records(view.items().iter());
            Ok(())
        }
        Command::Recent { limit } => {
            let view = HistoryView::load_recent(&client).await;
            print_records(view.latest(limit).into_iter());
            Ok(())
        }
        Command::Stream { id } => {
            let links = VideoLinks::resolve(&client, &config.backend.frontend_url, &id).await?;
            println!("播放地址: {}", links.stream_url);
            println!("下载地址: {}", links.download_url);
            println!("分享链接: {}", links.share_url);
            Ok(())
        }
        Command::Download { id, output } => {
            let dest = output.unwrap_or_else(|| PathBuf::from(format!("{}.mp4", id)));
            let written = download_to_file(&client, &id, &dest).await?;
            println!(
                "已下载 {} MB 到 {}",
                video_share_client::backend::format_size_mb(written),
                dest.display()
            );
            Ok(())
        }
        Command::Delete { id, yes } => {
            if !yes && !confirm(&format!("确定要删除视频 {} 吗？此操作不可撤销 [y/N] ", id)).await? {
                println!("已取消");
                return Ok(());
            }
            let mut view = HistoryView::default();
            delete_upload(&client, &mut view, &id).await?;
            println!("视频已删除: {}", id);
            Ok(())
        }
        Command::Share { id } => {
            println!("{}", share_link(&config.backend.frontend_url, &id));
            Ok(())
        }
    }
}

async fn upload(config: &AppConfig, client: Arc<BackendClient>, file: PathBuf) -> anyhow::Result<()> {
    let manager = UploadManager::new(
        Arc::clone(&client),
        config.upload.clone(),
        config.backend.frontend_url.clone(),
    );
    let printer = tokio::spawn(print_events(manager.subscribe()));

    let result = {
        let task = manager.start_upload(Some(file.as_path()));
        tokio::pin!(task);
        tokio::select! {
            result = &mut task => result,
            _ = tokio::signal::ctrl_c() => {
                manager.abandon();
                task.await
            }
        }
    };

    // 释放管理器以关闭事件通道
    drop(manager);
    if let Err(e) = printer.await {
        warn!("事件输出任务异常退出: {}", e);
    }

    let outcome = result?;
    match outcome.share_url {
        Some(url) => println!("上传成功！分享链接: {}", url),
        None => println!("上传成功！"),
    }
    if let Some(url) = outcome.session.result_playback_url() {
        println!("播放地址: {}", url);
    }

    let view = HistoryView::load(&client).await;
    if !view.is_empty() {
        println!();
        println!("最近上传:");
        print_records(view.latest(RECENT_AFTER_UPLOAD).into_iter());
    }

    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<UploadEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                match &event {
                    UploadEvent::Started {
                        file_name,
                        total_chunks,
                        ..
                    } => println!("开始上传 {}，共 {} 个分片", file_name, total_chunks),
                    UploadEvent::ChunkRetry {
                        chunk_index,
                        attempt,
                        max_attempts,
                        ..
                    } => println!(
                        "分片 #{} 上传失败，重试中 ({}/{})",
                        chunk_index, attempt, max_attempts
                    ),
                    UploadEvent::Progress {
                        completed_chunks,
                        total_chunks,
                        progress,
                        ..
                    } => println!(
                        "上传进度: {}% ({}/{})",
                        progress, completed_chunks, total_chunks
                    ),
                    UploadEvent::Completed { .. } => {}
                    UploadEvent::Failed {
                        chunk_index,
                        attempts,
                        ..
                    } => eprintln!("分片 #{} 上传失败，已尝试 {} 次", chunk_index, attempts),
                }
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_records<'a>(records: impl Iterator<Item = &'a UploadRecord>) {
    let mut empty = true;
    for record in records {
        empty = false;
        let date = record
            .upload_date
            .as_deref()
            .map(|d| format!("  {}", d))
            .unwrap_or_default();
        println!(
            "{}  {}  {} MB  {}{}",
            record.file_id,
            record.file_name,
            record.size_mb(),
            record.status,
            date
        );
    }
    if empty {
        println!("暂无上传记录");
    }
}

async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{}", prompt);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("读取确认输入失败")?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
