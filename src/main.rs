use anyhow::{Context, Result};
use log::{info, warn};
use myy_playout::channel::Channel;
use myy_playout::core::{FrameHints, FrameRate, OutputFormat, PlayoutConfig};
use myy_playout::player::{
    FileProducer, FileProducerOptions, Producer, SyntheticSource, SyntheticSourceOptions,
};
use myy_playout::renderer::{
    ProceduralRenderer, ProceduralRendererOptions, Renderer, RendererFactory, RendererHost,
    RendererProducer,
};
use std::sync::Arc;
use std::time::Duration;

const DEMO_FRAMES: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("🎬 MYY Playout 启动");

    // 可选参数：配置文件路径
    let config = match std::env::args().nth(1) {
        Some(path) => PlayoutConfig::load(&path)
            .with_context(|| format!("加载配置文件 {} 失败", path))?,
        None => PlayoutConfig::default(),
    };
    config.validate()?;
    let format = OutputFormat::by_name(&config.video_mode)?;
    info!(
        "✅ 输出格式: {} {}x{} {} fps ({})",
        format.name,
        format.width,
        format.height,
        format.frame_rate,
        format.field_mode.as_str()
    );

    // 第 0 层：循环播放的测试片
    let clip = FileProducer::open(
        Box::new(SyntheticSource::new(SyntheticSourceOptions {
            name: "bars-50p".to_string(),
            frame_rate: FrameRate::new(50, 1),
            nb_frames: Some(250),
            ..Default::default()
        })),
        &format,
        FileProducerOptions::from_params(&["LOOP"])?,
        &config,
    )?;
    let clip = Arc::new(Producer::file(clip));

    // 第 10 层：模板渲染器
    let factory: RendererFactory = Arc::new(|| {
        Ok(Box::new(ProceduralRenderer::new(ProceduralRendererOptions {
            name: "lower-third".to_string(),
            ..Default::default()
        })) as Box<dyn Renderer>)
    });
    let overlay =
        RendererProducer::new("lower-third", factory, RendererHost::new(), &format, &config)?;
    let overlay = Arc::new(Producer::renderer(overlay));
    overlay.call("start_rendering").await?;

    let mut channel = Channel::start(format.clone(), 4)?;
    channel.scheduler().load(0, clip.clone(), FrameHints::NONE);
    channel.scheduler().load(10, overlay.clone(), FrameHints::NONE);

    for n in 0..DEMO_FRAMES {
        let frame = channel
            .output()
            .recv_timeout(Duration::from_secs(2))
            .context("通道没有输出")?;
        if n % 25 == 0 {
            info!(
                "📺 第 {} 帧: {} 层, {} | {}",
                frame.frame_number,
                frame.layers.len(),
                clip.print(),
                overlay.print()
            );
        }
        if n == 50 {
            let reply = clip.call("SEEK 100").await?;
            info!("⏩ {}", reply);
        }
    }

    match clip.call("LOOP 0").await {
        Ok(reply) => info!("🔁 {}", reply),
        Err(e) => warn!("⚠️ {}", e),
    }
    info!("{}", serde_json::to_string_pretty(&channel.scheduler().info())?);
    channel.stop();
    info!("📉 丢弃 {} 帧，{} 次落后", channel.frames_dropped(), channel.overruns());

    // 独立的缩略图生产者
    let thumbnail_source = FileProducer::open(
        Box::new(SyntheticSource::new(SyntheticSourceOptions {
            name: "thumbnail".to_string(),
            nb_frames: Some(100),
            ..Default::default()
        })),
        &format,
        FileProducerOptions {
            thumbnail_mode: true,
            ..Default::default()
        },
        &config,
    )?;
    let thumbnail = Producer::file(thumbnail_source).create_thumbnail_frame().await?;
    info!("🖼️ 缩略图: {} 格", thumbnail.children().len());

    Ok(())
}
