use super::Renderer;
use crate::core::{FrameRate, PixelFormat, PlayerError, Result, VideoFrame};

/// 程序化渲染器参数
#[derive(Debug, Clone)]
pub struct ProceduralRendererOptions {
    pub name: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// 加载期间的 is_ready 检查次数
    pub warmup: u32,
    /// 播放多少帧后变为空，None 表示一直播放
    pub length: Option<u64>,
    /// 在第 n 帧出图时报错（测试失败恢复用）
    pub fail_at: Option<u64>,
    /// 模板永远不能出图
    pub never_ready: bool,
}

impl Default for ProceduralRendererOptions {
    fn default() -> Self {
        Self {
            name: "bars".to_string(),
            fps: 50.0,
            width: 64,
            height: 36,
            warmup: 0,
            length: None,
            fail_at: None,
            never_ready: false,
        }
    }
}

/// 程序化渲染器：一条移动的竖条
///
/// 每帧画面的前 8 个字节写入帧计数（小端），测试用 [`rendered_index`] 读回。
pub struct ProceduralRenderer {
    options: ProceduralRendererOptions,
    warmup_left: u32,
    frame: u64,
    stopped: bool,
}

impl ProceduralRenderer {
    pub fn new(options: ProceduralRendererOptions) -> Self {
        Self {
            warmup_left: options.warmup,
            options,
            frame: 0,
            stopped: false,
        }
    }

    fn draw(&self) -> VideoFrame {
        let width = self.options.width.max(2);
        let height = self.options.height.max(1);
        let bar = (self.frame % width as u64) as u32;
        let mut data = vec![0u8; (width * height * 4) as usize];
        for (i, pixel) in data.chunks_exact_mut(4).enumerate() {
            if i as u32 % width == bar {
                pixel.copy_from_slice(&[255, 255, 255, 255]);
            } else {
                pixel[3] = 255;
            }
        }
        data[..8].copy_from_slice(&self.frame.to_le_bytes());

        let rate = FrameRate::new((self.options.fps * 1000.0).round() as u32, 1000);
        VideoFrame {
            pts: rate.time_from_frame_number(self.frame.min(u32::MAX as u64) as u32),
            duration: rate.frame_duration(),
            width,
            height,
            format: PixelFormat::BGRA,
            data,
        }
    }
}

impl Renderer for ProceduralRenderer {
    fn fps(&self) -> f64 {
        self.options.fps
    }

    fn is_ready(&mut self) -> bool {
        if self.options.never_ready {
            return false;
        }
        if self.warmup_left > 0 {
            self.warmup_left -= 1;
            return false;
        }
        true
    }

    fn is_empty(&self) -> bool {
        self.stopped || self.options.length.map_or(false, |length| self.frame >= length)
    }

    fn advance(&mut self) -> Result<Option<VideoFrame>> {
        if self.options.fail_at == Some(self.frame) {
            return Err(PlayerError::RendererError(format!(
                "{} 在第 {} 帧出图失败",
                self.options.name, self.frame
            )));
        }
        let image = self.draw();
        self.frame += 1;
        Ok(Some(image))
    }

    fn call(&mut self, param: &str) -> Result<String> {
        match param.trim().to_ascii_lowercase().as_str() {
            "play" => {
                self.stopped = false;
                Ok("OK".to_string())
            }
            "stop" => {
                self.stopped = true;
                Ok("OK".to_string())
            }
            "frame?" => Ok(self.frame.to_string()),
            _ => Err(PlayerError::RendererError(format!("未知的模板调用: {}", param))),
        }
    }

    fn description(&self) -> String {
        format!("procedural://{}", self.options.name)
    }
}

/// 读回渲染画面里写入的帧计数
pub fn rendered_index(frame: &VideoFrame) -> Option<u64> {
    let bytes: [u8; 8] = frame.data.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_and_length() {
        let mut renderer = ProceduralRenderer::new(ProceduralRendererOptions {
            warmup: 2,
            length: Some(2),
            ..Default::default()
        });
        assert!(!renderer.is_ready());
        assert!(!renderer.is_ready());
        assert!(renderer.is_ready());

        let first = renderer.advance().unwrap().unwrap();
        assert_eq!(rendered_index(&first), Some(0));
        assert_eq!(first.duration, 20_000);
        assert!(!renderer.is_empty());
        renderer.advance().unwrap();
        assert!(renderer.is_empty());
    }

    #[test]
    fn test_calls() {
        let mut renderer = ProceduralRenderer::new(ProceduralRendererOptions::default());
        assert_eq!(renderer.call("STOP").unwrap(), "OK");
        assert!(renderer.is_empty());
        assert_eq!(renderer.call("play").unwrap(), "OK");
        assert_eq!(renderer.call("frame?").unwrap(), "0");
        assert!(renderer.call("explode").is_err());
    }

    #[test]
    fn test_injected_failure() {
        let mut renderer = ProceduralRenderer::new(ProceduralRendererOptions {
            fail_at: Some(1),
            ..Default::default()
        });
        assert!(renderer.advance().is_ok());
        assert!(matches!(renderer.advance(), Err(PlayerError::RendererError(_))));
    }
}
