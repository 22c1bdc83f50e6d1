use crate::core::{ChannelLayout, PlayerError, Result};

/// 文件生产者的运行时命令（`call` 的参数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerCommand {
    /// `LOOP` 或 `LOOP 0|1`，没有数值时只应答
    Loop(Option<bool>),
    /// `SEEK n`
    Seek(u32),
}

impl ProducerCommand {
    /// 解析命令字符串（关键字大小写不敏感）
    pub fn parse(param: &str) -> Result<Self> {
        let text = param.trim();
        let invalid = || PlayerError::InvalidCommand(param.to_string());

        if let Some(rest) = strip_keyword(text, "LOOP") {
            let value = rest.trim_start();
            return match value {
                "" => Ok(ProducerCommand::Loop(None)),
                "0" => Ok(ProducerCommand::Loop(Some(false))),
                "1" => Ok(ProducerCommand::Loop(Some(true))),
                _ => Err(invalid()),
            };
        }

        if let Some(rest) = strip_keyword(text, "SEEK") {
            // 关键字与数字之间至少一个空白
            if !rest.starts_with(char::is_whitespace) {
                return Err(invalid());
            }
            let digits = rest.trim_start();
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            return digits
                .parse::<u32>()
                .map(ProducerCommand::Seek)
                .map_err(|_| invalid());
        }

        Err(invalid())
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        text.get(keyword.len()..)
    } else {
        None
    }
}

/// 打开文件生产者的参数
#[derive(Debug, Clone, PartialEq)]
pub struct FileProducerOptions {
    pub looping: bool,
    /// 起始输出帧号
    pub start: u32,
    /// 最多输出的帧数，`u32::MAX` 表示不限制
    pub length: u32,
    /// 缩略图模式：不解码音频
    pub thumbnail_mode: bool,
    /// 输出声道布局，None 时沿用媒体源
    pub channel_layout: Option<ChannelLayout>,
}

impl Default for FileProducerOptions {
    fn default() -> Self {
        Self {
            looping: false,
            start: 0,
            length: u32::MAX,
            thumbnail_mode: false,
            channel_layout: None,
        }
    }
}

impl FileProducerOptions {
    /// 从参数列表解析，例如 `["clip.mov", "LOOP", "SEEK", "100", "LENGTH", "50"]`
    ///
    /// 关键字大小写不敏感；未识别的参数忽略。
    pub fn from_params<S: AsRef<str>>(params: &[S]) -> Result<Self> {
        let mut options = Self::default();
        let mut iter = params.iter().map(|p| p.as_ref());
        while let Some(param) = iter.next() {
            match param.to_ascii_uppercase().as_str() {
                "LOOP" => options.looping = true,
                "SEEK" => options.start = parse_number(param, iter.next())?,
                "LENGTH" => options.length = parse_number(param, iter.next())?,
                "THUMBNAIL" => options.thumbnail_mode = true,
                "CHANNEL_LAYOUT" => {
                    let name = iter.next().ok_or_else(|| {
                        PlayerError::InvalidCommand("CHANNEL_LAYOUT 缺少布局名称".to_string())
                    })?;
                    let layout = ChannelLayout::by_name(name).ok_or_else(|| {
                        PlayerError::InvalidCommand(format!("未知的声道布局: {}", name))
                    })?;
                    options.channel_layout = Some(layout);
                }
                _ => {}
            }
        }
        Ok(options)
    }
}

fn parse_number(key: &str, value: Option<&str>) -> Result<u32> {
    value
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| PlayerError::InvalidCommand(format!("{} 需要一个非负整数", key)))
}
