use super::format::FieldMode;
use super::types::{AudioFrame, FrameHints, VideoFrame};
use std::sync::Arc;

/// 帧变换（供合成器做布局，例如缩略图平铺），不需要重新解码
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    pub fill_scale: [f64; 2],
    pub fill_translation: [f64; 2],
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self {
            fill_scale: [1.0, 1.0],
            fill_translation: [0.0, 0.0],
        }
    }
}

/// 帧种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// 有内容的帧
    Normal,
    /// 空帧（没有画面也没有声音）
    Empty,
    /// 迟到帧：请求时还没有准备好的帧
    Late,
}

/// 画面内容
#[derive(Debug, Clone)]
pub enum Picture {
    None,
    Progressive(Arc<VideoFrame>),
    /// 两个原生帧按场交织
    Interlaced {
        first: Arc<VideoFrame>,
        second: Arc<VideoFrame>,
        field_mode: FieldMode,
    },
    /// 多个子帧，由合成器按各自的变换摆放
    Composite(Arc<[OutputFrame]>),
}

/// 输出帧（OutputFrame）
///
/// 构造后不可变；内容通过 `Arc` 共享，复制只增加引用计数，
/// 所以帧率转换时的重复和缩略图平铺都不需要拷贝像素。
#[derive(Debug, Clone)]
pub struct OutputFrame {
    kind: FrameKind,
    picture: Picture,
    audio: Option<Arc<AudioFrame>>,
    transform: FrameTransform,
    hints: FrameHints,
    paused: bool,
}

impl OutputFrame {
    fn with_kind(kind: FrameKind) -> Self {
        Self {
            kind,
            picture: Picture::None,
            audio: None,
            transform: FrameTransform::default(),
            hints: FrameHints::NONE,
            paused: false,
        }
    }

    pub fn empty() -> Self {
        Self::with_kind(FrameKind::Empty)
    }

    pub fn late() -> Self {
        Self::with_kind(FrameKind::Late)
    }

    /// 由一个原生画面和本帧的音频构造
    pub fn new(video: Arc<VideoFrame>, audio: Option<Arc<AudioFrame>>, hints: FrameHints) -> Self {
        let picture = if video.is_empty() {
            Picture::None
        } else {
            Picture::Progressive(video)
        };
        Self {
            kind: FrameKind::Normal,
            picture,
            audio,
            transform: FrameTransform::default(),
            hints,
            paused: false,
        }
    }

    /// 把两个连续的原生帧交织成一个隔行输出帧
    pub fn interlace(
        first: Arc<VideoFrame>,
        second: Arc<VideoFrame>,
        field_mode: FieldMode,
        audio: Option<Arc<AudioFrame>>,
        hints: FrameHints,
    ) -> Self {
        Self {
            kind: FrameKind::Normal,
            picture: Picture::Interlaced {
                first,
                second,
                field_mode,
            },
            audio,
            transform: FrameTransform::default(),
            hints,
            paused: false,
        }
    }

    /// 组合多个子帧
    pub fn composite(children: Vec<OutputFrame>) -> Self {
        Self {
            kind: FrameKind::Normal,
            picture: Picture::Composite(children.into()),
            audio: None,
            transform: FrameTransform::default(),
            hints: FrameHints::NONE,
            paused: false,
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn is_late(&self) -> bool {
        self.kind == FrameKind::Late
    }

    pub fn is_empty(&self) -> bool {
        self.kind == FrameKind::Empty
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn picture(&self) -> &Picture {
        &self.picture
    }

    /// 逐行帧的画面
    pub fn video(&self) -> Option<&Arc<VideoFrame>> {
        match &self.picture {
            Picture::Progressive(video) => Some(video),
            _ => None,
        }
    }

    /// 隔行帧的两场
    pub fn fields(&self) -> Option<(&Arc<VideoFrame>, &Arc<VideoFrame>, FieldMode)> {
        match &self.picture {
            Picture::Interlaced {
                first,
                second,
                field_mode,
            } => Some((first, second, *field_mode)),
            _ => None,
        }
    }

    pub fn children(&self) -> &[OutputFrame] {
        match &self.picture {
            Picture::Composite(children) => children,
            _ => &[],
        }
    }

    pub fn audio(&self) -> Option<&Arc<AudioFrame>> {
        self.audio.as_ref()
    }

    /// 本帧携带的每声道采样数
    pub fn audio_samples(&self) -> usize {
        self.audio.as_ref().map(|a| a.samples_per_channel()).unwrap_or(0)
    }

    pub fn transform(&self) -> &FrameTransform {
        &self.transform
    }

    pub fn hints(&self) -> FrameHints {
        self.hints
    }

    /// 返回一个更换了变换的新帧，内容共享
    pub fn with_transform(&self, transform: FrameTransform) -> Self {
        let mut frame = self.clone();
        frame.transform = transform;
        frame
    }

    /// 去掉音频（静止画面不能重复播放声音）
    pub fn without_audio(&self) -> Self {
        let mut frame = self.clone();
        frame.audio = None;
        frame
    }

    /// 标记为暂停
    pub fn paused(&self) -> Self {
        let mut frame = self.clone();
        frame.paused = true;
        frame
    }

    /// 两个帧是否共享同一份画面
    pub fn same_picture(&self, other: &OutputFrame) -> bool {
        match (&self.picture, &other.picture) {
            (Picture::None, Picture::None) => self.kind == other.kind,
            (Picture::Progressive(a), Picture::Progressive(b)) => Arc::ptr_eq(a, b),
            (
                Picture::Interlaced { first: a1, second: a2, .. },
                Picture::Interlaced { first: b1, second: b2, .. },
            ) => Arc::ptr_eq(a1, b1) && Arc::ptr_eq(a2, b2),
            (Picture::Composite(a), Picture::Composite(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
