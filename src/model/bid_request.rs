// src/model/bid_request.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 页面级原生广告渲染回调，以 CDB 返回的原生数据调用
#[derive(Clone)]
pub struct NativeCallback(Arc<dyn Fn(&Value) + Send + Sync>);

impl NativeCallback {
    pub fn new(callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn call(&self, payload: &Value) {
        (self.0)(payload)
    }
}

impl fmt::Debug for NativeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeCallback(..)")
    }
}

/// 广告尺寸：单个 `[w, h]` 或 `[[w, h], ...]`，按结构区分而不是按长度
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Sizes {
    Single([u32; 2]),
    Multiple(Vec<[u32; 2]>),
}

impl Sizes {
    /// `"<w>x<h>"` 形式，协议中总是列表
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Sizes::Single(size) => vec![size_token(size)],
            Sizes::Multiple(sizes) => sizes.iter().map(size_token).collect(),
        }
    }
}

fn size_token(size: &[u32; 2]) -> String {
    format!("{}x{}", size[0], size[1])
}

/// 发布者配置的 zone id，数字和数字字符串都可能出现
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ZoneId {
    Numeric(i64),
    Text(String),
}

impl ZoneId {
    pub fn is_set(&self) -> bool {
        match self {
            ZoneId::Numeric(n) => *n != 0,
            ZoneId::Text(s) => !s.is_empty(),
        }
    }

    /// 取前导整数：`"123abc"` 为 123，`"abc"` 无值
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ZoneId::Numeric(n) => Some(*n),
            ZoneId::Text(s) => {
                let s = s.trim_start();
                let (sign, digits) = match s.strip_prefix('-') {
                    Some(rest) => (-1, rest),
                    None => (1, s.strip_prefix('+').unwrap_or(s)),
                };
                let end = digits
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(digits.len());
                digits[..end].parse::<i64>().ok().map(|n| sign * n)
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoParams {
    pub skip: Option<u32>,
    pub placement: Option<u32>,
    pub minduration: Option<u32>,
    pub playbackmethod: Option<u32>,
    pub startdelay: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BidParams {
    pub zone_id: Option<ZoneId>,
    pub network_id: Option<u64>,
    pub publisher_sub_id: Option<String>,
    pub integration_mode: Option<String>,
    pub video: Option<VideoParams>,
    #[serde(skip)]
    pub native_callback: Option<NativeCallback>,
}

impl BidParams {
    pub fn zone_id(&self) -> Option<&ZoneId> {
        self.zone_id.as_ref().filter(|z| z.is_set())
    }

    pub fn network_id(&self) -> Option<u64> {
        self.network_id.filter(|n| *n != 0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BannerMediaType {
    pub sizes: Option<Sizes>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoMediaType {
    pub context: Option<String>,
    pub player_size: Option<Sizes>,
    pub mimes: Option<Vec<String>>,
    pub protocols: Option<Vec<u32>>,
    pub maxduration: Option<u32>,
    pub api: Option<Vec<u32>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MediaTypes {
    pub banner: Option<BannerMediaType>,
    pub video: Option<VideoMediaType>,
}

/// 单个广告位的询价请求，由拍卖引擎按轮次创建
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    pub ad_unit_code: String,
    pub bid_id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub auction_id: Option<String>,
    #[serde(default)]
    pub sizes: Option<Sizes>,
    #[serde(default)]
    pub params: BidParams,
    #[serde(default)]
    pub media_types: Option<MediaTypes>,
}

impl BidRequest {
    pub fn has_id_param(&self) -> bool {
        self.params.zone_id().is_some() || self.params.network_id().is_some()
    }

    /// 只有 params 与 mediaTypes 中都有视频配置时才按视频处理
    pub fn video(&self) -> Option<(&VideoParams, &VideoMediaType)> {
        let params = self.params.video.as_ref()?;
        let media = self.media_types.as_ref()?.video.as_ref()?;
        Some((params, media))
    }

    pub fn banner_sizes(&self) -> Option<&Sizes> {
        self.media_types
            .as_ref()
            .and_then(|m| m.banner.as_ref())
            .and_then(|b| b.sizes.as_ref())
            .or(self.sizes.as_ref())
    }

    pub fn is_amp(&self) -> bool {
        self.params.integration_mode.as_deref() == Some("amp")
    }
}
