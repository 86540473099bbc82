// 压缩协作者模块
//
// FileIO 工作线程在流式写入/读取时同步调用的打包服务边界。
// 通过构造参数注入，测试中可替换为桩实现

use std::io::{Cursor, Read, Write};

use serde::{Deserialize, Serialize};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// 归档内固定的单条目名称
const ENTRY_NAME: &str = "payload";

/// 打包模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackMode {
    /// 始终压缩
    Deflate,
    /// 始终原样存储
    Store,
    /// 混合：先尝试压缩，压不动的数据回退为原样存储
    #[default]
    Hybrid,
}

/// 压缩错误
#[derive(Debug)]
pub struct CompressionError {
    pub message: String,
}

impl CompressionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompressionError {}

impl From<zip::result::ZipError> for CompressionError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::new(format!("ZIP 处理失败: {}", err))
    }
}

impl From<std::io::Error> for CompressionError {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("IO 失败: {}", err))
    }
}

/// 压缩服务边界
///
/// 纯函数式调用：实现方不得回调 FileIO，调用方不得在持锁状态下调用
pub trait CompressionService: Send + Sync {
    /// 打包数据
    fn pack(&self, data: &[u8], mode: PackMode) -> Result<Vec<u8>, CompressionError>;

    /// 解包数据
    fn unpack(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;
}

/// 基于 ZIP 的默认压缩实现
///
/// 单条目归档；Hybrid 模式下若压缩结果不小于原数据则改用原样存储
#[derive(Debug, Default)]
pub struct ZipCompressor;

impl ZipCompressor {
    pub fn new() -> Self {
        Self
    }

    fn pack_with_method(
        &self,
        data: &[u8],
        method: CompressionMethod,
    ) -> Result<Vec<u8>, CompressionError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(method);
        writer.start_file(ENTRY_NAME, options)?;
        writer.write_all(data)?;
        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

impl CompressionService for ZipCompressor {
    fn pack(&self, data: &[u8], mode: PackMode) -> Result<Vec<u8>, CompressionError> {
        match mode {
            PackMode::Deflate => self.pack_with_method(data, CompressionMethod::Deflated),
            PackMode::Store => self.pack_with_method(data, CompressionMethod::Stored),
            PackMode::Hybrid => {
                let deflated = self.pack_with_method(data, CompressionMethod::Deflated)?;
                // 压缩无收益时回退为存储模式
                if deflated.len() >= data.len() {
                    self.pack_with_method(data, CompressionMethod::Stored)
                } else {
                    Ok(deflated)
                }
            }
        }
    }

    fn unpack(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        if archive.len() == 0 {
            return Err(CompressionError::new("归档中没有数据条目"));
        }
        let mut entry = archive.by_index(0)?;
        let mut out = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut out)?;
        Ok(out)
    }
}
