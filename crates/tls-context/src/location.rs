//! 证书库位置
//!
//! 证书库既可以是文件系统路径，也可以是随程序打包的内嵌资源。
//! 解析顺序：存在的普通文件优先，否则按资源名查找内嵌资源。

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{Result, TlsContextError};

const CLASSPATH_PREFIX: &str = "classpath:";

/// 证书库位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// 文件系统路径
    Filesystem(PathBuf),
    /// 内嵌资源名
    Embedded(String),
}

impl StoreLocation {
    /// 按配置值推断位置：存在的普通文件视为文件系统路径，否则视为内嵌资源
    pub fn from_config(value: &str) -> Self {
        let path = Path::new(value);
        if path.is_file() {
            Self::Filesystem(path.to_path_buf())
        } else {
            Self::Embedded(value.to_string())
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Self::Filesystem(path.into())
    }

    pub fn embedded(name: impl Into<String>) -> Self {
        Self::Embedded(name.into())
    }

    /// 查找内嵌资源时使用的名称
    fn resource_name(&self) -> Cow<'_, str> {
        match self {
            Self::Filesystem(path) => path.to_string_lossy(),
            Self::Embedded(name) => Cow::Borrowed(name.as_str()),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem(path) => write!(f, "{}", path.display()),
            Self::Embedded(name) => write!(f, "resource:{name}"),
        }
    }
}

/// 证书库实际来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOrigin {
    Filesystem,
    Embedded,
}

impl fmt::Display for StoreOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem => f.write_str("filesystem"),
            Self::Embedded => f.write_str("embedded"),
        }
    }
}

/// 随程序打包的资源集合
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    entries: HashMap<String, Cow<'static, [u8]>>,
}

impl EmbeddedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个资源，通常配合 `include_bytes!` 使用
    pub fn with(mut self, name: &str, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: &str, bytes: impl Into<Cow<'static, [u8]>>) {
        self.entries
            .insert(normalize_resource_name(name).to_string(), bytes.into());
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .get(normalize_resource_name(name))
            .map(|bytes| bytes.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_resource_name(name: &str) -> &str {
    let name = name.strip_prefix(CLASSPATH_PREFIX).unwrap_or(name);
    name.trim_start_matches('/')
}

/// 已打开的证书库字节流，离开作用域即关闭
pub(crate) enum StoreStream<'a> {
    File(BufReader<File>),
    Embedded(Cursor<&'a [u8]>),
}

impl Read for StoreStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::File(reader) => reader.read(buf),
            Self::Embedded(cursor) => cursor.read(buf),
        }
    }
}

/// 将位置解析为可读的字节流
pub(crate) fn open<'a>(
    location: &StoreLocation,
    resources: &'a EmbeddedResources,
) -> Result<(StoreStream<'a>, StoreOrigin)> {
    if let StoreLocation::Filesystem(path) = location
        && path.is_file()
    {
        let file = File::open(path).map_err(|source| TlsContextError::Io {
            location: location.to_string(),
            source,
        })?;
        return Ok((StoreStream::File(BufReader::new(file)), StoreOrigin::Filesystem));
    }

    match resources.get(&location.resource_name()) {
        Some(bytes) => Ok((StoreStream::Embedded(Cursor::new(bytes)), StoreOrigin::Embedded)),
        None => Err(TlsContextError::NotFound {
            location: location.to_string(),
        }),
    }
}
