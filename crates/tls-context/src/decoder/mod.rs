//! 证书库解码器
//!
//! 加载器按顺序尝试一组解码器，第一个成功的结果即为证书库：
//!
//! - [`Pkcs12Decoder`]: 主解码器，纯 Rust 的 PKCS#12 实现
//! - [`NativePkcs12Decoder`]: 备用解码器，基于 OpenSSL，可读取旧式加密算法
//! - [`PemBundleDecoder`]: PEM 文本（证书 + 私钥）

mod native;
mod pem_bundle;
mod pkcs12;

pub use native::NativePkcs12Decoder;
pub use pem_bundle::PemBundleDecoder;
pub use pkcs12::Pkcs12Decoder;

pub(crate) use native::decrypt_pkcs8;

use std::sync::Arc;

use crate::error::DecodeError;
use crate::secret::Passphrase;
use crate::store::CredentialStore;

/// 将字节解码为证书库的能力
pub trait StoreDecoder: Send + Sync {
    /// 解码器名称，出现在诊断事件和错误信息中
    fn name(&self) -> &'static str;

    /// 快速判断字节是否可能是本解码器支持的格式
    fn recognizes(&self, _bytes: &[u8]) -> bool {
        true
    }

    fn decode(&self, bytes: &[u8], passphrase: &Passphrase) -> Result<CredentialStore, DecodeError>;
}

/// 默认解码链：PKCS#12（纯 Rust）→ PKCS#12（OpenSSL）→ PEM
pub fn default_decoders() -> Vec<Arc<dyn StoreDecoder>> {
    vec![
        Arc::new(Pkcs12Decoder),
        Arc::new(NativePkcs12Decoder),
        Arc::new(PemBundleDecoder),
    ]
}

/// DER 编码以 SEQUENCE 开头
fn looks_like_der(bytes: &[u8]) -> bool {
    bytes.first() == Some(&0x30)
}
