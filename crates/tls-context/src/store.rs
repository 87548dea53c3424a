//! 内存中的证书库
//!
//! 证书库由若干带别名的条目组成，每个条目要么是身份（私钥 + 证书链），
//! 要么是单独的受信任证书。别名在同一证书库内唯一。
//! 证书库持有密钥材料，提取出身份与信任管理器后应尽快释放。

use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;
use thiserror::Error;

/// 别名重复
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate alias '{0}' in credential store")]
pub struct DuplicateAlias(pub String);

/// 身份条目的私钥
pub enum KeyMaterial {
    /// 已解密的私钥（PKCS#8 / PKCS#1 / SEC1）
    Plain(PrivateKeyDer<'static>),
    /// 仍加密的 PKCS#8（EncryptedPrivateKeyInfo，DER），由身份管理器工厂用口令解锁
    EncryptedPkcs8(Vec<u8>),
}

impl KeyMaterial {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::EncryptedPkcs8(_))
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(key) => Self::Plain(key.clone_key()),
            Self::EncryptedPkcs8(der) => Self::EncryptedPkcs8(der.clone()),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("KeyMaterial::Plain(***)"),
            Self::EncryptedPkcs8(_) => f.write_str("KeyMaterial::EncryptedPkcs8(***)"),
        }
    }
}

/// 身份条目：私钥及其证书链（叶子证书在前）
#[derive(Debug, Clone)]
pub struct IdentityEntry {
    pub key: KeyMaterial,
    pub chain: Vec<CertificateDer<'static>>,
}

impl IdentityEntry {
    pub fn new(key: KeyMaterial, chain: Vec<CertificateDer<'static>>) -> Self {
        Self { key, chain }
    }

    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.chain.first()
    }
}

/// 证书库条目
#[derive(Debug, Clone)]
pub enum StoreEntry {
    Identity(IdentityEntry),
    TrustedCertificate(CertificateDer<'static>),
}

impl StoreEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Identity(_) => EntryKind::Identity,
            Self::TrustedCertificate(_) => EntryKind::TrustedCertificate,
        }
    }
}

/// 条目类别，用于诊断输出
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Identity,
    TrustedCertificate,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::TrustedCertificate => f.write_str("trusted-certificate"),
        }
    }
}

/// 解析后的证书库，条目按插入顺序保存
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: Vec<(String, StoreEntry)>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, entry: StoreEntry) -> Result<(), DuplicateAlias> {
        let alias = alias.into();
        if self.contains(&alias) {
            return Err(DuplicateAlias(alias));
        }
        self.entries.push((alias, entry));
        Ok(())
    }

    /// 返回未被占用的别名：`base`、`base-2`、`base-3` ...
    pub fn free_alias(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.iter().any(|(a, _)| a == alias)
    }

    pub fn get(&self, alias: &str) -> Option<&StoreEntry> {
        self.entries
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(alias, _)| alias.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &StoreEntry)> {
        self.entries
            .iter()
            .map(|(alias, entry)| (alias.as_str(), entry))
    }

    pub fn identities(&self) -> impl Iterator<Item = (&str, &IdentityEntry)> {
        self.entries().filter_map(|(alias, entry)| match entry {
            StoreEntry::Identity(identity) => Some((alias, identity)),
            StoreEntry::TrustedCertificate(_) => None,
        })
    }

    pub fn identity_count(&self) -> usize {
        self.identities().count()
    }

    /// 可作为信任锚的证书：所有受信任证书条目，加上每个身份条目的叶子证书
    pub fn trust_anchor_candidates(&self) -> Vec<CertificateDer<'static>> {
        self.entries
            .iter()
            .filter_map(|(_, entry)| match entry {
                StoreEntry::TrustedCertificate(cert) => Some(cert.clone()),
                StoreEntry::Identity(identity) => identity.leaf().cloned(),
            })
            .collect()
    }
}
