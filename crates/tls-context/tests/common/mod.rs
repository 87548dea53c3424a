//! 集成测试共用的证书与证书库夹具
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use p12_keystore::{Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use rcgen::{BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair};
use rustls_pki_types::CertificateDer;

use twoway_tls::{
    CredentialStore, DecodeError, DefaultContextSlot, DiagnosticEvent, DiagnosticReporter,
    Passphrase, StoreDecoder, TlsContextBuilder,
};

pub const PASSWORD: &str = "changeit";

/// 签发出的证书及其私钥（PKCS#8 DER）
pub struct Issued {
    pub cert: CertificateDer<'static>,
    pub key: Vec<u8>,
}

/// 测试用 CA，可签发同时具备 serverAuth / clientAuth 用途的叶子证书
pub struct TestCa {
    pub cert: CertificateDer<'static>,
    issuer: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name.push(DnType::CommonName, name);
        let issuer = params.self_signed(&key).unwrap();
        Self {
            cert: issuer.der().clone(),
            issuer,
            key,
        }
    }

    pub fn issue(&self, common_name: &str) -> Issued {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let cert = params.signed_by(&key, &self.issuer, &self.key).unwrap();
        Issued {
            cert: cert.der().clone(),
            key: key.serialize_der(),
        }
    }
}

/// 早已过期的自签名证书
pub fn expired_self_signed() -> Issued {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["expired.invalid".to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, "expired");
    params.not_before = rcgen::date_time_ymd(2000, 1, 1);
    params.not_after = rcgen::date_time_ymd(2001, 1, 1);
    let cert = params.self_signed(&key).unwrap();
    Issued {
        cert: cert.der().clone(),
        key: key.serialize_der(),
    }
}

/// 写出包含若干身份的 PKCS#12 证书库
pub fn write_identity_store(
    dir: &Path,
    file: &str,
    password: &str,
    identities: &[(&str, &Issued)],
) -> PathBuf {
    let mut keystore = KeyStore::new();
    for (index, (alias, issued)) in identities.iter().enumerate() {
        let cert = Certificate::from_der(issued.cert.as_ref()).unwrap();
        let local_key_id = [index as u8 + 1; 20];
        let chain = PrivateKeyChain::new(&issued.key, local_key_id, [cert]);
        keystore.add_entry(alias, KeyStoreEntry::PrivateKeyChain(chain));
    }
    write_keystore(dir, file, password, &keystore)
}

/// 写出单个身份的证书库，证书链为叶子证书加上给定的签发者证书
pub fn write_chained_identity_store(
    dir: &Path,
    file: &str,
    alias: &str,
    leaf: &Issued,
    issuers: &[&CertificateDer<'static>],
) -> PathBuf {
    let chain = std::iter::once(leaf.cert.as_ref())
        .chain(issuers.iter().map(|der| der.as_ref()))
        .map(|der| Certificate::from_der(der).unwrap())
        .collect::<Vec<_>>();
    let mut keystore = KeyStore::new();
    keystore.add_entry(
        alias,
        KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(&leaf.key, [1u8; 20], chain)),
    );
    write_keystore(dir, file, PASSWORD, &keystore)
}

/// 去掉 PFX 末尾的 MacData，得到没有完整性校验的证书库
pub fn strip_mac(pfx: &[u8]) -> Vec<u8> {
    let (body_start, body_len) = der_header(pfx, 0);
    let body = &pfx[body_start..body_start + body_len];

    // version + authSafe
    let mut offset = 0;
    for _ in 0..2 {
        let (start, len) = der_header(body, offset);
        offset = start + len;
    }
    assert!(offset < body.len(), "store carries no MacData");

    let mut out = vec![0x30];
    out.extend(der_length(offset));
    out.extend_from_slice(&body[..offset]);
    out
}

/// 返回 (内容起始偏移, 内容长度)
fn der_header(bytes: &[u8], offset: usize) -> (usize, usize) {
    let first = bytes[offset + 1];
    if first < 0x80 {
        return (offset + 2, first as usize);
    }
    let count = (first & 0x7f) as usize;
    let len = bytes[offset + 2..offset + 2 + count]
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    (offset + 2 + count, len)
}

fn der_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .into_iter()
        .skip_while(|b| *b == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend(bytes);
    out
}

/// 写出只含受信任证书的 PKCS#12 证书库
pub fn write_trust_store(
    dir: &Path,
    file: &str,
    password: &str,
    certs: &[(&str, &CertificateDer<'static>)],
) -> PathBuf {
    let mut keystore = KeyStore::new();
    for (alias, der) in certs {
        let cert = Certificate::from_der(der.as_ref()).unwrap();
        keystore.add_entry(alias, KeyStoreEntry::Certificate(cert));
    }
    write_keystore(dir, file, password, &keystore)
}

pub fn pkcs12_bytes(identities: &[(&str, &Issued)]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = write_identity_store(dir.path(), "bundle.p12", PASSWORD, identities);
    std::fs::read(path).unwrap()
}

fn write_keystore(dir: &Path, file: &str, password: &str, keystore: &KeyStore) -> PathBuf {
    let bytes = keystore.writer(password).write().unwrap();
    let path = dir.join(file);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// 构建器：发布到独立槽位，不影响进程级默认上下文
pub fn isolated_builder() -> (TlsContextBuilder, Arc<DefaultContextSlot>) {
    let slot = Arc::new(DefaultContextSlot::new());
    (TlsContextBuilder::new().with_default_slot(slot.clone()), slot)
}

/// 总是失败的解码器，用来模拟主解码器无法解析的证书库
pub struct RejectingDecoder;

impl StoreDecoder for RejectingDecoder {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    fn decode(&self, _bytes: &[u8], _passphrase: &Passphrase) -> Result<CredentialStore, DecodeError> {
        Err(DecodeError::malformed("rejecting", "unsupported archive layout"))
    }
}

/// 记录全部诊断事件
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DiagnosticReporter for RecordingReporter {
    fn report(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}
