//! 双向 TLS 上下文构建
//!
//! 加载身份库与信任库，组装为不可变的 [`TlsContext`]，并可发布为进程级默认上下文。
//!
//! ```no_run
//! use twoway_tls::{StoreLocation, TlsContextBuilder, TlsContextConfig, TrustPolicy};
//!
//! let config = TlsContextConfig::new(
//!     StoreLocation::from_config("certs/server.p12"),
//!     "changeit",
//!     TrustPolicy::validate_against(StoreLocation::from_config("certs/trust.p12"), "changeit"),
//! );
//! let context = TlsContextBuilder::new().build(&config)?;
//! let acceptor = context.acceptor()?;
//! # Ok::<(), twoway_tls::TlsContextError>(())
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod decoder;
pub mod default_slot;
pub mod error;
pub mod identity;
pub mod loader;
pub mod location;
pub mod reporter;
pub mod secret;
pub mod store;
pub mod trust;

pub use builder::{TlsContextBuilder, TlsContextConfig};
pub use config::{SslConfig, StoreConfig, TwowayConfig};
pub use context::{ContextVerifier, SecureRandomSource, TlsContext};
pub use decoder::{
    NativePkcs12Decoder, PemBundleDecoder, Pkcs12Decoder, StoreDecoder, default_decoders,
};
pub use default_slot::{DefaultContextSlot, default_context, global_slot};
pub use error::{ConfigError, DecodeError, DecodeFailure, Result, TlsContextError};
pub use identity::{IdentityManager, IdentityManagerFactory, IdentityResolver};
pub use loader::CredentialStoreLoader;
pub use location::{EmbeddedResources, StoreLocation, StoreOrigin};
pub use reporter::{DiagnosticEvent, DiagnosticReporter, TracingReporter};
pub use secret::Passphrase;
pub use store::{CredentialStore, EntryKind, IdentityEntry, KeyMaterial, StoreEntry};
pub use trust::{
    PolicyKind, StoreTrustManager, TrustAllManager, TrustManager, TrustPolicy, TrustPolicyResolver,
};
