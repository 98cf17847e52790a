/// Result alias that carries the custom [`BootstrapError`] type.
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Boxed error returned by pluggable native-loader backends. The sequencer
/// attaches the library name before the failure reaches the host.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Common error type for the bootstrap core.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The load sequencer was misused: an empty chain, a duplicate entry, or
    /// configuration after the run already started. Programming errors, never
    /// retried.
    #[error("load sequencer misconfigured: {0}")]
    Configuration(String),
    /// A named native module failed to load. Fatal to bootstrap: entries after
    /// the failing one may depend on it being resident, so none of them are
    /// attempted.
    #[error("native library `{name}` failed to load: {cause}")]
    Load { name: String, cause: String },
    /// Wrapper around standard IO errors raised while reading a manifest.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A bootstrap manifest could not be parsed.
    #[error("invalid bootstrap manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl BootstrapError {
    /// Creates a configuration error that wraps the provided message.
    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a load error for the named library.
    pub fn load<N: Into<String>, C: Into<String>>(name: N, cause: C) -> Self {
        Self::Load {
            name: name.into(),
            cause: cause.into(),
        }
    }
}
