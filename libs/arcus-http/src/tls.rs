//! TLS root store handling
//!
//! Loading the operating system trust store is expensive (it hits the
//! filesystem or platform keychain), so the parsed certificates are
//! cached for the lifetime of the process. Webpki roots come compiled-in
//! via hyper-rustls and need no loading at all.

use rustls::crypto::CryptoProvider;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

static NATIVE_ROOTS_CACHE: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_certs_uncached() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error while loading a native root certificate");
    }
    if result.certs.is_empty() {
        tracing::warn!("no native root certificates were found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

/// Native root certificates, loaded at most once per process.
pub(crate) fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS_CACHE.get_or_init(load_native_certs_uncached)
}

/// The process-wide crypto provider, falling back to aws-lc-rs when none
/// has been installed.
pub(crate) fn get_crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build a rustls client config trusting the OS root store.
///
/// Errors are returned as plain strings; the caller wraps them into its
/// own error type.
pub(crate) fn native_roots_client_config() -> Result<rustls::ClientConfig, String> {
    let certs = native_root_certs();
    if certs.is_empty() {
        return Err("no native root certificates could be loaded".to_owned());
    }

    let mut roots = rustls::RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(ignored, "skipped unparsable native root certificates");
    }
    if added == 0 {
        return Err("none of the native root certificates were usable".to_owned());
    }

    let config = rustls::ClientConfig::builder_with_provider(get_crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| format!("unsupported protocol versions: {e}"))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn native_roots_load_once() {
        let before = LOAD_COUNT.load(Ordering::SeqCst);
        let first = native_root_certs();
        let second = native_root_certs();
        let after = LOAD_COUNT.load(Ordering::SeqCst);

        assert!(std::ptr::eq(first, second));
        assert!(after - before <= 1, "cache must load at most once");
    }

    #[test]
    fn native_roots_client_config_is_buildable_or_explains() {
        // CI containers may genuinely have no trust store; accept both
        // outcomes but require a usable error message.
        match native_roots_client_config() {
            Ok(_) => {}
            Err(msg) => assert!(!msg.is_empty()),
        }
    }
}
