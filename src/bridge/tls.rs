//! TLS acceptor construction

use super::TlsConfig;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// ALPN identifiers offered, most preferred first
const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Load certificate material and build an acceptor offering HTTP/2
pub fn load_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor> {
    let certs = load_certs(&tls.cert_path)?;
    let key = load_key(&tls.key_path)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::TransportConfig(format!("invalid certificate or key: {e}")))?;
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| {
        Error::TransportConfig(format!(
            "failed to open TLS {what} file '{}': {e}",
            path.display()
        ))
    })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path, "certificate")?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            Error::TransportConfig(format!(
                "failed to read TLS certificate file '{}': {e}",
                path.display()
            ))
        })?;
    if certs.is_empty() {
        return Err(Error::TransportConfig(format!(
            "TLS certificate file '{}' contains no certificates",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path, "key")?)
        .map_err(|e| {
            Error::TransportConfig(format!(
                "failed to read TLS key file '{}': {e}",
                path.display()
            ))
        })?
        .ok_or_else(|| {
            Error::TransportConfig(format!(
                "TLS key file '{}' does not contain a usable key",
                path.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_files() {
        let tls = TlsConfig {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        };
        let Err(err) = load_acceptor(&tls) else {
            panic!("certificate loading should fail");
        };
        assert!(matches!(err, Error::TransportConfig(ref m) if m.contains("cert.pem")));
    }

    #[test]
    fn test_empty_certificate_file() {
        let cert = tempfile::NamedTempFile::new().unwrap();
        let mut key = tempfile::NamedTempFile::new().unwrap();
        key.write_all(b"not a key").unwrap();

        let tls = TlsConfig {
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
        };
        let Err(err) = load_acceptor(&tls) else {
            panic!("certificate loading should fail");
        };
        assert!(matches!(err, Error::TransportConfig(ref m) if m.contains("no certificates")));
    }
}
